//! Client facade combining the connection registry with the protocol.

use std::time::Duration;

use beacon_config::{Config, Endpoint};
use beacon_envelope::{Request, Response};
use tracing::debug;

use crate::errors::ClientError;
use crate::probe::ProbeSettings;
use crate::protocol::{self, Cancellation, SendOptions};
use crate::registry::ConnectionRegistry;
use crate::transport::{SocketFactory, ZmqSocketFactory};

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Tunables applied by a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientSettings {
    /// Options used by [`Client::send`].
    pub send: SendOptions,
    /// Options used by the readiness probe.
    pub probe: ProbeSettings,
    /// Connections idle for longer than this are closed before each call.
    pub idle_window: Option<Duration>,
}

impl ClientSettings {
    /// Derives settings from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            send: SendOptions::new(config.request_timeout(), config.request_retries()),
            probe: ProbeSettings::from_config(config),
            idle_window: config.connection_idle(),
        }
    }
}

/// Reliable request-reply client with pooled connections.
///
/// Methods take `&mut self`, so at most one request is in flight per client.
/// Wrap the client in a mutex to share it across threads.
pub struct Client<F: SocketFactory = ZmqSocketFactory> {
    registry: ConnectionRegistry<F>,
    settings: ClientSettings,
    cancellation: Cancellation,
}

impl Client<ZmqSocketFactory> {
    /// Builds a ZeroMQ-backed client from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::with_factory(ZmqSocketFactory::new(), ClientSettings::from_config(config))
    }
}

impl<F: SocketFactory> Client<F> {
    /// Builds a client that allocates sockets from `factory`.
    pub fn with_factory(factory: F, settings: ClientSettings) -> Self {
        Self {
            registry: ConnectionRegistry::new(factory),
            settings,
            cancellation: Cancellation::new(),
        }
    }

    /// Sends `request` with the configured timeout and retry budget.
    ///
    /// # Errors
    ///
    /// See [`protocol::send`].
    pub fn send(&mut self, endpoint: &Endpoint, request: &Request) -> Result<Response, ClientError> {
        self.send_with(endpoint, request, self.settings.send)
    }

    /// Sends `request` with explicit options.
    ///
    /// The endpoint's connection is discarded after a call that leaves a
    /// request unanswered or breaks the reply channel, so the next call
    /// starts from a fresh socket and cannot read a late reply meant for
    /// this one.
    ///
    /// # Errors
    ///
    /// See [`protocol::send`].
    pub fn send_with(
        &mut self,
        endpoint: &Endpoint,
        request: &Request,
        options: SendOptions,
    ) -> Result<Response, ClientError> {
        if let Some(window) = self.settings.idle_window {
            self.registry.evict_idle(window);
        }
        let connection = self.registry.acquire(endpoint)?;
        let result = protocol::send(connection, endpoint, request, options, &self.cancellation);
        connection.touch();
        let unanswered = connection.unanswered();
        let channel_broken = result
            .as_ref()
            .err()
            .and_then(ClientError::as_unreachable)
            .is_some_and(|unreachable| unreachable.cause.is_channel_broken());
        if channel_broken || unanswered > 0 {
            debug!(
                target: CLIENT_TARGET,
                endpoint = %endpoint,
                unanswered,
                channel_broken,
                "discarding connection"
            );
            self.registry.discard(endpoint);
        }
        result
    }

    /// Cancellation handle observed before every attempt.
    #[must_use]
    pub const fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// Settings the client was built with.
    #[must_use]
    pub const fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Pooled connections.
    #[must_use]
    pub const fn registry(&self) -> &ConnectionRegistry<F> {
        &self.registry
    }

    /// Closes every pooled connection.
    pub fn shutdown(self) {
        self.registry.shutdown();
    }
}
