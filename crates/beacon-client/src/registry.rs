//! Pool of client sockets keyed by normalised endpoint.
//!
//! The registry hands out at most one connection per endpoint and keeps it
//! open across unrelated requests, trading idle sockets for lower call
//! latency. Sockets are allocated on first use and connected lazily by the
//! protocol; they close when the registry shuts down, when they sit idle past
//! the configured window, or when a broken channel is discarded.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::{Duration, Instant};

use beacon_config::Endpoint;
use tracing::{debug, info};

use crate::errors::ClientError;
use crate::transport::{FrameSocket, SocketFactory};

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// A pooled socket and the endpoint it is bound to.
pub struct Connection<S> {
    socket: S,
    bound_to: Option<String>,
    last_used: Instant,
    unanswered: u32,
}

impl<S: FrameSocket> Connection<S> {
    fn new(socket: S) -> Self {
        Self {
            socket,
            bound_to: None,
            last_used: Instant::now(),
            unanswered: 0,
        }
    }

    /// Connects the socket to `endpoint` unless it is already bound there.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when the transport rejects the
    /// endpoint.
    pub fn ensure_bound(&mut self, endpoint: &Endpoint) -> Result<(), ClientError> {
        let key = endpoint.normalised_key();
        if self.bound_to.as_deref() == Some(key.as_str()) {
            return Ok(());
        }
        self.socket
            .connect(&endpoint.connect_uri())
            .map_err(|source| ClientError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;
        debug!(target: REGISTRY_TARGET, endpoint = %key, "socket connected");
        self.bound_to = Some(key);
        Ok(())
    }

    /// Normalised endpoint the socket is connected to, once bound.
    #[must_use]
    pub fn bound_to(&self) -> Option<&str> {
        self.bound_to.as_deref()
    }

    /// Instant the most recent call on this connection finished.
    #[must_use]
    pub const fn last_used(&self) -> Instant {
        self.last_used
    }

    /// Requests sent on this socket whose replies were never read.
    ///
    /// A non-zero count means a late reply may still arrive and be mistaken
    /// for the answer to a later request.
    #[must_use]
    pub const fn unanswered(&self) -> u32 {
        self.unanswered
    }

    pub(crate) const fn record_sent(&mut self) {
        self.unanswered = self.unanswered.saturating_add(1);
    }

    pub(crate) const fn record_answered(&mut self) {
        self.unanswered = self.unanswered.saturating_sub(1);
    }

    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    /// Mutable access to the underlying socket.
    pub fn socket_mut(&mut self) -> &mut S {
        &mut self.socket
    }
}

/// Process-scoped pool of connections, one per normalised endpoint.
pub struct ConnectionRegistry<F: SocketFactory> {
    connections: HashMap<String, Connection<F::Socket>>,
    factory: F,
}

impl<F: SocketFactory> ConnectionRegistry<F> {
    /// Creates an empty registry that allocates sockets from `factory`.
    pub fn new(factory: F) -> Self {
        Self {
            connections: HashMap::new(),
            factory,
        }
    }

    /// Returns the pooled connection for `endpoint`, creating an unbound one
    /// on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when a new socket cannot be
    /// allocated.
    pub fn acquire(&mut self, endpoint: &Endpoint) -> Result<&mut Connection<F::Socket>, ClientError> {
        let connection = match self.connections.entry(endpoint.normalised_key()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let socket = self
                    .factory
                    .create()
                    .map_err(|source| ClientError::Transport {
                        endpoint: endpoint.to_string(),
                        source,
                    })?;
                debug!(target: REGISTRY_TARGET, endpoint = %entry.key(), "socket created");
                entry.insert(Connection::new(socket))
            }
        };
        Ok(connection)
    }

    /// Instant the pooled connection for `endpoint` was last used.
    #[must_use]
    pub fn last_used(&self, endpoint: &Endpoint) -> Option<Instant> {
        self.connections
            .get(&endpoint.normalised_key())
            .map(Connection::last_used)
    }

    /// Closes the connection for `endpoint` so the next acquisition starts
    /// from a fresh socket. Returns whether a connection was pooled.
    pub fn discard(&mut self, endpoint: &Endpoint) -> bool {
        let removed = self.connections.remove(&endpoint.normalised_key()).is_some();
        if removed {
            debug!(target: REGISTRY_TARGET, endpoint = %endpoint, "connection discarded");
        }
        removed
    }

    /// Closes connections unused for longer than `max_idle`, returning how
    /// many were closed.
    pub fn evict_idle(&mut self, max_idle: Duration) -> usize {
        let before = self.connections.len();
        self.connections
            .retain(|_, connection| connection.last_used.elapsed() <= max_idle);
        let evicted = before - self.connections.len();
        if evicted > 0 {
            debug!(target: REGISTRY_TARGET, evicted, "idle connections closed");
        }
        evicted
    }

    /// Returns true when a connection for `endpoint` is pooled.
    #[must_use]
    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.connections.contains_key(&endpoint.normalised_key())
    }

    /// Number of pooled connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true when no connection is pooled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Closes every pooled connection and releases the factory.
    pub fn shutdown(mut self) {
        let closed = self.connections.len();
        self.connections.clear();
        info!(target: REGISTRY_TARGET, closed, "connection registry shut down");
    }

    #[cfg(test)]
    pub(crate) const fn factory(&self) -> &F {
        &self.factory
    }
}
