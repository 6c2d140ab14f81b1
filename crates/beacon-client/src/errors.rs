//! Error types for the client library and the CLI runtime.

use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::telemetry::TelemetryError;
use crate::transport::TransportError;

/// Reply frame the protocol expected but did not receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFrame {
    /// Routing frame that leads every reply.
    Address,
    /// JSON payload frame.
    Payload,
}

impl fmt::Display for ReplyFrame {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => formatter.write_str("address"),
            Self::Payload => formatter.write_str("payload"),
        }
    }
}

/// Why a server was declared unreachable.
#[derive(Debug, Error)]
pub enum UnreachableCause {
    /// The peer stayed silent for every attempt the retry budget allowed.
    #[error("server is down")]
    RetriesExhausted,
    /// The transport broke off the wait for a reply.
    #[error("connection interrupted")]
    Interrupted,
    /// A reply arrived without one of its mandatory frames.
    #[error("connection interrupted: reply had no {frame} frame")]
    MissingFrame {
        /// Frame that was missing.
        frame: ReplyFrame,
    },
    /// The payload frame was not a valid response envelope.
    #[error("connection interrupted: malformed reply: {source}")]
    MalformedReply {
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// Cancellation was requested before the next attempt.
    #[error("server is down (request cancelled)")]
    Cancelled,
}

impl UnreachableCause {
    /// Returns true when the channel itself is suspect and the connection
    /// should be recreated rather than reused.
    #[must_use]
    pub const fn is_channel_broken(&self) -> bool {
        matches!(
            self,
            Self::Interrupted | Self::MissingFrame { .. } | Self::MalformedReply { .. }
        )
    }
}

/// The server could not be reached within the allowed attempts.
#[derive(Debug, Error)]
#[error("{cause} ({endpoint}, {attempts} attempt(s))")]
pub struct Unreachable {
    /// Endpoint that was contacted.
    pub endpoint: String,
    /// Requests actually sent during the call.
    pub attempts: u32,
    /// Failure classification.
    pub cause: UnreachableCause,
}

/// Errors returned by [`crate::Client`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server did not produce a usable reply.
    #[error(transparent)]
    Unreachable(#[from] Unreachable),
    /// The socket for an endpoint could not be created, connected, or written.
    #[error("transport failure for {endpoint}: {source}")]
    Transport {
        /// Endpoint being contacted.
        endpoint: String,
        /// Underlying socket error.
        #[source]
        source: TransportError,
    },
    /// The request envelope could not be serialised.
    #[error("failed to serialise request: {0}")]
    EncodeRequest(#[source] serde_json::Error),
}

impl ClientError {
    /// Returns the unreachability details when the error is of that kind.
    #[must_use]
    pub const fn as_unreachable(&self) -> Option<&Unreachable> {
        match self {
            Self::Unreachable(error) => Some(error),
            Self::Transport { .. } | Self::EncodeRequest(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("request options must be valid JSON: {0}")]
    InvalidOptions(serde_json::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to install signal handlers: {0}")]
    SignalHandlers(io::Error),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("failed to serialise response: {0}")]
    SerialiseResponse(serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn malformed() -> UnreachableCause {
        let source = match serde_json::from_str::<serde_json::Value>("{") {
            Ok(value) => panic!("expected a decoding failure, got {value}"),
            Err(error) => error,
        };
        UnreachableCause::MalformedReply { source }
    }

    #[rstest]
    #[case::exhausted(UnreachableCause::RetriesExhausted, false)]
    #[case::cancelled(UnreachableCause::Cancelled, false)]
    #[case::interrupted(UnreachableCause::Interrupted, true)]
    #[case::missing_payload(
        UnreachableCause::MissingFrame { frame: ReplyFrame::Payload },
        true
    )]
    #[case::malformed(malformed(), true)]
    fn classifies_channel_breakage(#[case] cause: UnreachableCause, #[case] broken: bool) {
        assert_eq!(cause.is_channel_broken(), broken);
    }

    #[test]
    fn exhaustion_and_cancellation_both_report_server_down() {
        let exhausted = Unreachable {
            endpoint: String::from("tcp://127.0.0.1:27713"),
            attempts: 4,
            cause: UnreachableCause::RetriesExhausted,
        };
        let cancelled = Unreachable {
            endpoint: String::from("tcp://127.0.0.1:27713"),
            attempts: 1,
            cause: UnreachableCause::Cancelled,
        };
        assert!(exhausted.to_string().starts_with("server is down"));
        assert!(cancelled.to_string().starts_with("server is down"));
        assert_eq!(
            exhausted.to_string(),
            "server is down (tcp://127.0.0.1:27713, 4 attempt(s))"
        );
    }

    #[test]
    fn unreachable_is_exposed_through_client_error() {
        let error = ClientError::from(Unreachable {
            endpoint: String::from("tcp://127.0.0.1:1"),
            attempts: 1,
            cause: UnreachableCause::Interrupted,
        });
        let unreachable = error.as_unreachable().expect("unreachable error");
        assert!(unreachable.cause.is_channel_broken());
    }
}
