//! Frame-level socket seam and its ZeroMQ implementation.
//!
//! The protocol only needs a handful of operations from the messaging
//! library: connect, send a multipart message, wait for readability, and read
//! reply frames one at a time. [`FrameSocket`] captures exactly that so the
//! retry logic can be exercised against scripted sockets, while
//! [`ZmqSocketFactory`] supplies `DEALER` sockets for real use.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Result of waiting for a socket to become readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A reply is waiting to be read.
    Readable,
    /// Nothing arrived within the timeout.
    TimedOut,
    /// The wait was broken off by the transport (signal, terminated context).
    Interrupted,
}

/// Errors raised by socket operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport could not allocate a socket.
    #[error("failed to create socket: {0}")]
    Create(String),
    /// Connecting to the endpoint failed.
    #[error("failed to connect to {uri}: {message}")]
    Connect {
        /// URI passed to the transport.
        uri: String,
        /// Transport diagnostic.
        message: String,
    },
    /// Queueing the request frames failed.
    #[error("failed to send request frames: {0}")]
    Send(String),
    /// Reading a reply frame failed.
    #[error("failed to receive reply frame: {0}")]
    Receive(String),
}

/// Client-side socket carrying multipart messages.
///
/// Reply frames are read one at a time. [`FrameSocket::recv_frame`] returns
/// `None` once the message being read has no further frame, so a short reply
/// can be detected without blocking on the next message.
pub trait FrameSocket {
    /// Connects the socket to `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] when the URI is rejected.
    fn connect(&mut self, uri: &str) -> Result<(), TransportError>;

    /// Queues a multipart message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Send`] when the message cannot be queued.
    fn send_frames(&mut self, frames: &[Vec<u8>]) -> Result<(), TransportError>;

    /// Waits up to `timeout` for a reply. Any unread remainder of the previous
    /// reply is discarded first, so reading always starts on a message
    /// boundary.
    fn poll_readable(&mut self, timeout: Duration) -> PollOutcome;

    /// Reads the next frame of the current reply.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Receive`] when the read fails.
    fn recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Reads the next frame of the current reply without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Receive`] when the read fails for any reason
    /// other than no frame being available.
    fn try_recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Drops the unread remainder of the current reply.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Receive`] when draining fails.
    fn discard_pending(&mut self) -> Result<(), TransportError>;

    /// Drops every reply already queued on the socket, returning how many
    /// messages were discarded. Used before a new call so replies to requests
    /// that were abandoned by an earlier call cannot be mistaken for the new
    /// reply.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Receive`] when draining fails.
    fn drain_stale(&mut self) -> Result<usize, TransportError>;
}

/// Allocates sockets for the connection registry.
pub trait SocketFactory {
    /// Socket type handed to the registry.
    type Socket: FrameSocket;

    /// Allocates a new, unconnected socket.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Create`] when allocation fails.
    fn create(&mut self) -> Result<Self::Socket, TransportError>;
}

/// Builds ZeroMQ `DEALER` sockets sharing one context.
pub struct ZmqSocketFactory {
    context: zmq::Context,
}

impl ZmqSocketFactory {
    /// Creates a factory with a fresh ZeroMQ context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: zmq::Context::new(),
        }
    }
}

impl Default for ZmqSocketFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketFactory for ZmqSocketFactory {
    type Socket = ZmqDealer;

    fn create(&mut self) -> Result<ZmqDealer, TransportError> {
        let socket = self
            .context
            .socket(zmq::DEALER)
            .map_err(|error| TransportError::Create(error.to_string()))?;
        // Closing a socket must never wait on undelivered requests.
        socket
            .set_linger(0)
            .map_err(|error| TransportError::Create(error.to_string()))?;
        Ok(ZmqDealer {
            socket,
            reading: ReadState::Idle,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    /// No reply is being read.
    Idle,
    /// More frames of the current reply are pending.
    Partial,
    /// The current reply has been fully read.
    Finished,
}

/// ZeroMQ `DEALER` socket implementing [`FrameSocket`].
pub struct ZmqDealer {
    socket: zmq::Socket,
    reading: ReadState,
}

impl ZmqDealer {
    fn receive(&mut self, flags: i32) -> Result<Option<Vec<u8>>, TransportError> {
        match self.socket.recv_bytes(flags) {
            Ok(frame) => {
                let more = self
                    .socket
                    .get_rcvmore()
                    .map_err(|error| TransportError::Receive(error.to_string()))?;
                self.reading = if more {
                    ReadState::Partial
                } else {
                    ReadState::Finished
                };
                Ok(Some(frame))
            }
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(error) => Err(TransportError::Receive(error.to_string())),
        }
    }
}

impl FrameSocket for ZmqDealer {
    fn connect(&mut self, uri: &str) -> Result<(), TransportError> {
        self.socket
            .connect(uri)
            .map_err(|error| TransportError::Connect {
                uri: uri.to_owned(),
                message: error.to_string(),
            })
    }

    fn send_frames(&mut self, frames: &[Vec<u8>]) -> Result<(), TransportError> {
        self.socket
            .send_multipart(frames.iter().map(Vec::as_slice), zmq::DONTWAIT)
            .map_err(|error| TransportError::Send(error.to_string()))
    }

    fn poll_readable(&mut self, timeout: Duration) -> PollOutcome {
        if let Err(error) = self.discard_pending() {
            debug!(target: TRANSPORT_TARGET, %error, "failed to discard unread reply frames");
            return PollOutcome::Interrupted;
        }
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        let mut items = [self.socket.as_poll_item(zmq::POLLIN)];
        match zmq::poll(&mut items, timeout_ms) {
            Ok(_) if items.iter().any(zmq::PollItem::is_readable) => PollOutcome::Readable,
            Ok(_) => PollOutcome::TimedOut,
            Err(error) => {
                debug!(target: TRANSPORT_TARGET, %error, "socket poll interrupted");
                PollOutcome::Interrupted
            }
        }
    }

    fn recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.reading == ReadState::Finished {
            return Ok(None);
        }
        self.receive(0)
    }

    fn try_recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.reading == ReadState::Finished {
            return Ok(None);
        }
        self.receive(zmq::DONTWAIT)
    }

    fn discard_pending(&mut self) -> Result<(), TransportError> {
        while self.reading == ReadState::Partial {
            self.receive(0)?;
        }
        self.reading = ReadState::Idle;
        Ok(())
    }

    fn drain_stale(&mut self) -> Result<usize, TransportError> {
        self.discard_pending()?;
        let mut discarded = 0;
        while self.receive(zmq::DONTWAIT)?.is_some() {
            self.discard_pending()?;
            discarded += 1;
        }
        self.reading = ReadState::Idle;
        if discarded > 0 {
            debug!(target: TRANSPORT_TARGET, discarded, "dropped stale replies");
        }
        Ok(discarded)
    }
}
