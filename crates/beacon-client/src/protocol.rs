//! Reliable request-reply over a pooled socket.
//!
//! Each call sends the request, waits a bounded time for the reply, and
//! re-sends on silence until the retry budget runs out. A silent peer is
//! retried; a broken channel is not, because it can never produce input
//! again. Cancellation is cooperative and observed before every attempt.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use beacon_config::{DEFAULT_REQUEST_RETRIES, DEFAULT_REQUEST_TIMEOUT_MS, Endpoint};
use beacon_envelope::{Request, Response, WorkerAffinity};
use tracing::{debug, warn};

use crate::errors::{ClientError, ReplyFrame, Unreachable, UnreachableCause};
use crate::registry::Connection;
use crate::transport::{FrameSocket, PollOutcome};

const PROTOCOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::protocol");

/// Per-call timing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// How long each attempt waits for a reply.
    pub timeout: Duration,
    /// Re-sends allowed after the first attempt.
    pub retries: u32,
}

impl SendOptions {
    /// Builds options from explicit values.
    #[must_use]
    pub const fn new(timeout: Duration, retries: u32) -> Self {
        Self { timeout, retries }
    }

    /// Uses `timeout` with the default retry budget.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, DEFAULT_REQUEST_RETRIES)
    }
}

impl Default for SendOptions {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            DEFAULT_REQUEST_RETRIES,
        )
    }
}

/// Cooperative cancellation flag shared with signal handlers or other
/// threads.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    /// Creates a flag in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; the next attempt boundary observes it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clears a previous cancellation request.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Shared flag, suitable for `signal_hook::flag::register`.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// What the protocol does after waiting for a reply.
#[derive(Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Read and decode the reply.
    ReadReply,
    /// Spend one unit of the retry budget and send again.
    Retry,
    /// Give up without retrying.
    FailFast,
}

/// Maps each poll outcome to the protocol's response.
///
/// | Outcome       | Verdict    |
/// |---------------|------------|
/// | `Readable`    | read reply |
/// | `TimedOut`    | retry      |
/// | `Interrupted` | fail fast  |
#[must_use]
pub const fn poll_policy(outcome: PollOutcome) -> Verdict {
    match outcome {
        PollOutcome::Readable => Verdict::ReadReply,
        PollOutcome::TimedOut => Verdict::Retry,
        PollOutcome::Interrupted => Verdict::FailFast,
    }
}

/// Remaining re-sends; `None` once the budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RetryBudget(Option<u32>);

impl RetryBudget {
    const fn new(retries: u32) -> Self {
        Self(Some(retries))
    }

    const fn is_exhausted(self) -> bool {
        self.0.is_none()
    }

    const fn consume(self) -> Self {
        match self.0 {
            Some(0) | None => Self(None),
            Some(remaining) => Self(Some(remaining - 1)),
        }
    }
}

/// Sends `request` over `connection` and returns the correlated reply.
///
/// One attempt is made, followed by up to `options.retries` re-sends while
/// the peer stays silent. When the reply does not declare `noWorker`, a
/// trailing worker frame is read without blocking and attached as
/// [`Response::worker_address`].
///
/// Every attempt whose reply is not read stays counted in
/// [`Connection::unanswered`]; callers that reuse the connection must check
/// it, because the peer may still answer those attempts later.
///
/// # Errors
///
/// Returns [`ClientError::Unreachable`] when the budget runs out, the wait is
/// interrupted, the reply is short or malformed, or `cancellation` fires
/// before an attempt. Returns [`ClientError::Transport`] or
/// [`ClientError::EncodeRequest`] when the request cannot be sent at all.
pub fn send<S: FrameSocket>(
    connection: &mut Connection<S>,
    endpoint: &Endpoint,
    request: &Request,
    options: SendOptions,
    cancellation: &Cancellation,
) -> Result<Response, ClientError> {
    let frames = request.to_frames().map_err(ClientError::EncodeRequest)?;
    let transport_error = |source| ClientError::Transport {
        endpoint: endpoint.to_string(),
        source,
    };
    let unreachable = |attempts: u32, cause: UnreachableCause| {
        warn!(
            target: PROTOCOL_TARGET,
            endpoint = %endpoint,
            command = %request.command,
            attempts,
            %cause,
            "server unreachable"
        );
        ClientError::from(Unreachable {
            endpoint: endpoint.to_string(),
            attempts,
            cause,
        })
    };

    connection
        .socket_mut()
        .drain_stale()
        .map_err(transport_error)?;

    let mut budget = RetryBudget::new(options.retries);
    let mut attempts: u32 = 0;
    loop {
        if budget.is_exhausted() {
            return Err(unreachable(attempts, UnreachableCause::RetriesExhausted));
        }
        if cancellation.is_cancelled() {
            return Err(unreachable(attempts, UnreachableCause::Cancelled));
        }

        connection.ensure_bound(endpoint)?;
        attempts += 1;
        debug!(
            target: PROTOCOL_TARGET,
            endpoint = %endpoint,
            command = %request.command,
            attempt = attempts,
            remaining = ?budget.0,
            "sending request"
        );
        connection
            .socket_mut()
            .send_frames(&frames)
            .map_err(transport_error)?;
        connection.record_sent();

        match poll_policy(connection.socket_mut().poll_readable(options.timeout)) {
            Verdict::ReadReply => {
                let response = read_reply(connection.socket_mut())
                    .map_err(|cause| unreachable(attempts, cause))?;
                connection.record_answered();
                return Ok(response);
            }
            Verdict::Retry => {
                debug!(
                    target: PROTOCOL_TARGET,
                    endpoint = %endpoint,
                    attempt = attempts,
                    timeout = ?options.timeout,
                    "no reply before timeout"
                );
                budget = budget.consume();
            }
            Verdict::FailFast => {
                return Err(unreachable(attempts, UnreachableCause::Interrupted));
            }
        }
    }
}

fn read_reply<S: FrameSocket>(socket: &mut S) -> Result<Response, UnreachableCause> {
    let interrupted = |_| UnreachableCause::Interrupted;
    socket
        .recv_frame()
        .map_err(interrupted)?
        .ok_or(UnreachableCause::MissingFrame {
            frame: ReplyFrame::Address,
        })?;
    let payload = socket
        .recv_frame()
        .map_err(interrupted)?
        .ok_or(UnreachableCause::MissingFrame {
            frame: ReplyFrame::Payload,
        })?;
    let mut response =
        Response::from_json(&payload).map_err(|source| UnreachableCause::MalformedReply { source })?;

    if !response.no_worker {
        let trailing = socket.try_recv_frame().map_err(interrupted)?;
        response.worker_address = WorkerAffinity::from_frame(trailing);
    }

    if let Err(error) = socket.discard_pending() {
        debug!(target: PROTOCOL_TARGET, %error, "failed to discard surplus reply frames");
    }
    Ok(response)
}
