//! Test support for the client crate.
//!
//! Provides a scripted socket factory whose sockets replay canned poll
//! outcomes and record every interaction, a `mockall` socket for call-count
//! assertions, and a static configuration loader for driving the CLI runtime.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use beacon_config::Config;
use mockall::mock;

use crate::config::ConfigLoader;
use crate::errors::AppError;
use crate::protocol::Cancellation;
use crate::transport::{FrameSocket, PollOutcome, SocketFactory, TransportError};

/// What a scripted socket does on its next poll.
#[derive(Debug, Clone)]
pub(super) enum Step {
    /// Time out without a reply.
    Silent,
    /// Report an interrupted wait.
    Interrupt,
    /// Become readable with these frames.
    Reply(Vec<Vec<u8>>),
}

impl Step {
    /// Reply with a routing frame, `payload`, and an optional worker frame.
    pub(super) fn reply(payload: &str, worker: Option<&[u8]>) -> Self {
        let mut frames = vec![b"router".to_vec(), payload.as_bytes().to_vec()];
        frames.extend(worker.map(<[u8]>::to_vec));
        Self::Reply(frames)
    }
}

/// Interactions recorded across every socket a factory created.
#[derive(Debug, Clone, Default)]
pub(super) struct SocketLog {
    pub(super) created: usize,
    pub(super) connects: Vec<String>,
    pub(super) sent: Vec<Vec<Vec<u8>>>,
    pub(super) polls: Vec<Duration>,
    pub(super) try_recv_calls: usize,
    pub(super) drains: usize,
}

#[derive(Debug, Default)]
struct Shared {
    script: VecDeque<Step>,
    log: SocketLog,
    cancel_after_polls: Option<(usize, Cancellation)>,
    fail_create: bool,
    poll_delay: Duration,
}

/// Factory handing out [`ScriptedSocket`]s that share one script and log.
///
/// Clones observe the same state, so a test can keep a handle after moving
/// the factory into a client.
#[derive(Debug, Clone, Default)]
pub(super) struct ScriptedFactory {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedFactory {
    pub(super) fn with_script(steps: impl IntoIterator<Item = Step>) -> Self {
        let factory = Self::default();
        factory.lock().script.extend(steps);
        factory
    }

    pub(super) fn push(&self, step: Step) {
        self.lock().script.push_back(step);
    }

    /// Requests cancellation once `polls` polls have been recorded.
    pub(super) fn cancel_after_polls(&self, polls: usize, cancellation: Cancellation) {
        self.lock().cancel_after_polls = Some((polls, cancellation));
    }

    /// Makes every poll block for `delay` before reporting its outcome.
    pub(super) fn delay_polls(&self, delay: Duration) {
        self.lock().poll_delay = delay;
    }

    pub(super) fn fail_creation(&self) {
        self.lock().fail_create = true;
    }

    /// Snapshot of the interactions recorded so far.
    pub(super) fn log(&self) -> SocketLog {
        self.lock().log.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().expect("scripted socket state poisoned")
    }
}

impl SocketFactory for ScriptedFactory {
    type Socket = ScriptedSocket;

    fn create(&mut self) -> Result<ScriptedSocket, TransportError> {
        let mut shared = self.lock();
        if shared.fail_create {
            return Err(TransportError::Create(String::from("scripted failure")));
        }
        shared.log.created += 1;
        Ok(ScriptedSocket {
            shared: Arc::clone(&self.shared),
            current: VecDeque::new(),
        })
    }
}

/// Socket replaying the factory's script.
#[derive(Debug)]
pub(super) struct ScriptedSocket {
    shared: Arc<Mutex<Shared>>,
    current: VecDeque<Vec<u8>>,
}

impl ScriptedSocket {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().expect("scripted socket state poisoned")
    }
}

impl FrameSocket for ScriptedSocket {
    fn connect(&mut self, uri: &str) -> Result<(), TransportError> {
        self.lock().log.connects.push(uri.to_owned());
        Ok(())
    }

    fn send_frames(&mut self, frames: &[Vec<u8>]) -> Result<(), TransportError> {
        self.lock().log.sent.push(frames.to_vec());
        Ok(())
    }

    fn poll_readable(&mut self, timeout: Duration) -> PollOutcome {
        self.current.clear();
        let (step, delay) = {
            let mut shared = self.lock();
            shared.log.polls.push(timeout);
            let polls = shared.log.polls.len();
            if let Some((after, cancellation)) = &shared.cancel_after_polls {
                if polls >= *after {
                    cancellation.cancel();
                }
            }
            let step = shared.script.pop_front().unwrap_or(Step::Silent);
            (step, shared.poll_delay)
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        match step {
            Step::Silent => PollOutcome::TimedOut,
            Step::Interrupt => PollOutcome::Interrupted,
            Step::Reply(frames) => {
                self.current = frames.into();
                PollOutcome::Readable
            }
        }
    }

    fn recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.current.pop_front())
    }

    fn try_recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.lock().log.try_recv_calls += 1;
        Ok(self.current.pop_front())
    }

    fn discard_pending(&mut self) -> Result<(), TransportError> {
        self.current.clear();
        Ok(())
    }

    fn drain_stale(&mut self) -> Result<usize, TransportError> {
        self.current.clear();
        self.lock().log.drains += 1;
        Ok(0)
    }
}

mock! {
    pub Socket {}

    impl FrameSocket for Socket {
        fn connect(&mut self, uri: &str) -> Result<(), TransportError>;
        fn send_frames(&mut self, frames: &[Vec<u8>]) -> Result<(), TransportError>;
        fn poll_readable(&mut self, timeout: Duration) -> PollOutcome;
        fn recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
        fn try_recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
        fn discard_pending(&mut self) -> Result<(), TransportError>;
        fn drain_stale(&mut self) -> Result<usize, TransportError>;
    }
}

/// Factory that hands out one prepared mock socket.
pub(super) struct OneShotFactory(pub(super) Option<MockSocket>);

impl SocketFactory for OneShotFactory {
    type Socket = MockSocket;

    fn create(&mut self) -> Result<MockSocket, TransportError> {
        self.0
            .take()
            .ok_or_else(|| TransportError::Create(String::from("mock socket already used")))
    }
}

pub(super) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(super) const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

pub(super) fn os_args(command: &str) -> Vec<OsString> {
    std::iter::once("beacon")
        .chain(command.split_whitespace())
        .map(OsString::from)
        .collect()
}
