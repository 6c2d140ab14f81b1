use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::WorkerAffinity;

/// Command envelope sent to the worker server.
///
/// The envelope is not tied to a connection; build a fresh one per call. The
/// worker affinity is carried as its own frame and is never part of the JSON.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Command name understood by the server, such as `ping` or `play`.
    pub command: String,
    /// Optional free-form body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Optional structured options; the shape is command specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    /// Worker the request is pinned to.
    #[serde(skip)]
    pub worker: WorkerAffinity,
}

impl Request {
    /// Builds a request for `command` with no body or options.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            body: None,
            options: None,
            worker: WorkerAffinity::Absent,
        }
    }

    /// Attaches body text.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attaches structured options.
    #[must_use]
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    /// Pins the request to a worker, typically one returned by an earlier
    /// response in the same session.
    #[must_use]
    pub fn with_worker(mut self, worker: WorkerAffinity) -> Self {
        self.worker = worker;
        self
    }

    /// Serialises the envelope to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when the options cannot be represented as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Builds the outbound multipart frames: envelope JSON, the worker
    /// identity when present, then the command name.
    ///
    /// # Errors
    ///
    /// Returns an error when the envelope cannot be serialised.
    pub fn to_frames(&self) -> Result<Vec<Vec<u8>>, serde_json::Error> {
        let mut frames = Vec::with_capacity(3);
        frames.push(self.to_json()?.into_bytes());
        if let Some(worker) = self.worker.as_bytes() {
            frames.push(worker.to_vec());
        }
        frames.push(self.command.clone().into_bytes());
        Ok(frames)
    }
}
