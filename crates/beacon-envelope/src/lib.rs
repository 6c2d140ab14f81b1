//! Wire envelopes exchanged with the worker server.
//!
//! A request travels as a multipart message of `[envelope JSON, optional
//! worker affinity bytes, command name]`. The command name is repeated
//! outside the envelope so intermediaries can route or log it without
//! decoding JSON. Replies arrive as `[routing frame, payload JSON, optional
//! worker affinity bytes]`; this crate models the JSON parts and the affinity
//! frame, leaving framing to the transport.

mod affinity;
mod request;
mod response;

pub use affinity::{WorkerAffinity, WorkerAffinityParseError};
pub use request::Request;
pub use response::Response;
