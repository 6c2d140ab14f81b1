use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Identity of the backend worker a request should run on, or did run on.
///
/// The bytes are opaque: the server assigns them and only ever expects to see
/// them echoed back. A missing worker frame is an ordinary outcome, so it is
/// modelled as [`WorkerAffinity::Absent`] rather than as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum WorkerAffinity {
    /// Route to the worker identified by these bytes.
    Present(Vec<u8>),
    /// Any available worker may serve the request.
    #[default]
    Absent,
}

impl WorkerAffinity {
    /// Builds an affinity from an optional trailing frame.
    #[must_use]
    pub fn from_frame(frame: Option<Vec<u8>>) -> Self {
        frame.map_or(Self::Absent, Self::Present)
    }

    /// Raw worker identity, when present.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Present(bytes) => Some(bytes.as_slice()),
            Self::Absent => None,
        }
    }

    /// Returns true when a worker identity is attached.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Lowercase hex rendering of the identity, when present.
    #[must_use]
    pub fn to_hex(&self) -> Option<String> {
        self.as_bytes().map(hex::encode)
    }
}

impl fmt::Display for WorkerAffinity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present(bytes) => formatter.write_str(&hex::encode(bytes)),
            Self::Absent => formatter.write_str("any"),
        }
    }
}

impl FromStr for WorkerAffinity {
    type Err = WorkerAffinityParseError;

    /// Parses a hex-encoded worker identity; `any` and the empty string mean
    /// [`WorkerAffinity::Absent`].
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("any") {
            return Ok(Self::Absent);
        }
        hex::decode(trimmed)
            .map(Self::Present)
            .map_err(|source| WorkerAffinityParseError {
                input: trimmed.to_owned(),
                source,
            })
    }
}

/// Error raised when a worker identity is not valid hex.
#[derive(Debug, Error)]
#[error("worker address '{input}' is not valid hex: {source}")]
pub struct WorkerAffinityParseError {
    /// Text that failed to decode.
    pub input: String,
    /// Underlying decoding failure.
    #[source]
    pub source: hex::FromHexError,
}
