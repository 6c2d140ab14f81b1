//! Network endpoint of a worker server.
//!
//! Endpoints are written as `tcp://host:port` (the scheme may be omitted).
//! Connection reuse compares endpoints by their normalised key, which treats
//! `localhost` and `127.0.0.1` as the same host.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const TCP_SCHEME: &str = "tcp";
const LOOPBACK_NAME: &str = "localhost";
const LOOPBACK_ADDRESS: &str = "127.0.0.1";

/// Host and port of a worker server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "EndpointRepr", into = "String")]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Builds an endpoint from its parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host exactly as configured.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Host with `localhost` mapped onto the loopback address.
    #[must_use]
    pub fn normalised_host(&self) -> &str {
        if self.host.eq_ignore_ascii_case(LOOPBACK_NAME) {
            LOOPBACK_ADDRESS
        } else {
            &self.host
        }
    }

    /// Key under which connections to this endpoint are pooled.
    #[must_use]
    pub fn normalised_key(&self) -> String {
        format!("{TCP_SCHEME}://{}:{}", self.normalised_host(), self.port)
    }

    /// URI handed to the transport when connecting.
    #[must_use]
    pub fn connect_uri(&self) -> String {
        self.normalised_key()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{TCP_SCHEME}://{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(EndpointParseError::Empty);
        }
        let url = if trimmed.contains("://") {
            Url::parse(trimmed)?
        } else {
            Url::parse(&format!("{TCP_SCHEME}://{trimmed}"))?
        };
        if url.scheme() != TCP_SCHEME {
            return Err(EndpointParseError::UnsupportedScheme(
                url.scheme().to_owned(),
            ));
        }
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| EndpointParseError::MissingHost(input.to_owned()))?;
        let port = url
            .port()
            .ok_or_else(|| EndpointParseError::MissingPort(input.to_owned()))?;
        Ok(Self::new(host, port))
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

/// Accepted serialised forms: a URI string or a `{ host, port }` table.
#[derive(Deserialize)]
#[serde(untagged)]
enum EndpointRepr {
    Text(String),
    Table { host: String, port: u16 },
}

impl TryFrom<EndpointRepr> for Endpoint {
    type Error = EndpointParseError;

    fn try_from(repr: EndpointRepr) -> Result<Self, Self::Error> {
        match repr {
            EndpointRepr::Text(text) => text.parse(),
            EndpointRepr::Table { host, port } if host.trim().is_empty() => {
                Err(EndpointParseError::MissingHost(format!(":{port}")))
            }
            EndpointRepr::Table { host, port } => Ok(Self::new(host, port)),
        }
    }
}

/// Errors encountered while parsing an [`Endpoint`] from text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// The endpoint text was blank.
    #[error("endpoint must not be empty")]
    Empty,
    /// Scheme was not `tcp`.
    #[error("unsupported endpoint scheme '{0}'")]
    UnsupportedScheme(String),
    /// Host name was missing.
    #[error("missing host in '{0}'")]
    MissingHost(String),
    /// Port was missing.
    #[error("missing port in '{0}'")]
    MissingPort(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}
