use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::WorkerAffinity;

/// Reply envelope decoded from the payload frame.
///
/// Fields the client does not interpret are kept in [`Response::extra`] so a
/// command dispatcher can read command-specific results.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Whether the server handled the command successfully.
    #[serde(default)]
    pub success: bool,
    /// Set when no backend worker was involved, for example on
    /// administrative replies. Such replies never carry a worker frame.
    #[serde(default)]
    pub no_worker: bool,
    /// Result text or error detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Remaining command-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Worker that served the request, read from the trailing frame.
    #[serde(skip)]
    pub worker_address: WorkerAffinity,
}

impl Response {
    /// Decodes a payload frame.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is not a JSON object matching the
    /// envelope.
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Renders the response as JSON, adding `workerAddress` as hex when a
    /// worker identity is attached.
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        let mut object = self.extra.clone();
        object.insert("success".to_owned(), Value::Bool(self.success));
        object.insert("noWorker".to_owned(), Value::Bool(self.no_worker));
        if let Some(body) = &self.body {
            object.insert("body".to_owned(), Value::String(body.clone()));
        }
        if let Some(address) = self.worker_address.to_hex() {
            object.insert("workerAddress".to_owned(), Value::String(address));
        }
        Value::Object(object)
    }
}
