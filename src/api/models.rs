use serde::{Deserialize, Serialize};

/// Error body returned by the proxy on any failure: `{ "error": string }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
