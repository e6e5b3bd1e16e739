//! Response and error envelope shapes for the Instagram Graph API.

use serde::Deserialize;

/// The Graph API returns `{"id": "..."}` for most create operations.
#[derive(Debug, Clone, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

/// Send API responses carry the message id under a different key.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message_id: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
}

/// Error envelope: `{"error": {"message": ..., "code": ..., ...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: GraphError,
}

/// The error object the Graph API nests inside failed responses.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphError {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub error_subcode: Option<i64>,
}
