// Gateway error types and HTTP mappings

use serde::Deserialize;
use thiserror::Error;

// Gateway REST error envelope: { error: { code, message } }
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayErrorEnvelope {
    pub error: GatewayErrorDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Transient network/server condition; the request may succeed later.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    /// The gateway rejected the request as malformed or unpayable.
    /// The message is the gateway's own, surfaced verbatim.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Whether polling may reasonably continue after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

/// Map an HTTP error response to a `GatewayError`. 5xx and 429 are
/// transient; any other client error is a definitive rejection carrying
/// the gateway's message verbatim when the envelope parses.
pub fn map_http_error(status: u16, body: &str) -> GatewayError {
    let message = serde_json::from_str::<GatewayErrorEnvelope>(body)
        .ok()
        .and_then(|env| env.error.message)
        .unwrap_or_else(|| format!("status={} body={}", status, body));

    if (500..600).contains(&status) || status == 429 {
        GatewayError::Unavailable(message)
    } else {
        GatewayError::InvalidRequest(message)
    }
}
