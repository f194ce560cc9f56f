use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OllamaApiError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("model server unreachable at {endpoint}: {message}")]
    Unreachable { endpoint: String, message: String },

    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("HTTP {status} from {context}: {message}")]
    Status {
        status: StatusCode,
        context: String,
        message: String,
    },

    #[error("request error")]
    Request(#[source] reqwest::Error),

    #[error("serialization error")]
    Serde(#[from] serde_json::Error),

    #[error("malformed response from {context}: {message}")]
    Decode { context: String, message: String },

    #[error("stream failed: {message}")]
    StreamFailed { message: String },

    #[error("request was cancelled")]
    Cancelled,

    #[error("{0}")]
    Unknown(String),
}

impl OllamaApiError {
    /// Classify a `reqwest` failure against the endpoint it was aimed at.
    pub fn from_request(endpoint: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else if error.is_connect() {
            Self::Unreachable {
                endpoint: endpoint.to_string(),
                message: root_cause_message(&error),
            }
        } else {
            Self::Request(error)
        }
    }

    /// HTTP status for `Status` errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<String>,
}

/// Extract a readable message from a non-2xx response body.
///
/// Ollama reports failures as `{"error": "..."}`; anything else falls back to
/// the raw body, then to the canonical status reason.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(ErrorPayload {
        error: Some(message),
    }) = serde_json::from_str::<ErrorPayload>(body)
    {
        if !message.trim().is_empty() {
            return message.trim().to_string();
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

fn root_cause_message(error: &(dyn std::error::Error + 'static)) -> String {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_field_is_preferred_message() {
        let message = parse_error_message(
            StatusCode::NOT_FOUND,
            r#"{"error":"model 'llama9' not found, try pulling it first"}"#,
        );
        assert_eq!(message, "model 'llama9' not found, try pulling it first");
    }

    #[test]
    fn raw_body_is_used_when_not_an_error_payload() {
        let message = parse_error_message(StatusCode::BAD_GATEWAY, "upstream exploded\n");
        assert_eq!(message, "upstream exploded");
    }

    #[test]
    fn empty_body_falls_back_to_canonical_reason() {
        let message = parse_error_message(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(message, "Service Unavailable");
    }

    #[test]
    fn status_display_names_context() {
        let error = OllamaApiError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            context: "POST /api/chat".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "HTTP 500 Internal Server Error from POST /api/chat: boom"
        );
        assert_eq!(error.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
