use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by the transport or protocol layer.
pub type TransportError = ollama_api::OllamaApiError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a reply is still streaming")]
    Busy,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("invalid model name: {0:?}")]
    InvalidModel(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error while reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

impl ConfigError {
    #[must_use]
    pub fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("renderer is not streaming a turn")]
    NotStreaming,
}
