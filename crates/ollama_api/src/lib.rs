//! Transport and protocol primitives for Ollama-compatible model servers.
//!
//! This crate owns request encoding, NDJSON stream framing, line decoding and
//! HTTP transport for the `/api/chat` and `/api/tags` endpoints. It holds no
//! conversation state and has no display coupling.
//!
//! Decoding is deliberately lenient: a streamed line that is not valid JSON
//! decodes to `None` instead of failing the stream.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod ndjson;
pub mod payload;
pub mod url;

pub use client::{CancellationSignal, LineStream, OllamaApiClient};
pub use config::OllamaApiConfig;
pub use error::OllamaApiError;
pub use events::{decode_line, decode_models_response, StreamEvent};
pub use ndjson::LineSplitter;
pub use payload::{
    chat_request, encode_chat_request, list_models_request, ApiRequest, ChatMessage, ChatRequest,
    Method, Role, CHAT_PATH, TAGS_PATH,
};
pub use url::{endpoint_url, normalize_base_url, DEFAULT_BASE_URL};
