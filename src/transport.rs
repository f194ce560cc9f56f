//! Blocking transport seam between the session and the model server.

use std::fmt;
use std::sync::atomic::Ordering;

use ollama_api::{ApiRequest, LineStream, OllamaApiClient, OllamaApiConfig};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::error::TransportError;

/// Raised to abort the request or stream it was handed to.
pub type CancelSignal = ollama_api::CancellationSignal;

/// Finite, single-pass sequence of raw NDJSON lines from one response.
pub type Lines = Box<dyn Iterator<Item = Result<Vec<u8>, TransportError>> + Send>;

pub fn new_cancel_signal() -> CancelSignal {
    CancelSignal::default()
}

pub fn is_cancel_raised(cancel: &CancelSignal) -> bool {
    cancel.load(Ordering::Acquire)
}

pub trait Transport: Send + Sync {
    /// Perform a buffered request and return the whole response body.
    fn fetch(&self, request: &ApiRequest) -> Result<Vec<u8>, TransportError>;

    /// Open a streaming request. A non-2xx status fails here, before any line.
    fn stream(&self, request: &ApiRequest, cancel: &CancelSignal) -> Result<Lines, TransportError>;
}

/// [`Transport`] over HTTP, driving the async client on a private runtime per
/// request so callers stay synchronous.
pub struct HttpTransport {
    client: OllamaApiClient,
}

impl HttpTransport {
    pub fn new(config: OllamaApiConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: OllamaApiClient::new(config)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.client.base_url())
            .finish_non_exhaustive()
    }
}

fn request_runtime() -> Result<Runtime, TransportError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| TransportError::Unknown(format!("failed to initialize tokio runtime: {error}")))
}

impl Transport for HttpTransport {
    fn fetch(&self, request: &ApiRequest) -> Result<Vec<u8>, TransportError> {
        let runtime = request_runtime()?;
        runtime.block_on(self.client.fetch(request, None))
    }

    fn stream(&self, request: &ApiRequest, cancel: &CancelSignal) -> Result<Lines, TransportError> {
        let runtime = request_runtime()?;
        let lines = runtime.block_on(self.client.open_stream(request, Some(cancel)))?;
        debug!(context = %request.context(), "blocking line stream ready");
        Ok(Box::new(BlockingLines { lines, runtime }))
    }
}

/// Pulls one line at a time from a [`LineStream`] on the runtime that opened it.
struct BlockingLines {
    // Dropped before the runtime it is bound to.
    lines: LineStream,
    runtime: Runtime,
}

impl Iterator for BlockingLines {
    type Item = Result<Vec<u8>, TransportError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.lines.next_line())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn invalid_base_url_fails_construction() {
        let error = HttpTransport::new(OllamaApiConfig::new("ftp://models.local"))
            .expect_err("ftp is not a supported scheme");
        assert!(matches!(error, TransportError::InvalidBaseUrl(_)));
    }

    #[test]
    fn blank_base_url_uses_local_default() {
        let transport = HttpTransport::new(OllamaApiConfig::new("   ")).expect("default url");
        assert_eq!(transport.base_url(), "http://localhost:11434");
    }

    #[test]
    fn raised_signal_fails_stream_before_connecting() {
        // Checked before the connect attempt is first polled.
        let transport = HttpTransport::new(
            OllamaApiConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(2)),
        )
        .expect("transport");
        let cancel = new_cancel_signal();
        cancel.store(true, Ordering::Release);

        let request = ollama_api::list_models_request();
        let error = match transport.stream(&request, &cancel) {
            Ok(_) => panic!("stream should not open once cancelled"),
            Err(error) => error,
        };
        assert!(error.is_cancelled());
    }
}
