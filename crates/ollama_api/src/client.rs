use std::collections::VecDeque;
use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use tracing::debug;

use crate::config::OllamaApiConfig;
use crate::error::{parse_error_message, OllamaApiError};
use crate::events::decode_models_response;
use crate::headers::build_headers;
use crate::ndjson::LineSplitter;
use crate::payload::{list_models_request, ApiRequest, Method};
use crate::url::{endpoint_url, normalize_base_url};

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct OllamaApiClient {
    http: Client,
    config: OllamaApiConfig,
    base_url: String,
}

impl OllamaApiClient {
    pub fn new(config: OllamaApiConfig) -> Result<Self, OllamaApiError> {
        let base_url = normalize_base_url(&config.base_url)?;
        // Streams may be driven from short-lived runtimes; a pooled
        // connection must never outlive the runtime that opened it.
        let http = Client::builder()
            .connect_timeout(config.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(OllamaApiError::Request)?;
        Ok(Self {
            http,
            config,
            base_url,
        })
    }

    pub fn config(&self) -> &OllamaApiConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        endpoint_url(&self.base_url, path)
    }

    pub fn build_headers(&self, request: &ApiRequest) -> Result<HeaderMap, OllamaApiError> {
        let mut out = HeaderMap::new();
        for (key, value) in build_headers(&self.config, request) {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    OllamaApiError::Unknown(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(&value).map_err(|_| {
                    OllamaApiError::Unknown(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ApiRequest,
    ) -> Result<reqwest::RequestBuilder, OllamaApiError> {
        let url = self.endpoint(&request.path);
        let builder = match request.method {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
        };
        let builder = builder.headers(self.build_headers(request)?);
        Ok(match &request.body {
            Some(body) => builder.body(body.clone()),
            None => builder,
        })
    }

    /// Send a request and return the response once its status is known to be 2xx.
    async fn send(
        &self,
        request: &ApiRequest,
        builder: reqwest::RequestBuilder,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, OllamaApiError> {
        let endpoint = self.endpoint(&request.path);
        let response = self
            .bounded(&endpoint, builder.send(), cancellation)
            .await?
            .map_err(|error| OllamaApiError::from_request(&endpoint, error))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = self
            .bounded(&endpoint, response.text(), cancellation)
            .await?
            .unwrap_or_default();
        Err(OllamaApiError::Status {
            status,
            context: request.context(),
            message: parse_error_message(status, &body),
        })
    }

    /// Await `future` for at most the configured timeout.
    async fn bounded<F>(
        &self,
        endpoint: &str,
        future: F,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<F::Output, OllamaApiError>
    where
        F: Future,
    {
        let limited = tokio::time::timeout(self.config.timeout, future);
        await_or_cancel(limited, cancellation)
            .await?
            .map_err(|_| OllamaApiError::Timeout {
                endpoint: endpoint.to_string(),
            })
    }

    /// Perform a buffered request and return the whole body.
    pub async fn fetch(
        &self,
        request: &ApiRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Vec<u8>, OllamaApiError> {
        let builder = self.build_request(request)?.timeout(self.config.timeout);
        let response = self.send(request, builder, cancellation).await?;
        let endpoint = self.endpoint(&request.path);
        let body = await_or_cancel(response.bytes(), cancellation)
            .await?
            .map_err(|error| OllamaApiError::from_request(&endpoint, error))?;
        Ok(body.to_vec())
    }

    /// Open a streaming request and expose its body as NDJSON lines.
    ///
    /// A non-2xx status fails here, before any line is produced.
    pub async fn open_stream(
        &self,
        request: &ApiRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<LineStream, OllamaApiError> {
        let builder = self.build_request(request)?;
        let response = self.send(request, builder, cancellation).await?;
        debug!(
            endpoint = %self.endpoint(&request.path),
            status = %response.status(),
            "stream opened"
        );

        Ok(LineStream {
            endpoint: self.endpoint(&request.path),
            bytes: response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .boxed(),
            splitter: LineSplitter::default(),
            pending: VecDeque::new(),
            idle_timeout: self.config.timeout,
            cancellation: cancellation.cloned(),
            finished: false,
        })
    }

    pub async fn list_models(&self) -> Result<Vec<String>, OllamaApiError> {
        let body = self.fetch(&list_models_request(), None).await?;
        decode_models_response(&body)
    }
}

/// Lazy, single-pass sequence of lines from one streamed response.
pub struct LineStream {
    endpoint: String,
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    splitter: LineSplitter,
    pending: VecDeque<Vec<u8>>,
    idle_timeout: Duration,
    cancellation: Option<CancellationSignal>,
    finished: bool,
}

impl LineStream {
    /// Pull the next line, waiting on the connection when none is buffered.
    ///
    /// Returns `None` once the server has closed the connection and every
    /// buffered line was handed out. After an error the stream is exhausted.
    pub async fn next_line(&mut self) -> Option<Result<Vec<u8>, OllamaApiError>> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(Ok(line));
            }
            if self.finished {
                return None;
            }

            match self.next_chunk().await {
                Ok(Some(chunk)) => self.pending.extend(self.splitter.feed(&chunk)),
                Ok(None) => {
                    self.finished = true;
                    self.pending.extend(self.splitter.finish());
                }
                Err(error) => {
                    self.finished = true;
                    self.pending.clear();
                    return Some(Err(error));
                }
            }
        }
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, OllamaApiError> {
        let idle_timeout = self.idle_timeout;
        let next = tokio::time::timeout(idle_timeout, self.bytes.next());
        let chunk = match await_or_cancel(next, self.cancellation.as_ref()).await? {
            Ok(chunk) => chunk,
            Err(_) => {
                return Err(OllamaApiError::Timeout {
                    endpoint: self.endpoint.clone(),
                })
            }
        };

        match chunk {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(error)) => Err(OllamaApiError::from_request(&self.endpoint, error)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for LineStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineStream")
            .field("endpoint", &self.endpoint)
            .field("pending", &self.pending.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, OllamaApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(OllamaApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(OllamaApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
