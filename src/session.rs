//! Session controller: one conversation, one display surface, one reply
//! streaming at a time.

use std::error::Error as _;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ollama_api::{
    chat_request, decode_line, decode_models_response, encode_chat_request, list_models_request,
    ChatMessage, Role,
};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::display::{DisplaySurface, SurfaceId};
use crate::error::{SessionError, TransportError};
use crate::history::ConversationHistory;
use crate::lock_unpoisoned;
use crate::render::{split_display_lines, LineReplace, StreamingRenderer};
use crate::transport::{is_cancel_raised, new_cancel_signal, CancelSignal, HttpTransport, Transport};

/// How one call to [`Session::send`] ended.
#[derive(Debug)]
pub enum SendOutcome {
    /// The reply was rendered and appended to the history.
    Committed(String),
    /// The stream finished cleanly but carried no visible text.
    Empty,
    /// The turn was aborted; the error is also rendered on the surface.
    Failed(TransportError),
    /// Another reply is still streaming; nothing was sent.
    Busy,
    /// The input was blank after trimming.
    Skipped,
}

impl SendOutcome {
    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::Committed(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Model names offered by the server. Listing never fails outright; a failed
/// request leaves `models` empty and reports why in `error`.
#[derive(Debug, Default)]
pub struct ModelListing {
    pub models: Vec<String>,
    pub error: Option<TransportError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub model: String,
    pub history_len: usize,
    pub in_flight: bool,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model: {}; history_length: {}", self.model, self.history_len)
    }
}

struct SessionState {
    history: ConversationHistory,
    model: String,
}

pub struct Session {
    transport: Arc<dyn Transport>,
    display: Mutex<Box<dyn DisplaySurface>>,
    surface: SurfaceId,
    state: Mutex<SessionState>,
    in_flight: AtomicBool,
    active_cancel: Mutex<Option<CancelSignal>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("surface", &self.surface)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Holds the single-flight slot for one turn.
struct FlightGuard<'a> {
    session: &'a Session,
}

impl<'a> FlightGuard<'a> {
    fn acquire(session: &'a Session) -> Option<Self> {
        session
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { session })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        lock_unpoisoned(&self.session.active_cancel).take();
        self.session.in_flight.store(false, Ordering::Release);
    }
}

impl Session {
    /// Start a session that renders into `surface` on `display`.
    pub fn start(
        config: &SessionConfig,
        transport: Arc<dyn Transport>,
        display: impl DisplaySurface + 'static,
        surface: SurfaceId,
    ) -> Self {
        info!(model = %config.default_model, surface = surface.0, "session started");
        Self {
            transport,
            display: Mutex::new(Box::new(display)),
            surface,
            state: Mutex::new(SessionState {
                history: ConversationHistory::new(),
                model: config.default_model.clone(),
            }),
            in_flight: AtomicBool::new(false),
            active_cancel: Mutex::new(None),
        }
    }

    /// Start a session talking HTTP to the configured server.
    pub fn connect(
        config: &SessionConfig,
        display: impl DisplaySurface + 'static,
        surface: SurfaceId,
    ) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(config.api_config())?;
        debug!(base_url = transport.base_url(), "http transport ready");
        Ok(Self::start(config, Arc::new(transport), display, surface))
    }

    /// End the session and hand back its conversation.
    pub fn end(self) -> ConversationHistory {
        let state = match self.state.into_inner() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        info!(history_len = state.history.len(), "session ended");
        state.history
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Send one user message and stream the reply onto the display.
    pub fn send(&self, user_text: &str) -> SendOutcome {
        self.send_with_cancel(user_text, new_cancel_signal())
    }

    /// Like [`Session::send`], aborting the turn once `cancel` is raised.
    pub fn send_with_cancel(&self, user_text: &str, cancel: CancelSignal) -> SendOutcome {
        let text = user_text.trim();
        if text.is_empty() {
            debug!("blank input skipped");
            return SendOutcome::Skipped;
        }

        let Some(_flight) = FlightGuard::acquire(self) else {
            warn!("send rejected: a reply is still streaming");
            return SendOutcome::Busy;
        };
        *lock_unpoisoned(&self.active_cancel) = Some(Arc::clone(&cancel));

        let (messages, model) = {
            let mut state = lock_unpoisoned(&self.state);
            state.history.append(ChatMessage::user(text));
            (state.history.snapshot(), state.model.clone())
        };
        info!(model = %model, history_len = messages.len(), "turn started");

        let anchor = {
            let mut display = lock_unpoisoned(&self.display);
            display.append_lines(self.surface, &user_block(text, &local_clock_label()));
            display.append_lines(self.surface, &[format!("@{model}:")]);
            display.line_count(self.surface)
        };

        let mut renderer = StreamingRenderer::new();
        renderer.begin(anchor);

        let streamed = catch_unwind(AssertUnwindSafe(|| {
            self.stream_reply(&messages, &model, &cancel, &mut renderer)
        }))
        .unwrap_or_else(|_| Err(TransportError::Unknown("transport panicked".to_string())));

        let outcome = match streamed {
            Ok(()) => {
                let reply = renderer.end();
                if reply.trim().is_empty() {
                    info!(model = %model, "turn finished without reply");
                    SendOutcome::Empty
                } else {
                    lock_unpoisoned(&self.state)
                        .history
                        .append(ChatMessage::assistant(reply.clone()));
                    info!(model = %model, reply_len = reply.len(), "turn committed");
                    SendOutcome::Committed(reply)
                }
            }
            Err(error) => {
                renderer.fail();
                warn!(model = %model, error = %error, "turn failed");
                let mut display = lock_unpoisoned(&self.display);
                display.append_lines(self.surface, &error_block(&error));
                SendOutcome::Failed(error)
            }
        };

        let mut display = lock_unpoisoned(&self.display);
        display.append_lines(self.surface, &[String::new()]);
        outcome
    }

    fn stream_reply(
        &self,
        messages: &[ChatMessage],
        model: &str,
        cancel: &CancelSignal,
        renderer: &mut StreamingRenderer,
    ) -> Result<(), TransportError> {
        let request = chat_request(encode_chat_request(messages, model)?);
        let lines = self.transport.stream(&request, cancel)?;

        for line in lines {
            if is_cancel_raised(cancel) {
                return Err(TransportError::Cancelled);
            }
            let line = line?;
            let Some(event) = decode_line(&line) else {
                debug!(raw = %String::from_utf8_lossy(&line), "skipping undecodable line");
                continue;
            };
            if let Some(message) = event.error {
                return Err(TransportError::StreamFailed { message });
            }
            if !event.delta_text.is_empty() {
                let op = renderer
                    .consume(&event.delta_text)
                    .map_err(|error| TransportError::Unknown(error.to_string()))?;
                self.apply_op(&op);
            }
            if event.done {
                debug!("done line received");
                break;
            }
        }

        if is_cancel_raised(cancel) {
            return Err(TransportError::Cancelled);
        }
        Ok(())
    }

    fn apply_op(&self, op: &LineReplace) {
        let mut display = lock_unpoisoned(&self.display);
        display.apply(self.surface, op);
        let last_line = display.line_count(self.surface).saturating_sub(1);
        display.set_cursor(self.surface, last_line, 0);
    }

    /// Raise the cancel signal of the turn in flight. Returns `false` when idle.
    pub fn cancel(&self) -> bool {
        match lock_unpoisoned(&self.active_cancel).as_ref() {
            Some(signal) => {
                signal.store(true, Ordering::Release);
                info!("turn cancellation requested");
                true
            }
            None => false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn model(&self) -> String {
        lock_unpoisoned(&self.state).model.clone()
    }

    /// Select the model for later turns. A turn already streaming keeps its model.
    pub fn set_model(&self, name: &str) -> Result<(), SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::InvalidModel(name.to_string()));
        }
        let mut state = lock_unpoisoned(&self.state);
        info!(from = %state.model, to = %name, "model changed");
        state.model = name.to_string();
        Ok(())
    }

    /// Forget the conversation and blank the surface.
    pub fn clear(&self) -> Result<(), SessionError> {
        let Some(_flight) = FlightGuard::acquire(self) else {
            warn!("clear rejected: a reply is still streaming");
            return Err(SessionError::Busy);
        };
        lock_unpoisoned(&self.state).history.clear();
        lock_unpoisoned(&self.display).set_content(self.surface, &[]);
        info!("conversation cleared");
        Ok(())
    }

    /// Copy of the conversation so far.
    pub fn history(&self) -> ConversationHistory {
        lock_unpoisoned(&self.state).history.clone()
    }

    /// Most recent assistant message, skipping a trailing unanswered user turn.
    pub fn last_assistant_reply(&self) -> Option<String> {
        let state = lock_unpoisoned(&self.state);
        let reply = state
            .history
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .map(|message| message.content.clone());
        reply
    }

    /// Insert the last reply into `target` below line `row` and leave the
    /// cursor at the end of the inserted text.
    pub fn paste_last_reply(
        &self,
        target: &mut dyn DisplaySurface,
        surface: SurfaceId,
        row: usize,
    ) -> Result<usize, SessionError> {
        let reply = self
            .last_assistant_reply()
            .ok_or(SessionError::NotFound("no previous reply to paste"))?;
        let lines: Vec<String> = reply.lines().map(ToOwned::to_owned).collect();

        let at = (row + 1).min(target.line_count(surface));
        target.replace_line_range(surface, at, at, &lines);
        let last = lines.last().map_or(0, String::len);
        target.set_cursor(surface, (at + lines.len()).saturating_sub(1), last);
        debug!(surface = surface.0, at, pasted = lines.len(), "pasted last reply");
        Ok(lines.len())
    }

    /// Ask the server which models it can serve.
    pub fn list_models(&self) -> ModelListing {
        let listed = catch_unwind(AssertUnwindSafe(|| {
            self.transport
                .fetch(&list_models_request())
                .and_then(|body| decode_models_response(&body))
        }))
        .unwrap_or_else(|_| Err(TransportError::Unknown("transport panicked".to_string())));
        match listed {
            Ok(models) => {
                debug!(count = models.len(), "models listed");
                ModelListing { models, error: None }
            }
            Err(error) => {
                warn!(error = %error, "failed to list models");
                ModelListing {
                    models: Vec::new(),
                    error: Some(error),
                }
            }
        }
    }

    pub fn status(&self) -> SessionStatus {
        let state = lock_unpoisoned(&self.state);
        SessionStatus {
            model: state.model.clone(),
            history_len: state.history.len(),
            in_flight: self.is_in_flight(),
        }
    }

    /// Compact model indicator for a status line, e.g. `(llama3.2:3b)`.
    pub fn statusline(&self) -> String {
        format!("({})", self.model())
    }
}

fn local_clock_label() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "--:--:--".to_string())
}

/// `@me (<clock>):`, the message lines, then a blank line.
pub fn user_block(text: &str, clock: &str) -> Vec<String> {
    let mut lines = vec![format!("@me ({clock}):")];
    lines.extend(split_display_lines(text));
    lines.push(String::new());
    lines
}

/// `[error] <message>` followed by one `caused by` line per source.
pub fn error_block(error: &TransportError) -> Vec<String> {
    let mut lines = vec![format!("[error] {error}")];
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(format!("  caused by: {cause}"));
        source = cause.source();
    }
    lines
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn user_block_keeps_inner_lines() {
        assert_eq!(
            user_block("first\nsecond", "09:15:00"),
            vec![
                "@me (09:15:00):".to_string(),
                "first".to_string(),
                "second".to_string(),
                String::new(),
            ]
        );
    }

    #[test]
    fn error_block_without_source_is_one_line() {
        let block = error_block(&TransportError::Cancelled);
        assert_eq!(block, vec!["[error] request was cancelled".to_string()]);
    }

    #[test]
    fn error_block_lists_sources() {
        let serde_error =
            serde_json::from_str::<serde_json::Value>("{").expect_err("truncated json");
        let detail = serde_error.to_string();
        let block = error_block(&TransportError::Serde(serde_error));

        assert_eq!(
            block,
            vec![
                "[error] serialization error".to_string(),
                format!("  caused by: {detail}"),
            ]
        );
    }

    #[test]
    fn clock_label_is_hh_mm_ss() {
        let label = local_clock_label();
        assert_eq!(label.len(), 8);
        assert_eq!(label.matches(':').count(), 2);
    }

    #[test]
    fn status_display_matches_legacy_format() {
        let status = SessionStatus {
            model: "llama3.2:3b".to_string(),
            history_len: 4,
            in_flight: false,
        };
        assert_eq!(status.to_string(), "model: llama3.2:3b; history_length: 4");
    }

    #[test]
    fn outcome_reply_only_for_committed() {
        assert_eq!(SendOutcome::Committed("hi".into()).reply(), Some("hi"));
        assert_eq!(SendOutcome::Empty.reply(), None);
        assert!(SendOutcome::Failed(TransportError::Cancelled).is_failed());
    }
}
