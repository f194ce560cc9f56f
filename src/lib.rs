//! Streaming chat session engine for locally served language models.
//!
//! Invariant: the session is the only writer to its display surface, and it
//! writes in line-arrival order.
//!
//! # Public API Overview
//! - Start a [`Session`] over any [`Transport`] and [`DisplaySurface`], or use
//!   [`Session::connect`] for the HTTP transport.
//! - Drive turns with [`Session::send`]; the returned [`SendOutcome`] says
//!   whether the reply was committed to the [`ConversationHistory`].
//! - Load settings with [`SessionConfig::load`].
//! - Render deltas yourself with [`StreamingRenderer`] when embedding the
//!   engine without a session.
//!
//! Wire encoding and decoding live in the `ollama_api` crate; the message and
//! request types are re-exported here.

use std::sync::{Mutex, MutexGuard};

pub mod config;
pub mod display;
pub mod error;
pub mod history;
pub mod render;
pub mod session;
pub mod transport;

/// Configuration sources and defaults.
pub use crate::config::{SessionConfig, DEFAULT_MODEL, DEFAULT_TIMEOUT};
/// Display surface contract and the in-memory implementation.
pub use crate::display::{DisplaySurface, MemorySurface, SurfaceId};
/// Error types.
pub use crate::error::{ConfigError, RenderError, SessionError, TransportError};
pub use crate::history::ConversationHistory;
/// Incremental line-replacement rendering.
pub use crate::render::{split_display_lines, LineReplace, RenderPhase, StreamingRenderer};
/// Session controller.
pub use crate::session::{ModelListing, SendOutcome, Session, SessionStatus};
/// Transport seam and the blocking HTTP implementation.
pub use crate::transport::{new_cancel_signal, CancelSignal, HttpTransport, Lines, Transport};

/// Wire types shared with the protocol crate.
pub use ollama_api::{ApiRequest, ChatMessage, Method, Role, StreamEvent};

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
