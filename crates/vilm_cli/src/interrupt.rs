use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use signal_hook::consts::SIGINT;
use signal_hook::iterator::{Handle, Signals};
use tracing::info;
use vilm::Session;

/// Exit status for a process stopped by Ctrl-C at the prompt.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Stops the Ctrl-C listener thread when dropped.
pub struct InterruptGuard {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// What a Ctrl-C means right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    CancelledTurn,
    Exit,
}

pub fn interrupt_action(session: &Session) -> InterruptAction {
    if session.cancel() {
        InterruptAction::CancelledTurn
    } else {
        InterruptAction::Exit
    }
}

/// Ctrl-C cancels a streaming reply; at the prompt it ends the process.
pub fn install_interrupt_handler(session: Arc<Session>) -> io::Result<InterruptGuard> {
    let mut signals = Signals::new([SIGINT])?;
    let handle = signals.handle();

    let thread = thread::Builder::new()
        .name("vilm-interrupt".to_string())
        .spawn(move || {
            for _ in signals.forever() {
                if interrupt_action(&session) == InterruptAction::Exit {
                    info!("interrupted at prompt");
                    eprintln!();
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
        })?;

    Ok(InterruptGuard {
        handle,
        thread: Some(thread),
    })
}
