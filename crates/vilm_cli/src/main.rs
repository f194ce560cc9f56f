use std::io;
use std::sync::Arc;

use tracing::info;
use vilm::{Session, SessionConfig, SurfaceId};
use vilm_cli::interrupt::install_interrupt_handler;
use vilm_cli::terminal::TerminalSurface;
use vilm_cli::{init_logging, repl};

const TRANSCRIPT: SurfaceId = SurfaceId(0);

fn main() -> io::Result<()> {
    init_logging();

    let config = SessionConfig::load().map_err(io::Error::other)?;
    let surface = TerminalSurface::new(io::stdout());
    let session = Arc::new(Session::connect(&config, surface, TRANSCRIPT).map_err(io::Error::other)?);
    info!(base_url = %config.base_url, model = %config.default_model, "vilm-chat ready");

    let interrupts = install_interrupt_handler(Arc::clone(&session))?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let result = repl::run(&session, stdin.lock(), &mut stdout);

    drop(interrupts);
    if let Ok(session) = Arc::try_unwrap(session) {
        session.end();
    }
    result
}
