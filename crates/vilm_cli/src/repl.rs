use std::io::{self, BufRead, Write};

use tracing::debug;
use vilm::{SendOutcome, Session, SessionError};

use crate::commands::{parse_slash_command, SlashCommand, HELP_LINES};

pub const PROMPT: &str = "> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Read lines until end of input or `/quit`.
pub fn run<R: BufRead>(session: &Session, input: R, out: &mut dyn Write) -> io::Result<()> {
    write!(out, "{PROMPT}")?;
    out.flush()?;
    for line in input.lines() {
        let line = line?;
        if handle_line(session, &line, out)? == Flow::Quit {
            return Ok(());
        }
        write!(out, "{PROMPT}")?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(())
}

/// Run one command, or send the line as a chat message.
///
/// Chat output goes to the session's surface; `out` only receives command
/// feedback.
pub fn handle_line(session: &Session, line: &str, out: &mut dyn Write) -> io::Result<Flow> {
    let Some(command) = parse_slash_command(line) else {
        match session.send(line) {
            SendOutcome::Busy => writeln!(out, "a reply is still streaming.")?,
            outcome => debug!(?outcome, "turn finished"),
        }
        return Ok(Flow::Continue);
    };

    match command {
        SlashCommand::Help => {
            for help in HELP_LINES {
                writeln!(out, "{help}")?;
            }
        }
        SlashCommand::Model(None) => writeln!(out, "current model: {}", session.model())?,
        SlashCommand::Model(Some(name)) => match session.set_model(&name) {
            Ok(()) => writeln!(out, "model set to: {}", session.model())?,
            Err(error) => writeln!(out, "{error}")?,
        },
        SlashCommand::Models => {
            let listing = session.list_models();
            let current = session.model();
            if let Some(error) = listing.error {
                writeln!(out, "failed to list models: {error}")?;
            } else if listing.models.is_empty() {
                writeln!(out, "no models found.")?;
            }
            for model in listing.models {
                let marker = if model == current { '*' } else { ' ' };
                writeln!(out, "{marker} {model}")?;
            }
        }
        SlashCommand::Clear => match session.clear() {
            Ok(()) => writeln!(out, "conversation cleared.")?,
            Err(SessionError::Busy) => writeln!(out, "cannot clear while a reply is streaming.")?,
            Err(error) => writeln!(out, "{error}")?,
        },
        SlashCommand::Last => match session.last_assistant_reply() {
            Some(reply) => writeln!(out, "{reply}")?,
            None => writeln!(out, "no previous reply.")?,
        },
        SlashCommand::Status => writeln!(out, "{}", session.status())?,
        SlashCommand::Quit => return Ok(Flow::Quit),
        SlashCommand::Unknown(command) => {
            writeln!(out, "unknown command: {command} (try /help)")?
        }
    }
    Ok(Flow::Continue)
}
