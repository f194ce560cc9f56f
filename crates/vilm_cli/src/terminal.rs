//! Display surface that streams the transcript to a plain terminal.
//!
//! The terminal is append-only, so the surface keeps a mirror of the buffer.
//! When an update only extends the rendered text, just the new suffix is
//! written; otherwise the changed lines are printed again below.

use std::io::Write;

use tracing::warn;
use vilm::{DisplaySurface, SurfaceId};

pub struct TerminalSurface<W> {
    out: W,
    lines: Vec<String>,
}

impl<W: Write + Send> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            lines: Vec::new(),
        }
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn rendered(&self) -> String {
        self.lines.join("\n")
    }

    fn update(&mut self, first_changed: usize, edit: impl FnOnce(&mut Vec<String>)) {
        let before = self.rendered();
        edit(&mut self.lines);
        let after = self.rendered();

        let output = match after.strip_prefix(before.as_str()) {
            Some(suffix) => suffix.to_string(),
            None => {
                let from = first_changed.min(self.lines.len());
                format!("\n{}", self.lines[from..].join("\n"))
            }
        };
        self.write(&output);
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let written = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(error) = written {
            warn!(error = %error, "failed to write transcript");
        }
    }
}

impl<W: Write + Send> DisplaySurface for TerminalSurface<W> {
    fn append_lines(&mut self, _surface: SurfaceId, lines: &[String]) {
        let first_changed = self.lines.len();
        self.update(first_changed, |buffer| buffer.extend_from_slice(lines));
    }

    fn replace_line_range(&mut self, _surface: SurfaceId, start: usize, end: usize, lines: &[String]) {
        self.update(start, |buffer| {
            let start = start.min(buffer.len());
            let end = end.clamp(start, buffer.len());
            buffer.splice(start..end, lines.iter().cloned());
        });
    }

    fn line_count(&self, _surface: SurfaceId) -> usize {
        self.lines.len()
    }

    fn set_cursor(&mut self, _surface: SurfaceId, _line: usize, _col: usize) {}

    fn set_content(&mut self, _surface: SurfaceId, lines: &[String]) {
        self.lines = lines.to_vec();
        if !lines.is_empty() {
            let output = format!("\n{}", self.rendered());
            self.write(&output);
        }
    }
}
