//! Display surface contract consumed by the session.
//!
//! Hosts (an editor bridge, a terminal, a test) implement [`DisplaySurface`];
//! the session never talks to a concrete UI toolkit. Line indices are
//! zero-based.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::lock_unpoisoned;
use crate::render::LineReplace;

/// Identifies one text buffer owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u64);

pub trait DisplaySurface: Send {
    fn append_lines(&mut self, surface: SurfaceId, lines: &[String]);

    /// Replace lines `[start, end)`. An `end` past the last line is clamped.
    fn replace_line_range(&mut self, surface: SurfaceId, start: usize, end: usize, lines: &[String]);

    fn line_count(&self, surface: SurfaceId) -> usize;

    fn set_cursor(&mut self, surface: SurfaceId, line: usize, col: usize);

    fn set_content(&mut self, surface: SurfaceId, lines: &[String]);

    fn apply(&mut self, surface: SurfaceId, op: &LineReplace) {
        self.replace_line_range(surface, op.start, op.end, &op.lines);
    }
}

impl<D: DisplaySurface> DisplaySurface for Arc<Mutex<D>> {
    fn append_lines(&mut self, surface: SurfaceId, lines: &[String]) {
        lock_unpoisoned(self).append_lines(surface, lines);
    }

    fn replace_line_range(&mut self, surface: SurfaceId, start: usize, end: usize, lines: &[String]) {
        lock_unpoisoned(self).replace_line_range(surface, start, end, lines);
    }

    fn line_count(&self, surface: SurfaceId) -> usize {
        lock_unpoisoned(self).line_count(surface)
    }

    fn set_cursor(&mut self, surface: SurfaceId, line: usize, col: usize) {
        lock_unpoisoned(self).set_cursor(surface, line, col);
    }

    fn set_content(&mut self, surface: SurfaceId, lines: &[String]) {
        lock_unpoisoned(self).set_content(surface, lines);
    }
}

/// In-memory surface for headless hosts and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySurface {
    buffers: BTreeMap<SurfaceId, Vec<String>>,
    cursors: BTreeMap<SurfaceId, (usize, usize)>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle that can be given to a session and inspected afterwards.
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn lines(&self, surface: SurfaceId) -> &[String] {
        self.buffers
            .get(&surface)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn text(&self, surface: SurfaceId) -> String {
        self.lines(surface).join("\n")
    }

    pub fn cursor(&self, surface: SurfaceId) -> Option<(usize, usize)> {
        self.cursors.get(&surface).copied()
    }
}

impl DisplaySurface for MemorySurface {
    fn append_lines(&mut self, surface: SurfaceId, lines: &[String]) {
        self.buffers
            .entry(surface)
            .or_default()
            .extend_from_slice(lines);
    }

    fn replace_line_range(&mut self, surface: SurfaceId, start: usize, end: usize, lines: &[String]) {
        let buffer = self.buffers.entry(surface).or_default();
        let start = start.min(buffer.len());
        let end = end.clamp(start, buffer.len());
        buffer.splice(start..end, lines.iter().cloned());
    }

    fn line_count(&self, surface: SurfaceId) -> usize {
        self.lines(surface).len()
    }

    fn set_cursor(&mut self, surface: SurfaceId, line: usize, col: usize) {
        self.cursors.insert(surface, (line, col));
    }

    fn set_content(&mut self, surface: SurfaceId, lines: &[String]) {
        self.buffers.insert(surface, lines.to_vec());
        self.cursors.remove(&surface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT: SurfaceId = SurfaceId(1);

    fn lines(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn replace_clamps_end_past_last_line() {
        let mut surface = MemorySurface::new();
        surface.append_lines(CHAT, &lines(&["label", "partial"]));

        surface.replace_line_range(CHAT, 1, 5, &lines(&["full", "reply"]));

        assert_eq!(surface.lines(CHAT), lines(&["label", "full", "reply"]).as_slice());
    }

    #[test]
    fn empty_range_inserts() {
        let mut surface = MemorySurface::new();
        surface.append_lines(CHAT, &lines(&["a", "c"]));

        surface.replace_line_range(CHAT, 1, 1, &lines(&["b"]));

        assert_eq!(surface.text(CHAT), "a\nb\nc");
    }

    #[test]
    fn surfaces_are_independent() {
        let mut surface = MemorySurface::new();
        surface.append_lines(CHAT, &lines(&["chat"]));
        surface.append_lines(SurfaceId(2), &lines(&["input"]));

        surface.set_content(CHAT, &[]);

        assert_eq!(surface.line_count(CHAT), 0);
        assert_eq!(surface.line_count(SurfaceId(2)), 1);
    }

    #[test]
    fn shared_handle_forwards_to_inner_surface() {
        let shared = MemorySurface::shared();
        let mut handle = Arc::clone(&shared);

        handle.append_lines(CHAT, &lines(&["x"]));
        handle.set_cursor(CHAT, 0, 1);

        let inner = lock_unpoisoned(&shared);
        assert_eq!(inner.lines(CHAT), lines(&["x"]).as_slice());
        assert_eq!(inner.cursor(CHAT), Some((0, 1)));
    }
}
