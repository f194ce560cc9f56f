//! Incremental rendering of one streamed assistant turn.
//!
//! Every delta re-splits the whole accumulated reply and replaces the turn's
//! lines from the anchor. Re-splitting trades quadratic total work for
//! tolerance of deltas that break mid-line; replies are bounded by the model
//! context, so the buffer stays small.

use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Streaming,
    Completed,
    Failed,
}

/// Replace display lines `[start, end)` with `lines`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineReplace {
    pub start: usize,
    pub end: usize,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StreamingRenderer {
    phase: RenderPhase,
    accumulated: String,
    anchor: usize,
    rendered_lines: usize,
}

impl Default for StreamingRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingRenderer {
    pub fn new() -> Self {
        Self {
            phase: RenderPhase::Idle,
            accumulated: String::new(),
            anchor: 0,
            rendered_lines: 0,
        }
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    pub fn anchor(&self) -> usize {
        self.anchor
    }

    pub fn accumulated_text(&self) -> &str {
        &self.accumulated
    }

    /// Number of display lines the turn currently occupies.
    pub fn rendered_line_count(&self) -> usize {
        self.rendered_lines
    }

    /// Start a turn whose output begins at display line `anchor`.
    pub fn begin(&mut self, anchor: usize) {
        self.phase = RenderPhase::Streaming;
        self.accumulated.clear();
        self.anchor = anchor;
        self.rendered_lines = 0;
    }

    /// Append a delta and return the replacement covering the whole turn.
    pub fn consume(&mut self, delta: &str) -> Result<LineReplace, RenderError> {
        if self.phase != RenderPhase::Streaming {
            return Err(RenderError::NotStreaming);
        }

        self.accumulated.push_str(delta);
        let lines = split_display_lines(&self.accumulated);
        let op = LineReplace {
            start: self.anchor,
            end: self.anchor + self.rendered_lines,
            lines,
        };
        self.rendered_lines = op.lines.len();
        Ok(op)
    }

    /// Re-emit the current lines over the range they already occupy.
    ///
    /// Applying it to a display that missed earlier updates brings it back in
    /// line; applying it again changes nothing.
    pub fn resync(&self) -> LineReplace {
        LineReplace {
            start: self.anchor,
            end: self.anchor + self.rendered_lines,
            lines: split_display_lines(&self.accumulated),
        }
    }

    /// Finish the turn and hand back the reply exactly as received.
    pub fn end(&mut self) -> String {
        self.phase = RenderPhase::Completed;
        std::mem::take(&mut self.accumulated)
    }

    /// Mark the turn failed. Annotating the display is up to the caller.
    pub fn fail(&mut self) {
        self.phase = RenderPhase::Failed;
    }
}

/// Split text into display lines; a trailing newline opens one empty line.
pub fn split_display_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.lines().map(ToOwned::to_owned).collect();
    if text.ends_with('\n') {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn lines(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn consume_outside_streaming_is_rejected() {
        let mut renderer = StreamingRenderer::new();
        assert_eq!(renderer.consume("x"), Err(RenderError::NotStreaming));

        renderer.begin(0);
        renderer.end();
        assert_eq!(renderer.consume("x"), Err(RenderError::NotStreaming));
    }

    #[test]
    fn each_op_replaces_previously_rendered_range() {
        let mut renderer = StreamingRenderer::new();
        renderer.begin(4);

        let first = renderer.consume("Hello").unwrap();
        assert_eq!(
            first,
            LineReplace {
                start: 4,
                end: 4,
                lines: lines(&["Hello"]),
            }
        );

        let second = renderer.consume(" world\n").unwrap();
        assert_eq!(
            second,
            LineReplace {
                start: 4,
                end: 5,
                lines: lines(&["Hello world", ""]),
            }
        );

        let third = renderer.consume("Next").unwrap();
        assert_eq!(
            third,
            LineReplace {
                start: 4,
                end: 6,
                lines: lines(&["Hello world", "Next"]),
            }
        );
        assert_eq!(renderer.rendered_line_count(), 2);
    }

    #[test]
    fn delta_split_mid_line_joins_onto_same_line() {
        let mut renderer = StreamingRenderer::new();
        renderer.begin(0);
        renderer.consume("fn ma").unwrap();
        let op = renderer.consume("in() {}").unwrap();
        assert_eq!(op.lines, lines(&["fn main() {}"]));
    }

    #[test]
    fn end_returns_text_with_trailing_whitespace() {
        let mut renderer = StreamingRenderer::new();
        renderer.begin(0);
        renderer.consume("answer\n\n").unwrap();

        assert_eq!(renderer.end(), "answer\n\n");
        assert_eq!(renderer.phase(), RenderPhase::Completed);
    }

    #[test]
    fn fail_only_changes_phase() {
        let mut renderer = StreamingRenderer::new();
        renderer.begin(2);
        renderer.consume("partial").unwrap();
        renderer.fail();

        assert_eq!(renderer.phase(), RenderPhase::Failed);
        assert_eq!(renderer.accumulated_text(), "partial");
    }

    #[test]
    fn begin_resets_previous_turn() {
        let mut renderer = StreamingRenderer::new();
        renderer.begin(0);
        renderer.consume("old\nturn").unwrap();
        renderer.end();

        renderer.begin(9);
        let op = renderer.consume("new").unwrap();
        assert_eq!(
            op,
            LineReplace {
                start: 9,
                end: 9,
                lines: lines(&["new"]),
            }
        );
    }

    #[test]
    fn resync_is_stable() {
        let mut renderer = StreamingRenderer::new();
        renderer.begin(1);
        renderer.consume("a\nb").unwrap();

        assert_eq!(renderer.resync(), renderer.resync());
        assert_eq!(
            renderer.resync(),
            LineReplace {
                start: 1,
                end: 3,
                lines: lines(&["a", "b"]),
            }
        );
    }

    #[test]
    fn split_display_lines_handles_edges() {
        assert_eq!(split_display_lines(""), Vec::<String>::new());
        assert_eq!(split_display_lines("\n"), lines(&["", ""]));
        assert_eq!(split_display_lines("a\r\nb"), lines(&["a", "b"]));
    }
}
