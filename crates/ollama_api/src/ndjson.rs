/// Incremental splitter for newline-delimited JSON streams.
///
/// Works on raw bytes so that a chunk boundary falling inside a multi-byte
/// UTF-8 sequence never corrupts a line. Blank lines are dropped and a
/// trailing `\r` is stripped.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    /// Feed arbitrary bytes and drain every complete line.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();

        while let Some(split) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=split).collect();
            line.pop();
            if let Some(line) = finish_line(line) {
                lines.push(line);
            }
        }

        lines
    }

    /// Drain the unterminated tail once the connection has closed.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        finish_line(std::mem::take(&mut self.buffer))
    }
}

fn finish_line(mut line: Vec<u8>) -> Option<Vec<u8>> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    if line.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(line)
    }
}
