//! Line framing: splits decoded text chunks into complete, NFC-normalized
//! IRC lines.
//!
//! The framer is deliberately ignorant of the transport: it consumes `&str`
//! chunks (already UTF-8-decoded by [`crate::transport::Transport`]) and
//! yields zero or more complete lines per chunk. A line is the maximal span
//! ending in `\r\n`; empty lines are discarded. Bytes after the last `\r\n`
//! in a chunk are carried into `frame_buffer` and prepended to the next
//! chunk's first line, so a multi-byte grapheme or combining-mark sequence
//! split exactly at a chunk boundary still normalizes correctly once the
//! line is completed.

use unicode_normalization::UnicodeNormalization;

/// Buffers inbound text and emits complete, NFC-normalized lines.
#[derive(Debug, Default)]
pub struct Framer {
    frame_buffer: String,
}

impl Framer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a decoded chunk of inbound text, returning the complete lines
    /// it produced (in order). Any trailing partial line is retained
    /// internally.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.frame_buffer.push_str(chunk);

        let mut lines = Vec::new();
        loop {
            let Some(idx) = self.frame_buffer.find("\r\n") else {
                break;
            };
            let line: String = self.frame_buffer[..idx].to_string();
            self.frame_buffer.drain(..idx + 2);
            if !line.is_empty() {
                lines.push(line.nfc().collect());
            }
        }
        lines
    }

    /// The trailing partial line currently buffered, carried across chunks.
    pub fn pending(&self) -> &str {
        &self.frame_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_chunk_multiple_lines() {
        let mut framer = Framer::new();
        let lines = framer.push("PING :a\r\nPONG :b\r\n");
        assert_eq!(lines, vec!["PING :a", "PONG :b"]);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_empty_lines_discarded() {
        let mut framer = Framer::new();
        let lines = framer.push("\r\nPING :a\r\n\r\n");
        assert_eq!(lines, vec!["PING :a"]);
    }

    #[test]
    fn test_partial_line_carried_across_chunks() {
        let mut framer = Framer::new();
        assert!(framer.push("PING :par").is_empty());
        assert_eq!(framer.pending(), "PING :par");
        let lines = framer.push("tial\r\n");
        assert_eq!(lines, vec!["PING :partial"]);
    }

    #[test]
    fn test_combining_marks_split_across_chunks_normalize() {
        // U+1100 (L), U+1161 (V), U+11A8 (T) compose to U+AC01.
        let mut framer = Framer::new();
        assert!(framer.push("\u{1100}").is_empty());
        let lines = framer.push("\u{1161}\u{11A8}\r\n");
        assert_eq!(lines, vec!["\u{AC01}"]);
    }

    #[test]
    fn test_crlf_split_exactly_between_chunks() {
        let mut framer = Framer::new();
        assert!(framer.push("PING :a\r").is_empty());
        let lines = framer.push("\nPONG :b\r\n");
        assert_eq!(lines, vec!["PING :a", "PONG :b"]);
    }
}
