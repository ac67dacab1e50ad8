//! Minimal Server-Sent Events parser for the Gemini streaming endpoint.
//!
//! The endpoint only ever emits `data:` payloads, so this parser collapses
//! each event to its joined data string and ignores `event:`/`id:` fields.

/// Incremental SSE parser. Feed raw response bytes with [`push`](Self::push)
/// and collect the data payloads of completed events.
///
/// The line buffer holds raw bytes and only complete lines are decoded, so a
/// chunk boundary inside a multi-byte UTF-8 character never corrupts the
/// payload.
#[derive(Debug, Default)]
pub struct SseLineParser {
    line_buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk of bytes, returning the data payloads of any events that
    /// completed within it. Handles events split across chunk boundaries and
    /// CRLF line endings.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut events = Vec::new();

        for &byte in chunk {
            if byte == b'\n' {
                let line = self.take_line();
                if let Some(event) = self.process_line(&line) {
                    events.push(event);
                }
            } else {
                self.line_buffer.push(byte);
            }
        }

        events
    }

    /// Flush a trailing event that was not terminated by a blank line.
    pub fn flush(&mut self) -> Option<String> {
        if !self.line_buffer.is_empty() {
            let line = self.take_line();
            self.process_line(&line);
        }

        if self.data_lines.is_empty() {
            None
        } else {
            Some(self.take_event())
        }
    }

    fn take_line(&mut self) -> String {
        let mut line = std::mem::take(&mut self.line_buffer);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        String::from_utf8_lossy(&line).into_owned()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        // Blank line = event boundary
        if line.is_empty() {
            if self.data_lines.is_empty() {
                return None;
            }
            return Some(self.take_event());
        }

        // Comment line
        if line.starts_with(':') {
            return None;
        }

        if let Some(value) = line.strip_prefix("data:") {
            self.data_lines
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        // Other fields (event:, id:, retry:) are irrelevant here.

        None
    }

    fn take_event(&mut self) -> String {
        let event = self.data_lines.join("\n");
        self.data_lines.clear();
        event
    }
}
