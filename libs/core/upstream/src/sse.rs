//! Incremental decoder for `text/event-stream` bodies.

use std::str::Utf8Error;

/// Buffers raw bytes and yields the `data:` payload of each complete event.
///
/// Lines are decoded only once their `\n` has arrived, so a multi-byte
/// character split across network chunks survives intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the payloads of events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, Utf8Error> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = std::str::from_utf8(&raw)?.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(payload) = line.strip_prefix("data:") {
                self.data.push(payload.strip_prefix(' ').unwrap_or(payload).to_string());
            }
        }

        Ok(events)
    }

    /// Payload of a trailing event that was never terminated by a blank line.
    pub fn finish(mut self) -> Result<Option<String>, Utf8Error> {
        let rest = std::str::from_utf8(&self.buffer)?.trim_end_matches('\r');
        if let Some(payload) = rest.strip_prefix("data:") {
            self.data.push(payload.strip_prefix(' ').unwrap_or(payload).to_string());
        }
        Ok((!self.data.is_empty()).then(|| self.data.join("\n")))
    }
}
