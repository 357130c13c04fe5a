//! Line decoder for `text/event-stream` response bodies.
//!
//! Network chunks do not respect line boundaries, so bytes are buffered
//! until a full line is available.

#[derive(Debug, PartialEq, Eq)]
pub enum SseData {
    Payload(String),
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the `data:` payloads of every line it
    /// completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseData> {
        self.buffer.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = parse_line(&line) {
                out.push(data);
            }
        }
        out
    }

    /// Flushes a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Option<SseData> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseData> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseData::Done);
    }
    Some(SseData::Payload(data.to_string()))
}
