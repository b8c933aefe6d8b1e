//! Incremental server-sent events decoder
//!
//! Frames are assembled from arbitrary byte chunks as they arrive off the
//! wire. Lines may end in `\n`, `\r\n` or `\r`; a blank line dispatches the
//! pending event. `retry` is ignored. Comment lines (leading `:`) come out
//! as comment frames with an empty event name; servers send them as
//! keep-alives, so they count as liveness but carry no data.
//!
//! Unlike a browser `EventSource`, a named event with no `data` line is still
//! dispatched, so a bare `event: end` terminates the stream.

use bytes::{Buf, BytesMut};

/// One dispatched event, or a comment line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name, `message` when the frame had none
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            event: String::new(),
            data: text.into(),
            id: None,
        }
    }

    /// A `:` comment line rather than a dispatched event
    pub fn is_comment(&self) -> bool {
        self.event.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: BytesMut,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(line) = self.next_line() {
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|b| *b == b'\n' || *b == b'\r')?;

        // A trailing '\r' may be the first half of "\r\n"
        if self.buf[pos] == b'\r' && pos + 1 == self.buf.len() {
            return None;
        }

        let line = String::from_utf8_lossy(&self.buf[..pos]).into_owned();
        let terminator = if self.buf[pos] == b'\r' && self.buf[pos + 1] == b'\n' {
            2
        } else {
            1
        };
        self.buf.advance(pos + terminator);
        Some(line)
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(text) = line.strip_prefix(':') {
            return Some(SseEvent::comment(text.trim_start()));
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if !self.has_data && event.is_none() {
            return None;
        }

        self.has_data = false;
        Some(SseEvent {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_events() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(
            b"event: active\ndata: [{\"marketId\":1}]\n\n: keepalive\n\nevent: end\n\n",
        );

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event, "active");
        assert_eq!(events[0].data, "[{\"marketId\":1}]");
        assert!(events[1].is_comment());
        assert_eq!(events[1].data, "keepalive");
        assert_eq!(events[2].event, "end");
        assert_eq!(events[2].data, "");
    }

    #[test]
    fn test_comment_inside_frame_keeps_pending_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: observing
:
data: []

");

        assert_eq!(events.len(), 2);
        assert!(events[0].is_comment());
        assert_eq!(events[0].data, "");
        assert_eq!(events[1].event, "observing");
        assert_eq!(events[1].data, "[]");
    }

    #[test]
    fn test_chunks_split_anywhere() {
        let frame = b"event: resolvedPage\r\ndata: [1,\r\ndata: 2]\r\nid: 7\r\n\r\n";
        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        for byte in frame.iter() {
            events.extend(decoder.feed(&[*byte]));
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "resolvedPage");
        assert_eq!(events[0].data, "[1,\n2]");
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_unnamed_event_defaults_to_message() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data:hello\n\n");
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_incomplete_frame_is_held() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: active\ndata: []").is_empty());
        let events = decoder.feed(b"\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "[]");
    }
}
