//! Server-sent-event line parsing.
//!
//! Shared by the realtime feed and the streaming completion client. Chunks
//! arriving from `bytes_stream()` may split lines arbitrarily, so payload
//! extraction buffers partial lines between pushes.

/// Accumulates raw stream chunks and yields complete `data:` payloads
#[derive(Debug, Default)]
pub struct SseBuffer {
    partial: String,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw chunk; returns the `data:` payloads completed by it
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.partial.push_str(chunk);

        let mut payloads = Vec::new();

        while let Some(newline) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=newline).collect();
            let line = line.trim_end();

            if let Some(payload) = line.strip_prefix("data:") {
                payloads.push(payload.trim_start().to_string());
            }
            // Comment lines (":") and event/id fields are ignored
        }

        payloads
    }

    /// Consume the buffer at end of stream, yielding the payload of a
    /// trailing `data:` line the body closed without terminating
    pub fn finish(self) -> Option<String> {
        let line = self.partial.trim_end();
        let payload = line.strip_prefix("data:")?.trim_start();
        if payload.is_empty() {
            return None;
        }
        Some(payload.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_event() {
        let mut buf = SseBuffer::new();
        let payloads = buf.push("data: {\"x\":1}\n\n");
        assert_eq!(payloads, vec!["{\"x\":1}"]);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut buf = SseBuffer::new();
        assert!(buf.push("data: {\"x\"").is_empty());
        let payloads = buf.push(":1}\ndata: [DONE]\n");
        assert_eq!(payloads, vec!["{\"x\":1}", "[DONE]"]);
    }

    #[test]
    fn test_ignores_comments_and_fields() {
        let mut buf = SseBuffer::new();
        let payloads = buf.push(": keep-alive\nevent: insert\ndata: payload\n");
        assert_eq!(payloads, vec!["payload"]);
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut buf = SseBuffer::new();
        let payloads = buf.push("data: a\n\ndata: b\n\ndata: c\n");
        assert_eq!(payloads, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_data_line() {
        let mut buf = SseBuffer::new();
        assert!(buf.push("data: {\"x\":1}").is_empty());
        assert_eq!(buf.finish(), Some("{\"x\":1}".to_string()));
    }

    #[test]
    fn test_finish_ignores_empty_and_non_data_residue() {
        assert_eq!(SseBuffer::new().finish(), None);

        let mut buf = SseBuffer::new();
        buf.push(": keep-ali");
        assert_eq!(buf.finish(), None);

        let mut buf = SseBuffer::new();
        buf.push("data:");
        assert_eq!(buf.finish(), None);
    }
}
