//! Server-sent-events plumbing shared by the provider adapters.
//!
//! Each backend streams `data: <payload>` lines; the adapters differ only in
//! how a payload maps to a text delta and in their end-of-stream sentinel.

use crate::error::LlmError;
use futures::StreamExt;
use futures::stream::BoxStream;

/// What a single `data:` payload means for the text stream.
pub enum SsePayload {
    /// A text delta to deliver.
    Delta(String),
    /// Explicit end-of-stream sentinel.
    Done,
    /// Keep-alive, unknown event, or an undecodable chunk. Skipped.
    Ignore,
}

/// Accumulates raw bytes and yields complete lines. SSE chunks can split
/// lines at arbitrary byte boundaries, so a line is only released once its
/// newline has arrived.
#[derive(Default)]
pub struct SseLineBuffer {
    buf: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line completed by it, with
    /// trailing `\r\n` stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }
}

/// Strips the `data: ` prefix from an SSE line. Non-data lines (comments,
/// event names, keep-alive blanks) return `None`.
pub fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data: ")
}

/// Drives a prepared streaming request and yields text deltas.
///
/// `parse` is the adapter-specific payload decoder. A non-2xx status is
/// surfaced as [`LlmError::Api`] before any delta; transport failures
/// mid-stream surface as [`LlmError::Streaming`].
pub(crate) fn text_stream(
    request: reqwest::RequestBuilder,
    parse: fn(&str) -> SsePayload,
) -> BoxStream<'static, Result<String, LlmError>> {
    Box::pin(async_stream::try_stream! {
        let response = request.send().await.map_err(LlmError::network)?;
        let status = response.status();
        let response = if status.is_success() {
            response
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Api { status: status.as_u16(), message })?;
        };

        let mut lines = SseLineBuffer::new();
        let mut bytes = response.bytes_stream();
        'outer: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|err| LlmError::Streaming(err.to_string()))?;
            for line in lines.push(&chunk) {
                let Some(payload) = data_payload(&line) else { continue };
                match parse(payload) {
                    SsePayload::Delta(text) => yield text,
                    SsePayload::Done => break 'outer,
                    SsePayload::Ignore => {}
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_split_across_chunks_are_reassembled() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push(b"data: {\"par").is_empty());
        let lines = buffer.push(b"tial\":1}\n\n");
        assert_eq!(lines, vec!["data: {\"partial\":1}".to_string(), String::new()]);
    }

    #[test]
    fn crlf_line_endings_are_stripped() {
        let mut buffer = SseLineBuffer::new();
        let lines = buffer.push(b"data: hello\r\n");
        assert_eq!(lines, vec!["data: hello".to_string()]);
    }

    #[test]
    fn multiple_lines_in_one_chunk() {
        let mut buffer = SseLineBuffer::new();
        let lines = buffer.push(b"data: a\ndata: b\n");
        assert_eq!(lines, vec!["data: a".to_string(), "data: b".to_string()]);
    }

    #[test]
    fn data_prefix_is_required() {
        assert_eq!(data_payload("data: {}"), Some("{}"));
        assert_eq!(data_payload("event: ping"), None);
        assert_eq!(data_payload(""), None);
    }
}
