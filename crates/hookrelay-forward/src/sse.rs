//! SSE frame parsing from a chunked byte stream.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio_stream::StreamExt;
use tracing::warn;

/// One parsed Server-Sent Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// The frame's event name (`message` when the stream never set one).
    pub event: String,
    /// The frame's data payload; multiple `data:` lines are joined with `\n`.
    pub data: String,
}

/// Parse SSE frames from a byte stream.
///
/// Buffers incoming bytes, splits on newlines, accumulates `event:` and
/// `data:` fields, and emits one frame per blank-line terminator. Comment
/// lines and unknown fields are skipped; a frame without data is not
/// dispatched.
pub fn parse_sse_stream<S>(byte_stream: S) -> impl Stream<Item = SseFrame> + Send
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    futures::stream::unfold(
        (
            byte_stream,
            BytesMut::with_capacity(8192),
            None::<String>,
            Vec::<String>::new(),
        ),
        |(mut stream, mut buffer, mut event, mut data)| async move {
            loop {
                // Check buffer for a complete line (\n)
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    // Remove trailing \n
                    line_bytes.truncate(line_bytes.len() - 1);
                    // Remove trailing \r if present
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }

                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        continue; // skip invalid UTF-8 lines
                    };

                    if line.is_empty() {
                        // Frame terminator
                        if data.is_empty() {
                            event = None;
                            continue;
                        }
                        let frame = SseFrame {
                            event: event.take().unwrap_or_else(|| "message".to_string()),
                            data: data.join("\n"),
                        };
                        data.clear();
                        return Some((frame, (stream, buffer, event, data)));
                    }
                    if line.starts_with(':') {
                        continue; // comment
                    }
                    if let Some(value) = field_value(line, "event") {
                        event = Some(value);
                    } else if let Some(value) = field_value(line, "data") {
                        data.push(value);
                    }
                    // id:/retry: and unknown fields are ignored
                    continue;
                }

                // Read next chunk
                match stream.next().await {
                    Some(Ok(chunk)) => {
                        buffer.extend_from_slice(&chunk);
                    }
                    Some(Err(err)) => {
                        warn!("sse stream read error: {err}");
                        return None;
                    }
                    None => return None,
                }
            }
        },
    )
}

/// Extract the value of a `<name>:` field line, stripping one optional
/// leading space.
fn field_value(line: &str, name: &str) -> Option<String> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest).to_string())
}
