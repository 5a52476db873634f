//! Server-Sent Events (SSE) framing for streaming responses.
//!
//! This module turns the raw byte stream of an HTTP response into a stream of
//! [`SseEvent`] frames.  Interpreting the `data` payload is left to each
//! vendor backend.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_EVENTS};
use crate::{Error, Result};

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// The `event:` field, if present.
    pub event: Option<String>,
    /// All `data:` lines joined with newlines.
    pub data: String,
}

/// Process a stream of bytes into a stream of server-sent events.
///
/// Frames are delimited by a blank line.  Bytes are buffered until a full
/// frame is available, so multi-byte characters and frames split across
/// chunks are reassembled.  Frames without `data:` lines (comments,
/// keep-alives) are skipped.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<SseEvent>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + Send + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });
    frames(stream)
}

pub(crate) fn frames<S>(stream: S) -> impl Stream<Item = Result<SseEvent>>
where
    S: Stream<Item = Result<Bytes>> + Unpin + Send + 'static,
{
    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (stream, buffer, false),
        move |(mut stream, mut buffer, mut done)| async move {
            loop {
                // First check if we have a complete frame in the buffer
                while let Some((frame, remaining)) = split_frame(&buffer) {
                    buffer = remaining;
                    match parse_frame(&frame) {
                        Ok(Some(event)) => {
                            STREAM_EVENTS.click();
                            return Some((Ok(event), (stream, buffer, done)));
                        }
                        Ok(None) => continue,
                        Err(e) => {
                            STREAM_ERRORS.click();
                            return Some((Err(e), (stream, buffer, done)));
                        }
                    }
                }

                if done {
                    return None;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        STREAM_ERRORS.click();
                        return Some((Err(e), (stream, buffer, true)));
                    }
                    None => {
                        // A trailing frame without the final blank line still counts.
                        done = true;
                        if buffer.iter().any(|b| !b.is_ascii_whitespace()) {
                            buffer.extend_from_slice(b"\n\n");
                        } else {
                            buffer.clear();
                        }
                    }
                }
            }
        },
    )
}

/// Splits the first complete frame off `buffer`.
fn split_frame(buffer: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    let mut i = 0;
    while i < buffer.len() {
        if buffer[i] == b'\n' {
            let next = &buffer[i + 1..];
            if next.starts_with(b"\n") {
                return Some((buffer[..i].to_vec(), buffer[i + 2..].to_vec()));
            }
            if next.starts_with(b"\r\n") {
                return Some((buffer[..i].to_vec(), buffer[i + 3..].to_vec()));
            }
        }
        i += 1;
    }
    None
}

fn parse_frame(frame: &[u8]) -> Result<Option<SseEvent>> {
    let text = std::str::from_utf8(frame)?;
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    if data.is_empty() {
        return Ok(None);
    }
    Ok(Some(SseEvent {
        event,
        data: data.join("\n"),
    }))
}
