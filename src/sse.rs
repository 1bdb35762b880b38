//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! The completion API streams `data: {json}` events separated by blank lines
//! and terminates the stream with `data: [DONE]`. This module turns the raw
//! byte stream into parsed [`ChatCompletionChunk`]s.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_EVENTS};
use crate::types::ChatCompletionChunk;
use crate::{Error, Result};

/// Marker sent as the final data payload.
const DONE_MARKER: &str = "[DONE]";

/// Outcome of extracting one event from the buffer.
enum Extracted {
    Chunk(Result<ChatCompletionChunk>),
    Skip,
    Done,
}

/// Process a stream of bytes into a stream of completion chunks.
///
/// The returned stream ends at the `[DONE]` marker or when the underlying
/// byte stream ends, whichever comes first. Transport errors and malformed
/// events are yielded as `Err` items.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<ChatCompletionChunk>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| {
        result.map_err(|e| {
            STREAM_ERRORS.click();
            Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
        })
    });

    let buffer = String::new();
    let pending: Vec<u8> = Vec::new();
    let done = false;

    stream::unfold(
        (stream, buffer, pending, done),
        move |(mut stream, mut buffer, mut pending, mut done)| async move {
            if done {
                return None;
            }
            loop {
                // Drain complete events before reading more bytes.
                while let Some((extracted, remaining)) = extract_event(&buffer) {
                    buffer = remaining;
                    match extracted {
                        Extracted::Chunk(chunk) => {
                            STREAM_EVENTS.click();
                            return Some((chunk, (stream, buffer, pending, done)));
                        }
                        Extracted::Skip => continue,
                        Extracted::Done => return None,
                    }
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        pending.extend_from_slice(&bytes);
                        if let Err(e) = decode_pending(&mut pending, &mut buffer) {
                            STREAM_ERRORS.click();
                            done = true;
                            return Some((Err(e), (stream, buffer, pending, done)));
                        }
                    }
                    Some(Err(e)) => {
                        done = true;
                        return Some((Err(e), (stream, buffer, pending, done)));
                    }
                    None => {
                        // A final event may lack its trailing blank line.
                        done = true;
                        if !buffer.trim().is_empty() {
                            let tail = std::mem::take(&mut buffer);
                            if let Extracted::Chunk(chunk) = parse_event(&tail) {
                                return Some((chunk, (stream, buffer, pending, done)));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Move the decodable prefix of `pending` into `buffer`.
///
/// A multi-byte character split across network chunks stays in `pending`
/// until the rest of it arrives.
fn decode_pending(pending: &mut Vec<u8>, buffer: &mut String) -> Result<()> {
    let valid = match std::str::from_utf8(pending.as_slice()) {
        Ok(text) => {
            buffer.push_str(&text.replace('\r', ""));
            pending.len()
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let text = std::str::from_utf8(&pending[..valid])?;
            buffer.push_str(&text.replace('\r', ""));
            valid
        }
        Err(e) => {
            return Err(Error::streaming(
                format!("Invalid UTF-8 in stream: {e}"),
                Some(Box::new(e)),
            ));
        }
    };
    pending.drain(..valid);
    Ok(())
}

/// Extract a complete SSE event from a buffer string.
///
/// Returns `None` when the buffer does not yet hold a full event.
fn extract_event(buffer: &str) -> Option<(Extracted, String)> {
    let (event_text, rest) = buffer.split_once("\n\n")?;
    Some((parse_event(event_text), rest.to_string()))
}

/// Parse the text of one event.
fn parse_event(event_text: &str) -> Extracted {
    let data: Vec<&str> = event_text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect();
    if data.is_empty() {
        // Comments, keep-alives and bare `event:` lines.
        return Extracted::Skip;
    }
    let data = data.join("\n");
    if data == DONE_MARKER {
        return Extracted::Done;
    }

    #[derive(Deserialize)]
    struct StreamErrorBody {
        error: StreamErrorDetail,
    }

    #[derive(Deserialize)]
    struct StreamErrorDetail {
        #[serde(rename = "type")]
        error_type: Option<String>,
        message: Option<String>,
    }

    if let Ok(body) = serde_json::from_str::<StreamErrorBody>(&data) {
        STREAM_ERRORS.click();
        return Extracted::Chunk(Err(Error::api(
            500,
            body.error.error_type.or_else(|| Some("stream_error".to_string())),
            body.error.message.unwrap_or(data),
        )));
    }

    match serde_json::from_str::<ChatCompletionChunk>(&data) {
        Ok(chunk) => Extracted::Chunk(Ok(chunk)),
        Err(e) => {
            STREAM_ERRORS.click();
            Extracted::Chunk(Err(Error::streaming(
                format!("Failed to parse event JSON: {e}"),
                Some(Box::new(e)),
            )))
        }
    }
}
