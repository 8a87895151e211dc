use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::client::ChunkStream;
use crate::{ChatChunk, FailureKind, ModelError};

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: String,
}

/// Splits a byte stream into newline-delimited JSON chat chunks.
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Feeds bytes, appending every chunk completed by them to `out`.
    /// Chunks decoded before a bad line are still delivered.
    pub(crate) fn push(
        &mut self,
        bytes: &[u8],
        out: &mut VecDeque<ChatChunk>,
    ) -> Result<(), ModelError> {
        self.buffer.extend_from_slice(bytes);
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(chunk) = parse_line(&line)? {
                out.push_back(chunk);
            }
        }
        Ok(())
    }

    /// Parses whatever is left once the byte stream ends.
    pub(crate) fn finish(&mut self) -> Result<Option<ChatChunk>, ModelError> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Result<Option<ChatChunk>, ModelError> {
    let text = std::str::from_utf8(line)
        .map_err(|err| ModelError::new(FailureKind::Malformed, format!("invalid utf-8: {err}")))?
        .trim();
    if text.is_empty() {
        return Ok(None);
    }
    let wire: WireChunk = serde_json::from_str(text)
        .map_err(|err| ModelError::new(FailureKind::Malformed, err.to_string()))?;
    if let Some(error) = wire.error {
        return Err(ModelError::new(FailureKind::Server, error));
    }
    Ok(Some(ChatChunk {
        content: wire.message.map(|m| m.content).unwrap_or_default(),
        done: wire.done,
    }))
}

struct DecodeState {
    bytes: std::pin::Pin<Box<dyn Stream<Item = Result<Bytes, ModelError>> + Send>>,
    decoder: LineDecoder,
    pending: VecDeque<ChatChunk>,
    failure: Option<ModelError>,
    finished: bool,
}

/// Turns a raw NDJSON body into a stream of chat chunks. The first error
/// ends the stream.
pub fn decode_ndjson<S>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, ModelError>> + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: LineDecoder::default(),
        pending: VecDeque::new(),
        failure: None,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.pending.pop_front() {
                return Some((Ok(chunk), state));
            }
            if let Some(err) = state.failure.take() {
                return Some((Err(err), state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    if let Err(err) = state.decoder.push(&bytes, &mut state.pending) {
                        state.finished = true;
                        state.failure = Some(err);
                    }
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.finished = true;
                    match state.decoder.finish() {
                        Ok(Some(chunk)) => state.pending.push_back(chunk),
                        Ok(None) => {}
                        Err(err) => return Some((Err(err), state)),
                    }
                }
            }
        }
    })
    .boxed()
}
