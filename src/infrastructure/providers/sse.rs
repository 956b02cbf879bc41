#[cfg(test)]
#[path = "sse_test.rs"]
mod tests;

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use bytes::BytesMut;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::ChatRequest;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::FragmentStream;
use crate::domain::models::Message;
use crate::domain::models::Provider;
use crate::domain::models::ProviderError;
use crate::domain::models::ProviderName;
use crate::domain::models::Reply;

const FRAME_SEPARATOR: &[u8] = b"\n\n";
const DONE_PAYLOAD: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(String),
    Done,
}

/// Splits a server-sent-event body into frames. Bytes are buffered until a
/// blank line closes the frame, so chunks may split a frame or a multi-byte
/// character anywhere. A malformed frame ends decoding, after the frames that
/// preceded it.
#[derive(Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    // Bytes before this offset are known not to start a separator.
    scanned: usize,
    finished: bool,
}

impl FrameDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Frame, ProviderError>> {
        let mut frames = vec![];
        if self.finished {
            return frames;
        }

        self.buffer.extend_from_slice(chunk);

        while let Some(idx) = self.next_separator() {
            let raw = self.buffer.split_to(idx + FRAME_SEPARATOR.len());
            self.scanned = 0;

            let text = match std::str::from_utf8(&raw[..idx]) {
                Ok(text) => text,
                Err(err) => {
                    tracing::error!(error = %err, "Received a frame that is not valid UTF-8");
                    self.finish();
                    frames.push(Err(ProviderError::Malformed(err.to_string())));
                    break;
                }
            };

            let payload = match parse_payload(text) {
                Some(payload) => payload,
                None => continue,
            };

            if payload.trim() == DONE_PAYLOAD {
                tracing::debug!("Received end of stream frame");
                self.finish();
                frames.push(Ok(Frame::Done));
                break;
            }

            tracing::debug!(payload, "Received data frame");
            frames.push(Ok(Frame::Data(payload)));
        }

        return frames;
    }

    /// Bytes of an incomplete trailing frame.
    pub fn pending(&self) -> usize {
        return self.buffer.len();
    }

    fn next_separator(&mut self) -> Option<usize> {
        let found = self.buffer[self.scanned..]
            .windows(FRAME_SEPARATOR.len())
            .position(|window| return window == FRAME_SEPARATOR);

        match found {
            Some(idx) => return Some(self.scanned + idx),
            None => {
                // The last byte may be the first half of a separator.
                self.scanned = self
                    .buffer
                    .len()
                    .saturating_sub(FRAME_SEPARATOR.len() - 1);
                return None;
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.scanned = 0;
        self.buffer.clear();
    }
}

/// The payload is everything after `data:`, verbatim. Servers streaming one
/// character per frame send a space as `data: `, so no leading space is
/// stripped.
fn parse_payload(frame: &str) -> Option<String> {
    let lines = frame
        .split('\n')
        .filter_map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            return line.strip_prefix("data:");
        })
        .collect::<Vec<&str>>();

    if lines.is_empty() {
        return None;
    }

    return Some(lines.join("\n"));
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: FrameDecoder,
    queue: VecDeque<Result<String, ProviderError>>,
    cancel: CancellationToken,
    ended: bool,
    done: bool,
}

impl StreamState {
    fn stop(mut self, err: ProviderError) -> Option<(Result<String, ProviderError>, StreamState)> {
        self.done = true;
        return Some((Err(err), self));
    }
}

async fn next_fragment(
    mut state: StreamState,
) -> Option<(Result<String, ProviderError>, StreamState)> {
    loop {
        if state.done {
            return None;
        }
        if state.cancel.is_cancelled() {
            tracing::debug!("Fragment stream aborted");
            return state.stop(ProviderError::Aborted);
        }
        match state.queue.pop_front() {
            Some(Ok(fragment)) => return Some((Ok(fragment), state)),
            Some(Err(err)) => return state.stop(err),
            None => (),
        }
        if state.ended {
            state.done = true;
            return None;
        }

        let chunk = tokio::select! {
            biased;
            _ = state.cancel.cancelled() => None,
            chunk = state.body.next() => Some(chunk),
        };

        match chunk {
            None => {
                tracing::debug!("Fragment stream aborted while waiting for data");
                return state.stop(ProviderError::Aborted);
            }
            Some(None) => {
                if state.decoder.pending() > 0 {
                    tracing::warn!(
                        bytes = state.decoder.pending(),
                        "Discarding incomplete trailing frame"
                    );
                }
                state.ended = true;
            }
            Some(Some(Err(err))) => {
                tracing::error!(error = ?err, "Fragment stream failed");
                return state.stop(err.into());
            }
            Some(Some(Ok(bytes))) => {
                for frame in state.decoder.push(&bytes) {
                    match frame {
                        Ok(Frame::Data(fragment)) => state.queue.push_back(Ok(fragment)),
                        Ok(Frame::Done) => state.ended = true,
                        Err(err) => {
                            state.queue.push_back(Err(err));
                            state.ended = true;
                        }
                    }
                }
            }
        }
    }
}

/// Streams reply fragments from `POST /api/chat/stream`.
pub struct Sse {
    url: String,
}

impl Default for Sse {
    fn default() -> Sse {
        return Sse {
            url: Config::get(ConfigKey::ServerURL),
        };
    }
}

impl Sse {
    async fn open(&self, req: &ChatRequest) -> Result<reqwest::Response, ProviderError> {
        let res = reqwest::Client::new()
            .post(format!("{url}/api/chat/stream", url = self.url))
            .json(req)
            .send()
            .await?;

        let status = res.status().as_u16();
        if !res.status().is_success() {
            tracing::error!(status, "Failed to make streaming chat request");
            return Err(ProviderError::Status(status));
        }

        return Ok(res);
    }
}

#[async_trait]
impl Provider for Sse {
    fn name(&self) -> ProviderName {
        return ProviderName::Sse;
    }

    #[allow(clippy::implicit_return)]
    async fn get_reply(
        &self,
        history: &[Message],
        cancel: CancellationToken,
    ) -> Result<Reply, ProviderError> {
        let req = ChatRequest::from_history(history)?;

        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Streaming chat request aborted");
                return Err(ProviderError::Aborted);
            }
            res = self.open(&req) => res?,
        };

        let state = StreamState {
            body: res.bytes_stream().boxed(),
            decoder: FrameDecoder::default(),
            queue: VecDeque::new(),
            cancel,
            ended: false,
            done: false,
        };

        let stream: FragmentStream = futures::stream::unfold(state, |state| {
            return next_fragment(state);
        })
        .boxed();

        return Ok(Reply::Stream(stream));
    }
}
