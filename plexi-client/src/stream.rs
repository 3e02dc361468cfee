//! Single-pass adapter over the provider's server-sent event stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio_stream::Stream;

use crate::error::{Error, Result};
use crate::wire::StreamChunk;

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Lazy, forward-only sequence of text fragments from a streaming completion.
///
/// Wraps the live SSE byte stream and yields each delta's content as a plain
/// `String`, stripping all wire metadata. Length is unbounded and determined
/// by the upstream stream. The stream is fused: after the terminal `[DONE]`
/// event, the end of the transport stream, or a transport error, it yields
/// `None` forever and never replays.
///
/// Clean exhaustion and failure are distinct outcomes: end-of-stream is
/// `None`, a real error is `Some(Err(_))`.
pub struct ReplyStream {
    inner: ByteStream,
    buffer: String,
    done: bool,
}

/// Outcome of parsing one SSE event block.
enum Event {
    Fragment(String),
    Done,
    Skip,
    Malformed(serde_json::Error),
}

impl ReplyStream {
    pub(crate) fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
            buffer: String::new(),
            done: false,
        }
    }

    /// Pull the next complete event block out of the buffer, if one is there.
    fn next_event(&mut self) -> Option<String> {
        let end = self.buffer.find("\n\n")?;
        let event = self.buffer[..end].to_string();
        self.buffer.drain(..end + 2);
        Some(event)
    }
}

fn parse_event(event: &str) -> Event {
    let Some(data) = event.trim().strip_prefix(DATA_PREFIX) else {
        // Comments and keep-alive blocks carry no data line.
        return Event::Skip;
    };
    if data.trim() == DONE_MARKER {
        return Event::Done;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => match chunk.choices.first().and_then(|c| c.delta.content.clone()) {
            Some(content) if !content.is_empty() => Event::Fragment(content),
            // Role-only and empty deltas carry no text.
            _ => Event::Skip,
        },
        Err(e) => Event::Malformed(e),
    }
}

impl Stream for ReplyStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        loop {
            while let Some(event) = this.next_event() {
                match parse_event(&event) {
                    Event::Fragment(text) => return Poll::Ready(Some(Ok(text))),
                    Event::Done => {
                        this.done = true;
                        return Poll::Ready(None);
                    }
                    Event::Skip => {}
                    Event::Malformed(e) => {
                        return Poll::Ready(Some(Err(Error::Serialization(e))));
                    }
                }
            }
            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.push_str(&String::from_utf8_lossy(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
