//! Server-sent event framing over a `reqwest` byte stream.

use crate::catalog::ports::{CatalogFetchError, CatalogFetchResult};
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;

/// Splits a byte stream into trimmed lines. Blank lines are kept as empty
/// strings since they end an event.
#[derive(Debug, Default)]
pub(super) struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub(super) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        self.drain_lines(false)
    }

    pub(super) fn finish(&mut self) -> Vec<String> {
        self.drain_lines(true)
    }

    fn drain_lines(&mut self, flush: bool) -> Vec<String> {
        let mut lines = Vec::new();
        let mut consumed = 0;

        while let Some(offset) = self
            .buffer
            .get(consumed..)
            .and_then(|rest| rest.iter().position(|byte| *byte == b'\n'))
        {
            let newline_index = consumed + offset;
            if let Some(text) = self
                .buffer
                .get(consumed..newline_index)
                .and_then(|line| std::str::from_utf8(line).ok())
            {
                lines.push(text.trim().to_owned());
            }
            consumed = newline_index + 1;
        }

        if flush {
            if let Some(text) = self
                .buffer
                .get(consumed..)
                .and_then(|rest| std::str::from_utf8(rest).ok())
            {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_owned());
                }
            }
            self.buffer.clear();
        } else if consumed > 0 {
            self.buffer.drain(..consumed);
        }

        lines
    }
}

/// Returns whether a `Content-Type` value denotes an event stream.
pub(super) fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

/// One dispatched event: its `event:` name, if any, and its `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SseEvent {
    pub(super) name: Option<String>,
    pub(super) data: String,
}

/// Reads [`SseEvent`]s from a byte stream.
///
/// Consecutive `data:` lines are joined with `\n` and dispatched as one
/// event when a blank line or the end of the stream is reached.
pub(super) struct SseEventStream<S> {
    stream: S,
    lines: SseLineBuffer,
    ready: VecDeque<SseEvent>,
    pending_name: Option<String>,
    pending_data: Vec<String>,
    finished: bool,
}

impl<S, B> SseEventStream<S>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    pub(super) fn new(stream: S) -> Self {
        Self {
            stream,
            lines: SseLineBuffer::default(),
            ready: VecDeque::new(),
            pending_name: None,
            pending_data: Vec::new(),
            finished: false,
        }
    }

    /// Returns the next event, or `None` once the stream ends.
    pub(super) async fn next_event(&mut self) -> CatalogFetchResult<Option<SseEvent>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }

            match self.stream.next().await {
                Some(received) => {
                    let chunk = received.map_err(CatalogFetchError::transport)?;
                    let lines = self.lines.push(chunk.as_ref());
                    self.absorb(lines);
                }
                None => {
                    self.finished = true;
                    let lines = self.lines.finish();
                    self.absorb(lines);
                    self.dispatch();
                }
            }
        }
    }

    fn absorb(&mut self, lines: Vec<String>) {
        for line in lines {
            if line.is_empty() {
                self.dispatch();
            } else if let Some(name) = line.strip_prefix("event:") {
                self.pending_name = Some(name.trim().to_owned());
            } else if let Some(data) = line.strip_prefix("data:") {
                self.pending_data.push(data.trim().to_owned());
            }
        }
    }

    fn dispatch(&mut self) {
        if self.pending_data.is_empty() {
            self.pending_name = None;
            return;
        }
        let data = std::mem::take(&mut self.pending_data).join("\n");
        self.ready.push_back(SseEvent {
            name: self.pending_name.take(),
            data,
        });
    }
}
