//! Reasoning extraction for models that think inside `<think>` tags.
//!
//! [`TagExtractor`] splits streamed text into answer and reasoning segments.
//! Tags may be split across deltas; an opening tag with no closing tag turns
//! everything after it into reasoning until the stream ends.
//! [`ExtractReasoning`] wraps any [`Brain`] with this splitting.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::error::BrainError;
use crate::trait_def::{Brain, BrainEvent, BrainStream, CompletionRequest};

/// Default tag name used by reasoning models.
pub const DEFAULT_REASONING_TAG: &str = "think";

/// A piece of streamed text classified by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Reasoning(String),
}

impl Segment {
    fn into_event(self) -> BrainEvent {
        match self {
            Segment::Text(text) => BrainEvent::TextDelta(text),
            Segment::Reasoning(text) => BrainEvent::ReasoningDelta(text),
        }
    }
}

/// Incremental `<tag>…</tag>` splitter.
#[derive(Debug, Clone)]
pub struct TagExtractor {
    open: String,
    close: String,
    in_reasoning: bool,
    buffer: String,
}

impl TagExtractor {
    pub fn new(tag: &str) -> Self {
        Self {
            open: format!("<{}>", tag),
            close: format!("</{}>", tag),
            in_reasoning: false,
            buffer: String::new(),
        }
    }

    /// Feed a delta and return the segments that are safe to emit.
    ///
    /// A trailing fragment that could be the start of a tag is held back
    /// until the next delta (or [`finish`](Self::finish)).
    pub fn push(&mut self, delta: &str) -> Vec<Segment> {
        self.buffer.push_str(delta);
        let mut segments = Vec::new();

        loop {
            let tag = if self.in_reasoning { &self.close } else { &self.open };

            if let Some(idx) = self.buffer.find(tag.as_str()) {
                let before: String = self.buffer[..idx].to_string();
                let tag_len = tag.len();
                self.buffer.drain(..idx + tag_len);
                self.emit(&mut segments, before);
                self.in_reasoning = !self.in_reasoning;
                continue;
            }

            let keep = partial_suffix_len(&self.buffer, tag);
            let ready_len = self.buffer.len() - keep;
            let ready: String = self.buffer.drain(..ready_len).collect();
            self.emit(&mut segments, ready);
            break;
        }

        segments
    }

    /// Flush whatever is buffered at end of stream.
    pub fn finish(&mut self) -> Vec<Segment> {
        let rest = std::mem::take(&mut self.buffer);
        let mut segments = Vec::new();
        self.emit(&mut segments, rest);
        segments
    }

    fn emit(&self, segments: &mut Vec<Segment>, text: String) {
        if text.is_empty() {
            return;
        }
        if self.in_reasoning {
            segments.push(Segment::Reasoning(text));
        } else {
            segments.push(Segment::Text(text));
        }
    }
}

/// Length of the longest suffix of `buffer` that is a proper prefix of `tag`.
fn partial_suffix_len(buffer: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&len| buffer.ends_with(&tag[..len]))
        .unwrap_or(0)
}

/// A brain wrapper that moves `<think>` content into reasoning deltas.
pub struct ExtractReasoning {
    inner: Arc<dyn Brain>,
    tag: String,
    name: String,
}

impl ExtractReasoning {
    pub fn new(inner: Arc<dyn Brain>) -> Self {
        Self::with_tag(inner, DEFAULT_REASONING_TAG)
    }

    pub fn with_tag(inner: Arc<dyn Brain>, tag: impl Into<String>) -> Self {
        let name = format!("{}+reasoning", inner.name());
        Self {
            inner,
            tag: tag.into(),
            name,
        }
    }
}

struct SplitState {
    inner: BrainStream,
    extractor: TagExtractor,
    pending: VecDeque<Result<BrainEvent, BrainError>>,
    done: bool,
}

impl SplitState {
    fn flush(&mut self) {
        let segments = self.extractor.finish();
        self.pending
            .extend(segments.into_iter().map(|segment| Ok(segment.into_event())));
    }
}

fn split_reasoning(inner: BrainStream, extractor: TagExtractor) -> BrainStream {
    let state = SplitState {
        inner,
        extractor,
        pending: VecDeque::new(),
        done: false,
    };

    let stream = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(BrainEvent::TextDelta(delta))) => {
                    let segments = state.extractor.push(&delta);
                    state
                        .pending
                        .extend(segments.into_iter().map(|segment| Ok(segment.into_event())));
                }
                Some(Ok(finish @ BrainEvent::Finish { .. })) => {
                    state.flush();
                    state.pending.push_back(Ok(finish));
                }
                Some(other) => state.pending.push_back(other),
                None => {
                    state.flush();
                    state.done = true;
                }
            }
        }
    });

    Box::pin(stream)
}

#[async_trait]
impl Brain for ExtractReasoning {
    async fn stream(&self, request: CompletionRequest) -> Result<BrainStream, BrainError> {
        let inner = self.inner.stream(request).await?;
        Ok(split_reasoning(inner, TagExtractor::new(&self.tag)))
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn is_ready(&self) -> bool {
        self.inner.is_ready().await
    }
}
