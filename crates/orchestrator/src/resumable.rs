//! Resumable stream manager.
//!
//! Every turn publishes its events into an in-memory replay buffer keyed by
//! stream id. Clients attach to a buffer to replay it from an offset and then
//! follow it live, so a reconnecting client picks up exactly where it left
//! off.
//!
//! - Each chat has at most one current stream; beginning a new one retires
//!   the previous id.
//! - Ids are single-use. Retired ids are remembered (bounded, oldest
//!   forgotten first) and can never be begun again.
//! - Completed buffers expire after a TTL and are swept on the next `begin`.
//! - Attaching to a retired, expired or unknown id yields an empty stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use futures::stream::{self, BoxStream};
use indexmap::IndexSet;
use tokio::sync::watch;
use tracing::debug;

use crate::error::ChatError;
use crate::events::{EventSink, StreamEvent};

/// How long a completed buffer stays resumable.
pub const DEFAULT_STREAM_TTL: Duration = Duration::from_secs(10 * 60);

/// How many retired stream ids are remembered.
const MAX_RETIRED_IDS: usize = 10_000;

/// A turn's events as seen by one client connection.
pub type EventStream = BoxStream<'static, StreamEvent>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BufferStatus {
    len: usize,
    closed: bool,
}

/// Replay buffer of one stream: one publisher, any number of attachers.
struct StreamBuffer {
    chat_id: String,
    events: RwLock<Vec<StreamEvent>>,
    status: watch::Sender<BufferStatus>,
    completed_at: Mutex<Option<Instant>>,
}

impl StreamBuffer {
    fn new(chat_id: &str) -> Self {
        let (status, _) = watch::channel(BufferStatus::default());
        Self {
            chat_id: chat_id.to_string(),
            events: RwLock::new(Vec::new()),
            status,
            completed_at: Mutex::new(None),
        }
    }

    fn event_at(&self, offset: usize) -> Option<StreamEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(offset)
            .cloned()
    }

    fn is_closed(&self) -> bool {
        self.status.borrow().closed
    }

    fn push(&self, event: StreamEvent) {
        let len = {
            let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
            events.push(event);
            events.len()
        };
        self.status.send_modify(|status| status.len = len);
    }

    fn close(&self) {
        let closed_now = self.status.send_if_modified(|status| {
            if status.closed {
                false
            } else {
                status.closed = true;
                true
            }
        });
        if closed_now {
            *self.completed_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        }
    }

    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.completed_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|completed| now.saturating_duration_since(completed) >= ttl)
            .unwrap_or(false)
    }
}

/// Write side of a stream. Dropping it closes the stream.
pub struct StreamPublisher {
    stream_id: String,
    buffer: Arc<StreamBuffer>,
}

impl StreamPublisher {
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Append an event and wake attached readers.
    ///
    /// A terminal event closes the stream; events after that are ignored.
    pub fn publish(&self, event: StreamEvent) {
        if self.buffer.is_closed() {
            debug!(stream_id = %self.stream_id, event = event.kind(), "Ignoring event on closed stream");
            return;
        }
        let terminal = event.is_terminal();
        self.buffer.push(event);
        if terminal {
            self.buffer.close();
        }
    }

    pub fn close(&self) {
        self.buffer.close();
    }
}

impl EventSink for StreamPublisher {
    fn deliver(&mut self, event: StreamEvent) {
        self.publish(event);
    }
}

impl Drop for StreamPublisher {
    fn drop(&mut self) {
        self.buffer.close();
    }
}

#[derive(Default)]
struct Registry {
    streams: HashMap<String, Arc<StreamBuffer>>,
    /// chat id -> current stream id
    current: HashMap<String, String>,
    retired: IndexSet<String>,
}

impl Registry {
    fn retire(&mut self, stream_id: &str) {
        self.streams.remove(stream_id);
        self.retired.insert(stream_id.to_string());
        while self.retired.len() > MAX_RETIRED_IDS {
            self.retired.shift_remove_index(0);
        }
    }

    fn sweep(&mut self, now: Instant, ttl: Duration) {
        let expired: Vec<(String, String)> = self
            .streams
            .iter()
            .filter(|(_, buffer)| buffer.is_expired(now, ttl))
            .map(|(id, buffer)| (id.clone(), buffer.chat_id.clone()))
            .collect();

        for (stream_id, chat_id) in expired {
            debug!(stream_id = %stream_id, chat_id = %chat_id, "Expiring stream buffer");
            self.retire(&stream_id);
            if self.current.get(&chat_id) == Some(&stream_id) {
                self.current.remove(&chat_id);
            }
        }
    }
}

/// In-memory registry of resumable streams.
///
/// Shared between the turn tasks that publish and the request handlers that
/// attach; wrap it in an `Arc` and inject it where needed.
pub struct ResumableStreams {
    registry: Mutex<Registry>,
    ttl: Duration,
}

impl Default for ResumableStreams {
    fn default() -> Self {
        Self::new()
    }
}

impl ResumableStreams {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_STREAM_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `stream_id` as the chat's current stream.
    ///
    /// The chat's previous stream id is retired. Fails with
    /// [`ChatError::Conflict`] if `stream_id` was used before.
    pub fn begin(&self, stream_id: &str, chat_id: &str) -> Result<StreamPublisher, ChatError> {
        let mut registry = self.lock();
        registry.sweep(Instant::now(), self.ttl);

        if registry.streams.contains_key(stream_id) || registry.retired.contains(stream_id) {
            return Err(ChatError::Conflict(format!(
                "stream id already used: {}",
                stream_id
            )));
        }

        if let Some(previous) = registry
            .current
            .insert(chat_id.to_string(), stream_id.to_string())
        {
            debug!(chat_id = %chat_id, stream_id = %previous, "Superseding stream");
            registry.retire(&previous);
        }

        let buffer = Arc::new(StreamBuffer::new(chat_id));
        registry.streams.insert(stream_id.to_string(), buffer.clone());
        debug!(chat_id = %chat_id, stream_id = %stream_id, "Stream begun");

        Ok(StreamPublisher {
            stream_id: stream_id.to_string(),
            buffer,
        })
    }

    /// Replay the stream from `offset`, then follow it until it closes.
    pub fn attach(&self, stream_id: &str, offset: usize) -> EventStream {
        match self.live_buffer(stream_id) {
            Some(buffer) => follow(buffer, offset),
            None => {
                debug!(stream_id = %stream_id, "Attach to unknown or retired stream");
                Box::pin(stream::empty())
            }
        }
    }

    /// Whether `stream_id` can still be attached to.
    pub fn is_resumable(&self, stream_id: &str) -> bool {
        self.live_buffer(stream_id).is_some()
    }

    /// The chat's current stream id.
    pub fn current_stream(&self, chat_id: &str) -> Option<String> {
        self.lock().current.get(chat_id).cloned()
    }

    /// Number of buffers held, including completed ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_buffer(&self, stream_id: &str) -> Option<Arc<StreamBuffer>> {
        let now = Instant::now();
        self.lock()
            .streams
            .get(stream_id)
            .filter(|buffer| !buffer.is_expired(now, self.ttl))
            .cloned()
    }
}

fn follow(buffer: Arc<StreamBuffer>, offset: usize) -> EventStream {
    let status = buffer.status.subscribe();

    Box::pin(stream::unfold(
        (buffer, status, offset),
        |(buffer, mut status, offset)| async move {
            loop {
                let current = *status.borrow_and_update();
                if offset < current.len {
                    if let Some(event) = buffer.event_at(offset) {
                        return Some((event, (buffer, status, offset + 1)));
                    }
                }
                if current.closed || status.changed().await.is_err() {
                    return None;
                }
            }
        },
    ))
}
