//! Inbound dispatch and outbound sending
//!
//! [`Dispatcher`] turns `(tag, payload)` into typed messages and routes each to
//! at most one handler. `feed` takes `&mut self`, so only the thread that owns
//! the dispatcher (the link reader) can dispatch; handlers run on that thread
//! in arrival order.
//!
//! [`LinkSender`] is the outbound half. It is cheap to clone and may be used
//! from any thread.

use crate::error::{Error, HandlerError, Result};
use crate::protocol::{Catalog, Message, WireMessage};
use crate::transport::{Frame, FrameSink, FLAG_REQUEST};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Return type of message handlers
pub type HandlerResult = std::result::Result<(), HandlerError>;

type Handler = Box<dyn FnMut(Message) -> HandlerResult + Send>;

/// Callback fired once when an acknowledgement arrives (or never will)
pub type AckCallback = Box<dyn FnOnce(Result<()>) + Send>;

/// What to do when a second handler is registered for a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationPolicy {
    /// Fail with [`Error::AlreadyRegistered`]
    #[default]
    Reject,
    /// Replace the existing handler
    Replace,
}

/// Result of feeding one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Decoded and handled successfully
    Dispatched,
    /// Decoded, no handler registered
    Unhandled,
    /// Decoded, handler returned an error or panicked
    HandlerFailed,
    /// Tag not in the catalog
    UnknownTag,
    /// Payload did not decode under the active layout
    Malformed,
    /// Acknowledgement of an earlier request
    Acknowledged,
}

impl FeedOutcome {
    /// Whether the payload decoded into a message
    pub fn is_decoded(self) -> bool {
        matches!(
            self,
            FeedOutcome::Dispatched | FeedOutcome::Unhandled | FeedOutcome::HandlerFailed
        )
    }
}

/// Dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub dispatched: u64,
    pub unhandled: u64,
    pub unknown: u64,
    pub malformed: u64,
    pub handler_failures: u64,
    pub acks: u64,
}

/// Routes decoded messages to registered handlers
pub struct Dispatcher {
    catalog: Arc<Catalog>,
    policy: RegistrationPolicy,
    handlers: HashMap<u16, Handler>,
    pending: Arc<PendingAcks>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(catalog: Catalog, policy: RegistrationPolicy) -> Self {
        Self {
            catalog: Arc::new(catalog),
            policy,
            handlers: HashMap::new(),
            pending: Arc::new(PendingAcks::default()),
            stats: DispatchStats::default(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    /// Whether a handler is registered for `tag`
    pub fn has_handler(&self, tag: u16) -> bool {
        self.handlers.contains_key(&tag)
    }

    /// Register a handler for a raw tag
    pub fn register<F>(&mut self, tag: u16, handler: F) -> Result<()>
    where
        F: FnMut(Message) -> HandlerResult + Send + 'static,
    {
        if self.catalog.spec(tag).is_none() {
            return Err(Error::UnknownTag(tag));
        }

        if self.handlers.contains_key(&tag) {
            match self.policy {
                RegistrationPolicy::Reject => return Err(Error::AlreadyRegistered(tag)),
                RegistrationPolicy::Replace => {
                    log::debug!("Replacing handler for tag {}", tag);
                }
            }
        }

        self.handlers.insert(tag, Box::new(handler));
        Ok(())
    }

    /// Register a handler that receives one concrete message type
    pub fn on<M, F>(&mut self, mut handler: F) -> Result<()>
    where
        M: WireMessage + 'static,
        F: FnMut(M) -> HandlerResult + Send + 'static,
    {
        let tag = self
            .catalog
            .tag_of(M::KIND)
            .ok_or(Error::UnknownTag(M::KIND.tag()))?;

        self.register(tag, move |msg| match M::from_message(msg) {
            Some(m) => handler(m),
            None => Err(format!("expected {} on tag {}", M::KIND.name(), tag).into()),
        })
    }

    /// Decode and dispatch one payload
    ///
    /// Never fails: unknown tags, malformed payloads and handler failures are
    /// logged, counted and reported through the outcome.
    pub fn feed(&mut self, tag: u16, payload: &[u8]) -> FeedOutcome {
        let msg = match self.catalog.decode(tag, payload) {
            Ok(msg) => msg,
            Err(Error::UnknownTag(_)) => {
                log::warn!("Dropping frame with unknown tag {}", tag);
                self.stats.unknown += 1;
                return FeedOutcome::UnknownTag;
            }
            Err(e) => {
                log::warn!("Dropping malformed frame (tag {}): {}", tag, e);
                self.stats.malformed += 1;
                return FeedOutcome::Malformed;
            }
        };

        let Some(handler) = self.handlers.get_mut(&tag) else {
            log::trace!("No handler for {} (tag {})", msg.kind().name(), tag);
            self.stats.unhandled += 1;
            return FeedOutcome::Unhandled;
        };

        match catch_unwind(AssertUnwindSafe(|| handler(msg))) {
            Ok(Ok(())) => {
                self.stats.dispatched += 1;
                FeedOutcome::Dispatched
            }
            Ok(Err(e)) => {
                log::error!("Handler for tag {} failed: {}", tag, e);
                self.stats.handler_failures += 1;
                FeedOutcome::HandlerFailed
            }
            Err(_) => {
                log::error!("Handler for tag {} panicked", tag);
                self.stats.handler_failures += 1;
                FeedOutcome::HandlerFailed
            }
        }
    }

    /// Dispatch a link frame, completing pending acknowledgements
    pub fn feed_frame(&mut self, frame: &Frame) -> FeedOutcome {
        if frame.is_request() {
            if !self.pending.complete(frame.id) {
                log::debug!("Ack for frame {} with no pending request", frame.id);
            }
            self.stats.acks += 1;
            return FeedOutcome::Acknowledged;
        }
        self.feed(frame.tag, &frame.payload)
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Outbound handle writing to `sink`
    ///
    /// Acknowledgements for frames sent through it are completed by
    /// [`feed_frame`](Self::feed_frame) on this dispatcher.
    pub fn sender<S: FrameSink + 'static>(&self, sink: S) -> LinkSender {
        LinkSender {
            inner: Arc::new(SenderInner {
                catalog: Arc::clone(&self.catalog),
                sink: Mutex::new(Box::new(sink)),
                next_id: AtomicU32::new(0),
                pending: Arc::clone(&self.pending),
            }),
        }
    }

    /// Fail every outstanding acknowledgement with [`Error::Disconnected`]
    pub fn fail_pending(&self) {
        self.pending.fail_all();
    }
}

// ============================================================================
// Acknowledgements
// ============================================================================

/// Ack callbacks keyed by frame id
#[derive(Default)]
struct PendingAcks {
    state: Mutex<PendingState>,
}

#[derive(Default)]
struct PendingState {
    callbacks: HashMap<u32, AckCallback>,
    /// Set once the reader has exited; no ack can arrive after that
    closed: bool,
}

impl PendingAcks {
    /// Returns the callback this one replaced, if the id was still pending
    fn insert(&self, id: u32, callback: AckCallback) -> Result<Option<AckCallback>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::Disconnected);
        }
        Ok(state.callbacks.insert(id, callback))
    }

    fn remove(&self, id: u32) -> Option<AckCallback> {
        self.state.lock().callbacks.remove(&id)
    }

    fn len(&self) -> usize {
        self.state.lock().callbacks.len()
    }

    fn complete(&self, id: u32) -> bool {
        // Callback runs outside the lock so it may send again
        match self.remove(id) {
            Some(callback) => {
                callback(Ok(()));
                true
            }
            None => false,
        }
    }

    fn fail_all(&self) {
        let drained: Vec<_> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.callbacks.drain().collect()
        };
        for (_, callback) in drained {
            callback(Err(Error::Disconnected));
        }
    }
}

// ============================================================================
// Sender
// ============================================================================

/// Thread-safe outbound message handle
#[derive(Clone)]
pub struct LinkSender {
    inner: Arc<SenderInner>,
}

struct SenderInner {
    catalog: Arc<Catalog>,
    sink: Mutex<Box<dyn FrameSink>>,
    next_id: AtomicU32,
    pending: Arc<PendingAcks>,
}

impl LinkSender {
    /// Encode and send without waiting for any reply; returns the frame id
    pub fn send(&self, msg: &Message) -> Result<u32> {
        let (tag, payload) = self.encode(msg)?;

        let mut sink = self.inner.sink.lock();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        sink.send(&Frame::new(id, tag, payload))?;

        log::trace!("Sent {} as frame {}", msg.kind().name(), id);
        Ok(id)
    }

    /// Send with the request flag set; `on_ack` fires when the ack arrives
    ///
    /// If the id is still pending when the counter wraps around to it, the
    /// older callback fails with [`Error::AckSuperseded`]. Once the reader has
    /// stopped this returns [`Error::Disconnected`] without sending, and
    /// `on_ack` is dropped uncalled.
    pub fn send_with_ack<F>(&self, msg: &Message, on_ack: F) -> Result<u32>
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let (tag, payload) = self.encode(msg)?;

        let (id, superseded, sent) = {
            let mut sink = self.inner.sink.lock();
            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            let superseded = self.inner.pending.insert(id, Box::new(on_ack))?;

            let mut frame = Frame::new(id, tag, payload);
            frame.flags |= FLAG_REQUEST;
            (id, superseded, sink.send(&frame))
        };

        if let Some(old) = superseded {
            log::warn!("Ack for frame {} never arrived before id reuse", id);
            old(Err(Error::AckSuperseded(id)));
        }

        if let Err(e) = sent {
            self.inner.pending.remove(id);
            return Err(e);
        }

        log::trace!("Sent {} as frame {} (ack requested)", msg.kind().name(), id);
        Ok(id)
    }

    /// Number of acknowledgements still outstanding
    pub fn pending_acks(&self) -> usize {
        self.inner.pending.len()
    }

    fn encode(&self, msg: &Message) -> Result<(u16, Vec<u8>)> {
        let kind = msg.kind();
        let tag = self
            .inner
            .catalog
            .tag_of(kind)
            .ok_or(Error::UnknownTag(kind.tag()))?;
        Ok((tag, self.inner.catalog.encode(msg)?))
    }

    #[cfg(test)]
    fn set_next_id(&self, id: u32) {
        self.inner.next_id.store(id, Ordering::Relaxed);
    }
}
