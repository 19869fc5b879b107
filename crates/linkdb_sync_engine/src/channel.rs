//! Command channel abstraction.

use crate::error::{SyncError, SyncResult};
use linkdb_core::LinkRecord;
use linkdb_sync_protocol::{ChannelEvent, ReadRequest};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Default capacity of a channel's event broadcast.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// A half-duplex command channel to one device.
///
/// Sending is fire-and-forget: a successful `send_read` only means the
/// command left this process. Records, acks and naks come back later (or
/// never) through the event stream.
pub trait CommandChannel: Send + Sync + 'static {
    /// Sends a read command.
    fn send_read(&self, request: ReadRequest) -> SyncResult<()>;

    /// Subscribes to events from the device.
    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent>;
}

/// A command recorded by [`MockChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentCommand {
    /// The command.
    pub request: ReadRequest,
    /// When it was sent.
    pub at: Instant,
}

/// Builds the events a scripted device answers a command with.
pub type Responder = Box<dyn Fn(&ReadRequest) -> Vec<ChannelEvent> + Send + Sync>;

/// A mock channel for testing.
///
/// Records every command, optionally answers through a scripted responder,
/// and lets tests inject events directly.
pub struct MockChannel {
    connected: AtomicBool,
    events: broadcast::Sender<ChannelEvent>,
    sent: Mutex<Vec<SentCommand>>,
    responder: Mutex<Option<Responder>>,
    failures: Mutex<VecDeque<SyncError>>,
}

impl MockChannel {
    /// Creates a connected mock channel that never answers.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a mock channel with the given event capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            connected: AtomicBool::new(true),
            events,
            sent: Mutex::new(Vec::new()),
            responder: Mutex::new(None),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Sets the function that answers each command.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&ReadRequest) -> Vec<ChannelEvent> + Send + Sync + 'static,
    {
        *self.responder.lock() = Some(Box::new(responder));
    }

    /// Stops answering commands.
    pub fn clear_responder(&self) {
        *self.responder.lock() = None;
    }

    /// Makes the next `send_read` fail with `error`.
    pub fn fail_next(&self, error: SyncError) {
        self.failures.lock().push_back(error);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Delivers an event to subscribers.
    pub fn emit(&self, event: ChannelEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Delivers an unsolicited record.
    pub fn push_record(&self, record: LinkRecord) {
        self.emit(ChannelEvent::unsolicited(record));
    }

    /// Every command sent so far.
    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent.lock().clone()
    }

    /// The requests sent so far, in order.
    pub fn requests(&self) -> Vec<ReadRequest> {
        self.sent.lock().iter().map(|c| c.request).collect()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChannel")
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .field("sent", &self.sent.lock().len())
            .finish_non_exhaustive()
    }
}

impl CommandChannel for MockChannel {
    fn send_read(&self, request: ReadRequest) -> SyncResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::NotConnected);
        }
        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }

        self.sent.lock().push(SentCommand {
            request,
            at: Instant::now(),
        });

        let replies = match self.responder.lock().as_ref() {
            Some(responder) => responder(&request),
            None => Vec::new(),
        };
        for event in replies {
            self.emit(event);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }
}
