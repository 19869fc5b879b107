//! Sync engine state machine.

use crate::channel::CommandChannel;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::planner::{LastCommand, ReadPlanner, RetryCounters, Step};
use linkdb_core::{LinkRecord, LoadStatus, RecordStore, Upsert};
use linkdb_sync_protocol::{ChannelEvent, ReadRequest};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No pass is running.
    Idle,
    /// Sending whole-table reads.
    ReadingAll,
    /// Whole-table budget spent; reading missing records one at a time.
    FillingGaps,
    /// Reading a requested address.
    ReadingOne,
}

impl SyncState {
    /// Returns true if a pass is running.
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle)
    }
}

/// How a read pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Everything that was asked for is in the store.
    Complete,
    /// A retry budget ran out; the store holds whatever arrived.
    PartialTimeout,
    /// Nothing left to ask for, yet the table never reached a high-water mark.
    Anomaly,
}

impl ReadOutcome {
    /// Returns true for [`ReadOutcome::Complete`].
    pub fn is_complete(&self) -> bool {
        matches!(self, ReadOutcome::Complete)
    }
}

/// Result of a read pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    /// How the pass ended.
    pub outcome: ReadOutcome,
    /// Commands issued during the pass, including ones the channel
    /// rejected with a retryable error.
    pub commands_sent: u32,
    /// Records in the store when the pass ended.
    pub records_loaded: usize,
    /// Time from the first command to the end of the pass.
    pub duration: Duration,
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes that ran to an outcome.
    pub passes_completed: u64,
    /// Commands the channel accepted.
    pub commands_sent: u64,
    /// Record arrivals, duplicates included.
    pub records_received: u64,
    /// Acks from the device.
    pub acks: u64,
    /// Naks from the device.
    pub naks: u64,
    /// Events lost because the subscriber lagged.
    pub events_lagged: u64,
    /// Outcome of the most recent pass.
    pub last_outcome: Option<ReadOutcome>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Completion signal for a read started with [`SyncEngine::read`].
///
/// Dropping the handle does not stop the pass.
#[derive(Debug)]
pub struct ReadHandle {
    rx: oneshot::Receiver<SyncResult<ReadResult>>,
}

impl ReadHandle {
    /// Waits for the pass to finish.
    pub async fn wait(self) -> SyncResult<ReadResult> {
        self.rx.await.map_err(|_| SyncError::TaskDropped)?
    }
}

struct Shared<C> {
    config: SyncConfig,
    channel: C,
    store: RwLock<RecordStore>,
    planner: Mutex<ReadPlanner>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    /// Held for the whole of a pass; waiters queue in FIFO order.
    pass_lock: tokio::sync::Mutex<()>,
    /// Closes when the engine is dropped.
    shutdown: watch::Receiver<()>,
}

/// The sync engine keeps a local copy of one device's link database.
///
/// Records arriving on the channel are stored as they come, whether or not
/// a pass is running. A pass sends read commands and arms a timer after
/// each one; only timer expiry decides whether to stop, retry, or ask for a
/// different address. Passes never overlap.
///
/// Dropping the engine stops event handling and ends any pass still
/// running or queued with [`SyncError::TaskDropped`].
pub struct SyncEngine<C: CommandChannel> {
    shared: Arc<Shared<C>>,
    runtime: Handle,
    listener: JoinHandle<()>,
    _shutdown: watch::Sender<()>,
}

impl<C: CommandChannel> SyncEngine<C> {
    /// Creates a new sync engine and subscribes to the channel's events.
    ///
    /// Fails with [`SyncError::NoRuntime`] outside a Tokio runtime.
    pub fn new(config: SyncConfig, channel: C, store: RecordStore) -> SyncResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let (shutdown_tx, shutdown) = watch::channel(());
        let events = channel.subscribe();
        let shared = Arc::new(Shared {
            planner: Mutex::new(ReadPlanner::new(config.retry.clone())),
            config,
            channel,
            store: RwLock::new(store),
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            pass_lock: tokio::sync::Mutex::new(()),
            shutdown,
        });
        let listener = runtime.spawn(listen(Arc::clone(&shared), events));

        Ok(Self {
            shared,
            runtime,
            listener,
            _shutdown: shutdown_tx,
        })
    }

    /// Starts a read and returns immediately.
    ///
    /// `mem_addr == 0x0000` with `num_recs == 0` reads the whole table; any
    /// other combination reads `num_recs` records from `mem_addr`.
    pub fn read(&self, mem_addr: u16, num_recs: u16) -> SyncResult<ReadHandle> {
        let request = ReadRequest::new(mem_addr, num_recs)?;
        let shared = Arc::clone(&self.shared);
        let (tx, rx) = oneshot::channel();
        self.runtime.spawn(async move {
            let result = shared.run_pass(request).await;
            // The caller may have dropped the handle.
            let _ = tx.send(result);
        });
        Ok(ReadHandle { rx })
    }

    /// Reads and waits for the pass to finish.
    pub async fn async_read(&self, mem_addr: u16, num_recs: u16) -> SyncResult<ReadResult> {
        let request = ReadRequest::new(mem_addr, num_recs)?;
        self.shared.run_pass(request).await
    }

    /// Reads the whole table.
    pub async fn read_all(&self) -> SyncResult<ReadResult> {
        self.shared.run_pass(ReadRequest::all()).await
    }

    /// Reads the record at `mem_addr`.
    pub async fn read_one(&self, mem_addr: u16) -> SyncResult<ReadResult> {
        self.shared.run_pass(ReadRequest::one(mem_addr)).await
    }

    /// Stores a record that arrived outside the channel's event stream.
    pub fn on_record_received(&self, record: LinkRecord) {
        self.shared.on_record_received(record, false);
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.shared.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.read().clone()
    }

    /// Gets the retry counters of the current or last pass.
    pub fn retry_counters(&self) -> RetryCounters {
        self.shared.planner.lock().counters()
    }

    /// Returns true if the store holds the complete table.
    pub fn is_loaded(&self) -> bool {
        self.shared.store.read().is_loaded()
    }

    /// Returns the coarse load state of the store.
    pub fn load_status(&self) -> LoadStatus {
        self.shared.store.read().load_status()
    }

    /// Returns the record at `mem_addr`.
    pub fn record(&self, mem_addr: u16) -> Option<LinkRecord> {
        self.shared.store.read().get(mem_addr).copied()
    }

    /// Returns a copy of the store.
    pub fn snapshot(&self) -> RecordStore {
        self.shared.store.read().clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// Returns the channel.
    pub fn channel(&self) -> &C {
        &self.shared.channel
    }
}

impl<C: CommandChannel> Drop for SyncEngine<C> {
    fn drop(&mut self) {
        // Passes see the shutdown channel close once `_shutdown` is dropped.
        self.listener.abort();
    }
}

impl<C: CommandChannel> std::fmt::Debug for SyncEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("state", &self.state())
            .field("records", &self.shared.store.read().len())
            .finish_non_exhaustive()
    }
}

impl<C: CommandChannel> Shared<C> {
    /// Runs one pass to an outcome.
    async fn run_pass(&self, request: ReadRequest) -> SyncResult<ReadResult> {
        let mut shutdown = self.shutdown.clone();
        let _pass = tokio::select! {
            biased;
            _ = shutdown.changed() => {
                debug!("Engine dropped before {:?} started", request);
                return Err(SyncError::TaskDropped);
            }
            pass = self.pass_lock.lock() => pass,
        };
        let start = Instant::now();
        let mut commands_sent = 0u32;

        let result = self.drive(request, &mut commands_sent, &mut shutdown).await;
        self.set_state(SyncState::Idle);

        let mut stats = self.stats.write();
        match result {
            Ok(outcome) => {
                let result = ReadResult {
                    outcome,
                    commands_sent,
                    records_loaded: self.store.read().len(),
                    duration: start.elapsed(),
                };
                match outcome {
                    ReadOutcome::Complete => info!(
                        "Read {:?} complete with {} records",
                        request, result.records_loaded
                    ),
                    _ => warn!(
                        "Read {:?} ended {:?} with {} records",
                        request, outcome, result.records_loaded
                    ),
                }
                stats.passes_completed += 1;
                stats.last_outcome = Some(outcome);
                stats.last_error = None;
                Ok(result)
            }
            Err(e) => {
                stats.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        request: ReadRequest,
        commands_sent: &mut u32,
        shutdown: &mut watch::Receiver<()>,
    ) -> SyncResult<ReadOutcome> {
        let mut step = self.planner.lock().begin(request);
        loop {
            match step {
                Step::Finish(outcome) => return Ok(outcome),
                Step::Send {
                    request,
                    timer_ticks,
                } => {
                    self.set_state(self.phase());
                    self.send(request, timer_ticks)?;
                    *commands_sent += 1;

                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => {
                            debug!("Engine dropped, abandoning {:?}", request);
                            return Err(SyncError::TaskDropped);
                        }
                        () = tokio::time::sleep(self.config.ticks(timer_ticks)) => {}
                    }

                    let store = self.store.read();
                    step = self.planner.lock().on_timer_expired(&store);
                }
            }
        }
    }

    fn send(&self, request: ReadRequest, timer_ticks: u32) -> SyncResult<()> {
        debug!("Attempting to read {:?}, timer {} ticks", request, timer_ticks);
        match self.channel.send_read(request) {
            Ok(()) => {
                self.stats.write().commands_sent += 1;
                Ok(())
            }
            // Same as a dropped command: the timer still runs and the planner retries.
            Err(e) if e.is_retryable() => {
                warn!("Read {:?} not sent: {}", request, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn phase(&self) -> SyncState {
        let planner = self.planner.lock();
        match planner.last_command() {
            Some(LastCommand::ReadAll) if planner.in_bulk_phase() => SyncState::ReadingAll,
            Some(LastCommand::ReadAll) => SyncState::FillingGaps,
            Some(LastCommand::ReadOne) => SyncState::ReadingOne,
            None => SyncState::Idle,
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    fn on_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::RecordArrived {
                record,
                is_response,
            } => self.on_record_received(record, is_response),
            ChannelEvent::Ack(request) => {
                debug!("Device acknowledged {:?}", request);
                self.stats.write().acks += 1;
            }
            ChannelEvent::Nak(request) => {
                warn!("Device refused {:?}", request);
                self.stats.write().naks += 1;
            }
        }
    }

    fn on_record_received(&self, record: LinkRecord, is_response: bool) {
        let (upsert, len) = {
            let mut store = self.store.write();
            let upsert = store.upsert(record);
            (upsert, store.len())
        };
        self.stats.write().records_received += 1;
        debug!(
            "Record {:#06x} arrived (response: {}): {:?}",
            record.mem_addr, is_response, upsert
        );
        if upsert == Upsert::Inserted {
            info!("Received {} records", len);
        }
    }
}

/// Applies channel events until the channel goes away.
async fn listen<C: CommandChannel>(
    shared: Arc<Shared<C>>,
    mut events: broadcast::Receiver<ChannelEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => shared.on_event(event),
            Err(RecvError::Lagged(missed)) => {
                warn!("Command channel lagged, {} events lost", missed);
                shared.stats.write().events_lagged += missed;
            }
            Err(RecvError::Closed) => {
                debug!("Command channel closed");
                break;
            }
        }
    }
}
