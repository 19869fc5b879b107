//! Retry planning for read passes.
//!
//! The planner owns the retry counters and decides, each time a command's
//! timer expires, whether the pass is finished or what to send next. It
//! never touches the channel or the clock.

use crate::config::RetryConfig;
use crate::gap::next_missing_record;
use crate::state::ReadOutcome;
use linkdb_core::RecordStore;
use linkdb_sync_protocol::ReadRequest;
use tracing::{debug, error, info, warn};

/// The kind of pass in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LastCommand {
    ReadAll,
    ReadOne,
}

/// What the engine should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Send `request` and wait `timer_ticks`.
    Send {
        request: ReadRequest,
        timer_ticks: u32,
    },
    /// The pass is over.
    Finish(ReadOutcome),
}

/// Snapshot of the retry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryCounters {
    /// Whole-table attempts whose timer expired.
    pub read_all: u32,
    /// Retries of the current single address.
    pub read_one: u32,
    /// Address most recently targeted by a gap-directed read.
    pub last_mem_addr: u16,
}

#[derive(Debug)]
pub(crate) struct ReadPlanner {
    limits: RetryConfig,
    last_command: Option<LastCommand>,
    target: ReadRequest,
    retries_all: u32,
    retries_one: u32,
    last_mem_addr: u16,
    head_forced: bool,
}

impl ReadPlanner {
    pub(crate) fn new(limits: RetryConfig) -> Self {
        Self {
            limits,
            last_command: None,
            target: ReadRequest::all(),
            retries_all: 0,
            retries_one: 0,
            last_mem_addr: 0,
            head_forced: false,
        }
    }

    /// Resets the counters and returns the first command of a pass.
    pub(crate) fn begin(&mut self, request: ReadRequest) -> Step {
        self.last_command = Some(if request.is_read_all() {
            LastCommand::ReadAll
        } else {
            LastCommand::ReadOne
        });
        self.target = request;
        self.retries_all = 0;
        self.retries_one = 0;
        self.last_mem_addr = 0;
        self.head_forced = false;
        self.send(request, 0)
    }

    /// Decides what follows the expiry of the last command's timer.
    pub(crate) fn on_timer_expired(&mut self, store: &RecordStore) -> Step {
        match self.last_command {
            Some(LastCommand::ReadAll) => self.manage_read_all(store),
            Some(LastCommand::ReadOne) => self.manage_read_one(store),
            None => Step::Finish(ReadOutcome::Complete),
        }
    }

    /// True while whole-table reads are still being sent.
    pub(crate) fn in_bulk_phase(&self) -> bool {
        self.retries_all < self.limits.max_read_all_attempts
    }

    pub(crate) fn last_command(&self) -> Option<LastCommand> {
        self.last_command
    }

    pub(crate) fn counters(&self) -> RetryCounters {
        RetryCounters {
            read_all: self.retries_all,
            read_one: self.retries_one,
            last_mem_addr: self.last_mem_addr,
        }
    }

    fn manage_read_all(&mut self, store: &RecordStore) -> Step {
        if store.is_loaded() {
            return Step::Finish(ReadOutcome::Complete);
        }

        if self.in_bulk_phase() {
            self.retries_all += 1;
            if self.in_bulk_phase() {
                info!("Retry reading all records {} times", self.retries_all);
                return self.send(ReadRequest::all(), self.retries_all);
            }
            info!(
                "Read all failed {} times, reading missing records one at a time",
                self.retries_all
            );
        }

        self.read_next_missing(store)
    }

    fn read_next_missing(&mut self, store: &RecordStore) -> Step {
        let head_retries_exhausted =
            self.last_mem_addr == 0 && self.retries_one >= self.limits.max_read_one_retries;
        let force_head = self.head_forced || head_retries_exhausted;

        let Some(next) = next_missing_record(store, force_head) else {
            error!("No record left to read but the table is not complete");
            return Step::Finish(ReadOutcome::Anomaly);
        };
        if force_head && !store.has_first_record() {
            self.head_forced = true;
        }

        if next == self.last_mem_addr {
            if self.retries_one < self.limits.max_read_one_retries {
                self.retries_one += 1;
                info!("Retry reading {:#06x} record {} times", next, self.retries_one);
                self.send(ReadRequest::one(next), self.retries_one)
            } else {
                warn!(
                    "Giving up on {:#06x} after {} retries",
                    next, self.retries_one
                );
                Step::Finish(ReadOutcome::PartialTimeout)
            }
        } else {
            debug!("Next missing record is {:#06x}", next);
            self.last_mem_addr = next;
            self.retries_one = 0;
            self.send(ReadRequest::one(next), 0)
        }
    }

    fn manage_read_one(&mut self, store: &RecordStore) -> Step {
        if self.target.is_satisfied_by(store) {
            return Step::Finish(ReadOutcome::Complete);
        }
        if self.retries_one < self.limits.max_read_one_retries {
            self.retries_one += 1;
            info!(
                "Retry reading {:#06x} record {} times",
                self.target.mem_addr, self.retries_one
            );
            self.send(self.target, self.retries_one)
        } else {
            warn!(
                "Giving up on {:#06x} after {} retries",
                self.target.mem_addr, self.retries_one
            );
            Step::Finish(ReadOutcome::PartialTimeout)
        }
    }

    fn send(&self, request: ReadRequest, retries: u32) -> Step {
        Step::Send {
            request,
            timer_ticks: self.limits.timer_for(retries),
        }
    }
}
