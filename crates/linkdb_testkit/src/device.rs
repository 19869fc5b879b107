//! An in-process device with a lossy command channel.

use linkdb_core::{LinkRecord, RECORD_STRIDE};
use linkdb_sync_engine::{CommandChannel, SentCommand, SyncResult, DEFAULT_EVENT_CAPACITY};
use linkdb_sync_protocol::{ChannelEvent, ReadRequest};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::trace;

/// How the simulated device misbehaves.
#[derive(Debug, Clone, Default)]
pub struct DeviceBehavior {
    /// Acknowledge whole-table reads but never dump anything.
    pub ignore_read_all: bool,
    /// Deliver only this many records per whole-table dump.
    pub bulk_limit: Option<usize>,
    /// Addresses that never make it through a whole-table dump.
    pub lost_in_bulk: BTreeSet<u16>,
    /// Silently drop this many commands before answering any.
    pub drop_first: usize,
    /// Do not answer single reads of `0x0000`.
    pub ignore_first_record_query: bool,
    /// Delay between a command and its answer.
    pub latency: Option<Duration>,
}

impl DeviceBehavior {
    /// A device that answers everything at once.
    pub fn reliable() -> Self {
        Self::default()
    }

    /// Never dumps the whole table.
    #[must_use]
    pub fn ignore_read_all(mut self) -> Self {
        self.ignore_read_all = true;
        self
    }

    /// Truncates whole-table dumps.
    #[must_use]
    pub fn bulk_limit(mut self, records: usize) -> Self {
        self.bulk_limit = Some(records);
        self
    }

    /// Loses `addrs` from every whole-table dump.
    #[must_use]
    pub fn lose_in_bulk(mut self, addrs: impl IntoIterator<Item = u16>) -> Self {
        self.lost_in_bulk.extend(addrs);
        self
    }

    /// Drops the first `commands` commands.
    #[must_use]
    pub fn drop_first(mut self, commands: usize) -> Self {
        self.drop_first = commands;
        self
    }

    /// Ignores single reads of `0x0000`.
    #[must_use]
    pub fn ignore_first_record_query(mut self) -> Self {
        self.ignore_first_record_query = true;
        self
    }

    /// Answers after `latency`.
    #[must_use]
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

/// A device holding a link table, reachable through a lossy channel.
///
/// Answers whole-table reads by dumping its table from the head down and
/// single reads with the record at the address (`0x0000` meaning the head).
/// Every command that is not dropped is acknowledged; reads of addresses
/// outside the table are refused.
pub struct SimulatedDevice {
    table: Mutex<BTreeMap<u16, LinkRecord>>,
    behavior: Mutex<DeviceBehavior>,
    events: broadcast::Sender<ChannelEvent>,
    log: Mutex<Vec<SentCommand>>,
}

impl SimulatedDevice {
    /// Creates a reliable device holding `records`.
    pub fn new(records: impl IntoIterator<Item = LinkRecord>) -> Self {
        Self::with_behavior(records, DeviceBehavior::reliable())
    }

    /// Creates a device with the given behavior.
    pub fn with_behavior(
        records: impl IntoIterator<Item = LinkRecord>,
        behavior: DeviceBehavior,
    ) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            table: Mutex::new(records.into_iter().map(|r| (r.mem_addr, r)).collect()),
            behavior: Mutex::new(behavior),
            events,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the behavior; applies to later commands.
    pub fn set_behavior(&self, behavior: DeviceBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Adds or replaces a record and announces it unsolicited.
    pub fn push_unsolicited(&self, record: LinkRecord) {
        self.table.lock().insert(record.mem_addr, record);
        let _ = self.events.send(ChannelEvent::unsolicited(record));
    }

    /// Every command received, dropped ones included.
    pub fn commands(&self) -> Vec<SentCommand> {
        self.log.lock().clone()
    }

    /// The requests received, in order.
    pub fn requests(&self) -> Vec<ReadRequest> {
        self.log.lock().iter().map(|c| c.request).collect()
    }

    /// The device's table, head first.
    pub fn table(&self) -> Vec<LinkRecord> {
        self.table.lock().values().rev().copied().collect()
    }

    fn head(&self) -> Option<u16> {
        self.table.lock().keys().next_back().copied()
    }

    fn answer(&self, request: &ReadRequest, behavior: &DeviceBehavior) -> Vec<ChannelEvent> {
        let mut events = vec![ChannelEvent::Ack(*request)];

        if request.is_read_all() {
            if !behavior.ignore_read_all {
                let table = self.table.lock();
                let dump = table
                    .values()
                    .rev()
                    .filter(|r| !behavior.lost_in_bulk.contains(&r.mem_addr))
                    .take(behavior.bulk_limit.unwrap_or(usize::MAX))
                    .map(|r| ChannelEvent::response(*r));
                events.extend(dump);
            }
            return events;
        }

        if request.mem_addr == 0x0000 && behavior.ignore_first_record_query {
            return events;
        }
        let start = match request.mem_addr {
            0x0000 => self.head(),
            addr => Some(addr),
        };
        let table = self.table.lock();
        let found: Vec<_> = start
            .into_iter()
            .flat_map(|start| {
                (0..request.num_recs.max(1))
                    .map_while(move |i| start.checked_sub(i * RECORD_STRIDE))
            })
            .map_while(|addr| table.get(&addr))
            .map(|r| ChannelEvent::response(*r))
            .collect();

        if found.is_empty() {
            return vec![ChannelEvent::Nak(*request)];
        }
        events.extend(found);
        events
    }

    fn deliver(&self, events: Vec<ChannelEvent>, latency: Option<Duration>) {
        match latency {
            Some(latency) => {
                let sender = self.events.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(latency).await;
                    for event in events {
                        let _ = sender.send(event);
                    }
                });
            }
            None => {
                for event in events {
                    let _ = self.events.send(event);
                }
            }
        }
    }
}

impl std::fmt::Debug for SimulatedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedDevice")
            .field("records", &self.table.lock().len())
            .field("behavior", &*self.behavior.lock())
            .finish_non_exhaustive()
    }
}

impl CommandChannel for SimulatedDevice {
    fn send_read(&self, request: ReadRequest) -> SyncResult<()> {
        let received = {
            let mut log = self.log.lock();
            log.push(SentCommand {
                request,
                at: Instant::now(),
            });
            log.len()
        };

        let behavior = self.behavior.lock().clone();
        if received <= behavior.drop_first {
            trace!("device dropped {:?}", request);
            return Ok(());
        }

        let events = self.answer(&request, &behavior);
        self.deliver(events, behavior.latency);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::contiguous_table;

    fn drain(rx: &mut broadcast::Receiver<ChannelEvent>) -> Vec<ChannelEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn record_addrs(events: &[ChannelEvent]) -> Vec<u16> {
        events.iter().filter_map(|e| e.record()).map(|r| r.mem_addr).collect()
    }

    #[tokio::test]
    async fn dumps_table_head_first() {
        let device = SimulatedDevice::new(contiguous_table(0x0fff, 2));
        let mut rx = device.subscribe();
        device.send_read(ReadRequest::all()).unwrap();

        let events = drain(&mut rx);
        assert_eq!(events[0], ChannelEvent::Ack(ReadRequest::all()));
        assert_eq!(record_addrs(&events), vec![0x0fff, 0x0ff7, 0x0fef]);
    }

    #[tokio::test]
    async fn lossy_and_truncated_dumps() {
        let behavior = DeviceBehavior::reliable().lose_in_bulk([0x0ff7]).bulk_limit(2);
        let device = SimulatedDevice::with_behavior(contiguous_table(0x0fff, 3), behavior);
        let mut rx = device.subscribe();
        device.send_read(ReadRequest::all()).unwrap();
        assert_eq!(record_addrs(&drain(&mut rx)), vec![0x0fff, 0x0fef]);
    }

    #[tokio::test]
    async fn single_reads() {
        let device = SimulatedDevice::new(contiguous_table(0x0fff, 3));
        let mut rx = device.subscribe();

        device.send_read(ReadRequest::one(0x0000)).unwrap();
        assert_eq!(record_addrs(&drain(&mut rx)), vec![0x0fff]);

        device.send_read(ReadRequest::new(0x0ff7, 2).unwrap()).unwrap();
        assert_eq!(record_addrs(&drain(&mut rx)), vec![0x0ff7, 0x0fef]);

        device.send_read(ReadRequest::one(0x0a00)).unwrap();
        assert_eq!(drain(&mut rx), vec![ChannelEvent::Nak(ReadRequest::one(0x0a00))]);
    }

    #[tokio::test]
    async fn drops_first_commands() {
        let behavior = DeviceBehavior::reliable().drop_first(2);
        let device = SimulatedDevice::with_behavior(contiguous_table(0x0fff, 1), behavior);
        let mut rx = device.subscribe();

        device.send_read(ReadRequest::all()).unwrap();
        device.send_read(ReadRequest::all()).unwrap();
        assert!(drain(&mut rx).is_empty());

        device.send_read(ReadRequest::all()).unwrap();
        assert_eq!(record_addrs(&drain(&mut rx)).len(), 2);
        assert_eq!(device.requests().len(), 3);
    }

    #[tokio::test]
    async fn pushed_records_join_the_table() {
        let device = SimulatedDevice::new(contiguous_table(0x0fff, 1));
        let mut rx = device.subscribe();

        let mut replaced = crate::fixtures::record(0x0ff7);
        replaced.group = 9;
        device.push_unsolicited(replaced);

        assert_eq!(drain(&mut rx), vec![ChannelEvent::unsolicited(replaced)]);
        let table = device.table();
        assert_eq!(table.len(), 2);
        assert_eq!(table[1], replaced);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_answers() {
        let behavior = DeviceBehavior::reliable().latency(Duration::from_secs(4));
        let device = SimulatedDevice::with_behavior(contiguous_table(0x0fff, 1), behavior);
        let mut rx = device.subscribe();

        device.send_read(ReadRequest::one(0x0fff)).unwrap();
        tokio::task::yield_now().await;
        assert!(drain(&mut rx).is_empty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(record_addrs(&drain(&mut rx)), vec![0x0fff]);
    }
}
