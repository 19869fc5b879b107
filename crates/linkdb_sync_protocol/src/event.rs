//! Events reported by a command channel.

use crate::request::ReadRequest;
use linkdb_core::LinkRecord;
use serde::{Deserialize, Serialize};

/// Something the command channel observed.
///
/// Record arrivals can be solicited (answering a read) or pushed by the
/// device unprompted; both are delivered the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelEvent {
    /// A database record arrived.
    RecordArrived {
        /// The record.
        record: LinkRecord,
        /// True when the record answers a read command.
        is_response: bool,
    },
    /// The device acknowledged a read command.
    Ack(ReadRequest),
    /// The device refused a read command.
    Nak(ReadRequest),
}

impl ChannelEvent {
    /// Creates a solicited record arrival.
    pub fn response(record: LinkRecord) -> Self {
        ChannelEvent::RecordArrived {
            record,
            is_response: true,
        }
    }

    /// Creates an unsolicited record arrival.
    pub fn unsolicited(record: LinkRecord) -> Self {
        ChannelEvent::RecordArrived {
            record,
            is_response: false,
        }
    }

    /// Returns the record carried by this event, if any.
    pub fn record(&self) -> Option<&LinkRecord> {
        match self {
            ChannelEvent::RecordArrived { record, .. } => Some(record),
            ChannelEvent::Ack(_) | ChannelEvent::Nak(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accessor() {
        let record = LinkRecord::high_water_mark(0x0fef);
        assert_eq!(ChannelEvent::response(record).record(), Some(&record));
        assert_eq!(ChannelEvent::unsolicited(record).record(), Some(&record));
        assert_eq!(ChannelEvent::Ack(ReadRequest::all()).record(), None);
    }

    #[test]
    fn json_shape() {
        let event = ChannelEvent::Nak(ReadRequest::one(0x0fff));
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"Nak":{"mem_addr":4095,"num_recs":1}}"#);
    }
}
