//! Engine mailbox vocabulary
//!
//! Everything the engine consumes arrives as an [`Event`]: inbound text
//! or binary frames fed by the transport driver, or a [`Command`] issued
//! by application code. The engine drains one mailbox sequentially, so
//! all state mutations are serialized without locks.

use crate::protocol::types::{Call, ErrorData, Id};
use serde_json::Value;
use std::collections::BTreeSet;
use tokio::sync::oneshot;

/// Outcome of a single call as routed back to its waiter.
pub type CallOutcome = Result<Value, ErrorData>;

/// One unit of engine input.
pub enum Event {
    /// An inbound text frame from the transport
    Text(String),
    /// An inbound binary frame from the transport (always rejected)
    Binary(Vec<u8>),
    /// An application-initiated command
    Command(Command),
}

/// Application-initiated commands consumed by the engine.
///
/// `RemoveWaiting`/`RemoveWaitingBatch` are issued by the caller after
/// its wait completes, win or lose; the engine never reaps entries on
/// its own.
pub enum Command {
    /// Send a request and park a waiter under its id.
    Request {
        id: Id,
        method: String,
        params: Option<Value>,
        reply: oneshot::Sender<CallOutcome>,
    },
    /// Send a notification; nothing to correlate.
    Notification {
        method: String,
        params: Option<Value>,
    },
    /// Send a batch and park a waiter under its request id-set.
    Batch {
        calls: Vec<Call>,
        ids: BTreeSet<Id>,
        reply: oneshot::Sender<BatchResults>,
    },
    /// Reap a pending call entry.
    RemoveWaiting { id: Id },
    /// Reap a pending batch entry.
    RemoveWaitingBatch { ids: BTreeSet<Id> },
    /// Stop the engine normally.
    Close,
}

/// Results of a batch call, keyed by request id.
///
/// Lookup is by id, but iteration order mirrors the wire response array,
/// so observed behavior is deterministic for tests and logs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchResults {
    entries: Vec<(Id, CallOutcome)>,
}

impl BatchResults {
    pub(crate) fn new(entries: Vec<(Id, CallOutcome)>) -> Self {
        Self { entries }
    }

    /// The outcome for the given request id, if the response array
    /// contained one.
    pub fn get(&self, id: &Id) -> Option<&CallOutcome> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, outcome)| outcome)
    }

    /// Iterate outcomes in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &(Id, CallOutcome)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for BatchResults {
    type Item = (Id, CallOutcome);
    type IntoIter = std::vec::IntoIter<(Id, CallOutcome)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_by_id_preserving_wire_order() {
        let results = BatchResults::new(vec![
            (Id::Int(2), Ok(json!("B"))),
            (Id::Int(1), Err(ErrorData::new(7, "x"))),
        ]);

        assert_eq!(results.len(), 2);
        assert_eq!(results.get(&Id::Int(2)), Some(&Ok(json!("B"))));
        assert_eq!(
            results.get(&Id::Int(1)),
            Some(&Err(ErrorData::new(7, "x")))
        );
        assert_eq!(results.get(&Id::Int(3)), None);

        let order: Vec<&Id> = results.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![&Id::Int(2), &Id::Int(1)]);
    }
}
