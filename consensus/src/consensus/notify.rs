//! Typed consensus events delivered over channels
//!
//! Events are sent in commit order while the DAG lock is still held; the send
//! never blocks. Subscribers consume them on their own task and must not call
//! back into the engine from the receiving side of a send.

use crate::consensus::types::BlockStatus;
use consensus_core::Hash;
use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsensusEvent {
    BlockAdded { hash: Hash, blue_score: u64, status: BlockStatus, was_unorphaned: bool },
    /// Selected chain moved; `removed` runs from the old tip down, `added` from the fork point up
    ChainChanged { removed: Vec<Hash>, added: Vec<Hash> },
    FinalityConflict { id: u64, current_selected_tip: Hash, violating_block: Hash },
    FinalityConflictResolved { id: u64, finality_point: Hash },
}

#[derive(Default)]
pub struct Notifier {
    subscribers: Mutex<Vec<UnboundedSender<ConsensusEvent>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<ConsensusEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Delivers `events` to every live subscriber, dropping closed ones
    pub fn notify(&self, events: impl IntoIterator<Item = ConsensusEvent>) {
        let mut subscribers = self.subscribers.lock();
        for event in events {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_in_order_and_closed_subscribers_dropped() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let dropped = notifier.subscribe();
        drop(dropped);

        let a = Hash::from_le_u64([1, 0, 0, 0]);
        notifier.notify([
            ConsensusEvent::BlockAdded { hash: a, blue_score: 1, status: BlockStatus::Valid, was_unorphaned: false },
            ConsensusEvent::ChainChanged { removed: vec![], added: vec![a] },
        ]);
        assert_eq!(notifier.subscriber_count(), 1);
        assert!(matches!(rx.try_recv().unwrap(), ConsensusEvent::BlockAdded { .. }));
        assert_eq!(rx.try_recv().unwrap(), ConsensusEvent::ChainChanged { removed: vec![], added: vec![a] });
        assert!(rx.try_recv().is_err());
    }
}
