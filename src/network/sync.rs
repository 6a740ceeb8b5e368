//! Block propagation and next-block sync
//!
//! Producers (the mining worker, the inbound server, the CLI) never talk to
//! the transport directly. They queue a [`SyncEvent`] and the coordinator
//! thread turns it into a protocol message for the whole peer group.

use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::network::{GroupBroadcast, Message};
use crate::storage::ChainHeightStore;
use log::{debug, error, info, warn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A block was produced locally and stored.
    BlockMined(Block),
    /// The block after the given index is wanted; `None`/`0` means "after the
    /// last index in the height store".
    NextBlockNeeded(Option<u64>),
}

pub struct SyncCoordinator {
    transport: Arc<dyn GroupBroadcast>,
    heights: Arc<dyn ChainHeightStore>,
}

impl SyncCoordinator {
    pub fn new(
        transport: Arc<dyn GroupBroadcast>,
        heights: Arc<dyn ChainHeightStore>,
    ) -> SyncCoordinator {
        SyncCoordinator { transport, heights }
    }

    /// Announce a freshly mined block to the group. No acknowledgement is awaited.
    pub fn on_block_mined(&self, block: &Block) -> Result<()> {
        info!("Broadcasting new block {}", block.get_index());
        let message = Message::new_block(block)?;
        let report = self.transport.broadcast(&message)?;
        if !report.failed.is_empty() {
            warn!(
                "Block {} reached {} peers, {} unreachable",
                block.get_index(),
                report.delivered.len(),
                report.failed.len()
            );
        }
        Ok(())
    }

    /// Ask the group for the block after `known_index`. Returns `Ok(false)`
    /// when no height is known and the request was skipped.
    pub fn on_next_block_needed(&self, known_index: Option<u64>) -> Result<bool> {
        let known_index = match known_index {
            Some(index) if index > 0 => index,
            _ => match self.heights.get_last_block_index() {
                Some(index) => index,
                None => {
                    debug!("No chain height known, skipping next block request");
                    return Ok(false);
                }
            },
        };

        let wanted = known_index.checked_add(1).ok_or_else(|| {
            BlockchainError::Network(format!("No block index follows {known_index}"))
        })?;
        info!("Requesting block {wanted} from the group");
        self.transport
            .broadcast(&Message::fetch_next_block(wanted)?)?;
        Ok(true)
    }

    /// Handle one event; delivery failures are reported, not retried.
    pub fn handle(&self, event: &SyncEvent) -> Result<()> {
        match event {
            SyncEvent::BlockMined(block) => self.on_block_mined(block),
            SyncEvent::NextBlockNeeded(known_index) => {
                self.on_next_block_needed(*known_index).map(|_| ())
            }
        }
    }

    /// Consume events until every sender is dropped.
    pub fn run(self, events: Receiver<SyncEvent>) {
        for event in events {
            if let Err(e) = self.handle(&event) {
                error!("Failed to deliver {}: {e}", event_name(&event));
            }
        }
        info!("Sync coordinator stopped");
    }

    /// Start the coordinator on its own thread and hand back the event sender.
    pub fn spawn(self) -> Result<(Sender<SyncEvent>, JoinHandle<()>)> {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("sync-coordinator".to_string())
            .spawn(move || self.run(receiver))?;
        Ok((sender, handle))
    }
}

fn event_name(event: &SyncEvent) -> String {
    match event {
        SyncEvent::BlockMined(block) => format!("new block {}", block.get_index()),
        SyncEvent::NextBlockNeeded(index) => format!("next block request after {index:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Miner, ProofOfWork};
    use crate::network::{BroadcastReport, MessageType};
    use crate::storage::{FixedCoinbase, InMemoryHeight};
    use crate::wallet::Identity;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Message>>,
        fail: bool,
    }

    impl GroupBroadcast for RecordingTransport {
        fn broadcast(&self, message: &Message) -> Result<BroadcastReport> {
            if self.fail {
                return Err(BlockchainError::Network("group unreachable".to_string()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(BroadcastReport {
                delivered: vec!["peer".to_string()],
                failed: vec![],
            })
        }
    }

    fn genesis() -> Block {
        let miner = Miner::new(
            ProofOfWork::new(8).unwrap(),
            Arc::new(InMemoryHeight::new()),
            Arc::new(FixedCoinbase::new(Identity::watch_only(vec![4; 65]))),
        );
        miner.produce_next_block(None).unwrap()
    }

    #[test]
    fn test_mined_block_is_broadcast() {
        let transport = Arc::new(RecordingTransport::default());
        let coordinator = SyncCoordinator::new(transport.clone(), Arc::new(InMemoryHeight::new()));
        let block = genesis();

        coordinator.on_block_mined(&block).unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_type, MessageType::NewBlock);
        assert_eq!(sent[0].decode_block().unwrap(), block);
    }

    #[test]
    fn test_explicit_index_requests_the_next_one() {
        let transport = Arc::new(RecordingTransport::default());
        let coordinator = SyncCoordinator::new(transport.clone(), Arc::new(InMemoryHeight::new()));

        assert!(coordinator.on_next_block_needed(Some(7)).unwrap());
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].message_type, MessageType::FetchNextBlock);
        assert_eq!(sent[0].decode_index().unwrap(), 8);
    }

    #[test]
    fn test_zero_or_missing_index_reads_the_height_store() {
        let transport = Arc::new(RecordingTransport::default());
        let coordinator =
            SyncCoordinator::new(transport.clone(), Arc::new(InMemoryHeight::starting_at(3)));

        assert!(coordinator.on_next_block_needed(Some(0)).unwrap());
        assert!(coordinator.on_next_block_needed(None).unwrap());
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].decode_index().unwrap(), 4);
        assert_eq!(sent[1].decode_index().unwrap(), 4);
    }

    #[test]
    fn test_last_possible_index_has_no_successor() {
        let transport = Arc::new(RecordingTransport::default());
        let coordinator = SyncCoordinator::new(transport.clone(), Arc::new(InMemoryHeight::new()));

        let result = coordinator.on_next_block_needed(Some(u64::MAX));
        assert!(matches!(result, Err(BlockchainError::Network(_))));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_height_skips_the_request() {
        let transport = Arc::new(RecordingTransport::default());
        let coordinator = SyncCoordinator::new(transport.clone(), Arc::new(InMemoryHeight::new()));

        assert!(!coordinator.on_next_block_needed(None).unwrap());
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_transport_failure_is_reported() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let coordinator = SyncCoordinator::new(transport, Arc::new(InMemoryHeight::starting_at(1)));

        assert!(coordinator.on_block_mined(&genesis()).is_err());
        assert!(coordinator.on_next_block_needed(None).is_err());
    }

    #[test]
    fn test_events_flow_through_the_channel() {
        let transport = Arc::new(RecordingTransport::default());
        let coordinator =
            SyncCoordinator::new(transport.clone(), Arc::new(InMemoryHeight::starting_at(1)));
        let (sender, handle) = coordinator.spawn().unwrap();

        sender.send(SyncEvent::BlockMined(genesis())).unwrap();
        sender.send(SyncEvent::NextBlockNeeded(None)).unwrap();
        drop(sender);
        handle.join().unwrap();

        let kinds: Vec<MessageType> = transport
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.message_type)
            .collect();
        assert_eq!(kinds, vec![MessageType::NewBlock, MessageType::FetchNextBlock]);
    }
}
