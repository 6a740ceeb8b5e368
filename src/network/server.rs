use crate::core::{Block, Miner, SupersedeHandle, GENESIS_INDEX};
use crate::error::{BlockchainError, Result};
use crate::network::{Envelope, Message, MessageType, SyncEvent, TcpTransport};
use crate::storage::ChainStore;
use log::{debug, error, info, warn};
use serde_json::Deserializer;
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// What happened to a block received from a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Extended the local chain.
    Stored,
    /// Already have a block at that index.
    Duplicate,
    /// Failed the hash, proof-of-work or linkage checks.
    Rejected,
    /// From further ahead than the next index; a fetch was queued.
    Gap,
}

/// Inbound side of the node: one thread per connection, one envelope per connection.
pub struct Server {
    store: ChainStore,
    miner: Arc<Miner>,
    transport: Arc<TcpTransport>,
    events: Sender<SyncEvent>,
    superseder: Option<SupersedeHandle>,
}

impl Server {
    pub fn new(
        store: ChainStore,
        miner: Arc<Miner>,
        transport: Arc<TcpTransport>,
        events: Sender<SyncEvent>,
        superseder: Option<SupersedeHandle>,
    ) -> Server {
        Server {
            store,
            miner,
            transport,
            events,
            superseder,
        }
    }

    pub fn run(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;
        self.serve(listener)
    }

    pub fn serve(self, listener: TcpListener) -> Result<()> {
        info!("Server listening on {}", listener.local_addr()?);
        let server = Arc::new(self);

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let peer_addr = match stream.peer_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get peer address: {e}");
                            continue;
                        }
                    };
                    let server = Arc::clone(&server);
                    thread::spawn(move || {
                        if let Err(e) = server.handle_connection(stream, peer_addr) {
                            error!("Error handling connection from {peer_addr}: {e}");
                        }
                    });
                }
                Err(e) => error!("Error accepting connection: {e}"),
            }
        }
        Ok(())
    }

    fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;

        let reader = BufReader::new(&stream);
        for envelope in Deserializer::from_reader(reader).into_iter::<Envelope>() {
            let envelope = envelope.map_err(|e| {
                BlockchainError::Network(format!("Failed to deserialize envelope: {e}"))
            })?;
            debug!(
                "Received {:?} from {peer_addr} ({})",
                envelope.message.message_type, envelope.addr_from
            );
            if let Err(e) = self.process_envelope(&envelope) {
                error!("Error processing message from {}: {e}", envelope.addr_from);
            }
        }

        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }

    pub fn process_envelope(&self, envelope: &Envelope) -> Result<()> {
        match envelope.message.message_type {
            MessageType::NewBlock => {
                let block = envelope.message.decode_block()?;
                self.handle_new_block(block, &envelope.addr_from).map(|_| ())
            }
            MessageType::FetchNextBlock => {
                let index = envelope.message.decode_index()?;
                self.handle_fetch_next_block(index, &envelope.addr_from)
            }
        }
    }

    /// Peers may resend or reorder blocks; anything at or below the local tip is ignored.
    pub fn handle_new_block(&self, block: Block, addr_from: &str) -> Result<BlockOutcome> {
        let index = block.get_index();
        if !self.is_acceptable(&block) {
            warn!("Rejecting block {index} from {addr_from}: hash or proof of work does not hold");
            return Ok(BlockOutcome::Rejected);
        }

        let local = self.store.tip_block()?.map(|tip| tip.get_index());
        let next = local.map_or(GENESIS_INDEX, |tip| tip + 1);
        if index < next {
            debug!("Ignoring block {index} from {addr_from}, already at {local:?}");
            return Ok(BlockOutcome::Duplicate);
        }
        if index > next {
            info!("Block {index} from {addr_from} is ahead of local height {local:?}");
            match local {
                Some(_) => self.queue(SyncEvent::NextBlockNeeded(local)),
                // nothing stored yet, so there is no height to sync from
                None => self
                    .transport
                    .send_to(addr_from, &Message::fetch_next_block(GENESIS_INDEX)?)?,
            }
            return Ok(BlockOutcome::Gap);
        }

        if !self.store.append_block(&block)? {
            warn!("Rejecting block {index} from {addr_from}: does not link to the local tip");
            return Ok(BlockOutcome::Rejected);
        }
        info!("Added block {} from {addr_from}", block.get_hash());

        if let Some(superseder) = &self.superseder {
            superseder.supersede();
        }
        self.queue(SyncEvent::NextBlockNeeded(Some(index)));
        Ok(BlockOutcome::Stored)
    }

    // Genesis is not mined, so it is accepted only when its header is the
    // one this node would build itself.
    fn is_acceptable(&self, block: &Block) -> bool {
        if !block.is_well_formed() {
            return false;
        }
        if block.get_header().is_genesis() {
            return block.get_hash() == self.miner.genesis_header().get_hash();
        }
        self.miner.validate_block(block)
    }

    pub fn handle_fetch_next_block(&self, index: u64, addr_from: &str) -> Result<()> {
        match self.store.get_block(index)? {
            Some(block) => {
                info!("Sending block {index} to {addr_from}");
                self.transport.send_to(addr_from, &Message::new_block(&block)?)
            }
            None => {
                debug!("Block {index} requested by {addr_from} is not stored here");
                Ok(())
            }
        }
    }

    /// Ask the group for whatever follows the local chain.
    pub fn request_sync(&self) {
        self.queue(SyncEvent::NextBlockNeeded(None));
    }

    fn queue(&self, event: SyncEvent) {
        if self.events.send(event).is_err() {
            warn!("Sync coordinator is gone, dropping sync event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProofOfWork;
    use crate::network::Peers;
    use crate::storage::{ChainHeightStore, FixedCoinbase, InMemoryHeight};
    use crate::wallet::Identity;
    use std::io::Read;
    use std::sync::mpsc::{self, Receiver};
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        store: ChainStore,
        server: Server,
        events: Receiver<SyncEvent>,
        // produces blocks the way a remote peer would
        remote: Miner,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path().join("db")).unwrap();
        let shared = Arc::new(store.clone());
        let miner = Arc::new(Miner::new(ProofOfWork::new(8).unwrap(), shared.clone(), shared));
        let transport = Arc::new(TcpTransport::new(
            "127.0.0.1:2001".to_string(),
            Arc::new(Peers::new()),
        ));
        let (tx, rx) = mpsc::channel();
        let server = Server::new(store.clone(), miner, transport, tx, None);

        let remote = Miner::new(
            ProofOfWork::new(8).unwrap(),
            Arc::new(InMemoryHeight::new()),
            Arc::new(FixedCoinbase::new(Identity::watch_only(vec![7; 65]))),
        );
        Fixture {
            _dir: dir,
            store,
            server,
            events: rx,
            remote,
        }
    }

    #[test]
    fn test_peer_chain_is_accepted_in_order() {
        let f = fixture();
        let genesis = f.remote.produce_next_block(None).unwrap();
        let b2 = f.remote.produce_next_block(Some(&genesis)).unwrap();

        assert_eq!(f.server.handle_new_block(genesis, "peer").unwrap(), BlockOutcome::Stored);
        assert_eq!(f.server.handle_new_block(b2.clone(), "peer").unwrap(), BlockOutcome::Stored);
        assert_eq!(f.store.get_last_block_index(), Some(2));
        assert_eq!(f.store.tip_block().unwrap(), Some(b2));

        let requested: Vec<Option<u64>> = f
            .events
            .try_iter()
            .map(|event| match event {
                SyncEvent::NextBlockNeeded(index) => index,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(requested, vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_duplicates_are_ignored() {
        let f = fixture();
        let genesis = f.remote.produce_next_block(None).unwrap();
        f.server.handle_new_block(genesis.clone(), "peer").unwrap();
        assert_eq!(f.server.handle_new_block(genesis, "peer").unwrap(), BlockOutcome::Duplicate);
    }

    #[test]
    fn test_block_from_the_future_triggers_fetch() {
        let f = fixture();
        let genesis = f.remote.produce_next_block(None).unwrap();
        let b2 = f.remote.produce_next_block(Some(&genesis)).unwrap();
        let b3 = f.remote.produce_next_block(Some(&b2)).unwrap();
        f.server.handle_new_block(genesis, "peer").unwrap();
        let _ = f.events.try_iter().count();

        assert_eq!(f.server.handle_new_block(b3, "peer").unwrap(), BlockOutcome::Gap);
        match f.events.try_recv().unwrap() {
            SyncEvent::NextBlockNeeded(index) => assert_eq!(index, Some(1)),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_bad_pow_and_foreign_genesis_are_rejected() {
        let f = fixture();
        let genesis = f.remote.produce_next_block(None).unwrap();
        let b2 = f.remote.produce_next_block(Some(&genesis)).unwrap();
        f.server.handle_new_block(genesis, "peer").unwrap();

        let mut header = b2.get_header().clone();
        let mut nonce = header.get_nonce();
        loop {
            nonce += 1;
            header.set_nonce(nonce);
            if !ProofOfWork::validate(&header) {
                break;
            }
        }
        let tampered = Block::new(header, b2.get_transactions().to_vec());
        assert_eq!(f.server.handle_new_block(tampered, "peer").unwrap(), BlockOutcome::Rejected);
        assert_eq!(f.store.get_last_block_index(), Some(1));

        let foreign_miner = Miner::new(
            ProofOfWork::new(9).unwrap(),
            Arc::new(InMemoryHeight::new()),
            Arc::new(FixedCoinbase::new(Identity::watch_only(vec![7; 65]))),
        );
        let fresh = fixture();
        let foreign_genesis = foreign_miner.produce_next_block(None).unwrap();
        assert_eq!(
            fresh.server.handle_new_block(foreign_genesis, "peer").unwrap(),
            BlockOutcome::Rejected
        );
    }

    #[test]
    fn test_cached_hash_must_match_the_header() {
        let f = fixture();
        let genesis = f.remote.produce_next_block(None).unwrap();
        let reward = genesis.get_transactions().to_vec();

        // real genesis hash string, different nonce
        let mut header = genesis.get_header().clone();
        header.set_nonce(7);
        let forged_genesis = Block::new(header, reward.clone());
        assert_eq!(forged_genesis.get_hash(), genesis.get_hash());
        assert_eq!(
            f.server.handle_new_block(forged_genesis, "peer").unwrap(),
            BlockOutcome::Rejected
        );
        assert_eq!(f.store.tip_block().unwrap(), None);

        assert_eq!(f.server.handle_new_block(genesis.clone(), "peer").unwrap(), BlockOutcome::Stored);

        // valid proof of work, made-up cached hash
        let b2 = f.remote.produce_next_block(Some(&genesis)).unwrap();
        let mut header = b2.get_header().clone();
        let target = header.get_difficulty_target();
        let nonce = header.get_nonce();
        header.seal(&target, nonce, "ff".repeat(32));
        assert!(ProofOfWork::validate(&header));
        let forged_b2 = Block::new(header, b2.get_transactions().to_vec());
        assert_eq!(
            f.server.handle_new_block(forged_b2, "peer").unwrap(),
            BlockOutcome::Rejected
        );
        assert_eq!(f.store.get_last_block_index(), Some(1));
        assert_eq!(f.store.tip_block().unwrap(), Some(genesis));
    }

    #[test]
    fn test_block_without_a_valid_reward_is_rejected() {
        let f = fixture();
        let genesis = f.remote.produce_next_block(None).unwrap();
        let header = genesis.get_header().clone();
        let bare = Block::new(header, vec![]);
        assert_eq!(f.server.handle_new_block(bare, "peer").unwrap(), BlockOutcome::Rejected);
    }

    #[test]
    fn test_fetch_next_block_replies_to_sender() {
        let f = fixture();
        let genesis = f.remote.produce_next_block(None).unwrap();
        f.server.handle_new_block(genesis.clone(), "peer").unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let reply_addr = listener.local_addr().unwrap().to_string();
        let reader = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = String::new();
            stream.read_to_string(&mut buf).unwrap();
            serde_json::from_str::<Envelope>(&buf).unwrap()
        });

        let request = Envelope {
            addr_from: reply_addr,
            message: Message::fetch_next_block(1).unwrap(),
        };
        f.server.process_envelope(&request).unwrap();

        let reply = reader.join().unwrap();
        assert_eq!(reply.addr_from, "127.0.0.1:2001");
        assert_eq!(reply.message.decode_block().unwrap(), genesis);
    }

    #[test]
    fn test_empty_node_asks_the_sender_for_genesis() {
        let f = fixture();
        let genesis = f.remote.produce_next_block(None).unwrap();
        let b2 = f.remote.produce_next_block(Some(&genesis)).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let sender_addr = listener.local_addr().unwrap().to_string();
        let reader = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = String::new();
            stream.read_to_string(&mut buf).unwrap();
            serde_json::from_str::<Envelope>(&buf).unwrap()
        });

        assert_eq!(f.server.handle_new_block(b2, &sender_addr).unwrap(), BlockOutcome::Gap);
        let request = reader.join().unwrap();
        assert_eq!(request.message.message_type, MessageType::FetchNextBlock);
        assert_eq!(request.message.decode_index().unwrap(), GENESIS_INDEX);
        assert!(f.events.try_recv().is_err());
    }

    #[test]
    fn test_request_sync_queues_an_open_request() {
        let f = fixture();
        f.server.request_sync();
        assert!(matches!(
            f.events.try_recv().unwrap(),
            SyncEvent::NextBlockNeeded(None)
        ));

        // with the coordinator gone the request is dropped and logged
        drop(f.events);
        f.server.request_sync();
    }

    #[test]
    fn test_fetch_of_unknown_block_is_silent() {
        let f = fixture();
        assert!(f.server.handle_fetch_next_block(42, "127.0.0.1:1").is_ok());
    }
}
