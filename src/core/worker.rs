// Background mining. The worker owns the only search on this node; when a
// peer block extends the chain first, `supersede` aborts the running search
// and the worker restarts on top of the new tip.

use crate::core::{CancelToken, Miner};
use crate::error::BlockchainError;
use crate::network::SyncEvent;
use crate::storage::ChainStore;
use log::{error, info, warn};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Cloneable handle that aborts the worker's current search.
#[derive(Clone)]
pub struct SupersedeHandle {
    current: Arc<Mutex<CancelToken>>,
}

impl SupersedeHandle {
    pub fn supersede(&self) {
        match self.current.lock() {
            Ok(token) => token.cancel(),
            Err(_) => error!("Mining token lock poisoned"),
        }
    }
}

pub struct MiningWorker {
    current: Arc<Mutex<CancelToken>>,
    stop: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl MiningWorker {
    pub fn spawn(miner: Arc<Miner>, store: ChainStore, events: Sender<SyncEvent>) -> MiningWorker {
        let current = Arc::new(Mutex::new(CancelToken::new()));
        let stop = CancelToken::new();

        let handle = {
            let current = Arc::clone(&current);
            let stop = stop.clone();
            thread::Builder::new()
                .name("mining-worker".to_string())
                .spawn(move || Self::run(miner, store, events, current, stop))
                .map_err(|e| error!("Failed to spawn mining worker: {e}"))
                .ok()
        };

        MiningWorker {
            current,
            stop,
            handle,
        }
    }

    fn run(
        miner: Arc<Miner>,
        store: ChainStore,
        events: Sender<SyncEvent>,
        current: Arc<Mutex<CancelToken>>,
        stop: CancelToken,
    ) {
        info!("Mining worker started");
        while !stop.is_cancelled() {
            let token = CancelToken::new();
            match current.lock() {
                Ok(mut slot) => *slot = token.clone(),
                Err(_) => {
                    error!("Mining token lock poisoned, stopping worker");
                    return;
                }
            }
            if stop.is_cancelled() {
                break;
            }

            let previous = match store.tip_block() {
                Ok(previous) => previous,
                Err(e) => {
                    error!("Failed to read chain tip: {e}");
                    thread::sleep(RETRY_DELAY);
                    continue;
                }
            };

            match miner.produce_next_block_with_cancel(previous.as_ref(), &token) {
                Ok(block) => match store.commit_mined_block(&block) {
                    Ok(true) => {
                        if events.send(SyncEvent::BlockMined(block)).is_err() {
                            warn!("Sync coordinator is gone, mined block was stored but not announced");
                        }
                    }
                    Ok(false) => {
                        info!("Block {} went stale before it was stored, discarding", block.get_index());
                    }
                    Err(e) => {
                        error!("Failed to store mined block {}: {e}", block.get_index());
                        thread::sleep(RETRY_DELAY);
                    }
                },
                Err(BlockchainError::MiningCancelled) => {
                    info!("Mining search superseded, restarting on the new tip");
                }
                Err(BlockchainError::NoMiningIdentityConfigured) => {
                    error!("{}", BlockchainError::NoMiningIdentityConfigured);
                    return;
                }
                Err(e) => {
                    error!("Mining failed: {e}");
                    thread::sleep(RETRY_DELAY);
                }
            }
        }
        info!("Mining worker stopped");
    }

    /// Abort the running search; the worker restarts on the current tip.
    pub fn supersede(&self) {
        self.supersede_handle().supersede();
    }

    pub fn supersede_handle(&self) -> SupersedeHandle {
        SupersedeHandle {
            current: Arc::clone(&self.current),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop.cancel();
        self.supersede();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Mining worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProofOfWork;
    use crate::storage::ChainHeightStore;
    use crate::wallet::Identity;
    use std::sync::mpsc;
    use tempfile::tempdir;

    fn mining_setup(bits: u32) -> (tempfile::TempDir, ChainStore, Arc<Miner>) {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path().join("db")).unwrap();
        let identity = Identity::watch_only(vec![4; 65]);
        store.put_account(&identity).unwrap();
        store.set_coinbase(identity.get_address()).unwrap();
        let shared = Arc::new(store.clone());
        let miner = Arc::new(Miner::new(ProofOfWork::new(bits).unwrap(), shared.clone(), shared));
        (dir, store, miner)
    }

    #[test]
    fn test_worker_mines_and_announces_blocks() {
        let (_dir, store, miner) = mining_setup(4);
        let (tx, rx) = mpsc::channel();
        let worker = MiningWorker::spawn(miner, store.clone(), tx);

        let first = rx.recv_timeout(Duration::from_secs(30)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(30)).unwrap();
        worker.shutdown();

        match (first, second) {
            (SyncEvent::BlockMined(a), SyncEvent::BlockMined(b)) => {
                assert!(a.get_header().is_genesis());
                assert!(b.extends(&a));
            }
            other => panic!("unexpected events: {other:?}"),
        }
        assert!(store.get_last_block_index().unwrap() >= 2);
    }

    #[test]
    fn test_worker_without_coinbase_exits() {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path().join("db")).unwrap();
        let shared = Arc::new(store.clone());
        let miner = Arc::new(Miner::new(ProofOfWork::new(4).unwrap(), shared.clone(), shared));
        let (tx, rx) = mpsc::channel();
        let worker = MiningWorker::spawn(miner, store, tx);

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_err());
        thread::sleep(Duration::from_millis(200));
        assert!(!worker.is_running());
        worker.shutdown();
    }

    #[test]
    fn test_supersede_restarts_search() {
        // 40 bits never finishes inside the test; only cancellation ends it
        let (_dir, store, miner) = mining_setup(40);
        let genesis = miner.produce_next_block(None).unwrap();
        store.append_block(&genesis).unwrap();

        let (tx, _rx) = mpsc::channel();
        let worker = MiningWorker::spawn(miner, store, tx);
        thread::sleep(Duration::from_millis(50));
        worker.supersede();
        thread::sleep(Duration::from_millis(50));
        assert!(worker.is_running());
        worker.shutdown();
    }
}
