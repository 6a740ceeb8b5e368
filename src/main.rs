// Entry point for the node binary: parse the CLI, load config, dispatch.
use clap::Parser;
use log::{error, info, warn};
use powchain_node::core::monetary::conversions::format_base_units;
use powchain_node::{
    verify_address, ChainStore, Command, Config, Miner, MiningWorker, Opt, Peers, ProofOfWork,
    Server, SyncCoordinator, TcpTransport, Wallets,
};
use std::process;
use std::sync::Arc;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(opt.config.as_deref())?;

    match opt.command {
        Command::NewAccount => {
            let wallets = Wallets::new(open_store(&config)?);
            let identity = wallets.create_wallet()?;
            println!("Your new address: {}", identity.get_address());
        }
        Command::Coinbase => {
            let wallets = Wallets::new(open_store(&config)?);
            match wallets.get_coinbase()? {
                Some(identity) => println!("{identity}"),
                None => println!("No coinbase account configured. Run 'newaccount' first."),
            }
        }
        Command::ListAccounts => {
            let wallets = Wallets::new(open_store(&config)?);
            for address in wallets.get_addresses()? {
                println!("{address}")
            }
        }
        Command::SetCoinbase { address } => {
            let wallets = Wallets::new(open_store(&config)?);
            wallets.set_coinbase(&address)?;
            println!("Coinbase set to {address}");
        }
        Command::VerifyAddress { address } => {
            if verify_address(&address) {
                println!("{address} is valid");
            } else {
                return Err(format!("Invalid address: {address}").into());
            }
        }
        Command::Mine => {
            let store = open_store(&config)?;
            let miner = build_miner(&config, &store)?;
            let tip = store.tip_block()?;
            let block = miner.produce_next_block(tip.as_ref())?;
            if !store.commit_mined_block(&block)? {
                return Err(format!("Block {} no longer extends the chain", block.get_index()).into());
            }
            println!("Mined block {}: {}", block.get_index(), block.get_hash());

            let peers = Arc::new(Peers::from_addrs(config.get_peers()));
            if !peers.is_empty() {
                let transport = Arc::new(TcpTransport::new(config.get_node_addr(), peers));
                let coordinator = SyncCoordinator::new(transport, Arc::new(store));
                if let Err(e) = coordinator.on_block_mined(&block) {
                    warn!("Block stored locally but not announced: {e}");
                }
            }
        }
        Command::Printchain => {
            let store = open_store(&config)?;
            for block in store.blocks()? {
                let header = block.get_header();
                println!("Index: {}", header.get_index());
                println!(
                    "Pre block hash: {}",
                    header.get_previous_hash().unwrap_or("(genesis)")
                );
                println!("Cur block hash: {}", header.get_hash());
                println!("Timestamp: {}", header.get_timestamp());
                println!("Nonce: {}", header.get_nonce());
                for tx in block.get_transactions() {
                    println!(
                        "- {} to {}: {}",
                        tx.get_data(),
                        tx.get_recipient(),
                        format_base_units(tx.get_amount())
                    );
                }
                println!()
            }
        }
        Command::StartNode { mine } => {
            if mine {
                config.set_mining(true);
            }
            start_node(&config)?;
        }
    }
    Ok(())
}

fn open_store(config: &Config) -> powchain_node::Result<ChainStore> {
    ChainStore::open(config.get_data_dir())
}

fn build_miner(config: &Config, store: &ChainStore) -> powchain_node::Result<Arc<Miner>> {
    let pow = ProofOfWork::new(config.get_target_bits())?;
    let shared = Arc::new(store.clone());
    Ok(Arc::new(Miner::new(pow, shared.clone(), shared)))
}

fn start_node(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let node_addr = config.get_node_addr();
    let store = open_store(config)?;
    let miner = build_miner(config, &store)?;

    let peers = Arc::new(Peers::from_addrs(config.get_peers()));
    info!("Starting node {node_addr} with {} known peers", peers.len());
    let transport = Arc::new(TcpTransport::new(node_addr.clone(), peers));
    let coordinator = SyncCoordinator::new(transport.clone(), Arc::new(store.clone()));
    let (events, _coordinator) = coordinator.spawn()?;

    let worker = if config.is_miner() {
        let coinbase = store
            .get_coinbase()?
            .ok_or("Mining needs a coinbase account. Run 'newaccount' first.")?;
        info!("Mining is on. Rewards go to {}", coinbase.get_address());
        Some(MiningWorker::spawn(miner.clone(), store.clone(), events.clone()))
    } else {
        None
    };

    let server = Server::new(
        store,
        miner,
        transport,
        events,
        worker.as_ref().map(MiningWorker::supersede_handle),
    );
    if worker.is_none() {
        server.request_sync();
    }
    let result = server.run(&node_addr);
    if let Some(worker) = worker {
        worker.shutdown();
    }
    result.map_err(|e| format!("Server error: {e}").into())
}
