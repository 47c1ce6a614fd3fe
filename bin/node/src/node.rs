//! Node assembly: storage, chain, state, pool, and the RPC surface.

use crate::{backend::NodeBackend, config::RunnerConfig};
use alloy_consensus::Header;
use anyhow::{Context, Result};
use guillotine_chain::{Block, BlockBody, Blockchain, SealedBlock};
use guillotine_pool::TxPool;
use guillotine_rpc::{register_engine, register_eth, Dispatcher, RpcServer};
use guillotine_state::JournaledState;
use guillotine_store::Database;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// The assembled node.
#[derive(Debug)]
pub struct Node {
    config: RunnerConfig,
    chain: Arc<Mutex<Blockchain>>,
    state: Arc<Mutex<JournaledState>>,
    pool: Arc<Mutex<TxPool>>,
}

impl Node {
    /// Assembles the node: opens storage, installs the genesis block if the
    /// store is fresh, and prepares the shared components.
    pub async fn assemble(config: RunnerConfig) -> Result<Self> {
        let db = open_database(&config)?;
        let mut chain = Blockchain::new(db);
        let state = JournaledState::new();

        if chain.head_number().is_none() {
            let genesis = genesis_block(&state)?;
            info!(target: "node", hash = %genesis.hash(), "Installing genesis block");
            chain.put_block(&genesis).context("failed to store the genesis block")?;
            chain
                .set_canonical_head(genesis.hash())
                .context("failed to set the genesis head")?;
        }

        Ok(Self {
            config,
            chain: Arc::new(Mutex::new(chain)),
            state: Arc::new(Mutex::new(state)),
            pool: Arc::new(Mutex::new(TxPool::new(0))),
        })
    }

    /// Runs the node until ctrl-c.
    pub async fn run(self) -> Result<()> {
        let backend = Arc::new(NodeBackend::new(
            self.config.spec,
            self.chain.clone(),
            self.state.clone(),
            self.pool.clone(),
        ));

        let mut dispatcher = Dispatcher::new(self.config.rpc.strict_hex_format);
        register_eth(&mut dispatcher, backend.clone());
        register_engine(&mut dispatcher, backend);

        let server = RpcServer::new(self.config.rpc.clone(), dispatcher);
        let server_task = tokio::spawn(server.serve());

        info!(
            target: "node",
            network = %self.config.network,
            chain_id = self.config.spec.chain_id,
            "Node running",
        );

        tokio::select! {
            result = server_task => {
                result.context("RPC server task panicked")?.context("RPC server failed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!(target: "node", "Shutting down");
            }
        }
        Ok(())
    }
}

/// Opens the database. The in-memory backend is the default; the `disk`
/// feature swaps the persistent columns onto RocksDB under `db_dir`.
fn open_database(config: &RunnerConfig) -> Result<Database> {
    #[cfg(feature = "disk")]
    {
        use guillotine_store::{Column, DiskStore, KeyValueStore};
        use std::collections::HashMap;

        let mut columns: HashMap<Column, Box<dyn KeyValueStore>> = HashMap::new();
        for column in Column::ALL {
            let path = config.db_dir.join(column.name());
            let store = DiskStore::open(path)
                .with_context(|| format!("failed to open column {}", column.name()))?;
            columns.insert(column, Box::new(store));
        }
        Ok(Database::from_columns(columns))
    }
    #[cfg(not(feature = "disk"))]
    {
        let _ = &config.db_dir;
        Ok(Database::new_in_memory())
    }
}

/// Builds the genesis block over the (empty) world state.
fn genesis_block(state: &JournaledState) -> Result<SealedBlock> {
    let state_root = state.state_root().context("failed to compute the genesis state root")?;
    let header = Header {
        number: 0,
        state_root,
        gas_limit: 30_000_000,
        base_fee_per_gas: Some(1_000_000_000),
        withdrawals_root: Some(guillotine_mpt::EMPTY_ROOT_HASH),
        blob_gas_used: Some(0),
        excess_blob_gas: Some(0),
        ..Default::default()
    };
    Ok(Block {
        header,
        body: BlockBody { transactions: vec![], ommers: vec![], withdrawals: Some(vec![]) },
    }
    .seal())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[tokio::test]
    async fn test_assemble_installs_genesis() {
        let cli = Cli::try_parse_from(["guillotine-node", "--config", "dev"]).unwrap();
        let config = RunnerConfig::resolve(&cli).unwrap();
        let node = Node::assemble(config).await.unwrap();

        let chain = node.chain.lock().await;
        assert_eq!(chain.head_number(), Some(0));
        let genesis = chain.head().unwrap();
        assert_eq!(genesis.number(), 0);
        assert!(chain.is_canonical(genesis.hash()).unwrap());
    }
}
