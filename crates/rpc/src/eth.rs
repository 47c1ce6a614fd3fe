//! The `eth_`, `net_`, and `web3_` namespaces, backed by the chain manager
//! and the world state.

use crate::{
    dispatch::{positional, required_str},
    hex::{parse_data, parse_quantity_u256, parse_quantity_u64, to_quantity},
    Dispatcher, ErrorCode, ErrorObject,
};
use alloy_primitives::{keccak256, Address, B256, U256};
use guillotine_chain::SealedBlock;
use guillotine_state::Account;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// A block selector: a named tag or an explicit number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    /// The canonical head.
    Latest,
    /// The safe watermark.
    Safe,
    /// The finalized watermark.
    Finalized,
    /// Block zero.
    Earliest,
    /// The pending block; served from the head here.
    Pending,
    /// An explicit block number.
    Number(u64),
}

impl BlockTag {
    fn parse(raw: &str, strict: bool) -> Result<Self, ErrorObject> {
        match raw {
            "latest" => Ok(Self::Latest),
            "safe" => Ok(Self::Safe),
            "finalized" => Ok(Self::Finalized),
            "earliest" => Ok(Self::Earliest),
            "pending" => Ok(Self::Pending),
            number => parse_quantity_u64(number, strict).map(Self::Number),
        }
    }
}

/// The read surface the `eth_` handlers call into. State reads answer from
/// the live world state; historical state lookups are out of scope.
#[async_trait]
pub trait EthBackend: Send + Sync {
    /// The chain id.
    fn chain_id(&self) -> u64;

    /// The client version string for `web3_clientVersion`.
    fn client_version(&self) -> String;

    /// The canonical head number.
    async fn latest_block_number(&self) -> Result<u64, ErrorObject>;

    /// A block by hash.
    async fn block_by_hash(&self, hash: B256) -> Result<Option<SealedBlock>, ErrorObject>;

    /// A block by tag or number, through the canonical mapping.
    async fn block_by_tag(&self, tag: BlockTag) -> Result<Option<SealedBlock>, ErrorObject>;

    /// The account record, empty sentinel included.
    async fn account(&self, address: Address) -> Result<Account, ErrorObject>;

    /// A storage slot value, zero if unset.
    async fn storage_at(&self, address: Address, key: U256) -> Result<U256, ErrorObject>;

    /// The account's code, empty if none.
    async fn code_at(&self, address: Address) -> Result<Vec<u8>, ErrorObject>;

    /// The suggested gas price in wei.
    async fn gas_price(&self) -> Result<u128, ErrorObject>;

    /// Admits a raw EIP-2718 transaction envelope to the pool, returning its
    /// hash.
    async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<B256, ErrorObject>;
}

fn parse_address(raw: &str, strict: bool) -> Result<Address, ErrorObject> {
    let bytes = parse_data(raw, strict)?;
    if bytes.len() != Address::len_bytes() {
        return Err(ErrorObject::with_message(ErrorCode::InvalidParams, "address must be 20 bytes"));
    }
    Ok(Address::from_slice(&bytes))
}

fn parse_hash(raw: &str, strict: bool) -> Result<B256, ErrorObject> {
    let bytes = parse_data(raw, strict)?;
    if bytes.len() != B256::len_bytes() {
        return Err(ErrorObject::with_message(ErrorCode::InvalidParams, "hash must be 32 bytes"));
    }
    Ok(B256::from_slice(&bytes))
}

/// Serializes a block into its RPC object form. Transactions are reported by
/// hash.
fn block_to_json(block: &SealedBlock) -> Value {
    let header = &block.header;
    let transactions = block
        .body
        .transactions
        .iter()
        .map(|raw| json!(keccak256(raw)))
        .collect::<Vec<_>>();

    let mut object = json!({
        "number": to_quantity(U256::from(header.number)),
        "hash": block.hash(),
        "parentHash": header.parent_hash,
        "nonce": header.nonce,
        "sha3Uncles": header.ommers_hash,
        "logsBloom": header.logs_bloom,
        "stateRoot": header.state_root,
        "transactionsRoot": header.transactions_root,
        "receiptsRoot": header.receipts_root,
        "miner": header.beneficiary,
        "difficulty": to_quantity(header.difficulty),
        "extraData": header.extra_data,
        "gasLimit": to_quantity(U256::from(header.gas_limit)),
        "gasUsed": to_quantity(U256::from(header.gas_used)),
        "timestamp": to_quantity(U256::from(header.timestamp)),
        "mixHash": header.mix_hash,
        "transactions": transactions,
        "uncles": Vec::<Value>::new(),
    });

    let extras = object.as_object_mut().expect("object literal");
    if let Some(base_fee) = header.base_fee_per_gas {
        extras.insert("baseFeePerGas".into(), json!(to_quantity(U256::from(base_fee))));
    }
    if let Some(withdrawals_root) = header.withdrawals_root {
        extras.insert("withdrawalsRoot".into(), json!(withdrawals_root));
    }
    if let Some(blob_gas_used) = header.blob_gas_used {
        extras.insert("blobGasUsed".into(), json!(to_quantity(U256::from(blob_gas_used))));
    }
    if let Some(excess_blob_gas) = header.excess_blob_gas {
        extras.insert("excessBlobGas".into(), json!(to_quantity(U256::from(excess_blob_gas))));
    }
    if let Some(beacon_root) = header.parent_beacon_block_root {
        extras.insert("parentBeaconBlockRoot".into(), json!(beacon_root));
    }
    object
}

/// Registers the `eth_`, `net_`, and `web3_` namespaces on the dispatcher.
pub fn register_eth(dispatcher: &mut Dispatcher, backend: Arc<dyn EthBackend>) {
    let strict = dispatcher.strict_hex_format;

    let b = backend.clone();
    dispatcher.register("web3_clientVersion", move |_params| {
        let backend = b.clone();
        Box::pin(async move { Ok(json!(backend.client_version())) })
    });

    let b = backend.clone();
    dispatcher.register("net_version", move |_params| {
        let backend = b.clone();
        Box::pin(async move { Ok(json!(backend.chain_id().to_string())) })
    });

    let b = backend.clone();
    dispatcher.register("eth_chainId", move |_params| {
        let backend = b.clone();
        Box::pin(async move { Ok(json!(to_quantity(U256::from(backend.chain_id())))) })
    });

    let b = backend.clone();
    dispatcher.register("eth_blockNumber", move |_params| {
        let backend = b.clone();
        Box::pin(async move {
            let number = backend.latest_block_number().await?;
            Ok(json!(to_quantity(U256::from(number))))
        })
    });

    let b = backend.clone();
    dispatcher.register("eth_gasPrice", move |_params| {
        let backend = b.clone();
        Box::pin(async move {
            let price = backend.gas_price().await?;
            Ok(json!(to_quantity(U256::from(price))))
        })
    });

    let b = backend.clone();
    dispatcher.register("eth_getBalance", move |params| {
        let backend = b.clone();
        Box::pin(async move {
            let params = positional(params)?;
            let address = parse_address(required_str(&params, 0)?, strict)?;
            let account = backend.account(address).await?;
            Ok(json!(to_quantity(account.balance)))
        })
    });

    let b = backend.clone();
    dispatcher.register("eth_getTransactionCount", move |params| {
        let backend = b.clone();
        Box::pin(async move {
            let params = positional(params)?;
            let address = parse_address(required_str(&params, 0)?, strict)?;
            let account = backend.account(address).await?;
            Ok(json!(to_quantity(U256::from(account.nonce))))
        })
    });

    let b = backend.clone();
    dispatcher.register("eth_getCode", move |params| {
        let backend = b.clone();
        Box::pin(async move {
            let params = positional(params)?;
            let address = parse_address(required_str(&params, 0)?, strict)?;
            let code = backend.code_at(address).await?;
            Ok(json!(format!("0x{}", alloy_primitives::hex::encode(code))))
        })
    });

    let b = backend.clone();
    dispatcher.register("eth_getStorageAt", move |params| {
        let backend = b.clone();
        Box::pin(async move {
            let params = positional(params)?;
            let address = parse_address(required_str(&params, 0)?, strict)?;
            let key = parse_quantity_u256(required_str(&params, 1)?, strict)?;
            let value = backend.storage_at(address, key).await?;
            Ok(json!(B256::from(value)))
        })
    });

    let b = backend.clone();
    dispatcher.register("eth_sendRawTransaction", move |params| {
        let backend = b.clone();
        Box::pin(async move {
            let params = positional(params)?;
            let raw = parse_data(required_str(&params, 0)?, strict)?;
            if raw.is_empty() {
                return Err(ErrorObject::with_message(ErrorCode::InvalidParams, "empty payload"));
            }
            let hash = backend.send_raw_transaction(raw).await?;
            Ok(json!(hash))
        })
    });

    let b = backend.clone();
    dispatcher.register("eth_getBlockByHash", move |params| {
        let backend = b.clone();
        Box::pin(async move {
            let params = positional(params)?;
            let hash = parse_hash(required_str(&params, 0)?, strict)?;
            let block = backend.block_by_hash(hash).await?;
            Ok(block.as_ref().map(block_to_json).unwrap_or(Value::Null))
        })
    });

    let b = backend.clone();
    dispatcher.register("eth_getBlockByNumber", move |params| {
        let backend = b.clone();
        Box::pin(async move {
            let params = positional(params)?;
            let tag = BlockTag::parse(required_str(&params, 0)?, strict)?;
            let block = backend.block_by_tag(tag).await?;
            Ok(block.as_ref().map(block_to_json).unwrap_or(Value::Null))
        })
    });
}
