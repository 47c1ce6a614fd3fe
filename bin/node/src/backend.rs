//! The RPC backend: bridges the dispatcher's `eth_` and `engine_` surfaces
//! onto the chain manager, the world state, and the transaction pool.

use alloy_consensus::Header;
use alloy_eips::eip1559::calc_next_block_base_fee;
use alloy_primitives::{keccak256, Address, Bloom, B256, B64, U256};
use alloy_rpc_types_engine::{
    ExecutionPayloadV1, ExecutionPayloadV2, ExecutionPayloadV3, ForkchoiceState,
    ForkchoiceUpdated, PayloadAttributes, PayloadId, PayloadStatus, PayloadStatusEnum,
};
use async_trait::async_trait;
use guillotine_chain::{
    compute_transactions_root, compute_withdrawals_root, Block, BlockBody, Blockchain, ChainSpec,
    HeaderValidationContext, SealedBlock,
};
use guillotine_mpt::EMPTY_ROOT_HASH;
use guillotine_pool::{PooledTransaction, TxPool};
use guillotine_rpc::{BlockTag, EngineBackend, ErrorCode, ErrorObject, EthBackend};
use guillotine_state::{Account, JournaledState};
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// The shared node backend behind both RPC namespaces.
#[derive(Debug)]
pub struct NodeBackend {
    spec: ChainSpec,
    chain: Arc<Mutex<Blockchain>>,
    state: Arc<Mutex<JournaledState>>,
    pool: Arc<Mutex<TxPool>>,
    /// Payload builds started by forkchoice updates, by payload id.
    payloads: Mutex<HashMap<PayloadId, Value>>,
}

fn internal(message: impl Into<String>) -> ErrorObject {
    ErrorObject::with_message(ErrorCode::InternalError, message)
}

impl NodeBackend {
    /// Creates a backend over the node's core components.
    pub fn new(
        spec: ChainSpec,
        chain: Arc<Mutex<Blockchain>>,
        state: Arc<Mutex<JournaledState>>,
        pool: Arc<Mutex<TxPool>>,
    ) -> Self {
        Self { spec, chain, state, pool, payloads: Mutex::new(HashMap::new()) }
    }

    /// Reassembles a block from an Engine payload, recomputing the roots the
    /// payload does not carry.
    fn block_from_payload(
        payload: &ExecutionPayloadV3,
        parent_beacon_block_root: B256,
    ) -> SealedBlock {
        let withdrawals = payload.payload_inner.withdrawals.clone();
        let inner = &payload.payload_inner.payload_inner;

        let header = Header {
            parent_hash: inner.parent_hash,
            beneficiary: inner.fee_recipient,
            state_root: inner.state_root,
            receipts_root: inner.receipts_root,
            logs_bloom: inner.logs_bloom,
            mix_hash: inner.prev_randao,
            number: inner.block_number,
            gas_limit: inner.gas_limit,
            gas_used: inner.gas_used,
            timestamp: inner.timestamp,
            extra_data: inner.extra_data.clone(),
            base_fee_per_gas: inner.base_fee_per_gas.try_into().ok(),
            transactions_root: compute_transactions_root(&inner.transactions),
            withdrawals_root: Some(compute_withdrawals_root(&withdrawals)),
            blob_gas_used: Some(payload.blob_gas_used),
            excess_blob_gas: Some(payload.excess_blob_gas),
            parent_beacon_block_root: Some(parent_beacon_block_root),
            difficulty: U256::ZERO,
            nonce: B64::ZERO,
            ..Default::default()
        };

        Block {
            header,
            body: BlockBody {
                transactions: inner.transactions.clone(),
                ommers: Vec::new(),
                withdrawals: Some(withdrawals),
            },
        }
        .seal()
    }

    /// Builds a payload template on top of the head block from the pool's
    /// best transactions. Execution (and thus the post-state root) is the
    /// EVM's job; templates carry the pre-state root until they are executed.
    async fn build_payload(
        &self,
        head: &SealedBlock,
        attributes: &PayloadAttributes,
    ) -> Result<(PayloadId, Value), ErrorObject> {
        let base_fee = calc_next_block_base_fee(
            head.header.gas_used,
            head.header.gas_limit,
            head.header.base_fee_per_gas.unwrap_or_default(),
            self.spec.base_fee_params,
        );

        let transactions = {
            let mut pool = self.pool.lock().await;
            pool.set_base_fee(base_fee);
            pool.best_transactions().iter().map(|tx| tx.encoded.clone()).collect::<Vec<_>>()
        };
        let state_root = self.state.lock().await.state_root().map_err(|e| internal(e.to_string()))?;
        let withdrawals = attributes.withdrawals.clone().unwrap_or_default();

        let header = Header {
            parent_hash: head.hash(),
            beneficiary: attributes.suggested_fee_recipient,
            state_root,
            receipts_root: EMPTY_ROOT_HASH,
            logs_bloom: Bloom::ZERO,
            mix_hash: attributes.prev_randao,
            number: head.number() + 1,
            gas_limit: head.header.gas_limit,
            gas_used: 0,
            timestamp: attributes.timestamp,
            base_fee_per_gas: Some(base_fee),
            transactions_root: compute_transactions_root(&transactions),
            withdrawals_root: Some(compute_withdrawals_root(&withdrawals)),
            blob_gas_used: Some(0),
            excess_blob_gas: Some(0),
            parent_beacon_block_root: attributes.parent_beacon_block_root,
            difficulty: U256::ZERO,
            nonce: B64::ZERO,
            ..Default::default()
        };

        let execution_payload = ExecutionPayloadV3 {
            payload_inner: ExecutionPayloadV2 {
                payload_inner: ExecutionPayloadV1 {
                    parent_hash: header.parent_hash,
                    fee_recipient: header.beneficiary,
                    state_root: header.state_root,
                    receipts_root: header.receipts_root,
                    logs_bloom: header.logs_bloom,
                    prev_randao: header.mix_hash,
                    block_number: header.number,
                    gas_limit: header.gas_limit,
                    gas_used: header.gas_used,
                    timestamp: header.timestamp,
                    extra_data: header.extra_data.clone(),
                    base_fee_per_gas: U256::from(base_fee),
                    block_hash: header.hash_slow(),
                    transactions,
                },
                withdrawals,
            },
            blob_gas_used: 0,
            excess_blob_gas: 0,
        };

        let mut id_preimage = head.hash().to_vec();
        id_preimage.extend_from_slice(&attributes.timestamp.to_be_bytes());
        id_preimage.extend_from_slice(attributes.prev_randao.as_slice());
        let digest = keccak256(&id_preimage);
        let payload_id = PayloadId(B64::from_slice(&digest[..8]));

        let envelope = json!({
            "executionPayload": execution_payload,
            "blockValue": "0x0",
            "blobsBundle": {"commitments": [], "proofs": [], "blobs": []},
            "shouldOverrideBuilder": false,
        });
        Ok((payload_id, envelope))
    }
}

#[async_trait]
impl EngineBackend for NodeBackend {
    async fn new_payload_v3(
        &self,
        payload: ExecutionPayloadV3,
        _versioned_hashes: Vec<B256>,
        parent_beacon_block_root: B256,
    ) -> Result<PayloadStatus, ErrorObject> {
        let expected_hash = payload.payload_inner.payload_inner.block_hash;
        let block = Self::block_from_payload(&payload, parent_beacon_block_root);

        if block.hash() != expected_hash {
            warn!(target: "node", %expected_hash, actual = %block.hash(), "Payload hash mismatch");
            return Ok(PayloadStatus::new(
                PayloadStatusEnum::Invalid {
                    validation_error: "block hash does not match payload contents".to_string(),
                },
                None,
            ));
        }

        let mut chain = self.chain.lock().await;
        let Some(parent) =
            chain.get_block_local(block.parent_hash()).map_err(|e| internal(e.to_string()))?
        else {
            return Ok(PayloadStatus::new(PayloadStatusEnum::Syncing, None));
        };

        let context = HeaderValidationContext { spec: &self.spec, parent: &parent.header };
        if let Err(validation) = context.validate(&block.header) {
            // The block is rejected with the first failing reason.
            return Ok(PayloadStatus::new(
                PayloadStatusEnum::Invalid { validation_error: validation.to_string() },
                Some(parent.hash()),
            ));
        }

        chain.put_block(&block).map_err(|e| internal(e.to_string()))?;
        info!(target: "node", number = block.number(), hash = %block.hash(), "Imported payload");
        Ok(PayloadStatus::new(PayloadStatusEnum::Valid, Some(block.hash())))
    }

    async fn forkchoice_updated_v3(
        &self,
        state: ForkchoiceState,
        attributes: Option<PayloadAttributes>,
    ) -> Result<ForkchoiceUpdated, ErrorObject> {
        if state.head_block_hash.is_zero() {
            return Err(ErrorObject::from_code(ErrorCode::InvalidForkchoiceState));
        }

        let head = {
            let mut chain = self.chain.lock().await;
            let Some(head) = chain
                .get_block_local(state.head_block_hash)
                .map_err(|e| internal(e.to_string()))?
            else {
                return Ok(ForkchoiceUpdated::from_status(PayloadStatusEnum::Syncing));
            };

            chain.set_canonical_head(state.head_block_hash).map_err(|e| internal(e.to_string()))?;
            if !state.safe_block_hash.is_zero() {
                chain.set_safe(state.safe_block_hash);
            }
            if !state.finalized_block_hash.is_zero() {
                chain.set_finalized(state.finalized_block_hash);
            }
            head
        };

        let mut updated = ForkchoiceUpdated::from_status(PayloadStatusEnum::Valid)
            .with_latest_valid_hash(head.hash());

        if let Some(attributes) = attributes {
            if attributes.timestamp <= head.header.timestamp {
                return Err(ErrorObject::from_code(ErrorCode::InvalidPayloadAttributes));
            }
            let (payload_id, envelope) = self.build_payload(&head, &attributes).await?;
            self.payloads.lock().await.insert(payload_id, envelope);
            updated = updated.with_payload_id(payload_id);
        }

        Ok(updated)
    }

    async fn get_payload_v3(&self, payload_id: PayloadId) -> Result<Value, ErrorObject> {
        self.payloads
            .lock()
            .await
            .get(&payload_id)
            .cloned()
            .ok_or_else(|| ErrorObject::from_code(ErrorCode::UnknownPayload))
    }
}

#[async_trait]
impl EthBackend for NodeBackend {
    fn chain_id(&self) -> u64 {
        self.spec.chain_id
    }

    fn client_version(&self) -> String {
        format!("guillotine/v{}", env!("CARGO_PKG_VERSION"))
    }

    async fn latest_block_number(&self) -> Result<u64, ErrorObject> {
        self.chain
            .lock()
            .await
            .head_number()
            .ok_or_else(|| internal("no canonical head"))
    }

    async fn block_by_hash(&self, hash: B256) -> Result<Option<SealedBlock>, ErrorObject> {
        self.chain.lock().await.get_block_by_hash(hash).map_err(|e| internal(e.to_string()))
    }

    async fn block_by_tag(&self, tag: BlockTag) -> Result<Option<SealedBlock>, ErrorObject> {
        let mut chain = self.chain.lock().await;
        let resolved = match tag {
            BlockTag::Latest | BlockTag::Pending => {
                return chain.head().map(Some).or_else(|_| Ok(None));
            }
            BlockTag::Safe => {
                let Some(hash) = chain.safe() else { return Ok(None) };
                return chain.get_block_local(hash).map_err(|e| internal(e.to_string()));
            }
            BlockTag::Finalized => {
                let Some(hash) = chain.finalized() else { return Ok(None) };
                return chain.get_block_local(hash).map_err(|e| internal(e.to_string()));
            }
            BlockTag::Earliest => 0,
            BlockTag::Number(number) => number,
        };
        chain.get_block_by_number(resolved).map_err(|e| internal(e.to_string()))
    }

    async fn account(&self, address: Address) -> Result<Account, ErrorObject> {
        Ok(self.state.lock().await.get_account(address))
    }

    async fn storage_at(&self, address: Address, key: U256) -> Result<U256, ErrorObject> {
        Ok(self.state.lock().await.get_storage(address, key))
    }

    async fn code_at(&self, address: Address) -> Result<Vec<u8>, ErrorObject> {
        Ok(self
            .state
            .lock()
            .await
            .get_code(address)
            .map(|code| code.to_vec())
            .unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<u128, ErrorObject> {
        let base_fee = {
            let chain = self.chain.lock().await;
            chain.head().map(|head| head.header.base_fee_per_gas.unwrap_or_default()).unwrap_or(0)
        };
        // Suggest the base fee plus a 1 gwei tip.
        Ok(u128::from(base_fee) + 1_000_000_000)
    }

    async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<B256, ErrorObject> {
        use alloy_consensus::TxEnvelope;
        use alloy_eips::eip2718::Decodable2718;

        let envelope = TxEnvelope::decode_2718(&mut raw.as_slice()).map_err(|_| {
            ErrorObject::with_message(ErrorCode::InvalidParams, "malformed transaction envelope")
        })?;
        let tx = PooledTransaction::from_envelope(&envelope)
            .map_err(|e| ErrorObject::with_message(ErrorCode::InvalidParams, e.to_string()))?;
        let hash = tx.hash;

        self.pool
            .lock()
            .await
            .add(tx)
            .map_err(|e| ErrorObject::with_message(ErrorCode::ServerError, e.to_string()))?;
        info!(target: "node", %hash, "Pooled transaction");
        Ok(hash)
    }
}
