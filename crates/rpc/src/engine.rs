//! Engine API dispatch: versioned method names, capability exchange, and the
//! handlers bridging the consensus client to the execution core.

use crate::{
    dispatch::{positional, required_str},
    Dispatcher, ErrorCode, ErrorObject,
};
use alloy_primitives::B256;
use alloy_rpc_types_engine::{
    ExecutionPayloadV3, ForkchoiceState, ForkchoiceUpdated, PayloadAttributes, PayloadId,
    PayloadStatus,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// The Engine methods this server understands, the capability-exchange
/// endpoint included.
const ENGINE_METHODS: [&str; 4] = [
    "engine_newPayloadV3",
    "engine_forkchoiceUpdatedV3",
    "engine_getPayloadV3",
    "engine_exchangeCapabilities",
];

/// Returns `true` if the name is a versioned Engine method: `engine_`
/// namespace with a trailing `V<digits>` suffix. No method is special-cased.
pub fn is_engine_versioned(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("engine_") else {
        return false;
    };
    let Some(v_index) = rest.rfind('V') else {
        return false;
    };
    let digits = &rest[v_index + 1..];
    v_index > 0 && !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

/// Returns `true` if the method may appear in the capability list advertised
/// to the consensus client. `engine_exchangeCapabilities` is never
/// advertised, in any version; neither is an unversioned name.
pub fn is_valid_advertisable(name: &str) -> bool {
    if !is_engine_versioned(name) {
        return false;
    }
    let base = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let base = base.strip_suffix('V').unwrap_or(base);
    base != "engine_exchangeCapabilities"
}

/// The execution-core surface the Engine handlers call into.
#[async_trait]
pub trait EngineBackend: Send + Sync {
    /// Validates and imports the payload, returning its status.
    async fn new_payload_v3(
        &self,
        payload: ExecutionPayloadV3,
        versioned_hashes: Vec<B256>,
        parent_beacon_block_root: B256,
    ) -> Result<PayloadStatus, ErrorObject>;

    /// Applies the forkchoice state and optionally starts a payload build.
    async fn forkchoice_updated_v3(
        &self,
        state: ForkchoiceState,
        attributes: Option<PayloadAttributes>,
    ) -> Result<ForkchoiceUpdated, ErrorObject>;

    /// Returns a previously started payload build, or
    /// [ErrorCode::UnknownPayload].
    async fn get_payload_v3(&self, payload_id: PayloadId) -> Result<Value, ErrorObject>;
}

fn invalid_params(message: &str) -> ErrorObject {
    ErrorObject::with_message(ErrorCode::InvalidParams, message)
}

/// Registers the Engine namespace on the dispatcher.
pub fn register_engine(dispatcher: &mut Dispatcher, backend: Arc<dyn EngineBackend>) {
    let b = backend.clone();
    dispatcher.register("engine_newPayloadV3", move |params| {
        let backend = b.clone();
        Box::pin(async move {
            let params = positional(params)?;
            let [payload, hashes, beacon_root] = params.as_slice() else {
                return Err(invalid_params("expected [payload, versionedHashes, beaconRoot]"));
            };
            let payload: ExecutionPayloadV3 = serde_json::from_value(payload.clone())
                .map_err(|_| invalid_params("malformed execution payload"))?;
            let hashes: Vec<B256> = serde_json::from_value(hashes.clone())
                .map_err(|_| invalid_params("malformed versioned hashes"))?;
            let beacon_root: B256 = serde_json::from_value(beacon_root.clone())
                .map_err(|_| invalid_params("malformed parent beacon block root"))?;

            let status = backend.new_payload_v3(payload, hashes, beacon_root).await?;
            serde_json::to_value(status)
                .map_err(|_| ErrorObject::from_code(ErrorCode::InternalError))
        })
    });

    let b = backend.clone();
    dispatcher.register("engine_forkchoiceUpdatedV3", move |params| {
        let backend = b.clone();
        Box::pin(async move {
            let params = positional(params)?;
            let state = params
                .first()
                .ok_or_else(|| invalid_params("missing forkchoice state"))?;
            let state: ForkchoiceState = serde_json::from_value(state.clone())
                .map_err(|_| invalid_params("malformed forkchoice state"))?;
            let attributes = match params.get(1) {
                None | Some(Value::Null) => None,
                Some(value) => Some(
                    serde_json::from_value::<PayloadAttributes>(value.clone()).map_err(|_| {
                        ErrorObject::from_code(ErrorCode::InvalidPayloadAttributes)
                    })?,
                ),
            };

            let updated = backend.forkchoice_updated_v3(state, attributes).await?;
            serde_json::to_value(updated)
                .map_err(|_| ErrorObject::from_code(ErrorCode::InternalError))
        })
    });

    let b = backend.clone();
    dispatcher.register("engine_getPayloadV3", move |params| {
        let backend = b.clone();
        Box::pin(async move {
            let params = positional(params)?;
            let raw = required_str(&params, 0)?;
            let payload_id: PayloadId = serde_json::from_value(Value::String(raw.to_string()))
                .map_err(|_| invalid_params("malformed payload id"))?;
            backend.get_payload_v3(payload_id).await
        })
    });

    dispatcher.register("engine_exchangeCapabilities", move |params| {
        Box::pin(async move {
            // The consensus client's list is accepted but not interpreted.
            let _ = positional(params)?;
            let advertised = ENGINE_METHODS
                .iter()
                .copied()
                .filter(|method| is_valid_advertisable(method))
                .collect::<Vec<_>>();
            Ok(json!(advertised))
        })
    });
}
