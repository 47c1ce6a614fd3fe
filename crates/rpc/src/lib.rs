//! JSON-RPC and Engine API machinery for the execution client.
//!
//! The envelope, error taxonomy, and namespace dispatcher are the request
//! path shared by the HTTP and WebSocket surfaces. Engine methods are
//! versioned (`V<digits>` suffix) and advertised through
//! `engine_exchangeCapabilities`, which itself is never advertised.

mod errors;
pub use errors::{ErrorCode, ErrorObject};

mod envelope;
pub use envelope::{Id, Request, Response};

mod hex;
pub use hex::{parse_data, parse_quantity_u64, parse_quantity_u256, to_quantity};

mod dispatch;
pub use dispatch::{Dispatcher, MethodFuture, RpcConfig};

mod engine;
pub use engine::{
    is_engine_versioned, is_valid_advertisable, register_engine, EngineBackend,
};

mod eth;
pub use eth::{register_eth, BlockTag, EthBackend};

mod server;
pub use server::RpcServer;
