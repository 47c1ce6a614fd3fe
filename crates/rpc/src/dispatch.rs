//! The namespace dispatcher: request parsing, method lookup, and batch
//! fan-out.

use crate::{ErrorCode, ErrorObject, Id, Request, Response};
use futures::future::BoxFuture;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::debug;

/// The future a method handler returns.
pub type MethodFuture = BoxFuture<'static, Result<Value, ErrorObject>>;

type MethodFn = Arc<dyn Fn(Option<Value>) -> MethodFuture + Send + Sync>;

/// The method namespaces this server dispatches.
const NAMESPACES: [&str; 4] = ["eth", "net", "web3", "engine"];

/// Server-surface configuration with the documented defaults.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// The HTTP listen address.
    pub host: String,
    /// The HTTP listen port.
    pub port: u16,
    /// The WebSocket port. Defaults to the HTTP port.
    pub ws_port: Option<u16>,
    /// The per-call timeout.
    pub request_timeout: Duration,
    /// The bound on concurrent in-flight requests.
    pub queue_limit: usize,
    /// The maximum number of entries in a batch.
    pub max_batch_size: usize,
    /// The maximum request body size in bytes.
    pub max_request_body: usize,
    /// The maximum serialized batch response size in bytes.
    pub max_batch_response: usize,
    /// Whether hex parameters are validated strictly.
    pub strict_hex_format: bool,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8545,
            ws_port: None,
            request_timeout: Duration::from_secs(20),
            queue_limit: 500,
            max_batch_size: 1024,
            max_request_body: 30 * 1000 * 1000,
            max_batch_response: 32 * 1024 * 1024,
            strict_hex_format: true,
        }
    }
}

/// Routes requests to registered method handlers.
///
/// Methods are fully qualified (`eth_chainId`, `engine_newPayloadV3`); the
/// dispatcher rejects names outside the known namespaces before looking them
/// up.
#[derive(Clone)]
pub struct Dispatcher {
    methods: HashMap<String, MethodFn>,
    /// Whether hex parameters are validated strictly. Handlers read this at
    /// registration time.
    pub strict_hex_format: bool,
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher").field("methods", &self.methods.len()).finish()
    }
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new(strict_hex_format: bool) -> Self {
        Self { methods: HashMap::new(), strict_hex_format }
    }

    /// Registers a method handler under its fully qualified name.
    pub fn register<F>(&mut self, method: &str, handler: F)
    where
        F: Fn(Option<Value>) -> MethodFuture + Send + Sync + 'static,
    {
        self.methods.insert(method.to_string(), Arc::new(handler));
    }

    /// The registered method names.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Handles a raw request body: a single request or a batch. Returns
    /// [None] when no response is owed (a lone notification, or a batch of
    /// notifications).
    pub async fn handle_raw(&self, body: &str, max_batch_size: usize) -> Option<Value> {
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            return Some(
                serde_json::to_value(Response::failure_code(Id::Null, ErrorCode::ParseError))
                    .unwrap_or_default(),
            );
        };

        match value {
            Value::Array(entries) => {
                // An empty batch is an error, answered with a single response.
                if entries.is_empty() {
                    return Some(
                        serde_json::to_value(Response::failure_code(
                            Id::Null,
                            ErrorCode::InvalidRequest,
                        ))
                        .unwrap_or_default(),
                    );
                }
                if entries.len() > max_batch_size {
                    return Some(
                        serde_json::to_value(Response::failure(
                            Id::Null,
                            ErrorObject::with_message(
                                ErrorCode::ServerError,
                                "batch exceeds the maximum size",
                            ),
                        ))
                        .unwrap_or_default(),
                    );
                }

                let mut responses = Vec::with_capacity(entries.len());
                for entry in entries {
                    // Notifications are dispatched but omitted from the
                    // response array.
                    if let Some(response) = self.handle_value(entry).await {
                        responses.push(response);
                    }
                }
                if responses.is_empty() {
                    None
                } else {
                    serde_json::to_value(responses).ok()
                }
            }
            single => {
                let response = self.handle_value(single).await?;
                serde_json::to_value(response).ok()
            }
        }
    }

    /// Handles one request object. Returns [None] for notifications.
    pub async fn handle_value(&self, value: Value) -> Option<Response> {
        if !value.is_object() {
            return Some(Response::failure_code(Id::Null, ErrorCode::InvalidRequest));
        }
        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(_) => return Some(Response::failure_code(Id::Null, ErrorCode::InvalidRequest)),
        };
        let is_notification = request.is_notification();
        let id = request.id.clone().unwrap_or(Id::Null);

        let response = self.dispatch(request).await;
        if is_notification {
            return None;
        }
        Some(match response {
            Ok(result) => Response::success(id, result),
            Err(error) => Response::failure(id, error),
        })
    }

    /// Validates the envelope and invokes the handler.
    async fn dispatch(&self, request: Request) -> Result<Value, ErrorObject> {
        if request.jsonrpc != "2.0" {
            return Err(ErrorObject::from_code(ErrorCode::InvalidRequest));
        }

        let namespace = request.method.split('_').next().unwrap_or_default();
        if !NAMESPACES.contains(&namespace) {
            debug!(target: "rpc", method = %request.method, "Unknown namespace");
            return Err(ErrorObject::from_code(ErrorCode::MethodNotFound));
        }

        let Some(handler) = self.methods.get(&request.method) else {
            debug!(target: "rpc", method = %request.method, "Unknown method");
            return Err(ErrorObject::from_code(ErrorCode::MethodNotFound));
        };
        handler(request.params).await
    }
}

/// Decodes positional params into a vector, tolerating an absent array for
/// zero-argument methods.
pub(crate) fn positional(params: Option<Value>) -> Result<Vec<Value>, ErrorObject> {
    match params {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => Ok(values),
        Some(_) => Err(ErrorObject::with_message(
            ErrorCode::InvalidParams,
            "params must be a positional array",
        )),
    }
}

/// Extracts a required string param at `index`.
pub(crate) fn required_str(params: &[Value], index: usize) -> Result<&str, ErrorObject> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| ErrorObject::with_message(ErrorCode::InvalidParams, "missing parameter"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatcher() -> Dispatcher {
        let mut dispatcher = Dispatcher::new(true);
        dispatcher.register("eth_chainId", |_params| {
            Box::pin(async { Ok(json!("0x1")) })
        });
        dispatcher.register("eth_fails", |_params| {
            Box::pin(async { Err(ErrorObject::from_code(ErrorCode::InternalError)) })
        });
        dispatcher
    }

    async fn call(dispatcher: &Dispatcher, body: Value) -> Option<Value> {
        dispatcher.handle_raw(&body.to_string(), 1024).await
    }

    #[tokio::test]
    async fn test_single_request() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "method": "eth_chainId", "params": [], "id": 1}),
        )
        .await
        .unwrap();
        assert_eq!(response, json!({"jsonrpc": "2.0", "result": "0x1", "id": 1}));
    }

    #[tokio::test]
    async fn test_parse_error() {
        let response = dispatcher().handle_raw("{not json", 1024).await.unwrap();
        assert_eq!(response["error"]["code"], json!(-32700));
        assert_eq!(response["id"], json!(null));
    }

    #[tokio::test]
    async fn test_invalid_envelope() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "1.0", "method": "eth_chainId", "id": 1}),
        )
        .await
        .unwrap();
        assert_eq!(response["error"]["code"], json!(-32600));

        let response = call(&dispatcher(), json!("just a string")).await.unwrap();
        assert_eq!(response["error"]["code"], json!(-32600));
    }

    #[tokio::test]
    async fn test_method_not_found() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "method": "eth_unknown", "id": 1}),
        )
        .await
        .unwrap();
        assert_eq!(response["error"]["code"], json!(-32601));

        // An unknown namespace is rejected the same way.
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "method": "admin_peers", "id": 1}),
        )
        .await
        .unwrap();
        assert_eq!(response["error"]["code"], json!(-32601));
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "method": "eth_chainId"}),
        )
        .await;
        assert_eq!(response, None);

        let response = call(
            &dispatcher(),
            json!({"jsonrpc": "2.0", "method": "eth_chainId", "id": null}),
        )
        .await;
        assert_eq!(response, None);
    }

    #[tokio::test]
    async fn test_batch_mixes_results_and_omits_notifications() {
        let response = call(
            &dispatcher(),
            json!([
                {"jsonrpc": "2.0", "method": "eth_chainId", "id": 1},
                {"jsonrpc": "2.0", "method": "eth_chainId"},
                {"jsonrpc": "2.0", "method": "eth_fails", "id": 2},
            ]),
        )
        .await
        .unwrap();

        let entries = response.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["result"], json!("0x1"));
        assert_eq!(entries[1]["error"]["code"], json!(-32603));
    }

    #[tokio::test]
    async fn test_empty_batch_is_an_error() {
        let response = call(&dispatcher(), json!([])).await.unwrap();
        assert_eq!(response["error"]["code"], json!(-32600));
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected() {
        let entries = (0..5)
            .map(|id| json!({"jsonrpc": "2.0", "method": "eth_chainId", "id": id}))
            .collect::<Vec<_>>();
        let response = dispatcher().handle_raw(&json!(entries).to_string(), 4).await.unwrap();
        assert_eq!(response["error"]["code"], json!(-32000));
    }

    #[tokio::test]
    async fn test_batch_of_only_notifications_yields_nothing() {
        let response = call(
            &dispatcher(),
            json!([
                {"jsonrpc": "2.0", "method": "eth_chainId"},
                {"jsonrpc": "2.0", "method": "eth_chainId", "id": null},
            ]),
        )
        .await;
        assert_eq!(response, None);
    }
}
