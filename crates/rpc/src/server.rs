//! The HTTP and WebSocket surface serving the dispatcher.

use crate::{Dispatcher, ErrorCode, ErrorObject, Id, Response, RpcConfig};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, State,
    },
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::Semaphore};
use tracing::{debug, info, warn};

/// The shared server state.
struct ServerState {
    dispatcher: Dispatcher,
    config: RpcConfig,
    /// Bounds concurrent in-flight requests; excess is rejected, not queued.
    inflight: Arc<Semaphore>,
}

/// The JSON-RPC server: HTTP POST and WebSocket upgrade on the same
/// dispatcher. The WebSocket listener shares the HTTP port unless a separate
/// one is configured.
#[derive(Clone)]
pub struct RpcServer {
    state: Arc<ServerState>,
}

impl core::fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RpcServer").field("config", &self.state.config).finish()
    }
}

impl RpcServer {
    /// Creates a server over the dispatcher.
    pub fn new(config: RpcConfig, dispatcher: Dispatcher) -> Self {
        let inflight = Arc::new(Semaphore::new(config.queue_limit));
        Self { state: Arc::new(ServerState { dispatcher, config, inflight }) }
    }

    /// The axum router serving both surfaces.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", post(handle_http).get(handle_ws_upgrade))
            .layer(DefaultBodyLimit::max(self.state.config.max_request_body))
            .with_state(self.state.clone())
    }

    /// Binds the configured address and serves until the listener fails. A
    /// separate WebSocket listener is started when `ws_port` differs from the
    /// HTTP port.
    pub async fn serve(self) -> std::io::Result<()> {
        let http_addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = TcpListener::bind(&http_addr).await?;
        info!(target: "rpc", address = %http_addr, "JSON-RPC server listening");

        if let Some(ws_port) = self.state.config.ws_port {
            if ws_port != self.state.config.port {
                let ws_addr = format!("{}:{}", self.state.config.host, ws_port);
                let ws_listener = TcpListener::bind(&ws_addr).await?;
                info!(target: "rpc", address = %ws_addr, "WebSocket server listening");
                let ws_router = self.router();
                let _ws_task = tokio::spawn(async move {
                    if let Err(e) = axum::serve(ws_listener, ws_router).await {
                        warn!(target: "rpc", "WebSocket server exited: {e}");
                    }
                });
            }
        }

        axum::serve(listener, self.router()).await
    }

    /// Serves on an existing listener. Used by tests and by callers that
    /// bind their own sockets.
    pub async fn serve_on(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.router()).await
    }
}

/// Runs one request body through the dispatcher under the queue and timeout
/// limits. Returns the serialized response, or [None] when no response is
/// owed.
async fn process_body(state: &ServerState, body: String) -> Option<String> {
    let Ok(_permit) = state.inflight.try_acquire() else {
        let response = Response::failure(
            Id::Null,
            ErrorObject::with_message(ErrorCode::ServerError, "too busy"),
        );
        return serde_json::to_string(&response).ok();
    };

    let dispatched = tokio::time::timeout(
        state.config.request_timeout,
        state.dispatcher.handle_raw(&body, state.config.max_batch_size),
    )
    .await;

    let value = match dispatched {
        Ok(value) => value?,
        Err(_) => {
            debug!(target: "rpc", "Request timed out");
            let response = Response::failure(
                Id::Null,
                ErrorObject::with_message(ErrorCode::ServerError, "request timed out"),
            );
            return serde_json::to_string(&response).ok();
        }
    };

    let serialized = serde_json::to_string(&value).ok()?;
    if serialized.len() > state.config.max_batch_response {
        let response = Response::failure(
            Id::Null,
            ErrorObject::with_message(ErrorCode::ServerError, "response too large"),
        );
        return serde_json::to_string(&response).ok();
    }
    Some(serialized)
}

async fn handle_http(State(state): State<Arc<ServerState>>, body: String) -> impl IntoResponse {
    let payload = process_body(&state, body).await.unwrap_or_default();
    ([(axum::http::header::CONTENT_TYPE, "application/json")], payload)
}

async fn handle_ws_upgrade(
    State(state): State<Arc<ServerState>>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_ws(state, socket))
}

/// One task per WebSocket connection; requests are answered in order.
async fn handle_ws(state: Arc<ServerState>, mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        let body = match message {
            Message::Text(body) => body,
            Message::Close(_) => break,
            _ => continue,
        };
        if let Some(response) = process_body(&state, body).await {
            if socket.send(Message::Text(response)).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_server(config: RpcConfig) -> RpcServer {
        let mut dispatcher = Dispatcher::new(true);
        dispatcher.register("eth_chainId", |_params| Box::pin(async { Ok(json!("0x1")) }));
        dispatcher.register("eth_slow", |_params| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(json!("never"))
            })
        });
        RpcServer::new(config, dispatcher)
    }

    async fn http_post(address: std::net::SocketAddr, body: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(address).await.unwrap();
        let request = format!(
            "POST / HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let raw = String::from_utf8(raw).unwrap();
        let (_, payload) = raw.split_once("\r\n\r\n").unwrap();
        payload.to_string()
    }

    async fn spawn_server(config: RpcConfig) -> std::net::SocketAddr {
        let server = test_server(config);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let _server = tokio::spawn(server.serve_on(listener));
        address
    }

    #[tokio::test]
    async fn test_http_round_trip() {
        let address = spawn_server(RpcConfig::default()).await;
        let body = json!({"jsonrpc": "2.0", "method": "eth_chainId", "params": [], "id": 1});
        let payload = http_post(address, &body.to_string()).await;

        let response: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(response["result"], json!("0x1"));
        assert_eq!(response["id"], json!(1));
    }

    #[tokio::test]
    async fn test_http_parse_error() {
        let address = spawn_server(RpcConfig::default()).await;
        let payload = http_post(address, "{oops").await;
        let response: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(response["error"]["code"], json!(-32700));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let config =
            RpcConfig { request_timeout: Duration::from_millis(50), ..RpcConfig::default() };
        let address = spawn_server(config).await;

        let body = json!({"jsonrpc": "2.0", "method": "eth_slow", "params": [], "id": 1});
        let payload = http_post(address, &body.to_string()).await;
        let response: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(response["error"]["code"], json!(-32000));
        assert!(response["error"]["message"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_queue_limit_rejects_excess() {
        let state = test_server(RpcConfig { queue_limit: 0, ..RpcConfig::default() });
        let body = json!({"jsonrpc": "2.0", "method": "eth_chainId", "id": 1}).to_string();
        let payload = process_body(&state.state, body).await.unwrap();
        let response: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(response["error"]["code"], json!(-32000));
        assert!(response["error"]["message"].as_str().unwrap().contains("busy"));
    }

    #[tokio::test]
    async fn test_notification_yields_empty_body() {
        let address = spawn_server(RpcConfig::default()).await;
        let body = json!({"jsonrpc": "2.0", "method": "eth_chainId"});
        let payload = http_post(address, &body.to_string()).await;
        assert!(payload.is_empty());
    }
}
