//! The JSON-RPC 2.0 request/response envelope.

use crate::{ErrorCode, ErrorObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request id: integer, string, or null. Requests with a null or absent id
/// are notifications and receive no response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// An integer id.
    Number(i64),
    /// A string id.
    String(String),
    /// An explicit null id.
    Null,
}

/// A parsed request object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Request {
    /// The protocol version; must be exactly `"2.0"`.
    pub jsonrpc: String,
    /// The fully qualified method name.
    pub method: String,
    /// The positional parameters, if any.
    #[serde(default)]
    pub params: Option<Value>,
    /// The request id. [None] and `Some(Id::Null)` both mark a notification.
    #[serde(default)]
    pub id: Option<Id>,
}

impl Request {
    /// Returns `true` if this request expects no response.
    pub fn is_notification(&self) -> bool {
        matches!(self.id, None | Some(Id::Null))
    }
}

/// A response object: exactly one of `result` and `error` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// The result member, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error member, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
    /// The id the response answers. Null when the request id was unreadable.
    pub id: Id,
}

impl Response {
    /// Builds a success response.
    pub fn success(id: Id, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: Some(result), error: None, id }
    }

    /// Builds an error response.
    pub fn failure(id: Id, error: ErrorObject) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: None, error: Some(error), id }
    }

    /// Builds an error response from a taxonomy code.
    pub fn failure_code(id: Id, code: ErrorCode) -> Self {
        Self::failure(id, ErrorObject::from_code(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_deserialization() {
        let request: Request = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "eth_chainId",
            "params": [],
            "id": 1,
        }))
        .unwrap();
        assert_eq!(request.method, "eth_chainId");
        assert_eq!(request.id, Some(Id::Number(1)));
        assert!(!request.is_notification());
    }

    #[test]
    fn test_id_forms() {
        let request: Request = serde_json::from_value(json!({
            "jsonrpc": "2.0", "method": "m", "id": "abc",
        }))
        .unwrap();
        assert_eq!(request.id, Some(Id::String("abc".to_string())));

        let request: Request = serde_json::from_value(json!({
            "jsonrpc": "2.0", "method": "m", "id": null,
        }))
        .unwrap();
        assert_eq!(request.id, Some(Id::Null));
        assert!(request.is_notification());

        let request: Request =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "m"})).unwrap();
        assert_eq!(request.id, None);
        assert!(request.is_notification());
    }

    #[test]
    fn test_response_shape() {
        let success = Response::success(Id::Number(7), json!("0x1"));
        let json = serde_json::to_value(&success).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "result": "0x1", "id": 7}));

        let failure = Response::failure_code(Id::Null, ErrorCode::ParseError);
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(
            json,
            json!({"jsonrpc": "2.0", "error": {"code": -32700, "message": "Parse error"}, "id": null})
        );
    }

    #[test]
    fn test_null_result_is_preserved() {
        // A missing block legitimately answers with `result: null`.
        let response = Response::success(Id::Number(1), Value::Null);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "result": null, "id": 1}));
    }
}
