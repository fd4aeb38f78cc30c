//! JSON-RPC 2.0 line framing, trimmed to what a stdio transport needs:
//! `id` is the correlation key a worker carries through to its response,
//! independent of arrival or completion order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parsed request line. Absence of `id` marks a notification — the
/// handler must run but MUST NOT produce a response line.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorBody {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcErrorBody {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":-32603,"message":"{e}"}}}}"#)
        });
        line.push('\n');
        line
    }
}

/// Standard JSON-RPC error codes used by the dispatcher.
pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_without_id_is_a_notification() {
        let req: JsonRpcRequest = serde_json::from_str(r#"{"method":"notifications/initialized"}"#).unwrap();
        assert!(req.id.is_none());
    }

    #[test]
    fn success_response_omits_error_field() {
        let resp = JsonRpcResponse::success(Value::from(1), serde_json::json!({"ok": true}));
        let line = resp.to_line();
        assert!(!line.contains("\"error\""));
        assert!(line.ends_with('\n'));
    }
}
