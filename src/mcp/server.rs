//! MCP stdio server loop.
//!
//! A stdin reader task, stdout writer task, `eprintln!` for operational
//! logging so stdout stays protocol-clean, and a reader task → bounded
//! queue → worker pool → single writer task pipeline: responses correspond
//! to requests by id, not by completion order, so concurrent tool calls
//! don't block each other.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};

use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND};
use crate::mcp::tools::ToolContext;

/// Grace period given to in-flight handlers once stdin closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const WORKER_COUNT: usize = 4;
const QUEUE_CAPACITY: usize = 64;

struct WorkItem {
    id: Option<Value>,
    method: String,
    params: Value,
}

pub struct McpServer {
    context: Arc<ToolContext>,
}

impl McpServer {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let (work_tx, work_rx) = mpsc::channel::<WorkItem>(QUEUE_CAPACITY);
        let (response_tx, mut response_rx) = mpsc::channel::<String>(QUEUE_CAPACITY);
        let work_rx = Arc::new(Mutex::new(work_rx));

        let writer_handle = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(line) = response_rx.recv().await {
                if stdout.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                let _ = stdout.flush().await;
            }
        });

        let mut worker_handles = Vec::with_capacity(WORKER_COUNT);
        for _ in 0..WORKER_COUNT {
            let work_rx = Arc::clone(&work_rx);
            let response_tx = response_tx.clone();
            let context = Arc::clone(&self.context);
            worker_handles.push(tokio::spawn(async move {
                loop {
                    let item = {
                        let mut rx = work_rx.lock().await;
                        rx.recv().await
                    };
                    let Some(item) = item else { break };
                    let Some(id) = item.id else {
                        // Notification: run for effect, produce no response.
                        handle_method(&context, &item.method, &item.params).await;
                        continue;
                    };
                    let response = dispatch_with_response(&context, id, &item.method, &item.params).await;
                    if response_tx.send(response.to_line()).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(response_tx);

        self.read_loop(work_tx).await?;

        for handle in worker_handles {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
        }
        let _ = writer_handle.await;
        Ok(())
    }

    async fn read_loop(&self, work_tx: mpsc::Sender<WorkItem>) -> anyhow::Result<()> {
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        eprintln!("[taskwing-mcp] stdio server started");

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(req) => req,
                Err(e) => {
                    // Malformed framing is a protocol violation, not a
                    // per-call error: abort rather than keep reading.
                    eprintln!("[taskwing-mcp] malformed JSON-RPC line, aborting: {e}");
                    break;
                }
            };

            if work_tx
                .send(WorkItem {
                    id: request.id,
                    method: request.method,
                    params: request.params,
                })
                .await
                .is_err()
            {
                break;
            }
        }

        eprintln!("[taskwing-mcp] stdio server stopped");
        Ok(())
    }
}

async fn dispatch_with_response(context: &ToolContext, id: Value, method: &str, params: &Value) -> JsonRpcResponse {
    match method {
        "initialize" => JsonRpcResponse::success(id, initialize_result()),
        "tools/list" => JsonRpcResponse::success(id, tools_list_result()),
        "tools/call" => tools_call_response(context, id, params).await,
        other => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("method not found: {other}")),
    }
}

/// Handle a notification (no `id`, no response). Only `notifications/initialized`
/// is expected on this surface; anything else is logged and dropped.
async fn handle_method(_context: &ToolContext, method: &str, _params: &Value) {
    if method != "notifications/initialized" {
        eprintln!("[taskwing-mcp] ignoring unknown notification: {method}");
    }
}

fn initialize_result() -> Value {
    serde_json::json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {"tools": {}},
        "serverInfo": {"name": "taskwing", "version": env!("CARGO_PKG_VERSION")},
    })
}

fn tools_list_result() -> Value {
    serde_json::json!({
        "tools": [
            {
                "name": "recall",
                "description": "Search project memory by keyword and vector similarity, or list a summary when the query is empty.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "type": {"type": "string", "description": "Filter by node kind"},
                        "limit": {"type": "integer"},
                        "all": {"type": "boolean"},
                        "answer": {"type": "boolean", "description": "Synthesize a natural-language answer from the results"}
                    }
                }
            },
            {
                "name": "task",
                "description": "Drive the active plan's task queue: next, current, start, complete, list, update.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "action": {"type": "string", "enum": ["next", "current", "start", "complete", "list", "update"]},
                        "task_id": {"type": "string"},
                        "session_id": {"type": "string"},
                        "summary": {"type": "string"},
                        "files_modified": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["action"]
                }
            },
            {
                "name": "plan",
                "description": "Drive the Clarify/Decompose/Expand/Finalize planning pipeline.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "action": {"type": "string", "enum": ["clarify", "decompose", "expand", "finalize", "generate", "list", "show", "delete"]},
                        "session_id": {"type": "string"},
                        "goal": {"type": "string"},
                        "answers": {"type": "array", "items": {"type": "string"}},
                        "auto_answer": {"type": "boolean"},
                        "phase_id": {"type": "string"},
                        "plan_id": {"type": "string"}
                    },
                    "required": ["action"]
                }
            },
            {
                "name": "code",
                "description": "Explain, simplify, or find callers of a symbol using project memory context.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "action": {"type": "string", "enum": ["explain", "simplify", "callers"]},
                        "symbol": {"type": "string"}
                    },
                    "required": ["action", "symbol"]
                }
            },
            {
                "name": "debug",
                "description": "Diagnose a reported problem using project memory context.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "problem": {"type": "string"},
                        "error": {"type": "string"},
                        "stack_trace": {"type": "string"}
                    },
                    "required": ["problem"]
                }
            }
        ]
    })
}

async fn tools_call_response(context: &ToolContext, id: Value, params: &Value) -> JsonRpcResponse {
    let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
        return JsonRpcResponse::error(id, INVALID_PARAMS, "missing tool name");
    };
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| serde_json::json!({}));

    match context.dispatch(tool_name, &arguments).await {
        Ok(result) => JsonRpcResponse::success(
            id,
            serde_json::json!({"content": [{"type": "text", "text": result.to_string()}]}),
        ),
        Err(err) => {
            let hint = err.default_hint();
            let body = serde_json::json!({
                "ok": false,
                "kind": err.kind(),
                "message": err.to_string(),
                "hint": hint,
            });
            JsonRpcResponse::success(
                id,
                serde_json::json!({
                    "content": [{"type": "text", "text": body.to_string()}],
                    "isError": true,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_result_advertises_tool_capability() {
        let result = initialize_result();
        assert!(result["capabilities"]["tools"].is_object());
        assert_eq!(result["serverInfo"]["name"], "taskwing");
    }

    #[test]
    fn tools_list_includes_the_five_stable_tools() {
        let result = tools_list_result();
        let names: Vec<&str> = result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["recall", "task", "plan", "code", "debug"]);
    }

    #[test]
    fn unused_error_code_constant_is_reachable() {
        assert_eq!(INTERNAL_ERROR, -32603);
    }
}
