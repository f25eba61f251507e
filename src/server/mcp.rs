//! MCP protocol implementation for JSON-RPC 2.0 communication.
//!
//! Requests arrive one JSON object per line on stdin; responses are written
//! one per line on stdout. Logs go to stderr so they never mix with the
//! protocol stream.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use super::{handle_tool_call, SharedState};

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// Name advertised in `serverInfo`.
pub const SERVER_NAME: &str = "legal-research-agent";

/// MCP protocol revision implemented.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC error codes returned by the server.
pub mod error_codes {
    /// The line was not valid JSON or not a request object.
    pub const PARSE_ERROR: i32 = -32700;
    /// The method is not handled by this server.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// `tools/call` params are absent or malformed.
    pub const INVALID_PARAMS: i32 = -32602;
    /// A result could not be encoded.
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// An incoming JSON-RPC message. Without an `id` it is a notification.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol tag sent by the client, expected to be "2.0".
    pub jsonrpc: String,
    /// Correlation id echoed in the response.
    pub id: Option<Value>,
    /// Method name such as `tools/call`.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// An outgoing JSON-RPC message carrying either `result` or `error`.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: &'static str,
    /// Id of the request being answered, null when it could not be read.
    pub id: Value,
    /// Payload of a successful call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Payload of a failed call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// Error member of a [`JsonRpcResponse`].
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// One of [`error_codes`].
    pub code: i32,
    /// Description shown to the client.
    pub message: String,
}

impl JsonRpcResponse {
    /// Answer `id` with `result`.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Answer `id` with an error.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }

    fn encoded<T: Serialize>(id: Option<Value>, payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(value) => Self::success(id, value),
            Err(e) => {
                error!(error = %e, "Failed to encode result");
                Self::error(id, error_codes::INTERNAL_ERROR, format!("Internal error: {}", e))
            }
        }
    }
}

/// A tool advertised by `tools/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Name used in `tools/call`.
    pub name: &'static str,
    /// What the tool does, for the client's model.
    pub description: &'static str,
    /// JSON Schema of the `arguments` object.
    pub input_schema: Value,
}

/// Params of a `tools/call` request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    /// Tool to run.
    pub name: String,
    /// Tool arguments, validated by the handler.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// One item of tool output.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Plain text; tool results are pretty-printed JSON.
    Text {
        /// The text body.
        text: String,
    },
}

/// Result of a `tools/call`. Tool failures are reported here, not as
/// JSON-RPC errors.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    /// Output items.
    pub content: Vec<ToolContent>,
    /// Set when the tool failed.
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// A successful result carrying one text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// A failed result; the message is prefixed with `Error: `.
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: format!("Error: {}", message),
            }],
            is_error: true,
        }
    }
}

/// MCP server exposing the research agent as tools.
pub struct McpServer {
    state: SharedState,
}

impl McpServer {
    /// Wrap the shared state.
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Serve stdin/stdout until the client closes stdin.
    pub async fn run(&self) -> std::io::Result<()> {
        info!(server = SERVER_NAME, "MCP server listening on stdio");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve line-delimited JSON-RPC from `reader` until EOF, writing
    /// responses to `writer`.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let message = line.trim();
            if message.is_empty() {
                continue;
            }
            debug!(request = %message, "Received message");

            let response = match serde_json::from_str::<JsonRpcRequest>(message) {
                Ok(request) => self.dispatch(request).await,
                Err(e) => {
                    warn!(error = %e, "Unparseable message");
                    Some(JsonRpcResponse::error(
                        None,
                        error_codes::PARSE_ERROR,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            if let Some(response) = response {
                let mut encoded = serde_json::to_vec(&response)?;
                encoded.push(b'\n');
                writer.write_all(&encoded).await?;
                writer.flush().await?;
            }
        }

        info!("Client closed the stream");
        Ok(())
    }

    /// Route one request. Notifications produce no response.
    async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        let response = match method.as_str() {
            "initialize" => {
                info!("Client initializing");
                JsonRpcResponse::success(id, initialize_result())
            }
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": all_tools() })),
            "tools/call" => self.call_tool(id, params).await,
            "ping" => JsonRpcResponse::success(id, json!({})),
            _ if id.is_none() => {
                debug!(method = %method, "Notification ignored");
                return None;
            }
            _ => {
                warn!(method = %method, "Method not found");
                JsonRpcResponse::error(
                    id,
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {}", method),
                )
            }
        };
        Some(response)
    }

    async fn call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params = match params.map(serde_json::from_value::<ToolCallParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid params: {}", e),
                )
            }
            None => return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "Missing params"),
        };

        info!(tool = %params.name, "Tool call");
        let outcome = handle_tool_call(&self.state, &params.name, params.arguments)
            .await
            .and_then(|value| serde_json::to_string_pretty(&value).map_err(Into::into));

        let result = match outcome {
            Ok(text) => ToolCallResult::text(text),
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool call failed");
                ToolCallResult::error(e)
            }
        };
        JsonRpcResponse::encoded(id, &result)
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
    })
}

/// Every tool exposed by the server.
pub fn all_tools() -> Vec<Tool> {
    vec![get_research_tool(), get_query_analysis_tool()]
}

/// `legal_research`: runs the agent.
fn get_research_tool() -> Tool {
    Tool {
        name: "legal_research",
        description: "Answer a legal question by searching the user's documents, case law and legislation, keeping only pertinent results, and writing an answer that cites them as [#id].",
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "minLength": 1,
                    "description": "The legal question to research"
                },
                "user_id": {
                    "type": "string",
                    "description": "Identity of the caller"
                },
                "collection_id": {
                    "type": "string",
                    "description": "Document collection to search; without it only public sources are used"
                },
                "session_id": {
                    "type": "string",
                    "description": "Optional session ID for correlation"
                },
                "max_iterations": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 50,
                    "description": "Iteration budget of the research loop (default: 15)"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

/// `legal_query_analysis`: heuristics only.
fn get_query_analysis_tool() -> Tool {
    Tool {
        name: "legal_query_analysis",
        description: "Deterministic analysis of a legal question: article references, codes, legal concepts, search angles and alternative queries per source. No model or network calls.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "minLength": 1,
                    "description": "The legal question to analyze"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}
