use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::info;

use super::SharedState;
use crate::agent::heuristics::{analyze_query, QueryAnalysis};
use crate::agent::{RunOptions, RunOutput, TracingProgress};
use crate::error::{McpError, McpResult, ToolError};

/// Default user id when a client does not send one.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        "legal_research" => handle_research(state, arguments).await,
        "legal_query_analysis" => handle_query_analysis(arguments).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

/// Arguments of the `legal_research` tool. Unknown keys are rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResearchParams {
    /// The legal question.
    pub query: String,
    /// Caller identity, used for logging and collection access.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Document collection to search with the `rag` tool.
    #[serde(default)]
    pub collection_id: Option<String>,
    /// Session id to reuse; a new one is generated otherwise.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Overrides the configured iteration budget.
    #[serde(default)]
    pub max_iterations: Option<u32>,
}

/// Arguments of the `legal_query_analysis` tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryAnalysisParams {
    /// The legal question to analyze.
    pub query: String,
}

/// Result of the `legal_query_analysis` tool.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnalysisResult {
    /// The analyzed question.
    pub query: String,
    /// Deterministic heuristics over the question.
    #[serde(flatten)]
    pub analysis: QueryAnalysis,
}

/// Handle legal_research tool call
async fn handle_research(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("legal_research", arguments, |params: ResearchParams| async move {
        let start = Instant::now();
        let user_id = params
            .user_id
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());
        let options = RunOptions {
            collection_id: params.collection_id,
            session_id: params.session_id,
            max_iterations: params.max_iterations,
        };

        let output: RunOutput = state
            .agent
            .run(&params.query, &user_id, options, Some(&TracingProgress))
            .await?;

        info!(
            user_id = %user_id,
            iterations = output.iterations,
            sources = output.sources.len(),
            latency_ms = start.elapsed().as_millis(),
            "Research completed"
        );
        Ok::<_, crate::error::AppError>(output)
    })
    .await
}

/// Handle legal_query_analysis tool call
async fn handle_query_analysis(arguments: Option<Value>) -> McpResult<Value> {
    execute_handler(
        "legal_query_analysis",
        arguments,
        |params: QueryAnalysisParams| async move {
            if params.query.trim().is_empty() {
                return Err(ToolError::Validation {
                    field: "query".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
            Ok(QueryAnalysisResult {
                analysis: analyze_query(&params.query),
                query: params.query,
            })
        },
    )
    .await
}

// ============================================================================
// Helper functions
// ============================================================================

/// Helper to parse arguments with consistent error handling
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}

/// Parse arguments, run `operation` and serialize its result.
async fn execute_handler<P, R, E, F, Fut>(
    tool_name: &str,
    arguments: Option<Value>,
    operation: F,
) -> McpResult<Value>
where
    P: serde::de::DeserializeOwned,
    R: Serialize,
    E: std::fmt::Display,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
{
    let params: P = parse_arguments(tool_name, arguments)?;

    let result = operation(params)
        .await
        .map_err(|e| McpError::ExecutionFailed {
            message: e.to_string(),
        })?;

    serde_json::to_value(result).map_err(McpError::Json)
}
