//! Error taxonomy.
//!
//! Source and judge failures are absorbed inside the research loop; only
//! fatal [`LlmError`]s and configuration problems reach a caller.

use thiserror::Error;

/// Errors surfaced by the crate entry points.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Language model error: {0}")]
    Llm(#[from] LlmError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failures of a [`crate::llm::LanguageModel`] call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Language model not configured: {message}")]
    NotConfigured { message: String },

    #[error("Language model unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LlmError {
    /// Whether no further progress is possible with this provider.
    ///
    /// Fatal errors escape planning and synthesis; everything else is
    /// absorbed by the step that hit it.
    pub fn is_fatal(&self) -> bool {
        match self {
            LlmError::NotConfigured { .. } => true,
            LlmError::Api { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }

    /// Whether the request is worth sending again.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::Timeout { .. } | LlmError::Http(_) => true,
            LlmError::NotConfigured { .. }
            | LlmError::Unavailable { .. }
            | LlmError::InvalidResponse { .. } => false,
        }
    }
}

/// Failures of a source adapter call. Recorded on the tool call, never
/// propagated out of a run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Document collection not found: {collection_id}")]
    CollectionNotFound { collection_id: String },

    #[error("No document collection selected")]
    NoCollection,

    #[error("Source not configured: {source_name}")]
    NotConfigured { source_name: String },

    #[error("Source API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid source response: {message}")]
    InvalidResponse { message: String },

    #[error("Source request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures of an MCP tool call, reported to the client with `isError`.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Argument validation failures inside a tool handler.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },
}

impl From<ToolError> for AppError {
    fn from(err: ToolError) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Result of a crate entry point.
pub type AppResult<T> = Result<T, AppError>;

/// Result of a model call.
pub type LlmResult<T> = Result<T, LlmError>;

/// Result of a source adapter call.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result of an MCP tool handler.
pub type McpResult<T> = Result<T, McpError>;
