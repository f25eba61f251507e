//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;

use crate::agent::LegalResearchAgent;
use crate::config::Config;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// The research agent answering `legal_research` calls.
    pub agent: LegalResearchAgent,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, agent: LegalResearchAgent) -> Self {
        tracing::info!(
            pipe = %config.langbase.pipe,
            max_iterations = config.agent.max_iterations,
            documents = config.sources.documents_url.is_some(),
            jurisprudence = config.sources.jurisprudence_url.is_some(),
            legislation = config.sources.legislation_url.is_some(),
            "AppState initializing"
        );
        Self { config, agent }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
