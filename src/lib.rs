//! # Legal Research Agent
//!
//! A multi-source legal research agent. For one question it plans searches
//! over the user's document collection, case law and legislation, filters
//! what comes back for pertinence and writes an answer citing the retained
//! sources.
//!
//! ## Features
//!
//! - **ReAct loop**: plan, act, observe until coverage is sufficient or the
//!   iteration budget is spent
//! - **Coverage policy**: legislation and case law are both searched before
//!   answering
//! - **Pertinence judging**: every retrieved document is scored by the model
//!   and discarded below a per-source threshold
//! - **Cited synthesis**: answers reference sources as `[#jur:1]`, and
//!   unknown citations are removed
//! - **MCP front**: the agent is exposed as tools over JSON-RPC on stdio
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (Rust) → Agent ─┬→ Langbase Pipe (HTTP)
//!                                          └→ Source APIs (HTTP)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use legal_research_agent::{Config, LegalResearchAgent, RunOptions};
//! use legal_research_agent::llm::LangbaseClient;
//! use legal_research_agent::sources::SourceAdapters;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let model = LangbaseClient::new(&config.langbase, config.request.clone())?;
//!     let sources = SourceAdapters::from_config(&config.sources)?;
//!     let agent = LegalResearchAgent::new(Arc::new(model), sources, config.agent.clone());
//!     let output = agent
//!         .run("Quelle est la durée du préavis ?", "user-1", RunOptions::default(), None)
//!         .await?;
//!     println!("{}", output.answer);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// The research agent: state, heuristics, planning, execution and synthesis.
pub mod agent;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Language model seam and the Langbase pipe client.
pub mod llm;
/// System prompts for planning, pertinence judging and synthesis.
pub mod prompts;
/// MCP server implementation and request handling.
pub mod server;
/// Source adapters for documents, jurisprudence and legislation.
pub mod sources;

pub use agent::{LegalResearchAgent, RunOptions, RunOutput};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, McpServer, SharedState};
