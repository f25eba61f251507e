//! The legal research agent.
//!
//! A ReAct loop over three knowledge sources:
//!
//! ```text
//! plan → (execute → plan)* → synthesize
//! ```
//!
//! - [`planner`] asks the model for one next action, subject to the
//!   [`coverage`] policy
//! - [`executor`] dispatches the action to a source adapter and keeps only
//!   the documents the [`pertinence`] judge accepts
//! - [`synthesizer`] builds the citation registry and writes the answer
//! - [`orchestrator`] drives the state machine and exposes [`LegalResearchAgent::run`]
//!
//! [`heuristics`] holds the deterministic query analysis used to seed
//! searches and to suggest alternatives after empty results.

pub mod coverage;
pub mod executor;
pub mod heuristics;
pub mod orchestrator;
pub mod pertinence;
pub mod planner;
pub mod state;
pub mod synthesizer;

pub use orchestrator::{
    LegalResearchAgent, ProgressEvent, ProgressSink, RunOptions, RunOutput, TracingProgress,
};
pub use pertinence::{PertinenceJudge, PertinenceResult};
pub use state::{AgentState, ToolAction, ToolCallRecord, ToolCallStatus, ToolKind};
pub use synthesizer::{SourceDetails, SourceReference};

use tracing::warn;

/// Serialize a value for a log field, never failing.
pub(crate) fn serialize_for_log<T: serde::Serialize>(
    value: &T,
    context: &str,
) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        warn!(
            error = %e,
            context = %context,
            "Failed to serialize value for log"
        );
        serde_json::json!({
            "serialization_error": e.to_string(),
            "context": context
        })
    })
}

/// Extract JSON from a model completion, tolerating markdown code fences.
///
/// Tries raw JSON first, then a ```` ```json ```` block, then any
/// ```` ``` ```` block, and finally the outermost `{...}` span.
pub(crate) fn extract_json_from_completion(completion: &str) -> Result<&str, String> {
    let trimmed = completion.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    if completion.contains("```json") {
        return completion
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ```json block but content was empty or malformed".to_string());
    }

    if completion.contains("```") {
        return completion
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ``` block but content was empty or malformed".to_string());
    }

    // Prose around a bare object
    if let (Some(start), Some(end)) = (completion.find('{'), completion.rfind('}')) {
        if start < end {
            return Ok(&completion[start..=end]);
        }
    }

    Err(format!(
        "No JSON found in response. First 100 chars: '{}'",
        completion.chars().take(100).collect::<String>()
    ))
}

/// Truncate to at most `max_chars` characters, on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
