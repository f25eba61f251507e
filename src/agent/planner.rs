//! Planner: one model-chosen action per iteration.
//!
//! The model sees the question, the search history and a coverage hint,
//! and answers with `{thought, action}`. The coverage policy may then
//! replace its choice with a forced legislation search.

use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::coverage::{
    forced_legislation_action, is_coverage_sufficient, should_force_source, suggest_next_search,
};
use super::extract_json_from_completion;
use super::heuristics::decompose_query_into_angles;
use super::state::{null_as_default, AgentState, PlanStep, ToolAction, ToolKind};
use crate::error::LlmResult;
use crate::llm::LanguageModel;
use crate::prompts::{
    FINAL_ANSWER_TOOL_DESCRIPTION, JURISPRUDENCE_TOOL_DESCRIPTION, LEGISLATION_TOOL_DESCRIPTION,
    PLANNER_PROMPT, RAG_TOOL_DESCRIPTION,
};
use crate::sources::SourceKind;

/// Thought recorded when the model answer cannot be used.
pub const UNPARSEABLE_THOUGHT: &str = "could not parse response";

/// Model answer for one planning step.
#[derive(Debug, Deserialize)]
struct PlannerResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    thought: String,
    action: ToolAction,
}

impl PlannerResponse {
    fn from_completion(completion: &str) -> Result<Self, String> {
        let json = extract_json_from_completion(completion)?;
        serde_json::from_str(json).map_err(|e| format!("JSON parse error: {}", e))
    }
}

/// Chooses the next action.
#[derive(Clone)]
pub struct Planner {
    model: Arc<dyn LanguageModel>,
}

impl Planner {
    /// Create a planner.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Plan the next action.
    ///
    /// Unparseable answers and non-fatal model failures fall back to
    /// `final_answer`, which the coverage policy may still override. Fatal
    /// model errors are returned.
    pub async fn plan(&self, state: &AgentState) -> LlmResult<PlanStep> {
        let start = Instant::now();
        let system_prompt = build_system_prompt(state.has_collection());
        let user_prompt = build_context(state);

        let (thought, action, input_tokens, output_tokens) =
            match self.model.complete(&system_prompt, &user_prompt).await {
                Ok(completion) => match PlannerResponse::from_completion(&completion.text) {
                    Ok(response) => (
                        response.thought,
                        response.action,
                        completion.input_tokens,
                        completion.output_tokens,
                    ),
                    Err(e) => {
                        warn!(
                            error = %e,
                            completion_preview = %completion.text.chars().take(200).collect::<String>(),
                            "Failed to parse planner response, defaulting to final answer"
                        );
                        (
                            UNPARSEABLE_THOUGHT.to_string(),
                            ToolAction::final_answer("Planner response was not usable"),
                            completion.input_tokens,
                            completion.output_tokens,
                        )
                    }
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Planner call failed, defaulting to final answer");
                    (
                        UNPARSEABLE_THOUGHT.to_string(),
                        ToolAction::final_answer(format!("Planner unavailable: {}", e)),
                        0,
                        0,
                    )
                }
            };

        let (action, overridden) = enforce_coverage(state, action);

        info!(
            iteration = state.iteration,
            tool = %action.tool,
            query = action.query().unwrap_or(""),
            overridden,
            latency_ms = start.elapsed().as_millis(),
            "Planned next action"
        );

        Ok(PlanStep {
            thought,
            action,
            overridden,
            input_tokens,
            output_tokens,
        })
    }
}

/// Apply the coverage rules to the model's choice.
///
/// Returns the action to record and whether it replaced the model's.
pub fn enforce_coverage(state: &AgentState, action: ToolAction) -> (ToolAction, bool) {
    let must_search_legislation = match action.tool {
        ToolKind::FinalAnswer => {
            !is_coverage_sufficient(state) && state.iteration + 1 < state.max_iterations
        }
        ToolKind::Rag | ToolKind::Jurisprudence => should_force_source(state),
        ToolKind::Legislation => false,
    };
    if !must_search_legislation {
        return (action, false);
    }
    match forced_legislation_action(state) {
        Some(forced) => {
            debug!(
                tool = %action.tool,
                query = ?forced.query(),
                "Action replaced by a legislation search"
            );
            (forced, true)
        }
        None => {
            debug!(
                tool = %action.tool,
                "Every legislation fallback already searched, model's action kept"
            );
            (action, false)
        }
    }
}

/// Planner instructions with the tools available for this run.
pub fn build_system_prompt(has_collection: bool) -> String {
    let mut prompt = format!("{}\n\nAvailable tools:\n", PLANNER_PROMPT);
    if has_collection {
        prompt.push_str(RAG_TOOL_DESCRIPTION);
        prompt.push('\n');
    }
    prompt.push_str(JURISPRUDENCE_TOOL_DESCRIPTION);
    prompt.push('\n');
    prompt.push_str(LEGISLATION_TOOL_DESCRIPTION);
    prompt.push('\n');
    prompt.push_str(FINAL_ANSWER_TOOL_DESCRIPTION);
    prompt
}

/// Planner context: question, coverage, search history and prior steps.
pub fn build_context(state: &AgentState) -> String {
    let mut context = String::new();
    let coverage = &state.search_coverage;

    let _ = writeln!(context, "Question: {}", state.query);
    let _ = writeln!(
        context,
        "Iteration: {} of {}",
        state.iteration + 1,
        state.max_iterations
    );
    let _ = writeln!(
        context,
        "Document collection available: {}",
        if state.has_collection() { "yes" } else { "no" }
    );

    let angles = decompose_query_into_angles(&state.query);
    if !angles.is_empty() {
        let _ = writeln!(context, "\nSuggested search angles:");
        for angle in &angles {
            let _ = writeln!(context, "- {}", angle);
        }
    }

    let _ = writeln!(context, "\nSearch coverage:");
    for source in SourceKind::ALL {
        if source == SourceKind::Rag && !state.has_collection() {
            continue;
        }
        let queries = coverage.queries(source);
        let _ = writeln!(
            context,
            "- {}: {} queries, {} results{}",
            source,
            queries.len(),
            coverage.result_count(source),
            if queries.is_empty() {
                String::new()
            } else {
                format!(" ({})", queries.join(" | "))
            }
        );
    }
    let _ = writeln!(context, "Hint: {}", suggest_next_search(state));

    if !state.failed_searches.is_empty() {
        let _ = writeln!(context, "\nSearches with 0 results (do not repeat them):");
        for failed in &state.failed_searches {
            let _ = writeln!(
                context,
                "- {} \"{}\": {}. Alternatives: {}",
                failed.tool,
                failed.query,
                failed.reason,
                if failed.alternatives.is_empty() {
                    "none".to_string()
                } else {
                    failed.alternatives.join("; ")
                }
            );
        }
    }

    if !state.successful_searches.is_empty() {
        let _ = writeln!(context, "\nSuccessful searches:");
        for success in &state.successful_searches {
            let _ = writeln!(
                context,
                "- {} \"{}\": {} results",
                success.tool, success.query, success.result_count
            );
        }
    }

    if !state.actions.is_empty() {
        let _ = writeln!(context, "\nPrevious steps:");
        for (i, action) in state.actions.iter().enumerate() {
            let _ = writeln!(context, "Step {}:", i + 1);
            if let Some(thought) = state.thoughts.get(i) {
                let _ = writeln!(context, "Thought: {}", thought);
            }
            let _ = writeln!(
                context,
                "Action: {} {}",
                action.tool,
                action.query().unwrap_or("")
            );
            if let Some(observation) = state.observations.get(i) {
                let _ = writeln!(context, "Observation: {}", observation);
            }
        }
    }

    let _ = write!(context, "\nChoose the next action.");
    context
}
