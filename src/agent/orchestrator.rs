//! Orchestrator: the plan → execute → synthesize state machine.
//!
//! ```text
//! START → PLAN
//! PLAN → SYNTHESIZE        when the iteration budget is spent
//! PLAN → EXECUTE           otherwise
//! EXECUTE → SYNTHESIZE     after a final_answer action
//! EXECUTE → PLAN           otherwise
//! SYNTHESIZE → DONE
//! ```
//!
//! Every EXECUTE advances the iteration by one, so a run performs at most
//! `max_iterations` plan/execute round trips plus one synthesis.

use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::executor::Executor;
use super::pertinence::PertinenceJudge;
use super::planner::Planner;
use super::serialize_for_log;
use super::state::{AgentState, ToolAction, ToolCallRecord, ToolKind};
use super::synthesizer::{SourceReference, Synthesizer};
use crate::config::AgentSettings;
use crate::error::{AppResult, ToolError};
use crate::llm::LanguageModel;
use crate::sources::SourceAdapters;

/// Progress notification, one per state transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The planner is about to be called.
    Planning { iteration: u32 },
    /// The planner chose an action.
    Planned {
        iteration: u32,
        thought: String,
        action: ToolAction,
        overridden: bool,
    },
    /// An action is being executed.
    Executing {
        iteration: u32,
        tool: ToolKind,
        query: Option<String>,
    },
    /// An action finished.
    Executed {
        iteration: u32,
        observation: String,
        tool_call: Option<ToolCallRecord>,
    },
    /// The answer is being written.
    Synthesizing { documents: usize },
    /// The run is over.
    Completed {
        iterations: u32,
        sources: usize,
        error: Option<String>,
    },
}

/// Receives progress events. Has no effect on control flow.
pub trait ProgressSink: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Sink that logs every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_event(&self, event: &ProgressEvent) {
        debug!(event = %serialize_for_log(event, "progress_event"), "Research progress");
    }
}

fn emit(sink: Option<&dyn ProgressSink>, event: ProgressEvent) {
    let Some(sink) = sink else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| sink.on_event(&event))).is_err() {
        warn!("Progress sink panicked, event dropped");
    }
}

/// Per-run options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Overrides the configured iteration budget.
    #[serde(default)]
    pub max_iterations: Option<u32>,
}

/// What a run returns to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub answer: String,
    pub sources: Vec<SourceReference>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub iterations: u32,
    pub tool_calls: Vec<ToolCallRecord>,
}

impl From<&AgentState> for RunOutput {
    fn from(state: &AgentState) -> Self {
        Self {
            answer: state.answer.clone(),
            sources: state.sources.clone(),
            input_tokens: state.input_tokens,
            output_tokens: state.output_tokens,
            error: state.error.clone(),
            iterations: state.iteration,
            tool_calls: state.tool_calls.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Plan,
    Execute,
    Synthesize,
    Done,
}

/// The research agent. Cheap to clone; holds no per-run state.
#[derive(Clone)]
pub struct LegalResearchAgent {
    planner: Planner,
    executor: Executor,
    synthesizer: Synthesizer,
    settings: AgentSettings,
}

impl LegalResearchAgent {
    /// Build an agent from a model and the source adapters.
    pub fn new(
        model: Arc<dyn LanguageModel>,
        sources: SourceAdapters,
        settings: AgentSettings,
    ) -> Self {
        let judge = PertinenceJudge::new(model.clone(), settings.clone());
        Self {
            planner: Planner::new(model.clone()),
            executor: Executor::new(sources, judge, settings.clone()),
            synthesizer: Synthesizer::new(model, settings.clone()),
            settings,
        }
    }

    /// Agent settings.
    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Answer `query` for `user_id`.
    pub async fn run(
        &self,
        query: &str,
        user_id: &str,
        options: RunOptions,
        progress: Option<&dyn ProgressSink>,
    ) -> AppResult<RunOutput> {
        let (output, _) = self.run_with_state(query, user_id, options, progress).await?;
        Ok(output)
    }

    /// Like [`run`](Self::run), also returning the final state.
    pub async fn run_with_state(
        &self,
        query: &str,
        user_id: &str,
        options: RunOptions,
        progress: Option<&dyn ProgressSink>,
    ) -> AppResult<(RunOutput, AgentState)> {
        if query.trim().is_empty() {
            return Err(ToolError::Validation {
                field: "query".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        let start = Instant::now();
        let mut state = AgentState::new(
            query.trim(),
            user_id,
            options.collection_id,
            options.session_id,
            options.max_iterations.unwrap_or(self.settings.max_iterations),
        );

        info!(
            session_id = %state.session_id,
            user_id = %state.user_id,
            has_collection = state.has_collection(),
            max_iterations = state.max_iterations,
            "Research run started"
        );

        let mut phase = Phase::Plan;
        while phase != Phase::Done {
            phase = match phase {
                Phase::Plan if state.budget_exhausted() => {
                    debug!(iteration = state.iteration, "Iteration budget spent");
                    Phase::Synthesize
                }
                Phase::Plan => {
                    emit(
                        progress,
                        ProgressEvent::Planning {
                            iteration: state.iteration,
                        },
                    );
                    let step = self.planner.plan(&state).await?;
                    emit(
                        progress,
                        ProgressEvent::Planned {
                            iteration: state.iteration,
                            thought: step.thought.clone(),
                            action: step.action.clone(),
                            overridden: step.overridden,
                        },
                    );
                    state.apply_plan(step);
                    Phase::Execute
                }
                Phase::Execute => {
                    let (tool, query) = match state.last_action() {
                        Some(action) => (action.tool, action.query().map(str::to_string)),
                        None => (ToolKind::FinalAnswer, None),
                    };
                    emit(
                        progress,
                        ProgressEvent::Executing {
                            iteration: state.iteration,
                            tool,
                            query,
                        },
                    );
                    let step = self.executor.execute(&state).await;
                    let observation = step.observation.clone();
                    let tool_call = step.tool_call.clone();
                    state.apply_execution(step);
                    emit(
                        progress,
                        ProgressEvent::Executed {
                            iteration: state.iteration,
                            observation,
                            tool_call,
                        },
                    );
                    if tool == ToolKind::FinalAnswer {
                        Phase::Synthesize
                    } else {
                        Phase::Plan
                    }
                }
                Phase::Synthesize => {
                    emit(
                        progress,
                        ProgressEvent::Synthesizing {
                            documents: state.document_count(),
                        },
                    );
                    let synthesis = self.synthesizer.synthesize(&state).await?;
                    state.apply_synthesis(synthesis);
                    Phase::Done
                }
                Phase::Done => Phase::Done,
            };
        }

        emit(
            progress,
            ProgressEvent::Completed {
                iterations: state.iteration,
                sources: state.sources.len(),
                error: state.error.clone(),
            },
        );
        info!(
            session_id = %state.session_id,
            iterations = state.iteration,
            tool_calls = state.tool_calls.len(),
            sources = state.sources.len(),
            input_tokens = state.input_tokens,
            output_tokens = state.output_tokens,
            failed = state.error.is_some(),
            latency_ms = start.elapsed().as_millis(),
            "Research run completed"
        );

        Ok((RunOutput::from(&state), state))
    }
}
