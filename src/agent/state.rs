//! Agent state and the typed outputs of each orchestration step.
//!
//! [`AgentState`] is owned by the orchestrator for the lifetime of one
//! query. The planner, executor and synthesizer never mutate it; each
//! returns a step value ([`PlanStep`], [`ExecutionStep`], [`Synthesis`])
//! that the orchestrator applies with the matching `apply_*` method.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::synthesizer::{SourceReference, Synthesis};
use crate::sources::{JurisprudenceDocument, LegislationDocument, RagPassage, SourceKind};

/// Document type used for legislation searches when the planner gives none.
pub const DEFAULT_LEGISLATION_TYPE: &str = "loi";

/// Tools the planner can choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Search the user's document collection.
    Rag,
    /// Search court decisions.
    Jurisprudence,
    /// Search legislation.
    Legislation,
    /// Stop searching and synthesize.
    FinalAnswer,
}

impl ToolKind {
    /// Get the tool name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Rag => "rag",
            ToolKind::Jurisprudence => "jurisprudence",
            ToolKind::Legislation => "legislation",
            ToolKind::FinalAnswer => "final_answer",
        }
    }

    /// The knowledge source searched by this tool, if any.
    pub fn source(&self) -> Option<SourceKind> {
        match self {
            ToolKind::Rag => Some(SourceKind::Rag),
            ToolKind::Jurisprudence => Some(SourceKind::Jurisprudence),
            ToolKind::Legislation => Some(SourceKind::Legislation),
            ToolKind::FinalAnswer => None,
        }
    }
}

impl From<SourceKind> for ToolKind {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Rag => ToolKind::Rag,
            SourceKind::Jurisprudence => ToolKind::Jurisprudence,
            SourceKind::Legislation => ToolKind::Legislation,
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One planned action. Immutable once recorded in the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolAction {
    /// Tool to run.
    pub tool: ToolKind,
    /// Tool arguments; search tools read `query` (and `document_type`).
    #[serde(default, deserialize_with = "null_as_default")]
    pub args: Map<String, Value>,
    /// Why this action was chosen.
    #[serde(default, deserialize_with = "null_as_default")]
    pub reasoning: String,
}

/// Deserialize an absent or `null` member as `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ToolAction {
    /// A search action with a query argument.
    pub fn search(tool: ToolKind, query: impl Into<String>, reasoning: impl Into<String>) -> Self {
        let mut args = Map::new();
        args.insert("query".to_string(), Value::String(query.into()));
        Self {
            tool,
            args,
            reasoning: reasoning.into(),
        }
    }

    /// A final answer action.
    pub fn final_answer(reasoning: impl Into<String>) -> Self {
        Self {
            tool: ToolKind::FinalAnswer,
            args: Map::new(),
            reasoning: reasoning.into(),
        }
    }

    /// Set the legislation document type.
    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.args.insert(
            "document_type".to_string(),
            Value::String(document_type.into()),
        );
        self
    }

    /// The trimmed, non-empty `query` argument.
    pub fn query(&self) -> Option<&str> {
        self.args
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    /// The legislation document type, defaulting to [`DEFAULT_LEGISLATION_TYPE`].
    pub fn document_type(&self) -> &str {
        self.args
            .get("document_type")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_LEGISLATION_TYPE)
    }
}

/// Lifecycle of a dispatched tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// Created, not yet dispatched.
    Pending,
    /// Dispatched to the adapter.
    Running,
    /// Adapter returned (possibly zero results).
    Completed,
    /// Adapter failed.
    Error,
}

/// Audit record of one dispatched search.
///
/// Status only moves forward: `pending → running → completed | error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub tool: ToolKind,
    pub query: String,
    pub status: ToolCallStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub result_summary: Option<String>,
    pub error: Option<String>,
}

impl ToolCallRecord {
    /// A pending record.
    pub fn new(tool: ToolKind, query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tool,
            query: query.into(),
            status: ToolCallStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            result_summary: None,
            error: None,
        }
    }

    /// Mark as running. Returns false if the record was not pending.
    pub fn start(&mut self) -> bool {
        if self.status != ToolCallStatus::Pending {
            return false;
        }
        self.status = ToolCallStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// Mark as completed. Returns false if the record was not running.
    pub fn complete(&mut self, result_summary: impl Into<String>) -> bool {
        if self.status != ToolCallStatus::Running {
            return false;
        }
        self.status = ToolCallStatus::Completed;
        self.result_summary = Some(result_summary.into());
        self.finish();
        true
    }

    /// Mark as failed. Returns false if the record was already terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = ToolCallStatus::Error;
        self.error = Some(error.into());
        self.finish();
        true
    }

    /// Whether the record reached `completed` or `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ToolCallStatus::Completed | ToolCallStatus::Error
        )
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = self
            .started_at
            .map(|started| (now - started).num_milliseconds().max(0) as u64);
    }
}

/// Distinct queries issued per source, plus cumulative result counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCoverage {
    pub rag_queries: Vec<String>,
    pub jurisprudence_queries: Vec<String>,
    pub legislation_queries: Vec<String>,
    pub rag_results: usize,
    pub jurisprudence_results: usize,
    pub legislation_results: usize,
}

impl SearchCoverage {
    /// Queries issued against `source`.
    pub fn queries(&self, source: SourceKind) -> &[String] {
        match source {
            SourceKind::Rag => &self.rag_queries,
            SourceKind::Jurisprudence => &self.jurisprudence_queries,
            SourceKind::Legislation => &self.legislation_queries,
        }
    }

    /// Number of distinct queries issued against `source`.
    pub fn query_count(&self, source: SourceKind) -> usize {
        self.queries(source).len()
    }

    /// Whether `query` was already issued against `source`.
    pub fn contains(&self, source: SourceKind, query: &str) -> bool {
        self.queries(source).iter().any(|q| q == query)
    }

    /// Record a query with set semantics. Returns true if it was new.
    pub fn record_query(&mut self, source: SourceKind, query: &str) -> bool {
        if self.contains(source, query) {
            return false;
        }
        let list = match source {
            SourceKind::Rag => &mut self.rag_queries,
            SourceKind::Jurisprudence => &mut self.jurisprudence_queries,
            SourceKind::Legislation => &mut self.legislation_queries,
        };
        list.push(query.to_string());
        true
    }

    /// Add to the cumulative result count of `source`.
    pub fn add_results(&mut self, source: SourceKind, count: usize) {
        match source {
            SourceKind::Rag => self.rag_results += count,
            SourceKind::Jurisprudence => self.jurisprudence_results += count,
            SourceKind::Legislation => self.legislation_results += count,
        }
    }

    /// Cumulative result count of `source`.
    pub fn result_count(&self, source: SourceKind) -> usize {
        match source {
            SourceKind::Rag => self.rag_results,
            SourceKind::Jurisprudence => self.jurisprudence_results,
            SourceKind::Legislation => self.legislation_results,
        }
    }
}

/// A search that returned nothing, with alternatives to try next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedSearch {
    pub tool: SourceKind,
    pub query: String,
    pub reason: String,
    pub alternatives: Vec<String>,
}

/// A search that returned pertinent documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessfulSearch {
    pub tool: SourceKind,
    pub query: String,
    pub result_count: usize,
}

/// Output of one planning step.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub thought: String,
    pub action: ToolAction,
    /// True when the coverage policy replaced the model's choice.
    pub overridden: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Documents kept by one search, tagged by source.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Findings {
    /// Nothing to append.
    #[default]
    None,
    /// Passages from the document collection.
    Rag(Vec<RagPassage>),
    /// Court decisions.
    Jurisprudence(Vec<JurisprudenceDocument>),
    /// Legislative texts.
    Legislation(Vec<LegislationDocument>),
}

impl Findings {
    /// Number of documents.
    pub fn len(&self) -> usize {
        match self {
            Findings::None => 0,
            Findings::Rag(docs) => docs.len(),
            Findings::Jurisprudence(docs) => docs.len(),
            Findings::Legislation(docs) => docs.len(),
        }
    }

    /// Whether there are no documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Output of one executor step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionStep {
    pub observation: String,
    pub tool_call: Option<ToolCallRecord>,
    /// Query to record in coverage, when the adapter returned.
    pub covered_query: Option<(SourceKind, String)>,
    pub findings: Findings,
    pub failed_search: Option<FailedSearch>,
    pub successful_search: Option<SuccessfulSearch>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Everything known about one query execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub query: String,
    pub user_id: String,
    pub collection_id: Option<String>,
    pub session_id: String,

    pub thoughts: Vec<String>,
    pub actions: Vec<ToolAction>,
    pub observations: Vec<String>,

    pub iteration: u32,
    pub max_iterations: u32,

    pub search_coverage: SearchCoverage,
    pub failed_searches: Vec<FailedSearch>,
    pub successful_searches: Vec<SuccessfulSearch>,
    pub tool_calls: Vec<ToolCallRecord>,

    pub rag_results: Vec<RagPassage>,
    pub jurisprudence_results: Vec<JurisprudenceDocument>,
    pub legislation_results: Vec<LegislationDocument>,

    pub answer: String,
    pub sources: Vec<SourceReference>,
    pub error: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl AgentState {
    /// Fresh state. A session id is generated when none is given.
    pub fn new(
        query: impl Into<String>,
        user_id: impl Into<String>,
        collection_id: Option<String>,
        session_id: Option<String>,
        max_iterations: u32,
    ) -> Self {
        Self {
            query: query.into(),
            user_id: user_id.into(),
            collection_id: collection_id.filter(|c| !c.trim().is_empty()),
            session_id: session_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            thoughts: Vec::new(),
            actions: Vec::new(),
            observations: Vec::new(),
            iteration: 0,
            max_iterations,
            search_coverage: SearchCoverage::default(),
            failed_searches: Vec::new(),
            successful_searches: Vec::new(),
            tool_calls: Vec::new(),
            rag_results: Vec::new(),
            jurisprudence_results: Vec::new(),
            legislation_results: Vec::new(),
            answer: String::new(),
            sources: Vec::new(),
            error: None,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    /// Whether the iteration budget is spent.
    pub fn budget_exhausted(&self) -> bool {
        self.iteration >= self.max_iterations
    }

    /// The most recently planned action.
    pub fn last_action(&self) -> Option<&ToolAction> {
        self.actions.last()
    }

    /// Whether a document collection is available for the `rag` tool.
    pub fn has_collection(&self) -> bool {
        self.collection_id.is_some()
    }

    /// Total number of documents gathered so far.
    pub fn document_count(&self) -> usize {
        self.rag_results.len() + self.jurisprudence_results.len() + self.legislation_results.len()
    }

    /// Record a planning step.
    pub fn apply_plan(&mut self, step: PlanStep) {
        self.thoughts.push(step.thought);
        self.actions.push(step.action);
        self.input_tokens += step.input_tokens;
        self.output_tokens += step.output_tokens;
    }

    /// Record an execution step. Always advances the iteration by one.
    pub fn apply_execution(&mut self, step: ExecutionStep) {
        self.observations.push(step.observation);

        if let Some(record) = step.tool_call {
            self.tool_calls.push(record);
        }
        if let Some((source, query)) = step.covered_query {
            self.search_coverage.record_query(source, &query);
            self.search_coverage.add_results(source, step.findings.len());
        }
        match step.findings {
            Findings::None => {}
            Findings::Rag(docs) => self.rag_results.extend(docs),
            Findings::Jurisprudence(docs) => self.jurisprudence_results.extend(docs),
            Findings::Legislation(docs) => self.legislation_results.extend(docs),
        }
        if let Some(failed) = step.failed_search {
            self.failed_searches.push(failed);
        }
        if let Some(success) = step.successful_search {
            self.successful_searches.push(success);
        }

        self.input_tokens += step.input_tokens;
        self.output_tokens += step.output_tokens;
        self.iteration += 1;
        debug_assert!(self.iteration <= self.max_iterations);
    }

    /// Record the synthesized answer.
    pub fn apply_synthesis(&mut self, synthesis: Synthesis) {
        self.answer = synthesis.answer;
        self.sources = synthesis.sources;
        self.error = synthesis.error;
        self.input_tokens += synthesis.input_tokens;
        self.output_tokens += synthesis.output_tokens;
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod state_tests;
