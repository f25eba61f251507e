//! Executor: runs the last planned action against its source.
//!
//! Each call produces one [`ExecutionStep`]. Adapter failures become a
//! tool-call error plus an observation; they never abort the run.

use futures::future::join_all;
use std::fmt::Write as _;
use std::time::Instant;
use tracing::{info, warn};

use super::heuristics::{extract_article_references, generate_alternative_queries};
use super::pertinence::{Filtered, PertinenceJudge};
use super::state::{
    AgentState, ExecutionStep, FailedSearch, Findings, SuccessfulSearch, ToolAction,
    ToolCallRecord, ToolKind,
};
use super::truncate_chars;
use crate::config::AgentSettings;
use crate::error::{SourceError, SourceResult};
use crate::sources::{JurisprudenceDocument, LegislationDocument, SourceAdapters, SourceKind};

/// Observation recorded for a `final_answer` action.
pub const READY_OBSERVATION: &str = "ready to synthesize";

const EXCERPT_CHARS: usize = 200;

/// Result of one search before it is turned into a step.
struct SearchOutcome {
    findings: Findings,
    /// Documents returned by the adapter, before filtering.
    retrieved: usize,
    input_tokens: u64,
    output_tokens: u64,
}

impl SearchOutcome {
    fn from_filtered<T>(
        retrieved: usize,
        filtered: Filtered<T>,
        wrap: impl FnOnce(Vec<T>) -> Findings,
    ) -> Self {
        Self {
            findings: wrap(filtered.kept),
            retrieved,
            input_tokens: filtered.input_tokens,
            output_tokens: filtered.output_tokens,
        }
    }
}

/// Dispatches actions to the source adapters.
#[derive(Clone)]
pub struct Executor {
    sources: SourceAdapters,
    judge: PertinenceJudge,
    settings: AgentSettings,
}

impl Executor {
    /// Create an executor.
    pub fn new(sources: SourceAdapters, judge: PertinenceJudge, settings: AgentSettings) -> Self {
        Self {
            sources,
            judge,
            settings,
        }
    }

    /// Execute the last action of `state`.
    pub async fn execute(&self, state: &AgentState) -> ExecutionStep {
        let Some(action) = state.last_action() else {
            return ExecutionStep {
                observation: "No action to execute".to_string(),
                ..Default::default()
            };
        };

        let source = match action.tool {
            ToolKind::FinalAnswer => {
                return ExecutionStep {
                    observation: READY_OBSERVATION.to_string(),
                    ..Default::default()
                }
            }
            ToolKind::Rag => SourceKind::Rag,
            ToolKind::Jurisprudence => SourceKind::Jurisprudence,
            ToolKind::Legislation => SourceKind::Legislation,
        };

        let query = action.query().unwrap_or(state.query.trim()).to_string();
        let mut record = ToolCallRecord::new(action.tool, &query);
        record.start();

        info!(
            tool = %action.tool,
            query = %query,
            tool_call_id = %record.id,
            iteration = state.iteration,
            "Dispatching search"
        );
        let start = Instant::now();

        let outcome = match source {
            SourceKind::Rag => self.search_rag(state, &query).await,
            SourceKind::Jurisprudence => self.search_jurisprudence(state, &query).await,
            SourceKind::Legislation => self.search_legislation(state, action, &query).await,
        };

        match outcome {
            Ok(outcome) => {
                let kept = outcome.findings.len();
                info!(
                    tool = %action.tool,
                    tool_call_id = %record.id,
                    retrieved = outcome.retrieved,
                    kept,
                    latency_ms = start.elapsed().as_millis(),
                    "Search completed"
                );

                let mut step = ExecutionStep {
                    covered_query: Some((source, query.clone())),
                    input_tokens: outcome.input_tokens,
                    output_tokens: outcome.output_tokens,
                    ..Default::default()
                };

                if kept == 0 {
                    let reason = if outcome.retrieved == 0 {
                        "0 results".to_string()
                    } else {
                        format!("{} results, none pertinent", outcome.retrieved)
                    };
                    let alternatives = generate_alternative_queries(&query, source);
                    step.observation = format!(
                        "No {} results for \"{}\" ({}). Alternatives: {}",
                        source,
                        query,
                        reason,
                        if alternatives.is_empty() {
                            "none".to_string()
                        } else {
                            alternatives.join("; ")
                        }
                    );
                    record.complete(reason.clone());
                    step.failed_search = Some(FailedSearch {
                        tool: source,
                        query,
                        reason,
                        alternatives,
                    });
                } else {
                    step.observation = describe_findings(
                        &outcome.findings,
                        &query,
                        self.settings.observation_limit,
                    );
                    record.complete(format!("{} results", kept));
                    step.successful_search = Some(SuccessfulSearch {
                        tool: source,
                        query,
                        result_count: kept,
                    });
                    step.findings = outcome.findings;
                }

                step.tool_call = Some(record);
                step
            }
            Err(e) => {
                warn!(
                    tool = %action.tool,
                    tool_call_id = %record.id,
                    error = %e,
                    latency_ms = start.elapsed().as_millis(),
                    "Search failed"
                );
                let observation = format!("{} search failed for \"{}\": {}", source, query, e);
                record.fail(e.to_string());
                ExecutionStep {
                    observation,
                    tool_call: Some(record),
                    ..Default::default()
                }
            }
        }
    }

    async fn search_rag(&self, state: &AgentState, query: &str) -> SourceResult<SearchOutcome> {
        let collection_id = state
            .collection_id
            .as_deref()
            .ok_or(SourceError::NoCollection)?;
        let passages = self
            .sources
            .documents
            .search(collection_id, query, self.settings.rag_top_k)
            .await?;

        let retrieved = passages.len();
        let filtered = self
            .judge
            .filter_by_pertinence(
                &state.query,
                passages,
                self.judge.threshold(SourceKind::Rag),
            )
            .await;
        Ok(SearchOutcome::from_filtered(
            retrieved,
            filtered,
            Findings::Rag,
        ))
    }

    async fn search_jurisprudence(
        &self,
        state: &AgentState,
        query: &str,
    ) -> SourceResult<SearchOutcome> {
        let decisions = self.sources.jurisprudence.search(query).await?;

        let retrieved = decisions.len();
        let mut filtered = self
            .judge
            .filter_by_pertinence(
                &state.query,
                decisions,
                self.judge.threshold(SourceKind::Jurisprudence),
            )
            .await;
        filtered.kept = self.fetch_decision_texts(filtered.kept).await;

        Ok(SearchOutcome::from_filtered(
            retrieved,
            filtered,
            Findings::Jurisprudence,
        ))
    }

    async fn search_legislation(
        &self,
        state: &AgentState,
        action: &ToolAction,
        query: &str,
    ) -> SourceResult<SearchOutcome> {
        let texts = self
            .sources
            .legislation
            .search(query, action.document_type())
            .await?;

        let retrieved = texts.len();
        let mut filtered = if self.settings.filter_legislation {
            self.judge
                .filter_by_pertinence(
                    &state.query,
                    texts,
                    self.judge.threshold(SourceKind::Legislation),
                )
                .await
        } else {
            Filtered::unfiltered(texts)
        };

        let search_term = extract_article_references(query)
            .into_iter()
            .next()
            .or_else(|| extract_article_references(&state.query).into_iter().next());
        filtered.kept = self
            .fetch_legislation_texts(filtered.kept, search_term.as_deref())
            .await;

        Ok(SearchOutcome::from_filtered(
            retrieved,
            filtered,
            Findings::Legislation,
        ))
    }

    /// Attach full texts to every decision, in parallel. A failed fetch
    /// leaves that decision with its summary only.
    pub async fn fetch_decision_texts(
        &self,
        decisions: Vec<JurisprudenceDocument>,
    ) -> Vec<JurisprudenceDocument> {
        join_all(decisions.into_iter().map(|mut decision| async move {
            let url = Some(decision.url.as_str()).filter(|u| !u.is_empty());
            let fetched = self
                .sources
                .jurisprudence
                .fetch_full_text(&decision.ecli, url)
                .await;
            match fetched {
                Ok(text) => {
                    if decision.summary.trim().is_empty() {
                        if let Some(summary) = text.summary {
                            decision.summary = summary;
                        }
                    }
                    decision.full_text = Some(text.full_text);
                }
                Err(e) => {
                    warn!(ecli = %decision.ecli, error = %e, "Decision full text unavailable, keeping summary");
                }
            }
            decision
        }))
        .await
    }

    /// Attach full texts to the first texts, in parallel. Failures leave the
    /// text as returned by the search.
    pub async fn fetch_legislation_texts(
        &self,
        texts: Vec<LegislationDocument>,
        search_term: Option<&str>,
    ) -> Vec<LegislationDocument> {
        let limit = self.settings.legislation_fetch_limit.min(texts.len());
        let mut texts = texts;
        let rest = texts.split_off(limit);

        let mut enriched = join_all(texts.into_iter().map(|mut text| async move {
            let fetched = self
                .sources
                .legislation
                .fetch_full_text(&text.numac, search_term)
                .await;
            match fetched {
                Ok(full) => {
                    text.full_text = Some(full.full_text);
                    if !full.matching_articles.is_empty() {
                        text.matching_articles = full.matching_articles;
                    }
                }
                Err(e) => {
                    warn!(numac = %text.numac, error = %e, "Legislation full text unavailable");
                }
            }
            text
        }))
        .await;

        enriched.extend(rest);
        enriched
    }
}

/// Human-readable summary of the first `limit` documents found.
pub fn describe_findings(findings: &Findings, query: &str, limit: usize) -> String {
    let mut out = String::new();
    let total = findings.len();
    let _ = write!(out, "Found {} relevant results for \"{}\":", total, query);

    match findings {
        Findings::None => {}
        Findings::Rag(passages) => {
            for (i, p) in passages.iter().take(limit).enumerate() {
                let _ = write!(out, "\n{}. {}", i + 1, p.document_name);
                if let Some(page) = p.page_number {
                    let _ = write!(out, " (p. {})", page);
                }
                let _ = write!(out, ": {}", excerpt(&p.content));
            }
        }
        Findings::Jurisprudence(decisions) => {
            for (i, d) in decisions.iter().take(limit).enumerate() {
                let _ = write!(
                    out,
                    "\n{}. {}, {} [{}]: {}",
                    i + 1,
                    d.court_name,
                    d.decision_date,
                    d.ecli,
                    excerpt(&d.summary)
                );
            }
        }
        Findings::Legislation(texts) => {
            for (i, t) in texts.iter().take(limit).enumerate() {
                let _ = write!(
                    out,
                    "\n{}. {} ({}, {}) NUMAC {}",
                    i + 1,
                    t.title,
                    t.document_type,
                    t.publication_date,
                    t.numac
                );
                if !t.matching_articles.is_empty() {
                    let _ = write!(out, ", articles: {}", t.matching_articles.join(", "));
                }
            }
        }
    }

    if total > limit {
        let _ = write!(out, "\n... and {} more", total - limit);
    }
    out
}

fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut = truncate_chars(&flat, EXCERPT_CHARS);
    if cut.len() < flat.len() {
        format!("{}...", cut)
    } else {
        flat
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod executor_tests;
