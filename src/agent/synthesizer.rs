//! Response synthesizer.
//!
//! Numbers the gathered documents per source (`rag:1`, `jur:1`, `leg:1`),
//! renders them as context and asks the model for an answer citing them
//! inline as `[#id]`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use tracing::{info, warn};

use super::state::AgentState;
use super::truncate_chars;
use crate::config::AgentSettings;
use crate::error::LlmResult;
use crate::llm::LanguageModel;
use crate::prompts::{NO_SOURCES_INSTRUCTION, SYNTHESIS_APOLOGY, SYNTHESIS_PROMPT};
use crate::sources::{RagPassage, SourceKind};

const EXCERPT_CHARS: usize = 300;
const CONTEXT_TEXT_CHARS: usize = 3000;

static RE_CITATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\s?\[#([^\]\s]+)\]").ok());

/// Type-specific fields of a [`SourceReference`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceDetails {
    /// A passage of the user's documents.
    Rag {
        document_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_number: Option<u32>,
        score: f32,
    },
    /// A court decision.
    Jurisprudence {
        ecli: String,
        court_name: String,
        decision_date: String,
    },
    /// A legislative text.
    Legislation {
        numac: String,
        document_type: String,
        publication_date: String,
    },
}

/// A citable source. `id` is the only handle the answer uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReference {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(flatten)]
    pub details: SourceDetails,
}

/// A registry entry with the text rendered for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct CitedSource {
    pub reference: SourceReference,
    pub context: String,
}

/// Output of the synthesis step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Synthesis {
    pub answer: String,
    pub sources: Vec<SourceReference>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub error: Option<String>,
}

fn citation_id(kind: SourceKind, index: usize) -> String {
    format!("{}:{}", kind.short_code(), index + 1)
}

fn excerpt(text: &str) -> Option<String> {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.is_empty() {
        return None;
    }
    Some(truncate_chars(&flat, EXCERPT_CHARS).to_string())
}

/// Build the citation registry from the documents gathered in `state`.
///
/// Passages are grouped by document name; each source keeps at most `cap`
/// entries in arrival order.
pub fn build_registry(state: &AgentState, cap: usize) -> Vec<CitedSource> {
    let mut registry = Vec::new();

    // Passages of one document share a single entry
    let mut documents: Vec<(&str, Vec<&RagPassage>)> = Vec::new();
    for passage in &state.rag_results {
        match documents
            .iter()
            .position(|(name, _)| *name == passage.document_name)
        {
            Some(idx) => documents[idx].1.push(passage),
            None if documents.len() < cap => {
                documents.push((passage.document_name.as_str(), vec![passage]))
            }
            None => {}
        }
    }
    for (i, (name, passages)) in documents.iter().enumerate() {
        let first = passages[0];
        let id = citation_id(SourceKind::Rag, i);
        let mut context = format!("[{}] {}", id, name);
        if let Some(page) = first.page_number {
            let _ = write!(context, " (page {})", page);
        }
        for passage in passages {
            let _ = write!(
                context,
                "\n{}",
                truncate_chars(passage.content.trim(), CONTEXT_TEXT_CHARS)
            );
        }
        registry.push(CitedSource {
            reference: SourceReference {
                id,
                title: name.to_string(),
                url: None,
                excerpt: excerpt(&first.content),
                details: SourceDetails::Rag {
                    document_id: first.document_id.clone(),
                    page_number: first.page_number,
                    score: first.score,
                },
            },
            context,
        });
    }

    for (i, decision) in state.jurisprudence_results.iter().take(cap).enumerate() {
        let id = citation_id(SourceKind::Jurisprudence, i);
        let mut context = format!(
            "[{}] {}, {} ({})",
            id, decision.court_name, decision.decision_date, decision.ecli
        );
        if !decision.summary.trim().is_empty() {
            let _ = write!(context, "\nSummary: {}", decision.summary.trim());
        }
        if let Some(text) = &decision.full_text {
            let _ = write!(
                context,
                "\nText: {}",
                truncate_chars(text.trim(), CONTEXT_TEXT_CHARS)
            );
        }
        registry.push(CitedSource {
            reference: SourceReference {
                id,
                title: format!("{}, {}", decision.court_name, decision.decision_date),
                url: Some(decision.url.clone()).filter(|u| !u.is_empty()),
                excerpt: excerpt(&decision.summary),
                details: SourceDetails::Jurisprudence {
                    ecli: decision.ecli.clone(),
                    court_name: decision.court_name.clone(),
                    decision_date: decision.decision_date.clone(),
                },
            },
            context,
        });
    }

    for (i, text) in state.legislation_results.iter().take(cap).enumerate() {
        let id = citation_id(SourceKind::Legislation, i);
        let mut context = format!(
            "[{}] {} ({}, published {}, NUMAC {})",
            id, text.title, text.document_type, text.publication_date, text.numac
        );
        if !text.matching_articles.is_empty() {
            let _ = write!(
                context,
                "\nMatching articles: {}",
                text.matching_articles.join(", ")
            );
        }
        if let Some(summary) = &text.summary {
            let _ = write!(context, "\nSummary: {}", summary.trim());
        }
        if let Some(full) = &text.full_text {
            let _ = write!(
                context,
                "\nText: {}",
                truncate_chars(full.trim(), CONTEXT_TEXT_CHARS)
            );
        }
        registry.push(CitedSource {
            reference: SourceReference {
                id,
                title: text.title.clone(),
                url: Some(text.url.clone()).filter(|u| !u.is_empty()),
                excerpt: text.summary.as_deref().and_then(excerpt),
                details: SourceDetails::Legislation {
                    numac: text.numac.clone(),
                    document_type: text.document_type.clone(),
                    publication_date: text.publication_date.clone(),
                },
            },
            context,
        });
    }

    registry
}

/// User prompt for the synthesis call.
pub fn build_synthesis_prompt(query: &str, registry: &[CitedSource]) -> String {
    let mut prompt = format!("Question: {}\n", query);
    if registry.is_empty() {
        prompt.push_str("\nNo sources were found.\n");
        return prompt;
    }

    let sections = [
        ("rag:", "Documents of the user"),
        ("jur:", "Jurisprudence"),
        ("leg:", "Legislation"),
    ];
    for (prefix, heading) in sections {
        let entries: Vec<&CitedSource> = registry
            .iter()
            .filter(|s| s.reference.id.starts_with(prefix))
            .collect();
        if entries.is_empty() {
            continue;
        }
        let _ = write!(prompt, "\n## {}\n", heading);
        for entry in entries {
            let _ = write!(prompt, "\n{}\n", entry.context);
        }
    }
    prompt
}

/// Remove `[#id]` tokens that do not name a registry entry.
pub fn strip_unknown_citations(answer: &str, known_ids: &HashSet<&str>) -> String {
    let Some(re) = RE_CITATION.as_ref() else {
        return answer.to_string();
    };
    re.replace_all(answer, |caps: &regex::Captures| {
        let id = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if known_ids.contains(id) {
            caps.get(0)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        } else {
            String::new()
        }
    })
    .into_owned()
}

/// Writes the final answer.
#[derive(Clone)]
pub struct Synthesizer {
    model: Arc<dyn LanguageModel>,
    settings: AgentSettings,
}

impl Synthesizer {
    /// Create a synthesizer.
    pub fn new(model: Arc<dyn LanguageModel>, settings: AgentSettings) -> Self {
        Self { model, settings }
    }

    /// Synthesize the answer for `state`.
    ///
    /// A non-fatal model failure yields a fixed apology with `error` set;
    /// the gathered sources are returned either way.
    pub async fn synthesize(&self, state: &AgentState) -> LlmResult<Synthesis> {
        let start = Instant::now();
        let registry = build_registry(state, self.settings.citation_cap);

        let system_prompt = if registry.is_empty() {
            format!("{}\n\n{}", SYNTHESIS_PROMPT, NO_SOURCES_INSTRUCTION)
        } else {
            SYNTHESIS_PROMPT.to_string()
        };
        let user_prompt = build_synthesis_prompt(&state.query, &registry);
        let sources: Vec<SourceReference> =
            registry.into_iter().map(|entry| entry.reference).collect();

        match self.model.complete(&system_prompt, &user_prompt).await {
            Ok(completion) => {
                let known: HashSet<&str> = sources.iter().map(|s| s.id.as_str()).collect();
                let answer = strip_unknown_citations(completion.text.trim(), &known);
                info!(
                    sources = sources.len(),
                    answer_chars = answer.chars().count(),
                    latency_ms = start.elapsed().as_millis(),
                    "Answer synthesized"
                );
                Ok(Synthesis {
                    answer,
                    sources,
                    input_tokens: completion.input_tokens,
                    output_tokens: completion.output_tokens,
                    error: None,
                })
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, sources = sources.len(), "Synthesis failed, returning apology");
                Ok(Synthesis {
                    answer: SYNTHESIS_APOLOGY.to_string(),
                    sources,
                    input_tokens: 0,
                    output_tokens: 0,
                    error: Some(e.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "synthesizer_tests.rs"]
mod synthesizer_tests;
