//! Pertinence judge.
//!
//! Scores each retrieved document against the question with the language
//! model and keeps those meeting the per-source threshold. Judging never
//! fails: an unusable model answer counts as relevant with the configured
//! fail-open score.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{extract_json_from_completion, truncate_chars};
use crate::config::AgentSettings;
use crate::llm::LanguageModel;
use crate::prompts::{pertinence_rubric, PERTINENCE_PROMPT};
use crate::sources::{JurisprudenceDocument, LegislationDocument, RagPassage, SourceKind};

/// Verdict of the judge on one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PertinenceResult {
    pub is_relevant: bool,
    /// 0 to 10.
    pub score: u8,
    pub justification: String,
}

/// A verdict together with the tokens spent on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    pub result: PertinenceResult,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Documents that survived filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct Filtered<T> {
    /// Survivors, in input order.
    pub kept: Vec<T>,
    /// Number of documents judged.
    pub judged: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl<T> Filtered<T> {
    /// Every document kept, nothing judged.
    pub fn unfiltered(kept: Vec<T>) -> Self {
        Self {
            kept,
            judged: 0,
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

/// A document the judge can score.
pub trait Judgeable {
    /// Source the document comes from.
    const KIND: SourceKind;

    /// Text shown to the judge.
    fn judge_content(&self) -> String;

    /// Identifying fields shown to the judge.
    fn judge_metadata(&self) -> serde_json::Value;
}

impl Judgeable for RagPassage {
    const KIND: SourceKind = SourceKind::Rag;

    fn judge_content(&self) -> String {
        self.content.clone()
    }

    fn judge_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "documentName": self.document_name,
            "pageNumber": self.page_number,
            "similarity": self.score,
        })
    }
}

impl Judgeable for JurisprudenceDocument {
    const KIND: SourceKind = SourceKind::Jurisprudence;

    fn judge_content(&self) -> String {
        match &self.full_text {
            Some(text) if self.summary.trim().is_empty() => text.clone(),
            _ => self.summary.clone(),
        }
    }

    fn judge_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "ecli": self.ecli,
            "court": self.court_name,
            "date": self.decision_date,
        })
    }
}

impl Judgeable for LegislationDocument {
    const KIND: SourceKind = SourceKind::Legislation;

    fn judge_content(&self) -> String {
        match &self.summary {
            Some(summary) => format!("{}\n\n{}", self.title, summary),
            None => self.title.clone(),
        }
    }

    fn judge_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "numac": self.numac,
            "documentType": self.document_type,
            "publicationDate": self.publication_date,
        })
    }
}

/// Model answer for one judgement.
#[derive(Debug, Deserialize)]
struct JudgeResponse {
    #[serde(rename = "isRelevant", alias = "is_relevant", default)]
    is_relevant: Option<bool>,
    score: f64,
    #[serde(default)]
    justification: String,
}

impl JudgeResponse {
    fn from_completion(completion: &str) -> Result<PertinenceResult, String> {
        let json = extract_json_from_completion(completion)?;
        let parsed: JudgeResponse =
            serde_json::from_str(json).map_err(|e| format!("JSON parse error: {}", e))?;
        if !parsed.score.is_finite() {
            return Err("score is not a number".to_string());
        }
        let score = parsed.score.round().clamp(0.0, 10.0) as u8;
        Ok(PertinenceResult {
            is_relevant: parsed.is_relevant.unwrap_or(score > 0),
            score,
            justification: parsed.justification,
        })
    }
}

/// Relevance judge backed by a language model.
#[derive(Clone)]
pub struct PertinenceJudge {
    model: Arc<dyn LanguageModel>,
    settings: AgentSettings,
}

impl PertinenceJudge {
    /// Create a judge.
    pub fn new(model: Arc<dyn LanguageModel>, settings: AgentSettings) -> Self {
        Self { model, settings }
    }

    /// Minimum score a document of `kind` needs to survive.
    pub fn threshold(&self, kind: SourceKind) -> u8 {
        match kind {
            SourceKind::Rag => self.settings.rag_threshold,
            SourceKind::Jurisprudence => self.settings.jurisprudence_threshold,
            SourceKind::Legislation => self.settings.legislation_threshold,
        }
    }

    fn fail_open(&self, reason: &str) -> PertinenceResult {
        PertinenceResult {
            is_relevant: true,
            score: self.settings.fail_open_score,
            justification: format!("Not assessed ({}), kept by default", reason),
        }
    }

    /// Score one document.
    pub async fn judge_pertinence(
        &self,
        query: &str,
        kind: SourceKind,
        content: &str,
        metadata: &serde_json::Value,
    ) -> Judgement {
        let system_prompt = format!("{}\n\n{}", PERTINENCE_PROMPT, pertinence_rubric(kind));
        let user_prompt = format!(
            "Question: {}\n\nDocument metadata: {}\n\nDocument content:\n{}",
            query,
            metadata,
            truncate_chars(content, self.settings.judge_content_chars)
        );

        match self.model.complete(&system_prompt, &user_prompt).await {
            Ok(completion) => {
                let result = match JudgeResponse::from_completion(&completion.text) {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(
                            source = %kind,
                            error = %e,
                            completion_preview = %completion.text.chars().take(200).collect::<String>(),
                            "Failed to parse pertinence judgement, keeping document"
                        );
                        self.fail_open("unparseable judgement")
                    }
                };
                Judgement {
                    result,
                    input_tokens: completion.input_tokens,
                    output_tokens: completion.output_tokens,
                }
            }
            Err(e) => {
                warn!(source = %kind, error = %e, "Pertinence judge call failed, keeping document");
                Judgement {
                    result: self.fail_open("judge unavailable"),
                    input_tokens: 0,
                    output_tokens: 0,
                }
            }
        }
    }

    /// Judge every document concurrently and keep those scoring at least
    /// `threshold`, preserving input order.
    pub async fn filter_by_pertinence<T: Judgeable>(
        &self,
        query: &str,
        documents: Vec<T>,
        threshold: u8,
    ) -> Filtered<T> {
        let judged = documents.len();
        let judgements = join_all(documents.iter().map(|doc| {
            let metadata = doc.judge_metadata();
            let content = doc.judge_content();
            async move {
                self.judge_pertinence(query, T::KIND, &content, &metadata)
                    .await
            }
        }))
        .await;

        let mut filtered = Filtered {
            kept: Vec::with_capacity(judged),
            judged,
            input_tokens: 0,
            output_tokens: 0,
        };
        for (doc, judgement) in documents.into_iter().zip(judgements) {
            filtered.input_tokens += judgement.input_tokens;
            filtered.output_tokens += judgement.output_tokens;
            if judgement.result.score >= threshold {
                filtered.kept.push(doc);
            }
        }

        debug!(
            source = %T::KIND,
            judged,
            kept = filtered.kept.len(),
            threshold,
            "Pertinence filtering complete"
        );
        filtered
    }
}
