//! Knowledge source adapters.
//!
//! The agent consults three sources, each behind its own trait:
//! - [`DocumentSearch`]: semantic search over the user's document collection
//! - [`JurisprudenceSource`]: case-law search plus full-text fetch by ECLI
//! - [`LegislationSource`]: legislation search plus full-text fetch by NUMAC
//!
//! [`SourceAdapters`] bundles one implementation of each. The HTTP/JSON
//! implementations in [`rest`] are what the binary wires up; tests inject
//! in-memory fakes.

mod rest;

pub use rest::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::SourcesConfig;
use crate::error::SourceResult;

/// The three knowledge sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The user's document collection.
    Rag,
    /// Court decisions.
    Jurisprudence,
    /// Legislative texts.
    Legislation,
}

impl SourceKind {
    /// All sources, in citation-registry order.
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Rag,
        SourceKind::Jurisprudence,
        SourceKind::Legislation,
    ];

    /// Prefix of the citation identifiers of this source.
    pub fn short_code(&self) -> &'static str {
        match self {
            SourceKind::Rag => "rag",
            SourceKind::Jurisprudence => "jur",
            SourceKind::Legislation => "leg",
        }
    }

    /// Get the source name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rag => "rag",
            SourceKind::Jurisprudence => "jurisprudence",
            SourceKind::Legislation => "legislation",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A scored passage from the user's document collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagPassage {
    pub content: String,
    pub score: f32,
    pub document_id: String,
    pub document_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

/// A court decision returned by the jurisprudence search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JurisprudenceDocument {
    pub ecli: String,
    pub court_name: String,
    pub decision_date: String,
    #[serde(default)]
    pub summary: String,
    pub url: String,
    /// Filled in after retrieval when the full-text fetch succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
}

/// Full text of a court decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JurisprudenceFullText {
    pub full_text: String,
    #[serde(default)]
    pub summary: Option<String>,
}

/// A legislative text returned by the legislation search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegislationDocument {
    pub numac: String,
    pub title: String,
    pub document_type: String,
    pub publication_date: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matching_articles: Vec<String>,
}

/// Full text of a legislative document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegislationFullText {
    pub full_text: String,
    #[serde(default)]
    pub table_of_contents: Vec<String>,
    #[serde(default)]
    pub matching_articles: Vec<String>,
    pub source_url: String,
}

/// Semantic search over a document collection.
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    /// Return up to `k` passages of `collection_id` most similar to `query`.
    async fn search(
        &self,
        collection_id: &str,
        query: &str,
        k: usize,
    ) -> SourceResult<Vec<RagPassage>>;
}

/// Jurisprudence search service.
#[async_trait]
pub trait JurisprudenceSource: Send + Sync {
    /// Ranked decisions matching `query`.
    async fn search(&self, query: &str) -> SourceResult<Vec<JurisprudenceDocument>>;

    /// Full text of one decision.
    async fn fetch_full_text(
        &self,
        ecli: &str,
        url: Option<&str>,
    ) -> SourceResult<JurisprudenceFullText>;
}

/// Legislation search service.
#[async_trait]
pub trait LegislationSource: Send + Sync {
    /// Ranked legislative texts of `document_type` matching `query`.
    async fn search(
        &self,
        query: &str,
        document_type: &str,
    ) -> SourceResult<Vec<LegislationDocument>>;

    /// Full text of one legislative document, with the articles matching
    /// `search_term` when one is given.
    async fn fetch_full_text(
        &self,
        numac: &str,
        search_term: Option<&str>,
    ) -> SourceResult<LegislationFullText>;
}

/// One adapter per knowledge source.
#[derive(Clone)]
pub struct SourceAdapters {
    pub documents: Arc<dyn DocumentSearch>,
    pub jurisprudence: Arc<dyn JurisprudenceSource>,
    pub legislation: Arc<dyn LegislationSource>,
}

impl SourceAdapters {
    /// Bundle explicit adapter implementations.
    pub fn new(
        documents: Arc<dyn DocumentSearch>,
        jurisprudence: Arc<dyn JurisprudenceSource>,
        legislation: Arc<dyn LegislationSource>,
    ) -> Self {
        Self {
            documents,
            jurisprudence,
            legislation,
        }
    }

    /// HTTP adapters for the endpoints in `config`.
    pub fn from_config(config: &SourcesConfig) -> SourceResult<Self> {
        let client = build_http_client(config.timeout_ms)?;
        Ok(Self {
            documents: Arc::new(HttpDocumentSearch::new(
                client.clone(),
                config.documents_url.clone(),
                config.timeout_ms,
            )),
            jurisprudence: Arc::new(HttpJurisprudenceSource::new(
                client.clone(),
                config.jurisprudence_url.clone(),
                config.timeout_ms,
            )),
            legislation: Arc::new(HttpLegislationSource::new(
                client,
                config.legislation_url.clone(),
                config.timeout_ms,
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_kind_codes() {
        assert_eq!(SourceKind::Rag.short_code(), "rag");
        assert_eq!(SourceKind::Jurisprudence.short_code(), "jur");
        assert_eq!(SourceKind::Legislation.short_code(), "leg");
        assert_eq!(SourceKind::Jurisprudence.to_string(), "jurisprudence");
        assert_eq!(
            serde_json::to_value(SourceKind::Legislation).unwrap(),
            json!("legislation")
        );
    }

    #[test]
    fn test_rag_passage_wire_format() {
        let passage: RagPassage = serde_json::from_value(json!({
            "content": "Le bail est résilié...",
            "score": 0.82,
            "documentId": "doc-1",
            "documentName": "bail.pdf",
            "pageNumber": 3
        }))
        .unwrap();

        assert_eq!(passage.document_name, "bail.pdf");
        assert_eq!(passage.page_number, Some(3));
    }

    #[test]
    fn test_jurisprudence_document_defaults() {
        let doc: JurisprudenceDocument = serde_json::from_value(json!({
            "ecli": "ECLI:BE:CASS:2020:ARR.20200101.1",
            "courtName": "Cour de cassation",
            "decisionDate": "2020-01-01",
            "url": "https://juportal.be/x"
        }))
        .unwrap();

        assert!(doc.summary.is_empty());
        assert!(doc.full_text.is_none());
    }

    #[test]
    fn test_legislation_document_skips_empty_enrichment() {
        let doc = LegislationDocument {
            numac: "1804032150".to_string(),
            title: "Code civil".to_string(),
            document_type: "loi".to_string(),
            publication_date: "1804-03-21".to_string(),
            url: "https://www.ejustice.just.fgov.be/x".to_string(),
            summary: None,
            full_text: None,
            matching_articles: vec![],
        };
        let value = serde_json::to_value(&doc).unwrap();

        assert!(value.get("fullText").is_none());
        assert!(value.get("matchingArticles").is_none());
        assert_eq!(value["documentType"], "loi");
    }

    #[test]
    fn test_from_config_without_endpoints() {
        let adapters = SourceAdapters::from_config(&SourcesConfig {
            timeout_ms: 1000,
            ..Default::default()
        });
        assert!(adapters.is_ok());
    }
}
