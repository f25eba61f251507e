use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{
    DocumentSearch, JurisprudenceDocument, JurisprudenceFullText, JurisprudenceSource,
    LegislationDocument, LegislationFullText, LegislationSource, RagPassage,
};
use crate::error::{SourceError, SourceResult};

/// Envelope used by every search endpoint.
#[derive(Debug, Deserialize)]
struct SearchEnvelope<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

/// Build the HTTP client shared by the adapters.
pub fn build_http_client(timeout_ms: u64) -> SourceResult<Client> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(SourceError::Http)
}

fn base_url(base: &Option<String>, source_name: &str) -> SourceResult<String> {
    base.as_deref()
        .map(|url| url.trim_end_matches('/').to_string())
        .ok_or_else(|| SourceError::NotConfigured {
            source_name: source_name.to_string(),
        })
}

/// `{base}/collections/{collection_id}/search`, with the id escaped as a
/// single path segment.
fn collection_search_url(base: &str, collection_id: &str) -> SourceResult<Url> {
    let invalid = |reason: String| SourceError::NotConfigured {
        source_name: format!("documents (invalid URL {}: {})", base, reason),
    };
    let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(["collections", collection_id, "search"]);
    Ok(url)
}

/// Send a request and decode its JSON body.
async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    source_name: &str,
    timeout_ms: u64,
) -> SourceResult<T> {
    let start = Instant::now();
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            SourceError::Timeout { timeout_ms }
        } else {
            SourceError::Http(e)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        warn!(
            source = source_name,
            status = status.as_u16(),
            "Source request failed"
        );
        return Err(SourceError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let body = response
        .json::<T>()
        .await
        .map_err(|e| SourceError::InvalidResponse {
            message: format!("{}: {}", source_name, e),
        })?;

    debug!(
        source = source_name,
        latency_ms = start.elapsed().as_millis(),
        "Source request succeeded"
    );
    Ok(body)
}

/// Document-collection search over HTTP.
///
/// `POST {base}/collections/{id}/search` with `{"query", "k"}`; a 404 means
/// the collection does not exist.
pub struct HttpDocumentSearch {
    client: Client,
    base_url: Option<String>,
    timeout_ms: u64,
}

impl HttpDocumentSearch {
    pub fn new(client: Client, base_url: Option<String>, timeout_ms: u64) -> Self {
        Self {
            client,
            base_url,
            timeout_ms,
        }
    }
}

#[async_trait]
impl DocumentSearch for HttpDocumentSearch {
    async fn search(
        &self,
        collection_id: &str,
        query: &str,
        k: usize,
    ) -> SourceResult<Vec<RagPassage>> {
        let base = base_url(&self.base_url, "documents")?;
        let url = collection_search_url(&base, collection_id)?;
        let request = self
            .client
            .post(url)
            .json(&serde_json::json!({ "query": query, "k": k }));

        match send_json::<SearchEnvelope<RagPassage>>(request, "documents", self.timeout_ms).await
        {
            Ok(envelope) => Ok(envelope.results),
            Err(SourceError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(SourceError::CollectionNotFound {
                    collection_id: collection_id.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Jurisprudence search over HTTP.
///
/// `GET {base}/search?q=` and `GET {base}/decision?ecli=&url=`.
pub struct HttpJurisprudenceSource {
    client: Client,
    base_url: Option<String>,
    timeout_ms: u64,
}

impl HttpJurisprudenceSource {
    pub fn new(client: Client, base_url: Option<String>, timeout_ms: u64) -> Self {
        Self {
            client,
            base_url,
            timeout_ms,
        }
    }
}

#[async_trait]
impl JurisprudenceSource for HttpJurisprudenceSource {
    async fn search(&self, query: &str) -> SourceResult<Vec<JurisprudenceDocument>> {
        let base = base_url(&self.base_url, "jurisprudence")?;
        let request = self
            .client
            .get(format!("{}/search", base))
            .query(&[("q", query)]);

        let envelope: SearchEnvelope<JurisprudenceDocument> =
            send_json(request, "jurisprudence", self.timeout_ms).await?;
        Ok(envelope.results)
    }

    async fn fetch_full_text(
        &self,
        ecli: &str,
        url: Option<&str>,
    ) -> SourceResult<JurisprudenceFullText> {
        let base = base_url(&self.base_url, "jurisprudence")?;
        let mut params = vec![("ecli", ecli)];
        if let Some(url) = url {
            params.push(("url", url));
        }
        let request = self
            .client
            .get(format!("{}/decision", base))
            .query(&params);

        send_json(request, "jurisprudence", self.timeout_ms).await
    }
}

/// Legislation search over HTTP.
///
/// `GET {base}/search?q=&type=` and `GET {base}/document?numac=&term=`.
pub struct HttpLegislationSource {
    client: Client,
    base_url: Option<String>,
    timeout_ms: u64,
}

impl HttpLegislationSource {
    pub fn new(client: Client, base_url: Option<String>, timeout_ms: u64) -> Self {
        Self {
            client,
            base_url,
            timeout_ms,
        }
    }
}

#[async_trait]
impl LegislationSource for HttpLegislationSource {
    async fn search(
        &self,
        query: &str,
        document_type: &str,
    ) -> SourceResult<Vec<LegislationDocument>> {
        let base = base_url(&self.base_url, "legislation")?;
        let request = self
            .client
            .get(format!("{}/search", base))
            .query(&[("q", query), ("type", document_type)]);

        let envelope: SearchEnvelope<LegislationDocument> =
            send_json(request, "legislation", self.timeout_ms).await?;
        Ok(envelope.results)
    }

    async fn fetch_full_text(
        &self,
        numac: &str,
        search_term: Option<&str>,
    ) -> SourceResult<LegislationFullText> {
        let base = base_url(&self.base_url, "legislation")?;
        let mut params = vec![("numac", numac)];
        if let Some(term) = search_term {
            params.push(("term", term));
        }
        let request = self
            .client
            .get(format!("{}/document", base))
            .query(&params);

        send_json(request, "legislation", self.timeout_ms).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_source_fails_without_network() {
        let client = build_http_client(1000).unwrap();
        let source = HttpLegislationSource::new(client, None, 1000);

        let err = source.search("bail", "loi").await.unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured { ref source_name } if source_name == "legislation"));
    }

    #[test]
    fn test_collection_id_is_one_path_segment() {
        let url = collection_search_url("http://localhost:8080/documents", "a/b?c#d").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/documents/collections/a%2Fb%3Fc%23d/search"
        );
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_collection_url_on_bare_host() {
        let url = collection_search_url("http://localhost:8080", "col-1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/collections/col-1/search");
    }

    #[test]
    fn test_invalid_documents_url() {
        let err = collection_search_url("not a url", "col-1").unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured { .. }));
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let base = base_url(&Some("http://localhost:8080/".to_string()), "documents").unwrap();
        assert_eq!(base, "http://localhost:8080");
    }
}
