//! Integration tests for the HTTP source adapters
//!
//! Each adapter is pointed at a wiremock server standing in for the
//! documents, jurisprudence and legislation services.

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::{
    matchers::{body_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use legal_research_agent::config::SourcesConfig;
use legal_research_agent::error::SourceError;
use legal_research_agent::sources::SourceAdapters;

fn adapters(base_url: &str) -> SourceAdapters {
    SourceAdapters::from_config(&SourcesConfig {
        documents_url: Some(format!("{}/documents", base_url)),
        jurisprudence_url: Some(format!("{}/juportal", base_url)),
        legislation_url: Some(format!("{}/justel/", base_url)),
        timeout_ms: 2000,
    })
    .unwrap()
}

mod document_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_collection_search() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/documents/collections/col-1/search"))
            .and(body_json(json!({"query": "clause résolutoire", "k": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "content": "La clause résolutoire est réputée non écrite.",
                    "score": 0.82,
                    "documentId": "doc-9",
                    "documentName": "bail-2021.pdf",
                    "pageNumber": 3
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let passages = adapters(&mock_server.uri())
            .documents
            .search("col-1", "clause résolutoire", 10)
            .await
            .unwrap();

        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].document_name, "bail-2021.pdf");
        assert_eq!(passages[0].page_number, Some(3));
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/documents/collections/missing/search"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let err = adapters(&mock_server.uri())
            .documents
            .search("missing", "bail", 10)
            .await
            .unwrap_err();

        assert!(
            matches!(err, SourceError::CollectionNotFound { ref collection_id } if collection_id == "missing")
        );
    }
}

mod jurisprudence_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_search_and_fetch_decision() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/juportal/search"))
            .and(query_param("q", "compétence juge de paix"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "ecli": "ECLI:BE:JPNAM:2021:1",
                    "courtName": "Justice de paix de Namur",
                    "decisionDate": "2021-05-04",
                    "url": "https://juportal.test/1"
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/juportal/decision"))
            .and(query_param("ecli", "ECLI:BE:JPNAM:2021:1"))
            .and(query_param("url", "https://juportal.test/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fullText": "Le juge de paix connaît de toute demande relative au bail.",
                "summary": "Compétence exclusive en matière de bail."
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sources = adapters(&mock_server.uri());
        let decisions = sources
            .jurisprudence
            .search("compétence juge de paix")
            .await
            .unwrap();
        assert_eq!(decisions.len(), 1);
        // Summary is optional on the wire
        assert_eq!(decisions[0].summary, "");
        assert_eq!(decisions[0].full_text, None);

        let text = sources
            .jurisprudence
            .fetch_full_text(&decisions[0].ecli, Some(&decisions[0].url))
            .await
            .unwrap();
        assert!(text.full_text.contains("bail"));
        assert_eq!(
            text.summary.as_deref(),
            Some("Compétence exclusive en matière de bail.")
        );
    }

    #[tokio::test]
    async fn test_server_error_maps_to_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/juportal/search"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&mock_server)
            .await;

        let err = adapters(&mock_server.uri())
            .jurisprudence
            .search("bail")
            .await
            .unwrap_err();

        match err {
            SourceError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "bad gateway");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/juportal/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let err = adapters(&mock_server.uri())
            .jurisprudence
            .search("bail")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidResponse { .. }));
    }
}

mod legislation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_search_with_document_type() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/justel/search"))
            .and(query_param("q", "article 591 Code judiciaire"))
            .and(query_param("type", "loi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "numac": "1967101052",
                    "title": "Code judiciaire",
                    "documentType": "loi",
                    "publicationDate": "1967-10-31",
                    "url": "https://justel.test/1967101052"
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let texts = adapters(&mock_server.uri())
            .legislation
            .search("article 591 Code judiciaire", "loi")
            .await
            .unwrap();

        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].numac, "1967101052");
        assert!(texts[0].matching_articles.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_full_text_with_term() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/justel/document"))
            .and(query_param("numac", "1967101052"))
            .and(query_param("term", "article 591"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fullText": "Art. 591. Le juge de paix connaît...",
                "matchingArticles": ["Art. 591"],
                "sourceUrl": "https://justel.test/1967101052"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let text = adapters(&mock_server.uri())
            .legislation
            .fetch_full_text("1967101052", Some("article 591"))
            .await
            .unwrap();

        assert_eq!(text.matching_articles, vec!["Art. 591".to_string()]);
        assert!(text.table_of_contents.is_empty());
    }

    #[tokio::test]
    async fn test_empty_envelope() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/justel/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&mock_server)
            .await;

        let texts = adapters(&mock_server.uri())
            .legislation
            .search("anything", "loi")
            .await
            .unwrap();
        assert!(texts.is_empty());
    }
}

#[tokio::test]
async fn test_unconfigured_endpoints() {
    let sources = SourceAdapters::from_config(&SourcesConfig {
        documents_url: None,
        jurisprudence_url: None,
        legislation_url: None,
        timeout_ms: 1000,
    })
    .unwrap();

    let err = sources.documents.search("col", "q", 5).await.unwrap_err();
    assert!(matches!(err, SourceError::NotConfigured { ref source_name } if source_name == "documents"));
    let err = sources.jurisprudence.search("q").await.unwrap_err();
    assert!(matches!(err, SourceError::NotConfigured { .. }));
}
