//! Integration tests for MCP protocol handling
//!
//! Drives a server over an in-memory duplex stream the way a client would:
//! one JSON-RPC message per line, responses read back line by line.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use legal_research_agent::config::{
    AgentSettings, Config, LangbaseConfig, LogFormat, LoggingConfig, RequestConfig, SourcesConfig,
};
use legal_research_agent::error::{LlmResult, SourceResult};
use legal_research_agent::llm::{Completion, LanguageModel};
use legal_research_agent::prompts::{PERTINENCE_PROMPT, PLANNER_PROMPT};
use legal_research_agent::sources::{
    DocumentSearch, JurisprudenceDocument, JurisprudenceFullText, JurisprudenceSource,
    LegislationDocument, LegislationFullText, LegislationSource, RagPassage, SourceAdapters,
};
use legal_research_agent::{AppState, LegalResearchAgent, McpServer};

/// Always answers `final_answer`; judges everything relevant.
struct EagerModel;

#[async_trait]
impl LanguageModel for EagerModel {
    async fn complete(&self, system_prompt: &str, _: &str) -> LlmResult<Completion> {
        let text = if system_prompt.starts_with(PLANNER_PROMPT) {
            r#"{"thought": "answer now", "action": {"tool": "final_answer", "args": {}}}"#
        } else if system_prompt.starts_with(PERTINENCE_PROMPT) {
            r#"{"isRelevant": true, "score": 9}"#
        } else {
            "La loi du 20 février 1991 s'applique [#leg:1]."
        };
        Ok(Completion::text(text))
    }
}

struct Empty;

#[async_trait]
impl DocumentSearch for Empty {
    async fn search(&self, _: &str, _: &str, _: usize) -> SourceResult<Vec<RagPassage>> {
        Ok(vec![])
    }
}

#[async_trait]
impl JurisprudenceSource for Empty {
    async fn search(&self, _: &str) -> SourceResult<Vec<JurisprudenceDocument>> {
        Ok(vec![])
    }

    async fn fetch_full_text(&self, _: &str, _: Option<&str>) -> SourceResult<JurisprudenceFullText> {
        Ok(JurisprudenceFullText {
            full_text: String::new(),
            summary: None,
        })
    }
}

struct OneLaw;

#[async_trait]
impl LegislationSource for OneLaw {
    async fn search(&self, _: &str, _: &str) -> SourceResult<Vec<LegislationDocument>> {
        Ok(vec![LegislationDocument {
            numac: "1991003047".to_string(),
            title: "Loi sur les baux à loyer".to_string(),
            document_type: "loi".to_string(),
            publication_date: "1991-02-22".to_string(),
            url: "https://justel.test/1991003047".to_string(),
            summary: None,
            full_text: None,
            matching_articles: vec![],
        }])
    }

    async fn fetch_full_text(&self, numac: &str, _: Option<&str>) -> SourceResult<LegislationFullText> {
        Ok(LegislationFullText {
            full_text: "Art. 1er. La présente section s'applique aux baux...".to_string(),
            table_of_contents: vec![],
            matching_articles: vec![],
            source_url: format!("https://justel.test/{}", numac),
        })
    }
}

fn test_server() -> McpServer {
    let config = Config {
        langbase: LangbaseConfig {
            api_key: "test-key".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            pipe: "legal-agent-test".to_string(),
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
        },
        request: RequestConfig::default(),
        sources: SourcesConfig::default(),
        agent: AgentSettings {
            max_iterations: 4,
            ..Default::default()
        },
    };
    let sources = SourceAdapters::new(Arc::new(Empty), Arc::new(Empty), Arc::new(OneLaw));
    let agent = LegalResearchAgent::new(Arc::new(EagerModel), sources, config.agent.clone());
    McpServer::new(Arc::new(AppState::new(config, agent)))
}

/// Verify JSON-RPC 2.0 response structure
fn assert_valid_jsonrpc_response(response: &Value) {
    assert_eq!(response["jsonrpc"], "2.0", "Invalid JSON-RPC version");
    assert!(
        response.get("result").is_some() != response.get("error").is_some(),
        "Response must have exactly one of result or error"
    );
}

/// Send every message, close the stream and collect the responses.
async fn session(messages: Vec<Value>) -> Vec<Value> {
    let (client, server_end) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_end);
    let (client_read, mut client_write) = tokio::io::split(client);

    let server = test_server();
    let server_task = tokio::spawn(async move {
        server
            .serve(BufReader::new(server_read), server_write)
            .await
    });

    for message in messages {
        client_write
            .write_all(format!("{}\n", message).as_bytes())
            .await
            .unwrap();
    }
    client_write.shutdown().await.unwrap();

    let mut responses = Vec::new();
    let mut lines = BufReader::new(client_read).lines();
    while let Some(line) = lines.next_line().await.unwrap() {
        responses.push(serde_json::from_str(&line).unwrap());
    }
    server_task.await.unwrap().unwrap();
    responses
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_then_list_tools() {
        let responses = session(vec![
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "1.0.0"}
                }
            }),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}),
        ])
        .await;

        assert_eq!(responses.len(), 3);
        responses.iter().for_each(assert_valid_jsonrpc_response);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "legal-research-agent");

        let tools = responses[1]["result"]["tools"].as_array().unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["legal_research", "legal_query_analysis"]);
        for tool in tools {
            assert_eq!(tool["inputSchema"]["type"], "object");
            assert!(!tool["description"].as_str().unwrap().is_empty());
        }

        assert_eq!(responses[2]["id"], 3);
        assert_eq!(responses[2]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_errors_keep_request_ids() {
        let responses = session(vec![
            json!({"jsonrpc": "2.0", "id": "x", "method": "prompts/list"}),
            json!({"jsonrpc": "2.0", "id": "y", "method": "tools/call", "params": {"arguments": {}}}),
        ])
        .await;

        assert_eq!(responses[0]["id"], "x");
        assert_eq!(responses[0]["error"]["code"], -32601);
        assert_eq!(responses[1]["id"], "y");
        assert_eq!(responses[1]["error"]["code"], -32602);
    }
}

mod tool_call_tests {
    use super::*;

    fn tool_payload(response: &Value) -> Value {
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_legal_research_tool() {
        let responses = session(vec![json!({
            "jsonrpc": "2.0",
            "id": 10,
            "method": "tools/call",
            "params": {
                "name": "legal_research",
                "arguments": {
                    "query": "Quelle loi régit le bail de résidence principale ?",
                    "user_id": "user-42"
                }
            }
        })])
        .await;

        assert_valid_jsonrpc_response(&responses[0]);
        assert!(responses[0]["result"].get("isError").is_none());

        let output = tool_payload(&responses[0]);
        assert_eq!(output["answer"], "La loi du 20 février 1991 s'applique [#leg:1].");
        assert_eq!(output["sources"][0]["id"], "leg:1");
        assert_eq!(output["sources"][0]["type"], "legislation");
        assert_eq!(output["sources"][0]["numac"], "1991003047");
        // The first final answer is refused until legislation is searched
        assert_eq!(output["tool_calls"][0]["tool"], "legislation");
        assert!(output["iterations"].as_u64().unwrap() <= 4);
    }

    #[tokio::test]
    async fn test_legal_research_rejects_unknown_argument() {
        let responses = session(vec![json!({
            "jsonrpc": "2.0",
            "id": 11,
            "method": "tools/call",
            "params": {"name": "legal_research", "arguments": {"question": "bail"}}
        })])
        .await;

        assert_eq!(responses[0]["result"]["isError"], true);
        assert!(responses[0]["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Invalid parameters for legal_research"));
    }

    #[tokio::test]
    async fn test_query_analysis_tool() {
        let responses = session(vec![json!({
            "jsonrpc": "2.0",
            "id": 12,
            "method": "tools/call",
            "params": {
                "name": "legal_query_analysis",
                "arguments": {"query": "Que prévoit l'article 5:77 du Code civil ?"}
            }
        })])
        .await;

        let analysis = tool_payload(&responses[0]);
        assert_eq!(analysis["articles"], json!(["article 5:77"]));
        assert!(analysis["codes"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c == "Code civil"));
        let legislation = analysis["alternatives"]["legislation"].as_array().unwrap();
        assert!(legislation.len() <= 6);
        assert!(!legislation.contains(&json!("Que prévoit l'article 5:77 du Code civil ?")));
    }
}
