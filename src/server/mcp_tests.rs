//! Unit tests for MCP protocol implementation.

use super::*;
use serde_json::json;
use std::sync::Arc;

use crate::agent::LegalResearchAgent;
use crate::config::{
    AgentSettings, Config, LangbaseConfig, LogFormat, LoggingConfig, RequestConfig, SourcesConfig,
};
use crate::llm::MockLanguageModel;
use crate::server::AppState;
use crate::sources::SourceAdapters;

fn test_server() -> McpServer {
    let config = Config {
        langbase: LangbaseConfig {
            api_key: "test-key".to_string(),
            base_url: "https://api.langbase.com".to_string(),
            pipe: "legal-research-agent-v1".to_string(),
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        },
        request: RequestConfig::default(),
        sources: SourcesConfig::default(),
        agent: AgentSettings::default(),
    };
    let sources = SourceAdapters::from_config(&config.sources).unwrap();
    let agent = LegalResearchAgent::new(
        Arc::new(MockLanguageModel::new()),
        sources,
        config.agent.clone(),
    );
    McpServer::new(Arc::new(AppState::new(config, agent)))
}

/// Feed `input` to the server and return one parsed value per response line.
async fn exchange(input: &str) -> Vec<Value> {
    let server = test_server();
    let mut output: Vec<u8> = Vec::new();
    server.serve(input.as_bytes(), &mut output).await.unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// ============================================================================
// JsonRpcResponse tests
// ============================================================================

#[test]
fn test_jsonrpc_response_success_with_id() {
    let response = JsonRpcResponse::success(Some(json!(1)), json!({"result": "ok"}));

    assert_eq!(response.jsonrpc, "2.0");
    assert_eq!(response.id, json!(1));
    assert!(response.error.is_none());
    assert_eq!(response.result.unwrap()["result"], "ok");
}

#[test]
fn test_jsonrpc_response_error_without_id() {
    let response = JsonRpcResponse::error(None, -32700, "Parse error");

    assert_eq!(response.id, Value::Null);
    assert!(response.result.is_none());
    assert_eq!(response.error.unwrap().code, -32700);
}

#[test]
fn test_jsonrpc_response_omits_empty_members() {
    let ok = serde_json::to_string(&JsonRpcResponse::success(Some(json!(1)), json!({}))).unwrap();
    assert!(!ok.contains("\"error\""));

    let err = serde_json::to_string(&JsonRpcResponse::error(Some(json!(1)), -32601, "x")).unwrap();
    assert!(!err.contains("\"result\""));
    assert!(err.contains("-32601"));
}

#[test]
fn test_jsonrpc_notification_no_id() {
    let request: JsonRpcRequest =
        serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();

    assert!(request.id.is_none());
    assert!(request.params.is_none());
}

#[test]
fn test_tool_call_params_without_arguments() {
    let params: ToolCallParams = serde_json::from_value(json!({"name": "legal_research"})).unwrap();
    assert_eq!(params.name, "legal_research");
    assert!(params.arguments.is_none());
}

// ============================================================================
// Tool definitions
// ============================================================================

#[test]
fn test_tool_names() {
    let names: Vec<&str> = all_tools().iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["legal_research", "legal_query_analysis"]);
}

#[test]
fn test_research_tool_schema() {
    let tool = get_research_tool();
    let schema = &tool.input_schema;

    assert_eq!(schema["type"], "object");
    assert_eq!(schema["required"], json!(["query"]));
    assert_eq!(schema["additionalProperties"], false);
    for field in ["query", "user_id", "collection_id", "session_id", "max_iterations"] {
        assert!(schema["properties"].get(field).is_some(), "missing {}", field);
    }
    assert_eq!(schema["properties"]["max_iterations"]["type"], "integer");
}

#[test]
fn test_query_analysis_tool_schema() {
    let tool = get_query_analysis_tool();
    assert_eq!(tool.input_schema["required"], json!(["query"]));
    assert_eq!(tool.input_schema["properties"].as_object().unwrap().len(), 1);
}

#[test]
fn test_tool_serialization_uses_camel_case_schema_key() {
    let value = serde_json::to_value(get_query_analysis_tool()).unwrap();
    assert!(value.get("inputSchema").is_some());
    assert!(value.get("input_schema").is_none());
}

#[test]
fn test_tool_call_result_constructors() {
    let ok = serde_json::to_value(ToolCallResult::text("{}")).unwrap();
    assert_eq!(ok["content"][0]["type"], "text");
    assert!(ok.get("isError").is_none());

    let err = serde_json::to_value(ToolCallResult::error("boom")).unwrap();
    assert_eq!(err["content"][0]["text"], "Error: boom");
    assert_eq!(err["isError"], true);
}

// ============================================================================
// Request loop
// ============================================================================

#[tokio::test]
async fn test_initialize_handshake() {
    let responses = exchange(
        "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{}}\n\
         {\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
    )
    .await;

    assert_eq!(responses.len(), 1);
    let result = &responses[0]["result"];
    assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
    assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
}

#[tokio::test]
async fn test_tools_list() {
    let responses = exchange("{\"jsonrpc\":\"2.0\",\"id\":\"a\",\"method\":\"tools/list\"}\n").await;

    assert_eq!(responses[0]["id"], "a");
    assert_eq!(responses[0]["result"]["tools"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_parse_error_and_blank_lines() {
    let responses = exchange("\n   \nnot json\n").await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["error"]["code"], -32700);
    assert_eq!(responses[0]["id"], Value::Null);
}

#[tokio::test]
async fn test_unknown_method_and_notification() {
    let responses = exchange(
        "{\"jsonrpc\":\"2.0\",\"method\":\"custom/notify\"}\n\
         {\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"resources/list\"}\n",
    )
    .await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], 7);
    assert_eq!(responses[0]["error"]["code"], -32601);
}

#[tokio::test]
async fn test_tools_call_missing_params() {
    let responses = exchange("{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"tools/call\"}\n").await;
    assert_eq!(responses[0]["error"]["code"], -32602);
}

#[tokio::test]
async fn test_tools_call_query_analysis() {
    let request = json!({
        "jsonrpc": "2.0",
        "id": 4,
        "method": "tools/call",
        "params": {
            "name": "legal_query_analysis",
            "arguments": {"query": "Le juge de paix est-il compétent pour un bail ?"}
        }
    });
    let responses = exchange(&format!("{}\n", request)).await;

    let result = &responses[0]["result"];
    assert!(result.get("isError").is_none());
    let text = result["content"][0]["text"].as_str().unwrap();
    let analysis: Value = serde_json::from_str(text).unwrap();
    let concepts = analysis["concepts"].as_array().unwrap();
    assert!(concepts.contains(&json!("juge de paix")));
    assert!(concepts.contains(&json!("bail")));
}

#[tokio::test]
async fn test_tools_call_unknown_tool_is_tool_error() {
    let request = json!({
        "jsonrpc": "2.0",
        "id": 5,
        "method": "tools/call",
        "params": {"name": "summarize_judgment", "arguments": {}}
    });
    let responses = exchange(&format!("{}\n", request)).await;

    let result = &responses[0]["result"];
    assert_eq!(result["isError"], true);
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Unknown tool: summarize_judgment"));
}
