//! JSON-RPC protocol tests

use std::sync::Arc;

use psa_core::{DirectUpstream, ResolutionLayer, ResolverConfig, UpstreamFixture};
use psa_mcp::{PsaMcpServer, SERVER_NAME};
use serde_json::{json, Value};

fn server() -> PsaMcpServer {
    let fixture: UpstreamFixture =
        serde_json::from_str(include_str!("../fixtures/demo-tenant.json")).unwrap();
    let layer = ResolutionLayer::new(
        Arc::new(DirectUpstream::from_fixture(fixture)),
        ResolverConfig::default(),
    )
    .unwrap();
    PsaMcpServer::new(Arc::new(layer))
}

async fn call(server: &PsaMcpServer, request: Value) -> Value {
    let line = server.handle_line(&request.to_string()).await.unwrap();
    serde_json::from_str(&line).unwrap()
}

#[tokio::test]
async fn test_initialize() {
    let server = server();

    let response = call(&server, json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} })).await;

    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["serverInfo"]["name"], SERVER_NAME);
    assert!(response["result"]["capabilities"]["tools"].is_object());
    assert!(response.get("error").is_none());
}

#[tokio::test]
async fn test_tools_list_has_annotations() {
    let server = server();

    let response = call(&server, json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" })).await;
    let tools = response["result"]["tools"].as_array().unwrap();

    // 16 search tools plus 11 others
    assert_eq!(tools.len(), 27);
    assert!(tools.iter().all(|t| t["annotations"]["title"].is_string()));

    let update = tools.iter().find(|t| t["name"] == "psa_update_ticket").unwrap();
    assert_eq!(update["annotations"]["readOnlyHint"], false);
    assert_eq!(update["annotations"]["idempotentHint"], true);
    assert_eq!(update["inputSchema"]["required"][0], "ticketID");

    let search = tools.iter().find(|t| t["name"] == "psa_search_tickets").unwrap();
    assert_eq!(search["annotations"]["readOnlyHint"], true);
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let server = server();

    let line = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string();
    assert!(server.handle_line(&line).await.is_none());
    assert!(server.handle_line("   ").await.is_none());
}

#[tokio::test]
async fn test_unknown_method() {
    let server = server();

    let response = call(&server, json!({ "jsonrpc": "2.0", "id": 3, "method": "resources/list" })).await;

    assert_eq!(response["error"]["code"], -32601);
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn test_parse_error() {
    let server = server();

    let line = server.handle_line("{ not json").await.unwrap();
    let response: Value = serde_json::from_str(&line).unwrap();

    assert_eq!(response["error"]["code"], -32700);
    assert!(response.get("id").is_none());
}

#[tokio::test]
async fn test_unknown_tool_is_protocol_error() {
    let server = server();

    let response = call(
        &server,
        json!({ "jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": { "name": "psa_delete_everything" } }),
    )
    .await;

    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn test_tool_call_result_shape() {
    let server = server();

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": { "name": "psa_search_companies", "arguments": { "pageSize": 2 } }
        }),
    )
    .await;

    let result = &response["result"];
    assert!(result.get("isError").is_none());
    assert_eq!(result["content"][0]["type"], "text");

    let body: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(body["count"], 2);
    assert_eq!(body["possiblyTruncated"], true);
}

#[tokio::test]
async fn test_failed_tool_call_is_error_result() {
    let server = server();

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 6,
            "method": "tools/call",
            "params": { "name": "psa_search_projects", "arguments": { "pageSize": -1 } }
        }),
    )
    .await;

    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);

    let body: Value =
        serde_json::from_str(response["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(body["error"]["code"], "UNSUPPORTED_UNLIMITED_PAGINATION");
}

#[tokio::test]
async fn test_serve_over_streams() {
    let server = server();

    let input = [
        json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }).to_string(),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string(),
        String::new(),
        json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }).to_string(),
    ]
    .join("\n");

    let mut output = Vec::new();
    server.serve(input.as_bytes(), &mut output).await.unwrap();

    let responses: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"], json!({}));
    assert_eq!(responses[1]["id"], 2);
}
