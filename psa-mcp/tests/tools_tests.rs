//! Tool handler tests

use std::sync::Arc;

use psa_core::{DirectUpstream, ResolutionLayer, ResolverConfig, UpstreamFixture};
use psa_mcp::{McpError, PsaMcpServer, ToolCall, ToolResult};
use serde_json::{json, Value};

fn server_with_upstream() -> (PsaMcpServer, Arc<DirectUpstream>) {
    let fixture: UpstreamFixture =
        serde_json::from_str(include_str!("../fixtures/demo-tenant.json")).unwrap();
    let upstream = Arc::new(DirectUpstream::from_fixture(fixture));
    let layer = ResolutionLayer::new(upstream.clone(), ResolverConfig::default()).unwrap();
    (PsaMcpServer::new(Arc::new(layer)), upstream)
}

async fn run(server: &PsaMcpServer, name: &str, arguments: Value) -> ToolResult {
    server
        .call_tool(ToolCall {
            name: name.to_string(),
            arguments,
        })
        .await
        .unwrap()
}

fn body(result: &ToolResult) -> Value {
    serde_json::from_str(&result.content[0].text).unwrap()
}

#[tokio::test]
async fn test_ticket_search_includes_names() {
    let (server, _) = server_with_upstream();

    let result = run(&server, "psa_search_tickets", json!({ "filter": { "companyID": 1 } })).await;
    let body = body(&result);

    assert!(result.is_error.is_none());
    assert_eq!(body["count"], 2);
    assert_eq!(body["possiblyTruncated"], false);
    assert!(body["message"].is_null());
    assert_eq!(body["items"][0]["_enhanced"]["companyName"], "Acme Corp");
    assert_eq!(body["items"][0]["_enhanced"]["assignedResourceName"], "Dana Reyes");
}

#[tokio::test]
async fn test_capped_search_explains_itself() {
    let (server, _) = server_with_upstream();

    let result = run(&server, "psa_search_ticket_attachments", json!({ "pageSize": 500 })).await;
    let body = body(&result);

    assert_eq!(body["count"], 0);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Requested 500 results; capped to the maximum of 50."));
}

#[tokio::test]
async fn test_bad_arguments_are_reported() {
    let (server, _) = server_with_upstream();

    let result = run(&server, "psa_search_companies", json!({ "filter": [1, 2] })).await;
    assert_eq!(result.is_error, Some(true));
    assert_eq!(body(&result)["error"]["code"], -32600);

    let result = run(&server, "psa_search_companies", json!({ "pageSize": -7 })).await;
    assert_eq!(body(&result)["error"]["code"], "INVALID_PAGE_SIZE");

    let result = run(&server, "psa_update_ticket", json!({ "status": 5 })).await;
    assert_eq!(result.is_error, Some(true));
}

#[tokio::test]
async fn test_update_ticket_reports_every_problem() {
    let (server, upstream) = server_with_upstream();

    let result = run(
        &server,
        "psa_update_ticket",
        json!({ "ticketID": 100, "status": 999, "assignedResourceID": 11 }),
    )
    .await;
    let body = body(&result);

    assert_eq!(result.is_error, Some(true));
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

    let errors = body["error"]["details"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0]
        .as_str()
        .unwrap()
        .contains("valid statuses: 1 (New), 5 (Complete), 7 (Waiting Customer), 8 (In Progress)"));
    assert!(errors[1].as_str().unwrap().contains("exists but is not active"));
    assert!(errors[1].as_str().unwrap().ends_with("assignable resources: 10 (Dana Reyes)"));
    assert_eq!(upstream.call_counts().write_record, 0);
}

#[tokio::test]
async fn test_update_ticket_without_changes() {
    let (server, _) = server_with_upstream();

    let result = run(&server, "psa_update_ticket", json!({ "ticketID": 100 })).await;

    assert_eq!(body(&result)["error"]["code"], "EMPTY_UPDATE_REQUEST");
}

#[tokio::test]
async fn test_update_ticket_writes() {
    let (server, _) = server_with_upstream();

    let result = run(
        &server,
        "psa_update_ticket",
        json!({ "ticketID": 102, "status": 8, "assignedResourceID": 10 }),
    )
    .await;
    assert!(result.is_error.is_none());
    assert_eq!(body(&result)["ticketID"], 102);

    let search = run(&server, "psa_search_tickets", json!({ "filter": { "status": 8 } })).await;
    let search = body(&search);
    assert_eq!(search["count"], 2);
}

#[tokio::test]
async fn test_create_notes() {
    let (server, _) = server_with_upstream();

    let result = run(
        &server,
        "psa_create_project_note",
        json!({ "parentID": 300, "title": "Kickoff", "description": "Movers booked\r\n", "publish": 1 }),
    )
    .await;
    let created = body(&result);

    assert_eq!(created["kind"], "ProjectNote");
    assert_eq!(created["fields"]["projectID"], 300);
    assert_eq!(created["fields"]["description"], "Movers booked");

    let notes = run(&server, "psa_search_project_notes", json!({ "filter": { "projectID": 300 } })).await;
    assert_eq!(body(&notes)["count"], 1);

    let rejected = run(
        &server,
        "psa_create_company_note",
        json!({ "parentID": 1, "description": "Hi", "publish": 9 }),
    )
    .await;
    assert_eq!(rejected.is_error, Some(true));
}

#[tokio::test]
async fn test_list_enumerations() {
    let (server, _) = server_with_upstream();

    let statuses = body(&run(&server, "psa_list_ticket_statuses", Value::Null).await);
    assert_eq!(statuses["statuses"][0], json!({ "id": 1, "name": "New" }));
    assert_eq!(statuses["degraded"], false);

    let priorities = body(&run(&server, "psa_list_ticket_priorities", json!({})).await);
    assert_eq!(priorities["priorities"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_resolve_names() {
    let (server, _) = server_with_upstream();

    let result = run(&server, "psa_resolve_names", json!({ "kind": "contacts", "ids": [21, 20, 99] })).await;
    let body = body(&result);

    assert_eq!(body["kind"], "Contact");
    assert_eq!(body["names"][0], json!({ "id": 20, "displayName": "Priya Shah", "found": true }));
    assert_eq!(body["names"][2]["displayName"], "Unknown Contact (99)");

    let unknown = run(&server, "psa_resolve_names", json!({ "kind": "widgets", "ids": [1] })).await;
    assert_eq!(unknown.is_error, Some(true));
}

#[tokio::test]
async fn test_cache_tools() {
    let (server, upstream) = server_with_upstream();

    run(&server, "psa_search_tickets", json!({})).await;
    let stats = body(&run(&server, "psa_cache_stats", json!({})).await);
    assert_eq!(stats["names"]["perKind"]["Company"]["count"], 2);
    assert_eq!(stats["names"]["maxEntries"], 10_000);
    assert_eq!(stats["metadata"]["refreshFailures"], 0);

    let cleared = body(&run(&server, "psa_clear_cache", json!({ "scope": "names:companies" })).await);
    assert_eq!(cleared["namesRemoved"], 2);

    run(&server, "psa_search_tickets", json!({})).await;
    assert_eq!(upstream.call_counts().fetch_by_ids, 3);

    let bad = run(&server, "psa_clear_cache", json!({ "scope": "everything" })).await;
    assert_eq!(bad.is_error, Some(true));
}

#[tokio::test]
async fn test_connection_tool() {
    let (server, upstream) = server_with_upstream();

    let ok = body(&run(&server, "psa_test_connection", json!({})).await);
    assert_eq!(ok["connected"], true);

    upstream.set_available(false);
    let down = body(&run(&server, "psa_test_connection", json!({})).await);
    assert_eq!(down["connected"], false);
    assert_eq!(down["errorCode"], "REMOTE_UNAVAILABLE");
}

#[tokio::test]
async fn test_unknown_tool() {
    let (server, _) = server_with_upstream();

    let result = server
        .call_tool(ToolCall {
            name: "psa_search_widgets".to_string(),
            arguments: json!({}),
        })
        .await;

    assert!(matches!(result, Err(McpError::UnknownTool(_))));
}
