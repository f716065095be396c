use super::*;
use crate::api::testing::{run_action, run_connector};
use crate::http::mock::MockTransport;
use crate::http::Method;
use crate::platform::context::read_seen_ids;
use crate::platform::{ExecutionState, InvocationParams, MemoryContextStore, Priority};
use serde_json::json;

fn params() -> InvocationParams {
    InvocationParams::new()
        .with_config("API Root", "https://csp.infoblox.com/")
        .with_config("API Key", "secret")
        .with_config("Verify SSL", true)
}

fn custom_list(id: i64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "type": "custom_list",
        "item_count": 1,
        "items_described": [{"item": "evil.com", "description": ""}],
        "policies": ["default"]
    })
}

#[test]
fn test_get_custom_list_empty() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/atcfw/v1/named_lists", 200, json!({"results": []}));

    let (outcome, output) = run_action(get_custom_list, &params(), &mock);

    assert_eq!(outcome.execution_state, ExecutionState::Completed);
    assert_eq!(outcome.output_message, "No custom lists found.");
    assert!(output.tables.is_empty());
}

#[test]
fn test_get_custom_list_by_name_builds_filter() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/atcfw/v1/named_lists", 200, json!({"results": [custom_list(3, "blocked")]}));
    let params = params().with_param("Custom List Name", "blocked").with_param("Limit", 10);

    let (outcome, output) = run_action(get_custom_list, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully retrieved 1 custom list(s).");
    let request = &mock.requests()[0];
    assert_eq!(request.header_value("Authorization"), Some("Token secret"));
    assert_eq!(request.query_value("_filter"), Some("name==\"blocked\""));
    assert_eq!(request.query_value("_offset"), Some("0"));
    assert_eq!(request.query_value("_limit"), Some("10"));
    assert_eq!(output.table("Custom List Details").unwrap().rows.len(), 1);
}

#[test]
fn test_get_custom_list_pages_until_short_page() {
    let mock = MockTransport::new();
    let full: Vec<_> = (0..100).map(|i| custom_list(i, "l")).collect();
    mock.on(Method::Get, "/api/atcfw/v1/named_lists", 200, json!({"results": full}));
    mock.on(Method::Get, "/api/atcfw/v1/named_lists", 200, json!({"results": [custom_list(100, "l")]}));
    let params = params().with_param("Limit", 500);

    let (outcome, _) = run_action(get_custom_list, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully retrieved 101 custom list(s).");
    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].query_value("_offset"), Some("100"));
}

#[test]
fn test_get_custom_list_by_id_not_found() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/atcfw/v1/named_lists/77", 404, json!({"error": [{"message": "not found"}]}));
    let params = params().with_param("Custom List ID", "77");

    let (outcome, _) = run_action(get_custom_list, &params, &mock);

    assert_eq!(outcome.execution_state, ExecutionState::Failed);
    assert_eq!(outcome.output_message, "Custom list with ID 77 was not found.");
}

#[test]
fn test_invalid_limit_fails_before_request() {
    for limit in ["abc", "0", "-5"] {
        let mock = MockTransport::new();
        let params = params().with_param("Limit", limit);

        let (outcome, _) = run_action(get_security_policies, &params, &mock);

        assert_eq!(outcome.execution_state, ExecutionState::Failed, "limit {}", limit);
        assert!(outcome.output_message.contains("\"Limit\""));
        assert!(mock.requests().is_empty());
    }
}

#[test]
fn test_create_custom_list_body() {
    let mock = MockTransport::new();
    mock.on(Method::Post, "/api/atcfw/v1/named_lists", 201, json!({"results": custom_list(9, "new")}));
    let params = params()
        .with_param("Name", "new")
        .with_param("Items", "evil.com, 1.2.3.4")
        .with_param("Threat Level", "high")
        .with_param("Tags", "{\"owner\": \"soc\"}");

    let (outcome, output) = run_action(create_custom_list, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully created custom list \"new\" with ID 9.");
    let body = mock.requests()[0].body.clone().unwrap();
    assert_eq!(body["type"], "custom_list");
    assert_eq!(body["threat_level"], "HIGH");
    assert_eq!(body["items_described"][1]["item"], "1.2.3.4");
    assert_eq!(body["tags"]["owner"], "soc");
    assert!(output.table("Custom List Details").is_some());
}

#[test]
fn test_create_custom_list_rejects_non_object_tags() {
    let mock = MockTransport::new();
    let params = params().with_param("Name", "new").with_param("Tags", "[1, 2]");

    let (outcome, _) = run_action(create_custom_list, &params, &mock);

    assert_eq!(outcome.execution_state, ExecutionState::Failed);
    assert!(mock.requests().is_empty());
}

#[test]
fn test_create_custom_list_conflict_message() {
    let mock = MockTransport::new();
    mock.on(
        Method::Post,
        "/api/atcfw/v1/named_lists",
        409,
        json!({"error": [{"message": "named list already exists"}]}),
    );

    let (outcome, _) = run_action(create_custom_list, &params().with_param("Name", "dup"), &mock);

    assert_eq!(outcome.output_message, "Failed to create custom list. Reason: named list already exists");
}

#[test]
fn test_update_items_remove() {
    let mock = MockTransport::new();
    mock.on(Method::Patch, "/api/atcfw/v1/named_lists/3/items", 200, json!({}));
    mock.on(Method::Get, "/api/atcfw/v1/named_lists/3", 200, json!({"results": custom_list(3, "blocked")}));
    let params = params()
        .with_param("Custom List ID", 3)
        .with_param("Items", "evil.com")
        .with_param("Action", "remove");

    let (outcome, _) = run_action(update_custom_list_items, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully removed items from custom list with ID 3.");
    let patch = &mock.requests_to("/named_lists/3/items")[0];
    assert_eq!(patch.body.as_ref().unwrap()["deleted_items_described"][0]["item"], "evil.com");
}

#[test]
fn test_remove_custom_list() {
    let mock = MockTransport::new();
    mock.on(Method::Delete, "/api/atcfw/v1/named_lists/5", 204, json!(null));

    let (outcome, _) = run_action(remove_custom_list, &params().with_param("Custom List ID", "5"), &mock);

    assert_eq!(outcome.output_message, "Successfully removed custom list with ID 5.");
}

#[test]
fn test_host_lookup_table() {
    let mock = MockTransport::new();
    mock.on(
        Method::Get,
        "/api/ddi/v1/ipam/host",
        200,
        json!({"results": [{"id": "ipam/host/1", "name": "web-1", "addresses": [{"address": "10.0.0.5"}]}]}),
    );

    let (outcome, output) = run_action(host_lookup, &params().with_param("Host Filter", "name~\"web\""), &mock);

    assert!(outcome.is_success());
    let table = output.table("Hosts").unwrap();
    assert_eq!(table.columns[2], "Addresses");
    assert_eq!(table.rows[0][2], "10.0.0.5");
}

#[test]
fn test_rate_limit_is_retried_then_reported() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/atcfw/v1/security_policies", 429, json!({}));

    let (outcome, _) = run_action(get_security_policies, &params(), &mock);

    assert_eq!(outcome.execution_state, ExecutionState::Failed);
    assert_eq!(mock.requests().len(), 4);
    assert_eq!(mock.pauses().len(), 3);
}

#[test]
fn test_connector_hashes_ids_and_deduplicates() {
    let mock = MockTransport::new();
    let now = chrono::Utc::now();
    let events = json!({"result": [
        {"event_time": (now - chrono::Duration::minutes(5)).to_rfc3339(), "qname": "evil.com.",
         "qip": "10.0.0.1", "device": "laptop-7", "policy_name": "default", "threat_level": "HIGH",
         "tclass": "Malware"},
        {"event_time": (now - chrono::Duration::minutes(4)).to_rfc3339(), "qname": "phish.io.",
         "qip": "10.0.0.2", "policy_name": "guest", "threat_level": "LOW"}
    ]});
    mock.on(Method::Get, "/api/dnsdata/v2/dns_event", 200, events);
    let params = params().with_config("Dynamic List", "default");
    let mut store = MemoryContextStore::new();

    let first = run_connector(connector::run, &params, &mock, &mut store, false).unwrap();
    assert_eq!(first.alerts.len(), 1);
    assert_eq!(first.filtered, 1);
    let alert = &first.alerts[0];
    assert_eq!(alert.name, "Malware: evil.com");
    assert_eq!(alert.priority, Priority::High);
    assert_eq!(alert.ticket_id.len(), 64);
    assert!(mock.requests()[0].query_value("t0").is_some());

    let second = run_connector(connector::run, &params, &mock, &mut store, false).unwrap();
    assert!(second.alerts.is_empty());
    assert_eq!(second.duplicates, 2);
    assert_eq!(read_seen_ids(&store).unwrap().len(), 2);
}

#[test]
fn test_connector_rejects_unknown_threat_level() {
    let mock = MockTransport::new();
    let params = params().with_config("Threat Level", "LOW, SEVERE");
    let mut store = MemoryContextStore::new();

    let err = run_connector(connector::run, &params, &mock, &mut store, false).unwrap_err();
    assert!(err.to_string().contains("SEVERE"));
    assert!(mock.requests().is_empty());
}

#[test]
fn test_get_custom_list_name_is_quoted_in_filter() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/atcfw/v1/named_lists", 200, json!({"results": []}));
    let params = params().with_param("Custom List Name", r#"a" or name=="b"#);

    let (outcome, _) = run_action(get_custom_list, &params, &mock);

    assert_eq!(outcome.output_message, "No custom lists found.");
    assert_eq!(
        mock.requests()[0].query_value("_filter"),
        Some(r#"name=="a\" or name==\"b""#)
    );
}
