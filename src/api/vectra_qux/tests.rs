use super::*;
use crate::api::testing::{run_action, run_connector};
use crate::http::mock::MockTransport;
use crate::http::{HttpResponse, Method};
use crate::platform::{ExecutionState, InvocationParams, MemoryContextStore, Priority};
use serde_json::json;

fn params() -> InvocationParams {
    InvocationParams::new()
        .with_config("API Root", "https://brain.local")
        .with_config("API Token", "tok")
}

fn host(id: i64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "state": "active",
        "threat": 70,
        "certainty": 85,
        "last_source": "10.0.0.5",
        "tags": ["vip"],
        "last_detection_timestamp": (chrono::Utc::now() - chrono::Duration::minutes(10))
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string(),
        "detection_set": ["https://brain.local/api/v2.5/detections/11"]
    })
}

fn assignment(id: i64) -> serde_json::Value {
    json!({
        "id": id,
        "assigned_by": {"id": 1, "username": "admin"},
        "assigned_to": {"id": 9, "username": "analyst"},
        "date_assigned": "2024-05-01T10:00:00Z",
        "host_id": 5
    })
}

#[test]
fn test_resolve_assignment_not_found() {
    let mock = MockTransport::new();
    mock.on(Method::Put, "/api/v2.5/assignments/44/resolve", 404, json!({"detail": "Not found."}));
    let params = params().with_param("Assignment ID", "44").with_param("Outcome ID", "1");

    let (outcome, output) = run_action(resolve_assignment, &params, &mock);

    assert_eq!(outcome.execution_state, ExecutionState::Failed);
    assert_eq!(outcome.output_message, "Assignment ID not found.");
    assert!(output.json_result.is_none());
}

#[test]
fn test_resolve_assignment_with_triage() {
    let mock = MockTransport::new();
    mock.on(
        Method::Put,
        "/api/v2.5/assignments/44/resolve",
        200,
        json!({"assignment": assignment(44)}),
    );
    let params = params()
        .with_param("Assignment ID", 44)
        .with_param("Outcome ID", 3)
        .with_param("Note Title", "benign scanner")
        .with_param("Triage As", "scanner")
        .with_param("Detection IDs", "11, 12");

    let (outcome, output) = run_action(resolve_assignment, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully resolved the assignment with ID 44.");
    let body = mock.requests()[0].body.clone().unwrap();
    assert_eq!(body, json!({"outcome": 3, "note": "benign scanner", "triage_as": "scanner", "detection_ids": [11, 12]}));
    assert!(output.table("Resolved Assignment").is_some());
}

#[test]
fn test_triage_requires_detections() {
    let mock = MockTransport::new();
    let params = params()
        .with_param("Assignment ID", 44)
        .with_param("Outcome ID", 3)
        .with_param("Triage As", "scanner");

    let (outcome, _) = run_action(resolve_assignment, &params, &mock);

    assert_eq!(outcome.execution_state, ExecutionState::Failed);
    assert!(outcome.output_message.contains("\"Detection IDs\""));
    assert!(mock.requests().is_empty());
}

#[test]
fn test_describe_entity() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/v2.5/hosts/7", 200, host(7, "web-01"));
    let params = params().with_param("Entity ID", "7").with_param("Entity Type", "host");

    let (outcome, output) = run_action(describe_entity, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully retrieved details for the host with ID 7.");
    let table = output.table("Describe host 7").unwrap();
    assert_eq!(table.rows[0][1], "web-01");
    assert_eq!(output.json_result.unwrap()["last_source"], "10.0.0.5");
}

#[test]
fn test_describe_entity_not_found() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/v2.5/accounts/8", 404, json!({"detail": "Not found."}));
    let params = params().with_param("Entity ID", "8").with_param("Entity Type", "Account");

    let (outcome, _) = run_action(describe_entity, &params, &mock);

    assert_eq!(outcome.output_message, "Entity with ID 8 was not found.");
}

#[test]
fn test_list_entities_caps_to_limit() {
    let mock = MockTransport::new();
    mock.on(
        Method::Get,
        "/api/v2.5/hosts",
        200,
        json!({"next": "https://brain.local/api/v2.5/hosts?page=2",
               "results": [host(1, "a"), host(2, "b"), host(3, "c")]}),
    );
    let params = params()
        .with_param("Entity Type", "Host")
        .with_param("Limit", 3)
        .with_param("Threat GTE", 50)
        .with_param("State", "active");

    let (outcome, output) = run_action(list_entities, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully retrieved 3 host(s).");
    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].query_value("page_size"), Some("3"));
    assert_eq!(requests[0].query_value("threat_gte"), Some("50"));
    assert_eq!(requests[0].query_value("state"), Some("active"));
    assert_eq!(output.table("List Of Entities").unwrap().rows.len(), 3);
}

#[test]
fn test_list_entities_rejects_bad_input_before_request() {
    for (name, value) in [("Entity Type", "Router"), ("Limit", "many"), ("Threat GTE", "101")] {
        let mock = MockTransport::new();
        let params = params().with_param("Entity Type", "Host").with_param(name, value);

        let (outcome, _) = run_action(list_entities, &params, &mock);

        assert_eq!(outcome.execution_state, ExecutionState::Failed, "{}", name);
        assert!(mock.requests().is_empty());
    }
}

#[test]
fn test_add_tags_reports_each_entity() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/v2.5/tagging/host/1", 200, json!({"status": "success", "tags": ["vip"]}));
    mock.on(
        Method::Patch,
        "/api/v2.5/tagging/host/1",
        200,
        json!({"status": "success", "tags": ["vip", "quarantine"]}),
    );
    mock.on(Method::Get, "/api/v2.5/tagging/host/2", 404, json!({"detail": "Not found."}));
    let params = params()
        .with_param("Tags", "quarantine, vip")
        .with_param("Entity IDs", "1, 2")
        .with_param("Entity Type", "Host");

    let (outcome, output) = run_action(add_tags, &params, &mock);

    assert_eq!(outcome.execution_state, ExecutionState::Completed);
    assert_eq!(
        outcome.output_message,
        "Successfully added tags to the following host IDs: 1\nTags could not be added to the following host IDs: 2"
    );
    let patch = mock
        .requests_to("/tagging/host/1")
        .into_iter()
        .find(|request| request.method == Method::Patch)
        .unwrap();
    assert_eq!(patch.body.unwrap()["tags"], json!(["vip", "quarantine"]));

    let table = output.table("Tag Update Status").unwrap();
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[1][1], "Failure");
}

#[test]
fn test_remove_tags() {
    let mock = MockTransport::new();
    mock.on(
        Method::Get,
        "/api/v2.5/tagging/detection/11",
        200,
        json!({"status": "success", "tags": ["a", "b"]}),
    );
    mock.on(Method::Patch, "/api/v2.5/tagging/detection/11", 200, json!({"status": "success", "tags": ["b"]}));
    let params = params()
        .with_param("Tags", "a")
        .with_param("Entity IDs", "11")
        .with_param("Entity Type", "Detection");

    let (outcome, _) = run_action(remove_tags, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully removed tags from the following detection IDs: 11");
    let requests = mock.requests();
    assert_eq!(requests[1].body.as_ref().unwrap()["tags"], json!(["b"]));
}

#[test]
fn test_mark_detection_fixed() {
    let mock = MockTransport::new();
    mock.on(Method::Patch, "/api/v2.5/detections", 200, json!({"_meta": {"level": "Success"}}));

    let (outcome, _) = run_action(mark_detection_fixed, &params().with_param("Detection IDs", "3, 4"), &mock);

    assert_eq!(outcome.output_message, "Successfully marked the following detections as fixed: 3, 4");
    let body = mock.requests()[0].body.clone().unwrap();
    assert_eq!(body["detectionIdList"], json!([3, 4]));
    assert_eq!(body["mark_as_fixed"], "True");
}

#[test]
fn test_mark_detection_fixed_rejects_bad_id() {
    let mock = MockTransport::new();

    let (outcome, _) = run_action(mark_detection_fixed, &params().with_param("Detection IDs", "3, x"), &mock);

    assert_eq!(outcome.execution_state, ExecutionState::Failed);
    assert!(outcome.output_message.contains("\"x\" is not a valid ID"));
    assert!(mock.requests().is_empty());
}

#[test]
fn test_add_note() {
    let mock = MockTransport::new();
    mock.on(
        Method::Post,
        "/api/v2.5/accounts/6/notes",
        201,
        json!({"id": 90, "note": "checked", "created_by": "api", "date_created": "2024-05-01T10:00:00Z"}),
    );
    let params = params()
        .with_param("Entity ID", 6)
        .with_param("Entity Type", "account")
        .with_param("Note", "checked");

    let (outcome, output) = run_action(add_note, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully added note to the account with ID 6.");
    assert_eq!(output.json_result.unwrap()["id"], 90);
}

#[test]
fn test_assign_entity_body() {
    let mock = MockTransport::new();
    mock.on(Method::Post, "/api/v2.5/assignments", 201, json!({"assignment": assignment(41)}));
    let params = params()
        .with_param("Entity ID", 5)
        .with_param("Entity Type", "Host")
        .with_param("User ID", 9);

    let (outcome, output) = run_action(assign_entity, &params, &mock);

    assert!(outcome.is_success());
    assert_eq!(mock.requests()[0].body, Some(json!({"assign_host_id": 5, "assign_to_user_id": 9})));
    let table = output.table("Assignment Details").unwrap();
    assert_eq!(table.rows[0][2], "analyst");
}

#[test]
fn test_update_assignment_uses_entity_assignment() {
    let mock = MockTransport::new();
    let mut entity = host(5, "web-05");
    entity["assignment"] = json!({"id": 41});
    mock.on(Method::Get, "/api/v2.5/hosts/5", 200, entity);
    mock.on(Method::Put, "/api/v2.5/assignments/41", 200, json!({"assignment": assignment(41)}));
    let params = params()
        .with_param("Entity ID", 5)
        .with_param("Entity Type", "Host")
        .with_param("User ID", 12);

    let (outcome, _) = run_action(update_assignment, &params, &mock);

    assert!(outcome.is_success(), "{}", outcome.output_message);
    let put = &mock.requests_to("/assignments/41")[0];
    assert_eq!(put.body, Some(json!({"assign_to_user_id": 12})));
}

#[test]
fn test_update_assignment_without_assignment() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/v2.5/hosts/5", 200, host(5, "web-05"));
    let params = params()
        .with_param("Entity ID", 5)
        .with_param("Entity Type", "Host")
        .with_param("User ID", 12);

    let (outcome, _) = run_action(update_assignment, &params, &mock);

    assert_eq!(
        outcome.output_message,
        "Error executing action \"Update Assignment\". Reason: The host with ID 5 has no assignment."
    );
    assert_eq!(mock.requests().len(), 1);
}

#[test]
fn test_list_assignments_filters() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/v2.5/assignments", 200, json!({"next": null, "results": [assignment(41)]}));
    let params = params()
        .with_param("Host IDs", "5, 6")
        .with_param("Resolved", "false");

    let (outcome, _) = run_action(list_assignments, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully retrieved 1 assignment(s).");
    let request = &mock.requests()[0];
    assert_eq!(request.query_value("hosts"), Some("5,6"));
    assert_eq!(request.query_value("resolved"), Some("false"));
    assert_eq!(request.query_value("accounts"), None);
}

#[test]
fn test_list_outcomes_empty() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/v2.5/assignment_outcomes", 200, json!({"next": null, "results": []}));

    let (outcome, output) = run_action(list_outcomes, &params(), &mock);

    assert_eq!(outcome.output_message, "No outcomes were found.");
    assert_eq!(outcome.result_value, json!(false));
    assert!(output.tables.is_empty());
}

#[test]
fn test_download_pcap_attachment() {
    let mock = MockTransport::new();
    mock.on_raw(
        Method::Get,
        "/api/v2.5/detections/12/pcap",
        HttpResponse::new(200, b"pcap-bytes".to_vec())
            .with_header("Content-Disposition", "attachment; filename=\"det_12.pcap\""),
    );

    let (outcome, output) = run_action(download_pcap, &params().with_param("Detection ID", 12), &mock);

    assert!(outcome.is_success());
    assert_eq!(output.attachments.len(), 1);
    assert_eq!(output.attachments[0].file_name, "det_12.pcap");
}

#[test]
fn test_ping_failure_message() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/v2.5/hosts", 401, json!({"detail": "Invalid token."}));

    let (outcome, _) = run_action(ping, &params(), &mock);

    assert_eq!(outcome.execution_state, ExecutionState::Failed);
    assert!(outcome
        .output_message
        .starts_with("Failed to connect to the Vectra QUX server! Error is 401 Unauthorized"));
}

#[test]
fn test_connector_entities_with_detections() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/v2.5/hosts", 200, json!({"next": null, "results": [host(5, "web-05")]}));
    mock.on(
        Method::Get,
        "/api/v2.5/detections",
        200,
        json!({"next": null, "results": [
            {"id": 11, "detection": "Hidden HTTPS Tunnel", "detection_category": "COMMAND & CONTROL",
             "first_timestamp": "2024-05-01T10:00:00Z", "threat": 60, "certainty": 70},
            {"id": 12, "detection": "Port Scan", "detection_category": "RECONNAISSANCE",
             "first_timestamp": "2024-05-01T09:00:00Z"}
        ]}),
    );
    let params = params().with_config("Entity Type", "Host");
    let mut store = MemoryContextStore::new();

    let first = run_connector(connector::run, &params, &mock, &mut store, false).unwrap();

    assert_eq!(first.alerts.len(), 1);
    let alert = &first.alerts[0];
    assert_eq!(alert.name, "Host web-05");
    assert_eq!(alert.rule_generator, "Vectra QUX Host");
    assert_eq!(alert.priority, Priority::Critical);
    assert_eq!(alert.events.len(), 2);
    assert_eq!(alert.events[1].get("detection").map(String::as_str), Some("Port Scan"));
    assert!(alert.start_time < alert.end_time);
    assert!(mock.requests_to("/api/v2.5/accounts").is_empty());

    let detections = &mock.requests_to("/api/v2.5/detections")[0];
    assert_eq!(detections.query_value("host_id"), Some("5"));

    let second = run_connector(connector::run, &params, &mock, &mut store, false).unwrap();
    assert!(second.alerts.is_empty());
    assert_eq!(second.duplicates, 1);
}

#[test]
fn test_list_entities_tolerates_null_and_malformed_records() {
    let mock = MockTransport::new();
    let mut untagged = host(2, "b");
    untagged["tags"] = serde_json::Value::Null;
    untagged["name"] = serde_json::Value::Null;
    mock.on(
        Method::Get,
        "/api/v2.5/hosts",
        200,
        json!({"next": null, "results": [host(1, "a"), untagged, {"name": "no-id"}]}),
    );
    let params = params().with_param("Entity Type", "Host");

    let (outcome, output) = run_action(list_entities, &params, &mock);

    assert!(outcome.is_success(), "{}", outcome.output_message);
    assert_eq!(outcome.output_message, "Successfully retrieved 2 host(s).");
    assert_eq!(output.table("List Of Entities").unwrap().rows.len(), 2);
}

#[test]
fn test_connector_ingests_entity_with_null_tags() {
    let mock = MockTransport::new();
    let mut untagged = host(6, "web-06");
    untagged["tags"] = serde_json::Value::Null;
    mock.on(
        Method::Get,
        "/api/v2.5/hosts",
        200,
        json!({"next": null, "results": [host(5, "web-05"), untagged]}),
    );
    mock.on(Method::Get, "/api/v2.5/detections", 200, json!({"next": null, "results": []}));
    let params = params().with_config("Entity Type", "Host");
    let mut store = MemoryContextStore::new();

    let run = run_connector(connector::run, &params, &mock, &mut store, false).unwrap();

    assert_eq!(run.fetched, 2);
    assert_eq!(run.alerts.len(), 2);
    assert!(run.alerts.iter().any(|alert| alert.name == "Host web-06"));
}
