use super::*;
use crate::api::testing::run_action;
use crate::http::mock::MockTransport;
use crate::http::Method;
use crate::platform::{ExecutionState, InvocationParams};
use serde_json::json;

fn params() -> InvocationParams {
    InvocationParams::new()
        .with_config("URL", "https://arcanna.local")
        .with_config("API Key", "key-1")
}

#[test]
fn test_ping() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/v1/health", 200, json!({"connected": true}));

    let (outcome, _) = run_action(ping, &params(), &mock);

    assert!(outcome.is_success());
    assert_eq!(
        outcome.output_message,
        "Successfully connected to the Arcanna.ai server with the provided connection parameters!"
    );
}

#[test]
fn test_ping_disconnected() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/v1/health", 200, json!({"connected": false}));

    let (outcome, _) = run_action(ping, &params(), &mock);

    assert_eq!(
        outcome.output_message,
        "Failed to connect to the Arcanna.ai server! Error is Arcanna reported it is not connected"
    );
}

#[test]
fn test_get_jobs_table_is_stable() {
    let mock = MockTransport::new();
    mock.on(
        Method::Get,
        "/api/v1/jobs",
        200,
        json!([
            {"job_id": 1, "title": "Phishing triage", "status": "ENABLED", "data_type": "alerts"},
            {"job_id": 2, "title": "EDR", "status": "DISABLED"}
        ]),
    );

    let (first, first_output) = run_action(get_jobs, &params(), &mock);
    let (second, second_output) = run_action(get_jobs, &params(), &mock);

    assert_eq!(first.output_message, "Successfully retrieved 2 job(s).");
    assert_eq!(first, second);
    let table = first_output.table("Available Jobs").unwrap();
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows, second_output.table("Available Jobs").unwrap().rows);
}

#[test]
fn test_get_job_by_name_not_found() {
    let mock = MockTransport::new();
    mock.on(Method::Post, "/api/v1/jobs/get_by_name", 404, json!({"error": "job not found"}));

    let (outcome, _) = run_action(get_job_by_name, &params().with_param("Job Name", "missing"), &mock);

    assert_eq!(outcome.execution_state, ExecutionState::Failed);
    assert_eq!(outcome.output_message, "Job \"missing\" was not found.");
    assert_eq!(mock.requests()[0].body, Some(json!({"job_name": "missing"})));
}

#[test]
fn test_send_event_with_custom_id() {
    let mock = MockTransport::new();
    mock.on(
        Method::Post,
        "/api/v1/events/",
        201,
        json!({"event_id": "alert-77", "job_id": 4, "status": "pending_inference"}),
    );
    let params = params()
        .with_param("Job ID", 4)
        .with_param("Event JSON", r#"{"alert": {"id": "alert-77", "severity": 3}}"#)
        .with_param("Event ID Field", "alert.id");

    let (outcome, output) = run_action(send_event, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully sent event to job 4. Event ID: alert-77");
    let body = mock.requests()[0].body.clone().unwrap();
    assert_eq!(body["id"], "alert-77");
    assert_eq!(body["job_id"], 4);
    assert_eq!(body["raw_body"]["alert"]["severity"], 3);
    assert_eq!(output.json_result.unwrap()["status"], "pending_inference");
}

#[test]
fn test_send_event_rejects_bad_input_before_request() {
    let cases = [
        params().with_param("Job ID", "x").with_param("Event JSON", "{}"),
        params().with_param("Job ID", 4).with_param("Event JSON", "[1]"),
        params()
            .with_param("Job ID", 4)
            .with_param("Event JSON", "{\"a\": 1}")
            .with_param("Event ID Field", "b.c"),
    ];
    for params in cases {
        let mock = MockTransport::new();

        let (outcome, _) = run_action(send_event, &params, &mock);

        assert_eq!(outcome.execution_state, ExecutionState::Failed);
        assert!(outcome.output_message.starts_with("Error executing action \"Send Event\"."));
        assert!(mock.requests().is_empty());
    }
}

#[test]
fn test_get_ai_decision_after_polling() {
    let mock = MockTransport::new();
    let path = "/api/v1/events/4/e1";
    mock.on(Method::Get, path, 200, json!({"event_id": "e1", "status": "pending_inference"}));
    mock.on(Method::Get, path, 200, json!({"event_id": "e1", "status": "pending_inference"}));
    mock.on(
        Method::Get,
        path,
        200,
        json!({"event_id": "e1", "job_id": 4, "status": "OK", "result_label": "Escalate", "confidence_level": 0.93}),
    );
    let params = params()
        .with_param("Job ID", 4)
        .with_param("Event ID", "e1")
        .with_param("Seconds Between Retries", 7);

    let (outcome, output) = run_action(get_ai_decision, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully retrieved the AI decision for event e1: Escalate");
    assert_eq!(mock.requests().len(), 3);
    assert_eq!(mock.pauses(), vec![Duration::from_secs(7); 2]);
    let table = output.table("AI Decision").unwrap();
    assert_eq!(table.rows[0][3], "Escalate");
}

#[test]
fn test_get_ai_decision_still_pending() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/v1/events/4/e1", 200, json!({"event_id": "e1", "status": "pending_inference"}));
    let params = params()
        .with_param("Job ID", 4)
        .with_param("Event ID", "e1")
        .with_param("Retry Count", 1);

    let (outcome, output) = run_action(get_ai_decision, &params, &mock);

    assert_eq!(outcome.execution_state, ExecutionState::Completed);
    assert_eq!(outcome.result_value, json!(false));
    assert_eq!(mock.requests().len(), 2);
    assert!(output.tables.is_empty());
}

#[test]
fn test_get_ai_decision_unknown_event() {
    let mock = MockTransport::new();
    mock.on(Method::Get, "/api/v1/events/4/nope", 400, json!({"error": "Event nope not found"}));
    let params = params().with_param("Job ID", 4).with_param("Event ID", "nope");

    let (outcome, _) = run_action(get_ai_decision, &params, &mock);

    assert_eq!(outcome.output_message, "Event with ID nope was not found.");
}

#[test]
fn test_send_analyst_feedback() {
    let mock = MockTransport::new();
    mock.on(Method::Put, "/api/v1/events/4/e1/feedback", 200, json!({"status": "updated"}));
    let params = params()
        .with_param("Job ID", 4)
        .with_param("Event ID", "e1")
        .with_param("Username", "alice")
        .with_param("Analyst Feedback", "Drop");

    let (outcome, _) = run_action(send_analyst_feedback, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully sent analyst feedback for event e1.");
    assert_eq!(mock.requests()[0].body.as_ref().unwrap()["feedback"], "Drop");
}

#[test]
fn test_trigger_job_training() {
    let mock = MockTransport::new();
    mock.on(Method::Post, "/api/v1/jobs/4/train", 200, json!({"status": "training"}));
    let params = params().with_param("Job ID", 4).with_param("Username", "alice");

    let (outcome, _) = run_action(trigger_job_training, &params, &mock);

    assert_eq!(outcome.output_message, "Successfully triggered training for the job with ID 4.");
    assert_eq!(mock.requests()[0].query_value("username"), Some("alice"));
}
