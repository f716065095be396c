//! Arcanna.ai actions

use std::time::Duration;

use serde_json::Value;

use crate::http::TransportFactory;
use crate::logic::arcanna::{ArcannaClient, ArcannaError, INTEGRATION_NAME};
use crate::logic::{to_json_list, RawModel};
use crate::platform::action;
use crate::platform::{ActionContext, ActionOutcome, DataTable, Param, ParamError, ParameterSource};

pub const PING: &str = "Ping";
pub const GET_JOBS: &str = "Get Jobs";
pub const GET_JOB_BY_NAME: &str = "Get Job By Name";
pub const SEND_EVENT: &str = "Send Event";
pub const GET_AI_DECISION: &str = "Get AI Decision";
pub const SEND_ANALYST_FEEDBACK: &str = "Send Analyst Feedback";
pub const TRIGGER_JOB_TRAINING: &str = "Trigger Job Training";

const DEFAULT_RETRIES: u64 = 3;
const DEFAULT_RETRY_INTERVAL: u64 = 15;

pub(crate) fn build_client(
    params: &dyn ParameterSource,
    transports: &dyn TransportFactory,
) -> Result<ArcannaClient, ArcannaError> {
    let api_root = Param::config(params, "URL").print().required()?;
    let api_key = Param::config(params, "API Key").required()?;
    let verify_ssl = Param::config(params, "Verify SSL").default_value(true).boolean()?;
    ArcannaClient::new(&api_root, &api_key, verify_ssl, transports)
}

fn job_id(ctx: &ActionContext<'_>) -> Result<i64, ParamError> {
    ctx.param("Job ID")
        .mandatory()
        .print()
        .positive_integer()?
        .map(|id| id as i64)
        .ok_or_else(|| ParamError::Missing("Job ID".to_string()))
}

/// Value at a dotted path such as `alert.id`
fn value_at_path<'v>(event: &'v Value, path: &str) -> Option<&'v Value> {
    let pointer = format!("/{}", path.trim().replace('.', "/"));
    event.pointer(&pointer)
}

// ============================================================================
// PING
// ============================================================================

pub fn ping(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(PING);
    action::conclude(PING, run_ping(ctx), |err| {
        Some(format!("Failed to connect to the {} server! Error is {}", INTEGRATION_NAME, err))
    })
}

fn run_ping(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, ArcannaError> {
    build_client(ctx.params, ctx.transports)?.test_connectivity()?;
    Ok(ActionOutcome::completed(
        format!(
            "Successfully connected to the {} server with the provided connection parameters!",
            INTEGRATION_NAME
        ),
        true,
    ))
}

// ============================================================================
// JOBS
// ============================================================================

pub fn get_jobs(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(GET_JOBS);
    action::conclude(GET_JOBS, run_get_jobs(ctx), |_| None)
}

fn run_get_jobs(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, ArcannaError> {
    let jobs = build_client(ctx.params, ctx.transports)?.get_jobs()?;
    if jobs.is_empty() {
        return Ok(ActionOutcome::completed("No jobs were found.", false));
    }

    ctx.output.add_result_json(to_json_list(&jobs));
    ctx.output.add_data_table(DataTable::from_items("Available Jobs", &jobs));
    Ok(ActionOutcome::completed(
        format!("Successfully retrieved {} job(s).", jobs.len()),
        true,
    ))
}

pub fn get_job_by_name(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(GET_JOB_BY_NAME);
    let name = ctx.param("Job Name").string().ok().flatten().unwrap_or_default();
    action::conclude(GET_JOB_BY_NAME, run_get_job_by_name(ctx), |err| match err {
        ArcannaError::NotFound(_) => Some(format!("Job \"{}\" was not found.", name)),
        _ => None,
    })
}

fn run_get_job_by_name(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, ArcannaError> {
    let name = ctx.param("Job Name").print().required()?;

    let job = build_client(ctx.params, ctx.transports)?.get_job_by_name(&name)?;
    ctx.output.add_result_json(job.to_json());
    ctx.output
        .add_data_table(DataTable::from_items("Job Details", std::slice::from_ref(&job)));
    Ok(ActionOutcome::completed(
        format!("Successfully retrieved job \"{}\" with ID {}.", job.title, job.job_id),
        true,
    ))
}

pub fn trigger_job_training(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(TRIGGER_JOB_TRAINING);
    action::conclude(TRIGGER_JOB_TRAINING, run_trigger_job_training(ctx), |_| None)
}

fn run_trigger_job_training(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, ArcannaError> {
    let job_id = job_id(ctx)?;
    let username = ctx.param("Username").required()?;

    let response = build_client(ctx.params, ctx.transports)?.train_job(job_id, &username)?;
    ctx.output.add_result_json(response);
    Ok(ActionOutcome::completed(
        format!("Successfully triggered training for the job with ID {}.", job_id),
        true,
    ))
}

// ============================================================================
// EVENTS
// ============================================================================

pub fn send_event(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(SEND_EVENT);
    action::conclude(SEND_EVENT, run_send_event(ctx), |_| None)
}

fn run_send_event(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, ArcannaError> {
    let job_id = job_id(ctx)?;
    let event = ctx
        .param("Event JSON")
        .mandatory()
        .json()?
        .filter(Value::is_object)
        .ok_or_else(|| ParamError::invalid("Event JSON", "it should be a JSON object"))?;
    let id_field = ctx.param("Event ID Field").print().string()?;

    let custom_id = match id_field {
        Some(path) => match value_at_path(&event, &path) {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => {
                return Err(ArcannaError::Validation(format!(
                    "Field \"{}\" was not found in the event or is not a string or number.",
                    path
                )))
            }
        },
        None => None,
    };

    let receipt = build_client(ctx.params, ctx.transports)?.send_event(
        job_id,
        &event,
        custom_id.as_deref(),
    )?;
    ctx.output.add_result_json(receipt.to_json());
    Ok(ActionOutcome::completed(
        format!(
            "Successfully sent event to job {}. Event ID: {}",
            job_id, receipt.event_id
        ),
        true,
    ))
}

pub fn get_ai_decision(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(GET_AI_DECISION);
    let event_id = ctx.param("Event ID").string().ok().flatten().unwrap_or_default();
    action::conclude(GET_AI_DECISION, run_get_ai_decision(ctx), |err| match err {
        ArcannaError::NotFound(_) => Some(format!("Event with ID {} was not found.", event_id)),
        _ => None,
    })
}

fn run_get_ai_decision(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, ArcannaError> {
    let job_id = job_id(ctx)?;
    let event_id = ctx.param("Event ID").print().required()?;
    let retries = ctx
        .param("Retry Count")
        .default_value(DEFAULT_RETRIES)
        .non_negative_integer()?
        .unwrap_or(DEFAULT_RETRIES);
    let interval = ctx
        .param("Seconds Between Retries")
        .default_value(DEFAULT_RETRY_INTERVAL)
        .positive_integer()?
        .unwrap_or(DEFAULT_RETRY_INTERVAL);

    let client = build_client(ctx.params, ctx.transports)?;
    let decision = client.wait_for_decision(
        job_id,
        &event_id,
        u32::try_from(retries).unwrap_or(u32::MAX),
        Duration::from_secs(interval),
    )?;

    if decision.is_error() {
        return Err(ArcannaError::Api(
            decision
                .error_message
                .clone()
                .unwrap_or_else(|| format!("Arcanna failed to process event {}", event_id)),
        ));
    }

    ctx.output.add_result_json(decision.to_json());
    if decision.is_pending() {
        return Ok(ActionOutcome::completed(
            format!(
                "The AI decision for event {} is not available yet after {} retries.",
                event_id, retries
            ),
            false,
        ));
    }

    ctx.output
        .add_data_table(DataTable::from_items("AI Decision", std::slice::from_ref(&decision)));
    Ok(ActionOutcome::completed(
        format!(
            "Successfully retrieved the AI decision for event {}: {}",
            event_id,
            decision.label().unwrap_or("no label")
        ),
        true,
    ))
}

pub fn send_analyst_feedback(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(SEND_ANALYST_FEEDBACK);
    let event_id = ctx.param("Event ID").string().ok().flatten().unwrap_or_default();
    action::conclude(SEND_ANALYST_FEEDBACK, run_send_analyst_feedback(ctx), |err| match err {
        ArcannaError::NotFound(_) => Some(format!("Event with ID {} was not found.", event_id)),
        _ => None,
    })
}

fn run_send_analyst_feedback(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, ArcannaError> {
    let job_id = job_id(ctx)?;
    let event_id = ctx.param("Event ID").print().required()?;
    let username = ctx.param("Username").required()?;
    let feedback = ctx.param("Analyst Feedback").print().required()?;

    let response = build_client(ctx.params, ctx.transports)?
        .send_feedback(job_id, &event_id, &username, &feedback)?;
    ctx.output.add_result_json(response);
    Ok(ActionOutcome::completed(
        format!("Successfully sent analyst feedback for event {}.", event_id),
        true,
    ))
}

#[cfg(test)]
mod tests;
