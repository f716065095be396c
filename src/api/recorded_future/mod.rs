//! Recorded Future Intelligence actions

pub mod connector;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::http::TransportFactory;
use crate::logic::recorded_future::client::{AnalystNote, DEFAULT_API_ROOT};
use crate::logic::recorded_future::sandbox::DEFAULT_SANDBOX_ROOT;
use crate::logic::recorded_future::{
    AlertUpdate, EntityKind, PlaybookAlertUpdate, RecordedFutureClient, RecordedFutureError,
    SandboxClient, SandboxOverview, INTEGRATION_NAME,
};
use crate::logic::RawModel;
use crate::platform::action;
use crate::platform::{
    ActionContext, ActionOutcome, CsvRow, DataTable, Param, ParamError, ParameterSource,
};

pub const PING: &str = "Ping";
pub const ENRICH_IOC: &str = "Enrich IOC";
pub const GET_ALERT_DETAILS: &str = "Get Alert Details";
pub const UPDATE_ALERT: &str = "Update Alert";
pub const GET_PLAYBOOK_ALERT_DETAILS: &str = "Get Playbook Alert Details";
pub const UPDATE_PLAYBOOK_ALERT: &str = "Update Playbook Alert";
pub const ADD_ANALYST_NOTE: &str = "Add Analyst Note";
pub const DETONATE_URL: &str = "Detonate URL";

const DEFAULT_RISK_THRESHOLD: i64 = 25;
const SELECT_ONE: &str = "Select One";

pub const PLAYBOOK_CATEGORIES: &[&str] = &[
    "domain_abuse",
    "cyber_vulnerability",
    "code_repo_leakage",
    "third_party_risk",
    "identity_novel_exposures",
    "geopolitics_facility",
];

const ALERT_STATUSES: &[&str] = &[SELECT_ONE, "New", "Pending", "Dismissed", "Resolved", "Flag for Tuning"];
const PLAYBOOK_STATUSES: &[&str] = &[SELECT_ONE, "New", "In Progress", "Dismissed", "Resolved"];
const PLAYBOOK_PRIORITIES: &[&str] = &[SELECT_ONE, "High", "Moderate", "Informational"];
const REOPEN_STRATEGIES: &[&str] = &[SELECT_ONE, "Never", "Significant Updates"];

pub(crate) fn build_client(
    params: &dyn ParameterSource,
    transports: &dyn TransportFactory,
) -> Result<RecordedFutureClient, RecordedFutureError> {
    let api_root = Param::config(params, "API URL")
        .default_value(DEFAULT_API_ROOT)
        .print()
        .required()?;
    let api_key = Param::config(params, "API Key").required()?;
    let verify_ssl = Param::config(params, "Verify SSL").default_value(true).boolean()?;
    RecordedFutureClient::new(&api_root, &api_key, verify_ssl, transports)
}

fn build_sandbox_client(
    params: &dyn ParameterSource,
    transports: &dyn TransportFactory,
) -> Result<SandboxClient, RecordedFutureError> {
    let api_root = Param::config(params, "Sandbox API URL")
        .default_value(DEFAULT_SANDBOX_ROOT)
        .print()
        .required()?;
    let api_key = Param::config(params, "Sandbox API Key").required()?;
    let verify_ssl = Param::config(params, "Verify SSL").default_value(true).boolean()?;
    SandboxClient::new(&api_root, &api_key, verify_ssl, transports)
}

/// A choice where "Select One" means not provided
fn optional_choice(
    ctx: &ActionContext<'_>,
    name: &'static str,
    options: &[&str],
) -> Result<Option<String>, ParamError> {
    Ok(ctx
        .param(name)
        .default_value(SELECT_ONE)
        .choice(options)?
        .filter(|value| value != SELECT_ONE))
}

fn no_update_values() -> RecordedFutureError {
    RecordedFutureError::Validation(
        "At least one of the action parameters should have a provided value.".to_string(),
    )
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

fn run_ping(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, RecordedFutureError> {
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
// ENRICHMENT
// ============================================================================

pub fn enrich_ioc(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(ENRICH_IOC);
    action::conclude(ENRICH_IOC, run_enrich_ioc(ctx), |_| None)
}

fn run_enrich_ioc(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, RecordedFutureError> {
    let kind = ctx
        .param("Entity Type")
        .mandatory()
        .choice(EntityKind::LABELS)?
        .as_deref()
        .and_then(EntityKind::from_label)
        .ok_or_else(|| ParamError::Missing("Entity Type".to_string()))?;
    let entities = ctx.param("Entities").mandatory().print().list()?;
    let threshold = ctx
        .param("Risk Score Threshold")
        .default_value(DEFAULT_RISK_THRESHOLD)
        .integer_in(0, 99)?
        .unwrap_or(DEFAULT_RISK_THRESHOLD);

    let client = build_client(ctx.params, ctx.transports)?;
    let mut enriched = Vec::new();
    let mut not_found = Vec::new();
    let mut failed = Vec::new();
    let mut last_error = None;
    let mut rows = Vec::new();
    let mut results = Vec::new();
    let mut any_risky = false;

    for entity in &entities {
        let enrichment = match client.enrich(kind, entity) {
            Ok(enrichment) => enrichment,
            Err(RecordedFutureError::NotFound(_)) => {
                log::info!("Entity {} was not found in Recorded Future", entity);
                not_found.push(entity.clone());
                continue;
            }
            Err(err) => {
                log::error!("Failed to enrich entity {}: {}", entity, err);
                failed.push(entity.clone());
                last_error = Some(err);
                continue;
            }
        };

        let risky = enrichment.is_risky(threshold);
        any_risky |= risky;
        rows.push(
            CsvRow::new()
                .col("Entity", entity)
                .opt("Type", enrichment.entity.kind.as_deref())
                .col("Risk Score", enrichment.risk.score)
                .opt("Criticality", enrichment.risk.criticality_label.as_deref())
                .opt("Risk String", enrichment.risk.risk_string.as_deref())
                .col("Is Risky", risky)
                .list("Triggered Rules", &enrichment.rules()),
        );
        if let Some(card) = enrichment.intel_card.as_deref() {
            ctx.output.add_link(&format!("Intel Card: {}", entity), card);
        }
        results.push(json!({ "Entity": entity, "EntityResult": enrichment.to_json(), "IsRisky": risky }));
        enriched.push(entity.clone());
    }

    if enriched.is_empty() {
        if let (Some(err), true) = (last_error, not_found.is_empty()) {
            return Err(err);
        }
    }

    let mut messages = Vec::new();
    if enriched.is_empty() {
        messages.push("No entities were enriched.".to_string());
    } else {
        ctx.output.add_result_json(Value::Array(results));
        ctx.output.add_data_table(DataTable::from_rows("Enrichment Results", rows));
        messages.push(format!(
            "Successfully enriched the following entities in {}: {}",
            INTEGRATION_NAME,
            enriched.join(", ")
        ));
    }
    if !not_found.is_empty() {
        messages.push(format!(
            "The following entities were not found in {}: {}",
            INTEGRATION_NAME,
            not_found.join(", ")
        ));
    }
    if !failed.is_empty() {
        messages.push(format!("Failed to enrich the following entities: {}", failed.join(", ")));
    }
    Ok(ActionOutcome::completed(messages.join("\n"), any_risky))
}

// ============================================================================
// ALERTS
// ============================================================================

pub fn get_alert_details(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(GET_ALERT_DETAILS);
    let id = ctx.param("Alert ID").string().ok().flatten().unwrap_or_default();
    action::conclude(GET_ALERT_DETAILS, run_get_alert_details(ctx), |err| match err {
        RecordedFutureError::NotFound(_) => Some(format!("Alert with ID {} was not found.", id)),
        _ => None,
    })
}

fn run_get_alert_details(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, RecordedFutureError> {
    let id = ctx.param("Alert ID").print().required()?;

    let alert = build_client(ctx.params, ctx.transports)?.get_alert(&id)?;
    ctx.output.add_result_json(alert.to_json());
    ctx.output
        .add_data_table(DataTable::from_items("Alert Details", std::slice::from_ref(&alert)));
    if let Some(url) = alert.portal_url() {
        ctx.output.add_link("Web Report Link", url);
    }
    Ok(ActionOutcome::completed(
        format!("Successfully retrieved details for the alert with ID {}.", id),
        true,
    ))
}

pub fn update_alert(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(UPDATE_ALERT);
    action::conclude(UPDATE_ALERT, run_update_alert(ctx), |_| None)
}

fn run_update_alert(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, RecordedFutureError> {
    let update = AlertUpdate {
        id: ctx.param("Alert ID").print().required()?,
        status: optional_choice(ctx, "Status", ALERT_STATUSES)?,
        assignee: ctx.param("Assignee").print().string()?,
        note: ctx.param("Note").string()?,
    };
    if update.is_empty() {
        return Err(no_update_values());
    }

    let response = build_client(ctx.params, ctx.transports)?.update_alerts(std::slice::from_ref(&update))?;
    ctx.output.add_result_json(response);
    Ok(ActionOutcome::completed(
        format!("Successfully updated alert {} in {}.", update.id, INTEGRATION_NAME),
        true,
    ))
}

// ============================================================================
// PLAYBOOK ALERTS
// ============================================================================

fn category(ctx: &ActionContext<'_>, mandatory: bool) -> Result<Option<String>, ParamError> {
    let param = ctx.param("Category").print();
    let param = if mandatory { param.mandatory() } else { param };
    param.choice(PLAYBOOK_CATEGORIES)
}

pub fn get_playbook_alert_details(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(GET_PLAYBOOK_ALERT_DETAILS);
    let id = ctx.param("Playbook Alert ID").string().ok().flatten().unwrap_or_default();
    action::conclude(
        GET_PLAYBOOK_ALERT_DETAILS,
        run_get_playbook_alert_details(ctx),
        |err| match err {
            RecordedFutureError::NotFound(_) => {
                Some(format!("Playbook alert with ID {} was not found.", id))
            }
            _ => None,
        },
    )
}

fn run_get_playbook_alert_details(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, RecordedFutureError> {
    let id = ctx.param("Playbook Alert ID").print().required()?;
    let category = category(ctx, true)?.ok_or_else(|| ParamError::Missing("Category".to_string()))?;

    let alert = build_client(ctx.params, ctx.transports)?.get_playbook_alert(&category, &id)?;
    ctx.output.add_result_json(alert.to_json());
    ctx.output.add_data_table(DataTable::from_items(
        "Playbook Alert Details",
        std::slice::from_ref(&alert),
    ));
    Ok(ActionOutcome::completed(
        format!("Successfully retrieved details for the playbook alert with ID {}.", id),
        true,
    ))
}

pub fn update_playbook_alert(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(UPDATE_PLAYBOOK_ALERT);
    let id = ctx.param("Playbook Alert ID").string().ok().flatten().unwrap_or_default();
    action::conclude(UPDATE_PLAYBOOK_ALERT, run_update_playbook_alert(ctx), |err| match err {
        RecordedFutureError::NotFound(_) => {
            Some(format!("Playbook alert with ID {} was not found.", id))
        }
        _ => None,
    })
}

fn run_update_playbook_alert(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, RecordedFutureError> {
    let id = ctx.param("Playbook Alert ID").print().required()?;
    let category = category(ctx, false)?;
    let update = PlaybookAlertUpdate {
        status: optional_choice(ctx, "Status", PLAYBOOK_STATUSES)?.map(|s| s.replace(' ', "")),
        priority: optional_choice(ctx, "Priority", PLAYBOOK_PRIORITIES)?,
        assignee: ctx.param("Assignee").print().string()?,
        log_entry: ctx.param("Log Entry").string()?,
        reopen_strategy: optional_choice(ctx, "Reopen Strategy", REOPEN_STRATEGIES)?
            .map(|s| s.to_lowercase().replace(' ', "_")),
    };
    if update.is_empty() {
        return Err(no_update_values());
    }

    let client = build_client(ctx.params, ctx.transports)?;
    let response = client.update_playbook_alert(&id, &update)?;
    match category {
        Some(category) => {
            let alert = client.get_playbook_alert(&category, &id)?;
            ctx.output.add_result_json(alert.to_json());
        }
        None => ctx.output.add_result_json(response),
    }
    Ok(ActionOutcome::completed(
        format!("Successfully updated playbook alert {} in {}.", id, INTEGRATION_NAME),
        true,
    ))
}

// ============================================================================
// ANALYST NOTES
// ============================================================================

pub fn add_analyst_note(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(ADD_ANALYST_NOTE);
    action::conclude(ADD_ANALYST_NOTE, run_add_analyst_note(ctx), |_| None)
}

fn run_add_analyst_note(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, RecordedFutureError> {
    let note = AnalystNote {
        title: ctx.param("Note Title").print().required()?,
        text: ctx.param("Note Text").required()?,
        topic: ctx.param("Topic").print().string()?,
    };

    let note_id = build_client(ctx.params, ctx.transports)?.publish_note(&note)?;
    ctx.output.add_result_json(json!({ "note_id": note_id }));
    Ok(ActionOutcome::completed(
        format!("Successfully published analyst note with ID {}.", note_id),
        note_id,
    ))
}

// ============================================================================
// DETONATE URL (async)
// ============================================================================

/// Carried between invocations in `additional_data`
#[derive(Debug, Default, Serialize, Deserialize)]
struct DetonationState {
    /// URL → sample ID still being analyzed
    pending: BTreeMap<String, String>,
    /// URL → sample ID with a report
    completed: BTreeMap<String, String>,
    /// URL → failure reason
    failed: BTreeMap<String, String>,
}

pub fn detonate_url(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(DETONATE_URL);
    action::conclude(DETONATE_URL, run_detonate_url(ctx), |_| None)
}

fn run_detonate_url(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, RecordedFutureError> {
    let client = build_sandbox_client(ctx.params, ctx.transports)?;

    let mut state = match (ctx.is_first_run, ctx.additional_data.as_deref()) {
        (false, Some(data)) => serde_json::from_str::<DetonationState>(data).map_err(|e| {
            RecordedFutureError::Validation(format!("Invalid detonation state: {}", e))
        })?,
        _ => submit_urls(ctx, &client)?,
    };

    for (url, sample_id) in std::mem::take(&mut state.pending) {
        match client.get_sample(&sample_id) {
            Ok(sample) if sample.is_reported() => {
                state.completed.insert(url, sample_id);
            }
            Ok(sample) if sample.is_failed() => {
                state
                    .failed
                    .insert(url, format!("sandbox analysis of sample {} failed", sample_id));
            }
            Ok(sample) => {
                log::info!("Sample {} for {} is {}", sample_id, url, sample.status);
                state.pending.insert(url, sample_id);
            }
            Err(err) => {
                log::error!("Failed to check sample {} for {}: {}", sample_id, url, err);
                state.failed.insert(url, err.to_string());
            }
        }
    }

    if !state.pending.is_empty() {
        let waiting: Vec<&str> = state.pending.keys().map(String::as_str).collect();
        let data = serde_json::to_string(&state)
            .map_err(|e| RecordedFutureError::Validation(e.to_string()))?;
        return Ok(ActionOutcome::in_progress(
            format!("Waiting for the detonation of the following URLs: {}", waiting.join(", ")),
            data,
        ));
    }

    finish_detonation(ctx, &client, state)
}

fn submit_urls(ctx: &ActionContext<'_>, client: &SandboxClient) -> Result<DetonationState, RecordedFutureError> {
    let urls = ctx.param("URLs").mandatory().print().list()?;
    let mut state = DetonationState::default();
    for url in urls {
        match client.submit_url(&url) {
            Ok(sample) => {
                log::info!("Submitted {} as sample {}", url, sample.id);
                state.pending.insert(url, sample.id);
            }
            Err(err) => {
                log::error!("Failed to submit {}: {}", url, err);
                state.failed.insert(url, err.to_string());
            }
        }
    }
    Ok(state)
}

fn overview_row(url: &str, sample_id: &str, overview: &SandboxOverview) -> CsvRow {
    let signatures: Vec<&str> = overview.signatures.iter().map(|s| s.name.as_str()).collect();
    CsvRow::new()
        .col("URL", url)
        .col("Sample ID", sample_id)
        .opt("Score", overview.analysis.score)
        .list("Families", &overview.analysis.family)
        .list("Tags", &overview.analysis.tags)
        .list("Signatures", &signatures)
}

fn finish_detonation(
    ctx: &mut ActionContext<'_>,
    client: &SandboxClient,
    mut state: DetonationState,
) -> Result<ActionOutcome, RecordedFutureError> {
    let mut rows = Vec::new();
    let mut results = Vec::new();
    let mut reported = Vec::new();

    for (url, sample_id) in std::mem::take(&mut state.completed) {
        match client.get_overview(&sample_id) {
            Ok(overview) => {
                rows.push(overview_row(&url, &sample_id, &overview));
                results.push(json!({ "url": url, "sample_id": sample_id, "overview": overview.to_json() }));
                reported.push(url);
            }
            Err(err) => {
                log::error!("Failed to fetch the report of sample {}: {}", sample_id, err);
                state.failed.insert(url, err.to_string());
            }
        }
    }

    let mut messages = Vec::new();
    if reported.is_empty() {
        messages.push("No URLs were detonated.".to_string());
    } else {
        ctx.output.add_result_json(Value::Array(results));
        ctx.output.add_data_table(DataTable::from_rows("Detonation Results", rows));
        messages.push(format!("Successfully detonated the following URLs: {}", reported.join(", ")));
    }
    if !state.failed.is_empty() {
        let failed: Vec<&str> = state.failed.keys().map(String::as_str).collect();
        messages.push(format!("Failed to detonate the following URLs: {}", failed.join(", ")));
    }
    Ok(ActionOutcome::completed(messages.join("\n"), !reported.is_empty()))
}
