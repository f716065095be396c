//! Vectra QUX actions

pub mod connector;

use crate::http::{PageFailure, TransportFactory};
use crate::logic::vectra_qux::{
    AssignmentQuery, EntityQuery, EntityType, VectraQuxClient, VectraQuxError, INTEGRATION_NAME,
};
use crate::logic::{to_json_list, RawModel};
use crate::platform::action;
use crate::platform::{
    ActionContext, ActionOutcome, Attachment, CsvRow, DataTable, Param, ParamError,
    ParameterSource,
};

pub const PING: &str = "Ping";
pub const DESCRIBE_ENTITY: &str = "Describe Entity";
pub const DESCRIBE_DETECTION: &str = "Describe Detection";
pub const LIST_ENTITIES: &str = "List Entities";
pub const ADD_TAGS: &str = "Add Tags";
pub const REMOVE_TAGS: &str = "Remove Tags";
pub const ADD_NOTE: &str = "Add Note";
pub const LIST_ASSIGNMENTS: &str = "List Assignments";
pub const ASSIGN_ENTITY: &str = "Assign Entity";
pub const UPDATE_ASSIGNMENT: &str = "Update Assignment";
pub const RESOLVE_ASSIGNMENT: &str = "Resolve Assignment";
pub const MARK_DETECTION_FIXED: &str = "Mark Detection Fixed";
pub const LIST_OUTCOMES: &str = "List Outcomes";
pub const DOWNLOAD_PCAP: &str = "Download PCAP";

const DEFAULT_LIMIT: u64 = 50;
const TAGGABLE: &[&str] = &["Host", "Account", "Detection"];

pub(crate) fn build_client(
    params: &dyn ParameterSource,
    transports: &dyn TransportFactory,
) -> Result<VectraQuxClient, VectraQuxError> {
    let api_root = Param::config(params, "API Root").print().required()?;
    let api_token = Param::config(params, "API Token").required()?;
    let verify_ssl = Param::config(params, "Verify SSL").default_value(true).boolean()?;
    VectraQuxClient::new(&api_root, &api_token, verify_ssl, transports)
}

fn mandatory_id(ctx: &ActionContext<'_>, name: &'static str) -> Result<i64, ParamError> {
    ctx.param(name)
        .mandatory()
        .print()
        .positive_integer()?
        .map(|id| id as i64)
        .ok_or_else(|| ParamError::Missing(name.to_string()))
}

/// Comma separated list of positive IDs
fn id_list(ctx: &ActionContext<'_>, name: &'static str) -> Result<Vec<i64>, ParamError> {
    ctx.param(name)
        .list()?
        .iter()
        .map(|value| match value.parse::<i64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(ParamError::invalid(
                name,
                format!("\"{}\" is not a valid ID, IDs should be positive numbers", value),
            )),
        })
        .collect()
}

fn entity_type(ctx: &ActionContext<'_>) -> Result<EntityType, ParamError> {
    ctx.param("Entity Type")
        .mandatory()
        .choice(EntityType::LABELS)?
        .as_deref()
        .and_then(EntityType::from_label)
        .ok_or_else(|| ParamError::Missing("Entity Type".to_string()))
}

fn limit(ctx: &ActionContext<'_>) -> Result<usize, ParamError> {
    Ok(ctx
        .param("Limit")
        .default_value(DEFAULT_LIMIT)
        .positive_integer()?
        .unwrap_or(DEFAULT_LIMIT) as usize)
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

fn run_ping(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, VectraQuxError> {
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
// ENTITIES / DETECTIONS
// ============================================================================

pub fn describe_entity(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(DESCRIBE_ENTITY);
    let id = ctx.param("Entity ID").string().ok().flatten().unwrap_or_default();
    action::conclude(DESCRIBE_ENTITY, run_describe_entity(ctx), |err| match err {
        VectraQuxError::NotFound(_) => Some(format!("Entity with ID {} was not found.", id)),
        _ => None,
    })
}

fn run_describe_entity(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, VectraQuxError> {
    let id = mandatory_id(ctx, "Entity ID")?;
    let entity_type = entity_type(ctx)?;

    let entity = build_client(ctx.params, ctx.transports)?.get_entity(entity_type, id)?;
    ctx.output.add_result_json(entity.to_json());
    ctx.output.add_data_table(DataTable::from_items(
        &format!("Describe {} {}", entity_type.singular(), id),
        std::slice::from_ref(&entity),
    ));
    Ok(ActionOutcome::completed(
        format!("Successfully retrieved details for the {} with ID {}.", entity_type.singular(), id),
        true,
    ))
}

pub fn describe_detection(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(DESCRIBE_DETECTION);
    let id = ctx.param("Detection ID").string().ok().flatten().unwrap_or_default();
    action::conclude(DESCRIBE_DETECTION, run_describe_detection(ctx), |err| match err {
        VectraQuxError::NotFound(_) => Some(format!("Detection with ID {} was not found.", id)),
        _ => None,
    })
}

fn run_describe_detection(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, VectraQuxError> {
    let id = mandatory_id(ctx, "Detection ID")?;

    let detection = build_client(ctx.params, ctx.transports)?.get_detection(id)?;
    ctx.output.add_result_json(detection.to_json());
    ctx.output
        .add_data_table(DataTable::from_items("Describe Detection", std::slice::from_ref(&detection)));
    Ok(ActionOutcome::completed(
        format!("Successfully retrieved details for the detection with ID {}.", id),
        true,
    ))
}

pub fn list_entities(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(LIST_ENTITIES);
    action::conclude(LIST_ENTITIES, run_list_entities(ctx), |_| None)
}

fn run_list_entities(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, VectraQuxError> {
    let entity_type = entity_type(ctx)?;
    let limit = limit(ctx)?;
    let query = EntityQuery {
        name: ctx.param("Name").string()?,
        state: ctx
            .param("State")
            .choice(&["Active", "Inactive"])?
            .map(|state| state.to_lowercase()),
        threat_gte: ctx.param("Threat GTE").integer_in(0, 100)?,
        certainty_gte: ctx.param("Certainty GTE").integer_in(0, 100)?,
        last_detection_gte: ctx.param("Last Detection Timestamp GTE").string()?,
        note_modified_gte: ctx.param("Note Modified Timestamp GTE").string()?,
        tags: ctx.param("Tags").list()?,
        is_prioritized: ctx.param("Prioritized").choice(&["True", "False"])?.map(|v| v == "True"),
        ordering: ctx.param("Order By").string()?,
    };

    let entities = build_client(ctx.params, ctx.transports)?.list_entities(
        entity_type,
        &query,
        Some(limit),
        PageFailure::Propagate,
    )?;
    if entities.is_empty() {
        return Ok(ActionOutcome::completed(
            "No entities were found for the provided criteria.",
            false,
        ));
    }

    ctx.output.add_result_json(to_json_list(&entities));
    ctx.output.add_data_table(DataTable::from_items("List Of Entities", &entities));
    Ok(ActionOutcome::completed(
        format!("Successfully retrieved {} {}(s).", entities.len(), entity_type.singular()),
        true,
    ))
}

pub fn download_pcap(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(DOWNLOAD_PCAP);
    let id = ctx.param("Detection ID").string().ok().flatten().unwrap_or_default();
    action::conclude(DOWNLOAD_PCAP, run_download_pcap(ctx), |err| match err {
        VectraQuxError::NotFound(_) => {
            Some(format!("No PCAP file is available for the detection with ID {}.", id))
        }
        _ => None,
    })
}

fn run_download_pcap(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, VectraQuxError> {
    let id = mandatory_id(ctx, "Detection ID")?;

    let (file_name, bytes) = build_client(ctx.params, ctx.transports)?.download_pcap(id)?;
    ctx.output.add_attachment(Attachment::new(&file_name, &file_name, &bytes));
    ctx.output.add_result_json(serde_json::json!({ "file_name": file_name, "size": bytes.len() }));
    Ok(ActionOutcome::completed(
        format!("Successfully downloaded the PCAP file for the detection with ID {}.", id),
        true,
    ))
}

pub fn mark_detection_fixed(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(MARK_DETECTION_FIXED);
    action::conclude(MARK_DETECTION_FIXED, run_mark_detection_fixed(ctx), |_| None)
}

fn run_mark_detection_fixed(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, VectraQuxError> {
    let ids = id_list(ctx, "Detection IDs")?;
    if ids.is_empty() {
        return Err(ParamError::Missing("Detection IDs".to_string()).into());
    }

    build_client(ctx.params, ctx.transports)?.mark_detections_fixed(&ids)?;
    let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");
    Ok(ActionOutcome::completed(
        format!("Successfully marked the following detections as fixed: {}", joined),
        true,
    ))
}

// ============================================================================
// TAGS / NOTES
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum TagChange {
    Add,
    Remove,
}

pub fn add_tags(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(ADD_TAGS);
    action::conclude(ADD_TAGS, run_update_tags(ctx, TagChange::Add), |_| None)
}

pub fn remove_tags(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(REMOVE_TAGS);
    action::conclude(REMOVE_TAGS, run_update_tags(ctx, TagChange::Remove), |_| None)
}

/// Read-modify-write of the tag set of every listed record. Each record is
/// reported on its own; the action only fails when the input is invalid.
fn run_update_tags(ctx: &mut ActionContext<'_>, change: TagChange) -> Result<ActionOutcome, VectraQuxError> {
    let tags = ctx.param("Tags").mandatory().list()?;
    let ids = id_list(ctx, "Entity IDs")?;
    let kind = ctx
        .param("Entity Type")
        .mandatory()
        .choice(TAGGABLE)?
        .map(|kind| kind.to_lowercase())
        .ok_or_else(|| ParamError::Missing("Entity Type".to_string()))?;
    if tags.is_empty() {
        return Err(ParamError::Missing("Tags".to_string()).into());
    }
    if ids.is_empty() {
        return Err(ParamError::Missing("Entity IDs".to_string()).into());
    }

    let client = build_client(ctx.params, ctx.transports)?;
    let mut rows = Vec::new();
    let mut updated = Vec::new();
    let mut failed = Vec::new();

    for id in &ids {
        let result = client.get_tags(&kind, *id).and_then(|current| {
            let next: Vec<String> = match change {
                TagChange::Add => {
                    let mut next = current;
                    for tag in &tags {
                        if !next.contains(tag) {
                            next.push(tag.clone());
                        }
                    }
                    next
                }
                TagChange::Remove => current.into_iter().filter(|tag| !tags.contains(tag)).collect(),
            };
            client.set_tags(&kind, *id, &next)
        });

        match result {
            Ok(stored) => {
                rows.push(CsvRow::new().col("ID", id).col("Status", "Success").list("Tags", &stored));
                updated.push(id.to_string());
            }
            Err(e) => {
                log::error!("Failed to update tags of {} {}: {}", kind, id, e);
                rows.push(CsvRow::new().col("ID", id).col("Status", "Failure").col("Tags", ""));
                failed.push(id.to_string());
            }
        }
    }

    ctx.output.add_data_table(DataTable::from_rows("Tag Update Status", rows));

    let (done, not_done) = match change {
        TagChange::Add => ("added tags to", "added to"),
        TagChange::Remove => ("removed tags from", "removed from"),
    };
    let mut messages = Vec::new();
    if !updated.is_empty() {
        messages.push(format!("Successfully {} the following {} IDs: {}", done, kind, updated.join(", ")));
    }
    if !failed.is_empty() {
        messages.push(format!("Tags could not be {} the following {} IDs: {}", not_done, kind, failed.join(", ")));
    }
    Ok(ActionOutcome::completed(messages.join("\n"), !updated.is_empty()))
}

pub fn add_note(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(ADD_NOTE);
    let id = ctx.param("Entity ID").string().ok().flatten().unwrap_or_default();
    action::conclude(ADD_NOTE, run_add_note(ctx), |err| match err {
        VectraQuxError::NotFound(_) => Some(format!("Entity with ID {} was not found.", id)),
        _ => None,
    })
}

fn run_add_note(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, VectraQuxError> {
    let id = mandatory_id(ctx, "Entity ID")?;
    let kind = ctx
        .param("Entity Type")
        .mandatory()
        .choice(TAGGABLE)?
        .ok_or_else(|| ParamError::Missing("Entity Type".to_string()))?;
    let note = ctx.param("Note").required()?;
    let collection = format!("{}s", kind.to_lowercase());

    let created = build_client(ctx.params, ctx.transports)?.add_note(&collection, id, &note)?;
    ctx.output.add_result_json(created.to_json());
    Ok(ActionOutcome::completed(
        format!("Successfully added note to the {} with ID {}.", kind.to_lowercase(), id),
        true,
    ))
}

// ============================================================================
// ASSIGNMENTS / OUTCOMES
// ============================================================================

pub fn list_assignments(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(LIST_ASSIGNMENTS);
    action::conclude(LIST_ASSIGNMENTS, run_list_assignments(ctx), |_| None)
}

fn run_list_assignments(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, VectraQuxError> {
    let query = AssignmentQuery {
        account_ids: id_list(ctx, "Account IDs")?,
        host_ids: id_list(ctx, "Host IDs")?,
        assignee_ids: id_list(ctx, "Assignee IDs")?,
        outcome_ids: id_list(ctx, "Outcome IDs")?,
        resolved: ctx.param("Resolved").choice(&["True", "False"])?.map(|v| v == "True"),
        created_after: ctx.param("Created After").string()?,
    };
    let limit = limit(ctx)?;

    let assignments = build_client(ctx.params, ctx.transports)?.list_assignments(&query, Some(limit))?;
    if assignments.is_empty() {
        return Ok(ActionOutcome::completed(
            "No assignments were found for the provided criteria.",
            false,
        ));
    }

    ctx.output.add_result_json(to_json_list(&assignments));
    ctx.output.add_data_table(DataTable::from_items("Assignment Details", &assignments));
    Ok(ActionOutcome::completed(
        format!("Successfully retrieved {} assignment(s).", assignments.len()),
        true,
    ))
}

pub fn assign_entity(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(ASSIGN_ENTITY);
    action::conclude(ASSIGN_ENTITY, run_assign_entity(ctx), |_| None)
}

fn run_assign_entity(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, VectraQuxError> {
    let id = mandatory_id(ctx, "Entity ID")?;
    let entity_type = entity_type(ctx)?;
    let user_id = mandatory_id(ctx, "User ID")?;

    let assignment =
        build_client(ctx.params, ctx.transports)?.assign_entity(entity_type, id, user_id)?;
    ctx.output.add_result_json(assignment.to_json());
    ctx.output.add_data_table(DataTable::from_items(
        "Assignment Details",
        std::slice::from_ref(&assignment),
    ));
    Ok(ActionOutcome::completed(
        format!(
            "Successfully assigned the {} with ID {} to the user with ID {}.",
            entity_type.singular(),
            id,
            user_id
        ),
        true,
    ))
}

pub fn update_assignment(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(UPDATE_ASSIGNMENT);
    action::conclude(UPDATE_ASSIGNMENT, run_update_assignment(ctx), |_| None)
}

/// The assignment to update is the one currently attached to the entity
fn run_update_assignment(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, VectraQuxError> {
    let id = mandatory_id(ctx, "Entity ID")?;
    let entity_type = entity_type(ctx)?;
    let user_id = mandatory_id(ctx, "User ID")?;

    let client = build_client(ctx.params, ctx.transports)?;
    let entity = client.get_entity(entity_type, id)?;
    let assignment_id = entity.assignment_id().ok_or_else(|| {
        VectraQuxError::Validation(format!(
            "The {} with ID {} has no assignment.",
            entity_type.singular(),
            id
        ))
    })?;

    let assignment = client.update_assignment(assignment_id, user_id)?;
    ctx.output.add_result_json(assignment.to_json());
    ctx.output.add_data_table(DataTable::from_items(
        "Updated Assignment",
        std::slice::from_ref(&assignment),
    ));
    Ok(ActionOutcome::completed(
        format!(
            "Successfully updated assignment {} of the {} with ID {} to the user with ID {}.",
            assignment_id,
            entity_type.singular(),
            id,
            user_id
        ),
        true,
    ))
}

pub fn resolve_assignment(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(RESOLVE_ASSIGNMENT);
    action::conclude(RESOLVE_ASSIGNMENT, run_resolve_assignment(ctx), |err| match err {
        VectraQuxError::NotFound(_) => Some("Assignment ID not found.".to_string()),
        _ => None,
    })
}

fn run_resolve_assignment(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, VectraQuxError> {
    let assignment_id = mandatory_id(ctx, "Assignment ID")?;
    let outcome_id = mandatory_id(ctx, "Outcome ID")?;
    let note = ctx.param("Note Title").string()?;
    let triage_as = ctx.param("Triage As").string()?;
    let detection_ids = id_list(ctx, "Detection IDs")?;

    if triage_as.is_some() && detection_ids.is_empty() {
        return Err(VectraQuxError::Validation(
            "\"Detection IDs\" are required when \"Triage As\" is provided.".to_string(),
        ));
    }

    let assignment = build_client(ctx.params, ctx.transports)?.resolve_assignment(
        assignment_id,
        outcome_id,
        note.as_deref(),
        triage_as.as_deref(),
        &detection_ids,
    )?;
    ctx.output.add_result_json(assignment.to_json());
    ctx.output.add_data_table(DataTable::from_items(
        "Resolved Assignment",
        std::slice::from_ref(&assignment),
    ));
    Ok(ActionOutcome::completed(
        format!("Successfully resolved the assignment with ID {}.", assignment_id),
        true,
    ))
}

pub fn list_outcomes(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(LIST_OUTCOMES);
    action::conclude(LIST_OUTCOMES, run_list_outcomes(ctx), |_| None)
}

fn run_list_outcomes(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, VectraQuxError> {
    let limit = limit(ctx)?;

    let outcomes = build_client(ctx.params, ctx.transports)?.list_outcomes(Some(limit))?;
    if outcomes.is_empty() {
        return Ok(ActionOutcome::completed("No outcomes were found.", false));
    }

    ctx.output.add_result_json(to_json_list(&outcomes));
    ctx.output.add_data_table(DataTable::from_items("Outcome Details", &outcomes));
    Ok(ActionOutcome::completed(
        format!("Successfully retrieved {} outcome(s).", outcomes.len()),
        true,
    ))
}

#[cfg(test)]
mod tests;
