//! Infoblox Threat Defense actions

pub mod connector;

use crate::http::TransportFactory;
use crate::logic::infoblox::client::{DEFAULT_API_ROOT, MAX_LIMIT};
use crate::logic::infoblox::{InfobloxClient, InfobloxError, ListQuery, INTEGRATION_NAME};
use crate::logic::{to_json_list, RawModel};
use crate::platform::action;
use crate::platform::{ActionContext, ActionOutcome, DataTable, Param, ParamError, ParameterSource};

pub const PING: &str = "Ping";
pub const GET_CUSTOM_LIST: &str = "Get Custom List";
pub const CREATE_CUSTOM_LIST: &str = "Create Custom List";
pub const UPDATE_CUSTOM_LIST_ITEMS: &str = "Update Custom List Items";
pub const REMOVE_CUSTOM_LIST: &str = "Remove Custom List";
pub const GET_SECURITY_POLICIES: &str = "Get Security Policies";
pub const HOST_LOOKUP: &str = "Host Lookup";

const CUSTOM_LIST_TABLE: &str = "Custom List Details";
const DEFAULT_LIMIT: i64 = 100;

pub(crate) fn build_client(
    params: &dyn ParameterSource,
    transports: &dyn TransportFactory,
) -> Result<InfobloxClient, InfobloxError> {
    let api_root = Param::config(params, "API Root")
        .default_value(DEFAULT_API_ROOT)
        .print()
        .required()?;
    let api_key = Param::config(params, "API Key").required()?;
    let verify_ssl = Param::config(params, "Verify SSL").default_value(true).boolean()?;
    InfobloxClient::new(&api_root, &api_key, verify_ssl, transports)
}

/// "Offset" and "Limit" shared by the list actions
fn paging(ctx: &ActionContext<'_>) -> Result<ListQuery, ParamError> {
    let offset = ctx.param("Offset").default_value(0).non_negative_integer()?.unwrap_or(0);
    let limit = ctx
        .param("Limit")
        .default_value(DEFAULT_LIMIT)
        .integer_in(1, MAX_LIMIT)?
        .unwrap_or(DEFAULT_LIMIT);
    Ok(ListQuery::new(offset as usize, limit as usize))
}

fn custom_list_id(ctx: &ActionContext<'_>) -> Result<i64, ParamError> {
    let id = ctx.param("Custom List ID").mandatory().positive_integer()?;
    id.map(|id| id as i64)
        .ok_or_else(|| ParamError::Missing("Custom List ID".to_string()))
}

fn list_not_found(err: &InfobloxError, id: Option<i64>) -> Option<String> {
    match (err, id) {
        (InfobloxError::NotFound(_), Some(id)) => {
            Some(format!("Custom list with ID {} was not found.", id))
        }
        _ => None,
    }
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

fn run_ping(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, InfobloxError> {
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
// CUSTOM LISTS
// ============================================================================

pub fn get_custom_list(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(GET_CUSTOM_LIST);
    let id = ctx.param("Custom List ID").positive_integer().ok().flatten();
    action::conclude(GET_CUSTOM_LIST, run_get_custom_list(ctx), |err| {
        list_not_found(err, id.map(|id| id as i64))
    })
}

fn run_get_custom_list(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, InfobloxError> {
    let id = ctx.param("Custom List ID").print().positive_integer()?;
    let name = ctx.param("Custom List Name").print().string()?;
    let mut query = paging(ctx)?;
    query.tag_filter = ctx.param("Tag Filter").string()?;
    query.tag_sort = ctx.param("Tag Sort Filter").string()?;
    query.filter = name.map(|name| ListQuery::equals("name", &name));

    let client = build_client(ctx.params, ctx.transports)?;
    let lists = match id {
        Some(id) => vec![client.get_custom_list(id as i64)?],
        None => client.get_custom_lists(&query)?,
    };

    if lists.is_empty() {
        return Ok(ActionOutcome::completed("No custom lists found.", false));
    }

    ctx.output.add_result_json(to_json_list(&lists));
    ctx.output.add_data_table(DataTable::from_items(CUSTOM_LIST_TABLE, &lists));
    Ok(ActionOutcome::completed(
        format!("Successfully retrieved {} custom list(s).", lists.len()),
        true,
    ))
}

pub fn create_custom_list(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(CREATE_CUSTOM_LIST);
    action::conclude(CREATE_CUSTOM_LIST, run_create_custom_list(ctx), |err| match err {
        InfobloxError::BadRequest(reason) => Some(format!("Failed to create custom list. Reason: {}", reason)),
        _ => None,
    })
}

fn run_create_custom_list(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, InfobloxError> {
    let name = ctx.param("Name").print().required()?;
    let list_type = ctx.param("Type").default_value("custom_list").required()?;
    let items = ctx.param("Items").list()?;
    let description = ctx.param("Description").string()?;
    let confidence = ctx.param("Confidence Level").choice(&["High", "Medium", "Low"])?;
    let threat = ctx.param("Threat Level").choice(&["Info", "Low", "Medium", "High"])?;
    let tags = ctx.param("Tags").json()?;

    if let Some(tags) = &tags {
        if !tags.is_object() {
            return Err(ParamError::invalid("Tags", "it should be a JSON object").into());
        }
    }

    let client = build_client(ctx.params, ctx.transports)?;
    let list = client.create_custom_list(
        &name,
        &list_type,
        &items,
        description.as_deref(),
        confidence.as_deref(),
        threat.as_deref(),
        tags,
    )?;

    ctx.output.add_result_json(list.to_json());
    ctx.output
        .add_data_table(DataTable::from_items(CUSTOM_LIST_TABLE, std::slice::from_ref(&list)));
    Ok(ActionOutcome::completed(
        format!("Successfully created custom list \"{}\" with ID {}.", list.name, list.id),
        true,
    ))
}

pub fn update_custom_list_items(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(UPDATE_CUSTOM_LIST_ITEMS);
    let id = ctx.param("Custom List ID").positive_integer().ok().flatten();
    action::conclude(UPDATE_CUSTOM_LIST_ITEMS, run_update_custom_list_items(ctx), |err| {
        list_not_found(err, id.map(|id| id as i64))
    })
}

fn run_update_custom_list_items(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, InfobloxError> {
    let id = custom_list_id(ctx)?;
    let items = ctx.param("Items").mandatory().list()?;
    let operation = ctx
        .param("Action")
        .default_value("Add")
        .choice(&["Add", "Remove"])?
        .unwrap_or_else(|| "Add".to_string());

    if items.is_empty() {
        return Err(ParamError::Missing("Items".to_string()).into());
    }

    let client = build_client(ctx.params, ctx.transports)?;
    if operation == "Add" {
        client.add_custom_list_items(id, &items)?;
    } else {
        client.remove_custom_list_items(id, &items)?;
    }

    let list = client.get_custom_list(id)?;
    ctx.output.add_result_json(list.to_json());
    ctx.output
        .add_data_table(DataTable::from_items(CUSTOM_LIST_TABLE, std::slice::from_ref(&list)));

    let message = if operation == "Add" {
        format!("Successfully added items to custom list with ID {}.", id)
    } else {
        format!("Successfully removed items from custom list with ID {}.", id)
    };
    Ok(ActionOutcome::completed(message, true))
}

pub fn remove_custom_list(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(REMOVE_CUSTOM_LIST);
    let id = ctx.param("Custom List ID").positive_integer().ok().flatten();
    action::conclude(REMOVE_CUSTOM_LIST, run_remove_custom_list(ctx), |err| {
        list_not_found(err, id.map(|id| id as i64))
    })
}

fn run_remove_custom_list(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, InfobloxError> {
    let id = custom_list_id(ctx)?;
    build_client(ctx.params, ctx.transports)?.remove_custom_list(id)?;
    Ok(ActionOutcome::completed(
        format!("Successfully removed custom list with ID {}.", id),
        true,
    ))
}

// ============================================================================
// POLICIES / HOSTS
// ============================================================================

pub fn get_security_policies(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(GET_SECURITY_POLICIES);
    action::conclude(GET_SECURITY_POLICIES, run_get_security_policies(ctx), |_| None)
}

fn run_get_security_policies(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, InfobloxError> {
    let mut query = paging(ctx)?;
    query.filter = ctx.param("Security Policy Filter").print().string()?;
    query.tag_filter = ctx.param("Tag Filter").string()?;
    query.tag_sort = ctx.param("Tag Sort Filter").string()?;

    let policies = build_client(ctx.params, ctx.transports)?.get_security_policies(&query)?;
    if policies.is_empty() {
        return Ok(ActionOutcome::completed("No security policies found.", false));
    }

    ctx.output.add_result_json(to_json_list(&policies));
    ctx.output.add_data_table(DataTable::from_items("Security Policies", &policies));
    Ok(ActionOutcome::completed(
        format!("Successfully retrieved {} security policies.", policies.len()),
        true,
    ))
}

pub fn host_lookup(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(HOST_LOOKUP);
    action::conclude(HOST_LOOKUP, run_host_lookup(ctx), |_| None)
}

fn run_host_lookup(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, InfobloxError> {
    let mut query = paging(ctx)?;
    query.filter = ctx.param("Host Filter").print().string()?;
    query.tag_filter = ctx.param("Tag Filter").string()?;
    query.order_by = ctx.param("Order By").string()?;

    let hosts = build_client(ctx.params, ctx.transports)?.host_lookup(&query)?;
    if hosts.is_empty() {
        return Ok(ActionOutcome::completed("No hosts found.", false));
    }

    ctx.output.add_result_json(to_json_list(&hosts));
    ctx.output.add_data_table(DataTable::from_items("Hosts", &hosts));
    Ok(ActionOutcome::completed(
        format!("Successfully retrieved {} host(s).", hosts.len()),
        true,
    ))
}

#[cfg(test)]
mod tests;
