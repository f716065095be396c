//! Telegram actions

pub mod connector;

use crate::http::TransportFactory;
use crate::logic::telegram::{ChatPermissions, TelegramClient, TelegramError, INTEGRATION_NAME};
use crate::logic::{to_json_list, RawModel};
use crate::platform::action::{self, error_message};
use crate::platform::{ActionContext, ActionOutcome, DataTable, Param, ParameterSource};

pub const PING: &str = "Ping";
pub const SEND_MESSAGE: &str = "Send Message";
pub const SEND_DOCUMENT: &str = "Send Document";
pub const SEND_PHOTO: &str = "Send Photo";
pub const SEND_LOCATION: &str = "Send Location";
pub const SEND_POLL: &str = "Send Poll";
pub const GET_CHAT_DETAILS: &str = "Get Chat Details";
pub const SET_DEFAULT_CHAT_PERMISSIONS: &str = "Set Default Chat Permissions";
pub const GET_MESSAGES: &str = "Get Messages";

/// Update kinds the "Message Types" parameter accepts
pub const UPDATE_KINDS: &[&str] = &[
    "message",
    "edited_message",
    "channel_post",
    "edited_channel_post",
    "poll",
    "poll_answer",
    "my_chat_member",
    "chat_member",
];

pub(crate) fn build_client(
    params: &dyn ParameterSource,
    transports: &dyn TransportFactory,
) -> Result<TelegramClient, TelegramError> {
    let token = Param::config(params, "API Token").required()?;
    let verify_ssl = Param::config(params, "Verify SSL").default_value(true).boolean()?;
    TelegramClient::new(&token, verify_ssl, transports)
}

fn not_found(err: &TelegramError, what: &str) -> Option<String> {
    match err {
        TelegramError::NotFound(reason) => Some(format!("{} was not found. Reason: {}", what, reason)),
        _ => None,
    }
}

// ============================================================================
// PING
// ============================================================================

pub fn ping(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(PING);
    action::conclude(PING, run_ping(ctx), |err| {
        Some(format!(
            "Failed to connect to the {} server! Error is {}",
            INTEGRATION_NAME, err
        ))
    })
}

fn run_ping(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, TelegramError> {
    let client = build_client(ctx.params, ctx.transports)?;
    let bot = client.test_connectivity()?;
    log::info!("Connected as bot {}", bot.username.as_deref().unwrap_or(&bot.first_name));
    Ok(ActionOutcome::completed(
        format!(
            "Successfully connected to the {} server with the provided connection parameters!",
            INTEGRATION_NAME
        ),
        true,
    ))
}

// ============================================================================
// SEND
// ============================================================================

pub fn send_message(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(SEND_MESSAGE);
    action::conclude(SEND_MESSAGE, run_send_message(ctx), |err| not_found(err, "Chat"))
}

fn run_send_message(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, TelegramError> {
    let chat_id = ctx.param("Chat ID").print().required()?;
    let text = ctx.param("Message").required()?;

    let client = build_client(ctx.params, ctx.transports)?;
    let message = client.send_message(&chat_id, &text)?;

    ctx.output.add_result_json(message);
    Ok(ActionOutcome::completed("The message was sent successfully", true))
}

pub fn send_document(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(SEND_DOCUMENT);
    action::conclude(SEND_DOCUMENT, run_send_document(ctx), |err| not_found(err, "Chat"))
}

fn run_send_document(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, TelegramError> {
    let chat_id = ctx.param("Chat ID").print().required()?;
    let document_url = ctx.param("Document URL").print().required()?;

    let client = build_client(ctx.params, ctx.transports)?;
    let message = client.send_document(&chat_id, &document_url)?;

    ctx.output.add_result_json(message);
    Ok(ActionOutcome::completed("The document was sent successfully", true))
}

pub fn send_photo(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(SEND_PHOTO);
    action::conclude(SEND_PHOTO, run_send_photo(ctx), |err| not_found(err, "Chat"))
}

fn run_send_photo(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, TelegramError> {
    let chat_id = ctx.param("Chat ID").print().required()?;
    let photo_url = ctx.param("Photo URL").print().required()?;

    let client = build_client(ctx.params, ctx.transports)?;
    let message = client.send_photo(&chat_id, &photo_url)?;

    ctx.output.add_result_json(message);
    Ok(ActionOutcome::completed("The photo was sent successfully", true))
}

pub fn send_location(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(SEND_LOCATION);
    action::conclude(SEND_LOCATION, run_send_location(ctx), |err| not_found(err, "Chat"))
}

fn coordinate(ctx: &ActionContext<'_>, name: &'static str, limit: f64) -> Result<f64, TelegramError> {
    let value = ctx
        .param(name)
        .mandatory()
        .float()?
        .ok_or_else(|| crate::platform::ParamError::Missing(name.to_string()))?;
    if !(-limit..=limit).contains(&value) {
        return Err(TelegramError::Validation(format!(
            "Invalid value provided for the parameter \"{}\": it should be between -{} and {}",
            name, limit, limit
        )));
    }
    Ok(value)
}

fn run_send_location(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, TelegramError> {
    let chat_id = ctx.param("Chat ID").print().required()?;
    let latitude = coordinate(ctx, "Latitude", 90.0)?;
    let longitude = coordinate(ctx, "Longitude", 180.0)?;

    let client = build_client(ctx.params, ctx.transports)?;
    let message = client.send_location(&chat_id, latitude, longitude)?;

    ctx.output.add_result_json(message);
    Ok(ActionOutcome::completed("The location was sent successfully", true))
}

pub fn send_poll(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(SEND_POLL);
    action::conclude(SEND_POLL, run_send_poll(ctx), |err| not_found(err, "Chat"))
}

fn run_send_poll(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, TelegramError> {
    let chat_id = ctx.param("Chat ID").print().required()?;
    let question = ctx.param("Question").required()?;
    let options = ctx.param("Options").mandatory().list()?;
    let is_anonymous = ctx.param("Is Anonymous").default_value(true).boolean()?;
    let multiple = ctx.param("Allow Multiple Answers").boolean()?;

    if !(2..=10).contains(&options.len()) {
        return Err(TelegramError::Validation(
            "A poll needs between 2 and 10 distinct options".to_string(),
        ));
    }

    let client = build_client(ctx.params, ctx.transports)?;
    let message = client.send_poll(&chat_id, &question, &options, is_anonymous, multiple)?;

    ctx.output.add_result_json(message);
    Ok(ActionOutcome::completed("The poll was sent successfully", true))
}

// ============================================================================
// CHATS
// ============================================================================

pub fn get_chat_details(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(GET_CHAT_DETAILS);
    action::conclude(GET_CHAT_DETAILS, run_get_chat_details(ctx), |err| not_found(err, "Chat"))
}

fn run_get_chat_details(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, TelegramError> {
    let chat_id = ctx.param("Chat ID").print().required()?;

    let client = build_client(ctx.params, ctx.transports)?;
    let chat = client.get_chat(&chat_id)?;

    ctx.output.add_result_json(chat.to_json());
    ctx.output
        .add_data_table(DataTable::from_items("Chat Details", std::slice::from_ref(&chat)));
    if let Some(link) = &chat.invite_link {
        ctx.output.add_link("Chat invite link", link);
    }

    Ok(ActionOutcome::completed(
        format!("Successfully fetched details of chat {}", chat.display_name()),
        true,
    ))
}

pub fn set_default_chat_permissions(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(SET_DEFAULT_CHAT_PERMISSIONS);
    action::conclude(
        SET_DEFAULT_CHAT_PERMISSIONS,
        run_set_default_chat_permissions(ctx),
        |err| not_found(err, "Chat"),
    )
}

fn run_set_default_chat_permissions(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, TelegramError> {
    let chat_id = ctx.param("Chat ID").print().required()?;
    let permissions = ChatPermissions {
        can_send_messages: ctx.param("Can Send Messages").boolean()?,
        can_send_polls: ctx.param("Can Send Polls").boolean()?,
        can_send_other_messages: ctx.param("Can Send Other Messages").boolean()?,
        can_add_web_page_previews: ctx.param("Can Add Web Page Previews").boolean()?,
        can_change_info: ctx.param("Can Change Info").boolean()?,
        can_invite_users: ctx.param("Can Invite Users").boolean()?,
        can_pin_messages: ctx.param("Can Pin Messages").boolean()?,
    };

    let client = build_client(ctx.params, ctx.transports)?;
    if !client.set_chat_permissions(&chat_id, &permissions)? {
        return Ok(ActionOutcome::failed(error_message(
            SET_DEFAULT_CHAT_PERMISSIONS,
            "Telegram did not accept the new permissions",
        )));
    }

    Ok(ActionOutcome::completed(
        format!("The default permissions of chat {} were updated successfully", chat_id),
        true,
    ))
}

// ============================================================================
// MESSAGES
// ============================================================================

pub fn get_messages(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    action::started(GET_MESSAGES);
    action::conclude(GET_MESSAGES, run_get_messages(ctx), |_| None)
}

fn run_get_messages(ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, TelegramError> {
    let offset = ctx.param("Last Message ID").non_negative_integer()?;
    let limit = ctx.param("Limit").default_value(100).integer_in(1, 100)?.unwrap_or(100) as usize;
    let kinds = ctx.param("Message Types").list()?;

    if let Some(unknown) = kinds.iter().find(|kind| !UPDATE_KINDS.contains(&kind.as_str())) {
        return Err(TelegramError::Validation(format!(
            "Invalid value provided for the parameter \"Message Types\": \"{}\". Possible values are: {}",
            unknown,
            UPDATE_KINDS.join(", ")
        )));
    }

    let client = build_client(ctx.params, ctx.transports)?;
    let updates = client.get_updates(offset.map(|offset| offset as i64), limit, &kinds)?;

    if updates.is_empty() {
        return Ok(ActionOutcome::completed("No new messages were found.", false));
    }

    ctx.output.add_result_json(to_json_list(&updates));
    ctx.output.add_data_table(DataTable::from_items("Messages", &updates));
    Ok(ActionOutcome::completed(
        format!("Successfully retrieved {} messages", updates.len()),
        true,
    ))
}
