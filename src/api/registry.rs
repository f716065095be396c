//! Script registry
//!
//! Maps the platform's "<integration>" / "<script>" names to entry points.
//! Names match ignoring case, spaces and punctuation, so "vectra-qux" and
//! "Vectra QUX" are the same integration.

use super::{arcanna, infoblox, recorded_future, telegram, vectra_qux};
use crate::platform::{ActionContext, ActionOutcome, ConnectorContext, ConnectorError, ConnectorRun};

pub type ActionFn = fn(&mut ActionContext<'_>) -> ActionOutcome;
pub type ConnectorFn = fn(&mut ConnectorContext<'_>) -> Result<ConnectorRun, ConnectorError>;

#[derive(Clone, Copy)]
pub enum Script {
    Action(ActionFn),
    Connector(ConnectorFn),
}

pub struct Registration {
    pub integration: &'static str,
    pub name: &'static str,
    pub script: Script,
}

const fn action(integration: &'static str, name: &'static str, entry: ActionFn) -> Registration {
    Registration { integration, name, script: Script::Action(entry) }
}

const fn connector(integration: &'static str, name: &'static str, entry: ConnectorFn) -> Registration {
    Registration { integration, name, script: Script::Connector(entry) }
}

const ARCANNA: &str = crate::logic::arcanna::INTEGRATION_NAME;
const INFOBLOX: &str = crate::logic::infoblox::INTEGRATION_NAME;
const RECORDED_FUTURE: &str = crate::logic::recorded_future::INTEGRATION_NAME;
const TELEGRAM: &str = crate::logic::telegram::INTEGRATION_NAME;
const VECTRA_QUX: &str = crate::logic::vectra_qux::INTEGRATION_NAME;

pub static REGISTRY: &[Registration] = &[
    // Arcanna AI
    action(ARCANNA, arcanna::PING, arcanna::ping),
    action(ARCANNA, arcanna::GET_JOBS, arcanna::get_jobs),
    action(ARCANNA, arcanna::GET_JOB_BY_NAME, arcanna::get_job_by_name),
    action(ARCANNA, arcanna::SEND_EVENT, arcanna::send_event),
    action(ARCANNA, arcanna::GET_AI_DECISION, arcanna::get_ai_decision),
    action(ARCANNA, arcanna::SEND_ANALYST_FEEDBACK, arcanna::send_analyst_feedback),
    action(ARCANNA, arcanna::TRIGGER_JOB_TRAINING, arcanna::trigger_job_training),
    // Infoblox Threat Defense
    action(INFOBLOX, infoblox::PING, infoblox::ping),
    action(INFOBLOX, infoblox::GET_CUSTOM_LIST, infoblox::get_custom_list),
    action(INFOBLOX, infoblox::CREATE_CUSTOM_LIST, infoblox::create_custom_list),
    action(INFOBLOX, infoblox::UPDATE_CUSTOM_LIST_ITEMS, infoblox::update_custom_list_items),
    action(INFOBLOX, infoblox::REMOVE_CUSTOM_LIST, infoblox::remove_custom_list),
    action(INFOBLOX, infoblox::GET_SECURITY_POLICIES, infoblox::get_security_policies),
    action(INFOBLOX, infoblox::HOST_LOOKUP, infoblox::host_lookup),
    connector(INFOBLOX, infoblox::connector::CONNECTOR_NAME, infoblox::connector::run),
    // Recorded Future
    action(RECORDED_FUTURE, recorded_future::PING, recorded_future::ping),
    action(RECORDED_FUTURE, recorded_future::ENRICH_IOC, recorded_future::enrich_ioc),
    action(RECORDED_FUTURE, recorded_future::GET_ALERT_DETAILS, recorded_future::get_alert_details),
    action(RECORDED_FUTURE, recorded_future::UPDATE_ALERT, recorded_future::update_alert),
    action(
        RECORDED_FUTURE,
        recorded_future::GET_PLAYBOOK_ALERT_DETAILS,
        recorded_future::get_playbook_alert_details,
    ),
    action(RECORDED_FUTURE, recorded_future::UPDATE_PLAYBOOK_ALERT, recorded_future::update_playbook_alert),
    action(RECORDED_FUTURE, recorded_future::ADD_ANALYST_NOTE, recorded_future::add_analyst_note),
    action(RECORDED_FUTURE, recorded_future::DETONATE_URL, recorded_future::detonate_url),
    connector(RECORDED_FUTURE, recorded_future::connector::CONNECTOR_NAME, recorded_future::connector::run),
    // Telegram
    action(TELEGRAM, telegram::PING, telegram::ping),
    action(TELEGRAM, telegram::SEND_MESSAGE, telegram::send_message),
    action(TELEGRAM, telegram::SEND_DOCUMENT, telegram::send_document),
    action(TELEGRAM, telegram::SEND_PHOTO, telegram::send_photo),
    action(TELEGRAM, telegram::SEND_LOCATION, telegram::send_location),
    action(TELEGRAM, telegram::SEND_POLL, telegram::send_poll),
    action(TELEGRAM, telegram::GET_CHAT_DETAILS, telegram::get_chat_details),
    action(TELEGRAM, telegram::SET_DEFAULT_CHAT_PERMISSIONS, telegram::set_default_chat_permissions),
    action(TELEGRAM, telegram::GET_MESSAGES, telegram::get_messages),
    connector(TELEGRAM, telegram::connector::CONNECTOR_NAME, telegram::connector::run),
    // Vectra QUX
    action(VECTRA_QUX, vectra_qux::PING, vectra_qux::ping),
    action(VECTRA_QUX, vectra_qux::DESCRIBE_ENTITY, vectra_qux::describe_entity),
    action(VECTRA_QUX, vectra_qux::DESCRIBE_DETECTION, vectra_qux::describe_detection),
    action(VECTRA_QUX, vectra_qux::LIST_ENTITIES, vectra_qux::list_entities),
    action(VECTRA_QUX, vectra_qux::ADD_TAGS, vectra_qux::add_tags),
    action(VECTRA_QUX, vectra_qux::REMOVE_TAGS, vectra_qux::remove_tags),
    action(VECTRA_QUX, vectra_qux::ADD_NOTE, vectra_qux::add_note),
    action(VECTRA_QUX, vectra_qux::LIST_ASSIGNMENTS, vectra_qux::list_assignments),
    action(VECTRA_QUX, vectra_qux::ASSIGN_ENTITY, vectra_qux::assign_entity),
    action(VECTRA_QUX, vectra_qux::UPDATE_ASSIGNMENT, vectra_qux::update_assignment),
    action(VECTRA_QUX, vectra_qux::RESOLVE_ASSIGNMENT, vectra_qux::resolve_assignment),
    action(VECTRA_QUX, vectra_qux::MARK_DETECTION_FIXED, vectra_qux::mark_detection_fixed),
    action(VECTRA_QUX, vectra_qux::LIST_OUTCOMES, vectra_qux::list_outcomes),
    action(VECTRA_QUX, vectra_qux::DOWNLOAD_PCAP, vectra_qux::download_pcap),
    connector(VECTRA_QUX, vectra_qux::connector::CONNECTOR_NAME, vectra_qux::connector::run),
];

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn find(integration: &str, name: &str) -> Option<&'static Registration> {
    let integration = normalize(integration);
    let name = normalize(name);
    REGISTRY
        .iter()
        .find(|entry| normalize(entry.integration) == integration && normalize(entry.name) == name)
}

/// Scripts of one integration, for `--list`
pub fn scripts_of(integration: &str) -> Vec<&'static Registration> {
    let integration = normalize(integration);
    REGISTRY
        .iter()
        .filter(|entry| normalize(entry.integration) == integration)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_lookup_ignores_case_and_punctuation() {
        let entry = find("vectra-qux", "resolve_assignment").unwrap();
        assert_eq!(entry.name, "Resolve Assignment");
        assert!(matches!(entry.script, Script::Action(_)));

        let entry = find("Infoblox Threat Defense", "dns security events connector").unwrap();
        assert!(matches!(entry.script, Script::Connector(_)));

        assert!(find("telegram", "delete everything").is_none());
    }

    #[test]
    fn test_names_are_unique() {
        let mut seen = HashSet::new();
        for entry in REGISTRY {
            assert!(
                seen.insert((normalize(entry.integration), normalize(entry.name))),
                "duplicate registration {} / {}",
                entry.integration,
                entry.name
            );
        }
        assert_eq!(scripts_of("telegram").len(), 10);
    }
}
