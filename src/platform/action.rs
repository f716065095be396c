//! Action entry point plumbing

use std::fmt::Display;

use super::params::{Param, ParameterSource};
use super::result::{ActionOutcome, ResultSink};
use crate::http::TransportFactory;

/// Collaborators handed to an action for one invocation
pub struct ActionContext<'a> {
    pub params: &'a dyn ParameterSource,
    pub output: &'a mut dyn ResultSink,
    pub transports: &'a dyn TransportFactory,
    /// False when the platform re-invokes an async action
    pub is_first_run: bool,
    /// State returned by the previous run of an async action
    pub additional_data: Option<String>,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        params: &'a dyn ParameterSource,
        output: &'a mut dyn ResultSink,
        transports: &'a dyn TransportFactory,
    ) -> Self {
        Self {
            params,
            output,
            transports,
            is_first_run: true,
            additional_data: None,
        }
    }

    pub fn config(&self, name: &'a str) -> Param<'a> {
        Param::config(self.params, name)
    }

    pub fn param(&self, name: &'a str) -> Param<'a> {
        Param::action(self.params, name)
    }
}

/// "Error executing action "X". Reason: ..."
pub fn error_message(action_name: &str, reason: impl Display) -> String {
    format!("Error executing action \"{}\". Reason: {}", action_name, reason)
}

/// Single exit of every action: errors become a FAILED outcome.
/// `friendly` may replace the generic template for errors the action knows.
pub fn conclude<E, F>(action_name: &str, result: Result<ActionOutcome, E>, friendly: F) -> ActionOutcome
where
    E: Display,
    F: FnOnce(&E) -> Option<String>,
{
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            log::error!("{}", error_message(action_name, &err));
            let message = friendly(&err).unwrap_or_else(|| error_message(action_name, &err));
            ActionOutcome::failed(message)
        }
    };

    log::info!("----------------- Main - Finished -----------------");
    log::info!(
        "Status: {}, Result Value: {}, Output Message: {}",
        outcome.execution_state.as_str(),
        outcome.result_value,
        outcome.output_message
    );
    outcome
}

/// Log the start banner of an action
pub fn started(action_name: &str) {
    log::info!("----------------- Main - Started: {} -----------------", action_name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::result::ExecutionState;

    #[test]
    fn test_conclude_uses_template() {
        let outcome = conclude::<String, _>("Ping", Err("timeout".to_string()), |_| None);
        assert_eq!(outcome.execution_state, ExecutionState::Failed);
        assert_eq!(outcome.output_message, "Error executing action \"Ping\". Reason: timeout");
    }

    #[test]
    fn test_conclude_prefers_friendly_message() {
        let outcome = conclude::<String, _>("Get", Err("404".to_string()), |e| {
            (e == "404").then(|| "Item not found.".to_string())
        });
        assert_eq!(outcome.output_message, "Item not found.");
    }

    #[test]
    fn test_conclude_passes_success() {
        let outcome = conclude::<String, _>("Ping", Ok(ActionOutcome::completed("ok", true)), |_| None);
        assert!(outcome.is_success());
    }
}
