//! Parameter extraction
//!
//! Scripts receive configuration (integration instance) and action parameters
//! as loosely typed values. Every read goes through [`Param`], which applies
//! mandatory/default semantics and the common validators before any vendor
//! call is made.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("Missing mandatory parameter \"{0}\"")]
    Missing(String),

    #[error("Invalid value provided for the parameter \"{name}\": {reason}")]
    Invalid { name: String, reason: String },
}

impl ParamError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ParamError::Invalid { name: name.to_string(), reason: reason.into() }
    }
}

/// Where a script reads its inputs from
pub trait ParameterSource {
    fn configuration(&self, name: &str) -> Option<String>;
    fn action(&self, name: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Configuration,
    Action,
}

// ============================================================================
// INVOCATION DOCUMENT
// ============================================================================

/// Parameters as delivered by the platform for one invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationParams {
    #[serde(default)]
    pub configuration: HashMap<String, Value>,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

impl InvocationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.configuration.insert(name.to_string(), value.into());
        self
    }

    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

impl ParameterSource for InvocationParams {
    fn configuration(&self, name: &str) -> Option<String> {
        self.configuration.get(name).and_then(value_to_string)
    }

    fn action(&self, name: &str) -> Option<String> {
        self.parameters.get(name).and_then(value_to_string)
    }
}

/// Full invocation: parameters plus async-action and connector bookkeeping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Invocation {
    #[serde(flatten)]
    pub params: InvocationParams,
    /// State handed back by the previous run of an async action
    #[serde(default)]
    pub additional_data: Option<String>,
    /// Connector identity used to key persisted context
    #[serde(default)]
    pub context_identifier: Option<String>,
}

// ============================================================================
// TYPED EXTRACTION
// ============================================================================

/// A single parameter read
pub struct Param<'a> {
    source: &'a dyn ParameterSource,
    scope: Scope,
    name: &'a str,
    mandatory: bool,
    default: Option<String>,
    print_value: bool,
}

impl<'a> Param<'a> {
    pub fn new(source: &'a dyn ParameterSource, scope: Scope, name: &'a str) -> Self {
        Self {
            source,
            scope,
            name,
            mandatory: false,
            default: None,
            print_value: crate::constants::is_param_logging_enabled(),
        }
    }

    pub fn config(source: &'a dyn ParameterSource, name: &'a str) -> Self {
        Self::new(source, Scope::Configuration, name)
    }

    pub fn action(source: &'a dyn ParameterSource, name: &'a str) -> Self {
        Self::new(source, Scope::Action, name)
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn default_value(mut self, value: impl ToString) -> Self {
        self.default = Some(value.to_string());
        self
    }

    /// Print the value in the log (never for secrets)
    pub fn print(mut self) -> Self {
        self.print_value = true;
        self
    }

    /// Raw read: blank strings count as absent, then the default applies
    fn raw(&self) -> Result<Option<String>, ParamError> {
        let provided = match self.scope {
            Scope::Configuration => self.source.configuration(self.name),
            Scope::Action => self.source.action(self.name),
        }
        .filter(|value| !value.trim().is_empty());

        let value = provided.or_else(|| self.default.clone());

        if self.print_value {
            log::info!("{}: {}", self.name, value.as_deref().unwrap_or("<empty>"));
        }

        match value {
            None if self.mandatory => Err(ParamError::Missing(self.name.to_string())),
            value => Ok(value),
        }
    }

    /// Optional string, trimmed
    pub fn string(self) -> Result<Option<String>, ParamError> {
        Ok(self.raw()?.map(|value| value.trim().to_string()))
    }

    /// Mandatory string
    pub fn required(self) -> Result<String, ParamError> {
        let name = self.name.to_string();
        self.mandatory().string()?.ok_or(ParamError::Missing(name))
    }

    /// Boolean; absent means the default or false
    pub fn boolean(self) -> Result<bool, ParamError> {
        let name = self.name;
        match self.raw()? {
            None => Ok(false),
            Some(value) => match value.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ParamError::invalid(name, "it should be a boolean value")),
            },
        }
    }

    pub fn integer(self) -> Result<Option<i64>, ParamError> {
        let name = self.name;
        self.raw()?
            .map(|value| {
                value
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ParamError::invalid(name, "it should be an integer"))
            })
            .transpose()
    }

    /// Integer greater than zero
    pub fn positive_integer(self) -> Result<Option<u64>, ParamError> {
        let name = self.name;
        match self.integer()? {
            Some(value) if value <= 0 => {
                Err(ParamError::invalid(name, "it should be a positive number"))
            }
            value => Ok(value.map(|v| v as u64)),
        }
    }

    /// Integer zero or greater
    pub fn non_negative_integer(self) -> Result<Option<u64>, ParamError> {
        let name = self.name;
        match self.integer()? {
            Some(value) if value < 0 => {
                Err(ParamError::invalid(name, "it should be a non-negative number"))
            }
            value => Ok(value.map(|v| v as u64)),
        }
    }

    /// Integer inside an inclusive range
    pub fn integer_in(self, min: i64, max: i64) -> Result<Option<i64>, ParamError> {
        let name = self.name;
        match self.integer()? {
            Some(value) if value < min || value > max => Err(ParamError::invalid(
                name,
                format!("it should be in range from {} to {}", min, max),
            )),
            value => Ok(value),
        }
    }

    pub fn float(self) -> Result<Option<f64>, ParamError> {
        let name = self.name;
        self.raw()?
            .map(|value| {
                value
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| ParamError::invalid(name, "it should be a number"))
            })
            .transpose()
    }

    /// One of a fixed set of values, matched case-insensitively; returns the canonical spelling
    pub fn choice(self, options: &[&str]) -> Result<Option<String>, ParamError> {
        let name = self.name;
        match self.string()? {
            None => Ok(None),
            Some(value) => options
                .iter()
                .find(|option| option.eq_ignore_ascii_case(&value))
                .map(|option| Some(option.to_string()))
                .ok_or_else(|| {
                    ParamError::invalid(
                        name,
                        format!("possible values are: {}", options.join(", ")),
                    )
                }),
        }
    }

    /// Comma separated list, blanks dropped, duplicates removed (order kept)
    pub fn list(self) -> Result<Vec<String>, ParamError> {
        Ok(self.string()?.map(|value| split_list(&value)).unwrap_or_default())
    }

    /// JSON object or array
    pub fn json(self) -> Result<Option<Value>, ParamError> {
        let name = self.name;
        match self.string()? {
            None => Ok(None),
            Some(value) => serde_json::from_str::<Value>(&value)
                .map(Some)
                .map_err(|_| ParamError::invalid(name, "it should be a valid JSON")),
        }
    }
}

/// Split a comma separated value
pub fn split_list(value: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in value.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> InvocationParams {
        InvocationParams::new()
            .with_config("API Root", "https://api.example.com")
            .with_config("Verify SSL", true)
            .with_param("Limit", "25")
            .with_param("Negative", "-3")
            .with_param("Zero", 0)
            .with_param("Text", "abc")
            .with_param("Blank", "   ")
            .with_param("Entities", "a, b,,a ,c")
            .with_param("Kind", "host")
            .with_param("Payload", "{\"k\": 1}")
    }

    #[test]
    fn test_missing_mandatory() {
        let src = source();
        let err = Param::action(&src, "Chat ID").required().unwrap_err();
        assert_eq!(err, ParamError::Missing("Chat ID".to_string()));
        assert_eq!(err.to_string(), "Missing mandatory parameter \"Chat ID\"");
    }

    #[test]
    fn test_blank_value_uses_default() {
        let src = source();
        let value = Param::action(&src, "Blank").default_value("fallback").string().unwrap();
        assert_eq!(value.as_deref(), Some("fallback"));
        assert!(Param::action(&src, "Blank").mandatory().string().is_err());
    }

    #[test]
    fn test_boolean_from_json_bool() {
        let src = source();
        assert!(Param::config(&src, "Verify SSL").boolean().unwrap());
        assert!(!Param::config(&src, "Missing").boolean().unwrap());
        assert!(Param::config(&src, "Missing").default_value(true).boolean().unwrap());
        assert!(Param::action(&src, "Text").boolean().is_err());
    }

    #[test]
    fn test_integer_validators() {
        let src = source();
        assert_eq!(Param::action(&src, "Limit").positive_integer().unwrap(), Some(25));
        assert!(Param::action(&src, "Text").integer().is_err());
        assert!(Param::action(&src, "Negative").positive_integer().is_err());
        assert!(Param::action(&src, "Negative").non_negative_integer().is_err());
        assert!(Param::action(&src, "Zero").positive_integer().is_err());
        assert_eq!(Param::action(&src, "Zero").non_negative_integer().unwrap(), Some(0));
        assert!(Param::action(&src, "Limit").integer_in(1, 10).is_err());
        assert_eq!(Param::action(&src, "Absent").positive_integer().unwrap(), None);
    }

    #[test]
    fn test_choice_returns_canonical() {
        let src = source();
        let kind = Param::action(&src, "Kind").choice(&["Host", "Account"]).unwrap();
        assert_eq!(kind.as_deref(), Some("Host"));
        let err = Param::action(&src, "Text").choice(&["Host", "Account"]).unwrap_err();
        assert!(err.to_string().contains("Host, Account"));
    }

    #[test]
    fn test_list_and_json() {
        let src = source();
        assert_eq!(Param::action(&src, "Entities").list().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(Param::action(&src, "Payload").json().unwrap(), Some(json!({"k": 1})));
        assert!(Param::action(&src, "Text").json().is_err());
    }

    #[test]
    fn test_invocation_document_parses() {
        let doc = json!({
            "configuration": {"API Key": "k"},
            "parameters": {"Limit": 5},
            "additional_data": "{\"pending\": []}"
        });
        let invocation: Invocation = serde_json::from_value(doc).unwrap();
        assert_eq!(invocation.params.configuration("API Key").as_deref(), Some("k"));
        assert_eq!(invocation.params.action("Limit").as_deref(), Some("5"));
        assert!(invocation.additional_data.is_some());
        assert!(invocation.context_identifier.is_none());
    }
}
