//! Alert model handed to the platform's case pipeline

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Platform priority scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Informative,
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn value(&self) -> i32 {
        match self {
            Priority::Informative => -1,
            Priority::Low => 40,
            Priority::Medium => 60,
            Priority::High => 80,
            Priority::Critical => 100,
        }
    }

    /// Parse a severity label such as "High" or "informational"
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "info" | "informative" | "informational" => Some(Priority::Informative),
            "low" => Some(Priority::Low),
            "medium" | "moderate" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "critical" => Some(Priority::Critical),
            _ => None,
        }
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.value())
    }
}

pub type Event = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertInfo {
    pub display_id: String,
    pub ticket_id: String,
    pub name: String,
    pub rule_generator: String,
    pub device_vendor: String,
    pub device_product: String,
    pub priority: Priority,
    /// Unix milliseconds
    pub start_time: i64,
    /// Unix milliseconds
    pub end_time: i64,
    pub environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_grouping_identifier: Option<String>,
    pub extensions: BTreeMap<String, String>,
    pub events: Vec<Event>,
}

impl AlertInfo {
    pub fn new(id: &str, name: &str, vendor: &str, product: &str) -> Self {
        Self {
            display_id: id.to_string(),
            ticket_id: id.to_string(),
            name: name.to_string(),
            rule_generator: name.to_string(),
            device_vendor: vendor.to_string(),
            device_product: product.to_string(),
            priority: Priority::Medium,
            start_time: 0,
            end_time: 0,
            environment: String::new(),
            source_grouping_identifier: None,
            extensions: BTreeMap::new(),
            events: Vec::new(),
        }
    }
}

// ============================================================================
// FLATTENING
// ============================================================================

/// Flatten nested JSON into `parent_child` keys; arrays use the index as key
pub fn flatten_json(value: &Value) -> Event {
    let mut flat = Event::new();
    flatten_into(&mut flat, None, value);
    flat
}

fn flatten_into(flat: &mut Event, prefix: Option<&str>, value: &Value) {
    let key_for = |child: &str| match prefix {
        Some(prefix) => format!("{}_{}", prefix, child),
        None => child.to_string(),
    };

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(flat, Some(&key_for(key)), child);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(flat, Some(&key_for(&index.to_string())), child);
            }
        }
        Value::Null => {
            if let Some(prefix) = prefix {
                flat.insert(prefix.to_string(), String::new());
            }
        }
        Value::String(s) => {
            flat.insert(prefix.unwrap_or("value").to_string(), s.clone());
        }
        other => {
            flat.insert(prefix.unwrap_or("value").to_string(), other.to_string());
        }
    }
}

// ============================================================================
// ENVIRONMENT
// ============================================================================

/// Picks the alert environment from an event field, optionally through a regex
#[derive(Debug, Clone)]
pub struct EnvironmentResolver {
    field_name: Option<String>,
    pattern: Option<Regex>,
    default: String,
}

impl EnvironmentResolver {
    pub fn new(
        field_name: Option<String>,
        pattern: Option<&str>,
        default: &str,
    ) -> Result<Self, regex::Error> {
        let pattern = pattern
            .filter(|p| !p.trim().is_empty() && p.trim() != ".*")
            .map(Regex::new)
            .transpose()?;

        Ok(Self {
            field_name: field_name.filter(|f| !f.trim().is_empty()),
            pattern,
            default: default.to_string(),
        })
    }

    pub fn fixed(default: &str) -> Self {
        Self { field_name: None, pattern: None, default: default.to_string() }
    }

    pub fn resolve(&self, event: &Event) -> String {
        let Some(field) = &self.field_name else {
            return self.default.clone();
        };

        let Some(value) = event.get(field).filter(|v| !v.is_empty()) else {
            return self.default.clone();
        };

        match &self.pattern {
            None => value.clone(),
            Some(pattern) => pattern
                .find(value)
                .map(|m| m.as_str().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| self.default.clone()),
        }
    }
}

impl Default for EnvironmentResolver {
    fn default() -> Self {
        Self::fixed("Default Environment")
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested() {
        let flat = flatten_json(&json!({
            "id": 7,
            "src": {"ip": "10.0.0.1", "ports": [80, 443]},
            "note": null,
            "ok": true
        }));

        assert_eq!(flat.get("id").map(String::as_str), Some("7"));
        assert_eq!(flat.get("src_ip").map(String::as_str), Some("10.0.0.1"));
        assert_eq!(flat.get("src_ports_1").map(String::as_str), Some("443"));
        assert_eq!(flat.get("note").map(String::as_str), Some(""));
        assert_eq!(flat.get("ok").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_priority_scale() {
        assert_eq!(Priority::from_label("Moderate"), Some(Priority::Medium));
        assert_eq!(Priority::from_label("INFO").map(|p| p.value()), Some(-1));
        assert_eq!(Priority::from_label("urgent"), None);
        assert_eq!(serde_json::to_value(Priority::Critical).unwrap(), json!(100));
    }

    #[test]
    fn test_environment_from_field_and_regex() {
        let mut event = Event::new();
        event.insert("device".to_string(), "prod-eu-host-1".to_string());

        let plain = EnvironmentResolver::new(Some("device".into()), None, "Default").unwrap();
        assert_eq!(plain.resolve(&event), "prod-eu-host-1");

        let regex = EnvironmentResolver::new(Some("device".into()), Some("prod-[a-z]+"), "Default").unwrap();
        assert_eq!(regex.resolve(&event), "prod-eu");

        let missing = EnvironmentResolver::new(Some("tenant".into()), None, "Default").unwrap();
        assert_eq!(missing.resolve(&event), "Default");

        assert!(EnvironmentResolver::new(Some("device".into()), Some("("), "Default").is_err());
    }
}
