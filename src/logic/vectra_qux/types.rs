//! Vectra QUX record views

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::platform::{CsvRow, Priority, Tabular};

/// Threat/certainty score from which an entity is considered high
pub const HIGH_SCORE: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Host,
    Account,
}

impl EntityType {
    pub const LABELS: &'static [&'static str] = &["Host", "Account"];

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "host" | "hosts" => Some(EntityType::Host),
            "account" | "accounts" => Some(EntityType::Account),
            _ => None,
        }
    }

    /// Collection path segment
    pub fn collection(&self) -> &'static str {
        match self {
            EntityType::Host => "hosts",
            EntityType::Account => "accounts",
        }
    }

    /// Singular name used by the tagging and assignment endpoints
    pub fn singular(&self) -> &'static str {
        match self {
            EntityType::Host => "host",
            EntityType::Account => "account",
        }
    }

    /// Detection list filter naming this entity
    pub fn detection_filter(&self) -> &'static str {
        match self {
            EntityType::Host => "host_id",
            EntityType::Account => "account_id",
        }
    }
}

/// Vectra timestamps come with or without an offset ("2024-05-01T10:00:00Z"
/// or "2024-05-01T10:00:00")
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// A host or an account; both collections share the scoring fields
#[derive(Debug, Clone, Deserialize)]
pub struct Entity {
    pub id: i64,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub threat: i64,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub certainty: i64,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub is_prioritized: Option<bool>,
    #[serde(default)]
    pub last_source: Option<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub last_detection_timestamp: Option<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub detection_set: Vec<String>,
    #[serde(default)]
    pub assignment: Option<Value>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(Entity, "entity");

impl Entity {
    pub fn last_detection(&self) -> Option<DateTime<Utc>> {
        self.last_detection_timestamp.as_deref().and_then(parse_timestamp)
    }

    /// ID of the current assignment, if the entity is assigned
    pub fn assignment_id(&self) -> Option<i64> {
        self.assignment.as_ref().and_then(|a| a.get("id")).and_then(Value::as_i64)
    }

    /// Urgency as a platform priority: the vendor severity when present,
    /// otherwise the threat/certainty quadrant
    pub fn priority(&self) -> Priority {
        if let Some(priority) = self.severity.as_deref().and_then(Priority::from_label) {
            return priority;
        }
        match (self.threat >= HIGH_SCORE, self.certainty >= HIGH_SCORE) {
            (true, true) => Priority::Critical,
            (true, false) => Priority::High,
            (false, true) => Priority::Medium,
            (false, false) => Priority::Low,
        }
    }
}

impl Tabular for Entity {
    fn to_csv(&self) -> CsvRow {
        CsvRow::new()
            .col("ID", self.id)
            .col("Name", &self.name)
            .opt("State", self.state.as_deref())
            .col("Threat", self.threat)
            .col("Certainty", self.certainty)
            .opt("Severity", self.severity.as_deref())
            .opt("IP", self.last_source.as_deref())
            .list("Tags", &self.tags)
            .opt("Last Detection", self.last_detection_timestamp.as_deref())
            .col("Detections", self.detection_set.len())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Detection {
    pub id: i64,
    #[serde(default)]
    pub detection: Option<String>,
    #[serde(default)]
    pub detection_type: Option<String>,
    #[serde(default)]
    pub detection_category: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub threat: i64,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub certainty: i64,
    #[serde(default)]
    pub src_ip: Option<String>,
    #[serde(default)]
    pub first_timestamp: Option<String>,
    #[serde(default)]
    pub last_timestamp: Option<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub is_triaged: bool,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(Detection, "detection");

impl Detection {
    pub fn name(&self) -> &str {
        self.detection
            .as_deref()
            .or(self.detection_type.as_deref())
            .unwrap_or("Detection")
    }
}

impl Tabular for Detection {
    fn to_csv(&self) -> CsvRow {
        CsvRow::new()
            .col("ID", self.id)
            .col("Type", self.name())
            .opt("Category", self.detection_category.as_deref())
            .opt("State", self.state.as_deref())
            .col("Threat", self.threat)
            .col("Certainty", self.certainty)
            .opt("Source IP", self.src_ip.as_deref())
            .opt("First Seen", self.first_timestamp.as_deref())
            .opt("Last Seen", self.last_timestamp.as_deref())
            .list("Tags", &self.tags)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Note {
    pub id: i64,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub note: String,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(Note, "note");

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutcomeRef {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Assignment {
    pub id: i64,
    #[serde(default)]
    pub assigned_by: Option<UserRef>,
    #[serde(default)]
    pub assigned_to: Option<UserRef>,
    #[serde(default)]
    pub date_assigned: Option<String>,
    #[serde(default)]
    pub date_resolved: Option<String>,
    #[serde(default)]
    pub resolved_by: Option<UserRef>,
    #[serde(default)]
    pub outcome: Option<OutcomeRef>,
    #[serde(default)]
    pub host_id: Option<i64>,
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub triaged_detections: Vec<i64>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(Assignment, "assignment");

fn username(user: &Option<UserRef>) -> Option<&str> {
    user.as_ref().and_then(|user| user.username.as_deref())
}

impl Tabular for Assignment {
    fn to_csv(&self) -> CsvRow {
        CsvRow::new()
            .col("Assignment ID", self.id)
            .opt("Assigned By", username(&self.assigned_by))
            .opt("Assigned To", username(&self.assigned_to))
            .opt("Assigned Date", self.date_assigned.as_deref())
            .opt("Resolved By", username(&self.resolved_by))
            .opt("Resolved Date", self.date_resolved.as_deref())
            .opt("Outcome", self.outcome.as_ref().and_then(|o| o.title.as_deref()))
            .opt("Host ID", self.host_id)
            .opt("Account ID", self.account_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Outcome {
    pub id: i64,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub builtin: bool,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub user_selectable: bool,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(Outcome, "outcome");

impl Tabular for Outcome {
    fn to_csv(&self) -> CsvRow {
        CsvRow::new()
            .col("Outcome ID", self.id)
            .col("Title", &self.title)
            .opt("Category", self.category.as_deref())
            .col("Built IN", self.builtin)
            .col("User Selectable", self.user_selectable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::RawModel;
    use serde_json::json;

    #[test]
    fn test_priority_quadrants() {
        let entity = |threat, certainty| {
            Entity::from_raw(json!({"id": 1, "threat": threat, "certainty": certainty})).unwrap()
        };
        assert_eq!(entity(80, 90).priority(), Priority::Critical);
        assert_eq!(entity(80, 10).priority(), Priority::High);
        assert_eq!(entity(10, 80).priority(), Priority::Medium);
        assert_eq!(entity(10, 10).priority(), Priority::Low);

        let labelled = Entity::from_raw(json!({"id": 2, "severity": "High", "threat": 0})).unwrap();
        assert_eq!(labelled.priority(), Priority::High);
    }

    #[test]
    fn test_timestamp_without_offset() {
        let time = parse_timestamp("2024-05-01T10:00:00").unwrap();
        assert_eq!(time.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_assignment_id_from_entity() {
        let entity = Entity::from_raw(json!({"id": 3, "assignment": {"id": 41}})).unwrap();
        assert_eq!(entity.assignment_id(), Some(41));
    }
}
