//! Arcanna record views

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::platform::{CsvRow, Tabular};

/// Decision status while inference is still running
pub const PENDING_INFERENCE: &str = "pending_inference";

/// Event IDs come back as strings or numbers depending on the API version
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected ID value {}", other))),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub job_id: i64,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub retrain_state: Option<String>,
    #[serde(default)]
    pub last_processed_timestamp: Option<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub categories: Vec<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(Job, "job");

impl Tabular for Job {
    fn to_csv(&self) -> CsvRow {
        CsvRow::new()
            .col("Job ID", self.job_id)
            .col("Title", &self.title)
            .opt("Status", self.status.as_deref())
            .opt("Data Type", self.data_type.as_deref())
            .opt("Retrain State", self.retrain_state.as_deref())
            .opt("Last Processed", self.last_processed_timestamp.as_deref())
    }
}

/// Acknowledgement of an ingested event
#[derive(Debug, Clone, Deserialize)]
pub struct EventReceipt {
    #[serde(deserialize_with = "id_string")]
    pub event_id: String,
    #[serde(default)]
    pub job_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ingest_timestamp: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(EventReceipt, "event receipt");

/// Inference result for an event
#[derive(Debug, Clone, Deserialize)]
pub struct Decision {
    #[serde(deserialize_with = "id_string")]
    pub event_id: String,
    #[serde(default)]
    pub job_id: Option<i64>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub status: String,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub result_label: Option<String>,
    #[serde(default)]
    pub confidence_level: Option<f64>,
    #[serde(default)]
    pub bucket_id: Option<String>,
    #[serde(default)]
    pub ingest_timestamp: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(Decision, "decision");

impl Decision {
    pub fn is_pending(&self) -> bool {
        self.status.eq_ignore_ascii_case(PENDING_INFERENCE)
    }

    pub fn is_error(&self) -> bool {
        self.status.eq_ignore_ascii_case("error") || self.status.eq_ignore_ascii_case("failed")
    }

    /// Human label of the decision, falling back to the raw result
    pub fn label(&self) -> Option<&str> {
        self.result_label.as_deref().or(self.result.as_deref())
    }
}

impl Tabular for Decision {
    fn to_csv(&self) -> CsvRow {
        CsvRow::new()
            .col("Event ID", &self.event_id)
            .opt("Job ID", self.job_id)
            .col("Status", &self.status)
            .opt("Decision", self.label())
            .opt("Confidence", self.confidence_level)
            .opt("Bucket ID", self.bucket_id.as_deref())
            .opt("Ingested", self.ingest_timestamp.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{ModelError, RawModel};
    use serde_json::json;

    #[test]
    fn test_numeric_event_id() {
        let receipt = EventReceipt::from_raw(json!({"event_id": 1234, "status": "pending_inference"})).unwrap();
        assert_eq!(receipt.event_id, "1234");
    }

    #[test]
    fn test_decision_requires_event_id() {
        let err = Decision::from_raw(json!({"status": "OK"})).unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingField { entity: "decision", field: "event_id".to_string() }
        );
    }

    #[test]
    fn test_decision_label_fallback() {
        let decision = Decision::from_raw(json!({"event_id": "e1", "status": "OK", "result": "escalate_alert"})).unwrap();
        assert_eq!(decision.label(), Some("escalate_alert"));
        assert!(!decision.is_pending());
    }
}
