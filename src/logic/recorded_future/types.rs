//! Recorded Future record views and request bodies

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::platform::{CsvRow, Priority, Tabular};

// ============================================================================
// ENRICHMENT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Ip,
    Domain,
    Hash,
    Url,
    Cve,
}

impl EntityKind {
    pub const LABELS: &'static [&'static str] = &["IP", "Domain", "Hash", "URL", "CVE"];

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "ip" | "address" => Some(EntityKind::Ip),
            "domain" | "host" | "hostname" => Some(EntityKind::Domain),
            "hash" | "filehash" => Some(EntityKind::Hash),
            "url" => Some(EntityKind::Url),
            "cve" | "vulnerability" => Some(EntityKind::Cve),
            _ => None,
        }
    }

    /// Lookup path prefix of the Connect API
    pub fn path(&self) -> &'static str {
        match self {
            EntityKind::Ip => "v2/ip",
            EntityKind::Domain => "v2/domain",
            EntityKind::Hash => "v2/hash",
            EntityKind::Url => "v2/url",
            EntityKind::Cve => "v2/vulnerability",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub rule: String,
    #[serde(default)]
    pub criticality: Option<i64>,
    #[serde(default)]
    pub criticality_label: Option<String>,
    #[serde(default)]
    pub evidence_string: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub score: i64,
    #[serde(default)]
    pub criticality_label: Option<String>,
    #[serde(default)]
    pub risk_string: Option<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub evidence_details: Vec<Evidence>,
}

/// `data` of a lookup response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrichment {
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub entity: EntityRef,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub risk: Risk,
    #[serde(default)]
    pub intel_card: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(Enrichment, "enrichment");

impl Enrichment {
    pub fn is_risky(&self, threshold: i64) -> bool {
        self.risk.score > threshold
    }

    pub fn rules(&self) -> Vec<String> {
        self.risk.evidence_details.iter().map(|e| e.rule.clone()).collect()
    }
}

// ============================================================================
// ALERTS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertRule {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertLog {
    #[serde(default)]
    pub triggered: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertReview {
    #[serde(default)]
    pub status_in_portal: Option<String>,
    #[serde(default)]
    pub assignee_name: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Classic alert (v3 alert API)
#[derive(Debug, Clone, Deserialize)]
pub struct RfAlert {
    pub id: String,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub rule: AlertRule,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub log: AlertLog,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub review: AlertReview,
    #[serde(default)]
    pub url: Option<Value>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(RfAlert, "alert");

impl RfAlert {
    /// Portal link, given either as a string or as `{"portal": ...}`
    pub fn portal_url(&self) -> Option<&str> {
        match self.url.as_ref()? {
            Value::String(url) => Some(url),
            other => other.get("portal").and_then(Value::as_str),
        }
    }
}

impl Tabular for RfAlert {
    fn to_csv(&self) -> CsvRow {
        CsvRow::new()
            .col("ID", &self.id)
            .col("Title", &self.title)
            .opt("Rule", self.rule.name.as_deref())
            .opt("Triggered", self.log.triggered.as_deref())
            .opt("Status", self.review.status_in_portal.as_deref())
            .opt("Assignee", self.review.assignee_name.as_deref())
            .opt("URL", self.portal_url())
    }
}

/// One entry of the alert update request
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertUpdate {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AlertUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.assignee.is_none() && self.note.is_none()
    }
}

// ============================================================================
// PLAYBOOK ALERTS
// ============================================================================

/// Playbook alert priorities mapped onto the platform scale
pub fn playbook_priority(label: &str) -> Priority {
    match label.trim().to_lowercase().as_str() {
        "high" => Priority::High,
        "moderate" => Priority::Medium,
        "informational" => Priority::Low,
        other => Priority::from_label(other).unwrap_or(Priority::Medium),
    }
}

/// Row of the playbook alert search
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybookAlertSummary {
    pub playbook_alert_id: String,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub category: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(PlaybookAlertSummary, "playbook alert");

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PanelStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee_name: Option<String>,
    #[serde(default)]
    pub case_rule_label: Option<String>,
    #[serde(default)]
    pub entity_name: Option<String>,
    #[serde(default)]
    pub risk_score: Option<i64>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

/// Full playbook alert (`data` of the details response)
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybookAlert {
    pub playbook_alert_id: String,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub panel_status: PanelStatus,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(PlaybookAlert, "playbook alert");

impl PlaybookAlert {
    pub fn title(&self) -> String {
        match (&self.panel_status.case_rule_label, &self.panel_status.entity_name) {
            (Some(rule), Some(entity)) => format!("{} - {}", rule, entity),
            (Some(rule), None) => rule.clone(),
            (None, Some(entity)) => entity.clone(),
            (None, None) => self.playbook_alert_id.clone(),
        }
    }
}

impl Tabular for PlaybookAlert {
    fn to_csv(&self) -> CsvRow {
        let status = &self.panel_status;
        CsvRow::new()
            .col("ID", &self.playbook_alert_id)
            .col("Title", self.title())
            .opt("Status", status.status.as_deref())
            .opt("Priority", status.priority.as_deref())
            .opt("Assignee", status.assignee_name.as_deref())
            .opt("Risk Score", status.risk_score)
            .opt("Created", status.created.as_deref())
            .opt("Updated", status.updated.as_deref())
    }
}

/// Body of the common playbook alert update
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlaybookAlertUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_entry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reopen_strategy: Option<String>,
}

impl PlaybookAlertUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
            && self.log_entry.is_none()
            && self.reopen_strategy.is_none()
    }
}

// ============================================================================
// SANDBOX
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SandboxSample {
    pub id: String,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub status: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub submitted: Option<String>,
    #[serde(default)]
    pub completed: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(SandboxSample, "sandbox sample");

impl SandboxSample {
    pub fn is_reported(&self) -> bool {
        self.status == "reported"
    }

    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SandboxAnalysis {
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub family: Vec<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Signature {
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub name: String,
    #[serde(default)]
    pub score: Option<i64>,
}

/// `overview.json` of a finished sample
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxOverview {
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub analysis: SandboxAnalysis,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub signatures: Vec<Signature>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(SandboxOverview, "sandbox overview");
