//! Infoblox record views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::platform::{CsvRow, Tabular};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribedItem {
    pub item: String,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub description: String,
}

/// A named list of type `custom_list`
#[derive(Debug, Clone, Deserialize)]
pub struct CustomList {
    pub id: i64,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "crate::logic::null_default")]
    pub list_type: String,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub item_count: u64,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub items: Vec<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub items_described: Vec<DescribedItem>,
    #[serde(default)]
    pub threat_level: Option<String>,
    #[serde(default)]
    pub confidence_level: Option<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub policies: Vec<String>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub updated_time: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(CustomList, "custom list");

impl CustomList {
    /// Item values, whichever of the two shapes the endpoint returned
    pub fn item_values(&self) -> Vec<String> {
        if self.items_described.is_empty() {
            self.items.clone()
        } else {
            self.items_described.iter().map(|item| item.item.clone()).collect()
        }
    }
}

impl Tabular for CustomList {
    fn to_csv(&self) -> CsvRow {
        CsvRow::new()
            .col("ID", self.id)
            .col("Name", &self.name)
            .opt("Description", self.description.as_deref())
            .col("Type", &self.list_type)
            .col("Item Count", self.item_count)
            .opt("Threat Level", self.threat_level.as_deref())
            .opt("Confidence Level", self.confidence_level.as_deref())
            .list("Policies", &self.policies)
            .opt("Tags", self.tags.as_ref().filter(|tags| !tags.is_null()))
            .opt("Created Time", self.created_time.as_deref())
            .opt("Updated Time", self.updated_time.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityPolicy {
    pub id: i64,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_action: Option<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub is_default: bool,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub rules: Vec<Value>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub network_lists: Vec<i64>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub updated_time: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(SecurityPolicy, "security policy");

impl Tabular for SecurityPolicy {
    fn to_csv(&self) -> CsvRow {
        CsvRow::new()
            .col("ID", self.id)
            .col("Name", &self.name)
            .opt("Description", self.description.as_deref())
            .opt("Default Action", self.default_action.as_deref())
            .col("Default Policy", self.is_default)
            .col("Rules", self.rules.len())
            .col("Network Lists", self.network_lists.len())
            .opt("Updated Time", self.updated_time.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostAddress {
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub address: String,
    #[serde(default)]
    pub space: Option<String>,
}

/// IPAM host
#[derive(Debug, Clone, Deserialize)]
pub struct HostRecord {
    pub id: String,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub addresses: Vec<HostAddress>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(HostRecord, "host");

impl Tabular for HostRecord {
    fn to_csv(&self) -> CsvRow {
        let addresses: Vec<&str> = self.addresses.iter().map(|a| a.address.as_str()).collect();
        CsvRow::new()
            .col("ID", &self.id)
            .col("Name", &self.name)
            .list("Addresses", &addresses)
            .opt("Comment", self.comment.as_deref())
            .opt("Tags", self.tags.as_ref().filter(|tags| !tags.is_null()))
            .opt("Updated At", self.updated_at.as_deref())
    }
}

/// One DNS security event; the API does not give them an ID
#[derive(Debug, Clone, Deserialize)]
pub struct DnsSecurityEvent {
    pub event_time: String,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub qname: String,
    #[serde(default)]
    pub qtype: Option<String>,
    #[serde(default)]
    pub qip: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub policy_name: Option<String>,
    #[serde(default)]
    pub policy_action: Option<String>,
    #[serde(default)]
    pub threat_level: Option<String>,
    #[serde(default)]
    pub confidence_level: Option<String>,
    #[serde(default)]
    pub threat_indicator: Option<String>,
    #[serde(default)]
    pub tclass: Option<String>,
    #[serde(default)]
    pub tfamily: Option<String>,
    #[serde(default)]
    pub feed_name: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(DnsSecurityEvent, "DNS security event");

impl DnsSecurityEvent {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.event_time)
            .ok()
            .map(|time| time.with_timezone(&Utc))
    }

    /// Fields that identify the event
    pub fn identity(&self) -> [&str; 5] {
        [
            self.event_time.as_str(),
            self.qname.as_str(),
            self.qip.as_deref().unwrap_or_default(),
            self.device.as_deref().unwrap_or_default(),
            self.policy_name.as_deref().unwrap_or_default(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::RawModel;
    use serde_json::json;

    #[test]
    fn test_custom_list_row() {
        let list = CustomList::from_raw(json!({
            "id": 12,
            "name": "blocked",
            "type": "custom_list",
            "item_count": 2,
            "items_described": [{"item": "evil.com", "description": ""}, {"item": "1.2.3.4"}],
            "policies": ["default", "branch"]
        }))
        .unwrap();

        assert_eq!(list.item_values(), vec!["evil.com", "1.2.3.4"]);
        let row = list.to_csv();
        assert_eq!(row.get("Policies"), Some("default, branch"));
        assert_eq!(row.get("Tags"), Some(""));
    }

    #[test]
    fn test_event_time_parses() {
        let event = DnsSecurityEvent::from_raw(json!({
            "event_time": "2024-03-01T10:00:00.000Z",
            "qname": "evil.com."
        }))
        .unwrap();
        assert_eq!(event.time().map(|t| t.timestamp()), Some(1709287200));
        assert!(DnsSecurityEvent::from_raw(json!({"qname": "x"})).is_err());
    }
}
