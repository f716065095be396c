//! DNS Security Events connector

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::build_client;
use crate::logic::infoblox::client::DnsEventQuery;
use crate::logic::infoblox::{
    DnsSecurityEvent, InfobloxClient, InfobloxError, PRODUCT_NAME, VENDOR_NAME,
};
use crate::logic::RawModel;
use crate::platform::alert::flatten_json;
use crate::platform::connector::{derive_id, ConnectorSettings};
use crate::platform::{
    run_connector, AlertInfo, AlertSource, ConnectorContext, ConnectorError, ConnectorRun,
    EnvironmentResolver, Priority,
};

pub const CONNECTOR_NAME: &str = "DNS Security Events Connector";
const DEFAULT_MAX_EVENTS: u64 = 100;
const THREAT_LEVELS: &[&str] = &["INFO", "LOW", "MEDIUM", "HIGH"];

impl From<InfobloxError> for ConnectorError {
    fn from(err: InfobloxError) -> Self {
        match err {
            InfobloxError::Param(err) => ConnectorError::Param(err),
            other => ConnectorError::Source(other.to_string()),
        }
    }
}

struct DnsEventSource {
    client: InfobloxClient,
    filters: DnsEventQuery,
}

impl AlertSource for DnsEventSource {
    type Record = DnsSecurityEvent;
    type Error = InfobloxError;

    fn fetch(
        &mut self,
        since: DateTime<Utc>,
        limit: usize,
        _seen: &HashSet<String>,
    ) -> Result<Vec<DnsSecurityEvent>, InfobloxError> {
        self.client.get_dns_events(since, Utc::now(), &self.filters, limit)
    }

    fn record_id(&self, record: &DnsSecurityEvent) -> String {
        derive_id(&record.identity())
    }

    fn record_time(&self, record: &DnsSecurityEvent) -> Option<DateTime<Utc>> {
        record.time()
    }

    fn rule_name(&self, record: &DnsSecurityEvent) -> Option<String> {
        record.policy_name.clone()
    }

    fn build_alert(
        &self,
        record: &DnsSecurityEvent,
        environment: &EnvironmentResolver,
    ) -> Result<AlertInfo, InfobloxError> {
        let event = flatten_json(&record.to_json());
        let rule = record
            .tclass
            .clone()
            .filter(|class| !class.is_empty())
            .unwrap_or_else(|| "DNS Security Event".to_string());

        let mut alert = AlertInfo::new(
            &self.record_id(record),
            &format!("{}: {}", rule, record.qname.trim_end_matches('.')),
            VENDOR_NAME,
            PRODUCT_NAME,
        );
        alert.rule_generator = rule;
        alert.priority = record
            .threat_level
            .as_deref()
            .and_then(Priority::from_label)
            .unwrap_or(Priority::Medium);
        alert.environment = environment.resolve(&event);

        let time = record.time().unwrap_or_else(Utc::now).timestamp_millis();
        alert.start_time = time;
        alert.end_time = time;

        alert.extensions.insert("qname".to_string(), record.qname.clone());
        if let Some(device) = &record.device {
            alert.extensions.insert("device".to_string(), device.clone());
        }
        if let Some(policy) = &record.policy_name {
            alert.extensions.insert("policy_name".to_string(), policy.clone());
        }
        alert.events.push(event);
        Ok(alert)
    }
}

pub fn run(ctx: &mut ConnectorContext<'_>) -> Result<ConnectorRun, ConnectorError> {
    let settings = ConnectorSettings::from_params(ctx.params, "Max Events To Fetch", DEFAULT_MAX_EVENTS)?;

    let threat_levels: Vec<String> = ctx
        .config("Threat Level")
        .list()?
        .into_iter()
        .map(|level| level.to_uppercase())
        .collect();
    if let Some(unknown) = threat_levels.iter().find(|level| !THREAT_LEVELS.contains(&level.as_str())) {
        return Err(ConnectorError::Config(format!(
            "unknown threat level \"{}\", possible values are: {}",
            unknown,
            THREAT_LEVELS.join(", ")
        )));
    }

    let filters = DnsEventQuery {
        threat_levels,
        threat_classes: ctx.config("Threat Class").list()?,
        queried_name: ctx.config("Queried Name").string()?,
        policy_action: ctx.config("Policy Action").string()?,
    };

    let mut source = DnsEventSource { client: build_client(ctx.params, ctx.transports)?, filters };
    run_connector(CONNECTOR_NAME, &mut source, ctx, &settings)
}
