//! Recorded Future playbook alerts connector

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::{build_client, PLAYBOOK_CATEGORIES};
use crate::http::PageFailure;
use crate::logic::recorded_future::client::PlaybookSearch;
use crate::logic::recorded_future::types::playbook_priority;
use crate::logic::recorded_future::{
    PlaybookAlertSummary, RecordedFutureClient, RecordedFutureError, PRODUCT_NAME, VENDOR_NAME,
};
use crate::logic::RawModel;
use crate::platform::alert::flatten_json;
use crate::platform::connector::ConnectorSettings;
use crate::platform::{
    run_connector, AlertInfo, AlertSource, ConnectorContext, ConnectorError, ConnectorRun,
    EnvironmentResolver, ParamError,
};

pub const CONNECTOR_NAME: &str = "Recorded Future Playbook Alerts Connector";
const DEFAULT_MAX_ALERTS: u64 = 100;

impl From<RecordedFutureError> for ConnectorError {
    fn from(err: RecordedFutureError) -> Self {
        match err {
            RecordedFutureError::Param(err) => ConnectorError::Param(err),
            other => ConnectorError::Source(other.to_string()),
        }
    }
}

fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value?)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

struct PlaybookAlertSource {
    client: RecordedFutureClient,
    filters: PlaybookSearch,
}

impl AlertSource for PlaybookAlertSource {
    type Record = PlaybookAlertSummary;
    type Error = RecordedFutureError;

    fn fetch(
        &mut self,
        since: DateTime<Utc>,
        limit: usize,
        seen: &HashSet<String>,
    ) -> Result<Vec<PlaybookAlertSummary>, RecordedFutureError> {
        let search = PlaybookSearch { created_from: Some(since), ..self.filters.clone() };
        // Seen alerts still occupy search slots, so ask for enough to fill the cycle
        let wanted = limit.saturating_add(seen.len());
        self.client
            .search_playbook_alerts(&search, Some(wanted), PageFailure::BestEffort)
    }

    fn record_id(&self, record: &PlaybookAlertSummary) -> String {
        record.playbook_alert_id.clone()
    }

    fn record_time(&self, record: &PlaybookAlertSummary) -> Option<DateTime<Utc>> {
        parse_time(record.created.as_deref())
    }

    fn rule_name(&self, record: &PlaybookAlertSummary) -> Option<String> {
        Some(record.category.clone()).filter(|category| !category.is_empty())
    }

    fn build_alert(
        &self,
        record: &PlaybookAlertSummary,
        environment: &EnvironmentResolver,
    ) -> Result<AlertInfo, RecordedFutureError> {
        let details = self
            .client
            .get_playbook_alert(&record.category, &record.playbook_alert_id)?;
        let mut event = flatten_json(&details.to_json());
        event.insert("category".to_string(), record.category.clone());

        let mut alert = AlertInfo::new(
            &record.playbook_alert_id,
            record.title.as_deref().unwrap_or(&details.title()),
            VENDOR_NAME,
            PRODUCT_NAME,
        );
        alert.rule_generator = format!("{} {}", PRODUCT_NAME, record.category);
        alert.priority = playbook_priority(
            record
                .priority
                .as_deref()
                .or(details.panel_status.priority.as_deref())
                .unwrap_or_default(),
        );
        alert.environment = environment.resolve(&event);

        let created = parse_time(record.created.as_deref()).unwrap_or_else(Utc::now);
        let updated = parse_time(record.updated.as_deref()).unwrap_or(created);
        alert.start_time = created.timestamp_millis();
        alert.end_time = updated.max(created).timestamp_millis();

        alert.extensions.insert("category".to_string(), record.category.clone());
        if let Some(status) = record.status.as_deref().or(details.panel_status.status.as_deref()) {
            alert.extensions.insert("status".to_string(), status.to_string());
        }
        if let Some(score) = details.panel_status.risk_score {
            alert.extensions.insert("risk_score".to_string(), score.to_string());
        }
        alert.events.push(event);
        Ok(alert)
    }
}

pub fn run(ctx: &mut ConnectorContext<'_>) -> Result<ConnectorRun, ConnectorError> {
    let settings =
        ConnectorSettings::from_params(ctx.params, "Max Alerts To Fetch", DEFAULT_MAX_ALERTS)?;

    let categories = ctx.config("Playbook Alert Categories").list()?;
    if let Some(unknown) = categories
        .iter()
        .find(|category| !PLAYBOOK_CATEGORIES.contains(&category.as_str()))
    {
        return Err(ParamError::invalid(
            "Playbook Alert Categories",
            format!("\"{}\" is not a playbook alert category", unknown),
        )
        .into());
    }

    let filters = PlaybookSearch {
        categories,
        statuses: ctx.config("Playbook Alert Statuses").list()?,
        priorities: ctx.config("Playbook Alert Priorities").list()?,
        created_from: None,
    };

    let mut source = PlaybookAlertSource {
        client: build_client(ctx.params, ctx.transports)?,
        filters,
    };
    run_connector(CONNECTOR_NAME, &mut source, ctx, &settings)
}
