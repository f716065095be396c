//! Telegram connector: every new bot update becomes an alert

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::build_client;
use crate::logic::telegram::{TelegramClient, TelegramError, Update, INTEGRATION_NAME};
use crate::logic::RawModel;
use crate::platform::alert::flatten_json;
use crate::platform::connector::ConnectorSettings;
use crate::platform::{
    run_connector, AlertInfo, AlertSource, ConnectorContext, ConnectorError, ConnectorRun,
    EnvironmentResolver, Priority,
};

pub const CONNECTOR_NAME: &str = "Telegram Connector";
const DEFAULT_MAX_UPDATES: u64 = 100;

impl From<TelegramError> for ConnectorError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::Param(err) => ConnectorError::Param(err),
            other => ConnectorError::Source(other.to_string()),
        }
    }
}

struct UpdatesSource {
    client: TelegramClient,
    priority: Priority,
    allowed_updates: Vec<String>,
}

impl AlertSource for UpdatesSource {
    type Record = Update;
    type Error = TelegramError;

    /// Telegram keeps its own cursor: ask for updates after the highest one already seen
    fn fetch(
        &mut self,
        _since: DateTime<Utc>,
        limit: usize,
        seen: &HashSet<String>,
    ) -> Result<Vec<Update>, TelegramError> {
        let offset = seen
            .iter()
            .filter_map(|id| id.parse::<i64>().ok())
            .max()
            .map(|last| last + 1);
        self.client.get_updates(offset, limit, &self.allowed_updates)
    }

    fn record_id(&self, record: &Update) -> String {
        record.update_id.to_string()
    }

    fn record_time(&self, record: &Update) -> Option<DateTime<Utc>> {
        record.any_message().and_then(|message| message.sent_at())
    }

    fn rule_name(&self, record: &Update) -> Option<String> {
        record
            .any_message()
            .and_then(|message| message.chat.as_ref())
            .map(|chat| chat.display_name())
    }

    fn build_alert(
        &self,
        record: &Update,
        environment: &EnvironmentResolver,
    ) -> Result<AlertInfo, TelegramError> {
        let event = flatten_json(&record.to_json());
        let chat = self.rule_name(record).unwrap_or_else(|| "Telegram".to_string());

        let mut alert = AlertInfo::new(
            &record.update_id.to_string(),
            &format!("Telegram {} in {}", record.kind().replace('_', " "), chat),
            INTEGRATION_NAME,
            INTEGRATION_NAME,
        );
        alert.rule_generator = format!("Telegram {}", record.kind());
        alert.priority = self.priority;
        alert.environment = environment.resolve(&event);

        let time = self.record_time(record).unwrap_or_else(Utc::now).timestamp_millis();
        alert.start_time = time;
        alert.end_time = time;
        alert.events.push(event);
        Ok(alert)
    }
}

pub fn run(ctx: &mut ConnectorContext<'_>) -> Result<ConnectorRun, ConnectorError> {
    let settings = ConnectorSettings::from_params(ctx.params, "Max Updates To Fetch", DEFAULT_MAX_UPDATES)?;

    let priority_label = ctx.config("Alert Priority").default_value("Medium").required()?;
    let priority = Priority::from_label(&priority_label).ok_or_else(|| {
        ConnectorError::Config(format!("unknown alert priority \"{}\"", priority_label))
    })?;

    let mut source = UpdatesSource {
        client: build_client(ctx.params, ctx.transports)?,
        priority,
        allowed_updates: ctx.config("Update Types").list()?,
    };

    run_connector(CONNECTOR_NAME, &mut source, ctx, &settings)
}
