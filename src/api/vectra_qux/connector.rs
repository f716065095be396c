//! Vectra QUX entities connector
//!
//! Hosts and accounts with a detection newer than the cursor become alerts;
//! their active detections are attached as events.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::build_client;
use crate::http::PageFailure;
use crate::logic::vectra_qux::{
    Entity, EntityQuery, EntityType, VectraQuxClient, VectraQuxError, PRODUCT_NAME, VENDOR_NAME,
};
use crate::logic::vectra_qux::types::parse_timestamp;
use crate::logic::RawModel;
use crate::platform::alert::flatten_json;
use crate::platform::connector::ConnectorSettings;
use crate::platform::{
    run_connector, AlertInfo, AlertSource, ConnectorContext, ConnectorError, ConnectorRun,
    EnvironmentResolver,
};

pub const CONNECTOR_NAME: &str = "Vectra QUX Entities Connector";
const DEFAULT_MAX_ENTITIES: u64 = 50;
const DEFAULT_MAX_DETECTIONS: u64 = 50;
const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

impl From<VectraQuxError> for ConnectorError {
    fn from(err: VectraQuxError) -> Self {
        match err {
            VectraQuxError::Param(err) => ConnectorError::Param(err),
            other => ConnectorError::Source(other.to_string()),
        }
    }
}

struct EntityRecord {
    entity_type: EntityType,
    entity: Entity,
}

struct EntitySource {
    client: VectraQuxClient,
    entity_types: Vec<EntityType>,
    filters: EntityQuery,
    max_detections: usize,
}

impl AlertSource for EntitySource {
    type Record = EntityRecord;
    type Error = VectraQuxError;

    fn fetch(
        &mut self,
        since: DateTime<Utc>,
        limit: usize,
        _seen: &HashSet<String>,
    ) -> Result<Vec<EntityRecord>, VectraQuxError> {
        let mut query = self.filters.clone();
        query.last_detection_gte = Some(since.format(QUERY_TIME_FORMAT).to_string());
        query.ordering = Some("last_detection_timestamp".to_string());

        let mut records = Vec::new();
        for entity_type in &self.entity_types {
            let entities =
                self.client
                    .list_entities(*entity_type, &query, Some(limit), PageFailure::BestEffort)?;
            records.extend(
                entities
                    .into_iter()
                    .map(|entity| EntityRecord { entity_type: *entity_type, entity }),
            );
        }

        records.sort_by_key(|record| record.entity.last_detection());
        records.truncate(limit);
        Ok(records)
    }

    /// An entity is raised again once it has a newer detection
    fn record_id(&self, record: &EntityRecord) -> String {
        format!(
            "{}_{}_{}",
            record.entity_type.singular(),
            record.entity.id,
            record.entity.last_detection_timestamp.as_deref().unwrap_or_default()
        )
    }

    fn record_time(&self, record: &EntityRecord) -> Option<DateTime<Utc>> {
        record.entity.last_detection()
    }

    fn rule_name(&self, record: &EntityRecord) -> Option<String> {
        Some(record.entity.name.clone()).filter(|name| !name.is_empty())
    }

    fn build_alert(
        &self,
        record: &EntityRecord,
        environment: &EnvironmentResolver,
    ) -> Result<AlertInfo, VectraQuxError> {
        let EntityRecord { entity_type, entity } = record;
        let detections =
            self.client
                .list_entity_detections(*entity_type, entity.id, self.max_detections)?;

        let kind = match entity_type {
            EntityType::Host => "Host",
            EntityType::Account => "Account",
        };
        let entity_event = flatten_json(&entity.to_json());

        let mut alert = AlertInfo::new(
            &self.record_id(record),
            &format!("{} {}", kind, entity.name),
            VENDOR_NAME,
            PRODUCT_NAME,
        );
        alert.rule_generator = format!("{} {}", PRODUCT_NAME, kind);
        alert.priority = entity.priority();
        alert.environment = environment.resolve(&entity_event);

        let last = entity.last_detection().unwrap_or_else(Utc::now);
        let first = detections
            .iter()
            .filter_map(|d| d.first_timestamp.as_deref())
            .filter_map(parse_timestamp)
            .min()
            .unwrap_or(last);
        alert.start_time = first.min(last).timestamp_millis();
        alert.end_time = last.timestamp_millis();

        alert.extensions.insert("entity_id".to_string(), entity.id.to_string());
        alert.extensions.insert("entity_type".to_string(), entity_type.singular().to_string());
        alert.extensions.insert("threat".to_string(), entity.threat.to_string());
        alert.extensions.insert("certainty".to_string(), entity.certainty.to_string());

        if detections.is_empty() {
            alert.events.push(entity_event);
        } else {
            for detection in &detections {
                let mut event = flatten_json(&detection.to_json());
                event.insert("entity_name".to_string(), entity.name.clone());
                event.insert("entity_type".to_string(), entity_type.singular().to_string());
                alert.events.push(event);
            }
        }
        Ok(alert)
    }
}

pub fn run(ctx: &mut ConnectorContext<'_>) -> Result<ConnectorRun, ConnectorError> {
    let settings =
        ConnectorSettings::from_params(ctx.params, "Max Entities To Fetch", DEFAULT_MAX_ENTITIES)?;

    let entity_types = match ctx
        .config("Entity Type")
        .default_value("All")
        .choice(&["All", "Host", "Account"])?
        .as_deref()
    {
        Some("Host") => vec![EntityType::Host],
        Some("Account") => vec![EntityType::Account],
        _ => vec![EntityType::Host, EntityType::Account],
    };

    let filters = EntityQuery {
        state: Some("active".to_string()),
        threat_gte: ctx.config("Threat Score GTE").integer_in(0, 100)?,
        certainty_gte: ctx.config("Certainty Score GTE").integer_in(0, 100)?,
        tags: ctx.config("Specific Tag").list()?,
        ..Default::default()
    };
    let max_detections = ctx
        .config("Max Detections Per Entity")
        .default_value(DEFAULT_MAX_DETECTIONS)
        .positive_integer()?
        .unwrap_or(DEFAULT_MAX_DETECTIONS) as usize;

    let mut source = EntitySource {
        client: build_client(ctx.params, ctx.transports)?,
        entity_types,
        filters,
        max_detections,
    };
    run_connector(CONNECTOR_NAME, &mut source, ctx, &settings)
}
