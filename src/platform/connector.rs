//! Connector runner
//!
//! One scheduled invocation: read cursor, fetch, drop seen IDs, convert,
//! gate, emit, persist. Vendors only describe their records through
//! [`AlertSource`]; the cycle itself lives here.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::alert::{AlertInfo, EnvironmentResolver};
use super::context::{self, ContextError, ContextStore};
use super::params::{Param, ParamError, ParameterSource};
use crate::constants;
use crate::http::TransportFactory;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Invalid connector configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Source(String),
}

// ============================================================================
// DEADLINE
// ============================================================================

/// Cooperative cancellation: checked once per record, never preempts a call
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(started: Instant, budget: Duration) -> Self {
        Self { started, budget }
    }

    pub fn starting_now(budget: Duration) -> Self {
        Self::new(Instant::now(), budget)
    }

    pub fn is_approaching(&self) -> bool {
        self.started.elapsed().as_secs_f64() > self.budget.as_secs_f64() * constants::TIMEOUT_THRESHOLD
    }
}

// ============================================================================
// GATES
// ============================================================================

/// Allow/deny list on a rule-name-like field
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    entries: Vec<String>,
    blocklist: bool,
}

impl RuleFilter {
    pub fn new(entries: Vec<String>, blocklist: bool) -> Self {
        Self { entries, blocklist }
    }

    /// Empty list lets everything through
    pub fn passes(&self, value: Option<&str>) -> bool {
        if self.entries.is_empty() {
            return true;
        }

        let listed = value
            .map(|value| self.entries.iter().any(|entry| entry.eq_ignore_ascii_case(value.trim())))
            .unwrap_or(false);

        if self.blocklist {
            !listed
        } else {
            listed
        }
    }
}

/// Platform-side alert rate limiting
pub trait OverflowGuard {
    fn is_overflowed(&mut self, alert: &AlertInfo) -> bool;
}

pub struct NoOverflow;

impl OverflowGuard for NoOverflow {
    fn is_overflowed(&mut self, _alert: &AlertInfo) -> bool {
        false
    }
}

/// Caps alerts per environment and rule within one cycle
#[derive(Debug, Default)]
pub struct OverflowLimiter {
    limit: usize,
    counts: HashMap<(String, String), usize>,
}

impl OverflowLimiter {
    pub fn new(limit: usize) -> Self {
        Self { limit, counts: HashMap::new() }
    }
}

impl OverflowGuard for OverflowLimiter {
    fn is_overflowed(&mut self, alert: &AlertInfo) -> bool {
        if self.limit == 0 {
            return false;
        }
        let count = self
            .counts
            .entry((alert.environment.clone(), alert.rule_generator.clone()))
            .or_insert(0);
        *count += 1;
        *count > self.limit
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Common connector parameters
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub max_records: usize,
    pub max_hours_backwards: i64,
    pub script_timeout: Duration,
    pub environment: EnvironmentResolver,
    pub rule_filter: RuleFilter,
}

impl ConnectorSettings {
    /// Read the shared parameters; `limit_param` is the vendor's "Max ... To Fetch"
    pub fn from_params(
        params: &dyn ParameterSource,
        limit_param: &str,
        default_limit: u64,
    ) -> Result<Self, ConnectorError> {
        let max_records = Param::config(params, limit_param)
            .default_value(default_limit)
            .positive_integer()?
            .unwrap_or(default_limit) as usize;

        let max_hours_backwards = Param::config(params, "Max Hours Backwards")
            .default_value(constants::DEFAULT_MAX_HOURS_BACKWARDS)
            .positive_integer()?
            .unwrap_or(constants::DEFAULT_MAX_HOURS_BACKWARDS as u64) as i64;

        let script_timeout = Param::config(params, "Script Timeout (Seconds)")
            .default_value(constants::DEFAULT_SCRIPT_TIMEOUT)
            .positive_integer()?
            .unwrap_or(constants::DEFAULT_SCRIPT_TIMEOUT);

        let environment = EnvironmentResolver::new(
            Param::config(params, "Environment Field Name").string()?,
            Param::config(params, "Environment Regex Pattern").string()?.as_deref(),
            &Param::config(params, "Default Environment")
                .default_value("Default Environment")
                .required()?,
        )
        .map_err(|e| ConnectorError::Config(format!("invalid environment regex: {}", e)))?;

        let rule_filter = RuleFilter::new(
            Param::config(params, "Dynamic List").list()?,
            Param::config(params, "Use Dynamic List As Blocklist").boolean()?,
        );

        Ok(Self {
            max_records,
            max_hours_backwards,
            script_timeout: Duration::from_secs(script_timeout),
            environment,
            rule_filter,
        })
    }
}

// ============================================================================
// SOURCE
// ============================================================================

/// What a vendor provides to the connector cycle
pub trait AlertSource {
    type Record;
    type Error: std::fmt::Display;

    /// Fetch candidate records created after `since`
    fn fetch(
        &mut self,
        since: DateTime<Utc>,
        limit: usize,
        seen: &HashSet<String>,
    ) -> Result<Vec<Self::Record>, Self::Error>;

    /// Stable ID used for de-duplication
    fn record_id(&self, record: &Self::Record) -> String;

    /// Creation time, used to advance the cursor
    fn record_time(&self, record: &Self::Record) -> Option<DateTime<Utc>>;

    /// Value checked against the dynamic list
    fn rule_name(&self, record: &Self::Record) -> Option<String>;

    fn build_alert(
        &self,
        record: &Self::Record,
        environment: &EnvironmentResolver,
    ) -> Result<AlertInfo, Self::Error>;
}

/// Deterministic ID for vendors that do not supply one
pub fn derive_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}

// ============================================================================
// RUN
// ============================================================================

/// Collaborators handed to a connector for one cycle
pub struct ConnectorContext<'a> {
    pub params: &'a dyn ParameterSource,
    pub store: &'a mut dyn ContextStore,
    pub transports: &'a dyn TransportFactory,
    pub overflow: &'a mut dyn OverflowGuard,
    pub is_test_run: bool,
    pub started: Instant,
}

impl<'a> ConnectorContext<'a> {
    pub fn config(&self, name: &'a str) -> Param<'a> {
        Param::config(self.params, name)
    }
}

#[derive(Debug, Default)]
pub struct ConnectorRun {
    pub alerts: Vec<AlertInfo>,
    pub fetched: usize,
    pub duplicates: usize,
    pub filtered: usize,
    pub failed: usize,
    pub timed_out: bool,
}

pub fn run_connector<S: AlertSource>(
    connector_name: &str,
    source: &mut S,
    ctx: &mut ConnectorContext<'_>,
    settings: &ConnectorSettings,
) -> Result<ConnectorRun, ConnectorError> {
    log::info!("------------------- Main - Param Init -------------------");
    log::info!("------------------- Main - Started: {} -------------------", connector_name);
    if ctx.is_test_run {
        log::info!("***** This is an \"IDE Play Button\"\\\"Run Connector once\" test run ******");
    }

    let deadline = Deadline::new(ctx.started, settings.script_timeout);
    let mut seen_list = context::read_seen_ids(&*ctx.store)?;
    let seen: HashSet<String> = seen_list.iter().cloned().collect();

    let now = Utc::now();
    let earliest = now - chrono::Duration::hours(settings.max_hours_backwards);
    let since = match context::read_last_success(&*ctx.store)? {
        Some(last) if last > earliest => last,
        _ => earliest,
    };
    log::info!("Fetching records since {}", since.to_rfc3339());

    let records = source
        .fetch(since, settings.max_records, &seen)
        .map_err(|e| ConnectorError::Source(e.to_string()))?;

    let mut run = ConnectorRun { fetched: records.len(), ..Default::default() };
    let mut cursor = since;
    let mut batch: HashSet<String> = HashSet::new();
    let mut processed = 0;

    for record in &records {
        let id = source.record_id(record);
        if seen.contains(&id) || !batch.insert(id.clone()) {
            run.duplicates += 1;
            continue;
        }

        if processed >= settings.max_records {
            log::info!("Reached the limit of {} records for this cycle", settings.max_records);
            break;
        }

        if deadline.is_approaching() {
            log::error!("Timeout is approaching. Connector will gracefully exit");
            run.timed_out = true;
            break;
        }

        if ctx.is_test_run && !run.alerts.is_empty() {
            log::info!("Maximum alerts count (1) for test run reached");
            break;
        }

        processed += 1;
        seen_list.push(id.clone());
        if let Some(time) = source.record_time(record) {
            cursor = cursor.max(time);
        }

        if !settings.rule_filter.passes(source.rule_name(record).as_deref()) {
            log::info!("Record {} did not pass the dynamic list filter, skipping", id);
            run.filtered += 1;
            continue;
        }

        match source.build_alert(record, &settings.environment) {
            Ok(alert) => {
                if ctx.overflow.is_overflowed(&alert) {
                    log::info!(
                        "{}-{}-{}-{} found as overflow alert. Skipping.",
                        alert.rule_generator,
                        alert.ticket_id,
                        alert.environment,
                        alert.device_product
                    );
                    run.filtered += 1;
                    continue;
                }
                log::info!("Record {} was created as alert \"{}\"", id, alert.name);
                run.alerts.push(alert);
            }
            Err(e) => {
                log::error!("Failed to process record {}: {}", id, e);
                if ctx.is_test_run {
                    return Err(ConnectorError::Source(e.to_string()));
                }
                run.failed += 1;
            }
        }
    }

    if ctx.is_test_run {
        log::info!("Test run, context is not saved");
    } else {
        context::write_seen_ids(&mut *ctx.store, &seen_list)?;
        context::write_last_success(&mut *ctx.store, cursor)?;
        log::info!("Saved {} processed IDs, cursor at {}", seen_list.len(), cursor.to_rfc3339());
    }

    log::info!(
        "Created {} alerts ({} fetched, {} duplicates, {} filtered, {} failed)",
        run.alerts.len(),
        run.fetched,
        run.duplicates,
        run.filtered,
        run.failed
    );
    log::info!("------------------- Main - Finished -------------------");
    Ok(run)
}

#[cfg(test)]
mod tests;
