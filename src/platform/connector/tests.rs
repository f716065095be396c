use super::*;
use crate::http::mock::MockTransport;
use crate::platform::context::{MemoryContextStore, read_last_success, read_seen_ids};
use crate::platform::params::InvocationParams;
use crate::platform::alert::Priority;
use chrono::TimeZone;

#[derive(Clone)]
struct Item {
    id: &'static str,
    minute: u32,
    rule: &'static str,
    broken: bool,
}

struct FakeSource {
    items: Vec<Item>,
    fetch_calls: Vec<DateTime<Utc>>,
}

impl FakeSource {
    fn new(items: Vec<Item>) -> Self {
        Self { items, fetch_calls: Vec::new() }
    }
}

fn item(id: &'static str, minute: u32) -> Item {
    Item { id, minute, rule: "Malware", broken: false }
}

fn base_time() -> DateTime<Utc> {
    Utc::now() - chrono::Duration::minutes(30)
}

impl AlertSource for FakeSource {
    type Record = Item;
    type Error = String;

    fn fetch(&mut self, since: DateTime<Utc>, limit: usize, _seen: &HashSet<String>) -> Result<Vec<Item>, String> {
        self.fetch_calls.push(since);
        Ok(self.items.iter().take(limit).cloned().collect())
    }

    fn record_id(&self, record: &Item) -> String {
        record.id.to_string()
    }

    fn record_time(&self, record: &Item) -> Option<DateTime<Utc>> {
        Some(base_time() + chrono::Duration::minutes(record.minute as i64))
    }

    fn rule_name(&self, record: &Item) -> Option<String> {
        Some(record.rule.to_string())
    }

    fn build_alert(&self, record: &Item, environment: &EnvironmentResolver) -> Result<AlertInfo, String> {
        if record.broken {
            return Err(format!("cannot convert {}", record.id));
        }
        let mut alert = AlertInfo::new(record.id, record.rule, "Vendor", "Product");
        alert.priority = Priority::High;
        alert.environment = environment.resolve(&Default::default());
        Ok(alert)
    }
}

fn settings() -> ConnectorSettings {
    ConnectorSettings::from_params(&InvocationParams::new(), "Max Alerts To Fetch", 10).unwrap()
}

fn run(
    source: &mut FakeSource,
    store: &mut MemoryContextStore,
    is_test_run: bool,
    settings: &ConnectorSettings,
) -> Result<ConnectorRun, ConnectorError> {
    let params = InvocationParams::new();
    let mock = MockTransport::new();
    let mut overflow = NoOverflow;
    let mut ctx = ConnectorContext {
        params: &params,
        store,
        transports: &mock,
        overflow: &mut overflow,
        is_test_run,
        started: Instant::now(),
    };
    run_connector("Fake Connector", source, &mut ctx, settings)
}

#[test]
fn test_seen_ids_never_emitted_twice() {
    let mut store = MemoryContextStore::new();
    let mut source = FakeSource::new(vec![item("a", 1), item("b", 2)]);

    let first = run(&mut source, &mut store, false, &settings()).unwrap();
    assert_eq!(first.alerts.len(), 2);

    // Same records come back next cycle plus one new one
    source.items.push(item("c", 3));
    let second = run(&mut source, &mut store, false, &settings()).unwrap();
    let ids: Vec<_> = second.alerts.iter().map(|a| a.ticket_id.as_str()).collect();
    assert_eq!(ids, vec!["c"]);
    assert_eq!(second.duplicates, 2);

    assert_eq!(read_seen_ids(&store).unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn test_duplicates_inside_one_batch() {
    let mut store = MemoryContextStore::new();
    let mut source = FakeSource::new(vec![item("a", 1), item("a", 1), item("b", 2)]);

    let result = run(&mut source, &mut store, false, &settings()).unwrap();
    assert_eq!(result.alerts.len(), 2);
    assert_eq!(result.duplicates, 1);
}

#[test]
fn test_cursor_advances_to_latest_record() {
    let mut store = MemoryContextStore::new();
    let mut source = FakeSource::new(vec![item("a", 5), item("b", 2)]);

    run(&mut source, &mut store, false, &settings()).unwrap();

    let cursor = read_last_success(&store).unwrap().unwrap();
    let expected = base_time() + chrono::Duration::minutes(5);
    assert!((cursor - expected).num_seconds().abs() < 5);
}

#[test]
fn test_first_run_uses_lookback_window() {
    let mut store = MemoryContextStore::new();
    let mut source = FakeSource::new(vec![]);

    run(&mut source, &mut store, false, &settings()).unwrap();

    let since = source.fetch_calls[0];
    let expected = Utc::now() - chrono::Duration::hours(1);
    assert!((since - expected).num_seconds().abs() < 5);
}

#[test]
fn test_old_cursor_is_clamped_to_lookback() {
    let mut store = MemoryContextStore::new();
    context::write_last_success(&mut store, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()).unwrap();
    let mut source = FakeSource::new(vec![]);

    run(&mut source, &mut store, false, &settings()).unwrap();

    assert!(source.fetch_calls[0] > Utc::now() - chrono::Duration::hours(2));
}

#[test]
fn test_test_run_never_persists_and_emits_one() {
    let mut store = MemoryContextStore::new();
    let mut source = FakeSource::new(vec![item("a", 1), item("b", 2)]);

    let result = run(&mut source, &mut store, true, &settings()).unwrap();

    assert_eq!(result.alerts.len(), 1);
    assert!(read_seen_ids(&store).unwrap().is_empty());
    assert!(read_last_success(&store).unwrap().is_none());
}

#[test]
fn test_broken_record_skipped_but_raised_on_test_run() {
    let broken = Item { broken: true, ..item("bad", 1) };

    let mut store = MemoryContextStore::new();
    let mut source = FakeSource::new(vec![broken.clone(), item("ok", 2)]);
    let result = run(&mut source, &mut store, false, &settings()).unwrap();
    assert_eq!(result.failed, 1);
    assert_eq!(result.alerts.len(), 1);

    let mut store = MemoryContextStore::new();
    let mut source = FakeSource::new(vec![broken, item("ok", 2)]);
    let err = run(&mut source, &mut store, true, &settings()).unwrap_err();
    assert_eq!(err.to_string(), "cannot convert bad");
}

#[test]
fn test_dynamic_list_allow_and_block() {
    let mut source_items = vec![item("a", 1), item("b", 2)];
    source_items[1].rule = "Phishing";

    let mut allow = settings();
    allow.rule_filter = RuleFilter::new(vec!["phishing".to_string()], false);
    let mut store = MemoryContextStore::new();
    let result = run(&mut FakeSource::new(source_items.clone()), &mut store, false, &allow).unwrap();
    assert_eq!(result.alerts.len(), 1);
    assert_eq!(result.alerts[0].ticket_id, "b");
    // Filtered records are still remembered
    assert_eq!(read_seen_ids(&store).unwrap().len(), 2);

    let mut block = settings();
    block.rule_filter = RuleFilter::new(vec!["Phishing".to_string()], true);
    let mut store = MemoryContextStore::new();
    let result = run(&mut FakeSource::new(source_items), &mut store, false, &block).unwrap();
    assert_eq!(result.alerts[0].ticket_id, "a");
}

#[test]
fn test_limit_caps_processed_records() {
    let mut limited = settings();
    limited.max_records = 2;
    let mut store = MemoryContextStore::new();
    let mut source = FakeSource::new(vec![item("a", 1), item("b", 2), item("c", 3)]);

    let result = run(&mut source, &mut store, false, &limited).unwrap();
    assert_eq!(result.alerts.len(), 2);
}

#[test]
fn test_approaching_deadline_stops_gracefully() {
    let mut expired = settings();
    expired.script_timeout = Duration::from_secs(0);
    let mut store = MemoryContextStore::new();
    let mut source = FakeSource::new(vec![item("a", 1)]);

    let result = run(&mut source, &mut store, false, &expired).unwrap();
    assert!(result.timed_out);
    assert!(result.alerts.is_empty());
    assert!(read_seen_ids(&store).unwrap().is_empty());
}

#[test]
fn test_overflow_limiter_caps_per_rule() {
    let mut limiter = OverflowLimiter::new(1);
    let alert = AlertInfo::new("1", "Malware", "V", "P");
    assert!(!limiter.is_overflowed(&alert));
    assert!(limiter.is_overflowed(&alert));
    assert!(!OverflowLimiter::new(0).is_overflowed(&alert));
}

#[test]
fn test_deadline_threshold() {
    assert!(!Deadline::starting_now(Duration::from_secs(60)).is_approaching());

    let deadline = Deadline::starting_now(Duration::from_millis(10));
    std::thread::sleep(Duration::from_millis(20));
    assert!(deadline.is_approaching());
}

#[test]
fn test_derive_id_is_stable() {
    let a = derive_id(&["2024-01-01T00:00:00Z", "evil.com", "host-1"]);
    let b = derive_id(&["2024-01-01T00:00:00Z", "evil.com", "host-1"]);
    let c = derive_id(&["2024-01-01T00:00:00Z", "evil.co", "mhost-1"]);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64);
}
