//! Recorded Future Connect and playbook alert client

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use super::types::{AlertUpdate, EntityKind, Enrichment, PlaybookAlert, PlaybookAlertSummary, PlaybookAlertUpdate, RfAlert};
use super::{Endpoint, RecordedFutureError};
use crate::http::{
    collect_pages, HttpRequest, Page, PageFailure, PageRequest, RestSession, RetryPolicy, SessionSettings,
    TransportFactory,
};
use crate::logic::{items_at, parse_valid, RawModel};

pub const DEFAULT_API_ROOT: &str = "https://api.recordedfuture.com";

/// Records asked for per playbook alert search page
pub const PLAYBOOK_PAGE_SIZE: usize = 100;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const ENRICH_FIELDS: &str = "entity,risk,intelCard";
const PING_IP: &str = "8.8.8.8";

/// Filters of the playbook alert search
#[derive(Debug, Clone, Default)]
pub struct PlaybookSearch {
    pub categories: Vec<String>,
    pub statuses: Vec<String>,
    pub priorities: Vec<String>,
    pub created_from: Option<DateTime<Utc>>,
}

impl PlaybookSearch {
    fn body(&self, from: usize, limit: usize) -> Value {
        let mut body = json!({
            "from": from,
            "limit": limit,
            "order_by": "created",
            "direction": "asc",
        });
        if let Some(map) = body.as_object_mut() {
            if let Some(created) = self.created_from {
                map.insert(
                    "created_range".into(),
                    json!({ "from": created.to_rfc3339_opts(SecondsFormat::Secs, true) }),
                );
            }
            if !self.categories.is_empty() {
                map.insert("category".into(), json!(self.categories));
            }
            if !self.statuses.is_empty() {
                map.insert("statuses".into(), json!(self.statuses));
            }
            if !self.priorities.is_empty() {
                map.insert("priority".into(), json!(self.priorities));
            }
        }
        body
    }
}

/// Analyst note to publish
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalystNote {
    pub title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

pub struct RecordedFutureClient {
    session: RestSession,
}

impl RecordedFutureClient {
    pub fn new(
        api_root: &str,
        api_key: &str,
        verify_ssl: bool,
        transports: &dyn TransportFactory,
    ) -> Result<Self, RecordedFutureError> {
        let transport = transports.open(&SessionSettings::new(verify_ssl).with_timeout(REQUEST_TIMEOUT))?;
        let session = RestSession::new(api_root, transport)
            .with_header("X-RFToken", api_key.trim())
            .with_header("Content-Type", "application/json")
            .with_retry(RetryPolicy::default());
        Ok(Self { session })
    }

    fn send(&self, endpoint: Endpoint, request: HttpRequest) -> Result<Value, RecordedFutureError> {
        self.session.dispatch_json(request, endpoint.interpreter())
    }

    /// `data` of a response, or the whole body when there is none
    fn data(body: Value) -> Value {
        match body {
            Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or_default(),
            other => other,
        }
    }

    pub fn test_connectivity(&self) -> Result<(), RecordedFutureError> {
        let url = self.session.url_with_segments(EntityKind::Ip.path(), &[PING_IP])?;
        self.send(Endpoint::Ping, HttpRequest::get(url).query("fields", "entity"))?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Enrichment
    // ------------------------------------------------------------------------

    pub fn enrich(&self, kind: EntityKind, value: &str) -> Result<Enrichment, RecordedFutureError> {
        let url = self.session.url_with_segments(kind.path(), &[value.trim()])?;
        let body = self.send(Endpoint::Enrich, HttpRequest::get(url).query("fields", ENRICH_FIELDS))?;
        Ok(Enrichment::from_raw(Self::data(body))?)
    }

    // ------------------------------------------------------------------------
    // Alerts
    // ------------------------------------------------------------------------

    pub fn get_alert(&self, alert_id: &str) -> Result<RfAlert, RecordedFutureError> {
        let url = self.session.url_with_segments("v3/alerts", &[alert_id.trim()])?;
        let body = self.send(Endpoint::AlertDetails, HttpRequest::get(url))?;
        Ok(RfAlert::from_raw(Self::data(body))?)
    }

    /// Per-alert failures come back in the `error` list of a 200 response
    pub fn update_alerts(&self, updates: &[AlertUpdate]) -> Result<Value, RecordedFutureError> {
        let body = serde_json::to_value(updates)
            .map_err(|e| RecordedFutureError::Validation(e.to_string()))?;
        let request = HttpRequest::post(self.session.url("v2/alert/update")).json(body);
        let response = self.send(Endpoint::UpdateAlert, request)?;

        if let Some(first) = response.get("error").and_then(Value::as_array).and_then(|e| e.first()) {
            let reason = first
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| first.to_string());
            return Err(RecordedFutureError::Api(reason));
        }
        Ok(response)
    }

    // ------------------------------------------------------------------------
    // Playbook alerts
    // ------------------------------------------------------------------------

    pub fn get_playbook_alert(&self, category: &str, alert_id: &str) -> Result<PlaybookAlert, RecordedFutureError> {
        let url = self
            .session
            .url_with_segments("playbook-alert", &[category.trim(), alert_id.trim()])?;
        let body = self.send(Endpoint::PlaybookAlertDetails, HttpRequest::get(url))?;
        Ok(PlaybookAlert::from_raw(Self::data(body))?)
    }

    pub fn update_playbook_alert(
        &self,
        alert_id: &str,
        update: &PlaybookAlertUpdate,
    ) -> Result<Value, RecordedFutureError> {
        let body = serde_json::to_value(update)
            .map_err(|e| RecordedFutureError::Validation(e.to_string()))?;
        let url = self.session.url_with_segments("playbook-alert/common", &[alert_id.trim()])?;
        let response = self.send(Endpoint::UpdatePlaybookAlert, HttpRequest::put(url).json(body))?;
        Ok(Self::data(response))
    }

    /// Oldest first, `from`/`limit` paging
    pub fn search_playbook_alerts(
        &self,
        search: &PlaybookSearch,
        max_results: Option<usize>,
        on_failure: PageFailure,
    ) -> Result<Vec<PlaybookAlertSummary>, RecordedFutureError> {
        let fetch = |page: PageRequest| -> Result<Page, RecordedFutureError> {
            let request = HttpRequest::post(self.session.url("playbook-alert/search"))
                .json(search.body(page.offset, page.limit));
            let body = self.send(Endpoint::SearchPlaybookAlerts, request)?;
            Ok(Page::by_size(items_at(&body, "data"), page.limit))
        };
        let items = collect_pages(max_results, PLAYBOOK_PAGE_SIZE, on_failure, fetch)?;
        Ok(parse_valid(items))
    }

    // ------------------------------------------------------------------------
    // Analyst notes
    // ------------------------------------------------------------------------

    /// Returns the ID of the published note
    pub fn publish_note(&self, note: &AnalystNote) -> Result<String, RecordedFutureError> {
        let attributes = serde_json::to_value(note)
            .map_err(|e| RecordedFutureError::Validation(e.to_string()))?;
        let request = HttpRequest::post(self.session.url("v2/analystnote/publish"))
            .json(json!({ "attributes": attributes }));
        let body = self.send(Endpoint::PublishNote, request)?;
        body.get("note_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RecordedFutureError::Api("Recorded Future did not return a note ID".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockTransport;
    use crate::http::Method;
    use chrono::TimeZone;

    fn client(mock: &MockTransport) -> RecordedFutureClient {
        RecordedFutureClient::new(DEFAULT_API_ROOT, "rf-token", true, mock).unwrap()
    }

    #[test]
    fn test_enrich_url_and_token() {
        let mock = MockTransport::new();
        mock.on(
            Method::Get,
            "/v2/url/https:%2F%2Fevil.test%2Fa",
            200,
            json!({"data": {"entity": {"name": "https://evil.test/a"}, "risk": {"score": 80}}}),
        );

        let enrichment = client(&mock).enrich(EntityKind::Url, "https://evil.test/a").unwrap();

        assert_eq!(enrichment.risk.score, 80);
        let request = &mock.requests()[0];
        assert_eq!(request.header_value("X-RFToken"), Some("rf-token"));
        assert_eq!(request.query_value("fields"), Some(ENRICH_FIELDS));
        assert_eq!(mock.sessions()[0].timeout, Some(REQUEST_TIMEOUT));
    }

    #[test]
    fn test_update_alert_error_list() {
        let mock = MockTransport::new();
        mock.on(
            Method::Post,
            "/v2/alert/update",
            200,
            json!({"success": [], "error": [{"id": "a1", "reason": "Alert not found"}]}),
        );
        let update = AlertUpdate { id: "a1".into(), status: Some("Resolved".into()), ..Default::default() };

        let err = client(&mock).update_alerts(&[update]).unwrap_err();

        assert!(matches!(err, RecordedFutureError::Api(ref m) if m == "Alert not found"));
        assert_eq!(mock.requests()[0].body, Some(json!([{"id": "a1", "status": "Resolved"}])));
    }

    #[test]
    fn test_search_body_and_paging() {
        let mock = MockTransport::new();
        let page: Vec<Value> = (0..PLAYBOOK_PAGE_SIZE)
            .map(|i| json!({"playbook_alert_id": format!("task:{}", i), "category": "domain_abuse"}))
            .collect();
        mock.on(Method::Post, "/playbook-alert/search", 200, json!({"data": page}));
        mock.on(Method::Post, "/playbook-alert/search", 200, json!({"data": [{"playbook_alert_id": "task:x"}]}));
        let search = PlaybookSearch {
            categories: vec!["domain_abuse".into()],
            created_from: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };

        let alerts = client(&mock)
            .search_playbook_alerts(&search, Some(150), PageFailure::Propagate)
            .unwrap();

        assert_eq!(alerts.len(), 101);
        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        let second = requests[1].body.clone().unwrap();
        assert_eq!(second["from"], 100);
        assert_eq!(second["limit"], 50);
        assert_eq!(second["category"], json!(["domain_abuse"]));
        assert_eq!(second["created_range"]["from"], "2024-05-01T00:00:00Z");
        assert!(second.get("statuses").is_none());
    }

    #[test]
    fn test_publish_note_requires_id() {
        let mock = MockTransport::new();
        mock.on(Method::Post, "/v2/analystnote/publish", 200, json!({}));
        let note = AnalystNote { title: "t".into(), text: "x".into(), topic: None };

        let err = client(&mock).publish_note(&note).unwrap_err();
        assert_eq!(err.to_string(), "Recorded Future did not return a note ID");
    }
}
