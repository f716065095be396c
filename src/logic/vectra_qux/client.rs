//! Vectra QUX client

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::types::{Assignment, Detection, Entity, EntityType, Note, Outcome};
use super::{Endpoint, VectraQuxError};
use crate::http::{
    collect_pages, HttpRequest, Page, PageFailure, RestSession, RetryPolicy, SessionSettings,
    TransportFactory,
};
use crate::logic::{items_at, parse_list, parse_valid, RawModel};

const API_PREFIX: &str = "api/v2.5";

/// Records asked for per page
pub const PAGE_SIZE: usize = 100;

/// PCAP downloads share this budget
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static CONTENT_DISPOSITION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"filename\*?=(?:UTF-8'')?"?([^";]+)"?"#).expect("valid filename pattern")
});

/// Filters of the host/account list endpoints
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
    pub name: Option<String>,
    pub state: Option<String>,
    pub threat_gte: Option<i64>,
    pub certainty_gte: Option<i64>,
    /// `YYYY-MM-DDTHH:MM:SS`
    pub last_detection_gte: Option<String>,
    pub note_modified_gte: Option<String>,
    pub tags: Vec<String>,
    pub is_prioritized: Option<bool>,
    pub ordering: Option<String>,
}

impl EntityQuery {
    fn apply(&self, request: HttpRequest) -> HttpRequest {
        let request = request
            .query_opt("name", self.name.as_deref())
            .query_opt("state", self.state.as_deref())
            .query_opt("threat_gte", self.threat_gte)
            .query_opt("certainty_gte", self.certainty_gte)
            .query_opt("last_detection_timestamp_gte", self.last_detection_gte.as_deref())
            .query_opt("note_modified_timestamp_gte", self.note_modified_gte.as_deref())
            .query_opt("is_prioritized", self.is_prioritized)
            .query_opt("ordering", self.ordering.as_deref());
        if self.tags.is_empty() {
            request
        } else {
            request.query("tags", self.tags.join(","))
        }
    }
}

/// Filters of the assignment list endpoint
#[derive(Debug, Clone, Default)]
pub struct AssignmentQuery {
    pub account_ids: Vec<i64>,
    pub host_ids: Vec<i64>,
    pub assignee_ids: Vec<i64>,
    pub outcome_ids: Vec<i64>,
    pub resolved: Option<bool>,
    pub created_after: Option<String>,
}

fn joined(ids: &[i64]) -> Option<String> {
    if ids.is_empty() {
        None
    } else {
        Some(ids.iter().map(i64::to_string).collect::<Vec<_>>().join(","))
    }
}

impl AssignmentQuery {
    fn apply(&self, request: HttpRequest) -> HttpRequest {
        request
            .query_opt("accounts", joined(&self.account_ids))
            .query_opt("hosts", joined(&self.host_ids))
            .query_opt("assignees", joined(&self.assignee_ids))
            .query_opt("resolution", joined(&self.outcome_ids))
            .query_opt("resolved", self.resolved)
            .query_opt("created_after", self.created_after.as_deref())
    }
}

pub struct VectraQuxClient {
    session: RestSession,
}

impl VectraQuxClient {
    pub fn new(
        api_root: &str,
        api_token: &str,
        verify_ssl: bool,
        transports: &dyn TransportFactory,
    ) -> Result<Self, VectraQuxError> {
        let transport = transports.open(&SessionSettings::new(verify_ssl).with_timeout(REQUEST_TIMEOUT))?;
        let session = RestSession::new(api_root, transport)
            .with_header("Authorization", &format!("Token {}", api_token.trim()))
            .with_header("Content-Type", "application/json")
            .with_retry(RetryPolicy::default());
        Ok(Self { session })
    }

    fn url(&self, path: &str) -> String {
        self.session.url(&format!("{}/{}", API_PREFIX, path.trim_start_matches('/')))
    }

    fn send(&self, endpoint: Endpoint, request: HttpRequest) -> Result<Value, VectraQuxError> {
        self.session.dispatch_json(request, endpoint.interpreter())
    }

    /// page/page_size pagination over `{"results": [...], "next": ...}`
    fn list_paged(
        &self,
        endpoint: Endpoint,
        path: &str,
        build: impl Fn(HttpRequest) -> HttpRequest,
        max_results: Option<usize>,
        on_failure: PageFailure,
    ) -> Result<Vec<Value>, VectraQuxError> {
        let page_size = max_results.map_or(PAGE_SIZE, |max| max.clamp(1, PAGE_SIZE));
        collect_pages(max_results, page_size, on_failure, |page| {
            let request = build(HttpRequest::get(self.url(path)))
                .query("page", page.page_number)
                .query("page_size", page.page_size);
            let body = self.send(endpoint, request)?;
            let has_next = body.get("next").map_or(false, |next| !next.is_null());
            Ok(Page::new(items_at(&body, "results"), has_next))
        })
    }

    /// `{"assignment": {...}}` or the bare record
    fn assignment_from(body: Value) -> Result<Assignment, VectraQuxError> {
        let record = body.get("assignment").cloned().unwrap_or(body);
        Ok(Assignment::from_raw(record)?)
    }

    pub fn test_connectivity(&self) -> Result<(), VectraQuxError> {
        let request = HttpRequest::get(self.url("hosts")).query("page", 1).query("page_size", 1);
        self.send(Endpoint::Ping, request)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Entities and detections
    // ------------------------------------------------------------------------

    pub fn get_entity(&self, entity_type: EntityType, id: i64) -> Result<Entity, VectraQuxError> {
        let path = format!("{}/{}", entity_type.collection(), id);
        let body = self.send(Endpoint::DescribeEntity, HttpRequest::get(self.url(&path)))?;
        Ok(Entity::from_raw(body)?)
    }

    pub fn list_entities(
        &self,
        entity_type: EntityType,
        query: &EntityQuery,
        limit: Option<usize>,
        on_failure: PageFailure,
    ) -> Result<Vec<Entity>, VectraQuxError> {
        let items = self.list_paged(
            Endpoint::ListEntities,
            entity_type.collection(),
            |request| query.apply(request),
            limit,
            on_failure,
        )?;
        Ok(parse_valid(items))
    }

    pub fn get_detection(&self, id: i64) -> Result<Detection, VectraQuxError> {
        let path = format!("detections/{}", id);
        let body = self.send(Endpoint::DescribeDetection, HttpRequest::get(self.url(&path)))?;
        Ok(Detection::from_raw(body)?)
    }

    /// Active detections of one host or account
    pub fn list_entity_detections(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        limit: usize,
    ) -> Result<Vec<Detection>, VectraQuxError> {
        let items = self.list_paged(
            Endpoint::ListDetections,
            "detections",
            |request| {
                request
                    .query(entity_type.detection_filter(), entity_id)
                    .query("state", "active")
            },
            Some(limit),
            PageFailure::BestEffort,
        )?;
        Ok(parse_list(items)?)
    }

    pub fn mark_detections_fixed(&self, ids: &[i64]) -> Result<(), VectraQuxError> {
        let request = HttpRequest::patch(self.url("detections"))
            .json(json!({ "detectionIdList": ids, "mark_as_fixed": "True" }));
        self.send(Endpoint::MarkDetectionsFixed, request)?;
        Ok(())
    }

    /// Packet capture of a detection as (file name, bytes)
    pub fn download_pcap(&self, detection_id: i64) -> Result<(String, Vec<u8>), VectraQuxError> {
        let path = format!("detections/{}/pcap", detection_id);
        let response = self
            .session
            .dispatch(HttpRequest::get(self.url(&path)), Endpoint::DownloadPcap.interpreter())?;

        let file_name = response
            .header("Content-Disposition")
            .and_then(|value| CONTENT_DISPOSITION_NAME.captures(value))
            .map(|captures| captures[1].trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("detection_{}.pcap", detection_id));
        Ok((file_name, response.body))
    }

    // ------------------------------------------------------------------------
    // Tags and notes
    // ------------------------------------------------------------------------

    fn tagging(&self, endpoint_kind: &str, id: i64, request: HttpRequest) -> Result<Vec<String>, VectraQuxError> {
        let body = self.send(Endpoint::Tagging, request)?;
        if body.get("status").and_then(Value::as_str) == Some("failure") {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Tagging {} {} failed", endpoint_kind, id));
            return Err(VectraQuxError::Api(message));
        }
        Ok(body
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default())
    }

    /// `kind` is "host", "account" or "detection"
    pub fn get_tags(&self, kind: &str, id: i64) -> Result<Vec<String>, VectraQuxError> {
        let path = format!("tagging/{}/{}", kind, id);
        self.tagging(kind, id, HttpRequest::get(self.url(&path)))
    }

    /// Replace the tag set of a record, returning the stored tags
    pub fn set_tags(&self, kind: &str, id: i64, tags: &[String]) -> Result<Vec<String>, VectraQuxError> {
        let path = format!("tagging/{}/{}", kind, id);
        let request = HttpRequest::patch(self.url(&path)).json(json!({ "tags": tags }));
        self.tagging(kind, id, request)
    }

    /// `collection` is "hosts", "accounts" or "detections"
    pub fn add_note(&self, collection: &str, id: i64, note: &str) -> Result<Note, VectraQuxError> {
        let path = format!("{}/{}/notes", collection, id);
        let request = HttpRequest::post(self.url(&path)).json(json!({ "note": note }));
        Ok(Note::from_raw(self.send(Endpoint::AddNote, request)?)?)
    }

    // ------------------------------------------------------------------------
    // Assignments
    // ------------------------------------------------------------------------

    pub fn list_assignments(
        &self,
        query: &AssignmentQuery,
        limit: Option<usize>,
    ) -> Result<Vec<Assignment>, VectraQuxError> {
        let items = self.list_paged(
            Endpoint::ListAssignments,
            "assignments",
            |request| query.apply(request),
            limit,
            PageFailure::Propagate,
        )?;
        Ok(parse_list(items)?)
    }

    pub fn assign_entity(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        user_id: i64,
    ) -> Result<Assignment, VectraQuxError> {
        let entity_key = format!("assign_{}_id", entity_type.singular());
        let request = HttpRequest::post(self.url("assignments"))
            .json(json!({ entity_key: entity_id, "assign_to_user_id": user_id }));
        Self::assignment_from(self.send(Endpoint::CreateAssignment, request)?)
    }

    pub fn update_assignment(&self, assignment_id: i64, user_id: i64) -> Result<Assignment, VectraQuxError> {
        let path = format!("assignments/{}", assignment_id);
        let request =
            HttpRequest::put(self.url(&path)).json(json!({ "assign_to_user_id": user_id }));
        Self::assignment_from(self.send(Endpoint::UpdateAssignment, request)?)
    }

    pub fn resolve_assignment(
        &self,
        assignment_id: i64,
        outcome_id: i64,
        note: Option<&str>,
        triage_as: Option<&str>,
        detection_ids: &[i64],
    ) -> Result<Assignment, VectraQuxError> {
        let mut body = json!({ "outcome": outcome_id });
        if let Some(map) = body.as_object_mut() {
            if let Some(note) = note {
                map.insert("note".into(), json!(note));
            }
            if let Some(triage_as) = triage_as {
                map.insert("triage_as".into(), json!(triage_as));
                map.insert("detection_ids".into(), json!(detection_ids));
            }
        }

        let path = format!("assignments/{}/resolve", assignment_id);
        let request = HttpRequest::put(self.url(&path)).json(body);
        Self::assignment_from(self.send(Endpoint::ResolveAssignment, request)?)
    }

    pub fn list_outcomes(&self, limit: Option<usize>) -> Result<Vec<Outcome>, VectraQuxError> {
        let items = self.list_paged(
            Endpoint::ListOutcomes,
            "assignment_outcomes",
            |request| request,
            limit,
            PageFailure::Propagate,
        )?;
        Ok(parse_list(items)?)
    }
}
