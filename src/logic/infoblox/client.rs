//! Infoblox Threat Defense client

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::types::{CustomList, DescribedItem, DnsSecurityEvent, HostRecord, SecurityPolicy};
use super::{Endpoint, InfobloxError};
use crate::http::{
    collect_pages, HttpRequest, Page, PageFailure, RestSession, RetryPolicy, SessionSettings,
    TransportFactory,
};
use crate::logic::{items_at, parse_list, parse_valid, RawModel};

pub const DEFAULT_API_ROOT: &str = "https://csp.infoblox.com";

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Records asked for per page
pub const PAGE_SIZE: usize = 100;

/// Largest `_limit` the API accepts
pub const MAX_LIMIT: i64 = 10_000;

/// Common filters of the list endpoints
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// `_filter` expression, e.g. `name=="blocked"`
    pub filter: Option<String>,
    /// `_tfilter` tag expression
    pub tag_filter: Option<String>,
    /// `_torder_by` tag sort
    pub tag_sort: Option<String>,
    /// `_order_by`
    pub order_by: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

impl ListQuery {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit, ..Default::default() }
    }

    /// `field=="value"` with the value quoted so it cannot extend the expression
    pub fn equals(field: &str, value: &str) -> String {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("{}==\"{}\"", field, escaped)
    }

    fn apply(&self, request: HttpRequest) -> HttpRequest {
        request
            .query_opt("_filter", self.filter.as_deref())
            .query_opt("_tfilter", self.tag_filter.as_deref())
            .query_opt("_torder_by", self.tag_sort.as_deref())
            .query_opt("_order_by", self.order_by.as_deref())
    }
}

/// Filters of the DNS security event search
#[derive(Debug, Clone, Default)]
pub struct DnsEventQuery {
    pub threat_levels: Vec<String>,
    pub threat_classes: Vec<String>,
    pub queried_name: Option<String>,
    pub policy_action: Option<String>,
}

pub struct InfobloxClient {
    session: RestSession,
}

impl InfobloxClient {
    pub fn new(
        api_root: &str,
        api_key: &str,
        verify_ssl: bool,
        transports: &dyn TransportFactory,
    ) -> Result<Self, InfobloxError> {
        let transport = transports.open(&SessionSettings::new(verify_ssl).with_timeout(REQUEST_TIMEOUT))?;
        let session = RestSession::new(api_root, transport)
            .with_header("Authorization", &format!("Token {}", api_key.trim()))
            .with_header("Content-Type", "application/json")
            .with_retry(RetryPolicy::default());
        Ok(Self { session })
    }

    fn url(&self, endpoint: Endpoint) -> String {
        self.session.url(endpoint.path())
    }

    fn url_for_id(&self, endpoint: Endpoint, id: i64) -> String {
        self.session.url(&endpoint.path().replace("{id}", &id.to_string()))
    }

    fn send(&self, endpoint: Endpoint, request: HttpRequest) -> Result<Value, InfobloxError> {
        self.session.dispatch_json(request, endpoint.interpreter())
    }

    /// Offset/limit pagination over an endpoint returning `{"results": [...]}`
    fn list_paged(
        &self,
        endpoint: Endpoint,
        build: impl Fn(HttpRequest) -> HttpRequest,
        query: &ListQuery,
        results_key: &str,
        on_failure: PageFailure,
    ) -> Result<Vec<Value>, InfobloxError> {
        collect_pages(Some(query.limit), PAGE_SIZE, on_failure, |page| {
            let request = build(HttpRequest::get(self.url(endpoint)))
                .query("_offset", query.offset + page.offset)
                .query("_limit", page.limit);
            let body = self.send(endpoint, request)?;
            Ok(Page::by_size(items_at(&body, results_key), page.limit))
        })
    }

    pub fn test_connectivity(&self) -> Result<(), InfobloxError> {
        self.send(Endpoint::Ping, HttpRequest::get(self.url(Endpoint::Ping)))?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Custom lists
    // ------------------------------------------------------------------------

    pub fn get_custom_lists(&self, query: &ListQuery) -> Result<Vec<CustomList>, InfobloxError> {
        let items = self.list_paged(
            Endpoint::ListCustomLists,
            |request| query.apply(request),
            query,
            "results",
            PageFailure::Propagate,
        )?;
        Ok(parse_list(items)?)
    }

    pub fn get_custom_list(&self, id: i64) -> Result<CustomList, InfobloxError> {
        let request = HttpRequest::get(self.url_for_id(Endpoint::GetCustomList, id));
        let body = self.send(Endpoint::GetCustomList, request)?;
        Ok(CustomList::from_raw(body.get("results").cloned().unwrap_or(body))?)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_custom_list(
        &self,
        name: &str,
        list_type: &str,
        items: &[String],
        description: Option<&str>,
        confidence_level: Option<&str>,
        threat_level: Option<&str>,
        tags: Option<Value>,
    ) -> Result<CustomList, InfobloxError> {
        let described: Vec<DescribedItem> = items
            .iter()
            .map(|item| DescribedItem { item: item.clone(), description: String::new() })
            .collect();

        let mut body = json!({
            "name": name,
            "type": list_type,
            "items_described": described,
        });
        if let Some(map) = body.as_object_mut() {
            if let Some(description) = description {
                map.insert("description".into(), json!(description));
            }
            if let Some(level) = confidence_level {
                map.insert("confidence_level".into(), json!(level.to_uppercase()));
            }
            if let Some(level) = threat_level {
                map.insert("threat_level".into(), json!(level.to_uppercase()));
            }
            if let Some(tags) = tags {
                map.insert("tags".into(), tags);
            }
        }

        let request = HttpRequest::post(self.url(Endpoint::CreateCustomList)).json(body);
        let response = self.send(Endpoint::CreateCustomList, request)?;
        Ok(CustomList::from_raw(response.get("results").cloned().unwrap_or(response))?)
    }

    /// Insert items into a custom list
    pub fn add_custom_list_items(&self, id: i64, items: &[String]) -> Result<(), InfobloxError> {
        let described: Vec<DescribedItem> = items
            .iter()
            .map(|item| DescribedItem { item: item.clone(), description: String::new() })
            .collect();
        let request = HttpRequest::patch(self.url_for_id(Endpoint::UpdateCustomListItems, id))
            .json(json!({ "inserted_items_described": described }));
        self.send(Endpoint::UpdateCustomListItems, request)?;
        Ok(())
    }

    /// Delete items from a custom list
    pub fn remove_custom_list_items(&self, id: i64, items: &[String]) -> Result<(), InfobloxError> {
        let described: Vec<Value> = items.iter().map(|item| json!({ "item": item })).collect();
        let request = HttpRequest::patch(self.url_for_id(Endpoint::UpdateCustomListItems, id))
            .json(json!({ "deleted_items_described": described }));
        self.send(Endpoint::UpdateCustomListItems, request)?;
        Ok(())
    }

    pub fn remove_custom_list(&self, id: i64) -> Result<(), InfobloxError> {
        let request = HttpRequest::delete(self.url_for_id(Endpoint::RemoveCustomList, id));
        self.send(Endpoint::RemoveCustomList, request)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Policies and hosts
    // ------------------------------------------------------------------------

    pub fn get_security_policies(&self, query: &ListQuery) -> Result<Vec<SecurityPolicy>, InfobloxError> {
        let items = self.list_paged(
            Endpoint::ListSecurityPolicies,
            |request| query.apply(request),
            query,
            "results",
            PageFailure::Propagate,
        )?;
        Ok(parse_list(items)?)
    }

    pub fn host_lookup(&self, query: &ListQuery) -> Result<Vec<HostRecord>, InfobloxError> {
        let items = self.list_paged(
            Endpoint::HostLookup,
            |request| query.apply(request),
            query,
            "results",
            PageFailure::Propagate,
        )?;
        Ok(parse_list(items)?)
    }

    // ------------------------------------------------------------------------
    // DNS security events
    // ------------------------------------------------------------------------

    /// Events between `since` and `until`, oldest first, best effort past the first page
    pub fn get_dns_events(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        filters: &DnsEventQuery,
        limit: usize,
    ) -> Result<Vec<DnsSecurityEvent>, InfobloxError> {
        let query = ListQuery::new(0, limit);
        let items = self.list_paged(
            Endpoint::DnsEvents,
            |request| {
                let mut request = request
                    .query("t0", since.timestamp())
                    .query("t1", until.timestamp())
                    .query_opt("qname", filters.queried_name.as_deref())
                    .query_opt("policy_action", filters.policy_action.as_deref());
                if !filters.threat_levels.is_empty() {
                    request = request.query("threat_level", filters.threat_levels.join(","));
                }
                if !filters.threat_classes.is_empty() {
                    request = request.query("threat_class", filters.threat_classes.join(","));
                }
                request
            },
            &query,
            "result",
            PageFailure::BestEffort,
        )?;

        // One malformed event must not hide the rest of the batch
        let mut events: Vec<DnsSecurityEvent> = parse_valid(items);
        events.sort_by_key(|event| event.time());
        Ok(events)
    }
}
