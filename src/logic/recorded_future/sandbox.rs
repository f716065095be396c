//! Recorded Future Sandbox client (URL detonation)

use std::time::Duration;

use serde_json::{json, Value};

use super::types::{SandboxOverview, SandboxSample};
use super::{Endpoint, RecordedFutureError};
use crate::http::{HttpRequest, RestSession, RetryPolicy, SessionSettings, TransportFactory};
use crate::logic::RawModel;

pub const DEFAULT_SANDBOX_ROOT: &str = "https://sandbox.recordedfuture.com";

/// Sample submission uploads and waits on the sandbox front end
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SAMPLES_PATH: &str = "api/v0/samples";

pub struct SandboxClient {
    session: RestSession,
}

impl SandboxClient {
    pub fn new(
        api_root: &str,
        api_key: &str,
        verify_ssl: bool,
        transports: &dyn TransportFactory,
    ) -> Result<Self, RecordedFutureError> {
        let transport = transports.open(&SessionSettings::new(verify_ssl).with_timeout(REQUEST_TIMEOUT))?;
        let session = RestSession::new(api_root, transport)
            .with_header("Authorization", &format!("Bearer {}", api_key.trim()))
            .with_header("Content-Type", "application/json")
            .with_retry(RetryPolicy::default());
        Ok(Self { session })
    }

    fn send(&self, endpoint: Endpoint, request: HttpRequest) -> Result<Value, RecordedFutureError> {
        self.session.dispatch_json(request, endpoint.interpreter())
    }

    pub fn submit_url(&self, url: &str) -> Result<SandboxSample, RecordedFutureError> {
        let request = HttpRequest::post(self.session.url(SAMPLES_PATH))
            .json(json!({ "kind": "url", "url": url.trim() }));
        Ok(SandboxSample::from_raw(self.send(Endpoint::SandboxSubmit, request)?)?)
    }

    pub fn get_sample(&self, sample_id: &str) -> Result<SandboxSample, RecordedFutureError> {
        let url = self.session.url_with_segments(SAMPLES_PATH, &[sample_id])?;
        Ok(SandboxSample::from_raw(self.send(Endpoint::SandboxSample, HttpRequest::get(url))?)?)
    }

    /// Only available once the sample is `reported`
    pub fn get_overview(&self, sample_id: &str) -> Result<SandboxOverview, RecordedFutureError> {
        let url = self
            .session
            .url_with_segments(SAMPLES_PATH, &[sample_id, "overview.json"])?;
        Ok(SandboxOverview::from_raw(self.send(Endpoint::SandboxOverview, HttpRequest::get(url))?)?)
    }
}
