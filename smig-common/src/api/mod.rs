//! Blocking HTTP clients for the two REST APIs.
//!
//! The whole pipeline is strictly sequential, so the transport is a plain
//! blocking [`ureq::Agent`] configured to hand back non-2xx statuses as
//! data instead of errors — "already exists" responses are an expected,
//! classifiable outcome, not a fault.

pub mod cloud;
pub mod server;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

use crate::errors::{MigrateError, Result};

pub use cloud::CloudApi;
pub use server::ServerApi;

/// One HTTP exchange, status preserved.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Shared transport: one agent plus a precomputed Basic authorization
/// header. Credentials never appear in URLs or log lines.
pub struct HttpTransport {
    agent: ureq::Agent,
    authorization: String,
}

impl HttpTransport {
    pub fn new(username: &str, secret: &str) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        let credentials = BASE64.encode(format!("{username}:{secret}"));
        Self {
            agent,
            authorization: format!("Basic {credentials}"),
        }
    }

    pub fn get(&self, url: &str) -> Result<ApiResponse> {
        let response = self
            .agent
            .get(url)
            .header("Authorization", self.authorization.as_str())
            .header("Accept", "application/json")
            .call()?;
        Self::collect(response)
    }

    pub fn put_json(&self, url: &str, payload: &Value) -> Result<ApiResponse> {
        let response = self
            .agent
            .put(url)
            .header("Authorization", self.authorization.as_str())
            .header("Accept", "application/json")
            .send_json(payload)?;
        Self::collect(response)
    }

    pub fn post_json(&self, url: &str, payload: &Value) -> Result<ApiResponse> {
        let response = self
            .agent
            .post(url)
            .header("Authorization", self.authorization.as_str())
            .header("Accept", "application/json")
            .send_json(payload)?;
        Self::collect(response)
    }

    pub fn put_empty(&self, url: &str) -> Result<ApiResponse> {
        let response = self
            .agent
            .put(url)
            .header("Authorization", self.authorization.as_str())
            .header("Accept", "application/json")
            .send_empty()?;
        Self::collect(response)
    }

    pub fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<ApiResponse> {
        let response = self
            .agent
            .post(url)
            .header("Authorization", self.authorization.as_str())
            .send_form(fields.iter().copied())?;
        Self::collect(response)
    }

    fn collect(mut response: ureq::http::Response<ureq::Body>) -> Result<ApiResponse> {
        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        Ok(ApiResponse { status, body })
    }
}

/// Turn a non-success listing response into the terminal error for its
/// inventory.
pub(crate) fn status_error(url: &str, response: &ApiResponse) -> MigrateError {
    MigrateError::Status {
        status: response.status,
        url: url.to_string(),
        body: response.body.clone(),
    }
}
