//! HTTP transport abstraction for testability.
//!
//! [`UpstreamClient`](super::UpstreamClient) only talks to an
//! [`HttpTransport`]; production uses [`ReqwestTransport`], tests use the
//! scripted transport in [`tests`].

use std::time::Duration;

use thiserror::Error;
use tracing::trace;

use crate::config::UpstreamSettings;
use crate::error::{Result, WaypointError};

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// A request that never produced a response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The per-attempt time bound elapsed.
    #[error("timed out: {0}")]
    Timeout(String),
    /// DNS, connect, TLS or body-read failure.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Synchronous HTTP GET with query parameters.
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str, query: &[(&str, String)])
        -> std::result::Result<HttpResponse, TransportError>;
}

/// Blocking reqwest transport. Timeout and User-Agent are fixed at build time.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(settings: &UpstreamSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| WaypointError::HttpClient(e.to_string()))?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<HttpResponse, TransportError> {
        trace!(url, "GET");
        let response = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .send()
            .map_err(classify)?;

        let status = response.status().as_u16();
        let body = response.text().map_err(classify)?;
        Ok(HttpResponse { status, body })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}
