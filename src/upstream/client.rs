//! Rate-limited, retrying client for the geocoding provider.
//!
//! Every attempt, retries included, passes through the [`RateLimiter`].
//! Attempt outcomes are classified before deciding whether to try again:
//!
//! | outcome                        | retried | terminal kind              |
//! |--------------------------------|---------|----------------------------|
//! | transport timeout              | yes     | `UpstreamTimeout`*         |
//! | connection failure, 429, 5xx   | yes     | `UpstreamUnavailable`      |
//! | other non-2xx status           | no      | `UpstreamUnavailable`      |
//! | 2xx with a non-JSON body       | no      | `UpstreamMalformedResponse`|
//!
//! \* only when every attempt timed out.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use super::http::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
use super::rate_limit::RateLimiter;
use crate::config::{UpstreamSettings, MAX_RETRIES};
use crate::error::{ErrorKind, Result, ToolError};

const BODY_SNIPPET_CHARS: usize = 200;

enum Failure {
    Timeout(String),
    Unavailable(String),
}

enum Attempt {
    Done(Value),
    Retry(Failure),
    Fatal(ToolError),
}

pub struct UpstreamClient {
    transport: Arc<dyn HttpTransport>,
    limiter: RateLimiter,
    base_url: String,
    max_retries: u32,
    backoff: Duration,
    language: Option<String>,
}

impl UpstreamClient {
    pub fn new(transport: Arc<dyn HttpTransport>, settings: &UpstreamSettings) -> Self {
        Self {
            transport,
            limiter: RateLimiter::default(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            max_retries: settings.max_retries.min(MAX_RETRIES),
            backoff: Duration::from_millis(settings.retry_backoff_ms),
            language: None,
        }
    }

    /// Build a client backed by a real reqwest transport.
    pub fn from_settings(settings: &UpstreamSettings) -> Result<Self> {
        let transport = ReqwestTransport::new(settings)?;
        Ok(Self::new(Arc::new(transport), settings))
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Preferred result language, sent as `accept-language`.
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|l| !l.trim().is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /search`. An empty list is a successful response.
    pub fn search(&self, query: &str, limit: u32) -> std::result::Result<Value, ToolError> {
        let mut params = vec![
            ("q", query.to_string()),
            ("format", "json".to_string()),
            ("limit", limit.to_string()),
            ("addressdetails", "1".to_string()),
        ];
        self.push_language(&mut params);
        self.get_json("search", &params)
    }

    /// `GET /reverse`.
    pub fn reverse(&self, latitude: f64, longitude: f64) -> std::result::Result<Value, ToolError> {
        let mut params = vec![
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("format", "json".to_string()),
            ("addressdetails", "1".to_string()),
        ];
        self.push_language(&mut params);
        self.get_json("reverse", &params)
    }

    /// GET `path` under the base URL and parse the body as JSON, with the
    /// rate limit and retry policy applied.
    pub fn get_json(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<Value, ToolError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let attempts = self.max_retries.saturating_add(1);
        let mut failures = Vec::with_capacity(attempts as usize);

        for attempt in 1..=attempts {
            if attempt > 1 && !self.backoff.is_zero() {
                thread::sleep(self.backoff);
            }
            self.limiter.acquire();

            let started = Instant::now();
            let outcome = classify(self.transport.get(&url, params));
            debug!(
                url = %url,
                attempt,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "upstream attempt finished"
            );

            match outcome {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fatal(err) => {
                    warn!(url = %url, attempt, error = %err, "upstream call failed");
                    return Err(err);
                }
                Attempt::Retry(failure) => {
                    let message = match &failure {
                        Failure::Timeout(m) | Failure::Unavailable(m) => m.as_str(),
                    };
                    warn!(url = %url, attempt, attempts, error = %message, "upstream attempt failed");
                    failures.push(failure);
                }
            }
        }

        Err(exhausted(&url, &failures))
    }

    fn push_language(&self, params: &mut Vec<(&str, String)>) {
        if let Some(language) = &self.language {
            params.push(("accept-language", language.clone()));
        }
    }
}

fn classify(result: std::result::Result<HttpResponse, TransportError>) -> Attempt {
    let response = match result {
        Ok(response) => response,
        Err(TransportError::Timeout(msg)) => return Attempt::Retry(Failure::Timeout(msg)),
        Err(TransportError::Connection(msg)) => return Attempt::Retry(Failure::Unavailable(msg)),
    };

    match response.status {
        200..=299 => match serde_json::from_str(&response.body) {
            Ok(value) => Attempt::Done(value),
            Err(e) => Attempt::Fatal(ToolError::malformed(format!(
                "Upstream returned invalid JSON: {}",
                e
            ))),
        },
        429 | 500..=599 => Attempt::Retry(Failure::Unavailable(format!(
            "HTTP {}: {}",
            response.status,
            snippet(&response.body)
        ))),
        status => Attempt::Fatal(ToolError::new(
            ErrorKind::UpstreamUnavailable,
            format!("Upstream rejected the request with HTTP {}: {}", status, snippet(&response.body)),
        )),
    }
}

fn exhausted(url: &str, failures: &[Failure]) -> ToolError {
    let all_timeouts = failures.iter().all(|f| matches!(f, Failure::Timeout(_)));
    let detail = failures
        .iter()
        .enumerate()
        .map(|(i, f)| match f {
            Failure::Timeout(m) => format!("attempt {}: timed out ({})", i + 1, m),
            Failure::Unavailable(m) => format!("attempt {}: {}", i + 1, m),
        })
        .collect::<Vec<_>>()
        .join("; ");

    if all_timeouts {
        ToolError::new(
            ErrorKind::UpstreamTimeout,
            format!("{} timed out after {} attempts: {}", url, failures.len(), detail),
        )
    } else {
        ToolError::new(
            ErrorKind::UpstreamUnavailable,
            format!("{} unavailable after {} attempts: {}", url, failures.len(), detail),
        )
    }
}

fn snippet(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() > BODY_SNIPPET_CHARS {
        let cut: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
        format!("{}...", cut)
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::http::tests::ScriptedTransport;

    fn settings() -> UpstreamSettings {
        let mut settings = UpstreamSettings::new("https://geo.example.test/");
        settings.retry_backoff_ms = 0;
        settings
    }

    fn client(transport: &Arc<ScriptedTransport>) -> UpstreamClient {
        UpstreamClient::new(transport.clone(), &settings())
            .with_rate_limiter(RateLimiter::new(Duration::from_millis(5)))
    }

    fn timeout() -> std::result::Result<HttpResponse, TransportError> {
        Err(TransportError::Timeout("operation timed out".into()))
    }

    #[test]
    fn test_search_sends_expected_request() {
        let transport = Arc::new(ScriptedTransport::ok("[]"));
        let client = client(&transport).with_language(Some("ja".to_string()));

        let value = client.search("Tokyo, Japan", 3).unwrap();
        assert_eq!(value, Value::Array(vec![]));

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "https://geo.example.test/search");
        assert_eq!(calls[0].param("q"), Some("Tokyo, Japan"));
        assert_eq!(calls[0].param("limit"), Some("3"));
        assert_eq!(calls[0].param("format"), Some("json"));
        assert_eq!(calls[0].param("accept-language"), Some("ja"));
    }

    #[test]
    fn test_reverse_sends_coordinates() {
        let transport = Arc::new(ScriptedTransport::ok(r#"{"error":"Unable to geocode"}"#));
        let client = client(&transport);

        client.reverse(35.6762, 139.6503).unwrap();

        let calls = transport.calls();
        assert_eq!(calls[0].url, "https://geo.example.test/reverse");
        assert_eq!(calls[0].param("lat"), Some("35.6762"));
        assert_eq!(calls[0].param("lon"), Some("139.6503"));
        assert_eq!(calls[0].param("accept-language"), None);
    }

    #[test]
    fn test_three_timeouts_give_up_after_three_attempts() {
        let transport = Arc::new(ScriptedTransport::new(vec![timeout(), timeout(), timeout()]));
        let client = client(&transport);

        let err = client.search("Atlantis", 5).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UpstreamTimeout);
        assert_eq!(transport.call_count(), 3);
        assert!(err.message.contains("3 attempts"));
    }

    #[test]
    fn test_mixed_failures_are_unavailable() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            timeout(),
            Err(TransportError::Connection("connection refused".into())),
            ScriptedTransport::status(503, "maintenance"),
        ]));
        let client = client(&transport);

        let err = client.search("Atlantis", 5).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UpstreamUnavailable);
        assert_eq!(transport.call_count(), 3);
        assert!(err.message.contains("connection refused"));
        assert!(err.message.contains("HTTP 503"));
    }

    #[test]
    fn test_transient_failure_then_success() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            ScriptedTransport::status(429, "slow down"),
            ScriptedTransport::status(200, r#"[{"display_name":"x","lat":"1","lon":"2"}]"#),
        ]));
        let client = client(&transport);

        let value = client.search("x", 1).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(1));
        assert_eq!(transport.call_count(), 2);
    }

    #[test]
    fn test_client_error_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![ScriptedTransport::status(
            403,
            "Access blocked: missing User-Agent",
        )]));
        let client = client(&transport);

        let err = client.search("Berlin", 5).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UpstreamUnavailable);
        assert!(err.message.contains("HTTP 403"));
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_invalid_json_is_malformed_and_not_retried() {
        let transport = Arc::new(ScriptedTransport::ok("<html>oops</html>"));
        let client = client(&transport);

        let err = client.reverse(1.0, 2.0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UpstreamMalformedResponse);
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_retries_pass_through_rate_limiter() {
        let interval = Duration::from_millis(40);
        let transport = Arc::new(ScriptedTransport::new(vec![timeout(), timeout(), timeout()]));
        let client = UpstreamClient::new(transport.clone(), &settings())
            .with_rate_limiter(RateLimiter::new(interval));

        let start = Instant::now();
        let _ = client.search("Atlantis", 5);
        assert!(start.elapsed() >= interval * 2);
    }

    #[test]
    fn test_unvalidated_retry_count_is_clamped() {
        let mut settings = settings();
        settings.max_retries = u32::MAX;
        let transport = Arc::new(ScriptedTransport::new(vec![timeout()]));
        let client = UpstreamClient::new(transport.clone(), &settings)
            .with_rate_limiter(RateLimiter::new(Duration::from_millis(1)));

        let err = client.search("x", 1).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UpstreamTimeout);
        assert_eq!(transport.call_count(), MAX_RETRIES as usize + 1);
    }

    #[test]
    fn test_long_bodies_are_truncated_in_messages() {
        let body = "x".repeat(1000);
        let short = snippet(&body);
        assert_eq!(short.chars().count(), BODY_SNIPPET_CHARS + 3);
    }
}
