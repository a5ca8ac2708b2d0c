//! # Waypoint
//!
//! Geocoding tools for AI agents over MCP.
//!
//! Waypoint exposes forward geocoding (`geocode`) and reverse geocoding
//! (`reverse_geocode`) as MCP tools, proxying a free, key-less
//! Nominatim-style service without ever exceeding its usage policy.
//!
//! ## Key Features
//!
//! - **Polite**: at most one upstream call per second, process-wide
//! - **Resilient**: bounded retries on timeouts and transient failures
//! - **Structured**: stable result shapes and machine-readable error kinds
//! - **Optional elevation**: Open Topo Data lookups behind a config flag
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use waypoint::{ToolDispatcher, WaypointConfig};
//! use serde_json::json;
//!
//! let dispatcher = ToolDispatcher::from_config(&WaypointConfig::default())?;
//! let payload = dispatcher
//!     .call("geocode", &json!({ "query": "Tokyo, Japan", "limit": 1 }))
//!     .map_err(|e| anyhow::anyhow!(e))?;
//! println!("{}", payload["results"][0]["display_name"]);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod geo;
pub mod mcp;
pub mod upstream;

// Re-exports for convenience
pub use config::WaypointConfig;
pub use error::{ErrorKind, Result, ToolError, WaypointError};

pub use geo::{GeocodeQuery, GeocodeResponse, LocationResult, ReverseQuery, ReverseResponse};
pub use mcp::{Server, ToolDispatcher};
pub use upstream::{
    ElevationClient, ElevationResponse, HttpTransport, RateLimiter, ReqwestTransport,
    UpstreamClient, MIN_INTERVAL,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamSettings;
    use crate::upstream::http::tests::ScriptedTransport;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn dispatcher_with(transport: &Arc<ScriptedTransport>, interval: Duration) -> ToolDispatcher {
        let mut settings = UpstreamSettings::new("https://geo.example.test");
        settings.retry_backoff_ms = 0;
        let client = UpstreamClient::new(transport.clone(), &settings)
            .with_rate_limiter(RateLimiter::new(interval));
        ToolDispatcher::new(client)
    }

    #[test]
    fn test_back_to_back_invocations_respect_min_interval() {
        let transport = Arc::new(ScriptedTransport::ok("[]"));
        let dispatcher = dispatcher_with(&transport, MIN_INTERVAL);

        let start = Instant::now();
        for query in ["Lisbon", "Porto", "Faro"] {
            dispatcher.call("geocode", &json!({ "query": query })).unwrap();
        }
        let elapsed = start.elapsed();

        assert_eq!(transport.call_count(), 3);
        assert!(elapsed >= MIN_INTERVAL * 2);

        let calls = transport.calls();
        for pair in calls.windows(2) {
            assert!(pair[1].at - pair[0].at >= MIN_INTERVAL);
        }
        let queries: Vec<&str> = calls.iter().filter_map(|c| c.param("q")).collect();
        assert_eq!(queries, vec!["Lisbon", "Porto", "Faro"]);
    }

    #[test]
    fn test_validation_failures_never_touch_upstream() {
        let transport = Arc::new(ScriptedTransport::ok("[]"));
        let dispatcher = dispatcher_with(&transport, Duration::from_millis(1));

        let err = dispatcher
            .call("reverse_geocode", &json!({ "latitude": 91, "longitude": 0 }))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);

        let err = dispatcher.call("geocode", &json!({ "query": "" })).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);

        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn test_search_with_one_bad_record_over_the_wire() {
        let body = r#"[
            {"display_name": "Springfield, IL", "lat": "39.7990", "lon": "-89.6440"},
            {"display_name": "Springfield, MA", "lat": "42.1015", "lon": "-72.5898"},
            {"display_name": "Springfield, ??", "lon": "-93.2923"},
            {"display_name": "Springfield, MO", "lat": "37.2090", "lon": "-93.2923"}
        ]"#;
        let transport = Arc::new(ScriptedTransport::ok(body));
        let dispatcher = dispatcher_with(&transport, Duration::from_millis(1));

        let query = GeocodeQuery::new("Springfield", 10, 40).unwrap();
        let response = dispatcher.geocode(&query).unwrap();
        let names: Vec<&str> = response
            .results
            .iter()
            .map(|r| r.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Springfield, IL", "Springfield, MA", "Springfield, MO"]);
        assert_eq!(response.count, 3);
    }

    #[test]
    fn test_server_over_in_memory_stream() {
        let transport = Arc::new(ScriptedTransport::ok(
            r#"{"display_name": "Null Island", "lat": "0", "lon": "0"}"#,
        ));
        let server = Server::new(dispatcher_with(&transport, Duration::from_millis(1)));

        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"reverse_geocode","arguments":{"latitude":0,"longitude":0}}}"#,
            "\n"
        );
        let mut output = Vec::new();
        server.run(input.as_bytes(), &mut output).unwrap();

        let response: serde_json::Value =
            serde_json::from_str(String::from_utf8(output).unwrap().trim()).unwrap();
        assert_eq!(
            response["result"]["structuredContent"]["result"]["display_name"],
            "Null Island"
        );
    }
}
