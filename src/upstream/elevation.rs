//! Elevation lookups against an Open Topo Data compatible service.
//!
//! `GET /v1/<dataset>?locations=<lat>,<lon>` returns
//! `{"status": "OK", "results": [{"dataset", "elevation", "location": {"lat", "lng"}}]}`.
//! A null elevation (e.g. open ocean on a land-only dataset) or an empty
//! result list is a successful "not found", not an error.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::client::UpstreamClient;
use crate::config::ElevationConfig;
use crate::error::{Result, ToolError};
use crate::geo::validate_coordinates;

pub const FEET_PER_METER: f64 = 3.28084;

pub fn meters_to_feet(meters: f64) -> f64 {
    meters * FEET_PER_METER
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElevationResponse {
    pub found: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_meters: Option<f64>,
    pub elevation_feet: Option<f64>,
    pub dataset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct ElevationClient {
    client: UpstreamClient,
    default_dataset: String,
}

impl ElevationClient {
    pub fn new(client: UpstreamClient, default_dataset: impl Into<String>) -> Self {
        Self {
            client,
            default_dataset: default_dataset.into(),
        }
    }

    pub fn from_config(config: &ElevationConfig) -> Result<Self> {
        let client = UpstreamClient::from_settings(&config.upstream())?;
        Ok(Self::new(client, config.default_dataset.clone()))
    }

    pub fn default_dataset(&self) -> &str {
        &self.default_dataset
    }

    /// Look up the elevation at a point. `dataset` falls back to the
    /// configured default.
    pub fn get_elevation(
        &self,
        latitude: f64,
        longitude: f64,
        dataset: Option<&str>,
    ) -> std::result::Result<ElevationResponse, ToolError> {
        validate_coordinates(latitude, longitude)?;
        let dataset = dataset.unwrap_or(&self.default_dataset).trim();
        validate_dataset(dataset)?;

        let raw = self.client.get_json(
            &format!("v1/{}", dataset),
            &[("locations", format!("{},{}", latitude, longitude))],
        )?;
        parse_elevation(&raw, latitude, longitude, dataset)
    }
}

fn validate_dataset(dataset: &str) -> std::result::Result<(), ToolError> {
    let valid = !dataset.is_empty()
        && dataset
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ToolError::invalid_input(format!(
            "Dataset '{}' must be a non-empty name of lowercase letters, digits, '_' or '-'",
            dataset
        )))
    }
}

fn parse_elevation(
    raw: &Value,
    latitude: f64,
    longitude: f64,
    dataset: &str,
) -> std::result::Result<ElevationResponse, ToolError> {
    let status = raw.get("status").and_then(Value::as_str).unwrap_or("");
    if status != "OK" {
        let detail = raw
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("missing status");
        return Err(ToolError::malformed(format!(
            "Elevation API error: {} ({})",
            detail,
            if status.is_empty() { "no status" } else { status }
        )));
    }

    let results = raw
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolError::malformed("Elevation response has no results list"))?;

    let not_found = |message: &str| ElevationResponse {
        found: false,
        latitude,
        longitude,
        elevation_meters: None,
        elevation_feet: None,
        dataset: dataset.to_string(),
        message: Some(message.to_string()),
    };

    let Some(first) = results.first() else {
        debug!(dataset, "elevation lookup returned no results");
        return Ok(not_found("No elevation data available for this location"));
    };

    let meters = match first.get("elevation") {
        Some(Value::Null) | None => {
            return Ok(not_found("Dataset has no elevation value at this location"))
        }
        Some(value) => value
            .as_f64()
            .ok_or_else(|| ToolError::malformed("Elevation value is not numeric"))?,
    };

    // The upstream `location` may be snapped to the dataset grid; the
    // response echoes the requested point.
    Ok(ElevationResponse {
        found: true,
        latitude,
        longitude,
        elevation_meters: Some(meters),
        elevation_feet: Some(meters_to_feet(meters)),
        dataset: first
            .get("dataset")
            .and_then(Value::as_str)
            .unwrap_or(dataset)
            .to_string(),
        message: None,
    })
}
