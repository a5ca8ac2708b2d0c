//! Query and result types for geocoding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

pub fn is_valid_latitude(lat: f64) -> bool {
    lat.is_finite() && lat >= LATITUDE_RANGE.0 && lat <= LATITUDE_RANGE.1
}

pub fn is_valid_longitude(lon: f64) -> bool {
    lon.is_finite() && lon >= LONGITUDE_RANGE.0 && lon <= LONGITUDE_RANGE.1
}

/// Reject coordinates outside WGS84 bounds.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ToolError> {
    if !is_valid_latitude(latitude) {
        return Err(ToolError::invalid_input(format!(
            "Latitude {} must be between {} and {}",
            latitude, LATITUDE_RANGE.0, LATITUDE_RANGE.1
        )));
    }
    if !is_valid_longitude(longitude) {
        return Err(ToolError::invalid_input(format!(
            "Longitude {} must be between {} and {}",
            longitude, LONGITUDE_RANGE.0, LONGITUDE_RANGE.1
        )));
    }
    Ok(())
}

/// A forward geocoding request. Construct through [`GeocodeQuery::new`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeQuery {
    query: String,
    limit: u32,
}

impl GeocodeQuery {
    /// Validates the query text and limit. `max_limit` is the upstream cap.
    pub fn new(query: &str, limit: u32, max_limit: u32) -> Result<Self, ToolError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ToolError::invalid_input(
                "Query must not be empty or whitespace",
            ));
        }
        if limit == 0 || limit > max_limit {
            return Err(ToolError::invalid_input(format!(
                "Limit {} must be between 1 and {}",
                limit, max_limit
            )));
        }
        Ok(Self {
            query: query.to_string(),
            limit,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// A reverse geocoding request with in-range coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReverseQuery {
    latitude: f64,
    longitude: f64,
}

impl ReverseQuery {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ToolError> {
        validate_coordinates(latitude, longitude)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// A single resolved location.
///
/// Only the mapper builds these, from upstream payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResult {
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_type: Option<String>,
    /// `[south, north, west, east]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<[f64; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_address_components: Option<BTreeMap<String, String>>,
}

/// Payload returned by the `geocode` tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<LocationResult>,
}

/// Payload returned by the `reverse_geocode` tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReverseResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub result: LocationResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_geocode_query_trims_and_validates() {
        let q = GeocodeQuery::new("  Tokyo, Japan ", 1, 40).unwrap();
        assert_eq!(q.query(), "Tokyo, Japan");
        assert_eq!(q.limit(), 1);

        assert_eq!(
            GeocodeQuery::new("   \t", 5, 40).unwrap_err().kind,
            ErrorKind::InvalidInput
        );
        assert!(GeocodeQuery::new("Paris", 0, 40).is_err());
        assert!(GeocodeQuery::new("Paris", 41, 40).is_err());
    }

    #[test]
    fn test_reverse_query_bounds_are_inclusive() {
        assert!(ReverseQuery::new(90.0, 180.0).is_ok());
        assert!(ReverseQuery::new(-90.0, -180.0).is_ok());

        let err = ReverseQuery::new(91.0, 0.0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert!(err.message.contains("Latitude"));

        let err = ReverseQuery::new(0.0, -180.5).unwrap_err();
        assert!(err.message.contains("Longitude"));

        assert!(ReverseQuery::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_optional_fields_skipped_when_absent() {
        let result = LocationResult {
            display_name: "Somewhere".to_string(),
            latitude: 1.5,
            longitude: -2.25,
            importance: None,
            place_type: None,
            bounding_box: None,
            raw_address_components: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["latitude"], 1.5);
        assert!(json.get("importance").is_none());
        assert!(json.get("raw_address_components").is_none());
    }
}
