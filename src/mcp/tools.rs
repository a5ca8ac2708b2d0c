//! MCP tool implementations — validates arguments and maps tool calls to
//! upstream lookups.
//!
//! Argument validation happens before any network call. Errors from the
//! upstream layer pass through untouched: no extra retries, no suppression.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::types::{ToolDefinition, ToolsCallResult};
use crate::config::{WaypointConfig, DEFAULT_LIMIT, MAX_LIMIT};
use crate::error::{Result, ToolError};
use crate::geo::{
    map_reverse, map_search, GeocodeQuery, GeocodeResponse, ReverseQuery, ReverseResponse,
};
use crate::upstream::{ElevationClient, ElevationResponse, UpstreamClient};

pub const GEOCODE: &str = "geocode";
pub const REVERSE_GEOCODE: &str = "reverse_geocode";
pub const GET_ELEVATION: &str = "get_elevation";

pub struct ToolDispatcher {
    geocoder: UpstreamClient,
    elevation: Option<ElevationClient>,
    default_limit: u32,
    max_limit: u32,
}

impl ToolDispatcher {
    pub fn new(geocoder: UpstreamClient) -> Self {
        Self {
            geocoder,
            elevation: None,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }

    /// Build the dispatcher and its HTTP clients from configuration.
    pub fn from_config(config: &WaypointConfig) -> Result<Self> {
        let geocoder = UpstreamClient::from_settings(&config.geocoder.upstream())?
            .with_language(config.geocoder.language.clone());
        let mut dispatcher = Self::new(geocoder)
            .with_limits(config.geocoder.default_limit, config.geocoder.max_limit);

        if config.elevation.enabled {
            dispatcher = dispatcher.with_elevation(ElevationClient::from_config(&config.elevation)?);
        }

        info!(
            geocoder = %dispatcher.geocoder.base_url(),
            elevation = dispatcher.elevation.is_some(),
            "tool dispatcher ready"
        );
        Ok(dispatcher)
    }

    pub fn with_limits(mut self, default_limit: u32, max_limit: u32) -> Self {
        self.default_limit = default_limit;
        self.max_limit = max_limit;
        self
    }

    pub fn with_elevation(mut self, elevation: ElevationClient) -> Self {
        self.elevation = Some(elevation);
        self
    }

    /// Return the list of all available tools with their JSON schemas.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut tools = vec![
            ToolDefinition {
                name: GEOCODE.to_string(),
                description: "Convert an address or place name into coordinates. \
                    Returns matches in the provider's relevance order, each with a display \
                    name, latitude, longitude, importance and address components. \
                    An empty result list means nothing matched."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Free-text address or place (e.g., 'Tokyo, Japan', '10 Downing Street, London'). 'address' is accepted as an alias."
                        },
                        "limit": {
                            "type": "integer",
                            "description": format!("Maximum results to return (default: {})", self.default_limit),
                            "minimum": 1,
                            "maximum": self.max_limit,
                            "default": self.default_limit
                        }
                    },
                    "required": ["query"]
                }),
                output_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string" },
                        "count": { "type": "integer" },
                        "results": { "type": "array", "items": location_schema() }
                    },
                    "required": ["query", "count", "results"]
                }),
            },
            ToolDefinition {
                name: REVERSE_GEOCODE.to_string(),
                description: "Convert latitude/longitude into the nearest address. \
                    Fails with NoResults when there is no addressable location there."
                    .to_string(),
                input_schema: coordinates_schema(json!({})),
                output_schema: json!({
                    "type": "object",
                    "properties": {
                        "latitude": { "type": "number" },
                        "longitude": { "type": "number" },
                        "result": location_schema()
                    },
                    "required": ["latitude", "longitude", "result"]
                }),
            },
        ];

        if let Some(elevation) = &self.elevation {
            tools.push(ToolDefinition {
                name: GET_ELEVATION.to_string(),
                description: "Get the ground elevation at a point in meters and feet."
                    .to_string(),
                input_schema: coordinates_schema(json!({
                    "dataset": {
                        "type": "string",
                        "description": format!(
                            "Elevation dataset (e.g., srtm90m, srtm30m, aster30m, etopo1; default: {})",
                            elevation.default_dataset()
                        )
                    }
                })),
                output_schema: json!({
                    "type": "object",
                    "properties": {
                        "found": { "type": "boolean" },
                        "latitude": { "type": "number" },
                        "longitude": { "type": "number" },
                        "elevation_meters": { "type": ["number", "null"] },
                        "elevation_feet": { "type": ["number", "null"] },
                        "dataset": { "type": "string" },
                        "message": { "type": "string" }
                    },
                    "required": ["found", "latitude", "longitude", "dataset"]
                }),
            });
        }

        tools
    }

    /// Dispatch a tool call and wrap the outcome for the transport.
    pub fn call_tool(&self, name: &str, arguments: &Value) -> ToolsCallResult {
        match self.call(name, arguments) {
            Ok(payload) => ToolsCallResult::success(payload),
            Err(err) => {
                info!(tool = %name, kind = %err.kind, error = %err.message, "tool call failed");
                ToolsCallResult::error(json!({ "error": err }))
            }
        }
    }

    /// Dispatch a tool call by name, returning the JSON payload.
    pub fn call(&self, name: &str, arguments: &Value) -> std::result::Result<Value, ToolError> {
        debug!(tool = %name, "dispatching tool call");
        let empty = Map::new();
        let args = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(ToolError::invalid_input("Tool arguments must be an object")),
        };

        match name {
            GEOCODE => {
                let query = required_str(args, &["query", "address"])?;
                let limit = optional_limit(args, self.default_limit, self.max_limit)?;
                let query = GeocodeQuery::new(query, limit, self.max_limit)?;
                to_payload(&self.geocode(&query)?)
            }
            REVERSE_GEOCODE => {
                let latitude = required_f64(args, &["latitude", "lat"])?;
                let longitude = required_f64(args, &["longitude", "lon", "lng"])?;
                let query = ReverseQuery::new(latitude, longitude)?;
                to_payload(&self.reverse_geocode(&query)?)
            }
            GET_ELEVATION if self.elevation.is_some() => {
                let latitude = required_f64(args, &["latitude", "lat"])?;
                let longitude = required_f64(args, &["longitude", "lon", "lng"])?;
                let dataset = optional_str(args, "dataset")?;
                to_payload(&self.get_elevation(latitude, longitude, dataset)?)
            }
            _ => Err(ToolError::invalid_input(format!("Unknown tool: {}", name))),
        }
    }

    pub fn geocode(&self, query: &GeocodeQuery) -> std::result::Result<GeocodeResponse, ToolError> {
        let raw = self.geocoder.search(query.query(), query.limit())?;
        let results = map_search(&raw, query.limit())?;
        debug!(query = %query.query(), count = results.len(), "geocode complete");
        Ok(GeocodeResponse {
            query: query.query().to_string(),
            count: results.len(),
            results,
        })
    }

    pub fn reverse_geocode(
        &self,
        query: &ReverseQuery,
    ) -> std::result::Result<ReverseResponse, ToolError> {
        let raw = self.geocoder.reverse(query.latitude(), query.longitude())?;
        let result = map_reverse(&raw)?;
        Ok(ReverseResponse {
            latitude: query.latitude(),
            longitude: query.longitude(),
            result,
        })
    }

    pub fn get_elevation(
        &self,
        latitude: f64,
        longitude: f64,
        dataset: Option<&str>,
    ) -> std::result::Result<ElevationResponse, ToolError> {
        match &self.elevation {
            Some(elevation) => elevation.get_elevation(latitude, longitude, dataset),
            None => Err(ToolError::invalid_input("Elevation lookups are not enabled")),
        }
    }
}

fn location_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "display_name": { "type": "string" },
            "latitude": { "type": "number" },
            "longitude": { "type": "number" },
            "importance": { "type": "number" },
            "place_type": { "type": "string" },
            "bounding_box": {
                "type": "array",
                "items": { "type": "number" },
                "description": "[south, north, west, east]"
            },
            "raw_address_components": {
                "type": "object",
                "additionalProperties": { "type": "string" }
            }
        },
        "required": ["display_name", "latitude", "longitude"]
    })
}

fn coordinates_schema(extra: Value) -> Value {
    let mut properties = json!({
        "latitude": {
            "type": "number",
            "description": "Latitude in decimal degrees",
            "minimum": -90,
            "maximum": 90
        },
        "longitude": {
            "type": "number",
            "description": "Longitude in decimal degrees",
            "minimum": -180,
            "maximum": 180
        }
    });
    if let (Some(props), Value::Object(extra)) = (properties.as_object_mut(), extra) {
        props.extend(extra);
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": ["latitude", "longitude"]
    })
}

fn to_payload<T: Serialize>(value: &T) -> std::result::Result<Value, ToolError> {
    serde_json::to_value(value)
        .map_err(|e| ToolError::malformed(format!("Failed to encode result: {}", e)))
}

fn lookup<'a>(args: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| args.get(*key))
        .filter(|value| !value.is_null())
}

fn required_str<'a>(
    args: &'a Map<String, Value>,
    keys: &[&str],
) -> std::result::Result<&'a str, ToolError> {
    match lookup(args, keys) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ToolError::invalid_input(format!(
            "Parameter '{}' must be a string",
            keys[0]
        ))),
        None => Err(ToolError::invalid_input(format!(
            "Missing required parameter: {}",
            keys[0]
        ))),
    }
}

fn optional_str<'a>(
    args: &'a Map<String, Value>,
    key: &str,
) -> std::result::Result<Option<&'a str>, ToolError> {
    match lookup(args, &[key]) {
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ToolError::invalid_input(format!(
            "Parameter '{}' must be a string",
            key
        ))),
        None => Ok(None),
    }
}

fn required_f64(args: &Map<String, Value>, keys: &[&str]) -> std::result::Result<f64, ToolError> {
    match lookup(args, keys) {
        Some(value) => value.as_f64().ok_or_else(|| {
            ToolError::invalid_input(format!("Parameter '{}' must be a number", keys[0]))
        }),
        None => Err(ToolError::invalid_input(format!(
            "Missing required parameter: {}",
            keys[0]
        ))),
    }
}

fn optional_limit(
    args: &Map<String, Value>,
    default_limit: u32,
    max_limit: u32,
) -> std::result::Result<u32, ToolError> {
    let Some(value) = lookup(args, &["limit"]) else {
        return Ok(default_limit);
    };
    let limit = value
        .as_i64()
        .ok_or_else(|| ToolError::invalid_input("Parameter 'limit' must be an integer"))?;
    if limit < 1 {
        return Err(ToolError::invalid_input(format!(
            "Limit {} must be between 1 and {}",
            limit, max_limit
        )));
    }
    Ok(u32::try_from(limit).unwrap_or(u32::MAX))
}
