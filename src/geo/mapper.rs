//! Maps raw upstream JSON into [`LocationResult`]s.
//!
//! Required fields (`lat`, `lon`, a display name) are strict; everything else
//! is optional and ignored when absent or of the wrong type. Field lookup
//! falls back to a case-insensitive match so `Lat`/`LAT` are accepted too.
//! Coordinates may arrive as JSON numbers or numeric strings (Nominatim
//! sends strings).

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use super::types::{is_valid_latitude, is_valid_longitude, LocationResult};
use crate::error::ToolError;

const LAT_KEYS: &[&str] = &["lat", "latitude"];
const LON_KEYS: &[&str] = &["lon", "lng", "longitude"];
const NAME_KEYS: &[&str] = &["display_name", "name", "label"];
const IMPORTANCE_KEYS: &[&str] = &["importance", "confidence"];
const TYPE_KEYS: &[&str] = &["type", "addresstype"];
const BBOX_KEYS: &[&str] = &["boundingbox", "bbox"];
const ADDRESS_KEYS: &[&str] = &["address"];

/// Map a search payload to at most `limit` results, in upstream order.
///
/// Records missing required fields are dropped. A payload that is not a list
/// at all is malformed.
pub fn map_search(raw: &Value, limit: u32) -> Result<Vec<LocationResult>, ToolError> {
    let records = raw.as_array().ok_or_else(|| {
        ToolError::malformed(format!(
            "Expected a list of search results, got {}",
            json_type(raw)
        ))
    })?;

    let mut results = Vec::with_capacity(records.len().min(limit as usize));
    for (index, record) in records.iter().enumerate() {
        if results.len() >= limit as usize {
            break;
        }
        match parse_record(record) {
            Ok(result) => results.push(result),
            Err(reason) => debug!(index, reason = %reason, "dropping malformed search record"),
        }
    }
    Ok(results)
}

/// Map a reverse payload to exactly one result.
///
/// An upstream `error` object, `null` or an empty list means nothing is
/// addressable there (`NoResults`); a record missing required fields is
/// `UpstreamMalformedResponse`.
pub fn map_reverse(raw: &Value) -> Result<LocationResult, ToolError> {
    let record = match raw {
        Value::Null => return Err(ToolError::no_results("No address found at this location")),
        Value::Array(items) => match items.first() {
            Some(first) => first,
            None => return Err(ToolError::no_results("No address found at this location")),
        },
        Value::Object(obj) => {
            if let Some(err) = obj.get("error") {
                let message = err.as_str().unwrap_or("No address found at this location");
                return Err(ToolError::no_results(message));
            }
            raw
        }
        other => {
            return Err(ToolError::malformed(format!(
                "Expected a reverse geocoding object, got {}",
                json_type(other)
            )))
        }
    };

    parse_record(record).map_err(|reason| {
        ToolError::malformed(format!("Reverse geocoding response is invalid: {}", reason))
    })
}

fn parse_record(record: &Value) -> Result<LocationResult, String> {
    let obj = record
        .as_object()
        .ok_or_else(|| format!("record is {}, not an object", json_type(record)))?;

    let latitude = field(obj, LAT_KEYS).ok_or("missing lat")?;
    let latitude = as_f64(latitude).ok_or("lat is not numeric")?;
    let longitude = field(obj, LON_KEYS).ok_or("missing lon")?;
    let longitude = as_f64(longitude).ok_or("lon is not numeric")?;
    if !is_valid_latitude(latitude) {
        return Err(format!("lat {} out of range", latitude));
    }
    if !is_valid_longitude(longitude) {
        return Err(format!("lon {} out of range", longitude));
    }

    let display_name = field(obj, NAME_KEYS)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or("missing display_name")?
        .to_string();

    Ok(LocationResult {
        display_name,
        latitude,
        longitude,
        importance: field(obj, IMPORTANCE_KEYS).and_then(as_f64),
        place_type: field(obj, TYPE_KEYS)
            .and_then(Value::as_str)
            .map(String::from),
        bounding_box: field(obj, BBOX_KEYS).and_then(bounding_box),
        raw_address_components: field(obj, ADDRESS_KEYS).and_then(address_components),
    })
}

/// Exact key first, then a case-insensitive scan.
fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| obj.get(*key)).or_else(|| {
        obj.iter()
            .find(|(k, _)| keys.iter().any(|key| k.eq_ignore_ascii_case(key)))
            .map(|(_, v)| v)
    })
}

fn as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn bounding_box(value: &Value) -> Option<[f64; 4]> {
    let items = value.as_array()?;
    if items.len() != 4 {
        return None;
    }
    let mut bbox = [0.0; 4];
    for (slot, item) in bbox.iter_mut().zip(items) {
        *slot = as_f64(item)?;
    }
    Some(bbox)
}

fn address_components(value: &Value) -> Option<BTreeMap<String, String>> {
    let components: BTreeMap<String, String> = value
        .as_object()?
        .iter()
        .filter_map(|(label, v)| match v {
            Value::String(s) => Some((label.clone(), s.clone())),
            Value::Number(n) => Some((label.clone(), n.to_string())),
            _ => None,
        })
        .collect();
    (!components.is_empty()).then_some(components)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn record(name: &str, lat: &str, lon: &str) -> Value {
        json!({ "display_name": name, "lat": lat, "lon": lon, "importance": 0.5 })
    }

    #[test]
    fn test_drops_record_missing_lat_and_keeps_order() {
        let raw = json!([
            record("First", "1.0", "1.0"),
            { "display_name": "No latitude", "lon": "2.0" },
            record("Second", "3.0", "3.0"),
            record("Third", "4.0", "4.0"),
        ]);

        let results = map_search(&raw, 10).unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_search_truncates_to_limit_without_reordering() {
        let raw = json!([
            { "display_name": "B", "lat": "1", "lon": "1", "importance": 0.1 },
            { "display_name": "A", "lat": "2", "lon": "2", "importance": 0.9 },
            { "display_name": "C", "lat": "3", "lon": "3", "importance": 0.5 },
        ]);

        let results = map_search(&raw, 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].display_name, "B");
        assert_eq!(results[1].display_name, "A");
    }

    #[test]
    fn test_empty_search_is_success() {
        assert!(map_search(&json!([]), 5).unwrap().is_empty());
    }

    #[test]
    fn test_search_payload_not_a_list_is_malformed() {
        let err = map_search(&json!({"error": "boom"}), 5).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UpstreamMalformedResponse);
    }

    #[test]
    fn test_coordinates_preserved_exactly() {
        let raw = json!([{ "display_name": "Tokyo, Japan", "lat": "35.6762", "lon": "139.6503" }]);
        let results = map_search(&raw, 1).unwrap();
        assert_eq!(results[0].latitude, 35.6762);
        assert_eq!(results[0].longitude, 139.6503);

        let raw = json!([{ "name": "Numeric", "lat": -33.8688, "lon": 151.2093 }]);
        let results = map_search(&raw, 1).unwrap();
        assert_eq!(results[0].latitude, -33.8688);
        assert_eq!(results[0].display_name, "Numeric");
    }

    #[test]
    fn test_out_of_range_and_non_numeric_records_dropped() {
        let raw = json!([
            { "display_name": "Too far north", "lat": "95.0", "lon": "0" },
            { "display_name": "Garbage", "lat": "north-ish", "lon": "0" },
            { "display_name": "Fine", "lat": "10", "lon": "-179.5" },
            { "display_name": "", "lat": "10", "lon": "10" },
            "not even an object",
        ]);
        let results = map_search(&raw, 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].display_name, "Fine");
    }

    #[test]
    fn test_optional_fields_pass_through() {
        let raw = json!([{
            "display_name": "Eiffel Tower, Paris",
            "lat": "48.8582599",
            "lon": "2.2945006",
            "importance": 0.7,
            "type": "attraction",
            "boundingbox": ["48.8574753", "48.8590453", "2.2933119", "2.2956897"],
            "address": { "tourism": "Eiffel Tower", "city": "Paris", "postcode": "75007", "extra": null }
        }]);

        let result = &map_search(&raw, 1).unwrap()[0];
        assert_eq!(result.importance, Some(0.7));
        assert_eq!(result.place_type.as_deref(), Some("attraction"));
        assert_eq!(result.bounding_box.unwrap()[0], 48.8574753);
        let address = result.raw_address_components.as_ref().unwrap();
        assert_eq!(address.get("city").map(String::as_str), Some("Paris"));
        assert!(!address.contains_key("extra"));
    }

    #[test]
    fn test_key_casing_is_tolerated() {
        let raw = json!([{ "Display_Name": "Cased", "LAT": "1.25", "Lon": "2.5", "Confidence": "0.8" }]);
        let result = &map_search(&raw, 1).unwrap()[0];
        assert_eq!(result.display_name, "Cased");
        assert_eq!(result.latitude, 1.25);
        assert_eq!(result.importance, Some(0.8));
    }

    #[test]
    fn test_reverse_success() {
        let raw = json!({
            "display_name": "Shibuya, Tokyo, Japan",
            "lat": "35.6620",
            "lon": "139.7038",
            "address": { "city": "Tokyo", "country_code": "jp" }
        });
        let result = map_reverse(&raw).unwrap();
        assert_eq!(result.display_name, "Shibuya, Tokyo, Japan");
        assert_eq!(result.latitude, 35.662);
    }

    #[test]
    fn test_reverse_without_match_is_no_results() {
        let err = map_reverse(&json!({ "error": "Unable to geocode" })).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoResults);
        assert_eq!(err.message, "Unable to geocode");

        assert_eq!(map_reverse(&json!([])).unwrap_err().kind, ErrorKind::NoResults);
        assert_eq!(map_reverse(&Value::Null).unwrap_err().kind, ErrorKind::NoResults);
    }

    #[test]
    fn test_reverse_missing_fields_is_malformed() {
        let err = map_reverse(&json!({ "display_name": "Nowhere", "lon": "1.0" })).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UpstreamMalformedResponse);
        assert!(err.message.contains("missing lat"));

        let err = map_reverse(&json!({ "display_name": "Off the map", "lat": "-91", "lon": "1" }))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UpstreamMalformedResponse);

        let err = map_reverse(&json!("text")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UpstreamMalformedResponse);
    }
}
