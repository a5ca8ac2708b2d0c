//! Geocoding domain: query/result types and the upstream result mapper.

pub mod mapper;
pub mod types;

pub use mapper::{map_reverse, map_search};
pub use types::{
    validate_coordinates, GeocodeQuery, GeocodeResponse, LocationResult, ReverseQuery,
    ReverseResponse,
};
