//! Outbound calls to upstream HTTP services.
//!
//! All traffic goes through [`UpstreamClient`], which serializes attempts on
//! a [`RateLimiter`] and applies the bounded retry policy.

pub mod client;
pub mod elevation;
pub mod http;
pub mod rate_limit;

pub use client::UpstreamClient;
pub use elevation::{ElevationClient, ElevationResponse};
pub use http::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
pub use rate_limit::{RateLimiter, MIN_INTERVAL};
