//! Configuration loaded from an optional TOML file.
//!
//! ```toml
//! [geocoder]
//! base_url = "https://nominatim.openstreetmap.org"
//! user_agent = "my-agent/1.0 (ops@example.com)"
//! language = "en"
//!
//! [elevation]
//! enabled = true
//! default_dataset = "srtm30m"
//! ```
//!
//! The rate-limit interval is not configurable; it is the compile-time
//! [`MIN_INTERVAL`](crate::upstream::MIN_INTERVAL).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, WaypointError};

pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_ELEVATION_URL: &str = "https://api.opentopodata.org";
pub const DEFAULT_USER_AGENT: &str = concat!("waypoint-mcp/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_LIMIT: u32 = 5;
/// Nominatim caps `limit` at 40.
pub const MAX_LIMIT: u32 = 40;
pub const DEFAULT_DATASET: &str = "srtm90m";
/// Upper bound on `max_retries`.
pub const MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaypointConfig {
    pub geocoder: GeocoderConfig,
    pub elevation: ElevationConfig,
}

/// Connection and retry settings shared by every upstream client.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl UpstreamSettings {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(WaypointError::InvalidConfig(format!(
                "[{}] base_url must not be empty",
                section
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(WaypointError::InvalidConfig(format!(
                "[{}] user_agent must not be empty",
                section
            )));
        }
        if self.timeout_secs == 0 {
            return Err(WaypointError::InvalidConfig(format!(
                "[{}] timeout_secs must be positive",
                section
            )));
        }
        if self.max_retries > MAX_RETRIES {
            return Err(WaypointError::InvalidConfig(format!(
                "[{}] max_retries must be at most {}",
                section, MAX_RETRIES
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Sent as `accept-language` when set.
    pub language: Option<String>,
    pub default_limit: u32,
    pub max_limit: u32,
}

impl GeocoderConfig {
    pub fn upstream(&self) -> UpstreamSettings {
        UpstreamSettings {
            base_url: self.base_url.clone(),
            user_agent: self.user_agent.clone(),
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            retry_backoff_ms: self.retry_backoff_ms,
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        let upstream = UpstreamSettings::new(DEFAULT_GEOCODER_URL);
        Self {
            base_url: upstream.base_url,
            user_agent: upstream.user_agent,
            timeout_secs: upstream.timeout_secs,
            max_retries: upstream.max_retries,
            retry_backoff_ms: upstream.retry_backoff_ms,
            language: None,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevationConfig {
    pub enabled: bool,
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub default_dataset: String,
}

impl ElevationConfig {
    pub fn upstream(&self) -> UpstreamSettings {
        UpstreamSettings {
            base_url: self.base_url.clone(),
            user_agent: self.user_agent.clone(),
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            retry_backoff_ms: self.retry_backoff_ms,
        }
    }
}

impl Default for ElevationConfig {
    fn default() -> Self {
        let upstream = UpstreamSettings::new(DEFAULT_ELEVATION_URL);
        Self {
            enabled: false,
            base_url: upstream.base_url,
            user_agent: upstream.user_agent,
            timeout_secs: upstream.timeout_secs,
            max_retries: upstream.max_retries,
            retry_backoff_ms: upstream.retry_backoff_ms,
            default_dataset: DEFAULT_DATASET.to_string(),
        }
    }
}

impl WaypointConfig {
    /// Load config from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| WaypointError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| WaypointError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.geocoder.upstream().validate("geocoder")?;
        if self.geocoder.max_limit == 0 || self.geocoder.max_limit > MAX_LIMIT {
            return Err(WaypointError::InvalidConfig(format!(
                "[geocoder] max_limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        if self.geocoder.default_limit == 0 || self.geocoder.default_limit > self.geocoder.max_limit
        {
            return Err(WaypointError::InvalidConfig(format!(
                "[geocoder] default_limit must be between 1 and max_limit ({})",
                self.geocoder.max_limit
            )));
        }
        if self.elevation.enabled {
            self.elevation.upstream().validate("elevation")?;
            if self.elevation.default_dataset.trim().is_empty() {
                return Err(WaypointError::InvalidConfig(
                    "[elevation] default_dataset must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
