// Resolver configuration
//
// Resolution order for each value:
// 1) Environment variable override (CAMTRAWL_DEPTH_SENSOR_ID, etc.)
// 2) Standard CamTrawl defaults from constants.rs

use std::env;

use serde::Serialize;

use crate::constants::{
    ATTITUDE_HEADER, DEFAULT_FIELD_SEPARATOR, DEPTH_FIELD_INDEX, DEPTH_SENSOR_ID,
    LOCATION_SENSOR_ID,
};

pub const ENV_DEPTH_SENSOR_ID: &str = "CAMTRAWL_DEPTH_SENSOR_ID";
pub const ENV_DEPTH_HEADER: &str = "CAMTRAWL_DEPTH_HEADER";
pub const ENV_DEPTH_FIELD: &str = "CAMTRAWL_DEPTH_FIELD";
pub const ENV_DEPTH_SEPARATOR: &str = "CAMTRAWL_DEPTH_SEPARATOR";
pub const ENV_LOCATION_SENSOR_ID: &str = "CAMTRAWL_LOCATION_SENSOR_ID";

/// Where the derived-value resolvers look for depth and location data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolverConfig {
    pub depth_sensor_id: String,
    pub depth_header: String,
    /// Zero-based index of the depth field within the datagram.
    pub depth_field: usize,
    pub separator: String,
    pub location_sensor_id: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            depth_sensor_id: DEPTH_SENSOR_ID.to_string(),
            depth_header: ATTITUDE_HEADER.to_string(),
            depth_field: DEPTH_FIELD_INDEX,
            separator: DEFAULT_FIELD_SEPARATOR.to_string(),
            location_sensor_id: LOCATION_SENSOR_ID.to_string(),
        }
    }
}

impl ResolverConfig {
    /// Defaults with any environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from a lookup function. Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_DEPTH_SENSOR_ID) {
            self.depth_sensor_id = v;
        }
        if let Some(v) = get(ENV_DEPTH_HEADER) {
            self.depth_header = v;
        }
        if let Some(v) = get(ENV_DEPTH_FIELD) {
            match v.trim().parse::<usize>() {
                Ok(field) => self.depth_field = field,
                Err(e) => log::warn!("Ignoring {}={:?}: {}", ENV_DEPTH_FIELD, v, e),
            }
        }
        if let Some(v) = get(ENV_DEPTH_SEPARATOR) {
            self.separator = v;
        }
        if let Some(v) = get(ENV_LOCATION_SENSOR_ID) {
            self.location_sensor_id = v;
        }

        self
    }
}
