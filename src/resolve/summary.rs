// Deployment summary updater

use std::str::FromStr;

use rusqlite::Connection;
use serde::Serialize;

use super::{resolve_depths, resolve_locations};
use crate::config::ResolverConfig;
use crate::db::schema;
use crate::error::Result;
use crate::sync::Snapshot;

/// Which resolved fix supplies the summary location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFrom {
    #[default]
    First,
    Middle,
    Last,
}

impl SummaryFrom {
    /// Index into `count` frame-ordered fixes. Middle is floor(count/2 - 0.5).
    pub fn pick(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        Some(match self {
            SummaryFrom::First => 0,
            SummaryFrom::Middle => ((count as f64) / 2.0 - 0.5).floor() as usize,
            SummaryFrom::Last => count - 1,
        })
    }
}

impl FromStr for SummaryFrom {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(SummaryFrom::First),
            "middle" => Ok(SummaryFrom::Middle),
            "last" => Ok(SummaryFrom::Last),
            other => Err(format!("expected first, middle or last, got {:?}", other)),
        }
    }
}

/// Fill in the deployment summary's latitude, longitude and maximum depth.
///
/// Does nothing when the summary already has a latitude and `overwrite` is
/// false. An explicit coordinate wins over the resolved one; whatever cannot be
/// resolved is written as NULL. Returns whether the summary was written.
pub fn update_summary(
    conn: &Connection,
    snap: &Snapshot,
    config: &ResolverConfig,
    from: SummaryFrom,
    explicit: (Option<f64>, Option<f64>),
    overwrite: bool,
) -> Result<bool> {
    let existing = schema::get_summary(conn)?;
    if !overwrite && existing.map_or(false, |s| s.latitude.is_some()) {
        log::debug!("Deployment summary already has a location; leaving it");
        return Ok(false);
    }

    let max_depth = resolve_depths(snap, config).max;

    let (mut latitude, mut longitude) = explicit;
    if latitude.is_none() || longitude.is_none() {
        let resolved = resolve_locations(snap, &config.location_sensor_id);
        let fixes: Vec<_> = resolved.locations.values().collect();
        if let Some(fix) = from.pick(fixes.len()).map(|i| fixes[i]) {
            latitude = latitude.or(Some(fix.latitude));
            longitude = longitude.or(Some(fix.longitude));
        }
    }

    schema::write_summary_derived(conn, latitude, longitude, max_depth)?;
    log::info!(
        "Deployment summary updated: lat {:?}, lon {:?}, max depth {:?}",
        latitude,
        longitude,
        max_depth
    );
    Ok(true)
}
