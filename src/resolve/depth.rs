// Depth resolver

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ResolverConfig;
use crate::sync::Snapshot;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DepthResult {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Frame number -> depth, None where the field did not parse.
    pub depths: BTreeMap<i64, Option<f64>>,
}

/// Pull one numeric field out of a delimited datagram.
pub fn depth_field(datagram: &str, field: usize, separator: &str) -> Option<f64> {
    if separator.is_empty() {
        return None;
    }
    datagram
        .split(separator)
        .nth(field)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Per-frame depths from the configured sensor/header, with the running
/// minimum and maximum over the values that parsed.
pub fn resolve_depths(snap: &Snapshot, config: &ResolverConfig) -> DepthResult {
    let mut result = DepthResult::default();

    let frames = match snap.sensor(&config.depth_sensor_id, &config.depth_header) {
        Some(frames) => frames,
        None => return result,
    };

    for (&frame, datagram) in frames {
        let depth = depth_field(datagram, config.depth_field, &config.separator);
        if let Some(d) = depth {
            result.min = Some(result.min.map_or(d, |m| m.min(d)));
            result.max = Some(result.max.map_or(d, |m| m.max(d)));
        }
        result.depths.insert(frame, depth);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(rows: &[(i64, &str)]) -> Snapshot {
        let mut snap = Snapshot::default();
        let frames = snap
            .sensor_data
            .entry("CTControl".to_string())
            .or_default()
            .entry("$OHPR".to_string())
            .or_default();
        for (frame, data) in rows {
            frames.insert(*frame, data.to_string());
        }
        snap
    }

    #[test]
    fn test_depth_field_extraction() {
        assert_eq!(depth_field("$OHPR,1,2,3,-999.0,15.5,0,0,0*00", 5, ","), Some(15.5));
        assert_eq!(depth_field("$OHPR|1|2|3|-999.0|42|0|0|0", 5, "|"), Some(42.0));
        assert_eq!(depth_field("$OHPR,1,2", 5, ","), None);
        assert_eq!(depth_field("$OHPR,1,2,3,4,x", 5, ","), None);
    }

    #[test]
    fn test_min_max_ignore_bad_values() {
        let snap = snapshot_with(&[
            (1, "$OHPR,0,0,0,-999.0,20.0,0,0,0*00"),
            (2, "$OHPR,0,0,0,-999.0,bad,0,0,0*00"),
            (3, "$OHPR,0,0,0,-999.0,5.0,0,0,0*00"),
            (4, "$OHPR,0,0,0,-999.0,12.5,0,0,0*00"),
        ]);

        let result = resolve_depths(&snap, &ResolverConfig::default());
        assert_eq!(result.min, Some(5.0));
        assert_eq!(result.max, Some(20.0));
        assert_eq!(result.depths.len(), 4);
        assert_eq!(result.depths[&2], None);
        assert_eq!(result.depths[&4], Some(12.5));
    }

    #[test]
    fn test_missing_sensor_is_empty() {
        let snap = snapshot_with(&[(1, "$OHPR,0,0,0,-999.0,20.0,0,0,0*00")]);
        let config = ResolverConfig {
            depth_sensor_id: "CTD".to_string(),
            ..ResolverConfig::default()
        };
        assert_eq!(resolve_depths(&snap, &config), DepthResult::default());
    }
}
