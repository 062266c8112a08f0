// Derived-value resolvers
// Read-only passes over a Snapshot that turn stored datagrams into locations,
// depths and attitude records. A single bad datagram never fails a pass.

pub mod attitude;
pub mod depth;
pub mod location;
pub mod summary;

pub use attitude::resolve_attitudes;
pub use depth::{resolve_depths, DepthResult};
pub use location::{resolve_locations, Location, LocationResult};
pub use summary::{update_summary, SummaryFrom};

use crate::sync::SyncSensorData;

/// Match a sensor id against the loaded sensor data: exact, then lowercase,
/// then uppercase.
pub fn match_sensor_id<'a>(data: &'a SyncSensorData, sensor_id: &str) -> Option<&'a str> {
    [
        sensor_id.to_string(),
        sensor_id.to_lowercase(),
        sensor_id.to_uppercase(),
    ]
    .iter()
    .find_map(|candidate| data.get_key_value(candidate.as_str()).map(|(k, _)| k.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_match_sensor_id_case() {
        let mut data = SyncSensorData::new();
        data.insert("gps".to_string(), BTreeMap::new());
        data.insert("CTControl".to_string(), BTreeMap::new());

        assert_eq!(match_sensor_id(&data, "GPS"), Some("gps"));
        assert_eq!(match_sensor_id(&data, "CTControl"), Some("CTControl"));
        assert_eq!(match_sensor_id(&data, "ctcontrol"), None);
        assert_eq!(match_sensor_id(&data, "NAV"), None);
    }
}
