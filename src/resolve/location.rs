// Location resolver

use std::collections::BTreeMap;

use serde::Serialize;

use super::match_sensor_id;
use crate::datagram::parse_position;
use crate::sync::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LocationResult {
    /// Frame number -> first valid fix for that frame.
    pub locations: BTreeMap<i64, Location>,
    /// Corners (latMin,lonMin) (latMin,lonMax) (latMax,lonMax) (latMax,lonMin).
    /// None when no frame has a fix.
    pub bounds: Option<[Location; 4]>,
}

/// Resolve per-frame positions from synchronous positioning sentences.
///
/// Headers are visited in lexicographic order and frames ascending within each
/// header. A frame keeps the first fix that parses and passes its validity
/// check; later sentences for that frame are ignored.
pub fn resolve_locations(snap: &Snapshot, sensor_id: &str) -> LocationResult {
    let mut result = LocationResult::default();

    let sensor_id = match match_sensor_id(&snap.sensor_data, sensor_id) {
        Some(id) => id,
        None => return result,
    };

    let mut skipped = 0usize;
    for frames in snap.sensor_data[sensor_id].values() {
        for (&frame, datagram) in frames {
            if result.locations.contains_key(&frame) {
                continue;
            }
            match parse_position(datagram) {
                Ok(fix) if fix.validity.is_valid() => {
                    result
                        .locations
                        .insert(frame, Location::new(fix.latitude, fix.longitude));
                }
                Ok(_) => {}
                Err(_) => skipped += 1,
            }
        }
    }

    if skipped > 0 {
        log::debug!("Skipped {} unparseable {} datagrams", skipped, sensor_id);
    }

    result.bounds = bounds(result.locations.values());
    result
}

fn bounds<'a>(locations: impl Iterator<Item = &'a Location>) -> Option<[Location; 4]> {
    let mut extent: Option<(f64, f64, f64, f64)> = None;
    for loc in locations {
        let (lat_min, lat_max, lon_min, lon_max) =
            extent.unwrap_or((loc.latitude, loc.latitude, loc.longitude, loc.longitude));
        extent = Some((
            lat_min.min(loc.latitude),
            lat_max.max(loc.latitude),
            lon_min.min(loc.longitude),
            lon_max.max(loc.longitude),
        ));
    }

    extent.map(|(lat_min, lat_max, lon_min, lon_max)| {
        [
            Location::new(lat_min, lon_min),
            Location::new(lat_min, lon_max),
            Location::new(lat_max, lon_max),
            Location::new(lat_max, lon_min),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GGA_FIX: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const GGA_NO_FIX: &str = "$GPGGA,123519,4807.038,N,01131.000,E,0,08,0.9,545.4,M,46.9,M,,*46";

    fn snapshot_with(sensor_id: &str, rows: &[(&str, i64, &str)]) -> Snapshot {
        let mut snap = Snapshot::default();
        for (header, frame, data) in rows {
            snap.sensor_data
                .entry(sensor_id.to_string())
                .or_default()
                .entry(header.to_string())
                .or_default()
                .insert(*frame, data.to_string());
        }
        snap
    }

    #[test]
    fn test_quality_zero_sets_no_location() {
        let snap = snapshot_with("GPS", &[("$GPGGA", 1, GGA_NO_FIX), ("$GPGGA", 2, GGA_FIX)]);
        let result = resolve_locations(&snap, "GPS");

        assert!(!result.locations.contains_key(&1));
        let loc = result.locations[&2];
        assert!((loc.latitude - 48.1173).abs() < 1e-6);
        assert!((loc.longitude - 11.516_666_666).abs() < 1e-6);
    }

    #[test]
    fn test_first_fix_wins_across_headers() {
        let rmc = "$GPRMC,123519,A,4900.000,N,01100.000,E,022.4,084.4,230394,003.1,W";
        let snap = snapshot_with("GPS", &[("$GPGGA", 5, GGA_FIX), ("$GPRMC", 5, rmc)]);
        let result = resolve_locations(&snap, "GPS");

        assert_eq!(result.locations.len(), 1);
        assert!((result.locations[&5].latitude - 48.1173).abs() < 1e-6);
    }

    #[test]
    fn test_garbage_and_case_insensitive_sensor() {
        let snap = snapshot_with("gps", &[("$GPGGA", 1, "not nmea"), ("$GPGGA", 2, GGA_FIX)]);
        let result = resolve_locations(&snap, "GPS");
        assert_eq!(result.locations.keys().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_bounds_corners() {
        let snap = snapshot_with(
            "GPS",
            &[
                ("$GPGLL", 1, "$GPGLL,5730.000,N,15215.000,W,225444,A"),
                ("$GPGLL", 2, "$GPGLL,5800.000,N,15200.000,W,225445,A"),
                ("$GPGLL", 3, "$GPGLL,5900.000,N,15000.000,W,225446,V"),
            ],
        );
        let result = resolve_locations(&snap, "GPS");
        assert_eq!(result.locations.len(), 2);

        let [sw, se, ne, nw] = result.bounds.unwrap();
        assert_eq!(sw, Location::new(57.5, -152.25));
        assert_eq!(se, Location::new(57.5, -152.0));
        assert_eq!(ne, Location::new(58.0, -152.0));
        assert_eq!(nw, Location::new(58.0, -152.25));
    }

    #[test]
    fn test_no_sensor_no_bounds() {
        let result = resolve_locations(&Snapshot::default(), "GPS");
        assert!(result.locations.is_empty());
        assert!(result.bounds.is_none());
    }
}
