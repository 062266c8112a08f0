// Attitude resolver

use std::collections::BTreeMap;

use crate::config::ResolverConfig;
use crate::constants::ATTITUDE_HEADER;
use crate::datagram::AttitudeDatagram;
use crate::sync::Snapshot;

/// Decode the attitude datagram of every loaded frame. Frames whose datagram
/// does not decode are left out.
pub fn resolve_attitudes(snap: &Snapshot, config: &ResolverConfig) -> BTreeMap<i64, AttitudeDatagram> {
    let frames = match snap.sensor(&config.depth_sensor_id, ATTITUDE_HEADER) {
        Some(frames) => frames,
        None => return BTreeMap::new(),
    };

    frames
        .iter()
        .filter_map(|(&frame, datagram)| match AttitudeDatagram::parse(datagram) {
            Ok(attitude) => Some((frame, attitude)),
            Err(e) => {
                log::debug!("Frame {} attitude not decoded: {}", frame, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_attitudes_skips_bad_rows() {
        let mut snap = Snapshot::default();
        let frames = snap
            .sensor_data
            .entry("CTControl".to_string())
            .or_default()
            .entry("$OHPR".to_string())
            .or_default();
        frames.insert(1, "$OHPR,181.5,-2.0,0.5,-999.0,30.1,0,0,0*00".to_string());
        frames.insert(2, String::new());

        let attitudes = resolve_attitudes(&snap, &ResolverConfig::default());
        assert_eq!(attitudes.len(), 1);
        assert_eq!(attitudes[&1].heading, Some(181.5));
        assert_eq!(attitudes[&1].depth, Some(30.1));
    }
}
