// The query pass

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use super::{AsyncSensorData, CameraInfo, FrameTime, ImageEntry, Snapshot, SyncSensorData};
use crate::constants::PARAM_HOURS_OFFSET_TO_UTC;
use crate::db::schema::{self, Orientation};
use crate::error::Result;
use crate::timestamp::{apply_offset, parse_stored, utc_offset, TimeWindow};

/// Build a snapshot of everything inside `window`.
///
/// Nothing is written to the caller's state until the whole pass succeeds, so
/// an error leaves the previous snapshot in place.
pub fn run_query(conn: &Connection, window: &TimeWindow, return_discards: bool) -> Result<Snapshot> {
    let mut snap = Snapshot::default();

    // Deployment parameters and the manual UTC correction
    snap.deployment_data = schema::list_parameters(conn)?.into_iter().collect();
    let offset = utc_offset(
        snap.deployment_data
            .get(PARAM_HOURS_OFFSET_TO_UTC)
            .map(String::as_str),
    );
    snap.hours_offset_to_utc = offset.num_microseconds().unwrap_or(0) as f64 / 3_600_000_000.0;

    // Dropped frames
    snap.n_dropped_images = schema::count_dropped_frames(conn)?;
    for row in schema::list_dropped(conn)? {
        let time = parse_stored(&row.time)?;
        snap.dropped_data
            .entry(row.camera)
            .or_default()
            .insert(row.number, frame_time(time, offset)?);
    }

    snap.cameras = load_cameras(conn)?;

    load_images(conn, &mut snap, window, return_discards, offset)?;
    snap.image_numbers = common_image_numbers(&snap);

    if let (Some(start), Some(end)) = (snap.start_image, snap.end_image) {
        let (sensor_data, frame_times) = load_sync_sensors(conn, start, end, offset)?;
        snap.sensor_data = sensor_data;
        snap.frame_times = frame_times;

        snap.marks = schema::marks_between(conn, start, end)?
            .into_iter()
            .map(|m| (m.frame, m.description))
            .collect();
    }

    snap.async_data = load_async(conn, window, offset)?;

    let (start_time, end_time) = compute_timespan(&snap);
    snap.start_time = start_time;
    snap.end_time = end_time;

    log::debug!(
        "Query loaded {} cameras, frames {:?}..{:?}, {} common frames, {} marks",
        snap.cameras.len(),
        snap.start_image,
        snap.end_image,
        snap.image_numbers.len(),
        snap.marks.len()
    );

    Ok(snap)
}

fn frame_time(time: NaiveDateTime, offset: Duration) -> Result<FrameTime> {
    Ok(FrameTime { time, utc_time: apply_offset(time, offset)? })
}

/// Registered cameras, or for older stores the distinct cameras in images.
fn load_cameras(conn: &Connection) -> Result<Vec<CameraInfo>> {
    let registered = schema::list_cameras(conn)?;
    if !registered.is_empty() {
        return Ok(registered
            .into_iter()
            .map(|c| CameraInfo {
                orientation: c.orientation(),
                name: c.camera,
                mac_address: c.mac_address.unwrap_or_default(),
                model: c.model.unwrap_or_default(),
                label: c.label.unwrap_or_default(),
            })
            .collect());
    }

    Ok(schema::image_cameras(conn)?
        .into_iter()
        .map(|name| CameraInfo {
            name,
            mac_address: String::new(),
            model: String::new(),
            label: String::new(),
            orientation: Orientation::None,
        })
        .collect())
}

/// Load still images per camera. start_image latches the first frame seen
/// across all cameras; end_image is overwritten by every frame, so it ends up
/// as the last camera's last frame.
fn load_images(
    conn: &Connection,
    snap: &mut Snapshot,
    window: &TimeWindow,
    return_discards: bool,
    offset: Duration,
) -> Result<()> {
    for camera in &snap.cameras {
        let mut frames = BTreeMap::new();
        for row in schema::load_still_images(conn, &camera.name, window, return_discards)? {
            if snap.start_image.is_none() {
                snap.start_image = Some(row.number);
            }
            let time = parse_stored(&row.time)?;
            frames.insert(
                row.number,
                ImageEntry { time, utc_time: apply_offset(time, offset)?, name: row.name },
            );
            snap.end_image = Some(row.number);
        }
        snap.image_data.insert(camera.name.clone(), frames);
    }
    Ok(())
}

/// Frame numbers present for every camera, ascending.
fn common_image_numbers(snap: &Snapshot) -> Vec<i64> {
    let mut cameras = snap.cameras.iter();
    let first = match cameras.next() {
        Some(c) => c,
        None => return Vec::new(),
    };

    let frames_of = |name: &str| -> BTreeSet<i64> {
        snap.image_data
            .get(name)
            .map(|f| f.keys().copied().collect())
            .unwrap_or_default()
    };

    let mut common = frames_of(&first.name);
    for camera in cameras {
        let other = frames_of(&camera.name);
        common.retain(|n| other.contains(n));
    }
    common.into_iter().collect()
}

fn load_sync_sensors(
    conn: &Connection,
    start: i64,
    end: i64,
    offset: Duration,
) -> Result<(SyncSensorData, BTreeMap<i64, FrameTime>)> {
    let mut sensor_data = SyncSensorData::new();
    let mut frame_times = BTreeMap::new();
    let mut skipped = 0usize;

    for row in schema::load_sync_sensor_rows(conn, start, end)? {
        let time = parse_stored(&row.time)?;

        let (sensor_id, header) = match (row.sensor_id, row.header) {
            (Some(s), Some(h)) => (s, h),
            _ => {
                skipped += 1;
                continue;
            }
        };

        let data = row.data.unwrap_or_else(|| {
            log::warn!(
                "Unreadable datagram for {} {} frame {}; storing empty value",
                sensor_id,
                header,
                row.number
            );
            String::new()
        });

        sensor_data
            .entry(sensor_id)
            .or_default()
            .entry(header)
            .or_default()
            .insert(row.number, data);
        frame_times.insert(row.number, frame_time(time, offset)?);
    }

    if skipped > 0 {
        log::debug!("Skipped {} sensor rows without sensor id or header", skipped);
    }

    Ok((sensor_data, frame_times))
}

fn load_async(conn: &Connection, window: &TimeWindow, offset: Duration) -> Result<AsyncSensorData> {
    let mut async_data = AsyncSensorData::new();

    for row in schema::load_async_rows(conn, window)? {
        let time = parse_stored(&row.time)?;
        let (sensor_id, header) = match (row.sensor_id, row.header) {
            (Some(s), Some(h)) => (s, h),
            _ => continue,
        };

        let series = async_data.entry(sensor_id).or_default().entry(header).or_default();
        series.time.push(time);
        series.utc_time.push(apply_offset(time, offset)?);
        series.data.push(row.data.unwrap_or_default());
    }

    Ok(async_data)
}

/// [min over cameras of first frame time, max over cameras of last frame time]
fn compute_timespan(snap: &Snapshot) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    let mut start: Option<NaiveDateTime> = None;
    let mut end: Option<NaiveDateTime> = None;

    for camera in &snap.cameras {
        let frames = match snap.image_data.get(&camera.name) {
            Some(f) => f,
            None => continue,
        };
        if let Some((_, first)) = frames.iter().next() {
            start = Some(start.map_or(first.time, |s| s.min(first.time)));
        }
        if let Some((_, last)) = frames.iter().next_back() {
            end = Some(end.map_or(last.time, |e| e.max(last.time)));
        }
    }

    (start, end)
}
