// Synchronization engine
// `query` loads a time-bounded, cross-referenced view of every stream into a
// Snapshot. A snapshot is rebuilt from scratch on every query, never patched.

mod query;
#[cfg(test)]
mod tests;

pub use query::run_query;

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::schema::Orientation;

/// Camera as seen by consumers. Legacy stores without a cameras table get
/// empty strings and no orientation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraInfo {
    pub name: String,
    pub mac_address: String,
    pub model: String,
    pub label: String,
    pub orientation: Orientation,
}

/// Recorded and UTC-adjusted time of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameTime {
    pub time: NaiveDateTime,
    pub utc_time: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageEntry {
    pub time: NaiveDateTime,
    pub utc_time: NaiveDateTime,
    /// File name stem, without extension.
    pub name: String,
}

/// Parallel, time-ordered sequences for one async sensor/header.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AsyncSeries {
    pub time: Vec<NaiveDateTime>,
    pub utc_time: Vec<NaiveDateTime>,
    pub data: Vec<String>,
}

impl AsyncSeries {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// sensor id -> header -> frame number -> datagram
pub type SyncSensorData = BTreeMap<String, BTreeMap<String, BTreeMap<i64, String>>>;

/// sensor id -> header -> series
pub type AsyncSensorData = BTreeMap<String, BTreeMap<String, AsyncSeries>>;

/// In-memory result of the last `query`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    /// First frame number seen across all cameras, in camera order.
    pub start_image: Option<i64>,
    /// Last frame number seen, which is the last camera's last frame.
    pub end_image: Option<i64>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub hours_offset_to_utc: f64,
    /// Cameras in registration order.
    pub cameras: Vec<CameraInfo>,
    pub image_data: BTreeMap<String, BTreeMap<i64, ImageEntry>>,
    /// Frame numbers kept by every camera, ascending.
    pub image_numbers: Vec<i64>,
    pub sensor_data: SyncSensorData,
    /// Times of the frames that carry synchronous sensor data.
    pub frame_times: BTreeMap<i64, FrameTime>,
    pub async_data: AsyncSensorData,
    pub marks: BTreeMap<i64, String>,
    pub n_dropped_images: i64,
    pub dropped_data: BTreeMap<String, BTreeMap<i64, FrameTime>>,
    pub deployment_data: BTreeMap<String, String>,
}

impl Snapshot {
    /// True when no image data has been loaded.
    pub fn is_empty(&self) -> bool {
        self.image_data.values().all(|frames| frames.is_empty())
    }

    pub fn camera(&self, name: &str) -> Option<&CameraInfo> {
        self.cameras.iter().find(|c| c.name == name)
    }

    pub fn camera_names(&self) -> impl Iterator<Item = &str> {
        self.cameras.iter().map(|c| c.name.as_str())
    }

    /// Frames for one camera, ascending by frame number.
    pub fn images(&self, camera: &str) -> Option<&BTreeMap<i64, ImageEntry>> {
        self.image_data.get(camera)
    }

    /// Synchronous datagrams for one sensor/header, keyed by frame.
    pub fn sensor(&self, sensor_id: &str, header: &str) -> Option<&BTreeMap<i64, String>> {
        self.sensor_data.get(sensor_id).and_then(|h| h.get(header))
    }

    pub fn async_series(&self, sensor_id: &str, header: &str) -> Option<&AsyncSeries> {
        self.async_data.get(sensor_id).and_then(|h| h.get(header))
    }

    /// [earliest, latest] recorded image time over all cameras.
    pub fn timespan(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        (self.start_time, self.end_time)
    }
}
