// Database schema types and query helpers
// Every table row is read into a fixed-shape record. Columns that older stores
// may hold as NULL or as an unexpected type are read as Option.

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::Result;
use crate::timestamp::TimeWindow;

/// Read a column as text. NULL and blobs become None, numbers are rendered.
pub fn text_column(row: &Row, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
    })
}

/// Read a column as an integer. Text that parses as an integer is accepted.
pub fn integer_column(row: &Row, idx: usize) -> rusqlite::Result<Option<i64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(f) => Some(f as i64),
        ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(|s| s.trim().parse().ok()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    })
}

// ----- Cameras -----

/// Camera image orientation, stored in cameras.rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
    FlipHorizontal,
    FlipVertical,
}

impl Orientation {
    /// Decode the stored rotation text. Unknown or missing values are None.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("cw90") => Orientation::Cw90,
            Some("cw180") => Orientation::Cw180,
            Some("cw270") => Orientation::Cw270,
            Some("fliplr") => Orientation::FlipHorizontal,
            Some("flipud") => Orientation::FlipVertical,
            _ => Orientation::None,
        }
    }

    pub fn as_stored(&self) -> &'static str {
        match self {
            Orientation::None => "NONE",
            Orientation::Cw90 => "CW90",
            Orientation::Cw180 => "CW180",
            Orientation::Cw270 => "CW270",
            Orientation::FlipHorizontal => "FLIPLR",
            Orientation::FlipVertical => "FLIPUD",
        }
    }

    /// Integer code used by older viewers: degrees, or -1/-2 for flips.
    pub fn legacy_code(&self) -> i32 {
        match self {
            Orientation::None => 0,
            Orientation::Cw90 => 90,
            Orientation::Cw180 => 180,
            Orientation::Cw270 => 270,
            Orientation::FlipHorizontal => -1,
            Orientation::FlipVertical => -2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraRecord {
    pub camera: String,
    pub mac_address: Option<String>,
    pub model: Option<String>,
    pub label: Option<String>,
    pub rotation: Option<String>,
}

impl CameraRecord {
    pub fn orientation(&self) -> Orientation {
        Orientation::from_stored(self.rotation.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct NewCamera {
    pub camera: String,
    pub mac_address: String,
    pub model: String,
    pub label: String,
}

fn camera_from_row(row: &Row) -> rusqlite::Result<CameraRecord> {
    Ok(CameraRecord {
        camera: row.get(0)?,
        mac_address: text_column(row, 1)?,
        model: text_column(row, 2)?,
        label: text_column(row, 3)?,
        rotation: text_column(row, 4)?,
    })
}

/// All registered cameras in registration order.
pub fn list_cameras(conn: &Connection) -> Result<Vec<CameraRecord>> {
    let mut stmt = conn.prepare(
        "SELECT camera, mac_address, model, label, rotation FROM cameras ORDER BY rowid",
    )?;
    let cameras = stmt
        .query_map([], camera_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(cameras)
}

pub fn get_camera(conn: &Connection, camera: &str) -> Result<Option<CameraRecord>> {
    let result = conn
        .query_row(
            "SELECT camera, mac_address, model, label, rotation FROM cameras WHERE camera = ?1",
            params![camera],
            camera_from_row,
        )
        .optional()?;
    Ok(result)
}

/// Insert a camera in the flat-file conversion shape (orientation code 0).
pub fn insert_camera(conn: &Connection, camera: &NewCamera) -> Result<()> {
    conn.execute(
        "INSERT INTO cameras (camera, mac_address, model, label, orientation) VALUES (?1, ?2, ?3, ?4, 0)",
        params![camera.camera, camera.mac_address, camera.model, camera.label],
    )?;
    Ok(())
}

/// Camera names seen in the images table, in order of first appearance.
/// Used for stores that predate the cameras table being filled in.
pub fn image_cameras(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT camera FROM images GROUP BY camera ORDER BY MIN(rowid)")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

// ----- Images -----

/// Image row as loaded by the synchronization query.
#[derive(Debug, Clone, PartialEq)]
pub struct StillImageRow {
    pub number: i64,
    pub time: String,
    pub name: String,
}

/// Full image record for export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    pub number: i64,
    pub camera: String,
    pub time: Option<String>,
    pub name: Option<String>,
    pub exposure_us: Option<i64>,
    /// Unset (NULL), 0, or 1.
    pub discarded: Option<i64>,
    pub md5_checksum: Option<String>,
    pub still_image: Option<i64>,
    pub video_frame: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewImage {
    pub number: i64,
    pub camera: String,
    pub time: String,
    pub name: String,
    pub exposure_us: Option<i64>,
}

/// Still images for one camera inside the window, ascending by frame number.
/// Discarded images are left out unless `include_discarded` is set.
pub fn load_still_images(
    conn: &Connection,
    camera: &str,
    window: &TimeWindow,
    include_discarded: bool,
) -> Result<Vec<StillImageRow>> {
    let discard_clause = if include_discarded {
        ""
    } else {
        "(discarded IS NULL OR discarded = 0) AND "
    };
    let sql = format!(
        "SELECT number, time, name FROM images WHERE camera = ?1 AND still_image = 1 AND {}\
         time BETWEEN datetime(?2) AND datetime(?3) ORDER BY number ASC",
        discard_clause
    );

    let (start, end) = window.bounds();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![camera, start, end], |row| {
            Ok(StillImageRow {
                number: row.get(0)?,
                time: text_column(row, 1)?.unwrap_or_default(),
                name: text_column(row, 2)?.unwrap_or_default(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_images(conn: &Connection) -> Result<Vec<ImageRecord>> {
    let mut stmt = conn.prepare(
        "SELECT number, camera, time, name, exposure_us, discarded, md5_checksum, still_image, video_frame
         FROM images ORDER BY rowid",
    )?;
    let images = stmt
        .query_map([], |row| {
            Ok(ImageRecord {
                number: row.get(0)?,
                camera: row.get(1)?,
                time: text_column(row, 2)?,
                name: text_column(row, 3)?,
                exposure_us: integer_column(row, 4)?,
                discarded: integer_column(row, 5)?,
                md5_checksum: text_column(row, 6)?,
                still_image: integer_column(row, 7)?,
                video_frame: integer_column(row, 8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(images)
}

pub fn insert_image(conn: &Connection, image: &NewImage) -> Result<()> {
    conn.execute(
        "INSERT INTO images (number, camera, time, name, exposure_us, discarded) VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
        params![image.number, image.camera, image.time, image.name, image.exposure_us],
    )?;
    Ok(())
}

/// Recorded time of the first image row with this frame number.
pub fn first_image_time(conn: &Connection, number: i64) -> Result<Option<String>> {
    let time = conn
        .query_row(
            "SELECT time FROM images WHERE number = ?1 ORDER BY rowid LIMIT 1",
            params![number],
            |row| text_column(row, 0),
        )
        .optional()?
        .flatten();
    Ok(time)
}

/// Set (or clear) the discarded marker for every camera's frames in [start, end].
pub fn set_discarded_range(conn: &Connection, start: i64, end: i64, unset: bool) -> Result<usize> {
    let sql = if unset {
        "UPDATE images SET discarded = NULL WHERE number >= ?1 AND number <= ?2"
    } else {
        "UPDATE images SET discarded = 1 WHERE number >= ?1 AND number <= ?2"
    };
    let changed = conn.execute(sql, params![start, end])?;
    Ok(changed)
}

/// (camera, name) of every image marked discarded, grouped by camera.
pub fn discarded_images(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT camera, name FROM images WHERE discarded = 1 ORDER BY camera, number",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, text_column(row, 1)?)))?
        .collect::<rusqlite::Result<Vec<(String, Option<String>)>>>()?;
    Ok(rows
        .into_iter()
        .filter_map(|(camera, name)| name.map(|n| (camera, n)))
        .collect())
}

pub fn update_image_checksum(
    conn: &Connection,
    camera: &str,
    name: &str,
    checksum: &str,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE images SET md5_checksum = ?1 WHERE camera = ?2 AND name = ?3",
        params![checksum, camera, name],
    )?;
    Ok(changed)
}

// ----- Dropped images -----

#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRow {
    pub number: i64,
    pub camera: String,
    pub time: String,
}

pub fn count_dropped_frames(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(DISTINCT number) FROM dropped", [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

pub fn list_dropped(conn: &Connection) -> Result<Vec<DroppedRow>> {
    let mut stmt = conn.prepare("SELECT number, camera, time FROM dropped ORDER BY rowid")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(DroppedRow {
                number: row.get(0)?,
                camera: row.get(1)?,
                time: text_column(row, 2)?.unwrap_or_default(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn insert_dropped(conn: &Connection, number: i64, camera: &str, time: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO dropped (number, camera, time) VALUES (?1, ?2, ?3)",
        params![number, camera, time],
    )?;
    Ok(())
}

// ----- Synchronous sensor data -----

/// Sensor datagram joined to its image row.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSensorRow {
    pub number: i64,
    pub time: String,
    pub sensor_id: Option<String>,
    pub header: Option<String>,
    pub data: Option<String>,
}

/// Sensor rows joined to image rows on frame number, restricted to [start, end].
pub fn load_sync_sensor_rows(conn: &Connection, start: i64, end: i64) -> Result<Vec<SyncSensorRow>> {
    let mut stmt = conn.prepare(
        "SELECT im.number, im.time, sd.sensor_id, sd.header, sd.data
         FROM images im, sensor_data sd
         WHERE im.number = sd.number AND im.number >= ?1 AND im.number <= ?2
         ORDER BY sd.rowid, im.rowid",
    )?;
    let rows = stmt
        .query_map(params![start, end], |row| {
            Ok(SyncSensorRow {
                number: row.get(0)?,
                time: text_column(row, 1)?.unwrap_or_default(),
                sensor_id: text_column(row, 2)?,
                header: text_column(row, 3)?,
                data: match row.get_ref(4)? {
                    ValueRef::Text(t) => std::str::from_utf8(t).ok().map(str::to_string),
                    _ => None,
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn insert_sync_sensor(
    conn: &Connection,
    number: i64,
    sensor_id: &str,
    header: &str,
    data: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO sensor_data (number, sensor_id, header, data) VALUES (?1, ?2, ?3, ?4)",
        params![number, sensor_id, header, data],
    )?;
    Ok(())
}

/// (frame number, datagram) for every sensor row carrying this header.
pub fn sensor_rows_with_header(conn: &Connection, header: &str) -> Result<Vec<(i64, Option<String>)>> {
    let mut stmt =
        conn.prepare("SELECT number, data FROM sensor_data WHERE header = ?1 ORDER BY rowid")?;
    let rows = stmt
        .query_map(params![header], |row| Ok((row.get(0)?, text_column(row, 1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// ----- Asynchronous sensor data -----

#[derive(Debug, Clone, PartialEq)]
pub struct AsyncSensorRow {
    pub time: String,
    pub sensor_id: Option<String>,
    pub header: Option<String>,
    pub data: Option<String>,
}

/// Async rows inside the window, ascending by time.
pub fn load_async_rows(conn: &Connection, window: &TimeWindow) -> Result<Vec<AsyncSensorRow>> {
    let (start, end) = window.bounds();
    let mut stmt = conn.prepare(
        "SELECT time, sensor_id, header, data FROM async_data
         WHERE time BETWEEN datetime(?1) AND datetime(?2) ORDER BY time",
    )?;
    let rows = stmt
        .query_map(params![start, end], |row| {
            Ok(AsyncSensorRow {
                time: text_column(row, 0)?.unwrap_or_default(),
                sensor_id: text_column(row, 1)?,
                header: text_column(row, 2)?,
                data: match row.get_ref(3)? {
                    ValueRef::Text(t) => std::str::from_utf8(t).ok().map(str::to_string),
                    _ => None,
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn insert_async(
    conn: &Connection,
    time: &str,
    sensor_id: &str,
    header: &str,
    data: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO async_data (time, sensor_id, header, data) VALUES (?1, ?2, ?3, ?4)",
        params![time, sensor_id, header, data],
    )?;
    Ok(())
}

// ----- Marks -----

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mark {
    pub frame: i64,
    pub description: String,
}

fn mark_from_row(row: &Row) -> rusqlite::Result<Mark> {
    Ok(Mark {
        frame: row.get(0)?,
        description: text_column(row, 1)?.unwrap_or_default(),
    })
}

pub fn insert_mark(conn: &Connection, frame: i64, description: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO marks (frame_number, mark_description) VALUES (?1, ?2)",
        params![frame, description],
    )?;
    Ok(())
}

pub fn delete_mark(conn: &Connection, frame: i64) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM marks WHERE frame_number = ?1", params![frame])?;
    Ok(deleted)
}

pub fn marks_between(conn: &Connection, start: i64, end: i64) -> Result<Vec<Mark>> {
    let mut stmt = conn.prepare(
        "SELECT frame_number, mark_description FROM marks
         WHERE frame_number >= ?1 AND frame_number <= ?2 ORDER BY frame_number ASC",
    )?;
    let marks = stmt
        .query_map(params![start, end], mark_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(marks)
}

pub fn all_marks(conn: &Connection) -> Result<Vec<Mark>> {
    let mut stmt = conn.prepare(
        "SELECT frame_number, mark_description FROM marks ORDER BY frame_number ASC",
    )?;
    let marks = stmt
        .query_map([], mark_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(marks)
}

/// First mark strictly after `frame`.
pub fn next_mark(conn: &Connection, frame: i64) -> Result<Option<Mark>> {
    let mark = conn
        .query_row(
            "SELECT frame_number, mark_description FROM marks WHERE frame_number > ?1
             ORDER BY frame_number ASC LIMIT 1",
            params![frame],
            mark_from_row,
        )
        .optional()?;
    Ok(mark)
}

/// First mark strictly before `frame`.
pub fn previous_mark(conn: &Connection, frame: i64) -> Result<Option<Mark>> {
    let mark = conn
        .query_row(
            "SELECT frame_number, mark_description FROM marks WHERE frame_number < ?1
             ORDER BY frame_number DESC LIMIT 1",
            params![frame],
            mark_from_row,
        )
        .optional()?;
    Ok(mark)
}

// ----- Deployment parameters -----

pub fn list_parameters(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT deployment_parameter, parameter_value FROM deployment_data ORDER BY rowid",
    )?;
    let params = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, text_column(row, 1)?.unwrap_or_default()))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(params)
}

pub fn get_parameter(conn: &Connection, name: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT parameter_value FROM deployment_data WHERE deployment_parameter = ?1",
            params![name],
            |row| text_column(row, 0),
        )
        .optional()?
        .flatten();
    Ok(value)
}

/// Insert or replace a deployment parameter.
pub fn set_parameter(conn: &Connection, name: &str, value: &str) -> Result<()> {
    let updated = conn.execute(
        "UPDATE deployment_data SET parameter_value = ?1 WHERE deployment_parameter = ?2",
        params![value, name],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO deployment_data (deployment_parameter, parameter_value) VALUES (?1, ?2)",
            params![name, value],
        )?;
    }
    Ok(())
}

// ----- Deployment summary -----

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeploymentSummary {
    pub deployment_name: Option<String>,
    pub survey_name: Option<String>,
    pub vessel_name: Option<String>,
    pub camera_name: Option<String>,
    pub survey_description: Option<String>,
    pub deployment_time: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub max_depth: Option<f64>,
    pub comments: Option<String>,
}

fn real_column(row: &Row, idx: usize) -> rusqlite::Result<Option<f64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) => Some(f),
        ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(|s| s.trim().parse().ok()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    })
}

pub fn get_summary(conn: &Connection) -> Result<Option<DeploymentSummary>> {
    let summary = conn
        .query_row(
            "SELECT deployment_name, survey_name, vessel_name, camera_name, survey_description,
                    deployment_time, deployment_latitude, deployment_longitude,
                    max_deployment_depth, comments
             FROM deployment ORDER BY rowid LIMIT 1",
            [],
            |row| {
                Ok(DeploymentSummary {
                    deployment_name: text_column(row, 0)?,
                    survey_name: text_column(row, 1)?,
                    vessel_name: text_column(row, 2)?,
                    camera_name: text_column(row, 3)?,
                    survey_description: text_column(row, 4)?,
                    deployment_time: text_column(row, 5)?,
                    latitude: real_column(row, 6)?,
                    longitude: real_column(row, 7)?,
                    max_depth: real_column(row, 8)?,
                    comments: text_column(row, 9)?,
                })
            },
        )
        .optional()?;
    Ok(summary)
}

/// Write the derived summary values, creating the row if the table is empty.
pub fn write_summary_derived(
    conn: &Connection,
    latitude: Option<f64>,
    longitude: Option<f64>,
    max_depth: Option<f64>,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE deployment SET deployment_latitude = ?1, deployment_longitude = ?2,
                max_deployment_depth = ?3",
        params![latitude, longitude, max_depth],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO deployment (deployment_latitude, deployment_longitude, max_deployment_depth)
             VALUES (?1, ?2, ?3)",
            params![latitude, longitude, max_depth],
        )?;
    }
    Ok(())
}
