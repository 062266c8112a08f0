// CSV export
// Writes <prefix>cameras.csv, <prefix>images.csv and <prefix>OHPR.csv straight
// from the database, independent of any query window. CRLF line endings.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::constants::{
    ATTITUDE_CSV_SUFFIX, ATTITUDE_HEADER, CAMERAS_CSV_SUFFIX, CSV_LINE_END, IMAGES_CSV_SUFFIX,
    PARAM_HOURS_OFFSET_TO_UTC,
};
use crate::datagram::attitude::strip_header;
use crate::db::schema;
use crate::db::Store;
use crate::error::Result;
use crate::timestamp::{apply_offset, format_stored, parse_stored, utc_offset};

const CAMERAS_HEADER: &[&str] = &["camera", "serial number", "model", "label", "orientation"];
const IMAGES_HEADER: &[&str] = &[
    "frame number",
    "camera",
    "time-recorded",
    "time-utc",
    "image name",
    "exposure (us)",
    "discarded",
];
const ATTITUDE_CSV_HEADER: &[&str] = &[
    "frame",
    "time-recorded",
    "time-utc",
    "heading (deg)",
    "pitch (deg)",
    "roll (deg)",
    "internal temperature (c)",
    "depth (m)",
    "Xi",
    "Yi",
    "Zi",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub files: Vec<PathBuf>,
    pub cameras: usize,
    pub images: usize,
    pub attitude_rows: usize,
}

/// `<prefix><suffix>`, e.g. "/out/deploy-" + "images.csv".
pub fn export_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

/// Escape special characters for CSV.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn opt_text(value: &Option<String>) -> String {
    value.as_deref().map(escape_csv).unwrap_or_default()
}

fn opt_int(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_row<W: Write>(writer: &mut W, fields: &[String]) -> std::io::Result<()> {
    write!(writer, "{}{}", fields.join(","), CSV_LINE_END)
}

fn create(path: &Path, header: &[&str]) -> Result<BufWriter<File>> {
    let mut writer = BufWriter::new(File::create(path)?);
    write!(writer, "{}{}", header.join(","), CSV_LINE_END)?;
    Ok(writer)
}

/// Export the cameras, images and attitude data. Existing files are replaced.
pub fn export_metadata_to_csv(store: &Store, prefix: &Path) -> Result<ExportReport> {
    let conn = store.conn();
    let mut report = ExportReport::default();
    let offset = utc_offset(schema::get_parameter(conn, PARAM_HOURS_OFFSET_TO_UTC)?.as_deref());

    // Cameras
    let path = export_path(prefix, CAMERAS_CSV_SUFFIX);
    let mut writer = create(&path, CAMERAS_HEADER)?;
    for camera in schema::list_cameras(conn)? {
        write_row(&mut writer, &[
            escape_csv(&camera.camera),
            opt_text(&camera.mac_address),
            opt_text(&camera.model),
            opt_text(&camera.label),
            opt_text(&camera.rotation),
        ])?;
        report.cameras += 1;
    }
    writer.flush()?;
    report.files.push(path);

    // Images
    let path = export_path(prefix, IMAGES_CSV_SUFFIX);
    let mut writer = create(&path, IMAGES_HEADER)?;
    for image in schema::list_images(conn)? {
        let (recorded, utc) = match image.time.as_deref() {
            Some(time) => {
                let recorded = parse_stored(time)?;
                (format_stored(&recorded), format_stored(&apply_offset(recorded, offset)?))
            }
            None => (String::new(), String::new()),
        };
        write_row(&mut writer, &[
            image.number.to_string(),
            escape_csv(&image.camera),
            recorded,
            utc,
            opt_text(&image.name),
            opt_int(image.exposure_us),
            opt_int(image.discarded),
        ])?;
        report.images += 1;
    }
    writer.flush()?;
    report.files.push(path);

    // Attitude; the datagram fields after the header become the remaining columns
    let path = export_path(prefix, ATTITUDE_CSV_SUFFIX);
    let mut writer = create(&path, ATTITUDE_CSV_HEADER)?;
    for (number, data) in schema::sensor_rows_with_header(conn, ATTITUDE_HEADER)? {
        let time = match schema::first_image_time(conn, number)? {
            Some(time) => parse_stored(&time)?,
            None => continue,
        };
        write_row(&mut writer, &[
            number.to_string(),
            format_stored(&time),
            format_stored(&apply_offset(time, offset)?),
            strip_header(data.as_deref().unwrap_or_default()).to_string(),
        ])?;
        report.attitude_rows += 1;
    }
    writer.flush()?;
    report.files.push(path);

    log::info!(
        "Exported {} cameras, {} images, {} attitude rows to {}*.csv",
        report.cameras,
        report.images,
        report.attitude_rows,
        prefix.display()
    );
    Ok(report)
}
