// Legacy flat-file conversion
// Builds a metadata database for deployments recorded before the acquisition
// software wrote one, using only the image tree and the attitude log.

pub mod attitude_log;
pub mod image_list;

use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;

use crate::constants::{
    ATTITUDE_HEADER, ATTITUDE_LOG_FILENAME, DEPTH_SENSOR_ID, IMAGES_FOLDER, LEGACY_EXPOSURE_US,
    LOGS_FOLDER, NULL_MAC_ADDRESS,
};
use crate::db::schema::{self, NewCamera, NewImage};
use crate::db::{get_db_path, Store};
use crate::error::{MetadataError, Result};

pub use image_list::{list_camera_images, undo_renames, FileRename, ImageListing, ListedImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Rename files whose frame number repeats the previous file's.
    pub repair_numbering: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self { repair_numbering: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConvertReport {
    pub cameras: usize,
    pub images: usize,
    pub sensor_rows: usize,
    pub renamed_files: usize,
    pub skipped_files: usize,
    pub max_frame: i64,
}

/// Split "Model_Serial" into (model, serial). Without a serial the null MAC
/// address is used.
pub fn split_camera_name(camera: &str) -> (String, String) {
    let mut parts = camera.split('_');
    let model = parts.next().unwrap_or_default().to_string();
    let serial = parts
        .next()
        .map(str::to_string)
        .unwrap_or_else(|| NULL_MAC_ADDRESS.to_string());
    (model, serial)
}

/// Create `logs/CamTrawlMetadata.db3` for a flat-file deployment.
///
/// `cameras` are image subdirectory names, `labels` their display labels, in
/// the same order. Everything is inserted in one transaction; on failure the
/// new database file is removed again and numbering repairs are moved back.
pub fn convert_to_database(
    deployment_path: &Path,
    cameras: &[String],
    labels: &[String],
    options: ConvertOptions,
) -> Result<ConvertReport> {
    if cameras.is_empty() {
        return Err(MetadataError::InvalidArgument("No cameras given".to_string()));
    }
    if cameras.len() != labels.len() {
        return Err(MetadataError::InvalidArgument(format!(
            "{} cameras but {} labels",
            cameras.len(),
            labels.len()
        )));
    }

    let mut conn = Store::create_legacy(deployment_path)?;
    let mut renames = Vec::new();
    match populate(&mut conn, deployment_path, cameras, labels, options, &mut renames) {
        Ok(report) => {
            conn.close().map_err(|(_, e)| MetadataError::Database(e))?;
            log::info!(
                "Converted {}: {} cameras, {} images, {} attitude rows",
                deployment_path.display(),
                report.cameras,
                report.images,
                report.sensor_rows
            );
            Ok(report)
        }
        Err(e) => {
            drop(conn);
            undo_renames(&renames);
            let db_path = get_db_path(deployment_path);
            if let Err(rm) = std::fs::remove_file(&db_path) {
                log::warn!("Could not remove partial database {}: {}", db_path.display(), rm);
            }
            Err(e)
        }
    }
}

fn populate(
    conn: &mut Connection,
    deployment_path: &Path,
    cameras: &[String],
    labels: &[String],
    options: ConvertOptions,
    renames: &mut Vec<FileRename>,
) -> Result<ConvertReport> {
    let mut report = ConvertReport::default();
    let tx = conn.transaction()?;

    let mut listings: Vec<(&String, ImageListing)> = Vec::with_capacity(cameras.len());
    for (camera, label) in cameras.iter().zip(labels) {
        let (model, mac_address) = split_camera_name(camera);
        schema::insert_camera(&tx, &NewCamera {
            camera: camera.clone(),
            mac_address,
            model,
            label: label.clone(),
        })?;

        let dir = deployment_path.join(IMAGES_FOLDER).join(camera);
        let listing = list_camera_images(&dir, options.repair_numbering)?;
        renames.extend(listing.renames.iter().cloned());
        report.renamed_files += listing.renames.len();
        report.skipped_files += listing.skipped;
        report.max_frame = report.max_frame.max(listing.max_frame());
        listings.push((camera, listing));
    }
    report.cameras = listings.len();

    // Interleave by frame number; a camera without a given frame is skipped
    for frame in 1..=report.max_frame {
        for (camera, listing) in &listings {
            if let Some(image) = listing.images.get(&frame) {
                schema::insert_image(&tx, &NewImage {
                    number: frame,
                    camera: camera.to_string(),
                    time: image.time.clone(),
                    name: image.name.clone(),
                    exposure_us: Some(LEGACY_EXPOSURE_US),
                })?;
                report.images += 1;
            }
        }
    }

    let attitude_log = deployment_path.join(LOGS_FOLDER).join(ATTITUDE_LOG_FILENAME);
    if attitude_log.is_file() {
        for row in attitude_log::read_attitude_log(&attitude_log)? {
            schema::insert_sync_sensor(&tx, row.frame, DEPTH_SENSOR_ID, ATTITUDE_HEADER, &row.sentence)?;
            report.sensor_rows += 1;
        }
    }

    tx.commit()?;
    Ok(report)
}
