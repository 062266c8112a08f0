// Trimming discarded images from disk

use std::io::ErrorKind;

use serde::Serialize;

use crate::db::schema;
use crate::db::Store;
use crate::error::Result;

/// Outcome of a trim pass. A file that is already gone counts as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrimReport {
    pub removed: usize,
    pub missing: usize,
    pub failed: usize,
    pub failures: Vec<TrimFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrimFailure {
    pub camera: String,
    pub name: String,
    pub error: String,
}

/// Delete the file of every image marked discarded. Rows are kept.
pub fn delete_discarded_images(store: &Store) -> Result<TrimReport> {
    let mut report = TrimReport::default();

    for (camera, name) in schema::discarded_images(store.conn())? {
        let path = store.image_path(&camera, &name);
        match std::fs::remove_file(&path) {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => report.missing += 1,
            Err(e) => {
                log::warn!("Could not remove {}: {}", path.display(), e);
                report.failed += 1;
                report.failures.push(TrimFailure { camera, name, error: e.to_string() });
            }
        }
    }

    log::info!(
        "Trim removed {} files ({} already missing, {} failed)",
        report.removed,
        report.missing,
        report.failed
    );
    Ok(report)
}
