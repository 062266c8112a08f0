// Database module
// One SQLite metadata file per deployment, at <deployment>/logs/CamTrawlMetadata.db3.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::constants::{DB_FILENAME, IMAGES_FOLDER, LOGS_FOLDER};
use crate::error::{MetadataError, Result};

/// Get the metadata database path for a deployment directory
pub fn get_db_path(deployment_path: &Path) -> PathBuf {
    deployment_path.join(LOGS_FOLDER).join(DB_FILENAME)
}

/// An open deployment store. Owns the only connection to the metadata file;
/// dropping or closing it releases the file.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
    deployment_path: PathBuf,
    db_path: PathBuf,
    image_extension: String,
}

impl Store {
    /// Open an existing deployment store and bring its schema up to date.
    pub fn open(deployment_path: &Path) -> Result<Self> {
        let db_path = get_db_path(deployment_path);
        if !db_path.is_file() {
            return Err(MetadataError::StoreNotFound(db_path));
        }

        let conn = Connection::open(&db_path)?;
        let applied = migrations::ensure_schema(&conn)?;
        if applied > 0 {
            log::info!("Upgraded {} ({} schema steps)", db_path.display(), applied);
        }

        let image_extension = migrations::resolve_image_extension(&conn, deployment_path)?;
        log::debug!(
            "Opened {} (image extension {:?})",
            db_path.display(),
            image_extension
        );

        Ok(Self {
            conn,
            deployment_path: deployment_path.to_path_buf(),
            db_path,
            image_extension,
        })
    }

    /// Create a new store in the flat-file conversion shape. Fails if one exists.
    /// The returned connection is not schema-upgraded; reopen with `Store::open`.
    pub fn create_legacy(deployment_path: &Path) -> Result<Connection> {
        let db_path = get_db_path(deployment_path);
        if db_path.exists() {
            return Err(MetadataError::StoreExists(db_path));
        }
        if let Some(logs) = db_path.parent() {
            std::fs::create_dir_all(logs)?;
        }

        let conn = Connection::open(&db_path)?;
        migrations::ensure_schema_to(&conn, migrations::LEGACY_SCHEMA_VERSION)?;
        Ok(conn)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn deployment_path(&self) -> &Path {
        &self.deployment_path
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Image file extension including the dot, or "" if unknown.
    pub fn image_extension(&self) -> &str {
        &self.image_extension
    }

    /// Path of an image file on disk: <deployment>/images/<camera>/<name><ext>
    pub fn image_path(&self, camera: &str, name: &str) -> PathBuf {
        let mut file = name.to_string();
        file.push_str(&self.image_extension);
        self.deployment_path.join(IMAGES_FOLDER).join(camera).join(file)
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| MetadataError::Database(e))
    }
}
