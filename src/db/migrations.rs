// Database migrations
// Migrations are additive and idempotent. A missing table or column is the only
// trigger for a statement; nothing is ever dropped or narrowed. Never edit or
// reorder a step after it ships, only append.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::constants::{IMAGES_FOLDER, IMAGE_EXTENSIONS, PARAM_IMAGE_FILE_TYPE};
use crate::db::schema;
use crate::error::{MetadataError, Result};

/// Shape written by the flat-file converter (first metadata databases).
pub const LEGACY_SCHEMA_VERSION: u32 = 1;
pub const LATEST_SCHEMA_VERSION: u32 = 4;

/// One additive schema change.
#[derive(Debug, Clone, Copy)]
pub enum SchemaStep {
    CreateTable {
        version: u32,
        table: &'static str,
        create: &'static str,
        /// Statements run right after the table is created, and only then.
        seed: &'static [&'static str],
    },
    AddColumn {
        version: u32,
        table: &'static str,
        column: &'static str,
        alter: &'static str,
    },
}

impl SchemaStep {
    pub fn version(&self) -> u32 {
        match self {
            SchemaStep::CreateTable { version, .. } | SchemaStep::AddColumn { version, .. } => {
                *version
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            SchemaStep::CreateTable { table, .. } => format!("create table {}", table),
            SchemaStep::AddColumn { table, column, .. } => format!("add column {}.{}", table, column),
        }
    }
}

/// All schema steps in version order.
pub const SCHEMA_STEPS: &[SchemaStep] = &[
    // Version 1: flat-file conversion shape
    SchemaStep::CreateTable {
        version: 1,
        table: "cameras",
        create: "CREATE TABLE cameras (camera TEXT NOT NULL, mac_address TEXT, model TEXT, label TEXT, \
                 orientation INTEGER DEFAULT 0, PRIMARY KEY(camera))",
        seed: &[],
    },
    SchemaStep::CreateTable {
        version: 1,
        table: "images",
        create: "CREATE TABLE images (number INTEGER NOT NULL, camera TEXT NOT NULL, time TEXT, name TEXT, \
                 exposure_us INTEGER, discarded INTEGER, PRIMARY KEY(number,camera))",
        seed: &[],
    },
    SchemaStep::CreateTable {
        version: 1,
        table: "dropped",
        create: "CREATE TABLE dropped (number INTEGER NOT NULL, camera TEXT NOT NULL, time TEXT, \
                 PRIMARY KEY(number,camera))",
        seed: &[],
    },
    SchemaStep::CreateTable {
        version: 1,
        table: "sensor_data",
        create: "CREATE TABLE sensor_data (number INTEGER, sensor_id TEXT, header TEXT, data TEXT)",
        seed: &[],
    },
    SchemaStep::CreateTable {
        version: 1,
        table: "deployment_data",
        create: "CREATE TABLE deployment_data (deployment_parameter TEXT NOT NULL, \
                 parameter_value TEXT NOT NULL, PRIMARY KEY(deployment_parameter))",
        seed: &["INSERT INTO deployment_data (deployment_parameter, parameter_value) \
                 VALUES ('hours_offset_to_utc', '0')"],
    },
    // Version 2: tables added by later acquisition releases
    SchemaStep::CreateTable {
        version: 2,
        table: "videos",
        create: "CREATE TABLE videos (camera TEXT NOT NULL, filename TEXT NOT NULL, \
                 start_frame INTEGER NOT NULL, end_frame INTEGER NOT NULL, start_time TEXT NOT NULL, \
                 end_time TEXT NOT NULL, PRIMARY KEY(camera, filename))",
        seed: &[],
    },
    SchemaStep::CreateTable {
        version: 2,
        table: "deployment",
        create: "CREATE TABLE deployment (deployment_name TEXT, survey_name TEXT, vessel_name TEXT, \
                 camera_name TEXT, survey_description TEXT, deployment_time TEXT, \
                 deployment_latitude NUMBER, deployment_longitude NUMBER, max_deployment_depth NUMBER, \
                 comments TEXT)",
        seed: &[],
    },
    SchemaStep::CreateTable {
        version: 2,
        table: "marks",
        create: "CREATE TABLE marks (frame_number INTEGER, mark_description TEXT)",
        seed: &[],
    },
    SchemaStep::CreateTable {
        version: 2,
        table: "async_data",
        create: "CREATE TABLE async_data (time TEXT NOT NULL, sensor_id TEXT NOT NULL, \
                 header TEXT NOT NULL, data TEXT, PRIMARY KEY(time,sensor_id,header))",
        seed: &[],
    },
    // Version 3: camera display settings
    SchemaStep::AddColumn {
        version: 3,
        table: "cameras",
        column: "rotation",
        alter: "ALTER TABLE cameras ADD COLUMN rotation TEXT DEFAULT 'NONE'",
    },
    SchemaStep::AddColumn {
        version: 3,
        table: "cameras",
        column: "display_exposure",
        alter: "ALTER TABLE cameras ADD COLUMN display_exposure INTEGER DEFAULT 1",
    },
    // Version 4: per-image acquisition details
    SchemaStep::AddColumn {
        version: 4,
        table: "images",
        column: "exposure_us",
        alter: "ALTER TABLE images ADD COLUMN exposure_us INTEGER",
    },
    SchemaStep::AddColumn {
        version: 4,
        table: "images",
        column: "discarded",
        alter: "ALTER TABLE images ADD COLUMN discarded INTEGER",
    },
    SchemaStep::AddColumn {
        version: 4,
        table: "images",
        column: "md5_checksum",
        alter: "ALTER TABLE images ADD COLUMN md5_checksum TEXT",
    },
    SchemaStep::AddColumn {
        version: 4,
        table: "images",
        column: "gain",
        alter: "ALTER TABLE images ADD COLUMN gain FLOAT",
    },
    SchemaStep::AddColumn {
        version: 4,
        table: "images",
        column: "still_image",
        alter: "ALTER TABLE images ADD COLUMN still_image INTEGER DEFAULT 1",
    },
    SchemaStep::AddColumn {
        version: 4,
        table: "images",
        column: "video_frame",
        alter: "ALTER TABLE images ADD COLUMN video_frame INTEGER DEFAULT 0",
    },
];

/// Check whether a table exists
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Check whether a table has a column (case-insensitive)
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name?.eq_ignore_ascii_case(column) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Apply one step if its table/column is missing. Returns true if it ran.
pub fn apply_step(conn: &Connection, step: &SchemaStep) -> Result<bool> {
    let statements: Vec<&str> = match step {
        SchemaStep::CreateTable { table, create, seed, .. } => {
            if table_exists(conn, table)? {
                return Ok(false);
            }
            std::iter::once(*create).chain(seed.iter().copied()).collect()
        }
        SchemaStep::AddColumn { table, column, alter, .. } => {
            if !table_exists(conn, table)? || column_exists(conn, table, column)? {
                return Ok(false);
            }
            vec![*alter]
        }
    };

    for statement in statements {
        if let Err(e) = conn.execute_batch(statement) {
            if is_already_exists(&e) {
                log::debug!("Schema step already present: {}", step.describe());
                continue;
            }
            return Err(MetadataError::Schema {
                statement: statement.to_string(),
                source: e,
            });
        }
    }

    log::info!("Applied schema step (v{}): {}", step.version(), step.describe());
    Ok(true)
}

fn is_already_exists(e: &rusqlite::Error) -> bool {
    let msg = e.to_string().to_lowercase();
    msg.contains("already exists") || msg.contains("duplicate column")
}

/// Bring the schema up to `max_version`. Safe to run any number of times.
/// Returns the number of steps applied.
pub fn ensure_schema_to(conn: &Connection, max_version: u32) -> Result<usize> {
    let mut applied = 0;
    for step in SCHEMA_STEPS.iter().filter(|s| s.version() <= max_version) {
        if apply_step(conn, step)? {
            applied += 1;
        }
    }
    Ok(applied)
}

/// Bring the schema up to the latest version.
pub fn ensure_schema(conn: &Connection) -> Result<usize> {
    ensure_schema_to(conn, LATEST_SCHEMA_VERSION)
}

/// Determine the image file extension (".jpg", ...) for a deployment.
///
/// 1) the image_file_type parameter, if set
/// 2) else probe the images directory for the first kept still image and
///    persist what was found
/// 3) else the empty string
pub fn resolve_image_extension(conn: &Connection, deployment_path: &Path) -> Result<String> {
    if let Some(stored) = schema::get_parameter(conn, PARAM_IMAGE_FILE_TYPE)? {
        let stored = stored.trim().to_lowercase();
        if !stored.is_empty() {
            return Ok(if stored.starts_with('.') {
                stored
            } else {
                format!(".{}", stored)
            });
        }
    }

    let first = conn
        .query_row(
            "SELECT camera, name FROM images WHERE (discarded IS NULL OR discarded = 0) \
             AND still_image = 1 ORDER BY rowid LIMIT 1",
            [],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?;

    let (camera, name) = match first {
        Some((camera, Some(name))) => (camera, name),
        _ => return Ok(String::new()),
    };

    let stem = deployment_path.join(IMAGES_FOLDER).join(&camera).join(&name);
    for ext in IMAGE_EXTENSIONS {
        let mut candidate = stem.clone().into_os_string();
        candidate.push(ext);
        if Path::new(&candidate).is_file() {
            schema::set_parameter(conn, PARAM_IMAGE_FILE_TYPE, &ext[1..])?;
            log::info!("Detected image file type {} from {}", ext, stem.display());
            return Ok(ext.to_string());
        }
    }

    log::warn!("No image file found for {}; image file type unknown", stem.display());
    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_sql(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT sql FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn test_steps_are_version_ordered() {
        let versions: Vec<u32> = SCHEMA_STEPS.iter().map(|s| s.version()).collect();
        let mut sorted = versions.clone();
        sorted.sort();
        assert_eq!(versions, sorted);
        assert_eq!(versions.last().copied(), Some(LATEST_SCHEMA_VERSION));
    }

    #[test]
    fn test_fresh_schema_has_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let applied = ensure_schema(&conn).unwrap();
        assert!(applied > 0);

        for table in [
            "cameras", "images", "dropped", "sensor_data", "async_data", "marks",
            "deployment_data", "deployment", "videos",
        ] {
            assert!(table_exists(&conn, table).unwrap(), "missing table {}", table);
        }
        assert!(column_exists(&conn, "cameras", "rotation").unwrap());
        assert!(column_exists(&conn, "images", "video_frame").unwrap());

        let offset = schema::get_parameter(&conn, "hours_offset_to_utc").unwrap();
        assert_eq!(offset.as_deref(), Some("0"));
    }

    #[test]
    fn test_ensure_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let before = schema_sql(&conn);

        let applied = ensure_schema(&conn).unwrap();
        assert_eq!(applied, 0, "second run should apply nothing");
        assert_eq!(schema_sql(&conn), before);

        // Seed rows are not duplicated
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM deployment_data", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_upgrade_from_legacy_keeps_rows() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema_to(&conn, LEGACY_SCHEMA_VERSION).unwrap();
        assert!(!table_exists(&conn, "marks").unwrap());
        assert!(!column_exists(&conn, "images", "still_image").unwrap());

        conn.execute(
            "INSERT INTO images VALUES (1, 'cam_a', '2021-02-18 19:46:18.000000', 'img1', -1, NULL)",
            [],
        )
        .unwrap();

        ensure_schema(&conn).unwrap();
        let (name, still, video): (String, i64, i64) = conn
            .query_row(
                "SELECT name, still_image, video_frame FROM images WHERE number = 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(name, "img1");
        assert_eq!(still, 1, "existing rows pick up the column default");
        assert_eq!(video, 0);
    }

    #[test]
    fn test_failed_statement_is_schema_error() {
        let conn = Connection::open_in_memory().unwrap();
        let step = SchemaStep::CreateTable {
            version: 1,
            table: "broken",
            create: "CREATE TABLE broken (",
            seed: &[],
        };
        let err = apply_step(&conn, &step).unwrap_err();
        assert!(matches!(err, MetadataError::Schema { .. }));
    }

    #[test]
    fn test_image_extension_from_parameter() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let dir = tempfile::tempdir().unwrap();

        schema::set_parameter(&conn, "image_file_type", "JPG").unwrap();
        assert_eq!(resolve_image_extension(&conn, dir.path()).unwrap(), ".jpg");

        schema::set_parameter(&conn, "image_file_type", ".tif").unwrap();
        assert_eq!(resolve_image_extension(&conn, dir.path()).unwrap(), ".tif");
    }

    #[test]
    fn test_image_extension_probed_and_persisted() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let dir = tempfile::tempdir().unwrap();

        // No images at all
        assert_eq!(resolve_image_extension(&conn, dir.path()).unwrap(), "");

        conn.execute(
            "INSERT INTO images (number, camera, time, name) VALUES (1, 'cam_a', '2021-02-18 19:46:18.000000', 'img1')",
            [],
        )
        .unwrap();
        let cam_dir = dir.path().join("images").join("cam_a");
        std::fs::create_dir_all(&cam_dir).unwrap();
        std::fs::write(cam_dir.join("img1.tiff"), b"tiff").unwrap();

        assert_eq!(resolve_image_extension(&conn, dir.path()).unwrap(), ".tiff");
        let stored = schema::get_parameter(&conn, "image_file_type").unwrap();
        assert_eq!(stored.as_deref(), Some("tiff"));
    }
}
