// Frame marks
// Operator annotations, at most one per frame number.

use rusqlite::Connection;

use crate::db::schema::{self, Mark};
use crate::error::Result;
use crate::sync::Snapshot;

/// Create or replace the mark on `frame`, keeping the snapshot in step.
pub fn create_mark(conn: &Connection, snap: &mut Snapshot, frame: i64, description: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    schema::delete_mark(&tx, frame)?;
    schema::insert_mark(&tx, frame, description)?;
    tx.commit()?;

    snap.marks.insert(frame, description.to_string());
    Ok(())
}

/// Remove the mark on `frame`. Returns false if there was none.
pub fn remove_mark(conn: &Connection, snap: &mut Snapshot, frame: i64) -> Result<bool> {
    let deleted = schema::delete_mark(conn, frame)?;
    snap.marks.remove(&frame);
    Ok(deleted > 0)
}

pub fn all_marks(conn: &Connection) -> Result<Vec<Mark>> {
    schema::all_marks(conn)
}

/// The first mark after `frame`, or None.
pub fn find_next_mark(conn: &Connection, frame: i64) -> Result<Option<Mark>> {
    schema::next_mark(conn, frame)
}

/// The first mark before `frame`, or None.
pub fn find_previous_mark(conn: &Connection, frame: i64) -> Result<Option<Mark>> {
    schema::previous_mark(conn, frame)
}

/// Bulk set or clear the discarded marker on [start, end] for every camera.
/// The snapshot is left alone; query again to see the change. A reversed
/// range matches nothing.
pub fn set_discarded(conn: &Connection, start: i64, end: i64, unset: bool) -> Result<usize> {
    let changed = schema::set_discarded_range(conn, start, end, unset)?;
    log::info!(
        "{} {} image rows in frames {}..={}",
        if unset { "Restored" } else { "Discarded" },
        changed,
        start,
        end
    );
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::ensure_schema;
    use crate::db::schema::NewImage;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_create_mark_replaces() {
        let conn = setup_db();
        let mut snap = Snapshot::default();

        create_mark(&conn, &mut snap, 12, "x").unwrap();
        create_mark(&conn, &mut snap, 12, "y").unwrap();

        let marks = all_marks(&conn).unwrap();
        assert_eq!(marks, vec![Mark { frame: 12, description: "y".to_string() }]);
        assert_eq!(snap.marks[&12], "y");
    }

    #[test]
    fn test_remove_absent_mark_is_noop() {
        let conn = setup_db();
        let mut snap = Snapshot::default();
        assert!(!remove_mark(&conn, &mut snap, 3).unwrap());

        create_mark(&conn, &mut snap, 3, "halibut").unwrap();
        assert!(remove_mark(&conn, &mut snap, 3).unwrap());
        assert!(snap.marks.is_empty());
        assert!(all_marks(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_neighbor_search_is_strict() {
        let conn = setup_db();
        let mut snap = Snapshot::default();
        create_mark(&conn, &mut snap, 5, "a").unwrap();
        create_mark(&conn, &mut snap, 9, "b").unwrap();

        assert_eq!(find_next_mark(&conn, 5).unwrap().map(|m| m.frame), Some(9));
        assert_eq!(find_next_mark(&conn, 9).unwrap(), None);
        assert_eq!(find_previous_mark(&conn, 9).unwrap().map(|m| m.frame), Some(5));
        assert_eq!(find_previous_mark(&conn, 5).unwrap(), None);
    }

    #[test]
    fn test_discard_round_trip() {
        let conn = setup_db();
        for camera in ["A", "B"] {
            for n in 1..=4 {
                schema::insert_image(&conn, &NewImage {
                    number: n,
                    camera: camera.to_string(),
                    time: "2021-02-18 19:46:18.000000".to_string(),
                    name: format!("{:05}", n),
                    exposure_us: None,
                })
                .unwrap();
            }
        }

        assert_eq!(set_discarded(&conn, 2, 3, false).unwrap(), 4);
        assert_eq!(schema::discarded_images(&conn).unwrap().len(), 4);

        set_discarded(&conn, 2, 3, true).unwrap();
        let images = schema::list_images(&conn).unwrap();
        assert!(images.iter().all(|i| i.discarded.is_none()));

        assert_eq!(set_discarded(&conn, 3, 2, false).unwrap(), 0);
        assert!(schema::discarded_images(&conn).unwrap().is_empty());
    }
}
