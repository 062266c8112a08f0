// Synchronization engine tests

use rusqlite::{params, Connection};

use super::*;
use crate::db::migrations::ensure_schema;
use crate::db::schema::{self, NewCamera, NewImage};
use crate::error::MetadataError;
use crate::timestamp::{parse_stored, TimeWindow};

fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    ensure_schema(&conn).unwrap();
    conn
}

fn add_camera(conn: &Connection, name: &str) {
    schema::insert_camera(conn, &NewCamera {
        camera: name.to_string(),
        mac_address: format!("{}-mac", name),
        model: "Cam".to_string(),
        label: name.to_string(),
    })
    .unwrap();
}

/// Image n is recorded at 19:46:(17 + n).
fn add_image(conn: &Connection, camera: &str, number: i64) {
    schema::insert_image(conn, &NewImage {
        number,
        camera: camera.to_string(),
        time: format!("2021-02-18 19:46:{:02}.000000", 17 + number),
        name: format!("{:05}_{}", number, camera),
        exposure_us: Some(4000),
    })
    .unwrap();
}

fn query_all(conn: &Connection) -> Snapshot {
    run_query(conn, &TimeWindow::default(), false).unwrap()
}

#[test]
fn test_start_end_follow_camera_order() {
    let conn = setup_db();
    add_camera(&conn, "A");
    add_camera(&conn, "B");
    for n in 1..=3 {
        add_image(&conn, "A", n);
    }
    for n in 2..=5 {
        add_image(&conn, "B", n);
    }

    let snap = query_all(&conn);
    assert_eq!(snap.start_image, Some(1));
    assert_eq!(snap.end_image, Some(5));
    assert_eq!(snap.image_numbers, vec![2, 3]);
    assert_eq!(snap.camera_names().collect::<Vec<_>>(), vec!["A", "B"]);
}

#[test]
fn test_start_end_with_reversed_registration() {
    let conn = setup_db();
    add_camera(&conn, "B");
    add_camera(&conn, "A");
    for n in 1..=3 {
        add_image(&conn, "A", n);
    }
    for n in 2..=5 {
        add_image(&conn, "B", n);
    }

    // First camera is B, last camera is A
    let snap = query_all(&conn);
    assert_eq!(snap.start_image, Some(2));
    assert_eq!(snap.end_image, Some(3));
}

#[test]
fn test_common_frames_are_intersection() {
    let conn = setup_db();
    add_camera(&conn, "A");
    add_camera(&conn, "B");
    add_camera(&conn, "C");
    for n in [1, 2, 3, 4] {
        add_image(&conn, "A", n);
    }
    for n in [2, 3, 4] {
        add_image(&conn, "B", n);
    }
    for n in [1, 3, 4] {
        add_image(&conn, "C", n);
    }

    assert_eq!(query_all(&conn).image_numbers, vec![3, 4]);
}

#[test]
fn test_single_camera() {
    let conn = setup_db();
    add_camera(&conn, "A");
    for n in 1..=4 {
        add_image(&conn, "A", n);
    }

    let snap = query_all(&conn);
    assert_eq!(snap.image_numbers, vec![1, 2, 3, 4]);
    assert_eq!(snap.start_image, Some(1));
    assert_eq!(snap.end_image, Some(4));
    assert_eq!(snap.start_time, Some(parse_stored("2021-02-18 19:46:18").unwrap()));
    assert_eq!(snap.end_time, Some(parse_stored("2021-02-18 19:46:21").unwrap()));
    assert_eq!(snap.images("A").unwrap()[&2].name, "00002_A");
}

#[test]
fn test_camera_without_images_empties_common_frames() {
    let conn = setup_db();
    add_camera(&conn, "A");
    add_camera(&conn, "B");
    add_image(&conn, "A", 1);

    let snap = query_all(&conn);
    assert!(snap.image_numbers.is_empty());
    assert!(snap.images("B").unwrap().is_empty());
    assert_eq!(snap.start_image, Some(1));
}

#[test]
fn test_time_window_filters_images() {
    let conn = setup_db();
    add_camera(&conn, "A");
    for n in 1..=3 {
        add_image(&conn, "A", n);
    }

    let start = parse_stored("2021-02-18 19:46:19").unwrap();
    let snap = run_query(&conn, &TimeWindow::new(Some(start), None), false).unwrap();
    assert_eq!(snap.image_numbers, vec![2, 3]);
    assert_eq!(snap.start_image, Some(2));

    // Bounds are compared at second precision against the stored text
    let end = parse_stored("2021-02-18 19:46:20").unwrap();
    let snap = run_query(&conn, &TimeWindow::new(None, Some(end)), false).unwrap();
    assert_eq!(snap.image_numbers, vec![1, 2]);
}

#[test]
fn test_discarded_images_hidden_unless_requested() {
    let conn = setup_db();
    add_camera(&conn, "A");
    for n in 1..=3 {
        add_image(&conn, "A", n);
    }
    schema::set_discarded_range(&conn, 2, 2, false).unwrap();

    let snap = query_all(&conn);
    assert_eq!(snap.image_numbers, vec![1, 3]);

    let snap = run_query(&conn, &TimeWindow::default(), true).unwrap();
    assert_eq!(snap.image_numbers, vec![1, 2, 3]);

    // Clearing the marker brings the frame back
    schema::set_discarded_range(&conn, 1, 3, true).unwrap();
    assert_eq!(query_all(&conn).image_numbers, vec![1, 2, 3]);
}

#[test]
fn test_utc_offset_applied_to_every_stream() {
    let conn = setup_db();
    schema::set_parameter(&conn, "hours_offset_to_utc", "2").unwrap();
    add_camera(&conn, "A");
    add_image(&conn, "A", 1);
    schema::insert_sync_sensor(&conn, 1, "CTControl", "$OHPR", "$OHPR,1,2,3,4,5,6,7,8*00").unwrap();
    schema::insert_async(&conn, "2021-02-18 19:46:18.500000", "GPS", "$GPGGA", "$GPGGA,x").unwrap();

    let snap = query_all(&conn);
    assert_eq!(snap.hours_offset_to_utc, 2.0);

    let image = &snap.images("A").unwrap()[&1];
    assert_eq!(image.utc_time, parse_stored("2021-02-18 21:46:18").unwrap());
    assert_eq!(snap.frame_times[&1].utc_time, image.utc_time);

    let series = snap.async_series("GPS", "$GPGGA").unwrap();
    assert_eq!(series.utc_time[0], parse_stored("2021-02-18 21:46:18.5").unwrap());
    assert_eq!(snap.deployment_data["hours_offset_to_utc"], "2");
}

#[test]
fn test_huge_utc_offset_is_ignored() {
    let conn = setup_db();
    schema::set_parameter(&conn, "hours_offset_to_utc", "1e10").unwrap();
    add_camera(&conn, "A");
    add_image(&conn, "A", 1);
    schema::insert_async(&conn, "2021-02-18 19:46:18.500000", "GPS", "$GPGGA", "$GPGGA,x").unwrap();
    schema::insert_dropped(&conn, 2, "A", "2021-02-18 19:46:19.000000").unwrap();

    let snap = query_all(&conn);
    assert_eq!(snap.hours_offset_to_utc, 0.0);
    let image = &snap.images("A").unwrap()[&1];
    assert_eq!(image.utc_time, image.time);
    assert_eq!(snap.dropped_data["A"][&2].utc_time, parse_stored("2021-02-18 19:46:19").unwrap());
}

#[test]
fn test_cameras_from_images_on_legacy_store() {
    let conn = setup_db();
    add_image(&conn, "Right", 1);
    add_image(&conn, "Left", 1);
    add_image(&conn, "Right", 2);

    let snap = query_all(&conn);
    assert_eq!(snap.camera_names().collect::<Vec<_>>(), vec!["Right", "Left"]);
    let right = snap.camera("Right").unwrap();
    assert_eq!(right.mac_address, "");
    assert_eq!(right.orientation, Orientation::None);
    assert_eq!(snap.image_numbers, vec![1]);
}

#[test]
fn test_sync_sensor_rows() {
    let conn = setup_db();
    add_camera(&conn, "A");
    add_camera(&conn, "B");
    for n in 1..=3 {
        add_image(&conn, "A", n);
        add_image(&conn, "B", n);
    }
    schema::insert_sync_sensor(&conn, 2, "CTControl", "$OHPR", "$OHPR,10,1,2,3,15.5,0,0,0*00").unwrap();
    // Outside [start, end]
    schema::insert_sync_sensor(&conn, 9, "CTControl", "$OHPR", "$OHPR,0,0,0,0,1,0,0,0*00").unwrap();
    // Unreadable payload
    conn.execute(
        "INSERT INTO sensor_data (number, sensor_id, header, data) VALUES (3, 'CTControl', '$OHPR', X'00FF')",
        [],
    )
    .unwrap();
    // Missing header
    conn.execute(
        "INSERT INTO sensor_data (number, sensor_id, header, data) VALUES (1, 'CTControl', NULL, 'x')",
        [],
    )
    .unwrap();

    let snap = query_all(&conn);
    let ohpr = snap.sensor("CTControl", "$OHPR").unwrap();
    assert_eq!(ohpr.len(), 2);
    assert_eq!(ohpr[&2], "$OHPR,10,1,2,3,15.5,0,0,0*00");
    assert_eq!(ohpr[&3], "");
    assert!(!ohpr.contains_key(&9));
    assert_eq!(snap.sensor_data["CTControl"].len(), 1);
    assert_eq!(snap.frame_times.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
}

#[test]
fn test_no_images_leaves_frame_scoped_data_empty() {
    let conn = setup_db();
    add_camera(&conn, "A");
    schema::insert_sync_sensor(&conn, 1, "CTControl", "$OHPR", "x").unwrap();
    schema::insert_mark(&conn, 1, "fish").unwrap();

    let snap = query_all(&conn);
    assert!(snap.is_empty());
    assert_eq!(snap.start_image, None);
    assert_eq!(snap.end_image, None);
    assert_eq!(snap.timespan(), (None, None));
    assert!(snap.sensor_data.is_empty());
    assert!(snap.marks.is_empty());
}

#[test]
fn test_marks_loaded_inside_range() {
    let conn = setup_db();
    add_camera(&conn, "A");
    for n in 2..=4 {
        add_image(&conn, "A", n);
    }
    schema::insert_mark(&conn, 1, "before").unwrap();
    schema::insert_mark(&conn, 3, "rockfish").unwrap();

    let snap = query_all(&conn);
    assert_eq!(snap.marks.len(), 1);
    assert_eq!(snap.marks[&3], "rockfish");
}

#[test]
fn test_dropped_frames_counted_once() {
    let conn = setup_db();
    add_camera(&conn, "A");
    add_image(&conn, "A", 1);
    schema::insert_dropped(&conn, 4, "A", "2021-02-18 19:46:21.000000").unwrap();
    schema::insert_dropped(&conn, 4, "B", "2021-02-18 19:46:21.000000").unwrap();
    schema::insert_dropped(&conn, 7, "A", "2021-02-18 19:46:24.000000").unwrap();

    let snap = query_all(&conn);
    assert_eq!(snap.n_dropped_images, 2);
    assert_eq!(snap.dropped_data["A"].len(), 2);
    assert!(snap.dropped_data["B"].contains_key(&4));
}

#[test]
fn test_async_rows_ordered_by_time() {
    let conn = setup_db();
    for (time, data) in [
        ("2021-02-18 19:46:20.000000", "second"),
        ("2021-02-18 19:46:19.000000", "first"),
    ] {
        schema::insert_async(&conn, time, "GPS", "$GPRMC", data).unwrap();
    }
    conn.execute(
        "INSERT INTO async_data (time, sensor_id, header, data) VALUES (?1, 'GPS', '$GPGGA', X'01')",
        params!["2021-02-18 19:46:21.000000"],
    )
    .unwrap();

    let snap = query_all(&conn);
    let rmc = snap.async_series("GPS", "$GPRMC").unwrap();
    assert_eq!(rmc.data, vec!["first", "second"]);
    assert_eq!(rmc.len(), 2);
    assert_eq!(snap.async_series("GPS", "$GPGGA").unwrap().data, vec![""]);
}

#[test]
fn test_malformed_image_time_fails_query() {
    let conn = setup_db();
    add_camera(&conn, "A");
    conn.execute(
        "INSERT INTO images (number, camera, time, name) VALUES (1, 'A', '2021-02-18 19:46:18.000000', 'ok')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO images (number, camera, time, name) VALUES (2, 'A', '2021-02-18 19:46:18junk', 'bad')",
        [],
    )
    .unwrap();

    let err = run_query(&conn, &TimeWindow::default(), false).unwrap_err();
    assert!(matches!(err, MetadataError::Parse(_)));
}
