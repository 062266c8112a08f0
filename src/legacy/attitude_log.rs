// Flat attitude log (logs/attitude.log)
// CSV with a header row; columns: time, frame, heading, pitch, roll, depth, ...

use std::path::Path;

use crate::datagram::AttitudeDatagram;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttitudeLogRow {
    pub frame: i64,
    /// Attitude sentence built from the row.
    pub sentence: String,
}

/// Read the attitude log. Rows that are too short or carry no frame number
/// are skipped.
pub fn read_attitude_log(path: &Path) -> Result<Vec<AttitudeLogRow>> {
    let text = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();

    for (line_no, line) in text.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 6 {
            log::warn!("attitude.log line {}: expected 6 fields, got {}", line_no + 1, fields.len());
            continue;
        }
        let frame = match fields[1].parse::<i64>() {
            Ok(frame) => frame,
            Err(_) => {
                log::warn!("attitude.log line {}: bad frame {:?}", line_no + 1, fields[1]);
                continue;
            }
        };
        rows.push(AttitudeLogRow {
            frame,
            sentence: AttitudeDatagram::legacy_sentence(fields[2], fields[3], fields[4], fields[5]),
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_attitude_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attitude.log");
        std::fs::write(
            &path,
            "time,frame,heading,pitch,roll,depth\r\n\
             2021-02-18 19:46:18,1,181.5,-2.0,0.5,30.1\r\n\
             2021-02-18 19:46:19,x,0,0,0,0\r\n\
             2021-02-18 19:46:20,3,182.0\r\n\
             2021-02-18 19:46:21,4,183.0,-1.5,0.25,31.0\r\n",
        )
        .unwrap();

        let rows = read_attitude_log(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].frame, 1);
        assert_eq!(rows[0].sentence, "$OHPR,181.5,-2.0,0.5,-999.0,30.1,0,0,0*00");
        assert_eq!(rows[1].frame, 4);
    }
}
