// CamTrawl attitude datagram
// $OHPR,heading,pitch,roll,temperature,depth,Xi,Yi,Zi*CS  (comma or pipe delimited)

use serde::Serialize;

use super::{split_checksum, DatagramError};
use crate::constants::ATTITUDE_HEADER;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttitudeDatagram {
    pub heading: Option<f64>,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub temperature: Option<f64>,
    pub depth: Option<f64>,
    pub xi: Option<f64>,
    pub yi: Option<f64>,
    pub zi: Option<f64>,
}

impl AttitudeDatagram {
    /// Decode an attitude datagram. Fields that are blank or not numeric come
    /// back as None; only a wrong header is an error. The checksum is not
    /// verified since converted deployments carry a placeholder "*00".
    pub fn parse(datagram: &str) -> Result<Self, DatagramError> {
        let datagram = datagram.trim();
        if datagram.is_empty() {
            return Err(DatagramError::Empty);
        }

        let (body, _checksum) = split_checksum(datagram);
        let separator = if body.contains('|') { '|' } else { ',' };
        let fields: Vec<&str> = body.split(separator).collect();

        if fields[0].trim() != ATTITUDE_HEADER {
            return Err(DatagramError::Unsupported(fields[0].to_string()));
        }

        let value = |i: usize| fields.get(i).and_then(|f| f.trim().parse::<f64>().ok());

        Ok(Self {
            heading: value(1),
            pitch: value(2),
            roll: value(3),
            temperature: value(4),
            depth: value(5),
            xi: value(6),
            yi: value(7),
            zi: value(8),
        })
    }

    /// Build the sentence written for legacy attitude log rows. Values are kept
    /// verbatim so the stored text matches the log byte for byte.
    pub fn legacy_sentence(heading: &str, pitch: &str, roll: &str, depth: &str) -> String {
        format!(
            "{},{},{},{},{},{},0,0,0*00",
            ATTITUDE_HEADER,
            heading,
            pitch,
            roll,
            crate::constants::LEGACY_TEMPERATURE,
            depth
        )
    }
}

/// The datagram text after the "$OHPR," prefix, as exported to CSV.
pub fn strip_header(datagram: &str) -> &str {
    datagram.get(ATTITUDE_HEADER.len() + 1..).unwrap_or("")
}
