// Sensor datagram parsers
// Pure functions over the text payloads stored in sensor_data / async_data.

pub mod attitude;
pub mod nmea;

use thiserror::Error;

pub use attitude::AttitudeDatagram;
pub use nmea::{parse_position, FixValidity, PositionFix, SentenceKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatagramError {
    #[error("empty datagram")]
    Empty,

    #[error("unsupported sentence: {0}")]
    Unsupported(String),

    #[error("checksum mismatch: expected {expected:02X}, computed {computed:02X}")]
    Checksum { expected: u8, computed: u8 },

    #[error("missing field {0}")]
    MissingField(usize),

    #[error("bad field {index}: {value:?}")]
    BadField { index: usize, value: String },
}

/// Split "BODY*CS" into the body and the optional checksum text.
pub(crate) fn split_checksum(sentence: &str) -> (&str, Option<&str>) {
    match sentence.rsplit_once('*') {
        Some((body, cs)) => (body, Some(cs.trim())),
        None => (sentence, None),
    }
}
