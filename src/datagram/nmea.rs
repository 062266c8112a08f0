// NMEA 0183 positioning sentences
//
// Supported: GGA (fix quality), RMC and GLL (status), GNS and WPL (no validity field).
// Any talker id is accepted ($GP, $GN, $GL, ...).

use serde::Serialize;

use super::{split_checksum, DatagramError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SentenceKind {
    Gga,
    Rmc,
    Gll,
    Gns,
    Wpl,
}

/// The field a sentence carries for judging whether its fix can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FixValidity {
    /// RMC/GLL status, 'A' means active.
    Status(Option<char>),
    /// GGA fix quality, 0 means no fix.
    Quality(Option<u32>),
    /// No status or quality field in this sentence type.
    Unqualified,
}

impl FixValidity {
    pub fn is_valid(&self) -> bool {
        match self {
            FixValidity::Status(status) => {
                matches!(status, Some(c) if c.eq_ignore_ascii_case(&'A'))
            }
            FixValidity::Quality(quality) => matches!(quality, Some(q) if *q > 0),
            FixValidity::Unqualified => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionFix {
    pub kind: SentenceKind,
    pub latitude: f64,
    pub longitude: f64,
    pub validity: FixValidity,
}

/// Parse a positioning sentence. Returns an error for anything that does not
/// decode to a latitude/longitude pair; the caller decides about validity.
pub fn parse_position(sentence: &str) -> Result<PositionFix, DatagramError> {
    let sentence = sentence.trim();
    if sentence.is_empty() {
        return Err(DatagramError::Empty);
    }

    let sentence = sentence.strip_prefix('$').unwrap_or(sentence);
    let (body, checksum) = split_checksum(sentence);
    if let Some(cs) = checksum {
        verify_checksum(body, cs)?;
    }

    let fields: Vec<&str> = body.split(',').collect();
    let address = fields[0];
    if address.len() < 5 || !address.is_ascii() {
        return Err(DatagramError::Unsupported(address.to_string()));
    }
    let kind = match &address[address.len() - 3..] {
        "GGA" => SentenceKind::Gga,
        "RMC" => SentenceKind::Rmc,
        "GLL" => SentenceKind::Gll,
        "GNS" => SentenceKind::Gns,
        "WPL" => SentenceKind::Wpl,
        other => return Err(DatagramError::Unsupported(other.to_string())),
    };

    // Index of the latitude field; longitude follows two fields later
    let lat_index = match kind {
        SentenceKind::Gga | SentenceKind::Gns => 2,
        SentenceKind::Rmc => 3,
        SentenceKind::Gll | SentenceKind::Wpl => 1,
    };

    let latitude = coordinate(&fields, lat_index, 2, 'S')?;
    let longitude = coordinate(&fields, lat_index + 2, 3, 'W')?;

    let validity = match kind {
        SentenceKind::Gga => FixValidity::Quality(
            fields.get(6).and_then(|q| q.trim().parse::<u32>().ok()),
        ),
        SentenceKind::Rmc => FixValidity::Status(status_char(&fields, 2)),
        SentenceKind::Gll => FixValidity::Status(status_char(&fields, 6)),
        SentenceKind::Gns | SentenceKind::Wpl => FixValidity::Unqualified,
    };

    Ok(PositionFix { kind, latitude, longitude, validity })
}

fn status_char(fields: &[&str], index: usize) -> Option<char> {
    fields.get(index).and_then(|s| s.trim().chars().next())
}

/// Decode a ddmm.mmmm / dddmm.mmmm field plus its hemisphere into signed degrees.
fn coordinate(
    fields: &[&str],
    index: usize,
    degree_digits: usize,
    negative: char,
) -> Result<f64, DatagramError> {
    let raw = fields
        .get(index)
        .map(|s| s.trim())
        .ok_or(DatagramError::MissingField(index))?;
    let hemisphere = fields
        .get(index + 1)
        .map(|s| s.trim())
        .ok_or(DatagramError::MissingField(index + 1))?;

    let bad = || DatagramError::BadField { index, value: raw.to_string() };
    if raw.len() <= degree_digits || !raw.is_ascii() {
        return Err(bad());
    }

    let (deg, min) = raw.split_at(degree_digits);
    let deg: f64 = deg.parse().map_err(|_| bad())?;
    let min: f64 = min.parse().map_err(|_| bad())?;
    let value = deg + min / 60.0;

    if hemisphere.eq_ignore_ascii_case(&negative.to_string()) {
        Ok(-value)
    } else {
        Ok(value)
    }
}

fn verify_checksum(body: &str, checksum: &str) -> Result<(), DatagramError> {
    let expected = u8::from_str_radix(checksum, 16).map_err(|_| DatagramError::BadField {
        index: 0,
        value: checksum.to_string(),
    })?;
    let computed = body.bytes().fold(0u8, |acc, b| acc ^ b);
    if expected != computed {
        return Err(DatagramError::Checksum { expected, computed });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Append a correct checksum to a sentence body.
    fn with_checksum(body: &str) -> String {
        let cs = body.bytes().fold(0u8, |acc, b| acc ^ b);
        format!("${}*{:02X}", body, cs)
    }

    #[test]
    fn test_gga_fix() {
        let s = "$GPGGA,184353.07,1929.045,S,02410.506,E,1,04,2.6,100.00,M,-33.9,M,,0000*6D";
        let fix = parse_position(s).unwrap();
        assert_eq!(fix.kind, SentenceKind::Gga);
        assert!((fix.latitude - -19.484083).abs() < 1e-5);
        assert!((fix.longitude - 24.175100).abs() < 1e-5);
        assert_eq!(fix.validity, FixValidity::Quality(Some(1)));
        assert!(fix.validity.is_valid());
    }

    #[test]
    fn test_gga_quality_zero_is_not_valid() {
        let s = with_checksum("GPGGA,184353.07,4737.000,N,12220.000,W,0,00,,,M,,M,,");
        let fix = parse_position(&s).unwrap();
        assert_eq!(fix.validity, FixValidity::Quality(Some(0)));
        assert!(!fix.validity.is_valid());
        assert!((fix.latitude - 47.616667).abs() < 1e-5);
        assert!((fix.longitude - -122.333333).abs() < 1e-5);
    }

    #[test]
    fn test_rmc_status() {
        let active = with_checksum("GPRMC,225446,A,4916.45,N,12311.12,W,000.5,054.7,191194,020.3,E");
        let fix = parse_position(&active).unwrap();
        assert_eq!(fix.kind, SentenceKind::Rmc);
        assert!(fix.validity.is_valid());

        let void = with_checksum("GPRMC,225446,V,4916.45,N,12311.12,W,000.5,054.7,191194,020.3,E");
        assert!(!parse_position(&void).unwrap().validity.is_valid());
    }

    #[test]
    fn test_gll_without_status_is_not_valid() {
        let s = with_checksum("GPGLL,4916.45,N,12311.12,W,225444");
        let fix = parse_position(&s).unwrap();
        assert_eq!(fix.validity, FixValidity::Status(None));
        assert!(!fix.validity.is_valid());
    }

    #[test]
    fn test_wpl_is_unqualified() {
        let s = with_checksum("GPWPL,4917.16,N,12310.64,W,003");
        let fix = parse_position(&s).unwrap();
        assert_eq!(fix.validity, FixValidity::Unqualified);
        assert!(fix.validity.is_valid());
    }

    #[test]
    fn test_checksum_mismatch() {
        let s = "$GPGLL,4916.45,N,12311.12,W,225444,A*00";
        assert!(matches!(parse_position(s), Err(DatagramError::Checksum { .. })));
    }

    #[test]
    fn test_unparseable_payloads() {
        assert_eq!(parse_position(""), Err(DatagramError::Empty));
        assert!(matches!(
            parse_position("$OHPR,1,2,3,-999.0,15.5,0,0,0"),
            Err(DatagramError::Unsupported(_))
        ));
        assert!(matches!(
            parse_position("$GPGGA,184353.07,,,,,1,04"),
            Err(DatagramError::BadField { .. })
        ));
        assert!(parse_position("not a sentence at all").is_err());
    }
}
