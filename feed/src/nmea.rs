//! NMEA GGA sentences from a GNSS module.

use crate::E7Coordinate;

/// Why a sentence did not yield a position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GgaError {
    /// Some other sentence type.
    #[error("not a GGA sentence")]
    NotGga,
    /// The receiver has no GPS or DGPS fix.
    #[error("no fix (quality {0:?})")]
    NoFix(String),
    /// A required field is absent.
    #[error("missing {0}")]
    MissingField(&'static str),
    /// A field does not parse.
    #[error("invalid {0}")]
    Invalid(&'static str),
}

/// Extracts the position from a `$xxGGA` sentence.
///
/// Only fix qualities 1 (GPS) and 2 (DGPS) count. The checksum is not
/// verified.
///
/// # Errors
///
/// See [`GgaError`].
pub fn parse_gga(sentence: &str) -> Result<E7Coordinate, GgaError> {
    let fields: Vec<&str> = sentence.trim_end().split([',', '*']).collect();
    let field = |index: usize, name: &'static str| {
        fields
            .get(index)
            .copied()
            .filter(|f| !f.is_empty())
            .ok_or(GgaError::MissingField(name))
    };

    let id = fields.first().copied().unwrap_or_default();
    if !(id.len() == 6 && id.starts_with('$') && id.ends_with("GGA")) {
        return Err(GgaError::NotGga);
    }

    let quality = fields.get(6).copied().unwrap_or_default();
    if quality != "1" && quality != "2" {
        return Err(GgaError::NoFix(quality.to_owned()));
    }

    let latitude = degrees_e7(field(2, "latitude")?, 2).ok_or(GgaError::Invalid("latitude"))?;
    let longitude = degrees_e7(field(4, "longitude")?, 3).ok_or(GgaError::Invalid("longitude"))?;
    let latitude = match field(3, "latitude hemisphere")? {
        "N" => latitude,
        "S" => -latitude,
        _ => return Err(GgaError::Invalid("latitude hemisphere")),
    };
    let longitude = match field(5, "longitude hemisphere")? {
        "E" => longitude,
        "W" => -longitude,
        _ => return Err(GgaError::Invalid("longitude hemisphere")),
    };

    Ok(E7Coordinate::new(latitude, longitude))
}

/// `ddmm.mmmm` (or `dddmm.mmmm`) to degrees × 10^7, rounded to nearest.
fn degrees_e7(text: &str, degree_digits: usize) -> Option<i32> {
    if text.len() < degree_digits + 2 || !text.is_char_boundary(degree_digits) {
        return None;
    }
    let (degrees, minutes) = text.split_at(degree_digits);
    let (whole, fraction) = minutes.split_once('.').unwrap_or((minutes, ""));
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !digits(degrees) || whole.is_empty() || !digits(whole) || !digits(fraction) || fraction.len() > 9 {
        return None;
    }

    let degrees: i64 = degrees.parse().ok()?;
    let scale = 10_i64.pow(u32::try_from(fraction.len()).ok()?);
    let minutes_scaled: i64 = format!("{whole}{fraction}").parse().ok()?;
    let minutes_e7 = (minutes_scaled * 10_000_000 + 30 * scale) / (60 * scale);
    i32::try_from(degrees * 10_000_000 + minutes_e7).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LVIV: &str = "$GNGGA,092750.000,4949.08097,N,02401.35372,E,1,08,1.03,290.0,M,35.5,M,,*6A\r\n";

    #[test]
    fn parses_a_fixed_position() {
        assert_eq!(parse_gga(LVIV), Ok(E7Coordinate::new(498_180_162, 240_225_620)));
    }

    #[test]
    fn hemispheres_set_the_sign() {
        let sentence = "$GPGGA,000000,3352.1280,S,15112.5600,W,2,05,1.0,10.0,M,,M,,*00";
        let position = parse_gga(sentence).unwrap();
        // 33° 52.128' = 33.8688°, 151° 12.56' = 151.209333°
        assert_eq!(position, E7Coordinate::new(-338_688_000, -1_512_093_333));
    }

    #[test]
    fn other_sentences_and_missing_fixes_are_refused() {
        assert_eq!(
            parse_gga("$GNRMC,092750.000,A,4949.08097,N,02401.35372,E,0.0,0.0,010125,,,A*00"),
            Err(GgaError::NotGga)
        );
        assert_eq!(
            parse_gga("$GNGGA,092750.000,,,,,0,00,99.99,,,,,,*56"),
            Err(GgaError::NoFix("0".into()))
        );
    }

    #[test]
    fn malformed_fields_are_reported() {
        assert_eq!(
            parse_gga("$GNGGA,092750.000,,N,02401.35372,E,1,08,1.03,290.0,M,35.5,M,,*6A"),
            Err(GgaError::MissingField("latitude"))
        );
        assert_eq!(
            parse_gga("$GNGGA,092750.000,49x9.08097,N,02401.35372,E,1,08,1.03,290.0,M,35.5,M,,*6A"),
            Err(GgaError::Invalid("latitude"))
        );
        assert_eq!(
            parse_gga("$GNGGA,092750.000,4949.08097,Q,02401.35372,E,1,08,1.03,290.0,M,35.5,M,,*6A"),
            Err(GgaError::Invalid("latitude hemisphere"))
        );
    }
}
