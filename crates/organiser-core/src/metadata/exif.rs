use std::io::{BufRead, Seek};

use chrono::NaiveDateTime;
use exif::{Exif, In, Reader, Tag, Value};

use crate::media::Coordinate;

/// Capture-time tags in priority order.
const DATE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

const EXIF_ID: &[u8] = b"Exif\0\0";

/// Read tags from any container kamadak-exif understands (JPEG, TIFF, HEIF, PNG, WebP).
pub fn read_container<R: BufRead + Seek>(reader: &mut R) -> Option<Exif> {
    Reader::new().read_from_container(reader).ok()
}

/// Read tags from a bare EXIF payload, such as the metadata item of a HEIF file.
///
/// Accepts a plain TIFF stream, one prefixed with `Exif\0\0`, or the HEIF layout
/// where a 4-byte big-endian offset precedes the TIFF header.
pub fn read_blob(blob: &[u8]) -> Option<Exif> {
    let tiff = strip_exif_prefix(blob)?;
    Reader::new().read_raw(tiff.to_vec()).ok()
}

fn is_tiff(bytes: &[u8]) -> bool {
    bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*")
}

fn strip_exif_prefix(blob: &[u8]) -> Option<&[u8]> {
    if is_tiff(blob) {
        return Some(blob);
    }
    if let Some(rest) = blob.strip_prefix(EXIF_ID) {
        return Some(rest);
    }
    let offset = u32::from_be_bytes(blob.get(..4)?.try_into().ok()?) as usize;
    let rest = blob.get(4usize.checked_add(offset)?..)?;
    if is_tiff(rest) {
        Some(rest)
    } else {
        rest.strip_prefix(EXIF_ID)
    }
}

/// First capture-time tag that parses as `YYYY:MM:DD HH:MM:SS`.
pub fn capture_time(exif: &Exif) -> Option<NaiveDateTime> {
    DATE_TAGS.iter().find_map(|tag| {
        let field = exif.get_field(*tag, In::PRIMARY)?;
        parse_exif_datetime(&ascii_value(&field.value)?)
    })
}

fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S").ok()
}

fn ascii_value(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => {
            let raw = parts.first()?;
            let s = String::from_utf8_lossy(raw);
            Some(s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string())
        }
        _ => None,
    }
}

/// GPS position, if both latitude and longitude are present and convertible.
pub fn gps_coordinate(exif: &Exif) -> Option<Coordinate> {
    let lat = exif.get_field(Tag::GPSLatitude, In::PRIMARY)?;
    let lon = exif.get_field(Tag::GPSLongitude, In::PRIMARY)?;
    let lat_ref = reference(exif, Tag::GPSLatitudeRef).unwrap_or_else(|| "N".to_string());
    let lon_ref = reference(exif, Tag::GPSLongitudeRef).unwrap_or_else(|| "E".to_string());

    let lat = dms_to_decimal(&lat.value, &lat_ref)?;
    let lon = dms_to_decimal(&lon.value, &lon_ref)?;
    Coordinate::new(lat, lon)
}

fn reference(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    ascii_value(&field.value).filter(|s| !s.is_empty())
}

/// Degrees/minutes/seconds rationals to signed decimal degrees.
fn dms_to_decimal(value: &Value, reference: &str) -> Option<f64> {
    let Value::Rational(parts) = value else {
        return None;
    };
    if parts.len() < 3 || parts[..3].iter().any(|r| r.denom == 0) {
        return None;
    }
    let degrees = parts[0].to_f64();
    let minutes = parts[1].to_f64();
    let seconds = parts[2].to_f64();
    let dec = degrees + minutes / 60.0 + seconds / 3600.0;
    if reference == "S" || reference == "W" {
        Some(-dec)
    } else {
        Some(dec)
    }
}
