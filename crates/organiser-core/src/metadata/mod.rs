pub mod decode;
pub mod exif;
pub mod quiet;

use std::fs::{self, File};
use std::io::{BufReader, Cursor};
use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime};
use log::debug;

use crate::media::{Coordinate, MediaKind};
use decode::{DecodedImage, ImageDecoder};

/// What the extractor could learn about one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub captured_at: NaiveDateTime,
    pub coordinate: Option<Coordinate>,
}

/// A way of getting tags out of an already decoded image.
type DecodedStrategy = fn(&DecodedImage) -> Option<::exif::Exif>;

/// Tried in order after a successful decode; first hit wins.
const DECODED_STRATEGIES: &[(&str, DecodedStrategy)] = &[
    ("embedded exif", from_embedded_blob),
    ("re-encoded jpeg", from_reencoded_jpeg),
];

/// Capture time and GPS position of `path`. Never fails.
pub fn extract(path: &Path, decoder: Option<&dyn ImageDecoder>) -> Extracted {
    let kind = MediaKind::from_path(path);
    let tags = read_tags(path, kind, decoder);

    let captured_at = tags
        .as_ref()
        .and_then(exif::capture_time)
        .unwrap_or_else(|| fallback_time(path));
    let coordinate = tags.as_ref().and_then(exif::gps_coordinate);

    Extracted { captured_at, coordinate }
}

fn read_tags(path: &Path, kind: MediaKind, decoder: Option<&dyn ImageDecoder>) -> Option<::exif::Exif> {
    if kind == MediaKind::Video {
        // No EXIF container to read; the capture time comes from the file
        return None;
    }
    if kind.needs_decode() {
        if let Some(decoder) = decoder {
            match quiet::suppress_stderr(|| decoder.decode(path)) {
                Ok(decoded) => {
                    for (name, strategy) in DECODED_STRATEGIES {
                        if let Some(tags) = strategy(&decoded) {
                            debug!("tags for {} from {}", path.display(), name);
                            return Some(tags);
                        }
                    }
                    debug!("decoded {} but found no tags, scanning raw bytes", path.display());
                }
                Err(e) => {
                    debug!("decode failed for {}: {}; scanning raw bytes", path.display(), e);
                }
            }
        }
    }
    from_raw_bytes(path)
}

fn from_embedded_blob(decoded: &DecodedImage) -> Option<::exif::Exif> {
    exif::read_blob(decoded.exif.as_deref()?)
}

fn from_reencoded_jpeg(decoded: &DecodedImage) -> Option<::exif::Exif> {
    let bytes = decode::reencode_jpeg(&decoded.image).ok()?;
    exif::read_container(&mut Cursor::new(bytes))
}

fn from_raw_bytes(path: &Path) -> Option<::exif::Exif> {
    let file = File::open(path).ok()?;
    exif::read_container(&mut BufReader::new(file))
}

/// File modification time as local time, or now if even that is unavailable.
pub fn fallback_time(path: &Path) -> NaiveDateTime {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(mtime) => DateTime::<Local>::from(mtime).naive_local(),
        Err(_) => Local::now().naive_local(),
    }
}
