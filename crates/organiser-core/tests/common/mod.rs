#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use organiser_core::geocode::{Address, GeocodeError, LocationResult, ReverseGeocoder};
use organiser_core::media::Coordinate;

fn ascii(tag: Tag, s: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![s.as_bytes().to_vec()]),
    }
}

fn degrees(tag: Tag, value: f64) -> Field {
    // Whole degrees and minutes, seconds to 1/100
    let value = value.abs();
    let deg = value.trunc();
    let min = ((value - deg) * 60.0).trunc();
    let sec = ((value - deg) * 60.0 - min) * 60.0;
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Rational(vec![
            Rational { num: deg as u32, denom: 1 },
            Rational { num: min as u32, denom: 1 },
            Rational { num: (sec * 100.0).round() as u32, denom: 100 },
        ]),
    }
}

/// Minimal JPEG (SOI, APP1 Exif, EOI) with an optional capture time and position.
pub fn jpeg(taken: Option<&str>, position: Option<(f64, f64)>) -> Vec<u8> {
    let mut fields = Vec::new();
    if let Some(taken) = taken {
        fields.push(ascii(Tag::DateTimeOriginal, taken));
    }
    if let Some((lat, lon)) = position {
        fields.push(degrees(Tag::GPSLatitude, lat));
        fields.push(ascii(Tag::GPSLatitudeRef, if lat < 0.0 { "S" } else { "N" }));
        fields.push(degrees(Tag::GPSLongitude, lon));
        fields.push(ascii(Tag::GPSLongitudeRef, if lon < 0.0 { "W" } else { "E" }));
    }

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, true).unwrap();
    let tiff = tiff.into_inner();

    let len = u16::try_from(2 + 6 + tiff.len()).unwrap();
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// Write `bytes` to `dir/name`, creating parent folders.
pub fn put(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, bytes).unwrap();
    path
}

pub fn quiet(_: &str, _: u64, _: u64, _: &str) {}

/// Offline geocoder: a country per hemisphere pair, or nothing at all.
pub struct FakeGeocoder {
    pub known: bool,
    pub calls: Rc<RefCell<Vec<Coordinate>>>,
}

impl FakeGeocoder {
    pub fn boxed(known: bool) -> (Box<dyn ReverseGeocoder>, Rc<RefCell<Vec<Coordinate>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let geocoder = FakeGeocoder {
            known,
            calls: calls.clone(),
        };
        (Box::new(geocoder), calls)
    }
}

impl ReverseGeocoder for FakeGeocoder {
    fn reverse(
        &self,
        coord: &Coordinate,
        _language: &str,
        _exactly_one: bool,
    ) -> Result<Option<LocationResult>, GeocodeError> {
        self.calls.borrow_mut().push(*coord);
        if !self.known {
            return Ok(None);
        }
        let country = match (coord.lat() >= 0.0, coord.lon() >= 0.0) {
            (true, true) => "France",
            (true, false) => "United States",
            (false, true) => "Australia",
            (false, false) => "Chile",
        };
        Ok(Some(LocationResult {
            address: Some(Address {
                country: Some(country.to_string()),
                ..Address::default()
            }),
            ..LocationResult::default()
        }))
    }
}
