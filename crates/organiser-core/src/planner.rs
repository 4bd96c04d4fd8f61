use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::Datelike;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::geocode::UNKNOWN;
use crate::media::MediaRecord;

/// Folder label for records without GPS data
pub const NO_LOCATION: &str = "NoLocation";

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\p{L}\p{N} _-]").unwrap());

/// Strip everything but letters, digits, space, `-` and `_`, then trim.
pub fn sanitize_label(label: &str) -> String {
    let normalized: String = label.nfc().collect();
    UNSAFE_CHARS.replace_all(&normalized, "").trim().to_string()
}

/// Folder label for a resolved country; [`UNKNOWN`] if nothing survives sanitising.
pub fn country_label(label: &str) -> String {
    let label = sanitize_label(label);
    if label.is_empty() {
        UNKNOWN.to_string()
    } else {
        label
    }
}

/// The parts of a record that decide its destination folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationKey {
    pub year: i32,
    pub month: u32,
    pub country: Option<String>,
}

impl DestinationKey {
    /// `country` is ignored in two-level mode; otherwise a missing label means
    /// no coordinate was available.
    pub fn for_record(record: &MediaRecord, two_level: bool) -> Self {
        let country = if two_level {
            None
        } else if record.coordinate.is_none() {
            Some(NO_LOCATION.to_string())
        } else {
            Some(country_label(&record.resolved_label))
        };
        Self {
            year: record.captured_at.year(),
            month: record.captured_at.month(),
            country,
        }
    }

    pub fn folder_name(&self) -> String {
        match &self.country {
            Some(country) => format!("{:04}-{:02}-{}", self.year, self.month, country),
            None => format!("{:04}-{:02}", self.year, self.month),
        }
    }
}

/// Assigns each record a unique path below the destination root.
///
/// Paths handed out earlier in the same run count as taken even though
/// nothing has been written there yet.
pub struct DestinationPlanner {
    root: PathBuf,
    two_level: bool,
    claimed: HashSet<PathBuf>,
    created_dirs: HashSet<PathBuf>,
}

impl DestinationPlanner {
    pub fn new(root: impl Into<PathBuf>, two_level: bool) -> Self {
        Self {
            root: root.into(),
            two_level,
            claimed: HashSet::new(),
            created_dirs: HashSet::new(),
        }
    }

    /// Pick the destination for `record`, creating its folder if needed.
    pub fn plan(&mut self, record: &MediaRecord) -> io::Result<PathBuf> {
        let key = DestinationKey::for_record(record, self.two_level);
        let sub_dir = self.root.join(key.folder_name());

        // Create directory only once per unique path
        if !self.created_dirs.contains(&sub_dir) {
            fs::create_dir_all(&sub_dir)?;
            self.created_dirs.insert(sub_dir.clone());
        }

        let filename = record.file_name();
        if filename.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", record.source_path.display()),
            ));
        }

        let base_dest = sub_dir.join(filename);
        let dest = if self.is_free(&base_dest) {
            base_dest
        } else {
            let path = Path::new(filename);
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
            let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");

            let mut counter = 1u32;
            loop {
                let new_name = if ext.is_empty() {
                    format!("{}-{}", stem, counter)
                } else {
                    format!("{}-{}.{}", stem, counter, ext)
                };
                let candidate = sub_dir.join(&new_name);
                if self.is_free(&candidate) {
                    break candidate;
                }
                counter += 1;
            }
        };

        self.claimed.insert(dest.clone());
        Ok(dest)
    }

    fn is_free(&self, path: &Path) -> bool {
        !self.claimed.contains(path) && !path.exists()
    }
}
