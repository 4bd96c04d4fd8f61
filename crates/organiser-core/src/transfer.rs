use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::media::MediaRecord;
use crate::ThrottledProgress;

/// How planned files reach their destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Copy,
    Move,
}

/// Result of the transfer phase.
#[derive(Debug, Default)]
pub struct TransferResult {
    pub transferred: u64,
    /// Source path and error message of every failed transfer
    pub errors: Vec<(PathBuf, String)>,
}

/// Copy or move every planned record to its destination.
/// Failures are collected; they never stop the remaining transfers.
pub fn execute(records: &[MediaRecord], mode: TransferMode, progress: &ThrottledProgress) -> TransferResult {
    let work: Vec<(&Path, &Path)> = records
        .iter()
        .filter_map(|r| Some((r.source_path.as_path(), r.destination.as_deref()?)))
        .collect();
    let total = work.len() as u64;
    let message = match mode {
        TransferMode::Copy => "Copying files",
        TransferMode::Move => "Moving files",
    };

    let mut result = TransferResult::default();
    for (i, (src, dest)) in work.into_iter().enumerate() {
        match transfer_one(src, dest, mode) {
            Ok(()) => result.transferred += 1,
            Err(e) => result.errors.push((src.to_path_buf(), e.to_string())),
        }
        progress.report("transfer", i as u64, total, message);
    }
    result
}

fn transfer_one(src: &Path, dest: &Path, mode: TransferMode) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    match mode {
        TransferMode::Copy => copy_preserving_times(src, dest),
        TransferMode::Move => match fs::rename(src, dest) {
            Ok(()) => Ok(()),
            Err(e) => {
                // rename cannot cross filesystems
                debug!("rename {} failed ({}), copying instead", src.display(), e);
                copy_preserving_times(src, dest)?;
                fs::remove_file(src)
            }
        },
    }
}

fn copy_preserving_times(src: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(src, dest)?;
    let meta = fs::metadata(src)?;
    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_last_modification_time(&meta);
    filetime::set_file_times(dest, atime, mtime)
}
