use std::path::{Path, PathBuf};

use anyhow::Context;
use log::debug;
use walkdir::WalkDir;

use crate::ThrottledProgress;

/// Extensions (lowercase) that are picked up by the scan.
pub const MEDIA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "heic", "heif", "mp4", "mov"];

/// Check if a path has one of the [`MEDIA_EXTENSIONS`], ignoring case
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MEDIA_EXTENSIONS.iter().any(|m| e.eq_ignore_ascii_case(m)))
        .unwrap_or(false)
}

/// Recursively collect media files under `src`, in walk order, leaving out
/// anything below `exclude` (the destination, when it sits inside `src`).
///
/// An unreadable `src` is an error; unreadable entries below it are skipped.
pub fn find_media(src: &Path, exclude: Option<&Path>, progress: &ThrottledProgress) -> anyhow::Result<Vec<PathBuf>> {
    let root_meta = std::fs::metadata(src).with_context(|| format!("cannot read source folder {}", src.display()))?;
    if !root_meta.is_dir() {
        anyhow::bail!("source {} is not a folder", src.display());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(src)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || exclude.map_or(true, |ex| !e.path().starts_with(ex)));
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => {
                return Err(e).with_context(|| format!("cannot scan {}", src.display()));
            }
            Err(e) => {
                debug!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if is_media_file(entry.path()) {
            files.push(entry.into_path());
            let found = files.len() as u64;
            progress.report("scan", found, 0, "Scanning files");
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn quiet() -> impl Fn(&str, u64, u64, &str) + Send + Sync {
        |_, _, _, _| {}
    }

    #[test]
    fn test_is_media_file() {
        assert!(is_media_file(Path::new("a.jpg")));
        assert!(is_media_file(Path::new("a.JPEG")));
        assert!(is_media_file(Path::new("dir/b.HeIc")));
        assert!(is_media_file(Path::new("c.mov")));
        assert!(!is_media_file(Path::new("notes.txt")));
        assert!(!is_media_file(Path::new("jpg")));
        assert!(!is_media_file(Path::new("archive.zip")));
    }

    #[test]
    fn test_find_media_recursive() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("2019").join("holiday");
        fs::create_dir_all(&nested).unwrap();
        File::create(dir.path().join("top.JPG")).unwrap();
        File::create(nested.join("deep.heic")).unwrap();
        File::create(nested.join("clip.mp4")).unwrap();
        File::create(nested.join("readme.txt")).unwrap();
        // A directory with a media-looking name is not a file
        fs::create_dir_all(dir.path().join("fake.jpg")).unwrap();

        let cb = quiet();
        let tp = ThrottledProgress::new(&cb);
        let mut found = find_media(dir.path(), None, &tp).unwrap();
        found.sort();
        let names: Vec<_> = found.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, ["clip.mp4", "deep.heic", "top.JPG"]);
    }

    #[test]
    fn test_find_media_skips_excluded_destination() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("organized").join("2020-01-NoLocation");
        fs::create_dir_all(&out).unwrap();
        File::create(dir.path().join("new.jpg")).unwrap();
        File::create(out.join("old.jpg")).unwrap();

        let cb = quiet();
        let tp = ThrottledProgress::new(&cb);
        let found = find_media(dir.path(), Some(dir.path().join("organized").as_path()), &tp).unwrap();
        assert_eq!(found, [dir.path().join("new.jpg")]);
    }

    #[test]
    fn test_find_media_missing_root() {
        let cb = quiet();
        let tp = ThrottledProgress::new(&cb);
        assert!(find_media(Path::new("/nonexistent/photos"), None, &tp).is_err());
    }

    #[test]
    fn test_find_media_root_is_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.jpg");
        File::create(&file).unwrap();
        let cb = quiet();
        let tp = ThrottledProgress::new(&cb);
        assert!(find_media(&file, None, &tp).is_err());
    }
}
