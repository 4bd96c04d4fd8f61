pub mod geocode;
pub mod media;
pub mod metadata;
pub mod planner;
pub mod report;
pub mod scan;
pub mod transfer;

#[cfg(test)]
mod testutil;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use geocode::{GeocodeCache, GeocodeResolver, GeocoderOptions, ReverseGeocoder, CACHE_FILENAME};
use media::{MediaRecord, RecordStatus};
use metadata::decode::ImageDecoder;
use planner::DestinationPlanner;
use transfer::TransferMode;

/// How many planned operations a dry run prints.
pub const DRY_RUN_PREVIEW: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOptions {
    pub src: PathBuf,
    pub dst: PathBuf,
    /// `YYYY-MM` folders without the country part
    #[serde(default)]
    pub two_level: bool,
    #[serde(default)]
    pub mode: TransferMode,
    #[serde(default)]
    pub dry_run: bool,
    /// Write the CSV report and stop before transferring anything
    #[serde(default)]
    pub report_only: bool,
    #[serde(default)]
    pub report_file: Option<PathBuf>,
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
    /// Skip the HEIF decoder and read tags straight from the container
    #[serde(default)]
    pub no_heif: bool,
    #[serde(default)]
    pub geocoder: GeocoderOptions,
}

impl ProcessOptions {
    pub fn new(src: impl Into<PathBuf>, dst: impl Into<PathBuf>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            two_level: false,
            mode: TransferMode::default(),
            dry_run: false,
            report_only: false,
            report_file: None,
            cache_file: None,
            no_heif: false,
            geocoder: GeocoderOptions::default(),
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_file.clone().unwrap_or_else(|| self.dst.join(CACHE_FILENAME))
    }

    pub fn report_path(&self) -> PathBuf {
        self.report_file.clone().unwrap_or_else(|| self.dst.join(report::REPORT_FILENAME))
    }
}

#[derive(Debug, Default)]
pub struct ProcessResult {
    pub total: u64,
    pub planned: u64,
    pub errored: u64,
    pub transferred: u64,
    /// Source path and message of every failed copy/move
    pub transfer_errors: Vec<(PathBuf, String)>,
    pub external_calls: usize,
    /// Set when a report was written instead of transferring
    pub report: Option<PathBuf>,
    pub records: Vec<MediaRecord>,
}

impl ProcessResult {
    /// Records whose planning failed.
    pub fn errors(&self) -> impl Iterator<Item = &MediaRecord> {
        self.records.iter().filter(|r| r.status() == RecordStatus::Errored)
    }
}

/// Type alias for progress callback: `(stage, current, total, message)`.
/// `total` is 0 while it is not known yet.
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str) + Send + Sync;

/// Throttled progress reporter, emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback,
    last_emit: Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback) -> Self {
        Self {
            inner,
            last_emit: Mutex::new(Instant::now() - Duration::from_secs(1)),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = total > 0 && current + 1 >= total;
        if !is_done {
            let mut last = self.last_emit.lock().unwrap_or_else(|e| e.into_inner());
            if last.elapsed().as_millis() < 200 {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Run the full pipeline against the configured geocoding service.
///
/// Two-level runs never need a country, so no client is built for them.
pub fn process(options: &ProcessOptions, progress_callback: &ProgressCallback) -> anyhow::Result<ProcessResult> {
    let geocoder = if options.two_level {
        None
    } else {
        match options.geocoder.build() {
            Ok(g) => Some(g),
            Err(e) => {
                warn!("reverse geocoding unavailable, using the cache only: {}", e);
                None
            }
        }
    };
    process_with_geocoder(options, geocoder, progress_callback)
}

/// Run the full pipeline with an explicit geocoder (`None`: cache only).
pub fn process_with_geocoder(
    options: &ProcessOptions,
    geocoder: Option<Box<dyn ReverseGeocoder>>,
    progress_callback: &ProgressCallback,
) -> anyhow::Result<ProcessResult> {
    let tp = ThrottledProgress::new(progress_callback);

    fs::create_dir_all(&options.dst)
        .with_context(|| format!("cannot create destination {}", options.dst.display()))?;
    let src = options
        .src
        .canonicalize()
        .with_context(|| format!("cannot read source folder {}", options.src.display()))?;
    let dst = options.dst.canonicalize()?;

    let cache_path = options.cache_path();
    let cache = GeocodeCache::load(&cache_path);
    let mut resolver = GeocodeResolver::new(cache, geocoder).with_language(options.geocoder.language.clone());

    // Stage 1: discover. Only a destination strictly below the source is skipped;
    // an in-place run or a source inside the destination still scans everything.
    let exclude = (dst != src && dst.starts_with(&src)).then_some(dst.as_path());
    let files = scan::find_media(&src, exclude, &tp)?;
    if files.is_empty() {
        info!("No media files found under {}", src.display());
        return Ok(ProcessResult::default());
    }
    info!("Found {} media files", files.len());

    // Stage 2: extract, resolve, plan
    let decoder = metadata::decode::default_decoder(!options.no_heif);
    let mut planner = DestinationPlanner::new(&dst, options.two_level);
    let total = files.len() as u64;
    let mut records = Vec::with_capacity(files.len());
    for (i, path) in files.into_iter().enumerate() {
        let record = plan_record(path, decoder.as_deref(), &mut resolver, &mut planner, options.two_level);
        if let Some(e) = &record.error {
            debug!("{}: {}", record.source_path.display(), e);
        }
        records.push(record);
        tp.report("plan", i as u64, total, "Reading metadata");
    }

    let mut result = ProcessResult {
        total,
        planned: count(&records, RecordStatus::Planned),
        errored: count(&records, RecordStatus::Errored),
        external_calls: resolver.external_calls(),
        ..ProcessResult::default()
    };
    info!(
        "Planned operations: {} files ({} errored, {} geocoder calls)",
        result.planned, result.errored, result.external_calls
    );

    if options.report_only {
        let report_path = options.report_path();
        report::write_csv(&records, &report_path)
            .with_context(|| format!("cannot write report {}", report_path.display()))?;
        info!("Report written to {}", report_path.display());
        result.report = Some(report_path);
        result.records = records;
        return Ok(result);
    }

    if options.dry_run {
        for record in records.iter().take(DRY_RUN_PREVIEW) {
            log_preview(record);
        }
        info!("Dry run: no files copied/moved.");
        result.records = records;
        return Ok(result);
    }

    // Stage 3: transfer
    let transfer = transfer::execute(&records, options.mode, &tp);
    for (path, e) in &transfer.errors {
        debug!("transfer failed for {}: {}", path.display(), e);
    }
    resolver.cache().save(&cache_path);

    result.transferred = transfer.transferred;
    result.transfer_errors = transfer.errors;
    result.records = records;
    Ok(result)
}

/// Build one record. Failures end up in `record.error`, never as an `Err`.
fn plan_record(
    path: PathBuf,
    decoder: Option<&dyn ImageDecoder>,
    resolver: &mut GeocodeResolver,
    planner: &mut DestinationPlanner,
    two_level: bool,
) -> MediaRecord {
    let extracted = metadata::extract(&path, decoder);
    let mut record = MediaRecord::new(path, extracted.captured_at);
    record.coordinate = extracted.coordinate;

    if !two_level {
        record.resolved_label = match &record.coordinate {
            Some(coord) => planner::country_label(&resolver.resolve(coord)),
            None => planner::NO_LOCATION.to_string(),
        };
    }

    match planner.plan(&record) {
        Ok(dest) => record.destination = Some(dest),
        Err(e) => record.error = Some(e.to_string()),
    }
    record
}

fn count(records: &[MediaRecord], status: RecordStatus) -> u64 {
    records.iter().filter(|r| r.status() == status).count() as u64
}

fn log_preview(record: &MediaRecord) {
    let target = record.destination.as_deref().unwrap_or(Path::new(""));
    match &record.error {
        Some(e) => info!("{} -> (error: {})", record.source_path.display(), e),
        None => info!("{} -> {}", record.source_path.display(), target.display()),
    }
}
