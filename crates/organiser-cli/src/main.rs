use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use organiser_core::geocode::GeocoderOptions;
use organiser_core::transfer::TransferMode;

/// How many failed files are listed at the end of a run.
const SAMPLE_ERRORS: usize = 10;

#[derive(Parser)]
#[command(
    name = "photo-organiser",
    version,
    about = "Sort photos and videos into Year-Month-Country folders using EXIF dates and GPS"
)]
struct Cli {
    /// Source folder, scanned recursively
    #[arg(short, long, default_value = ".")]
    src: PathBuf,

    /// Destination root
    #[arg(short, long, default_value = "./organized")]
    dst: PathBuf,

    /// Only YYYY-MM folders, without the country part
    #[arg(long)]
    two_level: bool,

    /// Write a CSV report of the planned layout and stop
    #[arg(long)]
    report_only: bool,

    /// Report path (default: <dst>/report.csv)
    #[arg(long)]
    report_file: Option<PathBuf>,

    /// Read HEIC/HEIF tags from the container without decoding
    #[arg(long)]
    no_heif: bool,

    /// Move files instead of copying them
    #[arg(long = "move")]
    move_files: bool,

    /// Print the planned operations without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Geocode cache path (default: <dst>/.geocode_cache.json)
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Reverse-geocoding endpoint (Nominatim compatible)
    #[arg(long)]
    geocoder_url: Option<String>,

    /// User-Agent sent to the geocoding service
    #[arg(long)]
    user_agent: Option<String>,

    /// Preferred language of country names
    #[arg(long, default_value = "en")]
    language: String,

    /// Minimum seconds between geocoding requests
    #[arg(long, default_value_t = 1.0)]
    min_delay: f64,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> organiser_core::ProcessOptions {
        let mut geocoder = GeocoderOptions::default();
        if let Some(url) = &self.geocoder_url {
            geocoder.endpoint = url.clone();
        }
        if let Some(agent) = &self.user_agent {
            geocoder.user_agent = agent.clone();
        }
        geocoder.language = self.language.clone();
        geocoder.min_delay_secs = self.min_delay;

        let mut options = organiser_core::ProcessOptions::new(&self.src, &self.dst);
        options.two_level = self.two_level;
        options.mode = if self.move_files { TransferMode::Move } else { TransferMode::Copy };
        options.dry_run = self.dry_run;
        options.report_only = self.report_only;
        options.report_file = self.report_file.clone();
        options.cache_file = self.cache_file.clone();
        options.no_heif = self.no_heif;
        options.geocoder = geocoder;
        options
    }
}

/// env_logger output, printed with the progress bar hidden so lines do not
/// tear through it.
struct BarLogger {
    inner: env_logger::Logger,
    bar: ProgressBar,
}

impl log::Log for BarLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.inner.matches(record) {
            self.bar.suspend(|| self.inner.log(record));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

impl BarLogger {
    fn new(level: log::LevelFilter, bar: ProgressBar) -> Self {
        let inner = env_logger::Builder::from_default_env().filter_level(level).build();
        Self { inner, bar }
    }
}

fn init_logging(verbose: bool, bar: ProgressBar) -> anyhow::Result<()> {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    let logger = BarLogger::new(level, bar);
    log::set_max_level(logger.inner.filter());
    log::set_boxed_logger(Box::new(logger))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let pb = ProgressBar::new(0);
    pb.set_style(ProgressStyle::default_bar().template("{spinner} [{bar:40}] {pos}/{len} {msg}")?);
    init_logging(cli.verbose, pb.clone())?;
    let t_total = std::time::Instant::now();
    let options = cli.options();

    let bar = pb.clone();
    let result = organiser_core::process(&options, &move |stage, current, total, message| {
        if total == 0 {
            // Still counting
            bar.set_position(current);
        } else {
            bar.set_length(total);
            bar.set_position(current + 1);
        }
        bar.set_message(format!("[{}] {}", stage, message));
    });
    pb.finish_and_clear();
    let result = result?;

    if result.total == 0 {
        return Ok(());
    }

    info!(
        "Done! {} media files, {} planned, {} errored, {} transferred ({:.2}s)",
        result.total,
        result.planned,
        result.errored,
        result.transferred,
        t_total.elapsed().as_secs_f64()
    );

    if result.errored > 0 {
        warn!("{} files could not be planned, first {}:", result.errored, SAMPLE_ERRORS.min(result.errored as usize));
    }
    for record in result.errors().take(SAMPLE_ERRORS) {
        if let Some(e) = &record.error {
            warn!("  {}: {}", record.source_path.display(), e);
        }
    }
    if !result.transfer_errors.is_empty() {
        warn!("{} transfers failed", result.transfer_errors.len());
    }
    for (path, e) in result.transfer_errors.iter().take(SAMPLE_ERRORS) {
        warn!("  {}: {}", path.display(), e);
    }

    Ok(())
}
