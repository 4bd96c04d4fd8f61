use std::path::Path;

use serde::Serialize;

use crate::media::MediaRecord;

/// Default report filename inside the destination root
pub const REPORT_FILENAME: &str = "report.csv";

/// One CSV row. Errored records keep only `src` and `error`.
#[derive(Serialize)]
struct ReportRow<'a> {
    src: String,
    date: String,
    lat: String,
    lon: String,
    country: &'a str,
    target: String,
    error: &'a str,
}

impl<'a> From<&'a MediaRecord> for ReportRow<'a> {
    fn from(r: &'a MediaRecord) -> Self {
        let src = r.source_path.to_string_lossy().into_owned();
        if let Some(error) = &r.error {
            return Self {
                src,
                date: String::new(),
                lat: String::new(),
                lon: String::new(),
                country: "",
                target: String::new(),
                error,
            };
        }
        Self {
            src,
            date: r.captured_at.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            lat: r.coordinate.map(|c| c.lat().to_string()).unwrap_or_default(),
            lon: r.coordinate.map(|c| c.lon().to_string()).unwrap_or_default(),
            country: &r.resolved_label,
            target: r
                .destination
                .as_deref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            error: "",
        }
    }
}

/// Write one row per record to `path`, in plan order.
pub fn write_csv(records: &[MediaRecord], path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(ReportRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}
