//! Alert export - JSON lines, one file per day

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::detection::Alert;

struct OpenFile {
    date: NaiveDate,
    writer: BufWriter<File>,
}

/// Appends forwarded alerts to `<dir>/alerts-<date>.jsonl`
pub struct AlertExporter {
    path: PathBuf,
    current: Mutex<Option<OpenFile>>,
    exported: Mutex<u64>,
}

impl AlertExporter {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Create directory if it doesn't exist
        std::fs::create_dir_all(&path)?;

        Ok(Self {
            path,
            current: Mutex::new(None),
            exported: Mutex::new(0),
        })
    }

    /// Write one alert, rolling over to a new file when the day changes
    pub fn export_alert(&self, alert: &Alert) -> Result<()> {
        let today = Utc::now().date_naive();
        let mut current = self.current.lock();

        let stale = current.as_ref().map_or(true, |open| open.date != today);
        if stale {
            let filename = self.filename_for(today);
            let file = OpenOptions::new().create(true).append(true).open(&filename)?;
            info!("Exporting alerts to {:?}", filename);
            *current = Some(OpenFile {
                date: today,
                writer: BufWriter::new(file),
            });
        }

        if let Some(open) = current.as_mut() {
            let json = serde_json::to_string(alert)?;
            writeln!(open.writer, "{}", json)?;
            open.writer.flush()?;
        }

        *self.exported.lock() += 1;
        Ok(())
    }

    pub fn filename_for(&self, date: NaiveDate) -> PathBuf {
        self.path.join(format!("alerts-{}.jsonl", date.format("%Y-%m-%d")))
    }

    pub fn exported_count(&self) -> u64 {
        *self.exported.lock()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ViolationCategory;

    #[test]
    fn test_alerts_written_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = AlertExporter::new(dir.path().join("out")).unwrap();

        let first = Alert::new(ViolationCategory::PhoneUsage, Utc::now(), 1);
        let second = Alert::new(ViolationCategory::NoPerson, Utc::now(), 1);
        exporter.export_alert(&first).unwrap();
        exporter.export_alert(&second).unwrap();

        let file = exporter.filename_for(Utc::now().date_naive());
        let content = std::fs::read_to_string(file).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["type"], "phone_usage");
        assert_eq!(parsed["count"], 1);
        assert_eq!(exporter.exported_count(), 2);
    }

    #[test]
    fn test_reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let alert = Alert::new(ViolationCategory::FaceAway, Utc::now(), 3);

        AlertExporter::new(dir.path()).unwrap().export_alert(&alert).unwrap();
        let exporter = AlertExporter::new(dir.path()).unwrap();
        exporter.export_alert(&alert).unwrap();

        let path = exporter.filename_for(Utc::now().date_naive());
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
