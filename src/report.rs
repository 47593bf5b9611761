//! Human-readable output for a run: discovery preview, final report, CSV manifest and JSON
//! summary.

use crate::discover::ImageRecord;
use crate::naming::RunPrefix;
use crate::retrieve::RetrievalResult;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;

const MANIFEST_HEADER: [&str; 8] = [
    "index",
    "file_name",
    "canonical_url",
    "source_url",
    "status",
    "bytes",
    "sha256",
    "error",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub file_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub prefix: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_bytes: u64,
    pub failures: Vec<FailedItem>,
}

/// Builds the report for `results`. Byte totals only count successful items.
pub fn summarize(results: &[RetrievalResult], prefix: &RunPrefix) -> RunReport {
    let succeeded = results.iter().filter(|r| r.success).count();
    let total_bytes = results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| r.byte_size)
        .sum();
    let failures = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| FailedItem {
            file_name: r.record.file_name.clone(),
            reason: r
                .error_message
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        })
        .collect();

    RunReport {
        prefix: prefix.as_str().to_string(),
        total: results.len(),
        succeeded,
        failed: results.len() - succeeded,
        total_bytes,
        failures,
    }
}

pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Done.")?;
        writeln!(f, "File prefix: \"{}_\"", self.prefix)?;
        writeln!(f, "Succeeded: {}/{}", self.succeeded, self.total)?;
        writeln!(f, "Failed: {}/{}", self.failed, self.total)?;
        if self.total_bytes > 0 {
            writeln!(f, "Total size: {}", format_megabytes(self.total_bytes))?;
        }

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "Failed files:")?;
            for item in &self.failures {
                writeln!(f, "  - {}: {}", item.file_name, item.reason)?;
            }
        }

        if self.succeeded > 0 {
            writeln!(f)?;
            writeln!(
                f,
                "Images were saved with the file prefix \"{}_\".",
                self.prefix
            )?;
            writeln!(
                f,
                "Files sharing that prefix can be moved into their own folder."
            )?;
        }
        Ok(())
    }
}

/// Numbered listing of discovered images, shown before a full download.
pub fn render_preview<W: Write>(records: &[ImageRecord], out: &mut W) -> std::io::Result<()> {
    writeln!(out, "Found {} images:", records.len())?;
    writeln!(out, "{}", "=".repeat(60))?;
    for record in records {
        writeln!(out, "{}. {}", record.index, record.file_name)?;
        writeln!(out, "   Alt: {}", record.alt_text)?;
        writeln!(out, "   Size: {}x{}", record.width, record.height)?;
        writeln!(out, "   URL: {}", record.canonical_url)?;
        if record.was_optimized() {
            writeln!(out, "   Original: {}", record.source_url)?;
        }
    }
    Ok(())
}

/// Echo of the records picked by index before a selective download.
pub fn render_selection<W: Write>(
    records: &[ImageRecord],
    prefix: &RunPrefix,
    out: &mut W,
) -> std::io::Result<()> {
    writeln!(
        out,
        "Downloading {} selected images with prefix \"{}_\":",
        records.len(),
        prefix
    )?;
    for record in records {
        writeln!(out, "  + {}", record.file_name)?;
    }
    Ok(())
}

pub fn write_manifest(path: &Path, results: &[RetrievalResult]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(MANIFEST_HEADER)?;
    for result in results {
        let record = &result.record;
        let index = record.index.to_string();
        let bytes = result.byte_size.map(|v| v.to_string()).unwrap_or_default();
        writer.write_record([
            index.as_str(),
            record.file_name.as_str(),
            record.canonical_url.as_str(),
            record.source_url.as_str(),
            if result.success { "succeeded" } else { "failed" },
            bytes.as_str(),
            result.sha256.as_deref().unwrap_or(""),
            result.error_message.as_deref().unwrap_or(""),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}
