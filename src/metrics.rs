//! Export statistics for reporting.
//!
//! [`ExportMetrics`] is a serializable snapshot of one finished export. It can
//! be printed to stderr in a human-readable form, since stdout may be carrying
//! the export itself, or saved as pretty JSON.
//!
//! ```no_run
//! use rawcsv::{Coordinator, ExportOptions, VecSource};
//! use rawcsv::metrics::ExportMetrics;
//!
//! # fn main() -> anyhow::Result<()> {
//! let src = VecSource::from_strs(&["id"], &[&[Some("1")]]);
//! let summary = Coordinator::new(ExportOptions::default()).run(src, Vec::new())?;
//!
//! let metrics = ExportMetrics::from_summary(&summary).with_input("inline");
//! metrics.print();
//! metrics.save_to_file("metrics.json")?;
//! # Ok(())
//! # }
//! ```

use crate::coordinator::ExportSummary;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportMetrics {
    /// Data rows written, excluding the header.
    pub rows: u64,
    pub header: bool,
    pub bytes: u64,
    pub threshold_flushes: u64,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ExportMetrics {
    #[must_use]
    pub fn from_summary(summary: &ExportSummary) -> Self {
        Self {
            rows: summary.rows,
            header: summary.header,
            bytes: summary.bytes,
            threshold_flushes: summary.threshold_flushes,
            elapsed_ms: u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            input: None,
            output: None,
        }
    }

    #[must_use]
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Rows per second, or `None` for an export too quick to time.
    #[must_use]
    pub fn rows_per_sec(&self) -> Option<f64> {
        (self.elapsed_ms > 0).then(|| self.rows as f64 * 1000.0 / self.elapsed_ms as f64)
    }

    /// Human-readable lines, as printed by [`print`](Self::print).
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("========== Export Metrics ==========\n");
        if let Some(input) = &self.input {
            out.push_str(&format!("Input: {input}\n"));
        }
        if let Some(output) = &self.output {
            out.push_str(&format!("Output: {output}\n"));
        }
        out.push_str(&format!(
            "Rows: {}{}\n",
            self.rows,
            if self.header { " (+ header)" } else { "" }
        ));
        out.push_str(&format!("Bytes: {}\n", self.bytes));
        out.push_str(&format!("Threshold flushes: {}\n", self.threshold_flushes));
        out.push_str(&format!(
            "Elapsed: {:.3}s",
            self.elapsed_ms as f64 / 1000.0
        ));
        if let Some(rate) = self.rows_per_sec() {
            out.push_str(&format!(" ({rate:.0} rows/s)"));
        }
        out.push_str("\n====================================\n");
        out
    }

    /// Print to stderr.
    pub fn print(&self) {
        eprint!("{}", self.render());
    }

    /// Save as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn summary() -> ExportSummary {
        ExportSummary {
            rows: 500,
            header: true,
            bytes: 4096,
            threshold_flushes: 2,
            elapsed: Duration::from_millis(250),
        }
    }

    #[test]
    fn render_mentions_counts() {
        let text = ExportMetrics::from_summary(&summary())
            .with_output("out.csv")
            .render();
        assert!(text.contains("Output: out.csv"));
        assert!(text.contains("Rows: 500 (+ header)"));
        assert!(text.contains("2000 rows/s"));
        assert!(!text.contains("Input:"));
    }

    #[test]
    fn json_skips_missing_paths() -> anyhow::Result<()> {
        let value = serde_json::to_value(ExportMetrics::from_summary(&summary()))?;
        assert_eq!(value["elapsed_ms"], 250);
        assert!(value.get("input").is_none());
        Ok(())
    }
}
