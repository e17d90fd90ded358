//! CSV measurement rows.
//!
//! Column layout follows the measurements file the plotting scripts read:
//! `Implementation,MsgSize,Threads,Throughput_Gbps,Latency_us`. A connection
//! that produced no data leaves both metric columns empty.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::sample::Report;

pub const CSV_HEADER: &str = "Implementation,MsgSize,Threads,Throughput_Gbps,Latency_us";

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub implementation: String,
    pub message_size: usize,
    pub threads: usize,
    pub report: Report,
}

impl MeasurementRow {
    pub fn to_csv_line(&self) -> String {
        let (throughput, latency) = match (self.report.throughput_gbps(), self.report.latency_us()) {
            (Some(t), Some(l)) => (format!("{t:.4}"), format!("{l:.2}")),
            _ => (String::new(), String::new()),
        };
        format!(
            "{},{},{},{},{}",
            escape(&self.implementation),
            self.message_size,
            self.threads,
            throughput,
            latency
        )
    }
}

/// Append rows to `path`, writing the header first if the file is new or empty.
pub fn append_csv(path: &Path, rows: &[MeasurementRow]) -> io::Result<()> {
    let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut out = String::new();
    if needs_header {
        out.push_str(CSV_HEADER);
        out.push('\n');
    }
    for row in rows {
        out.push_str(&row.to_csv_line());
        out.push('\n');
    }
    file.write_all(out.as_bytes())
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
