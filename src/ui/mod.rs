// src/ui/mod.rs

use crate::core::models::{DetectionResult, ScanRecord, ScanSummary};
use crate::core::scanner::ResultSink;
use colored::*;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::error;

/// `cms(Ln)` labels joined by `, `.
fn plain_fingers(detections: &[DetectionResult]) -> String {
    detections
        .iter()
        .map(|d| format!("{}(L{})", d.cms, d.level))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The line appended to the result file for one record.
pub fn plain_line(record: &ScanRecord) -> String {
    format!(
        "[+] {} | {} | {} | [len:{}] | iconHash: {} | Finger: {}",
        record.url,
        record.status,
        record.title,
        record.content_length,
        record.favicon_hash,
        plain_fingers(&record.detections)
    )
}

/// The coloured console rendition of [`plain_line`], with a CDN marker.
pub fn console_line(record: &ScanRecord) -> String {
    let status = record.status.to_string();
    let status = match record.status {
        200 => status.green(),
        300..=399 => status.yellow(),
        400.. => status.red(),
        _ => status.bright_black(),
    };
    let fingers = record
        .detections
        .iter()
        .map(|d| {
            let label = format!("{}(L{})", d.cms, d.level);
            match d.level {
                3.. => label.red().to_string(),
                2 => label.yellow().to_string(),
                _ => label.green().to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let cdn = if record.cdn.is_cdn() { format!(" {}", "[CDN]".red()) } else { String::new() };

    format!(
        "{} {}{} | {} | {} | [len:{}] | iconHash: {} | Finger: {}",
        "[+]".bright_green(),
        record.url.bright_blue(),
        cdn,
        status,
        record.title.cyan(),
        record.content_length.to_string().magenta(),
        record.favicon_hash.bright_black(),
        fingers
    )
}

/// Console and result-file output for scan records.
pub struct Presenter {
    output: Option<Mutex<File>>,
    json: bool,
}

impl Presenter {
    /// Opens `output` for appending (created if missing). `json` switches the
    /// file format to one JSON object per line.
    pub fn new(output: Option<&Path>, json: bool) -> io::Result<Self> {
        let output = match output {
            Some(path) => Some(Mutex::new(OpenOptions::new().create(true).append(true).open(path)?)),
            None => None,
        };
        Ok(Self { output, json })
    }

    fn file_line(&self, record: &ScanRecord) -> Option<String> {
        if !self.json {
            return Some(plain_line(record));
        }
        match serde_json::to_string(record) {
            Ok(line) => Some(line),
            Err(e) => {
                error!(url = %record.url, error = %e, "Cannot serialize record.");
                None
            }
        }
    }
}

impl ResultSink for Presenter {
    fn report(&self, record: &ScanRecord) {
        println!("{}", console_line(record));

        let Some(file) = &self.output else { return };
        let Some(line) = self.file_line(record) else { return };
        let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(file, "{line}") {
            error!(url = %record.url, error = %e, "Cannot write result file.");
        }
    }
}

/// End-of-run counters, printed to stdout.
pub fn print_summary(summary: &ScanSummary) {
    println!(
        "{} candidates: {} | alive: {} | tasks: {} | reported: {} | failed: {}",
        "[*]".bright_cyan(),
        summary.candidates,
        summary.alive,
        summary.tasks,
        summary.reported.to_string().green(),
        summary.failed.to_string().red()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::CdnVerdict;
    use chrono::Utc;

    fn record() -> ScanRecord {
        ScanRecord {
            url: "http://example.com:8080/".into(),
            address: "10.0.0.1".into(),
            status: 200,
            title: "Admin".into(),
            content_length: 1234,
            favicon_url: "http://example.com:8080/favicon.ico".into(),
            favicon_hash: "-1234".into(),
            detections: vec![
                DetectionResult { cms: "Tomcat".into(), level: 3, tags: vec![], matched: vec!["x".into()] },
                DetectionResult { cms: "Java".into(), level: 1, tags: vec![], matched: vec!["y".into()] },
            ],
            cdn: CdnVerdict::new(),
            scanned_at: Utc::now(),
        }
    }

    #[test]
    fn plain_line_format() {
        assert_eq!(
            plain_line(&record()),
            "[+] http://example.com:8080/ | 200 | Admin | [len:1234] | iconHash: -1234 | Finger: Tomcat(L3), Java(L1)"
        );
    }

    #[test]
    fn appends_plain_and_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.txt");

        Presenter::new(Some(&path), false).unwrap().report(&record());
        Presenter::new(Some(&path), true).unwrap().report(&record());

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[+] http://example.com:8080/"));
        let json: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(json["status"], 200);
        assert_eq!(json["detections"][0]["cms"], "Tomcat");
    }
}
