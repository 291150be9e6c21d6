//! Report content model
//!
//! A report is an ordered list of styled lines. Keeping the content apart
//! from PDF rendering lets the wording be checked without parsing a PDF.

use chrono::{DateTime, Local};

use crate::inference::decision::Verdict;
use crate::session::patient::PatientInfo;

/// Timestamp layout printed on reports and stored in history records
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M";

pub const REPORT_TITLE: &str = "COVID-19 X-Ray Detection Report";

pub const EMERGENCY_ALERT: &str = "Emergency Alert: Immediate hospital admission recommended.";

pub const DISCLAIMER: &str = "Educational purpose only.";

/// Attribution printed at the bottom of every report unless overridden
pub const DEFAULT_ATTRIBUTION: &str = "Made by Shaurya Pandey";

/// Visual style of a report line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Title,
    Body,
    Alert,
    Disclaimer,
    Attribution,
}

/// One line of report content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    Text { text: String, style: LineStyle },
    Blank,
}

impl ReportLine {
    fn body(text: String) -> Self {
        ReportLine::Text {
            text,
            style: LineStyle::Body,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ReportLine::Text { text, .. } => Some(text),
            ReportLine::Blank => None,
        }
    }
}

/// Format a timestamp the way reports print it
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// File name for the `sequence`-th report of a session
///
/// Spaces become underscores. Path separators, quotes and control
/// characters are replaced as well, so the file lands in the report
/// directory and the name is usable in a download header.
pub fn report_file_name(patient_name: &str, sequence: usize) -> String {
    let name: String = patient_name
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | '"' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("Covid_Report_{}_{}.pdf", name, sequence)
}

/// Content of a single patient report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    lines: Vec<ReportLine>,
}

impl ReportDocument {
    pub fn new(
        patient: &PatientInfo,
        verdict: &Verdict,
        timestamp: &str,
        attribution: &str,
    ) -> Self {
        let mut lines = vec![
            ReportLine::Text {
                text: REPORT_TITLE.to_string(),
                style: LineStyle::Title,
            },
            ReportLine::body(format!("Date & Time: {}", timestamp)),
            ReportLine::Blank,
            ReportLine::body(format!("Patient Name: {}", patient.name)),
            ReportLine::body(format!("Age: {}", patient.age)),
            ReportLine::body(format!("Gender: {}", patient.gender)),
            ReportLine::Blank,
            ReportLine::body(format!("Result: {}", verdict.label())),
            ReportLine::body(format!("Confidence: {}", verdict.confidence())),
            ReportLine::Blank,
        ];

        if verdict.is_emergency() {
            lines.push(ReportLine::Text {
                text: EMERGENCY_ALERT.to_string(),
                style: LineStyle::Alert,
            });
        }

        lines.push(ReportLine::Blank);
        lines.push(ReportLine::Text {
            text: DISCLAIMER.to_string(),
            style: LineStyle::Disclaimer,
        });
        lines.push(ReportLine::Text {
            text: attribution.to_string(),
            style: LineStyle::Attribution,
        });

        Self { lines }
    }

    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    /// Plain text of the report, one line per entry
    pub fn to_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn contains(&self, text: &str) -> bool {
        self.lines.iter().any(|line| line.text() == Some(text))
    }
}
