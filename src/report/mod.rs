//! Patient report generation
//!
//! `document` holds the wording, `generator` renders it to an A4 PDF and
//! writes it to disk.

pub mod document;
pub mod generator;

pub use document::{
    format_timestamp, report_file_name, LineStyle, ReportDocument, ReportLine,
    DEFAULT_ATTRIBUTION, TIMESTAMP_FORMAT,
};
pub use generator::{layout_report, render_pdf, Face, PlacedText, ReportGenerator};
