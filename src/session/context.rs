//! Per-session state machine
//!
//! ```text
//! NoImage --upload--> ImageUploaded --analyze--> ResultComputed --report--> (history +1)
//!                          ^                           |
//!                          +---------upload------------+
//! ```
//!
//! Every operation either succeeds completely or leaves the context as it
//! was before the call.

use std::path::Path;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info};

use crate::inference::{classify, Classifier, ImageTensor, Preprocessor, Verdict};
use crate::report::{format_timestamp, report_file_name, ReportDocument, ReportGenerator};
use crate::session::history::{ReportHistory, ReportRecord};
use crate::session::patient::PatientInfo;
use crate::utils::error::{Result, XrayError};

/// Where a session is in the upload / analyze / report flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    NoImage,
    ImageUploaded,
    ResultComputed,
}

/// The image currently loaded in a session
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub tensor: ImageTensor,
}

/// State of one operator session
#[derive(Debug)]
pub struct SessionContext {
    preprocessor: Preprocessor,
    image: Option<UploadedImage>,
    verdict: Option<Verdict>,
    history: ReportHistory,
    created_at: DateTime<Local>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(Preprocessor::default())
    }
}

impl SessionContext {
    pub fn new(preprocessor: Preprocessor) -> Self {
        Self {
            preprocessor,
            image: None,
            verdict: None,
            history: ReportHistory::new(),
            created_at: Local::now(),
        }
    }

    pub fn stage(&self) -> SessionStage {
        match (&self.image, &self.verdict) {
            (None, _) => SessionStage::NoImage,
            (Some(_), None) => SessionStage::ImageUploaded,
            (Some(_), Some(_)) => SessionStage::ResultComputed,
        }
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn image(&self) -> Option<&UploadedImage> {
        self.image.as_ref()
    }

    /// Verdict of the current image, if analyzed
    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    /// Replace the current image; any computed verdict is discarded
    pub fn upload_image(&mut self, bytes: &[u8], file_name: Option<&str>) -> Result<()> {
        let tensor = self.preprocessor.preprocess_bytes(bytes)?;

        debug!(
            "Uploaded image {:?} ({} bytes)",
            file_name.unwrap_or("<unnamed>"),
            bytes.len()
        );

        self.image = Some(UploadedImage {
            file_name: file_name.map(str::to_string),
            tensor,
        });
        self.verdict = None;
        Ok(())
    }

    /// Run the classifier on the current image
    pub fn analyze(&mut self, classifier: &dyn Classifier) -> Result<Verdict> {
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| XrayError::Validation("upload an image before analyzing".to_string()))?;

        let verdict = classify(classifier, &image.tensor)?;
        info!("Analysis result: {}", verdict);

        self.verdict = Some(verdict);
        Ok(verdict)
    }

    /// Write a report for the current verdict and record it
    pub fn generate_report(
        &mut self,
        patient: &PatientInfo,
        generator: &ReportGenerator,
    ) -> Result<&ReportRecord> {
        self.generate_report_at(patient, generator, Local::now())
    }

    /// Same as [`generate_report`](Self::generate_report) with an explicit clock
    pub fn generate_report_at(
        &mut self,
        patient: &PatientInfo,
        generator: &ReportGenerator,
        time: DateTime<Local>,
    ) -> Result<&ReportRecord> {
        let verdict = self
            .verdict
            .ok_or_else(|| XrayError::Validation("analyze an image before reporting".to_string()))?;
        patient.validate()?;

        let sequence = self.history.next_sequence();
        let file_name = report_file_name(&patient.name, sequence);
        let timestamp = format_timestamp(&time);

        let document =
            ReportDocument::new(patient, &verdict, &timestamp, generator.attribution());
        let path = generator.generate(&document, &file_name)?;

        let record = ReportRecord::new(sequence, patient, &verdict, timestamp, path);
        self.history.append(record);

        self.history
            .latest()
            .ok_or_else(|| XrayError::NotFound("report history is empty".to_string()))
    }

    pub fn history(&self) -> &ReportHistory {
        &self.history
    }

    pub fn latest_report(&self) -> Option<&ReportRecord> {
        self.history.latest()
    }

    /// Record with the given 1-based sequence number
    pub fn report(&self, sequence: usize) -> Result<&ReportRecord> {
        self.history
            .by_sequence(sequence)
            .ok_or_else(|| XrayError::NotFound(format!("report {} does not exist", sequence)))
    }

    /// Path of a report for streaming downloads
    pub fn report_path(&self, sequence: usize) -> Result<&Path> {
        let path = self.report(sequence)?.path();
        if !path.is_file() {
            return Err(XrayError::PathNotFound(path.to_path_buf()));
        }
        Ok(path)
    }

    /// Read a report's bytes; the file is opened and closed within the call
    pub fn read_report(&self, sequence: usize) -> Result<Vec<u8>> {
        let path = self.report_path(sequence)?;
        Ok(std::fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::classifier::testing::FixedScore;
    use crate::inference::Label;
    use crate::report::document::EMERGENCY_ALERT;
    use crate::session::patient::{Age, Gender};
    use chrono::TimeZone;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([120, 120, 120])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn jane() -> PatientInfo {
        PatientInfo::new("Jane Doe", Age::new(30).unwrap(), Gender::Female)
    }

    fn analyzed(score: f32) -> SessionContext {
        let mut ctx = SessionContext::default();
        ctx.upload_image(&png_bytes(), Some("xray.png")).unwrap();
        ctx.analyze(&FixedScore::new(score)).unwrap();
        ctx
    }

    #[test]
    fn test_stage_transitions() {
        let mut ctx = SessionContext::default();
        assert_eq!(ctx.stage(), SessionStage::NoImage);

        ctx.upload_image(&png_bytes(), None).unwrap();
        assert_eq!(ctx.stage(), SessionStage::ImageUploaded);
        assert_eq!(ctx.image().unwrap().tensor.shape(), [1, 3, 224, 224]);

        ctx.analyze(&FixedScore::new(0.7)).unwrap();
        assert_eq!(ctx.stage(), SessionStage::ResultComputed);

        ctx.upload_image(&png_bytes(), None).unwrap();
        assert_eq!(ctx.stage(), SessionStage::ImageUploaded);
        assert!(ctx.verdict().is_none());
    }

    #[test]
    fn test_analyze_requires_image() {
        let mut ctx = SessionContext::default();
        let err = ctx.analyze(&FixedScore::new(0.7)).unwrap_err();
        assert!(matches!(err, XrayError::Validation(_)));
    }

    #[test]
    fn test_failed_upload_keeps_state() {
        let mut ctx = analyzed(0.9);
        let err = ctx.upload_image(b"garbage", Some("bad.bin")).unwrap_err();

        assert!(matches!(err, XrayError::InvalidInput(_)));
        assert_eq!(ctx.stage(), SessionStage::ResultComputed);
        assert_eq!(ctx.image().unwrap().file_name.as_deref(), Some("xray.png"));
    }

    #[test]
    fn test_failed_analysis_keeps_verdict() {
        let mut ctx = analyzed(0.9);
        assert!(ctx.analyze(&FixedScore::new(f32::NAN)).is_err());
        assert_eq!(ctx.verdict().unwrap().label(), Label::Negative);
    }

    #[test]
    fn test_report_requires_verdict() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path());
        let mut ctx = SessionContext::default();
        ctx.upload_image(&png_bytes(), None).unwrap();

        let err = ctx.generate_report(&jane(), &generator).unwrap_err();
        assert!(matches!(err, XrayError::Validation(_)));
        assert!(ctx.history().is_empty());
    }

    #[test]
    fn test_empty_name_appends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path());
        let mut ctx = analyzed(0.2);

        let patient = PatientInfo::new("", Age::new(30).unwrap(), Gender::Male);
        let err = ctx.generate_report(&patient, &generator).unwrap_err();

        assert!(matches!(err, XrayError::Validation(_)));
        assert_eq!(ctx.history().len(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_negative_report_record() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path());
        let mut ctx = analyzed(0.82);
        let time = Local.with_ymd_and_hms(2024, 2, 1, 9, 5, 0).unwrap();

        let record = ctx.generate_report_at(&jane(), &generator, time).unwrap().clone();

        assert_eq!(record.sequence(), 1);
        assert_eq!(record.name(), "Jane Doe");
        assert_eq!(record.age().years(), 30);
        assert_eq!(record.gender(), Gender::Female);
        assert_eq!(record.result(), Label::Negative);
        assert_eq!(record.confidence(), "82.00%");
        assert_eq!(record.timestamp(), "01-02-2024 09:05");
        assert_eq!(record.file_name(), "Covid_Report_Jane_Doe_1.pdf");

        let bytes = ctx.read_report(1).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_positive_report_document_has_alert() {
        let verdict = analyzed(0.10).verdict().unwrap();
        let doc = ReportDocument::new(&jane(), &verdict, "t", "a");
        assert!(doc.contains(EMERGENCY_ALERT));
        assert!(doc.contains("Confidence: 90.00%"));
    }

    #[test]
    fn test_new_upload_leaves_record_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path());
        let mut ctx = analyzed(0.82);
        let before = ctx.generate_report(&jane(), &generator).unwrap().clone();

        ctx.upload_image(&png_bytes(), Some("second.png")).unwrap();
        ctx.analyze(&FixedScore::new(0.1)).unwrap();

        assert_eq!(ctx.latest_report().unwrap(), &before);
        assert_eq!(ctx.report(1).unwrap().result(), Label::Negative);
    }

    #[test]
    fn test_history_grows_by_one_per_report() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path());
        let mut ctx = analyzed(0.6);

        for expected in 1..=3 {
            ctx.generate_report(&jane(), &generator).unwrap();
            assert_eq!(ctx.history().len(), expected);
        }

        let blank = PatientInfo::new(" ", Age::new(30).unwrap(), Gender::Male);
        assert!(ctx.generate_report(&blank, &generator).is_err());
        assert_eq!(ctx.history().len(), 3);

        assert_eq!(ctx.latest_report().unwrap().file_name(), "Covid_Report_Jane_Doe_3.pdf");
        assert!(dir.path().join("Covid_Report_Jane_Doe_2.pdf").is_file());
    }

    #[test]
    fn test_report_write_failure_appends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let generator = ReportGenerator::new(&blocker);
        let mut ctx = analyzed(0.3);

        let err = ctx.generate_report(&jane(), &generator).unwrap_err();
        assert!(matches!(err, XrayError::ReportWrite(..)));
        assert!(ctx.history().is_empty());
    }

    #[test]
    fn test_unknown_report() {
        let ctx = SessionContext::default();
        assert!(matches!(ctx.read_report(1), Err(XrayError::NotFound(_))));
    }
}
