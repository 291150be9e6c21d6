//! PDF rendering and atomic report writes

use std::fs;
use std::path::{Path, PathBuf};

use printpdf::{BuiltinFont, Color, Mm, PdfDocument, Rgb};
use tracing::{debug, info, warn};

use crate::report::document::{LineStyle, ReportDocument, ReportLine, DEFAULT_ATTRIBUTION};
use crate::utils::error::{Result, XrayError};

// A4 portrait
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const LINE_HEIGHT_MM: f32 = 8.0;
const BLANK_HEIGHT_MM: f32 = 5.0;

/// Typeface of a placed line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Regular,
    Bold,
    Italic,
}

/// A report line positioned on the page
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText<'a> {
    pub text: &'a str,
    pub face: Face,
    pub size: f32,
    /// Baseline, measured from the bottom edge
    pub y_mm: f32,
    pub alert: bool,
}

fn font_size(style: LineStyle) -> f32 {
    match style {
        LineStyle::Title => 20.0,
        LineStyle::Attribution => 10.0,
        LineStyle::Alert | LineStyle::Body | LineStyle::Disclaimer => 12.0,
    }
}

/// Place every text line of `document` top to bottom on one A4 page
pub fn layout_report(document: &ReportDocument) -> Vec<PlacedText<'_>> {
    let mut placed = Vec::new();
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;

    for line in document.lines() {
        match line {
            ReportLine::Blank => y -= BLANK_HEIGHT_MM,
            ReportLine::Text { text, style } => {
                let face = match style {
                    LineStyle::Title | LineStyle::Alert => Face::Bold,
                    LineStyle::Disclaimer => Face::Italic,
                    LineStyle::Body | LineStyle::Attribution => Face::Regular,
                };
                placed.push(PlacedText {
                    text: text.as_str(),
                    face,
                    size: font_size(*style),
                    y_mm: y,
                    alert: *style == LineStyle::Alert,
                });

                y -= if *style == LineStyle::Title {
                    LINE_HEIGHT_MM * 1.5
                } else {
                    LINE_HEIGHT_MM
                };
            }
        }
    }

    placed
}

/// Render a report to PDF bytes
pub fn render_pdf(document: &ReportDocument) -> std::result::Result<Vec<u8>, printpdf::Error> {
    let (doc, page, layer) = PdfDocument::new(
        "COVID-19 X-Ray Detection Report",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Report",
    );

    let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
    let italic = doc.add_builtin_font(BuiltinFont::HelveticaOblique)?;

    let layer = doc.get_page(page).get_layer(layer);
    let black = Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None));
    let red = Color::Rgb(Rgb::new(0.73, 0.11, 0.11, None));

    for line in layout_report(document) {
        let font = match line.face {
            Face::Regular => &regular,
            Face::Bold => &bold,
            Face::Italic => &italic,
        };
        layer.set_fill_color(if line.alert { red.clone() } else { black.clone() });
        layer.use_text(line.text, line.size, Mm(MARGIN_MM), Mm(line.y_mm), font);
    }

    doc.save_to_bytes()
}

/// Writes report documents into one directory
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    output_dir: PathBuf,
    attribution: String,
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            attribution: DEFAULT_ATTRIBUTION.to_string(),
        }
    }

    /// Override the attribution line
    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = attribution.into();
        self
    }

    /// Generator writing into `<output_dir>/<name>` with the same attribution
    pub fn subdirectory(&self, name: &str) -> Self {
        Self {
            output_dir: self.output_dir.join(name),
            attribution: self.attribution.clone(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn attribution(&self) -> &str {
        &self.attribution
    }

    /// Render `document` and write it as `<output_dir>/<file_name>`
    ///
    /// The PDF is written to a hidden temporary file first and renamed into
    /// place, so a failure never leaves a partial report under the final name.
    pub fn generate(&self, document: &ReportDocument, file_name: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        let write_err = |e: &dyn std::fmt::Display| XrayError::ReportWrite(path.clone(), e.to_string());

        let bytes = render_pdf(document).map_err(|e| write_err(&e))?;

        fs::create_dir_all(&self.output_dir).map_err(|e| write_err(&e))?;

        if path.exists() {
            warn!("Replacing existing report {:?}", path);
        }

        let tmp = self.output_dir.join(format!(".{}.tmp", file_name));
        if let Err(e) = fs::write(&tmp, &bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(&e));
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            warn!("Failed to move report into place: {}", e);
            let _ = fs::remove_file(&tmp);
            return Err(write_err(&e));
        }

        debug!("Report content:\n{}", document.to_text());
        info!("Wrote report {:?} ({} bytes)", path, bytes.len());

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::decision::decide;
    use crate::report::document::{report_file_name, EMERGENCY_ALERT};
    use crate::session::patient::{Age, Gender, PatientInfo};

    fn document(score: f64) -> ReportDocument {
        let patient = PatientInfo::new("Jane Doe", Age::new(30).unwrap(), Gender::Female);
        ReportDocument::new(
            &patient,
            &decide(score).unwrap(),
            "01-02-2024 09:05",
            DEFAULT_ATTRIBUTION,
        )
    }

    #[test]
    fn test_render_produces_pdf() {
        let bytes = render_pdf(&document(0.1)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_positive_layout_places_alert_on_page() {
        let doc = document(0.1);
        let placed = layout_report(&doc);

        let alerts: Vec<_> = placed.iter().filter(|l| l.alert).collect();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].text, EMERGENCY_ALERT);
        assert_eq!(alerts[0].face, Face::Bold);
        assert!(alerts[0].y_mm > MARGIN_MM && alerts[0].y_mm < PAGE_HEIGHT_MM);

        assert!(placed.iter().any(|l| l.text == "Result: COVID POSITIVE"));
        assert!(placed.iter().any(|l| l.text == "Confidence: 90.00%"));

        // every text line of the document is drawn, lowest last
        let text_lines = doc.lines().iter().filter(|l| l.text().is_some()).count();
        assert_eq!(placed.len(), text_lines);
        assert!(placed.windows(2).all(|w| w[0].y_mm > w[1].y_mm));
        assert!(placed.iter().all(|l| l.y_mm > 0.0));
    }

    #[test]
    fn test_negative_layout_has_no_alert() {
        let doc = document(0.82);
        let placed = layout_report(&doc);

        assert!(placed.iter().all(|l| !l.alert));
        assert!(placed.iter().all(|l| l.text != EMERGENCY_ALERT));
        assert!(placed.iter().any(|l| l.text == "Result: COVID NEGATIVE"));
    }

    #[test]
    fn test_existing_report_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path());
        let name = report_file_name("Jane Doe", 1);

        let first = generator.generate(&document(0.82), &name).unwrap();
        let second = generator.generate(&document(0.1), &name).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_generate_writes_final_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path().join("reports"));

        let name = report_file_name("Jane Doe", 1);
        let path = generator.generate(&document(0.82), &name).unwrap();

        assert_eq!(path, dir.path().join("reports/Covid_Report_Jane_Doe_1.pdf"));
        assert!(fs::read(&path).unwrap().starts_with(b"%PDF"));

        let entries: Vec<_> = fs::read_dir(dir.path().join("reports"))
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_unwritable_directory_is_report_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"file").unwrap();

        let generator = ReportGenerator::new(&blocker);
        let err = generator.generate(&document(0.3), "r.pdf").unwrap_err();
        assert!(matches!(err, XrayError::ReportWrite(..)));
    }

    #[test]
    fn test_subdirectory_keeps_attribution() {
        let generator = ReportGenerator::new("reports").with_attribution("Ward 7");
        let session = generator.subdirectory("abc");

        assert_eq!(session.output_dir(), Path::new("reports/abc"));
        assert_eq!(session.attribution(), "Ward 7");
    }
}
