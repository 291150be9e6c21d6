//! Append-only report history of one session

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::inference::decision::{Label, Verdict};
use crate::session::patient::{Age, Gender, PatientInfo};

/// Snapshot of a generated report
///
/// Built once when the report is written; later uploads or analyses in the
/// same session never touch it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRecord {
    sequence: usize,
    name: String,
    age: Age,
    gender: Gender,
    result: Label,
    confidence: String,
    emergency: bool,
    timestamp: String,
    file_name: String,
    #[serde(skip)]
    path: PathBuf,
}

impl ReportRecord {
    pub fn new(
        sequence: usize,
        patient: &PatientInfo,
        verdict: &Verdict,
        timestamp: String,
        path: PathBuf,
    ) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            sequence,
            name: patient.name.clone(),
            age: patient.age,
            gender: patient.gender,
            result: verdict.label(),
            confidence: verdict.confidence().to_string(),
            emergency: verdict.is_emergency(),
            timestamp,
            file_name,
            path,
        }
    }

    /// 1-based position in the session history
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> Age {
        self.age
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn result(&self) -> Label {
        self.result
    }

    /// Confidence as printed, e.g. `82.00%`
    pub fn confidence(&self) -> &str {
        &self.confidence
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Ordered list of reports; entries are never removed or replaced
#[derive(Debug, Clone, Default)]
pub struct ReportHistory {
    records: Vec<ReportRecord>,
}

impl ReportHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, returning its 1-based sequence number
    pub fn append(&mut self, record: ReportRecord) -> usize {
        self.records.push(record);
        self.records.len()
    }

    /// Records in insertion order
    pub fn list(&self) -> &[ReportRecord] {
        &self.records
    }

    /// Record at a 0-based index
    pub fn get(&self, index: usize) -> Option<&ReportRecord> {
        self.records.get(index)
    }

    /// Record with the given 1-based sequence number
    pub fn by_sequence(&self, sequence: usize) -> Option<&ReportRecord> {
        sequence.checked_sub(1).and_then(|i| self.records.get(i))
    }

    pub fn latest(&self) -> Option<&ReportRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sequence number the next record will get
    pub fn next_sequence(&self) -> usize {
        self.records.len() + 1
    }
}
