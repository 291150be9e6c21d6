//! Operator sessions: patient data, the upload/analyze/report state machine
//! and the report history.

pub mod context;
pub mod history;
pub mod patient;

pub use context::{SessionContext, SessionStage, UploadedImage};
pub use history::{ReportHistory, ReportRecord};
pub use patient::{Age, Gender, PatientInfo};
