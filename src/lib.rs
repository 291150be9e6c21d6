//! # COVID-19 Chest X-Ray Detection
//!
//! A Rust library that labels chest X-rays as COVID positive or negative with
//! a small convolutional network built on the Burn framework, and produces
//! PDF patient reports from the result.
//!
//! ## Modules
//!
//! - `dataset`: archive extraction, image discovery, augmentation and Burn batching
//! - `model`: the `XrayNet` CNN and training configuration
//! - `training`: supervised training loop and artifact saving
//! - `inference`: preprocessing, the classifier seam and the decision rule
//! - `report`: report wording and PDF rendering
//! - `session`: patient data, the upload/analyze/report state machine and history
//! - `server`: HTTP surface over sessions
//! - `utils`: logging, errors and formatting helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use covid_xray::backend::{default_device, DefaultBackend};
//! use covid_xray::inference::{classify, BurnClassifier, Preprocessor};
//!
//! let classifier = BurnClassifier::<DefaultBackend>::load("output/models/covid_model".as_ref(), &default_device())?;
//! let tensor = Preprocessor::default().preprocess_file("xray.png".as_ref())?;
//! println!("{}", classify(&classifier, &tensor)?);
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod report;
pub mod server;
pub mod session;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::{XrayBatch, XrayBatcher, XrayBurnDataset, XrayDataset, XrayItem};
pub use inference::{classify, decide, BurnClassifier, Classifier, ImageTensor, Verdict};
pub use model::{TrainingConfig, XrayNet, XrayNetConfig};
pub use report::{ReportDocument, ReportGenerator};
pub use session::{PatientInfo, ReportRecord, SessionContext};
pub use utils::error::{Result, XrayError};

/// Binary task: Covid (0) and Normal (1)
pub const NUM_CLASSES: usize = 2;

/// Side length of the model input
pub const IMAGE_SIZE: usize = 224;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
