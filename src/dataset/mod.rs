//! Dataset module for the offline training flow
//!
//! - `archive`: unpacking the zipped dataset
//! - `loader`: discovering labeled images in `Train/` and `Val/`
//! - `augmentation`: shear, zoom and flip for training images
//! - `burn_dataset`: Burn `Dataset` and `Batcher` implementations

pub mod archive;
pub mod augmentation;
pub mod burn_dataset;
pub mod loader;

pub use archive::{extract_archive, ExtractionSummary};
pub use augmentation::{AugmentationConfig, Augmenter};
pub use burn_dataset::{
    AugmentingBatcher, RawXrayDataset, RawXrayItem, XrayBatch, XrayBatcher, XrayBurnDataset,
    XrayItem,
};
pub use loader::{DatasetStats, ImageSample, XrayDataset};
