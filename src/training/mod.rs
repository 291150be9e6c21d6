//! Training module for the offline flow
//!
//! Fits `XrayNet` on the `Train/` split with augmentation, checks it on the
//! `Val/` split each epoch and writes the model artifacts.

pub mod supervised;

pub use supervised::{
    fit, run_training, run_training_with_model, save_history, EpochMetrics, TrainingSummary,
    HISTORY_FILE,
};

pub use crate::model::config::TrainingConfig;
