//! Model module: CNN architecture, training configuration and artifact paths
//!
//! A trained model is stored as two files sharing a stem:
//! - `<stem>.mpk`: weights written by Burn's `CompactRecorder`
//! - `<stem>.json`: the `XrayNetConfig` used to build the network

use std::path::{Path, PathBuf};

pub mod cnn;
pub mod config;

pub use cnn::{XrayNet, XrayNetConfig};
pub use config::TrainingConfig;

/// Extension of the weight record
pub const WEIGHTS_EXTENSION: &str = "mpk";

/// Extension of the architecture sidecar
pub const CONFIG_EXTENSION: &str = "json";

/// Path of the weight record for a model path given with or without extension
pub fn weights_path(model: &Path) -> PathBuf {
    model.with_extension(WEIGHTS_EXTENSION)
}

/// Path of the architecture sidecar for a model path
pub fn config_path(model: &Path) -> PathBuf {
    model.with_extension(CONFIG_EXTENSION)
}
