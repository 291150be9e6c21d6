//! Training Configuration Module
//!
//! Hyperparameters for the offline training flow. Defaults follow the
//! reference recipe: Adam at 1e-3, batch 32, 20 epochs of 7 steps each and a
//! single validation batch per epoch.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::augmentation::AugmentationConfig;
use crate::utils::error::{Result, XrayError};

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Dataset root containing `Train/` and `Val/` class directories
    pub data_dir: PathBuf,

    /// Directory where the model, its config and the history are written
    pub output_dir: PathBuf,

    /// Number of training epochs
    pub epochs: usize,

    /// Batch size for training and validation
    pub batch_size: usize,

    /// Adam learning rate
    pub learning_rate: f64,

    /// Training batches per epoch (None = full pass over the training set)
    pub steps_per_epoch: Option<usize>,

    /// Validation batches per epoch (None = full pass over the validation set)
    pub validation_steps: Option<usize>,

    /// Random seed for shuffling and augmentation
    pub seed: u64,

    /// Augmentation applied to training batches (None disables it)
    pub augmentation: Option<AugmentationConfig>,

    /// Base name of the saved model artifact
    pub model_name: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("CovidDataset"),
            output_dir: PathBuf::from("output/models"),
            epochs: 20,
            batch_size: 32,
            learning_rate: 0.001,
            steps_per_epoch: Some(7),
            validation_steps: Some(1),
            seed: 42,
            augmentation: Some(AugmentationConfig::default()),
            model_name: "covid_model".to_string(),
        }
    }
}

impl TrainingConfig {
    /// Directory holding training images
    pub fn train_dir(&self) -> PathBuf {
        self.data_dir.join("Train")
    }

    /// Directory holding validation images
    pub fn val_dir(&self) -> PathBuf {
        self.data_dir.join("Val")
    }

    /// Path (without extension) the trained model is saved under
    pub fn model_path(&self) -> PathBuf {
        self.output_dir.join(&self.model_name)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(XrayError::Config("epochs must be greater than 0".to_string()));
        }

        if self.batch_size == 0 {
            return Err(XrayError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(XrayError::Config(
                "learning_rate must be a positive number".to_string(),
            ));
        }

        if self.steps_per_epoch == Some(0) || self.validation_steps == Some(0) {
            return Err(XrayError::Config(
                "steps_per_epoch and validation_steps must be positive when set".to_string(),
            ));
        }

        if self.model_name.trim().is_empty() {
            return Err(XrayError::Config("model_name must not be empty".to_string()));
        }

        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 20);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.steps_per_epoch, Some(7));
        assert_eq!(config.validation_steps, Some(1));
        assert!(config.validate().is_ok());
        assert_eq!(config.train_dir(), PathBuf::from("CovidDataset/Train"));
    }

    #[test]
    fn test_training_config_validation() {
        let mut config = TrainingConfig::default();
        config.epochs = 0;
        assert!(config.validate().is_err());

        let mut config = TrainingConfig::default();
        config.learning_rate = -0.1;
        assert!(config.validate().is_err());

        let mut config = TrainingConfig::default();
        config.steps_per_epoch = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training.json");

        let config = TrainingConfig {
            epochs: 2,
            augmentation: None,
            ..TrainingConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = TrainingConfig::load(&path).unwrap();
        assert_eq!(loaded.epochs, 2);
        assert!(loaded.augmentation.is_none());
    }
}
