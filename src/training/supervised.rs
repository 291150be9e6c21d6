//! Supervised Training Implementation
//!
//! A manual Burn training loop: a fixed number of augmented training steps
//! per epoch followed by a fixed number of validation steps, optimized with
//! Adam on binary cross-entropy over logits.

use std::path::{Path, PathBuf};

use burn::{
    config::Config,
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::{AutodiffModule, Module},
    nn::loss::BinaryCrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use colored::Colorize;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{
    AugmentationConfig, AugmentingBatcher, RawXrayDataset, XrayBatch, XrayBatcher,
    XrayBurnDataset, XrayDataset,
};
use crate::model::{config_path, weights_path, TrainingConfig, XrayNet, XrayNetConfig};
use crate::utils::error::{Result, XrayError};
use crate::utils::logging::TrainingLogger;

/// File name of the per-epoch history written next to the model
pub const HISTORY_FILE: &str = "history.json";

/// Metrics of one epoch; accuracies are fractions in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

/// Outcome of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Saved model path without extension
    pub model_path: PathBuf,
    pub train_samples: usize,
    pub val_samples: usize,
    pub best_val_accuracy: f64,
    pub history: Vec<EpochMetrics>,
}

/// Walks a dataset in batches, reshuffling after every full pass
struct BatchCursor {
    indices: Vec<usize>,
    position: usize,
}

impl BatchCursor {
    fn new(len: usize, rng: &mut ChaCha8Rng) -> Self {
        let mut indices: Vec<usize> = (0..len).collect();
        indices.shuffle(rng);
        Self {
            indices,
            position: 0,
        }
    }

    fn next_batch(&mut self, batch_size: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        if self.position >= self.indices.len() {
            self.indices.shuffle(rng);
            self.position = 0;
        }
        let end = (self.position + batch_size).min(self.indices.len());
        let batch = self.indices[self.position..end].to_vec();
        self.position = end;
        batch
    }
}

fn steps_for(len: usize, batch_size: usize, steps: Option<usize>) -> usize {
    steps.unwrap_or_else(|| len.div_ceil(batch_size))
}

/// Number of correct predictions for logits `[N, 1]` against 0/1 targets
fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2, Int>) -> usize {
    let correct: i64 = logits
        .greater_elem(0.0)
        .int()
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem();
    correct as usize
}

/// Train on the dataset described by `config` with the default architecture
pub fn run_training<B: AutodiffBackend>(config: &TrainingConfig) -> Result<TrainingSummary> {
    run_training_with_model::<B>(config, &XrayNetConfig::new())
}

/// Train with an explicit architecture and save model, config and history
pub fn run_training_with_model<B: AutodiffBackend>(
    config: &TrainingConfig,
    model_config: &XrayNetConfig,
) -> Result<TrainingSummary> {
    config.validate()?;
    model_config.validate()?;

    println!("{}", "Initializing Training...".green().bold());
    let device = B::Device::default();
    println!("  Device: {:?}", device);

    println!("{}", "Loading Dataset...".cyan());
    let train_split = XrayDataset::new(config.train_dir())?;
    let val_split = XrayDataset::new(config.val_dir())?;
    train_split.stats().print("Training split");
    val_split.stats().print("Validation split");

    if train_split.is_empty() || val_split.is_empty() {
        return Err(XrayError::Dataset(format!(
            "no images found under {:?}; expected Train/ and Val/ class directories",
            config.data_dir
        )));
    }

    let image_size = model_config.input_size;

    println!();
    println!("{}", "Pre-loading Training Data...".cyan().bold());
    let train_dataset = RawXrayDataset::new_cached(&train_split.labeled_paths())?;

    println!("{}", "Pre-loading Validation Data...".cyan().bold());
    let val_dataset = XrayBurnDataset::new_cached(&val_split.labeled_paths(), image_size)?;

    println!();
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  🏷️  Training samples:   {}", train_dataset.len());
    println!("  ✅ Validation samples: {}", val_dataset.len());
    println!("  🔄 Epochs:             {}", config.epochs);
    println!("  📦 Batch size:         {}", config.batch_size);
    println!("  📈 Learning rate:      {}", config.learning_rate);
    println!(
        "  🎲 Augmentation:       {}",
        if config.augmentation.is_some() { "on" } else { "off" }
    );
    println!();

    let (model, history) =
        fit::<B>(config, model_config, &train_dataset, &val_dataset, &device)?;

    let model_path = save_artifacts(config, model_config, &model, &history)?;

    let best_val_accuracy = history
        .iter()
        .map(|m| m.val_accuracy)
        .fold(0.0f64, f64::max);

    println!("{}", "Training Complete!".green().bold());
    println!(
        "  🎉 Best validation accuracy: {:.2}%",
        best_val_accuracy * 100.0
    );
    println!("  💾 Saved to: {:?}", weights_path(&model_path));

    Ok(TrainingSummary {
        model_path,
        train_samples: train_dataset.len(),
        val_samples: val_dataset.len(),
        best_val_accuracy,
        history,
    })
}

/// The training loop proper, on in-memory datasets
pub fn fit<B: AutodiffBackend>(
    config: &TrainingConfig,
    model_config: &XrayNetConfig,
    train_dataset: &RawXrayDataset,
    val_dataset: &XrayBurnDataset,
    device: &B::Device,
) -> Result<(XrayNet<B>, Vec<EpochMetrics>)> {
    if train_dataset.is_empty() || val_dataset.is_empty() {
        return Err(XrayError::Training(
            "training and validation sets must not be empty".to_string(),
        ));
    }

    let image_size = model_config.input_size;
    let batch_size = config.batch_size;

    let mut model: XrayNet<B> = model_config.init(device);
    let mut optimizer = AdamConfig::new().init();

    let train_batcher = AugmentingBatcher::new(
        image_size,
        config
            .augmentation
            .clone()
            .unwrap_or_else(AugmentationConfig::none),
        config.seed,
    );
    let val_batcher = XrayBatcher::new(image_size);
    let inner_device = <B::InnerBackend as Backend>::Device::default();

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut train_cursor = BatchCursor::new(train_dataset.len(), &mut rng);
    let mut val_cursor = BatchCursor::new(val_dataset.len(), &mut rng);

    let train_steps = steps_for(train_dataset.len(), batch_size, config.steps_per_epoch);
    let val_steps = steps_for(val_dataset.len(), batch_size, config.validation_steps);
    debug!(
        "{} training steps and {} validation steps per epoch",
        train_steps, val_steps
    );

    let loss_fn = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(device);
    let mut logger = TrainingLogger::new(config.epochs);
    let mut history = Vec::with_capacity(config.epochs);
    let mut best_val_acc = 0.0f64;

    for epoch in 0..config.epochs {
        logger.start_epoch(epoch);
        println!(
            "{}",
            format!("Epoch {}/{}", epoch + 1, config.epochs)
                .yellow()
                .bold()
        );

        let mut epoch_loss = 0.0f64;
        let mut correct = 0usize;
        let mut seen = 0usize;

        for step in 0..train_steps {
            let items: Vec<_> = train_cursor
                .next_batch(batch_size, &mut rng)
                .into_iter()
                .filter_map(|i| train_dataset.get(i))
                .collect();
            if items.is_empty() {
                continue;
            }

            let batch: XrayBatch<B> = train_batcher.batch_with_rng(items, &mut rng, device);
            let logits = model.forward(batch.images);

            let loss = loss_fn.forward(logits.clone(), batch.targets.clone());
            let loss_value: f64 = loss.clone().into_scalar().elem();
            epoch_loss += loss_value;

            seen += batch.targets.dims()[0];
            correct += count_correct(logits, batch.targets);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);

            debug!(
                "  Step {:>3}/{}: loss = {:.4}",
                step + 1,
                train_steps,
                loss_value
            );
        }

        let train_loss = epoch_loss / train_steps.max(1) as f64;
        let train_accuracy = correct as f64 / seen.max(1) as f64;

        let (val_loss, val_accuracy) = evaluate(
            &model.valid(),
            val_dataset,
            &val_batcher,
            &mut val_cursor,
            &mut rng,
            batch_size,
            val_steps,
            &inner_device,
        );

        let is_best = val_accuracy > best_val_acc;
        if is_best {
            best_val_acc = val_accuracy;
        }

        logger.end_epoch(train_loss, train_accuracy, val_loss, val_accuracy);
        println!(
            "  {} Loss: {:.4} | Acc: {:.2}% | Val Loss: {:.4} | Val Acc: {:.2}%{}",
            "→".cyan(),
            train_loss,
            train_accuracy * 100.0,
            val_loss,
            val_accuracy * 100.0,
            if is_best {
                " (best)".green().to_string()
            } else {
                String::new()
            }
        );

        history.push(EpochMetrics {
            epoch: epoch + 1,
            train_loss,
            train_accuracy,
            val_loss,
            val_accuracy,
        });
    }

    logger.log_complete(best_val_acc);
    Ok((model, history))
}

/// Mean loss and accuracy over `steps` validation batches
#[allow(clippy::too_many_arguments)]
fn evaluate<B: Backend>(
    model: &XrayNet<B>,
    dataset: &XrayBurnDataset,
    batcher: &XrayBatcher,
    cursor: &mut BatchCursor,
    rng: &mut ChaCha8Rng,
    batch_size: usize,
    steps: usize,
    device: &B::Device,
) -> (f64, f64) {
    let loss_fn = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(device);

    let mut total_loss = 0.0f64;
    let mut batches = 0usize;
    let mut correct = 0usize;
    let mut seen = 0usize;

    for _ in 0..steps {
        let items: Vec<_> = cursor
            .next_batch(batch_size, rng)
            .into_iter()
            .filter_map(|i| dataset.get(i))
            .collect();
        if items.is_empty() {
            continue;
        }

        let batch: XrayBatch<B> = batcher.batch(items, device);
        let logits = model.forward(batch.images);

        let loss: f64 = loss_fn
            .forward(logits.clone(), batch.targets.clone())
            .into_scalar()
            .elem();
        total_loss += loss;
        batches += 1;

        seen += batch.targets.dims()[0];
        correct += count_correct(logits, batch.targets);
    }

    (
        total_loss / batches.max(1) as f64,
        correct as f64 / seen.max(1) as f64,
    )
}

/// Write weights, architecture config, training config and history
fn save_artifacts<B: Backend>(
    config: &TrainingConfig,
    model_config: &XrayNetConfig,
    model: &XrayNet<B>,
    history: &[EpochMetrics],
) -> Result<PathBuf> {
    println!("{}", "Saving Model...".cyan());
    std::fs::create_dir_all(&config.output_dir)?;

    let model_path = config.model_path();
    model
        .clone()
        .save_file(model_path.clone(), &CompactRecorder::new())
        .map_err(|e| XrayError::Training(format!("Failed to save model: {:?}", e)))?;

    model_config.save(config_path(&model_path))?;
    config.save(&config.output_dir.join("training_config.json"))?;
    save_history(&config.output_dir.join(HISTORY_FILE), history)?;

    info!("Saved model artifacts under {:?}", config.output_dir);
    Ok(model_path)
}

/// Write per-epoch metrics as pretty JSON
pub fn save_history(path: &Path, history: &[EpochMetrics]) -> Result<()> {
    let json = serde_json::to_string_pretty(history)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{RawXrayItem, XrayItem};
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;
    use image::{DynamicImage, Rgb, RgbImage};

    type TestBackend = Autodiff<NdArray>;

    fn tiny_model() -> XrayNetConfig {
        XrayNetConfig::new()
            .with_input_size(32)
            .with_base_filters(2)
            .with_hidden_units(4)
    }

    fn tiny_config(output_dir: &Path) -> TrainingConfig {
        TrainingConfig {
            epochs: 2,
            batch_size: 2,
            steps_per_epoch: Some(2),
            validation_steps: Some(1),
            output_dir: output_dir.to_path_buf(),
            ..TrainingConfig::default()
        }
    }

    fn raw(label: usize) -> RawXrayItem {
        let value = if label == 0 { 30 } else { 220 };
        RawXrayItem {
            image: DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 36, Rgb([value; 3]))),
            label,
        }
    }

    #[test]
    fn test_batch_cursor_cycles() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut cursor = BatchCursor::new(5, &mut rng);

        let first: Vec<usize> = (0..3)
            .flat_map(|_| cursor.next_batch(2, &mut rng))
            .collect();
        assert_eq!(first.len(), 5);
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4]);

        // wraps around after a full pass
        assert_eq!(cursor.next_batch(2, &mut rng).len(), 2);
    }

    #[test]
    fn test_steps_for() {
        assert_eq!(steps_for(100, 32, Some(7)), 7);
        assert_eq!(steps_for(100, 32, None), 4);
        assert_eq!(steps_for(64, 32, None), 2);
    }

    #[test]
    fn test_count_correct() {
        let device = Default::default();
        let logits = Tensor::<NdArray, 2>::from_floats([[2.0], [-1.0], [0.5]], &device);
        let targets = Tensor::<NdArray, 2, Int>::from_ints([[1], [0], [0]], &device);
        assert_eq!(count_correct(logits, targets), 2);
    }

    #[test]
    fn test_fit_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let config = tiny_config(dir.path());
        let model_config = tiny_model();

        let train = RawXrayDataset::from_items(vec![raw(0), raw(1), raw(0), raw(1)]);
        let val = XrayBurnDataset::from_items(
            [0, 1]
                .iter()
                .map(|&label| XrayItem {
                    image: vec![if label == 0 { 0.1 } else { 0.9 }; 3 * 32 * 32],
                    label,
                })
                .collect(),
        );

        let (_, history) =
            fit::<TestBackend>(&config, &model_config, &train, &val, &Default::default())
                .unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[1].epoch, 2);
        for m in &history {
            assert!(m.train_loss.is_finite() && m.val_loss.is_finite());
            assert!((0.0..=1.0).contains(&m.train_accuracy));
            assert!((0.0..=1.0).contains(&m.val_accuracy));
        }
    }

    #[test]
    fn test_run_training_saves_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("CovidDataset");
        for split in ["Train", "Val"] {
            for (class, value) in [("Covid", 40u8), ("Normal", 200u8)] {
                let class_dir = data.join(split).join(class);
                std::fs::create_dir_all(&class_dir).unwrap();
                for i in 0..2 {
                    RgbImage::from_pixel(36, 36, Rgb([value; 3]))
                        .save(class_dir.join(format!("{}.png", i)))
                        .unwrap();
                }
            }
        }

        let mut config = tiny_config(&dir.path().join("models"));
        config.data_dir = data;
        config.epochs = 1;

        let summary = run_training_with_model::<TestBackend>(&config, &tiny_model()).unwrap();

        assert_eq!(summary.train_samples, 4);
        assert_eq!(summary.history.len(), 1);
        assert!(weights_path(&summary.model_path).is_file());
        assert!(config_path(&summary.model_path).is_file());
        assert!(config.output_dir.join(HISTORY_FILE).is_file());

        let loaded = XrayNetConfig::load(config_path(&summary.model_path)).unwrap();
        assert_eq!(loaded.input_size, 32);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = TrainingConfig::default();
        config.batch_size = 0;
        assert!(run_training::<TestBackend>(&config).is_err());
    }
}
