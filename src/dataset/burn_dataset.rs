//! Burn Dataset Integration for Chest X-Rays
//!
//! Implements Burn's Dataset trait and Batcher for the training loop.
//!
//! - `XrayBatcher`: rescale-only batcher (validation)
//! - `AugmentingBatcher`: shear/zoom/flip on the fly (training)

use std::path::PathBuf;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::DynamicImage;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::dataset::augmentation::{AugmentationConfig, Augmenter};
use crate::dataset::loader::load_image;
use crate::utils::error::Result;

/// A preprocessed item ready for batching
#[derive(Clone, Debug)]
pub struct XrayItem {
    /// Image data as flattened CHW float array [3 * H * W], values in [0, 1]
    pub image: Vec<f32>,
    /// Class label (0 = Covid, 1 = Normal)
    pub label: usize,
}

impl XrayItem {
    /// Load, resize and rescale an image
    pub fn from_path(path: &PathBuf, label: usize, image_size: usize) -> Result<Self> {
        let img = load_image(path)?;
        let image = Augmenter::no_augmentation(image_size as u32).preprocess(img, None);
        Ok(Self { image, label })
    }
}

/// An undecoded-size image kept for on-the-fly augmentation
#[derive(Clone)]
pub struct RawXrayItem {
    /// Decoded image at its original size
    pub image: DynamicImage,
    /// Class label
    pub label: usize,
}

impl std::fmt::Debug for RawXrayItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawXrayItem")
            .field("label", &self.label)
            .field(
                "image_size",
                &format!("{}x{}", self.image.width(), self.image.height()),
            )
            .finish()
    }
}

fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb.set_message(message);
    pb
}

/// Validation dataset holding preprocessed tensors in memory
#[derive(Debug, Clone)]
pub struct XrayBurnDataset {
    items: Vec<XrayItem>,
}

impl XrayBurnDataset {
    /// Load and preprocess every sample in parallel
    pub fn new_cached(samples: &[(PathBuf, usize)], image_size: usize) -> Result<Self> {
        let pb = progress_bar(samples.len(), "Caching");

        let items = samples
            .par_iter()
            .map(|(path, label)| {
                let item = XrayItem::from_path(path, *label, image_size);
                pb.inc(1);
                item
            })
            .collect::<Result<Vec<_>>>()?;

        pb.finish_and_clear();
        Ok(Self { items })
    }

    /// Build from already preprocessed items
    pub fn from_items(items: Vec<XrayItem>) -> Self {
        Self { items }
    }
}

impl Dataset<XrayItem> for XrayBurnDataset {
    fn get(&self, index: usize) -> Option<XrayItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Training dataset holding decoded images for augmentation
#[derive(Clone)]
pub struct RawXrayDataset {
    items: Vec<RawXrayItem>,
}

impl std::fmt::Debug for RawXrayDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawXrayDataset")
            .field("len", &self.items.len())
            .finish()
    }
}

impl RawXrayDataset {
    /// Decode every sample in parallel
    pub fn new_cached(samples: &[(PathBuf, usize)]) -> Result<Self> {
        let pb = progress_bar(samples.len(), "Decoding");

        let items = samples
            .par_iter()
            .map(|(path, label)| {
                let item = load_image(path).map(|image| RawXrayItem {
                    image,
                    label: *label,
                });
                pb.inc(1);
                item
            })
            .collect::<Result<Vec<_>>>()?;

        pb.finish_and_clear();
        Ok(Self { items })
    }

    /// Build from already decoded items
    pub fn from_items(items: Vec<RawXrayItem>) -> Self {
        Self { items }
    }
}

impl Dataset<RawXrayItem> for RawXrayDataset {
    fn get(&self, index: usize) -> Option<RawXrayItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// A batch of X-ray images
#[derive(Clone, Debug)]
pub struct XrayBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Binary targets with shape [batch_size, 1]
    pub targets: Tensor<B, 2, Int>,
}

fn build_batch<B: Backend>(
    images_data: Vec<f32>,
    labels: Vec<i64>,
    image_size: usize,
    device: &B::Device,
) -> XrayBatch<B> {
    let batch_size = labels.len();

    let images = Tensor::<B, 4>::from_floats(
        TensorData::new(images_data, [batch_size, 3, image_size, image_size]),
        device,
    );
    let targets =
        Tensor::<B, 2, Int>::from_data(TensorData::new(labels, [batch_size, 1]), device);

    XrayBatch { images, targets }
}

/// Batcher for preprocessed items (no augmentation)
#[derive(Clone, Debug)]
pub struct XrayBatcher {
    image_size: usize,
}

impl XrayBatcher {
    /// Create a batcher for the given image size
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, XrayItem, XrayBatch<B>> for XrayBatcher {
    fn batch(&self, items: Vec<XrayItem>, device: &B::Device) -> XrayBatch<B> {
        let labels: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let images_data: Vec<f32> = items.into_iter().flat_map(|item| item.image).collect();

        build_batch(images_data, labels, self.image_size, device)
    }
}

/// Batcher that augments raw images before rescaling
#[derive(Clone, Debug)]
pub struct AugmentingBatcher {
    image_size: usize,
    augmenter: Augmenter,
    seed: u64,
}

impl AugmentingBatcher {
    /// Create an augmenting batcher
    pub fn new(image_size: usize, config: AugmentationConfig, seed: u64) -> Self {
        Self {
            image_size,
            augmenter: Augmenter::new(config, image_size as u32),
            seed,
        }
    }

    /// Batch with an explicit RNG so training runs are reproducible
    pub fn batch_with_rng<B: Backend>(
        &self,
        items: Vec<RawXrayItem>,
        rng: &mut ChaCha8Rng,
        device: &B::Device,
    ) -> XrayBatch<B> {
        let mut images_data =
            Vec::with_capacity(items.len() * 3 * self.image_size * self.image_size);
        let mut labels = Vec::with_capacity(items.len());

        for item in items {
            images_data.extend(self.augmenter.preprocess(item.image, Some(&mut *rng)));
            labels.push(item.label as i64);
        }

        build_batch(images_data, labels, self.image_size, device)
    }
}

impl<B: Backend> Batcher<B, RawXrayItem, XrayBatch<B>> for AugmentingBatcher {
    fn batch(&self, items: Vec<RawXrayItem>, device: &B::Device) -> XrayBatch<B> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.batch_with_rng(items, &mut rng, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray;

    fn raw_item(label: usize) -> RawXrayItem {
        RawXrayItem {
            image: DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 30, Rgb([255, 128, 0]))),
            label,
        }
    }

    #[test]
    fn test_xray_batcher_shapes() {
        let items = vec![
            XrayItem {
                image: vec![0.5; 3 * 16 * 16],
                label: 0,
            },
            XrayItem {
                image: vec![1.0; 3 * 16 * 16],
                label: 1,
            },
        ];

        let device = Default::default();
        let batch: XrayBatch<TestBackend> = XrayBatcher::new(16).batch(items, &device);

        assert_eq!(batch.images.dims(), [2, 3, 16, 16]);
        assert_eq!(batch.targets.dims(), [2, 1]);

        let targets: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(targets, vec![0, 1]);
    }

    #[test]
    fn test_augmenting_batcher_resizes() {
        let device = Default::default();
        let batcher = AugmentingBatcher::new(16, AugmentationConfig::default(), 1);
        let batch: XrayBatch<TestBackend> = batcher.batch(vec![raw_item(0), raw_item(1)], &device);

        assert_eq!(batch.images.dims(), [2, 3, 16, 16]);
        let max: f32 = batch.images.max().into_scalar();
        assert!(max <= 1.0);
    }

    #[test]
    fn test_in_memory_datasets() {
        let raw = RawXrayDataset::from_items(vec![raw_item(0), raw_item(1), raw_item(1)]);
        assert_eq!(raw.len(), 3);
        assert_eq!(raw.get(2).map(|i| i.label), Some(1));
        assert!(raw.get(3).is_none());

        let cached = XrayBurnDataset::from_items(vec![XrayItem {
            image: vec![0.0; 3],
            label: 0,
        }]);
        assert_eq!(cached.len(), 1);
    }
}
