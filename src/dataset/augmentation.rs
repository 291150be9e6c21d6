//! Data Augmentation Module for Chest X-Ray Training
//!
//! Random shear, zoom and horizontal flip applied on the fly to training
//! images. Validation and inference images are never augmented.
//!
//! The geometric transform maps each output pixel back into the source image
//! around the image center; samples falling outside are clamped to the
//! nearest edge pixel.

use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::inference::preprocess::image_to_chw;

/// Configuration for data augmentation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AugmentationConfig {
    /// Maximum shear angle in degrees (applies ±shear_range)
    pub shear_range: f32,
    /// Zoom factor range: each axis is scaled by a value in [1 - zoom_range, 1 + zoom_range]
    pub zoom_range: f32,
    /// Randomly mirror images left to right
    pub horizontal_flip: bool,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            shear_range: 0.2,
            zoom_range: 0.2,
            horizontal_flip: true,
        }
    }
}

impl AugmentationConfig {
    /// Disable all augmentations
    pub fn none() -> Self {
        Self {
            shear_range: 0.0,
            zoom_range: 0.0,
            horizontal_flip: false,
        }
    }

    /// Whether any geometric warp is configured
    fn has_warp(&self) -> bool {
        self.shear_range > 0.0 || self.zoom_range > 0.0
    }
}

/// Image augmenter that applies random transformations
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
    image_size: u32,
}

impl Augmenter {
    /// Create a new augmenter with the given configuration
    pub fn new(config: AugmentationConfig, image_size: u32) -> Self {
        Self { config, image_size }
    }

    /// Create an augmenter with the default training augmentation
    pub fn with_defaults(image_size: u32) -> Self {
        Self::new(AugmentationConfig::default(), image_size)
    }

    /// Create an augmenter with no augmentation (for validation/inference)
    pub fn no_augmentation(image_size: u32) -> Self {
        Self::new(AugmentationConfig::none(), image_size)
    }

    /// Apply the configured augmentations to an image
    pub fn augment(&self, img: &DynamicImage, rng: &mut ChaCha8Rng) -> DynamicImage {
        let mut rgb = img.to_rgb8();

        if self.config.has_warp() {
            let shear = if self.config.shear_range > 0.0 {
                rng.gen_range(-self.config.shear_range..=self.config.shear_range)
            } else {
                0.0
            };
            let (zoom_x, zoom_y) = if self.config.zoom_range > 0.0 {
                let range = (1.0 - self.config.zoom_range)..=(1.0 + self.config.zoom_range);
                (rng.gen_range(range.clone()), rng.gen_range(range))
            } else {
                (1.0, 1.0)
            };
            rgb = warp(&rgb, shear.to_radians(), zoom_x, zoom_y);
        }

        if self.config.horizontal_flip && rng.gen::<bool>() {
            rgb = image::imageops::flip_horizontal(&rgb);
        }

        DynamicImage::ImageRgb8(rgb)
    }

    /// Resize image to target size (always applied, not random)
    pub fn resize(&self, img: DynamicImage) -> DynamicImage {
        if img.width() == self.image_size && img.height() == self.image_size {
            return img;
        }
        img.resize_exact(
            self.image_size,
            self.image_size,
            image::imageops::FilterType::Triangle,
        )
    }

    /// Full preprocessing pipeline: augment (optional), resize, convert to CHW data in [0, 1]
    pub fn preprocess(&self, img: DynamicImage, rng: Option<&mut ChaCha8Rng>) -> Vec<f32> {
        let img = match rng {
            Some(rng) => self.augment(&img, rng),
            None => img,
        };

        image_to_chw(&self.resize(img).to_rgb8())
    }
}

/// Shear + zoom warp around the image center
fn warp(img: &RgbImage, shear: f32, zoom_x: f32, zoom_y: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;

    // [[1, -sin s], [0, cos s]] * [[zx, 0], [0, zy]]
    let m00 = zoom_x;
    let m01 = -shear.sin() * zoom_y;
    let m11 = shear.cos() * zoom_y;

    let mut output = ImageBuffer::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;

            let src_x = cx + m00 * dx + m01 * dy;
            let src_y = cy + m11 * dy;

            output.put_pixel(x, y, bilinear_sample(img, src_x, src_y));
        }
    }

    output
}

/// Sample a pixel using bilinear interpolation, clamping to the nearest edge
fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut result = [0u8; 3];
    for c in 0..3 {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;

        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}
