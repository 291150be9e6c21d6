//! Image preprocessing for inference
//!
//! Turns an uploaded JPEG/PNG into the `[1, 3, S, S]` tensor the network
//! expects: decode, convert to 8-bit RGB, resize, rescale to [0, 1].
//!
//! Grayscale, grayscale+alpha, RGBA and 16-bit images are converted to RGB
//! (alpha is dropped). Anything that is not a decodable JPEG or PNG is
//! rejected with `XrayError::InvalidInput`.

use std::path::Path;

use image::{imageops::FilterType, DynamicImage, ImageFormat, RgbImage};

use crate::utils::error::{Result, XrayError};
use crate::IMAGE_SIZE;

/// Formats accepted from operators
pub const ACCEPTED_FORMATS: [ImageFormat; 2] = [ImageFormat::Jpeg, ImageFormat::Png];

/// A single-image batch in CHW order
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    shape: [usize; 4],
}

impl ImageTensor {
    /// Wrap raw data, checking it matches the shape
    pub fn new(data: Vec<f32>, shape: [usize; 4]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(XrayError::Inference(format!(
                "tensor data has {} values but shape {:?} needs {}",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Self { data, shape })
    }

    /// Shape as [batch, channels, height, width]
    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    /// Flattened values
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Consume into the flattened values
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// Convert an RGB image to CHW float data normalized to [0, 1]
pub fn image_to_chw(rgb: &RgbImage) -> Vec<f32> {
    let (width, height) = rgb.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (i, pixel) in rgb.pixels().enumerate() {
        data[i] = pixel[0] as f32 / 255.0;
        data[plane + i] = pixel[1] as f32 / 255.0;
        data[2 * plane + i] = pixel[2] as f32 / 255.0;
    }

    data
}

/// Decode uploaded bytes, accepting only JPEG and PNG
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(XrayError::InvalidInput("uploaded file is empty".to_string()));
    }

    let format = image::guess_format(bytes)
        .map_err(|_| XrayError::InvalidInput("file is not a recognizable image".to_string()))?;

    if !ACCEPTED_FORMATS.contains(&format) {
        return Err(XrayError::InvalidInput(format!(
            "unsupported image format {:?}, expected JPEG or PNG",
            format
        )));
    }

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| XrayError::InvalidInput(format!("failed to decode image: {}", e)))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(XrayError::InvalidInput("image has no pixels".to_string()));
    }

    Ok(img)
}

/// Preprocessor producing tensors for a fixed square input size
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    image_size: u32,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            image_size: IMAGE_SIZE as u32,
        }
    }
}

impl Preprocessor {
    /// Preprocessor for a custom input size
    pub fn with_image_size(image_size: u32) -> Self {
        Self { image_size }
    }

    /// Target side length
    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    /// Resize and rescale an already decoded image
    pub fn preprocess(&self, image: &DynamicImage) -> ImageTensor {
        let size = self.image_size;
        let rgb = if image.width() == size && image.height() == size {
            image.to_rgb8()
        } else {
            image.resize_exact(size, size, FilterType::Triangle).to_rgb8()
        };

        let size = size as usize;
        ImageTensor {
            data: image_to_chw(&rgb),
            shape: [1, 3, size, size],
        }
    }

    /// Decode and preprocess uploaded bytes
    pub fn preprocess_bytes(&self, bytes: &[u8]) -> Result<ImageTensor> {
        let image = decode_image(bytes)?;
        Ok(self.preprocess(&image))
    }

    /// Read, decode and preprocess an image file
    pub fn preprocess_file(&self, path: &Path) -> Result<ImageTensor> {
        let bytes = std::fs::read(path).map_err(|e| {
            XrayError::InvalidInput(format!("failed to read {}: {}", path.display(), e))
        })?;
        self.preprocess_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn tensor_to_image(tensor: &ImageTensor) -> RgbImage {
        let [_, _, h, w] = tensor.shape();
        let plane = h * w;
        let data = tensor.data();
        RgbImage::from_fn(w as u32, h as u32, |x, y| {
            let i = y as usize * w + x as usize;
            let px = |c: usize| (data[c * plane + i] * 255.0).round() as u8;
            Rgb([px(0), px(1), px(2)])
        })
    }

    #[test]
    fn test_shape_and_range() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 120, Rgb([255, 0, 51])));
        let tensor = Preprocessor::default().preprocess(&img);

        assert_eq!(tensor.shape(), [1, 3, 224, 224]);
        assert_eq!(tensor.data().len(), 3 * 224 * 224);
        assert!(tensor.data().iter().all(|v| (0.0..=1.0).contains(v)));

        let plane = 224 * 224;
        assert!((tensor.data()[0] - 1.0).abs() < 1e-6);
        assert!(tensor.data()[plane].abs() < 1e-6);
        assert!((tensor.data()[2 * plane] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_preprocessing_is_idempotent_on_normalized_input() {
        let img = RgbImage::from_fn(224, 224, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let pre = Preprocessor::default();

        let first = pre.preprocess(&DynamicImage::ImageRgb8(img));
        let second = pre.preprocess(&DynamicImage::ImageRgb8(tensor_to_image(&first)));

        assert_eq!(first.shape(), second.shape());
        for (a, b) in first.data().iter().zip(second.data()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_grayscale_is_expanded_to_rgb() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(50, 50, Luma([102])));
        let bytes = encode(&gray, ImageFormat::Png);

        let tensor = Preprocessor::with_image_size(32).preprocess_bytes(&bytes).unwrap();
        assert_eq!(tensor.shape(), [1, 3, 32, 32]);

        let plane = 32 * 32;
        for c in 0..3 {
            assert!((tensor.data()[c * plane] - 0.4).abs() < 1e-6);
        }
    }

    #[test]
    fn test_alpha_channel_is_dropped() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 255, 0, 10])));
        let bytes = encode(&rgba, ImageFormat::Png);

        let tensor = Preprocessor::with_image_size(10).preprocess_bytes(&bytes).unwrap();
        assert_eq!(tensor.shape(), [1, 3, 10, 10]);
        assert!((tensor.data()[100] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_jpeg_is_accepted() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 40, Rgb([90, 90, 90])));
        let bytes = encode(&img, ImageFormat::Jpeg);
        assert!(decode_image(&bytes).is_ok());
    }

    #[test]
    fn test_rejects_empty_and_garbage() {
        assert!(matches!(
            decode_image(&[]),
            Err(XrayError::InvalidInput(_))
        ));
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(XrayError::InvalidInput(_))
        ));

        // valid PNG signature, truncated body
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 40, Rgb([1, 2, 3])));
        let bytes = encode(&img, ImageFormat::Png);
        assert!(matches!(
            decode_image(&bytes[..20]),
            Err(XrayError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_unsupported_format() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])));
        let bytes = encode(&img, ImageFormat::Bmp);
        let err = decode_image(&bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn test_image_tensor_shape_check() {
        assert!(ImageTensor::new(vec![0.0; 12], [1, 3, 2, 2]).is_ok());
        assert!(matches!(
            ImageTensor::new(vec![0.0; 5], [1, 3, 2, 2]),
            Err(XrayError::Inference(_))
        ));
    }
}
