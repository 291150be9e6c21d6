//! Chest X-Ray Dataset Loader
//!
//! Scans one split directory (`Train/` or `Val/`) laid out as one
//! sub-directory per class. Class indices follow the alphabetical order of
//! the directory names, which makes `Covid` class 0 and `Normal` class 1.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::utils::error::{Result, XrayError};

/// Image extensions picked up by the loader
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// A single image sample with its label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index (0 or 1)
    pub label: usize,
    /// Class directory name
    pub class_name: String,
}

/// One split of the binary X-ray dataset
#[derive(Debug)]
pub struct XrayDataset {
    /// Root directory of the split
    pub root_dir: PathBuf,
    /// All samples, grouped by class in directory order
    pub samples: Vec<ImageSample>,
    /// Class names indexed by label
    pub class_names: Vec<String>,
}

impl XrayDataset {
    /// Load a split directory
    ///
    /// ```text
    /// root_dir/
    /// ├── Covid/
    /// │   ├── 4-x-day1.jpg
    /// │   └── ...
    /// └── Normal/
    ///     └── ...
    /// ```
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading X-ray dataset from: {:?}", root_dir);

        if !root_dir.is_dir() {
            return Err(XrayError::PathNotFound(root_dir));
        }

        let mut class_names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_names.push(name.to_string());
                }
            }
        }
        class_names.sort();

        if class_names.len() != crate::NUM_CLASSES {
            return Err(XrayError::Dataset(format!(
                "expected {} class directories in {:?}, found {:?}",
                crate::NUM_CLASSES,
                root_dir,
                class_names
            )));
        }

        let mut samples = Vec::new();
        for (label, class_name) in class_names.iter().enumerate() {
            let class_dir = root_dir.join(class_name);
            let before = samples.len();

            let mut paths: Vec<PathBuf> = WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| is_image_file(p))
                .collect();
            paths.sort();

            samples.extend(paths.into_iter().map(|path| ImageSample {
                path,
                label,
                class_name: class_name.clone(),
            }));

            debug!(
                "Class '{}' (label {}): {} samples",
                class_name,
                label,
                samples.len() - before
            );
        }

        info!("Loaded {} total samples", samples.len());

        Ok(Self {
            root_dir,
            samples,
            class_names,
        })
    }

    /// Get the number of samples in the dataset
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// (path, label) pairs for the Burn dataset
    pub fn labeled_paths(&self) -> Vec<(PathBuf, usize)> {
        self.samples
            .iter()
            .map(|s| (s.path.clone(), s.label))
            .collect()
    }

    /// Load and decode one sample
    pub fn load_image(&self, sample: &ImageSample) -> Result<DynamicImage> {
        load_image(&sample.path)
    }

    /// Get statistics about the dataset
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = BTreeMap::new();
        for name in &self.class_names {
            class_counts.insert(name.clone(), 0usize);
        }
        for sample in &self.samples {
            *class_counts.entry(sample.class_name.clone()).or_insert(0) += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            class_counts,
        }
    }
}

/// Whether a path has one of the accepted image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
}

/// Open and decode an image file
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .map_err(|e| XrayError::Dataset(format!("Failed to open image {:?}: {}", path, e)))?
        .with_guessed_format()
        .map_err(|e| XrayError::Dataset(format!("Failed to read image {:?}: {}", path, e)))?
        .decode()
        .map_err(|e| XrayError::Dataset(format!("Failed to decode image {:?}: {}", path, e)))
}

/// Statistics about one split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub class_counts: BTreeMap<String, usize>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self, title: &str) {
        println!("\n📊 {} ({} samples)", title, self.total_samples);

        for (name, count) in &self.class_counts {
            let pct = if self.total_samples == 0 {
                0.0
            } else {
                *count as f32 / self.total_samples as f32
            };
            let bar: String = "█".repeat((pct * 40.0) as usize);
            println!("    {:12} {:5} ({:5.1}%) {}", name, count, pct * 100.0, bar);
        }
    }
}
