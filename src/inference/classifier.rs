//! Classifier invocation
//!
//! `Classifier` is the seam between the serving flow and the tensor engine.
//! `BurnClassifier` loads a trained `XrayNet` once and runs one forward pass
//! per request.

use std::path::Path;
use std::sync::Mutex;

use burn::{
    config::Config,
    module::Module,
    record::CompactRecorder,
    tensor::{backend::Backend, Tensor, TensorData},
};
use tracing::{debug, info};

use crate::inference::preprocess::ImageTensor;
use crate::model::{config_path, weights_path, XrayNet, XrayNetConfig};
use crate::utils::error::{Result, XrayError};

/// A binary classifier producing the sigmoid score of one image
pub trait Classifier: Send + Sync {
    /// Score in [0, 1] for a `[1, 3, S, S]` tensor
    fn predict(&self, image: &ImageTensor) -> Result<f32>;

    /// Side length of the expected input
    fn input_size(&self) -> usize;
}

/// Classifier backed by a trained Burn model
pub struct BurnClassifier<B: Backend> {
    model: Mutex<XrayNet<B>>,
    device: B::Device,
    input_size: usize,
}

impl<B: Backend> BurnClassifier<B> {
    /// Load weights (and the architecture sidecar when present)
    ///
    /// `model_path` may be given with or without the `.mpk` extension.
    pub fn load(model_path: &Path, device: &B::Device) -> Result<Self> {
        let weights = weights_path(model_path);
        if !weights.is_file() {
            return Err(XrayError::ModelLoad(weights, "file not found".to_string()));
        }

        let sidecar = config_path(model_path);
        let config = if sidecar.is_file() {
            debug!("Reading model config from {:?}", sidecar);
            XrayNetConfig::load(&sidecar)
                .map_err(|e| XrayError::ModelLoad(sidecar.clone(), e.to_string()))?
        } else {
            debug!("No model config at {:?}, using defaults", sidecar);
            XrayNetConfig::new()
        };
        config
            .validate()
            .map_err(|e| XrayError::ModelLoad(sidecar, e.to_string()))?;

        let model = config
            .init::<B>(device)
            .load_file(weights.clone(), &CompactRecorder::new(), device)
            .map_err(|e| XrayError::ModelLoad(weights.clone(), format!("{:?}", e)))?;

        info!(
            "Loaded model from {:?} (input {}x{})",
            weights, config.input_size, config.input_size
        );

        Ok(Self::from_model(model, device.clone()))
    }

    /// Wrap an already built model
    pub fn from_model(model: XrayNet<B>, device: B::Device) -> Self {
        let input_size = model.input_size();
        Self {
            model: Mutex::new(model),
            device,
            input_size,
        }
    }

    fn expected_shape(&self) -> [usize; 4] {
        [1, 3, self.input_size, self.input_size]
    }
}

impl<B: Backend> Classifier for BurnClassifier<B> {
    fn predict(&self, image: &ImageTensor) -> Result<f32> {
        let shape = image.shape();
        if shape != self.expected_shape() {
            return Err(XrayError::Inference(format!(
                "expected input shape {:?}, got {:?}",
                self.expected_shape(),
                shape
            )));
        }

        let input = Tensor::<B, 4>::from_floats(
            TensorData::new(image.data().to_vec(), shape),
            &self.device,
        );

        let output = {
            let model = self
                .model
                .lock()
                .map_err(|_| XrayError::Inference("model lock poisoned".to_string()))?;
            model.forward_probability(input)
        };

        let values = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| XrayError::Inference(format!("{:?}", e)))?;

        let score = values
            .first()
            .copied()
            .ok_or_else(|| XrayError::Inference("model returned no output".to_string()))?;

        if !score.is_finite() {
            return Err(XrayError::Inference(format!(
                "model returned non-finite score {}",
                score
            )));
        }

        Ok(score)
    }

    fn input_size(&self) -> usize {
        self.input_size
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Classifier returning a fixed score, for session and route tests
    pub struct FixedScore {
        pub score: f32,
        pub input_size: usize,
    }

    impl FixedScore {
        pub fn new(score: f32) -> Self {
            Self {
                score,
                input_size: crate::IMAGE_SIZE,
            }
        }
    }

    impl Classifier for FixedScore {
        fn predict(&self, image: &ImageTensor) -> Result<f32> {
            let expected = [1, 3, self.input_size, self.input_size];
            if image.shape() != expected {
                return Err(XrayError::Inference("shape mismatch".to_string()));
            }
            Ok(self.score)
        }

        fn input_size(&self) -> usize {
            self.input_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use std::path::PathBuf;

    type TestBackend = NdArray;

    fn small_config() -> XrayNetConfig {
        // 32 -> 30 -> 15 -> 13 -> 6 -> 4 -> 2
        XrayNetConfig::new()
            .with_input_size(32)
            .with_base_filters(4)
            .with_hidden_units(8)
    }

    fn save_small_model(dir: &Path) -> PathBuf {
        let device = Default::default();
        let config = small_config();
        let model: XrayNet<TestBackend> = config.init(&device);

        let path = dir.join("covid_model");
        model
            .save_file(path.clone(), &CompactRecorder::new())
            .unwrap();
        config.save(config_path(&path)).unwrap();
        path
    }

    #[test]
    fn test_load_and_predict() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_small_model(dir.path());

        let classifier = BurnClassifier::<TestBackend>::load(&path, &Default::default()).unwrap();
        assert_eq!(classifier.input_size(), 32);

        let image = ImageTensor::new(vec![0.5; 3 * 32 * 32], [1, 3, 32, 32]).unwrap();
        let score = classifier.predict(&image).unwrap();
        assert!((0.0..=1.0).contains(&score));

        // dropout is inactive outside autodiff, so repeated passes agree
        let again = classifier.predict(&image).unwrap();
        assert!((score - again).abs() < 1e-6);
    }

    #[test]
    fn test_load_accepts_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_small_model(dir.path());

        let with_ext = weights_path(&path);
        assert!(BurnClassifier::<TestBackend>::load(&with_ext, &Default::default()).is_ok());
    }

    #[test]
    fn test_shape_mismatch_is_inference_error() {
        let device = Default::default();
        let model: XrayNet<TestBackend> = small_config().init(&device);
        let classifier = BurnClassifier::from_model(model, device);

        let image = ImageTensor::new(vec![0.5; 3 * 16 * 16], [1, 3, 16, 16]).unwrap();
        assert!(matches!(
            classifier.predict(&image),
            Err(XrayError::Inference(_))
        ));
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let err = BurnClassifier::<TestBackend>::load(
            Path::new("/no/such/covid_model"),
            &Default::default(),
        )
        .err()
        .unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_corrupt_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken");
        std::fs::write(weights_path(&path), b"not a record").unwrap();

        let err = BurnClassifier::<TestBackend>::load(&path, &Default::default())
            .err()
            .unwrap();
        assert!(matches!(err, XrayError::ModelLoad(..)));
    }
}
