//! CNN Model Architecture for Chest X-Ray Classification
//!
//! Three convolutional blocks followed by a small dense head producing one
//! logit per image. `sigmoid(logit)` is the probability of the second class
//! in alphabetical order (`Normal`), so scores above 0.5 read as COVID
//! negative.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};

use crate::utils::error::XrayError;

/// Number of convolutional blocks in the network
pub const NUM_CONV_BLOCKS: usize = 3;

/// Configuration for the XrayNet CNN model
#[derive(Config, Debug)]
pub struct XrayNetConfig {
    /// Input image size (square)
    #[config(default = "224")]
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Filters of the first block; each following block doubles it
    #[config(default = "32")]
    pub base_filters: usize,

    /// Convolution kernel size (valid padding)
    #[config(default = "3")]
    pub kernel_size: usize,

    /// Units in the hidden dense layer
    #[config(default = "64")]
    pub hidden_units: usize,

    /// Dropout after each convolutional block
    #[config(default = "0.25")]
    pub conv_dropout: f64,

    /// Dropout before the output layer
    #[config(default = "0.5")]
    pub dense_dropout: f64,
}

impl XrayNetConfig {
    /// Spatial size of the feature map after all convolutional blocks
    pub fn feature_map_size(&self) -> usize {
        let mut size = self.input_size;
        for _ in 0..NUM_CONV_BLOCKS {
            // valid conv then 2x2 max pool
            size = (size + 1).saturating_sub(self.kernel_size) / 2;
        }
        size
    }

    /// Length of the flattened feature vector fed to the dense head
    pub fn flattened_features(&self) -> usize {
        let map = self.feature_map_size();
        let channels = self.base_filters << (NUM_CONV_BLOCKS - 1);
        map * map * channels
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::utils::error::Result<()> {
        if self.in_channels == 0 || self.base_filters == 0 || self.hidden_units == 0 {
            return Err(XrayError::Config(
                "in_channels, base_filters and hidden_units must be positive".to_string(),
            ));
        }

        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err(XrayError::Config(
                "kernel_size must be a positive odd number".to_string(),
            ));
        }

        if self.feature_map_size() == 0 {
            return Err(XrayError::Config(format!(
                "input_size {} is too small for {} conv blocks",
                self.input_size, NUM_CONV_BLOCKS
            )));
        }

        for rate in [self.conv_dropout, self.dense_dropout] {
            if !(0.0..1.0).contains(&rate) {
                return Err(XrayError::Config(
                    "dropout rates must be in range [0.0, 1.0)".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Build the network on the given device
    pub fn init<B: Backend>(&self, device: &B::Device) -> XrayNet<B> {
        XrayNet::new(self, device)
    }
}

/// Conv2d (valid) -> ReLU -> MaxPool 2x2 -> Dropout
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub pool: MaxPool2d,
    pub dropout: Dropout,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        dropout: f64,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self {
            conv,
            pool,
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    /// Forward pass through the block
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = Relu::new().forward(x);
        let x = self.pool.forward(x);
        self.dropout.forward(x)
    }
}

/// Binary chest X-ray classifier
///
/// Architecture:
/// - 3 convolutional blocks (32, 64, 128 filters), the first one followed by
///   an extra dropout layer
/// - Flatten
/// - Dense(64) + ReLU + Dropout(0.5)
/// - Dense(1) logit
#[derive(Module, Debug)]
pub struct XrayNet<B: Backend> {
    pub block1: ConvBlock<B>,
    pub block1_dropout: Dropout,
    pub block2: ConvBlock<B>,
    pub block3: ConvBlock<B>,

    pub fc1: Linear<B>,
    pub dropout: Dropout,
    pub fc2: Linear<B>,

    input_size: usize,
}

impl<B: Backend> XrayNet<B> {
    /// Create a new XrayNet from configuration
    pub fn new(config: &XrayNetConfig, device: &B::Device) -> Self {
        let base = config.base_filters;
        let k = config.kernel_size;

        let block1 = ConvBlock::new(config.in_channels, base, k, config.conv_dropout, device);
        let block1_dropout = DropoutConfig::new(config.conv_dropout).init();
        let block2 = ConvBlock::new(base, base * 2, k, config.conv_dropout, device);
        let block3 = ConvBlock::new(base * 2, base * 4, k, config.conv_dropout, device);

        let fc1 = LinearConfig::new(config.flattened_features(), config.hidden_units).init(device);
        let dropout = DropoutConfig::new(config.dense_dropout).init();
        let fc2 = LinearConfig::new(config.hidden_units, 1).init(device);

        Self {
            block1,
            block1_dropout,
            block2,
            block3,
            fc1,
            dropout,
            fc2,
            input_size: config.input_size,
        }
    }

    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, 1]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.block1.forward(x);
        let x = self.block1_dropout.forward(x);
        let x = self.block2.forward(x);
        let x = self.block3.forward(x);

        // Flatten: [B, C, H, W] -> [B, C*H*W]
        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Forward pass returning sigmoid probabilities in [0, 1]
    pub fn forward_probability(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        sigmoid(self.forward(x))
    }

    /// Input image size the network was built for
    pub fn input_size(&self) -> usize {
        self.input_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_default_feature_size() {
        let config = XrayNetConfig::new();
        // 224 -> 222 -> 111 -> 109 -> 54 -> 52 -> 26
        assert_eq!(config.feature_map_size(), 26);
        assert_eq!(config.flattened_features(), 26 * 26 * 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = XrayNetConfig::new().with_input_size(8);
        assert!(config.validate().is_err());

        let config = XrayNetConfig::new().with_kernel_size(4);
        assert!(config.validate().is_err());

        let config = XrayNetConfig::new().with_dense_dropout(1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_shape_small_input() {
        let device = Default::default();
        let config = XrayNetConfig::new().with_input_size(32).with_base_filters(4);
        let model = config.init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 1]);
    }

    #[test]
    fn test_default_model_probability_range() {
        let device = Default::default();
        let model = XrayNetConfig::new().init::<TestBackend>(&device);
        assert_eq!(model.input_size(), 224);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 224, 224], &device);
        let probs: Vec<f32> = model
            .forward_probability(input)
            .into_data()
            .to_vec()
            .expect("float output");

        assert_eq!(probs.len(), 1);
        assert!((0.0..=1.0).contains(&probs[0]));
    }

    #[test]
    fn test_config_sidecar_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covid_model.json");

        let config = XrayNetConfig::new().with_input_size(64).with_hidden_units(16);
        config.save(&path).unwrap();

        let loaded = XrayNetConfig::load(&path).unwrap();
        assert_eq!(loaded.input_size, 64);
        assert_eq!(loaded.hidden_units, 16);
        assert_eq!(loaded.flattened_features(), config.flattened_features());
        assert!(loaded.validate().is_ok());
    }
}
