use crate::util::OutDim;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    str::FromStr,
};
use thiserror::Error;

/// Errors raised when assembling a [`ConvNet`](super::ConvNet).
#[derive(Debug, Error)]
pub enum ConvNetError {
    #[error("unknown data format: {0:?} (expected \"channels_last\" or \"channels_first\")")]
    UnknownDataFormat(String),

    #[error(
        "convolution stage lists differ in length: \
         {filters} filters, {kernels} kernels, {pools} pool sizes, {strides} pool strides"
    )]
    StageLengthMismatch {
        filters: usize,
        kernels: usize,
        pools: usize,
        strides: usize,
    },

    #[error("image collapses to zero spatial size at stage {stage}")]
    EmptyConvOutput { stage: usize },
}

/// Layout of the image dimensions in [`ConvNetConfig::image_shape`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum DataFormat {
    /// `(height, width, channels)`.
    #[serde(rename = "channels_last")]
    ChannelsLast,

    /// `(channels, height, width)`.
    #[serde(rename = "channels_first")]
    ChannelsFirst,
}

impl FromStr for DataFormat {
    type Err = ConvNetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "channels_last" => Ok(Self::ChannelsLast),
            "channels_first" => Ok(Self::ChannelsFirst),
            _ => Err(ConvNetError::UnknownDataFormat(s.into())),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`ConvNet`](super::ConvNet).
///
/// The four stage lists (`conv_filters`, `conv_kernel_sizes`, `pool_sizes`,
/// `pool_strides`) are consumed pairwise in order and must have equal
/// length. Kernels and pooling windows are square. Convolutions use
/// same-size padding, which preserves the spatial dimensions for odd
/// kernel sizes.
pub struct ConvNetConfig {
    pub(super) in_dim: i64,
    pub(super) image_shape: [i64; 3],
    pub(super) data_format: DataFormat,
    pub(super) conv_filters: Vec<i64>,
    pub(super) conv_kernel_sizes: Vec<i64>,
    pub(super) pool_sizes: Vec<i64>,
    pub(super) pool_strides: Vec<i64>,
    pub(super) dense_units: Vec<i64>,
    pub(super) out_dim: i64,
}

impl ConvNetConfig {
    /// Creates the configuration with default convolution stages.
    ///
    /// * `in_dim` - Total feature dimension of the concatenated observation
    ///   vector, of which the trailing `H * W * C` positions are the
    ///   flattened image.
    /// * `image_shape` - Image dimensions, interpreted per
    ///   [`DataFormat::ChannelsLast`] until changed with
    ///   [`data_format`](Self::data_format).
    /// * `out_dim` - Size of the output embedding.
    pub fn new(in_dim: i64, image_shape: [i64; 3], out_dim: i64) -> Self {
        Self {
            in_dim,
            image_shape,
            data_format: DataFormat::ChannelsLast,
            conv_filters: vec![32, 32],
            conv_kernel_sizes: vec![5, 5],
            pool_sizes: vec![2, 2],
            pool_strides: vec![2, 2],
            dense_units: vec![64, 64],
            out_dim,
        }
    }

    /// Sets the image data format.
    pub fn data_format(mut self, v: DataFormat) -> Self {
        self.data_format = v;
        self
    }

    /// Sets the number of filters of each convolution stage.
    pub fn conv_filters(mut self, v: Vec<i64>) -> Self {
        self.conv_filters = v;
        self
    }

    /// Sets the (square) kernel size of each convolution stage.
    pub fn conv_kernel_sizes(mut self, v: Vec<i64>) -> Self {
        self.conv_kernel_sizes = v;
        self
    }

    /// Sets the (square) pooling window of each stage.
    pub fn pool_sizes(mut self, v: Vec<i64>) -> Self {
        self.pool_sizes = v;
        self
    }

    /// Sets the pooling stride of each stage.
    pub fn pool_strides(mut self, v: Vec<i64>) -> Self {
        self.pool_strides = v;
        self
    }

    /// Sets the hidden layer sizes of the dense head.
    pub fn dense_units(mut self, v: Vec<i64>) -> Self {
        self.dense_units = v;
        self
    }

    /// Image dimensions as `(channels, height, width)`.
    pub fn chw(&self) -> (i64, i64, i64) {
        let s = &self.image_shape;
        match self.data_format {
            DataFormat::ChannelsLast => (s[2], s[0], s[1]),
            DataFormat::ChannelsFirst => (s[0], s[1], s[2]),
        }
    }

    /// Length of the flattened image, `H * W * C`.
    pub fn image_dim(&self) -> i64 {
        self.image_shape.iter().product()
    }

    pub(super) fn validate_stages(&self) -> Result<(), ConvNetError> {
        let (filters, kernels, pools, strides) = (
            self.conv_filters.len(),
            self.conv_kernel_sizes.len(),
            self.pool_sizes.len(),
            self.pool_strides.len(),
        );
        if filters != kernels || filters != pools || filters != strides {
            return Err(ConvNetError::StageLengthMismatch {
                filters,
                kernels,
                pools,
                strides,
            });
        }
        Ok(())
    }

    /// Length of the flattened output of the last convolution stage.
    pub fn conv_out_dim(&self) -> Result<i64, ConvNetError> {
        self.validate_stages()?;
        let (mut channels, mut h, mut w) = self.chw();

        for stage in 0..self.conv_filters.len() {
            let k = self.conv_kernel_sizes[stage];
            let pool = self.pool_sizes[stage];
            let stride = self.pool_strides[stage];

            // Same padding: out = in + 2 * (k / 2) - k + 1.
            h = h + 2 * (k / 2) - k + 1;
            w = w + 2 * (k / 2) - k + 1;
            if h < pool || w < pool {
                return Err(ConvNetError::EmptyConvOutput { stage });
            }
            h = (h - pool) / stride + 1;
            w = (w - pool) / stride + 1;
            channels = self.conv_filters[stage];
        }

        Ok(channels * h * w)
    }

    /// Constructs [`ConvNetConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load convnet preprocessor config: {}", path_.display());
        Ok(b)
    }

    /// Saves [`ConvNetConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save convnet preprocessor config: {}", path_.display());
        Ok(())
    }
}

impl OutDim for ConvNetConfig {
    fn get_out_dim(&self) -> i64 {
        self.out_dim
    }

    fn set_out_dim(&mut self, v: i64) {
        self.out_dim = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn data_format_from_str() {
        assert_eq!(
            "channels_last".parse::<DataFormat>().unwrap(),
            DataFormat::ChannelsLast
        );
        assert_eq!(
            "channels_first".parse::<DataFormat>().unwrap(),
            DataFormat::ChannelsFirst
        );
        assert!(matches!(
            "channels_middle".parse::<DataFormat>(),
            Err(ConvNetError::UnknownDataFormat(_))
        ));
    }

    #[test]
    fn chw_resolves_layout() {
        let config = ConvNetConfig::new(22, [2, 3, 4], 5);
        assert_eq!(config.chw(), (4, 2, 3));

        let config = config.data_format(DataFormat::ChannelsFirst);
        assert_eq!(config.chw(), (2, 3, 4));
    }

    #[test]
    fn conv_out_dim_default_stages() {
        // 32x32x3: both stages preserve H/W (kernel 5, same padding),
        // pooling halves them twice.
        let config = ConvNetConfig::new(3072, [32, 32, 3], 5);
        assert_eq!(config.conv_out_dim().unwrap(), 8 * 8 * 32);
    }

    #[test]
    fn conv_out_dim_rejects_mismatched_stages() {
        let config = ConvNetConfig::new(3072, [32, 32, 3], 5).conv_filters(vec![32, 32, 64]);
        assert!(matches!(
            config.conv_out_dim(),
            Err(ConvNetError::StageLengthMismatch { .. })
        ));
    }

    #[test]
    fn conv_out_dim_rejects_collapsed_image() {
        let config = ConvNetConfig::new(22, [2, 2, 3], 5)
            .conv_filters(vec![4, 4])
            .conv_kernel_sizes(vec![3, 3])
            .pool_sizes(vec![2, 2])
            .pool_strides(vec![2, 2]);
        assert!(matches!(
            config.conv_out_dim(),
            Err(ConvNetError::EmptyConvOutput { stage: 1 })
        ));
    }

    #[test]
    fn yaml_roundtrip() -> Result<()> {
        let dir = TempDir::new("convnet_config")?;
        let path = dir.path().join("convnet.yaml");

        let config = ConvNetConfig::new(3082, [32, 32, 3], 16)
            .data_format(DataFormat::ChannelsFirst)
            .conv_filters(vec![16, 32])
            .dense_units(vec![128, 64]);
        config.save(&path)?;
        let loaded = ConvNetConfig::load(&path)?;
        assert_eq!(loaded, config);

        Ok(())
    }
}
