use super::{ConvNetConfig, DataFormat};
use crate::{
    mlp::{Mlp, MlpConfig},
    model::{SubModel1, SubModel2},
    Activation,
};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::{conv::Conv2dConfig, conv2d, Conv2d, Module, VarBuilder};

/// Convolutional observation preprocessor.
///
/// Embeds a batch of observations into vectors of a fixed size. The
/// observation vector is the concatenation of auxiliary raw features and a
/// flattened image, with the image occupying the trailing `H * W * C`
/// positions. The image part is reshaped, passed through the configured
/// convolution + max-pooling stages (ReLU activations, same-size padding),
/// flattened, concatenated with the untouched raw features and fed to an
/// [`Mlp`] head with a linear output layer.
///
/// The positional split only works if the caller keeps the image last when
/// concatenating. Callers that hold raw features and image separately can
/// use the [`SubModel2`] impl instead, which takes the two parts as
/// distinct inputs and skips the split.
pub struct ConvNet {
    out_dim: i64,
    image_dim: i64,
    chw: (usize, usize, usize),
    data_format: DataFormat,
    convs: Vec<Conv2d>,
    pools: Vec<(usize, usize)>,
    head: Mlp,
    device: Device,
}

impl ConvNet {
    fn same_padding(k: i64) -> Conv2dConfig {
        Conv2dConfig {
            padding: (k / 2) as _,
            ..Default::default()
        }
    }

    fn create_convs(vb: &VarBuilder, config: &ConvNetConfig) -> Result<Vec<Conv2d>> {
        config.validate_stages()?;
        let vb = vb.pp("conv");
        let (mut in_channels, _, _) = config.chw();
        let mut convs = Vec::with_capacity(config.conv_filters.len());

        for (i, (&filters, &k)) in config
            .conv_filters
            .iter()
            .zip(&config.conv_kernel_sizes)
            .enumerate()
        {
            convs.push(conv2d(
                in_channels as _,
                filters as _,
                k as _,
                Self::same_padding(k),
                vb.pp(format!("c{}", i)),
            )?);
            in_channels = filters;
        }

        Ok(convs)
    }

    /// Size of the output embedding.
    pub fn out_dim(&self) -> i64 {
        self.out_dim
    }

    /// Length of the flattened image part, `H * W * C`.
    pub fn image_dim(&self) -> i64 {
        self.image_dim
    }

    /// Splits a concatenated observation batch into `(raw, image_flat)`.
    ///
    /// The image is the trailing [`image_dim`](Self::image_dim) positions
    /// along the feature axis; everything before it is raw features.
    pub fn split_obs(&self, xs: &Tensor) -> Result<(Tensor, Tensor)> {
        let n = xs.dim(D::Minus1)?;
        let raw_len = n - self.image_dim as usize;
        let raw = xs.narrow(D::Minus1, 0, raw_len)?;
        let image_flat = xs.narrow(D::Minus1, raw_len, self.image_dim as usize)?;
        Ok((raw, image_flat))
    }

    fn forward_image(&self, image_flat: &Tensor) -> Result<Tensor> {
        let batch = image_flat.dim(0)?;
        let (c, h, w) = self.chw;
        let mut xs = match self.data_format {
            DataFormat::ChannelsLast => image_flat
                .reshape((batch, h, w, c))?
                .permute((0, 3, 1, 2))?
                .contiguous()?,
            DataFormat::ChannelsFirst => image_flat.reshape((batch, c, h, w))?,
        };

        for (conv, &(pool, stride)) in self.convs.iter().zip(&self.pools) {
            xs = conv.forward(&xs)?.relu()?;
            xs = xs.max_pool2d_with_stride(pool, stride)?;
        }

        Ok(xs.flatten_from(1)?)
    }

    fn embed(&self, raw: &Tensor, image_flat: &Tensor) -> Result<Tensor> {
        let conv_flat = self.forward_image(image_flat)?;
        let xs = Tensor::cat(&[&conv_flat, raw], D::Minus1)?;
        Ok(<Mlp as SubModel1>::forward(&self.head, &xs))
    }

    /// Forward over a list of observation inputs.
    ///
    /// The inputs are concatenated along the feature axis; the flattened
    /// image must be the last element of `parts`.
    pub fn forward_parts(&self, parts: &[Tensor]) -> Tensor {
        let xs = Tensor::cat(parts, D::Minus1).unwrap();
        SubModel1::forward(self, &xs)
    }
}

fn _build(vb: VarBuilder, config: ConvNetConfig) -> ConvNet {
    let device = vb.device().clone();
    let convs = ConvNet::create_convs(&vb, &config).unwrap();
    let pools = config
        .pool_sizes
        .iter()
        .zip(&config.pool_strides)
        .map(|(&p, &s)| (p as usize, s as usize))
        .collect();
    let head = {
        let raw_dim = config.in_dim - config.image_dim();
        let head_in = config.conv_out_dim().unwrap() + raw_dim;
        let head_config = MlpConfig::new(
            head_in,
            config.dense_units.clone(),
            config.out_dim,
            Activation::None,
        );
        <Mlp as SubModel1>::build(vb.pp("dense"), head_config)
    };
    let (c, h, w) = config.chw();

    ConvNet {
        out_dim: config.out_dim,
        image_dim: config.image_dim(),
        chw: (c as usize, h as usize, w as usize),
        data_format: config.data_format,
        convs,
        pools,
        head,
        device,
    }
}

impl SubModel1 for ConvNet {
    type Config = ConvNetConfig;
    type Input = Tensor;
    type Output = Tensor;

    /// `xs` is the concatenated observation batch, image last.
    fn forward(&self, xs: &Self::Input) -> Tensor {
        let xs = xs.to_device(&self.device).unwrap();
        let (raw, image_flat) = self.split_obs(&xs).unwrap();
        self.embed(&raw, &image_flat).unwrap()
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Self {
        _build(vb, config)
    }
}

impl SubModel2 for ConvNet {
    type Config = ConvNetConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    /// `input1` is the raw-feature batch, `input2` the flattened image
    /// batch. No positional split is involved.
    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Self::Output {
        let raw = input1.to_device(&self.device).unwrap();
        let image_flat = input2.to_device(&self.device).unwrap();
        self.embed(&raw, &image_flat).unwrap()
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Self {
        _build(vb, config)
    }
}
