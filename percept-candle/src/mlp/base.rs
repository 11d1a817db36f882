use super::{mlp_forward, MlpConfig};
use crate::model::{SubModel1, SubModel2};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};

/// Returns vector of linear modules from [`MlpConfig`].
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut dims = vec![config.in_dim];
    dims.extend_from_slice(&config.units);
    dims.push(config.out_dim);
    let vs = vs.pp(prefix);

    dims.windows(2)
        .enumerate()
        .map(|(i, d)| Ok(linear(d[0] as _, d[1] as _, vs.pp(format!("ln{}", i)))?))
        .collect()
}

/// Multilayer perceptron with ReLU hidden layers.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
}

fn _build(vs: VarBuilder, config: MlpConfig) -> Mlp {
    let device = vs.device().clone();
    let layers = create_linear_layers("mlp", vs, &config).unwrap();

    Mlp {
        config,
        device,
        layers,
    }
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Tensor {
        let xs = xs.to_device(&self.device).unwrap();
        mlp_forward(xs, &self.layers, &self.config.activation_out)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Self {
        _build(vs, config)
    }
}

impl SubModel2 for Mlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Self::Output {
        let input1: Tensor = input1.to_device(&self.device).unwrap();
        let input2: Tensor = input2.to_device(&self.device).unwrap();
        let input = Tensor::cat(&[input1, input2], D::Minus1).unwrap();
        mlp_forward(input, &self.layers, &self.config.activation_out)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Self {
        _build(vs, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Activation;
    use candle_core::DType;
    use candle_nn::{VarBuilder, VarMap};

    fn vb() -> (VarMap, VarBuilder<'static>) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        (varmap, vb)
    }

    #[test]
    fn output_dim_matches_config() -> Result<()> {
        let (_varmap, vb) = vb();
        let config = MlpConfig::new(6, vec![16, 16], 3, Activation::None);
        let mlp = <Mlp as SubModel1>::build(vb, config);

        let xs = Tensor::randn(0f32, 1f32, (7, 6), &Device::Cpu)?;
        let ys = SubModel1::forward(&mlp, &xs);
        assert_eq!(ys.dims(), &[7, 3]);

        Ok(())
    }

    #[test]
    fn no_hidden_layers() -> Result<()> {
        let (_varmap, vb) = vb();
        let config = MlpConfig::new(4, vec![], 2, Activation::None);
        let mlp = <Mlp as SubModel1>::build(vb, config);

        let xs = Tensor::randn(0f32, 1f32, (1, 4), &Device::Cpu)?;
        let ys = SubModel1::forward(&mlp, &xs);
        assert_eq!(ys.dims(), &[1, 2]);

        Ok(())
    }

    #[test]
    fn two_inputs_concatenated() -> Result<()> {
        let (_varmap, vb) = vb();
        let config = MlpConfig::new(5, vec![8], 2, Activation::None);
        let mlp1 = <Mlp as SubModel1>::build(vb.clone(), config.clone());
        let mlp2 = <Mlp as SubModel2>::build(vb, config);

        let x1 = Tensor::randn(0f32, 1f32, (3, 2), &Device::Cpu)?;
        let x2 = Tensor::randn(0f32, 1f32, (3, 3), &Device::Cpu)?;
        let cat = Tensor::cat(&[x1.clone(), x2.clone()], D::Minus1)?;

        // Both models share variables through the same builder.
        let y1 = SubModel1::forward(&mlp1, &cat);
        let y2 = SubModel2::forward(&mlp2, &x1, &x2);
        let diff = (y1 - y2)?.abs()?.sum_all()?.to_scalar::<f32>()?;
        assert!(diff < 1e-6);

        Ok(())
    }

    #[test]
    fn relu_output_is_nonnegative() -> Result<()> {
        let (_varmap, vb) = vb();
        let config = MlpConfig::new(4, vec![8], 6, Activation::ReLU);
        let mlp = <Mlp as SubModel1>::build(vb, config);

        let xs = Tensor::randn(0f32, 1f32, (16, 4), &Device::Cpu)?;
        let ys = SubModel1::forward(&mlp, &xs);
        let min = ys.flatten_all()?.min(0)?.to_scalar::<f32>()?;
        assert!(min >= 0.0);

        Ok(())
    }
}
