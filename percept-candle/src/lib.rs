//! Observation preprocessing networks for RL agents, implemented with
//! [candle](https://crates.io/crates/candle-core).
//!
//! The entry point is [`convnet::ConvNet`], which embeds a batch of mixed
//! observations (raw feature vectors plus one flattened image) into a
//! fixed-size vector. Its dense head, [`mlp::Mlp`], is usable on its own.
//! Both are built from serializable configs through the traits in
//! [`model`].
pub mod convnet;
pub mod mlp;
pub mod model;
pub mod util;
use candle_core::Tensor;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Activation function applied after a layer.
pub enum Activation {
    /// No activation (linear output).
    None,

    /// Rectified linear unit.
    ReLU,

    /// Hyperbolic tangent.
    Tanh,
}

impl Activation {
    /// Applies the activation function.
    pub fn forward(&self, xs: &Tensor) -> Tensor {
        match self {
            Self::None => xs.clone(),
            Self::ReLU => xs.relu().unwrap(),
            Self::Tanh => xs.tanh().unwrap(),
        }
    }
}
