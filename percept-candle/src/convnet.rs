//! Convolutional observation preprocessor.
//!
//! [`ConvNet`] embeds a batch of mixed observations into a fixed-size
//! vector: the flattened image part is reshaped and run through a stack of
//! convolution + max-pooling stages, flattened again, concatenated with the
//! remaining raw features and passed through an [`Mlp`](crate::mlp::Mlp)
//! head.
mod base;
mod config;
pub use base::ConvNet;
pub use config::{ConvNetConfig, ConvNetError, DataFormat};
