//! Interface of the neural networks in this crate.
use candle_nn::VarBuilder;

/// Neural network model taking a single input, not owning its `VarMap`.
///
/// Variables are created through the given [`VarBuilder`], so networks that
/// should share parameters can be built from the same builder.
///
/// [`VarBuilder`]: https://docs.rs/candle-nn/0.8.4/candle_nn/var_builder/type.VarBuilder.html
pub trait SubModel1 {
    /// Configuration from which the model is constructed.
    type Config;

    /// Input of the model.
    type Input;

    /// Output of the model.
    type Output;

    /// Builds the model with [`VarBuilder`] and [`SubModel1::Config`].
    ///
    /// [`VarBuilder`]: https://docs.rs/candle-nn/0.8.4/candle_nn/var_builder/type.VarBuilder.html
    fn build(vb: VarBuilder, config: Self::Config) -> Self;

    /// A generalized forward function.
    fn forward(&self, input: &Self::Input) -> Self::Output;
}

/// Neural network model taking two inputs, not owning its `VarMap`.
///
/// The difference from [`SubModel1`] is that this trait takes two inputs.
pub trait SubModel2 {
    /// Configuration from which the model is constructed.
    type Config;

    /// First input of the model.
    type Input1;

    /// Second input of the model.
    type Input2;

    /// Output of the model.
    type Output;

    /// Builds the model.
    fn build(vb: VarBuilder, config: Self::Config) -> Self;

    /// A generalized forward function.
    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Self::Output;
}
