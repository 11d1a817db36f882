//! Utilities.
use anyhow::Result;
use candle_core::{Tensor, WithDType};
use ndarray::ArrayD;
use num_traits::AsPrimitive;
use std::convert::TryFrom;

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> i64;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: i64);
}

/// Converts a vector into a tensor, optionally adding a batch dimension.
pub fn vec_to_tensor<T1, T2>(v: Vec<T1>, add_batch_dim: bool) -> Result<Tensor>
where
    T1: AsPrimitive<T2>,
    T2: WithDType,
{
    let v = v.iter().map(|e| e.as_()).collect::<Vec<_>>();
    let t: Tensor = TryFrom::<Vec<T2>>::try_from(v)?;

    match add_batch_dim {
        true => Ok(t.unsqueeze(0)?),
        false => Ok(t),
    }
}

/// Converts an ndarray into a tensor, optionally adding a batch dimension.
pub fn arrayd_to_tensor<T1, T2>(a: ArrayD<T1>, add_batch_dim: bool) -> Result<Tensor>
where
    T1: AsPrimitive<T2>,
    T2: WithDType,
{
    let shape = a.shape();
    let v = a.iter().map(|e| e.as_()).collect::<Vec<_>>();
    let t: Tensor = TryFrom::<Vec<T2>>::try_from(v)?;
    let t = t.reshape(shape)?;

    match add_batch_dim {
        true => Ok(t.unsqueeze(0)?),
        false => Ok(t),
    }
}

/// Converts a tensor into an ndarray, optionally removing the batch
/// dimension.
pub fn tensor_to_arrayd<T>(t: Tensor, delete_batch_dim: bool) -> Result<ArrayD<T>>
where
    T: WithDType,
{
    let shape = match delete_batch_dim {
        false => t.dims()[..].iter().map(|x| *x as usize).collect::<Vec<_>>(),
        true => t.dims()[1..]
            .iter()
            .map(|x| *x as usize)
            .collect::<Vec<_>>(),
    };
    let v: Vec<T> = t.flatten_all()?.to_vec1()?;

    Ok(ndarray::Array1::<T>::from(v).into_shape(ndarray::IxDyn(&shape))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn arrayd_tensor_conversion() -> Result<()> {
        let a = array![[1.0f32, 2.0], [3.0, 4.0]].into_dyn();

        let t = arrayd_to_tensor::<_, f32>(a.clone(), true)?;
        assert_eq!(t.dims(), &[1, 2, 2]);

        let b = tensor_to_arrayd::<f32>(t, true)?;
        assert_eq!(a, b);

        Ok(())
    }

    #[test]
    fn vec_to_tensor_casts() -> Result<()> {
        let t = vec_to_tensor::<u8, f32>(vec![0, 128, 255], false)?;
        assert_eq!(t.dims(), &[3]);
        assert_eq!(t.to_vec1::<f32>()?, vec![0.0, 128.0, 255.0]);

        Ok(())
    }
}
