use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView2};

use super::ParamInit;
use crate::backend::Backend;
use crate::error::{Error, Result};

/// Dense projection `y = x W (+ b)`.
///
/// `weight` is stored as (in_dim, out_dim) so inputs of shape (N, in_dim)
/// multiply it directly.
#[derive(Debug, Clone)]
pub struct Linear {
    /// Name used in dimension errors
    name: &'static str,
    weight: Array2<f32>,
    bias: Option<Array1<f32>>,
    backend: Arc<dyn Backend>,
}

impl Linear {
    /// Creates a randomly initialized layer
    pub fn new(
        name: &'static str,
        in_dim: usize,
        out_dim: usize,
        bias: bool,
        init: &mut ParamInit,
        backend: Arc<dyn Backend>,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidArgument {
                arg: name,
                reason: format!("layer dimensions must be non-zero, got {}x{}", in_dim, out_dim),
            });
        }

        let weight = init.xavier_uniform(in_dim, out_dim);
        let bias = bias.then(|| init.zeros(out_dim));
        Ok(Self { name, weight, bias, backend })
    }

    /// Builds a layer from explicit parameters
    pub fn from_parts(
        name: &'static str,
        weight: Array2<f32>,
        bias: Option<Array1<f32>>,
        backend: Arc<dyn Backend>,
    ) -> Result<Self> {
        if let Some(b) = &bias {
            if b.len() != weight.ncols() {
                return Err(Error::DimensionMismatch {
                    param: name,
                    expected: weight.ncols(),
                    got: b.len(),
                });
            }
        }
        Ok(Self { name, weight, bias, backend })
    }

    pub fn in_dim(&self) -> usize {
        self.weight.nrows()
    }

    pub fn out_dim(&self) -> usize {
        self.weight.ncols()
    }

    pub fn weight(&self) -> &Array2<f32> {
        &self.weight
    }

    /// Projects a batch of row vectors, (N, in_dim) -> (N, out_dim)
    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.in_dim() {
            return Err(Error::DimensionMismatch {
                param: self.name,
                expected: self.in_dim(),
                got: x.ncols(),
            });
        }

        let projected = self.backend.matmul(x, self.weight.view())?;
        match &self.bias {
            Some(bias) => self.backend.add_row(projected.view(), bias.view()),
            None => Ok(projected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::create_backend;
    use ndarray::array;

    #[test]
    fn test_forward_with_bias() {
        let layer = Linear::from_parts(
            "proj",
            array![[1.0, 0.0, 2.0], [0.0, 1.0, -1.0]],
            Some(array![0.5, 0.5, 0.5]),
            create_backend(),
        )
        .unwrap();

        let y = layer.forward(array![[1.0, 2.0], [3.0, 4.0]].view()).unwrap();
        assert_eq!(y, array![[1.5, 2.5, 0.5], [3.5, 4.5, 2.5]]);
    }

    #[test]
    fn test_forward_rejects_wrong_input_dim() {
        let mut init = ParamInit::new(0);
        let layer = Linear::new("W_q", 4, 3, false, &mut init, create_backend()).unwrap();

        let err = layer.forward(Array2::zeros((2, 5)).view()).unwrap_err();
        match err {
            Error::DimensionMismatch { param, expected, got } => {
                assert_eq!(param, "W_q");
                assert_eq!(expected, 4);
                assert_eq!(got, 5);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_zero_sized_layer_rejected() {
        let mut init = ParamInit::new(0);
        let result = Linear::new("dense", 0, 3, true, &mut init, create_backend());
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }
}
