use std::fmt;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

use super::super::Backend;
use crate::error::{Error, Result};

/// CPU backend implementation using ndarray
#[derive(Clone, Default)]
pub struct CpuBackend {
    // Configuration options could go here
}

impl CpuBackend {
    /// Create a new CPU backend instance.
    pub fn new() -> Self {
        Self {}
    }
}

impl fmt::Debug for CpuBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuBackend").finish()
    }
}

impl Backend for CpuBackend {
    /// Performs matrix multiplication C = A * B using ndarray.
    fn matmul(&self, a: ArrayView2<f32>, b: ArrayView2<f32>) -> Result<Array2<f32>> {
        if a.ncols() != b.nrows() {
            return Err(Error::DimensionMismatch {
                param: "matmul rhs",
                expected: b.nrows(),
                got: a.ncols(),
            });
        }

        // Uses BLAS internally if available
        Ok(a.dot(&b))
    }

    fn add_row(&self, a: ArrayView2<f32>, row: ArrayView1<f32>) -> Result<Array2<f32>> {
        if a.ncols() != row.len() {
            return Err(Error::DimensionMismatch {
                param: "bias",
                expected: row.len(),
                got: a.ncols(),
            });
        }

        Ok(&a + &row)
    }

    fn tanh(&self, x: &mut Array2<f32>) {
        x.mapv_inplace(f32::tanh);
    }

    fn sigmoid(&self, x: &mut Array2<f32>) {
        x.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp()));
    }

    /// Applies softmax over the valid prefix of `scores`.
    ///
    /// The maximum of the valid prefix is subtracted before exponentiation
    /// for numerical stability. Masked entries never enter the sum, so their
    /// contents (even infinities) cannot leak into the result.
    fn masked_softmax(&self, scores: ArrayView1<f32>, valid_len: usize) -> Result<Array1<f32>> {
        let len = scores.len();
        if valid_len > len {
            return Err(Error::ValidLengthOutOfRange {
                index: 0,
                valid_len,
                seq_len: len,
            });
        }

        let mut output = Array1::zeros(len);
        if valid_len == 0 {
            return Ok(output);
        }

        let valid = scores.slice(s![..valid_len]);

        // Find max value for numerical stability
        let max_val = valid.fold(f32::NEG_INFINITY, |max, &val| max.max(val));

        // Calculate exp(x - max) and sum
        let mut sum = 0.0;
        let mut head = output.slice_mut(s![..valid_len]);
        for (out, &score) in head.iter_mut().zip(valid.iter()) {
            let val = (score - max_val).exp();
            *out = val;
            sum += val;
        }

        // Normalize by sum
        head.mapv_inplace(|v| v / sum);

        Ok(output)
    }

    fn weighted_sum(&self, weights: ArrayView1<f32>, values: ArrayView2<f32>) -> Result<Array1<f32>> {
        if weights.len() != values.nrows() {
            return Err(Error::ShapeMismatch {
                what: "weights vs values length",
                expected: values.nrows(),
                got: weights.len(),
            });
        }

        Ok(weights.dot(&values))
    }
}
