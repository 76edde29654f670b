use std::fmt::Debug;
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use super::cpu::CpuBackend;
use crate::error::Result;

/// A trait for the dense primitives the attention and recurrent layers need
pub trait Backend: Send + Sync + Debug {
    /// Perform matrix multiplication C = A * B
    ///
    /// # Parameters
    /// * `a` - Input matrix A with shape (m, k)
    /// * `b` - Input matrix B with shape (k, n)
    ///
    /// # Returns
    /// * Matrix C with shape (m, n)
    fn matmul(&self, a: ArrayView2<f32>, b: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Add `row` to every row of `a` (bias broadcast)
    fn add_row(&self, a: ArrayView2<f32>, row: ArrayView1<f32>) -> Result<Array2<f32>>;

    /// Applies tanh element-wise, in place.
    fn tanh(&self, x: &mut Array2<f32>);

    /// Applies the logistic sigmoid element-wise, in place.
    fn sigmoid(&self, x: &mut Array2<f32>);

    /// Softmax over the first `valid_len` entries of `scores`.
    ///
    /// Entries at index `>= valid_len` come back as exactly `0.0`. With
    /// `valid_len == 0` the whole result is zeros.
    fn masked_softmax(&self, scores: ArrayView1<f32>, valid_len: usize) -> Result<Array1<f32>>;

    /// Computes `Σ_t weights[t] * values[t]`
    ///
    /// # Parameters
    /// * `weights` - Weight vector with shape (T)
    /// * `values` - Value matrix with shape (T, d)
    ///
    /// # Returns
    /// * Vector with shape (d)
    fn weighted_sum(&self, weights: ArrayView1<f32>, values: ArrayView2<f32>) -> Result<Array1<f32>>;
}

// Factory function to create a backend based on available hardware
pub fn create_backend() -> Arc<dyn Backend> {
    // Only the CPU backend exists so far
    Arc::new(CpuBackend::new())
}
