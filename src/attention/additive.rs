use std::sync::Arc;

use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};
use tracing::debug;

use super::{masked_softmax, ValidLens};
use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::nn::{Linear, ParamInit};

/// Result of one attention pooling call
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionOutput {
    /// Pooled values, shape (batch, queries, value_dim)
    pub context: Array3<f32>,
    /// Attention weights, shape (batch, queries, seq_len)
    pub weights: Array3<f32>,
}

/// Additive attention scoring with learned projections.
///
/// The score between a query `q` and a key `k` is
/// `wᵀ · tanh(W_q q + W_k k)`, which lets queries and keys have different
/// dimensionalities. The parameters are only read here; whoever owns the
/// model owns their values.
#[derive(Debug, Clone)]
pub struct AdditiveAttention {
    w_q: Linear,
    w_k: Linear,
    w_v: Linear,
    backend: Arc<dyn Backend>,
}

impl AdditiveAttention {
    /// Creates randomly initialized scoring parameters
    ///
    /// # Arguments
    /// * `query_dim` - Dimensionality of each query vector
    /// * `key_dim` - Dimensionality of each key vector
    /// * `num_hiddens` - Width of the hidden scoring layer
    pub fn new(
        query_dim: usize,
        key_dim: usize,
        num_hiddens: usize,
        init: &mut ParamInit,
        backend: Arc<dyn Backend>,
    ) -> Result<Self> {
        Ok(Self {
            w_q: Linear::new("W_q", query_dim, num_hiddens, false, init, Arc::clone(&backend))?,
            w_k: Linear::new("W_k", key_dim, num_hiddens, false, init, Arc::clone(&backend))?,
            w_v: Linear::new("w", num_hiddens, 1, false, init, Arc::clone(&backend))?,
            backend,
        })
    }

    /// Builds the scorer from explicit parameters.
    ///
    /// `w_q` is (query_dim, num_hiddens), `w_k` is (key_dim, num_hiddens) and
    /// `w` has length num_hiddens.
    pub fn from_weights(
        w_q: Array2<f32>,
        w_k: Array2<f32>,
        w: Array1<f32>,
        backend: Arc<dyn Backend>,
    ) -> Result<Self> {
        let num_hiddens = w.len();
        if w_q.ncols() != num_hiddens {
            return Err(Error::DimensionMismatch { param: "W_q", expected: num_hiddens, got: w_q.ncols() });
        }
        if w_k.ncols() != num_hiddens {
            return Err(Error::DimensionMismatch { param: "W_k", expected: num_hiddens, got: w_k.ncols() });
        }

        Ok(Self {
            w_q: Linear::from_parts("W_q", w_q, None, Arc::clone(&backend))?,
            w_k: Linear::from_parts("W_k", w_k, None, Arc::clone(&backend))?,
            w_v: Linear::from_parts("w", w.insert_axis(Axis(1)), None, Arc::clone(&backend))?,
            backend,
        })
    }

    pub fn query_dim(&self) -> usize {
        self.w_q.in_dim()
    }

    pub fn key_dim(&self) -> usize {
        self.w_k.in_dim()
    }

    pub fn num_hiddens(&self) -> usize {
        self.w_v.in_dim()
    }

    /// Raw alignment scores, shape (batch, queries, seq_len)
    ///
    /// # Arguments
    /// * `query` - Queries with shape (batch, queries, query_dim)
    /// * `keys` - Keys with shape (batch, seq_len, key_dim)
    pub fn scores(&self, query: ArrayView3<f32>, keys: ArrayView3<f32>) -> Result<Array3<f32>> {
        let (batch, queries, query_dim) = query.dim();
        let (key_batch, seq_len, key_dim) = keys.dim();
        if key_batch != batch {
            return Err(Error::ShapeMismatch { what: "query vs keys batch", expected: batch, got: key_batch });
        }
        self.check_feature_dims(query_dim, key_dim)?;

        let mut scores = Array3::zeros((batch, queries, seq_len));
        for b in 0..batch {
            let projected_q = self.w_q.forward(query.index_axis(Axis(0), b))?;
            let projected_k = self.w_k.forward(keys.index_axis(Axis(0), b))?;

            for q in 0..queries {
                scores
                    .slice_mut(s![b, q, ..])
                    .assign(&self.score_row(projected_q.row(q), projected_k.view())?);
            }
        }

        Ok(scores)
    }

    /// Pools `values` for every query.
    ///
    /// # Arguments
    /// * `query` - Queries with shape (batch, queries, query_dim)
    /// * `keys` - Keys with shape (batch, seq_len, key_dim)
    /// * `values` - Values with shape (batch, seq_len, value_dim)
    /// * `valid_lens` - Optional count of non-padding positions; `None` means
    ///   every position is valid
    ///
    /// # Errors
    /// All shape and length checks run before any arithmetic. Mismatched
    /// key/value lengths or batches give `ShapeMismatch`, query or key
    /// widths that do not fit the scoring matrices give `DimensionMismatch`,
    /// and a valid length above `seq_len` gives `ValidLengthOutOfRange`.
    pub fn compute_context(
        &self,
        query: ArrayView3<f32>,
        keys: ArrayView3<f32>,
        values: ArrayView3<f32>,
        valid_lens: Option<&ValidLens>,
    ) -> Result<AttentionOutput> {
        let (batch, queries, query_dim) = query.dim();
        let (key_batch, seq_len, key_dim) = keys.dim();
        let (value_batch, value_len, value_dim) = values.dim();

        if key_batch != batch {
            return Err(Error::ShapeMismatch { what: "query vs keys batch", expected: batch, got: key_batch });
        }
        if value_batch != key_batch {
            return Err(Error::ShapeMismatch { what: "keys vs values batch", expected: key_batch, got: value_batch });
        }
        if value_len != seq_len {
            return Err(Error::ShapeMismatch { what: "keys vs values length", expected: seq_len, got: value_len });
        }
        self.check_feature_dims(query_dim, key_dim)?;
        if let Some(lens) = valid_lens {
            lens.validate(batch, queries, seq_len)?;
        }

        debug!(
            "additive attention: batch={} queries={} seq_len={} value_dim={} masked={}",
            batch,
            queries,
            seq_len,
            value_dim,
            valid_lens.is_some()
        );

        let scores = self.scores(query, keys)?;
        let weights = masked_softmax(self.backend.as_ref(), scores.view(), valid_lens)?;

        let mut context = Array3::zeros((batch, queries, value_dim));
        for b in 0..batch {
            let batch_values = values.index_axis(Axis(0), b);
            for q in 0..queries {
                let pooled = self.backend.weighted_sum(weights.slice(s![b, q, ..]), batch_values)?;
                context.slice_mut(s![b, q, ..]).assign(&pooled);
            }
        }

        Ok(AttentionOutput { context, weights })
    }

    /// Pools a single unbatched sequence for a single query.
    ///
    /// Returns `(context, weights)` with shapes (value_dim) and (seq_len).
    pub fn compute_context_single(
        &self,
        query: ArrayView1<f32>,
        keys: ArrayView2<f32>,
        values: ArrayView2<f32>,
        valid_len: Option<usize>,
    ) -> Result<(Array1<f32>, Array1<f32>)> {
        let query = query.insert_axis(Axis(0)).insert_axis(Axis(0));
        let keys = keys.insert_axis(Axis(0));
        let values = values.insert_axis(Axis(0));
        let valid_lens = valid_len.map(|len| ValidLens::per_batch(vec![len]));

        let AttentionOutput { context, weights } =
            self.compute_context(query, keys, values, valid_lens.as_ref())?;

        Ok((
            context.slice(s![0, 0, ..]).to_owned(),
            weights.slice(s![0, 0, ..]).to_owned(),
        ))
    }

    /// Scores one projected query against every projected key
    fn score_row(&self, projected_q: ArrayView1<f32>, projected_k: ArrayView2<f32>) -> Result<Array1<f32>> {
        let mut features = self.backend.add_row(projected_k, projected_q)?;
        self.backend.tanh(&mut features);
        let scores = self.w_v.forward(features.view())?;
        Ok(scores.column(0).to_owned())
    }

    fn check_feature_dims(&self, query_dim: usize, key_dim: usize) -> Result<()> {
        if query_dim != self.query_dim() {
            return Err(Error::DimensionMismatch { param: "W_q", expected: self.query_dim(), got: query_dim });
        }
        if key_dim != self.key_dim() {
            return Err(Error::DimensionMismatch { param: "W_k", expected: self.key_dim(), got: key_dim });
        }
        Ok(())
    }
}
