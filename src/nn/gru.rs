use std::sync::Arc;

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use tracing::trace;

use super::{Linear, ParamInit};
use crate::backend::Backend;
use crate::error::{Error, Result};

/// A single gated recurrent unit.
///
/// For input `x` and previous state `h`:
///
/// ```text
/// z  = σ(x W_xz + h W_hz + b_z)
/// r  = σ(x W_xr + h W_hr + b_r)
/// h~ = tanh(x W_xh + (r ⊙ h) W_hh + b_h)
/// h' = z ⊙ h + (1 - z) ⊙ h~
/// ```
#[derive(Debug, Clone)]
pub struct GruCell {
    x_update: Linear,
    h_update: Linear,
    x_reset: Linear,
    h_reset: Linear,
    x_candidate: Linear,
    h_candidate: Linear,
    hidden_dim: usize,
    backend: Arc<dyn Backend>,
}

impl GruCell {
    pub fn new(
        input_dim: usize,
        hidden_dim: usize,
        init: &mut ParamInit,
        backend: Arc<dyn Backend>,
    ) -> Result<Self> {
        let b = &backend;
        Ok(Self {
            x_update: Linear::new("gru W_xz", input_dim, hidden_dim, true, init, Arc::clone(b))?,
            h_update: Linear::new("gru W_hz", hidden_dim, hidden_dim, false, init, Arc::clone(b))?,
            x_reset: Linear::new("gru W_xr", input_dim, hidden_dim, true, init, Arc::clone(b))?,
            h_reset: Linear::new("gru W_hr", hidden_dim, hidden_dim, false, init, Arc::clone(b))?,
            x_candidate: Linear::new("gru W_xh", input_dim, hidden_dim, true, init, Arc::clone(b))?,
            h_candidate: Linear::new("gru W_hh", hidden_dim, hidden_dim, false, init, Arc::clone(b))?,
            hidden_dim,
            backend,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.x_update.in_dim()
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    /// Advances the state by one step, (B, in) x (B, H) -> (B, H)
    pub fn step(&self, x: ArrayView2<f32>, h: ArrayView2<f32>) -> Result<Array2<f32>> {
        if h.ncols() != self.hidden_dim {
            return Err(Error::DimensionMismatch {
                param: "gru hidden state",
                expected: self.hidden_dim,
                got: h.ncols(),
            });
        }
        if x.nrows() != h.nrows() {
            return Err(Error::ShapeMismatch {
                what: "gru input vs state batch",
                expected: h.nrows(),
                got: x.nrows(),
            });
        }

        let mut update = self.x_update.forward(x)? + self.h_update.forward(h)?;
        self.backend.sigmoid(&mut update);

        let mut reset = self.x_reset.forward(x)? + self.h_reset.forward(h)?;
        self.backend.sigmoid(&mut reset);

        let gated = &reset * &h;
        let mut candidate = self.x_candidate.forward(x)? + self.h_candidate.forward(gated.view())?;
        self.backend.tanh(&mut candidate);

        let keep = &update * &h;
        let fresh = update.mapv(|z| 1.0 - z) * candidate;
        Ok(keep + fresh)
    }
}

/// Stack of GRU cells; layer `l + 1` consumes the output of layer `l`.
///
/// State tensors have shape (num_layers, batch, hidden_dim).
#[derive(Debug, Clone)]
pub struct Gru {
    layers: Vec<GruCell>,
}

impl Gru {
    pub fn new(
        input_dim: usize,
        hidden_dim: usize,
        num_layers: usize,
        init: &mut ParamInit,
        backend: Arc<dyn Backend>,
    ) -> Result<Self> {
        if num_layers == 0 {
            return Err(Error::InvalidArgument {
                arg: "num_layers",
                reason: "a GRU needs at least one layer".to_string(),
            });
        }

        let layers = (0..num_layers)
            .map(|layer| {
                let in_dim = if layer == 0 { input_dim } else { hidden_dim };
                GruCell::new(in_dim, hidden_dim, init, Arc::clone(&backend))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { layers })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn hidden_dim(&self) -> usize {
        self.layers[0].hidden_dim()
    }

    pub fn input_dim(&self) -> usize {
        self.layers[0].input_dim()
    }

    /// All-zero initial state for a batch
    pub fn initial_state(&self, batch: usize) -> Array3<f32> {
        Array3::zeros((self.num_layers(), batch, self.hidden_dim()))
    }

    /// Runs one time step through every layer.
    ///
    /// Returns the top layer's output (B, H) and the new state (L, B, H).
    pub fn step(&self, x: ArrayView2<f32>, state: ArrayView3<f32>) -> Result<(Array2<f32>, Array3<f32>)> {
        let (layers, batch, hidden) = state.dim();
        if layers != self.num_layers() {
            return Err(Error::ShapeMismatch {
                what: "gru state layers",
                expected: self.num_layers(),
                got: layers,
            });
        }
        if hidden != self.hidden_dim() {
            return Err(Error::DimensionMismatch {
                param: "gru hidden state",
                expected: self.hidden_dim(),
                got: hidden,
            });
        }

        let mut next_state = Array3::zeros((layers, batch, hidden));
        let mut input = x.to_owned();
        for (layer, cell) in self.layers.iter().enumerate() {
            let h = cell.step(input.view(), state.index_axis(Axis(0), layer))?;
            next_state.index_axis_mut(Axis(0), layer).assign(&h);
            input = h;
        }

        Ok((input, next_state))
    }

    /// Runs a whole sequence, (B, T, in) -> outputs (B, T, H) and final state
    pub fn forward(
        &self,
        x: ArrayView3<f32>,
        state: Option<Array3<f32>>,
    ) -> Result<(Array3<f32>, Array3<f32>)> {
        let (batch, steps, _) = x.dim();
        let state = state.unwrap_or_else(|| self.initial_state(batch));
        let mut outputs = Array3::zeros((batch, steps, self.hidden_dim()));

        let state = (0..steps).try_fold(state, |state, t| {
            let (out, next) = self.step(x.index_axis(Axis(1), t), state.view())?;
            outputs.index_axis_mut(Axis(1), t).assign(&out);
            Ok::<_, Error>(next)
        })?;

        trace!("gru forward over {} steps, batch {}", steps, batch);
        Ok((outputs, state))
    }
}
