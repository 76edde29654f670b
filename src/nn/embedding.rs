use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis};

use super::ParamInit;
use crate::error::{Error, Result};

/// Token embedding table with shape (vocab_size, embed_dim)
#[derive(Debug, Clone)]
pub struct Embedding {
    table: Array2<f32>,
}

impl Embedding {
    /// Creates a randomly initialized table
    pub fn new(vocab_size: usize, embed_dim: usize, init: &mut ParamInit) -> Result<Self> {
        if vocab_size == 0 || embed_dim == 0 {
            return Err(Error::InvalidArgument {
                arg: "embedding",
                reason: format!("vocab_size and embed_dim must be non-zero, got {}x{}", vocab_size, embed_dim),
            });
        }
        Ok(Self { table: init.xavier_uniform(vocab_size, embed_dim) })
    }

    /// Wraps an existing table
    pub fn from_table(table: Array2<f32>) -> Self {
        Self { table }
    }

    pub fn vocab_size(&self) -> usize {
        self.table.nrows()
    }

    pub fn embed_dim(&self) -> usize {
        self.table.ncols()
    }

    /// Looks up the embedding row of a single token
    pub fn lookup(&self, token: usize) -> Result<ArrayView1<'_, f32>> {
        if token >= self.vocab_size() {
            return Err(Error::TokenOutOfRange { token, vocab_size: self.vocab_size() });
        }
        Ok(self.table.row(token))
    }

    /// Converts token ids (batch, steps) to embeddings (batch, steps, embed_dim)
    pub fn forward(&self, tokens: ArrayView2<usize>) -> Result<Array3<f32>> {
        let (batch, steps) = tokens.dim();
        let mut embeddings = Array3::zeros((batch, steps, self.embed_dim()));

        for (mut out_row, &token) in embeddings
            .lanes_mut(Axis(2))
            .into_iter()
            .zip(tokens.iter())
        {
            out_row.assign(&self.lookup(token)?);
        }

        Ok(embeddings)
    }
}
