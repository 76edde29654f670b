use std::sync::Arc;

use ndarray::{Array3, ArrayView2};
use tracing::debug;

use crate::backend::Backend;
use crate::error::Result;
use crate::nn::{Embedding, Gru, ParamInit};

/// Encoder outputs consumed by the attention decoder
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    /// Top-layer output at every source position, (batch, seq_len, num_hiddens)
    pub outputs: Array3<f32>,
    /// Final recurrent state, (num_layers, batch, num_hiddens)
    pub state: Array3<f32>,
}

/// Embedding followed by a stacked GRU
#[derive(Debug, Clone)]
pub struct Seq2SeqEncoder {
    embedding: Embedding,
    rnn: Gru,
}

impl Seq2SeqEncoder {
    pub fn new(
        vocab_size: usize,
        embed_dim: usize,
        num_hiddens: usize,
        num_layers: usize,
        init: &mut ParamInit,
        backend: Arc<dyn Backend>,
    ) -> Result<Self> {
        let embedding = Embedding::new(vocab_size, embed_dim, init)?;
        let rnn = Gru::new(embed_dim, num_hiddens, num_layers, init, backend)?;
        Ok(Self { embedding, rnn })
    }

    pub fn vocab_size(&self) -> usize {
        self.embedding.vocab_size()
    }

    pub fn num_hiddens(&self) -> usize {
        self.rnn.hidden_dim()
    }

    pub fn num_layers(&self) -> usize {
        self.rnn.num_layers()
    }

    /// Encodes source token ids with shape (batch, seq_len)
    pub fn encode(&self, src: ArrayView2<usize>) -> Result<EncoderOutput> {
        let embedded = self.embedding.forward(src)?;
        let (outputs, state) = self.rnn.forward(embedded.view(), None)?;
        debug!("encoded source of shape {:?}", src.dim());
        Ok(EncoderOutput { outputs, state })
    }
}
