use std::sync::Arc;

use ndarray::{concatenate, stack, Array2, Array3, ArrayView2, Axis};
use tracing::{debug, trace};

use super::EncoderOutput;
use crate::attention::{AdditiveAttention, ValidLens};
use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::nn::{Embedding, Gru, Linear, ParamInit};

/// Everything the decoder carries from one call to the next
#[derive(Debug, Clone)]
pub struct DecoderState {
    /// Encoder outputs used as both keys and values, (batch, seq_len, num_hiddens)
    pub enc_outputs: Array3<f32>,
    /// Recurrent state, (num_layers, batch, num_hiddens)
    pub hidden: Array3<f32>,
    /// Non-padding source length per batch element
    pub enc_valid_lens: Option<ValidLens>,
}

impl DecoderState {
    pub fn batch_size(&self) -> usize {
        self.enc_outputs.len_of(Axis(0))
    }

    pub fn source_len(&self) -> usize {
        self.enc_outputs.len_of(Axis(1))
    }
}

/// Output of a single decoding step
#[derive(Debug, Clone)]
pub struct DecodeStep {
    /// Vocabulary logits, (batch, vocab_size)
    pub output: Array2<f32>,
    /// Attention over source positions, (batch, seq_len)
    pub attention_weights: Array2<f32>,
}

/// Ordered record of a decoding run plus the state to continue from
#[derive(Debug, Clone)]
pub struct DecodeRun {
    pub steps: Vec<DecodeStep>,
    pub state: DecoderState,
    /// Width of each step's logits
    pub vocab_size: usize,
}

impl DecodeRun {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Logits for every step, (batch, steps, vocab_size)
    pub fn logits(&self) -> Result<Array3<f32>> {
        let views: Vec<_> = self.steps.iter().map(|step| step.output.view()).collect();
        if views.is_empty() {
            return Ok(Array3::zeros((self.state.batch_size(), 0, self.vocab_size)));
        }
        Ok(stack(Axis(1), &views)?)
    }

    /// Per-step attention weights in decoding order, each (batch, seq_len)
    pub fn attention_weights(&self) -> Vec<ArrayView2<'_, f32>> {
        self.steps.iter().map(|step| step.attention_weights.view()).collect()
    }
}

/// A decoder that attends over encoder outputs.
///
/// `decode` folds over the input steps and hands back every step's output
/// together with the attention weights it used, so callers never have to
/// reach into the decoder for them afterwards.
pub trait AttentionDecoder {
    /// Prepares decoder state from an encoding of the source
    fn init_state(&self, encoded: EncoderOutput, enc_valid_lens: Option<ValidLens>) -> Result<DecoderState>;

    /// Runs the decoder over `inputs` (batch, steps) with teacher forcing
    fn decode(&self, inputs: ArrayView2<usize>, state: DecoderState) -> Result<DecodeRun>;
}

/// GRU decoder whose input at every step is the target embedding
/// concatenated with an additive-attention context over the encoder outputs.
/// The query is the top layer of the previous hidden state.
#[derive(Debug, Clone)]
pub struct Seq2SeqAttentionDecoder {
    attention: AdditiveAttention,
    embedding: Embedding,
    rnn: Gru,
    dense: Linear,
}

impl Seq2SeqAttentionDecoder {
    pub fn new(
        vocab_size: usize,
        embed_dim: usize,
        num_hiddens: usize,
        num_layers: usize,
        init: &mut ParamInit,
        backend: Arc<dyn Backend>,
    ) -> Result<Self> {
        let attention = AdditiveAttention::new(num_hiddens, num_hiddens, num_hiddens, init, Arc::clone(&backend))?;
        let embedding = Embedding::new(vocab_size, embed_dim, init)?;
        let rnn = Gru::new(embed_dim + num_hiddens, num_hiddens, num_layers, init, Arc::clone(&backend))?;
        let dense = Linear::new("dense", num_hiddens, vocab_size, true, init, backend)?;
        Ok(Self { attention, embedding, rnn, dense })
    }

    pub fn vocab_size(&self) -> usize {
        self.dense.out_dim()
    }

    pub fn attention(&self) -> &AdditiveAttention {
        &self.attention
    }

    /// Recurrent state must be (num_layers, batch, num_hiddens)
    fn check_hidden(&self, state: &DecoderState) -> Result<()> {
        let (layers, batch, hidden) = state.hidden.dim();
        if layers != self.rnn.num_layers() {
            return Err(Error::ShapeMismatch {
                what: "decoder state layers",
                expected: self.rnn.num_layers(),
                got: layers,
            });
        }
        if batch != state.batch_size() {
            return Err(Error::ShapeMismatch {
                what: "decoder state vs encoder outputs batch",
                expected: state.batch_size(),
                got: batch,
            });
        }
        if hidden != self.rnn.hidden_dim() {
            return Err(Error::DimensionMismatch {
                param: "decoder state",
                expected: self.rnn.hidden_dim(),
                got: hidden,
            });
        }
        Ok(())
    }

    /// One step: attend with the previous top hidden layer, then advance the GRU
    fn step(
        &self,
        embedded: ArrayView2<f32>,
        hidden: &Array3<f32>,
        state: &DecoderState,
    ) -> Result<(Array3<f32>, DecodeStep)> {
        let top = self.rnn.num_layers() - 1;
        let query = hidden.index_axis(Axis(0), top).insert_axis(Axis(1));

        let pooled = self.attention.compute_context(
            query,
            state.enc_outputs.view(),
            state.enc_outputs.view(),
            state.enc_valid_lens.as_ref(),
        )?;

        let context = pooled.context.index_axis(Axis(1), 0);
        let x = concatenate(Axis(1), &[context, embedded.view()])?;
        let (out, next_hidden) = self.rnn.step(x.view(), hidden.view())?;
        let output = self.dense.forward(out.view())?;

        Ok((
            next_hidden,
            DecodeStep {
                output,
                attention_weights: pooled.weights.index_axis(Axis(1), 0).to_owned(),
            },
        ))
    }
}

impl AttentionDecoder for Seq2SeqAttentionDecoder {
    fn init_state(&self, encoded: EncoderOutput, enc_valid_lens: Option<ValidLens>) -> Result<DecoderState> {
        let EncoderOutput { outputs, state } = encoded;
        let (batch, seq_len, enc_hiddens) = outputs.dim();
        let (layers, state_batch, hidden) = state.dim();

        if enc_hiddens != self.attention.key_dim() {
            return Err(Error::DimensionMismatch {
                param: "encoder outputs",
                expected: self.attention.key_dim(),
                got: enc_hiddens,
            });
        }
        if layers != self.rnn.num_layers() {
            return Err(Error::ShapeMismatch {
                what: "encoder vs decoder layers",
                expected: self.rnn.num_layers(),
                got: layers,
            });
        }
        if state_batch != batch {
            return Err(Error::ShapeMismatch {
                what: "encoder state vs outputs batch",
                expected: batch,
                got: state_batch,
            });
        }
        if hidden != self.rnn.hidden_dim() {
            return Err(Error::DimensionMismatch {
                param: "encoder state",
                expected: self.rnn.hidden_dim(),
                got: hidden,
            });
        }
        if let Some(lens) = &enc_valid_lens {
            lens.validate(batch, 1, seq_len)?;
        }

        Ok(DecoderState { enc_outputs: outputs, hidden: state, enc_valid_lens })
    }

    fn decode(&self, inputs: ArrayView2<usize>, state: DecoderState) -> Result<DecodeRun> {
        let (batch, num_steps) = inputs.dim();
        if batch != state.batch_size() {
            return Err(Error::ShapeMismatch {
                what: "decoder inputs vs state batch",
                expected: state.batch_size(),
                got: batch,
            });
        }
        self.check_hidden(&state)?;

        let embedded = self.embedding.forward(inputs)?;
        let hidden = state.hidden.clone();

        let (hidden, steps) = (0..num_steps).try_fold(
            (hidden, Vec::with_capacity(num_steps)),
            |(hidden, mut steps), t| {
                let (next_hidden, step) = self.step(embedded.index_axis(Axis(1), t), &hidden, &state)?;
                trace!("decoder step {}/{}", t + 1, num_steps);
                steps.push(step);
                Ok::<_, Error>((next_hidden, steps))
            },
        )?;

        debug!("decoded {} steps for batch of {}", num_steps, batch);
        Ok(DecodeRun {
            steps,
            state: DecoderState { hidden, ..state },
            vocab_size: self.vocab_size(),
        })
    }
}
