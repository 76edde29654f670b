use ndarray::{stack, Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AttentionDecoder, DecodeRun, DecoderState, Seq2SeqEncoder};
use crate::attention::ValidLens;
use crate::error::{Error, Result};

/// Knobs for greedy generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Source is padded or truncated to this length; also the output budget
    pub num_steps: usize,
    /// Beginning-of-sequence token fed at the first step
    pub bos: usize,
    /// End-of-sequence token; generation stops when it is predicted
    pub eos: usize,
    /// Padding token for the source
    pub pad: usize,
}

/// Tokens produced by greedy generation with the attention each one used
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub tokens: Vec<usize>,
    /// One (source_len) weight vector per decoding step. When generation
    /// stopped on EOS the last vector belongs to that step.
    pub attention_weights: Vec<Array1<f32>>,
    /// Whether EOS was predicted before the step budget ran out
    pub ended_with_eos: bool,
    /// Padded source length the weights range over
    pub source_len: usize,
    /// Non-padding source positions
    pub valid_len: usize,
}

impl Generation {
    /// Weights as a (steps, source_len) matrix for heatmaps
    pub fn attention_matrix(&self) -> Result<Array2<f32>> {
        if self.attention_weights.is_empty() {
            return Ok(Array2::zeros((0, self.source_len)));
        }
        let rows: Vec<ArrayView1<f32>> = self.attention_weights.iter().map(|w| w.view()).collect();
        Ok(stack(Axis(0), &rows)?)
    }
}

/// Cuts `tokens` to `num_steps` or pads them with `pad` up to it
pub fn truncate_pad(tokens: &[usize], num_steps: usize, pad: usize) -> Vec<usize> {
    if tokens.len() > num_steps {
        return tokens[..num_steps].to_vec();
    }
    let mut padded = tokens.to_vec();
    padded.resize(num_steps, pad);
    padded
}

/// Feeds each predicted token back in as the next input.
///
/// Yields the EOS step itself and then stops. Also ends after `remaining`
/// steps or after the first error.
struct GreedySteps<'a, D: AttentionDecoder> {
    decoder: &'a D,
    state: Option<DecoderState>,
    next_input: usize,
    remaining: usize,
    eos: usize,
}

impl<D: AttentionDecoder> Iterator for GreedySteps<'_, D> {
    type Item = Result<(usize, Array1<f32>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let state = self.state.take()?;

        let input = Array2::from_elem((1, 1), self.next_input);
        let DecodeRun { mut steps, state, .. } = match self.decoder.decode(input.view(), state) {
            Ok(run) => run,
            Err(e) => return Some(Err(e)),
        };
        let step = steps.pop()?;

        let token = argmax(step.output.row(0));
        if token != self.eos {
            self.state = Some(state);
            self.next_input = token;
        }
        Some(Ok((token, step.attention_weights.row(0).to_owned())))
    }
}

/// Greedy decoding of a single source sentence.
///
/// The source is truncated or padded to `num_steps`, encoded with its true
/// length as the valid length, and decoded one token at a time starting
/// from BOS. EOS itself is not emitted, but the attention of the step that
/// predicted it is kept.
pub fn greedy_generate<D: AttentionDecoder>(
    encoder: &Seq2SeqEncoder,
    decoder: &D,
    src: &[usize],
    options: &GenerationOptions,
) -> Result<Generation> {
    if src.is_empty() {
        return Err(Error::InvalidArgument {
            arg: "src",
            reason: "source sequence is empty".to_string(),
        });
    }
    if options.num_steps == 0 {
        return Err(Error::InvalidArgument {
            arg: "num_steps",
            reason: "step budget must be greater than 0".to_string(),
        });
    }

    let valid_len = src.len().min(options.num_steps);
    let padded = truncate_pad(src, options.num_steps, options.pad);
    let src = Array2::from_shape_vec((1, options.num_steps), padded)?;

    let encoded = encoder.encode(src.view())?;
    let state = decoder.init_state(encoded, Some(ValidLens::per_batch(vec![valid_len])))?;

    let steps = GreedySteps {
        decoder,
        state: Some(state),
        next_input: options.bos,
        remaining: options.num_steps,
        eos: options.eos,
    };
    let (mut tokens, attention_weights): (Vec<_>, Vec<_>) = steps.collect::<Result<Vec<_>>>()?.into_iter().unzip();
    let ended_with_eos = tokens.last() == Some(&options.eos);
    if ended_with_eos {
        tokens.pop();
    }

    info!(
        "generated {} tokens from source of {} (valid {}), eos={}",
        tokens.len(),
        options.num_steps,
        valid_len,
        ended_with_eos
    );

    Ok(Generation {
        tokens,
        attention_weights,
        ended_with_eos,
        source_len: options.num_steps,
        valid_len,
    })
}

/// Index of the largest logit; the first one wins ties
fn argmax(logits: ArrayView1<f32>) -> usize {
    logits
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_val), (i, &v)| {
            if v > best_val {
                (i, v)
            } else {
                (best, best_val)
            }
        })
        .0
}
