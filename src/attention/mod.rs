//! Additive (Bahdanau) attention pooling over variable-length sequences.

mod valid_lens;
mod masked_softmax;
mod additive;

pub use valid_lens::ValidLens;
pub use masked_softmax::masked_softmax;
pub use additive::{AdditiveAttention, AttentionOutput};
