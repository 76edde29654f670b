//! Additive (Bahdanau) attention pooling for sequence-to-sequence models.
//!
//! The core is [`AdditiveAttention::compute_context`], which scores every
//! key against a query, normalizes the scores over the valid (non-padding)
//! positions and returns the weighted sum of the values together with the
//! weights. Around it sit forward-only layers and a toy encoder/decoder that
//! call it once per decoding step.

pub mod error;
pub mod backend;
pub mod nn;
pub mod attention;
pub mod seq2seq;
pub mod config;
pub mod display;

pub use attention::{AdditiveAttention, AttentionOutput, ValidLens};
pub use error::{Error, Result};
