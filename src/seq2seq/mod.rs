//! Toy encoder / attention-decoder pair around the attention primitive.

mod encoder;
mod decoder;
mod generate;
mod model;

pub use encoder::{EncoderOutput, Seq2SeqEncoder};
pub use decoder::{AttentionDecoder, DecodeRun, DecodeStep, DecoderState, Seq2SeqAttentionDecoder};
pub use generate::{greedy_generate, truncate_pad, Generation, GenerationOptions};
pub use model::Seq2Seq;
