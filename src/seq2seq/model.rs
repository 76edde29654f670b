use std::sync::Arc;

use tracing::info;

use super::{greedy_generate, Generation, GenerationOptions, Seq2SeqAttentionDecoder, Seq2SeqEncoder};
use crate::backend::Backend;
use crate::config::ModelConfig;
use crate::error::Result;
use crate::nn::ParamInit;

/// Encoder and attention decoder built from one seed
#[derive(Debug, Clone)]
pub struct Seq2Seq {
    pub encoder: Seq2SeqEncoder,
    pub decoder: Seq2SeqAttentionDecoder,
}

impl Seq2Seq {
    /// Builds both halves with parameters drawn from `config.seed`.
    ///
    /// Source and target share the same vocabulary size.
    pub fn new(config: &ModelConfig, backend: Arc<dyn Backend>) -> Result<Self> {
        let mut init = ParamInit::new(config.seed);
        let encoder = Seq2SeqEncoder::new(
            config.vocab_size,
            config.embed_dim,
            config.num_hiddens,
            config.num_layers,
            &mut init,
            Arc::clone(&backend),
        )?;
        let decoder = Seq2SeqAttentionDecoder::new(
            config.vocab_size,
            config.embed_dim,
            config.num_hiddens,
            config.num_layers,
            &mut init,
            backend,
        )?;

        info!(
            "built seq2seq model: vocab={} embed={} hiddens={} layers={} seed={}",
            config.vocab_size, config.embed_dim, config.num_hiddens, config.num_layers, config.seed
        );
        Ok(Self { encoder, decoder })
    }

    /// Greedy generation for a single source sentence
    pub fn generate(&self, src: &[usize], options: &GenerationOptions) -> Result<Generation> {
        greedy_generate(&self.encoder, &self.decoder, src, options)
    }
}
