use ndarray::array;
use seqattn::backend::create_backend;
use seqattn::config::ModelConfig;
use seqattn::nn::ParamInit;
use seqattn::seq2seq::{
    greedy_generate, AttentionDecoder, GenerationOptions, Seq2Seq, Seq2SeqAttentionDecoder, Seq2SeqEncoder,
};
use seqattn::{Error, ValidLens};

fn model_config(seed: u64) -> ModelConfig {
    ModelConfig {
        vocab_size: 12,
        embed_dim: 8,
        num_hiddens: 16,
        num_layers: 2,
        seed,
    }
}

fn options(num_steps: usize) -> GenerationOptions {
    GenerationOptions { num_steps, bos: 1, eos: 2, pad: 0 }
}

#[test]
fn test_teacher_forced_run_records_one_weight_row_per_step() {
    let mut init = ParamInit::new(5);
    let backend = create_backend();
    let encoder = Seq2SeqEncoder::new(12, 8, 16, 2, &mut init, backend.clone()).unwrap();
    let decoder = Seq2SeqAttentionDecoder::new(12, 8, 16, 2, &mut init, backend).unwrap();

    let src = array![[4, 5, 6, 0], [7, 8, 9, 10]];
    let state = decoder
        .init_state(encoder.encode(src.view()).unwrap(), Some(ValidLens::per_batch(vec![3, 4])))
        .unwrap();
    let run = decoder.decode(array![[1, 4, 5], [1, 7, 8]].view(), state).unwrap();

    let weights = run.attention_weights();
    assert_eq!(weights.len(), 3);
    for step in weights {
        assert_eq!(step.dim(), (2, 4));
        assert_eq!(step[[0, 3]], 0.0);
        assert!((step.row(0).sum() - 1.0).abs() < 1e-5);
        assert!((step.row(1).sum() - 1.0).abs() < 1e-5);
    }
}

#[test]
fn test_generation_respects_budget_and_mask() {
    let model = Seq2Seq::new(&model_config(3), create_backend()).unwrap();
    let opts = options(6);

    let generation = model.generate(&[4, 5, 6], &opts).unwrap();

    assert!(generation.tokens.len() <= 6);
    assert_eq!(
        generation.tokens.len() + usize::from(generation.ended_with_eos),
        generation.attention_weights.len()
    );
    assert!(generation.attention_weights.len() <= 6);
    assert_eq!(generation.valid_len, 3);
    assert_eq!(generation.source_len, 6);
    assert!(!generation.tokens.contains(&opts.eos));
    for weights in &generation.attention_weights {
        assert_eq!(weights.len(), 6);
        assert!(weights.iter().skip(3).all(|&w| w == 0.0));
        assert!((weights.sum() - 1.0).abs() < 1e-5);
    }

    let matrix = generation.attention_matrix().unwrap();
    assert_eq!(matrix.dim(), (generation.attention_weights.len(), 6));
}

#[test]
fn test_default_model_always_shows_attention() {
    let config = ModelConfig { vocab_size: 32, embed_dim: 32, num_hiddens: 32, num_layers: 2, seed: 0 };
    let model = Seq2Seq::new(&config, create_backend()).unwrap();

    let generation = model.generate(&[4, 5, 6], &GenerationOptions { num_steps: 10, bos: 1, eos: 2, pad: 0 }).unwrap();

    assert!(!generation.attention_weights.is_empty());
    let matrix = generation.attention_matrix().unwrap();
    assert_eq!(matrix.ncols(), 10);
    assert!((matrix.row(0).sum() - 1.0).abs() < 1e-5);
    assert!(matrix.row(0).iter().skip(3).all(|&w| w == 0.0));
}

#[test]
fn test_generation_is_reproducible() {
    let first = Seq2Seq::new(&model_config(42), create_backend()).unwrap();
    let second = Seq2Seq::new(&model_config(42), create_backend()).unwrap();

    let a = first.generate(&[3, 9, 4, 7], &options(8)).unwrap();
    let b = first.generate(&[3, 9, 4, 7], &options(8)).unwrap();
    let c = second.generate(&[3, 9, 4, 7], &options(8)).unwrap();

    assert_eq!(a, b);
    assert_eq!(a, c);
}

#[test]
fn test_long_source_is_truncated() {
    let model = Seq2Seq::new(&model_config(1), create_backend()).unwrap();

    let generation = model.generate(&[3, 4, 5, 6, 7, 8, 9], &options(4)).unwrap();

    assert_eq!(generation.valid_len, 4);
    assert!(generation.attention_weights.iter().all(|w| w.len() == 4));
}

#[test]
fn test_generation_rejects_bad_input() {
    let model = Seq2Seq::new(&model_config(1), create_backend()).unwrap();

    assert!(matches!(
        model.generate(&[], &options(4)),
        Err(Error::InvalidArgument { arg: "src", .. })
    ));
    assert!(matches!(
        model.generate(&[3], &options(0)),
        Err(Error::InvalidArgument { arg: "num_steps", .. })
    ));
    assert!(matches!(
        greedy_generate(&model.encoder, &model.decoder, &[12], &options(4)),
        Err(Error::TokenOutOfRange { token: 12, vocab_size: 12 })
    ));
}
