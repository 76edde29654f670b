use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use seqattn::backend::create_backend;
use seqattn::config::Settings;
use seqattn::display::{heatmap_table, matrix_table, to_nested};
use seqattn::nn::ParamInit;
use seqattn::seq2seq::Seq2Seq;
use seqattn::{AdditiveAttention, ValidLens};

/// Additive attention pooling explorer
#[derive(Parser)]
#[command(name = "seqattn", version, about)]
struct Cli {
    /// Directory holding default.toml / local.toml
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pool random values with a randomly initialized additive scorer
    Pool(PoolArgs),
    /// Greedy-decode a token sequence with the configured toy model
    Decode(DecodeArgs),
}

#[derive(Args)]
struct PoolArgs {
    #[arg(long, default_value_t = 1)]
    batch: usize,
    #[arg(long, default_value_t = 1)]
    queries: usize,
    #[arg(long, default_value_t = 16)]
    query_dim: usize,
    #[arg(long, default_value_t = 16)]
    key_dim: usize,
    #[arg(long, default_value_t = 16)]
    value_dim: usize,
    /// Width of the hidden scoring layer
    #[arg(long, default_value_t = 8)]
    hiddens: usize,
    #[arg(long, default_value_t = 7)]
    seq_len: usize,
    /// Valid length applied to every batch element; omit to attend everywhere
    #[arg(long, allow_negative_numbers = true)]
    valid_len: Option<i64>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Print JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DecodeArgs {
    /// Source token ids, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    tokens: Vec<usize>,
    /// Print JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct PoolReport {
    weights: Vec<Vec<Vec<f32>>>,
    context: Vec<Vec<Vec<f32>>>,
}

#[derive(Serialize)]
struct DecodeReport {
    source: Vec<usize>,
    tokens: Vec<usize>,
    ended_with_eos: bool,
    valid_len: usize,
    attention: Vec<Vec<f32>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load settings first
    let settings = match &cli.config_dir {
        Some(dir) => Settings::from_dir(dir),
        None => Settings::new(),
    }
    .context("failed to load settings")?;

    // Keep the guard alive for the whole run so buffered lines get flushed
    let _guard = init_logging(&settings)?;
    info!("seqattn starting up");

    match cli.command {
        Command::Pool(args) => run_pool(args),
        Command::Decode(args) => run_decode(args, &settings),
    }
}

/// Logs go to a daily rolling file when `logging.file` is configured,
/// otherwise to stderr.
fn init_logging(settings: &Settings) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.logging.level))
        .context("invalid log filter")?;

    match &settings.logging.file {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::RollingFileAppender::new(
                tracing_appender::rolling::Rotation::DAILY,
                dir,
                "seqattn",
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::fmt()
                .with_writer(non_blocking)
                // Disable ANSI colors for cleaner log files
                .with_ansi(false)
                .with_line_number(true)
                .with_file(true)
                .with_target(false)
                .with_env_filter(filter)
                .init();

            let full_log_path = std::fs::canonicalize(dir)?;
            info!("Log directory: {}", full_log_path.display());
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_env_filter(filter)
                .init();
            Ok(None)
        }
    }
}

fn run_pool(args: PoolArgs) -> Result<()> {
    let backend = create_backend();
    let mut init = ParamInit::new(args.seed);
    let attention = AdditiveAttention::new(args.query_dim, args.key_dim, args.hiddens, &mut init, backend)?;

    let query = init.uniform3(args.batch, args.queries, args.query_dim, 1.0);
    let keys = init.uniform3(args.batch, args.seq_len, args.key_dim, 1.0);
    let values = init.uniform3(args.batch, args.seq_len, args.value_dim, 1.0);
    let valid_lens = args
        .valid_len
        .map(|len| ValidLens::uniform_signed(len, args.batch))
        .transpose()?;

    let output = attention
        .compute_context(query.view(), keys.view(), values.view(), valid_lens.as_ref())
        .context("attention pooling failed")?;

    if args.json {
        let report = PoolReport {
            weights: output.weights.outer_iter().map(to_nested).collect(),
            context: output.context.outer_iter().map(to_nested).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let row_labels: Vec<String> = (0..args.queries).map(|q| format!("q{}", q)).collect();
    let col_labels: Vec<String> = (0..args.seq_len).map(|t| format!("k{}", t)).collect();
    for (b, (weights, context)) in output.weights.outer_iter().zip(output.context.outer_iter()).enumerate() {
        println!("{}", format!("Batch element {}", b).bright_green());
        println!("{}", heatmap_table(weights, &row_labels, &col_labels));
        println!("{}", "Context".bright_cyan());
        println!("{}", matrix_table(context, &row_labels));
    }

    Ok(())
}

fn run_decode(args: DecodeArgs, settings: &Settings) -> Result<()> {
    let model = Seq2Seq::new(&settings.model, create_backend())?;
    let options = settings.generation_options();
    let generation = model.generate(&args.tokens, &options).context("generation failed")?;
    let matrix = generation.attention_matrix()?;

    if args.json {
        let report = DecodeReport {
            source: args.tokens,
            tokens: generation.tokens,
            ended_with_eos: generation.ended_with_eos,
            valid_len: generation.valid_len,
            attention: to_nested(matrix.view()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let source = seqattn::seq2seq::truncate_pad(&args.tokens, options.num_steps, options.pad);
    let mut row_labels: Vec<String> = generation.tokens.iter().enumerate().map(|(i, t)| format!("{}: {}", i, t)).collect();
    if generation.ended_with_eos {
        row_labels.push(format!("{}: <eos>", generation.tokens.len()));
    }
    let col_labels: Vec<String> = source
        .iter()
        .enumerate()
        .map(|(i, t)| if i < generation.valid_len { t.to_string() } else { "<pad>".to_string() })
        .collect();

    println!("{}", heatmap_table(matrix.view(), &row_labels, &col_labels));
    println!("{}", format!("Generated {} tokens: {:?}", generation.tokens.len(), generation.tokens).bright_green());
    if generation.tokens.is_empty() {
        println!("{}", "Model predicted EOS at the first step".yellow());
    }

    Ok(())
}
