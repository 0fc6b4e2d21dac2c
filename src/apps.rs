use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, error::ErrorKind};

use crate::config::{GeneratorConfig, ReplacementVocab};
use crate::pipeline::PretrainJob;

#[derive(Debug, Parser)]
#[command(
    name = "create_pretrain_data",
    disable_help_subcommand = true,
    about = "Pregenerate masked-LM / next-sentence training epochs with n-gram spans",
    long_about = "Tokenize a corpus (one sentence per line, blank lines between documents) and write one JSON-lines file of training instances per epoch, each with masked-LM targets, a next-sentence label, and matched n-gram spans.",
    after_help = "--vocab and --ngram-list accept local paths or http(s) URLs; URLs are downloaded once into the cache directory."
)]
struct CreatePretrainDataCli {
    #[arg(long = "train-corpus", value_name = "PATH", help = "Corpus text file")]
    train_corpus: PathBuf,
    #[arg(long = "output-dir", value_name = "DIR", help = "Directory for epoch files")]
    output_dir: PathBuf,
    #[arg(long, value_name = "PATH_OR_URL", help = "WordPiece vocabulary, one token per line")]
    vocab: String,
    #[arg(long = "do-lower-case", help = "Lowercase text before WordPiece")]
    do_lower_case: bool,
    #[arg(
        long = "do-whole-word-mask",
        help = "Mask every piece of a word together"
    )]
    do_whole_word_mask: bool,
    #[arg(
        long = "reduce-memory",
        help = "Keep tokenized documents in a temporary on-disk store"
    )]
    reduce_memory: bool,
    #[arg(
        long = "epochs-to-generate",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Number of epochs of data to pregenerate"
    )]
    epochs_to_generate: usize,
    #[arg(long = "max-seq-len", default_value_t = 128)]
    max_seq_len: usize,
    #[arg(
        long = "short-seq-prob",
        default_value_t = 0.1,
        help = "Probability of making a short sentence as a training example"
    )]
    short_seq_prob: f64,
    #[arg(
        long = "masked-lm-prob",
        default_value_t = 0.15,
        help = "Probability of masking each token for the LM task"
    )]
    masked_lm_prob: f64,
    #[arg(
        long = "max-predictions-per-seq",
        default_value_t = 20,
        help = "Maximum number of tokens to mask in each sequence"
    )]
    max_predictions_per_seq: usize,
    #[arg(
        long = "ngram-list",
        value_name = "PATH_OR_URL",
        help = "N-gram list, one n-gram per line with optional frequency"
    )]
    ngram_list: Option<String>,
    #[arg(
        long = "max-ngram-in-sequence",
        default_value_t = 20,
        help = "Maximum number of n-gram spans kept per sequence"
    )]
    max_ngram_in_sequence: usize,
    #[arg(long, default_value_t = 42, help = "Deterministic seed")]
    seed: u64,
    #[arg(
        long = "cache-dir",
        value_name = "DIR",
        help = "Cache directory for downloaded inputs"
    )]
    cache_dir: Option<PathBuf>,
    #[arg(
        long = "replacement-alphabet",
        value_name = "TOKENS|vocab",
        value_parser = parse_replacement_arg,
        default_value = "a,c,t,g",
        help = "Comma-separated tokens for random substitution, or 'vocab' for the full vocabulary"
    )]
    replacement: ReplacementVocab,
}

impl CreatePretrainDataCli {
    fn into_job(self) -> PretrainJob {
        PretrainJob {
            train_corpus: self.train_corpus,
            output_dir: self.output_dir,
            vocab: self.vocab,
            ngram_list: self.ngram_list,
            do_lower_case: self.do_lower_case,
            reduce_memory: self.reduce_memory,
            cache_dir: self.cache_dir,
            config: GeneratorConfig {
                seed: self.seed,
                epochs_to_generate: self.epochs_to_generate,
                max_seq_len: self.max_seq_len,
                short_seq_prob: self.short_seq_prob,
                masked_lm_prob: self.masked_lm_prob,
                max_predictions_per_seq: self.max_predictions_per_seq,
                max_ngram_in_seq: self.max_ngram_in_sequence,
                whole_word_mask: self.do_whole_word_mask,
                replacement: self.replacement,
                ..GeneratorConfig::default()
            },
        }
    }
}

/// Entry point of the `create_pretrain_data` binary; `args_iter` excludes the program name.
pub fn run_create_pretrain_data<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<CreatePretrainDataCli, _>(
        std::iter::once("create_pretrain_data".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let job = cli.into_job();
    let metrics = job.run()?;
    for (epoch, epoch_metrics) in metrics.iter().enumerate() {
        println!(
            "epoch {epoch}: {} instances -> {}",
            epoch_metrics.num_training_examples,
            crate::output::epoch_file_path(&job.output_dir, epoch as u64).display()
        );
    }
    Ok(())
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{raw}' as a positive integer"))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_replacement_arg(raw: &str) -> Result<ReplacementVocab, String> {
    if raw.trim().eq_ignore_ascii_case("vocab") {
        return Ok(ReplacementVocab::Vocabulary);
    }
    let tokens: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();
    if tokens.is_empty() {
        return Err("--replacement-alphabet needs at least one token".to_string());
    }
    Ok(ReplacementVocab::Alphabet(tokens))
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
