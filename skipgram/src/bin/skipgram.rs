use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use skipgram::corpus::read_words;
use skipgram::{Trainer, TrainingConfig, TrainingLength, Vocabulary};

#[derive(Parser)]
#[command(about = "skip-gram word vector estimation", long_about = None)]
struct Options {
    /// Use text data from FILE to train the model
    #[arg(long = "train", value_name = "FILE")]
    train_file: PathBuf,

    /// Use FILE to save the resulting word vectors
    #[arg(long = "output", value_name = "FILE")]
    output_file: PathBuf,

    /// Set size of word vectors
    #[arg(long = "size", default_value_t = 100)]
    embed_dims: usize,

    /// Set max skip length between words
    #[arg(long, default_value_t = 5)]
    window: usize,

    /// Number of positive pairs per update
    #[arg(long = "batch-size", default_value_t = 150)]
    batch_size: usize,

    /// Use Hierarchical Softmax
    #[arg(long)]
    hs: bool,

    /// Number of negative examples; common values are 3 - 10 (0 = not used)
    #[arg(long, default_value_t = 5)]
    negative: usize,

    /// Size of the unigram table used for negative sampling
    #[arg(long = "table-size", default_value_t = 100_000_000)]
    table_size: usize,

    /// Use N threads
    #[arg(long = "threads", value_name = "N", default_value_t = 12)]
    num_threads: usize,

    /// Run more training iterations
    #[arg(long, default_value_t = 5)]
    iter: usize,

    /// Discard words that appear less than N times
    #[arg(long = "min-count", value_name = "N", default_value_t = 5)]
    min_count: u64,

    /// Set the starting learning rate
    #[arg(long, default_value_t = 0.025)]
    alpha: f32,

    /// Recompute the learning rate every N pairs
    #[arg(long = "decay-interval", value_name = "N", default_value_t = 100_000)]
    decay_interval: u64,

    /// Random seed for initialization and sampling
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Save the resulting vectors in binary mode
    #[arg(long, group = "format")]
    binary: bool,

    /// Save the model in bincode format
    #[arg(long, group = "format")]
    bincode: bool,

    /// The vocabulary will be saved to FILE
    #[arg(long = "save-vocab", value_name = "FILE")]
    save_vocab_file: Option<PathBuf>,

    /// The vocabulary will be read from FILE, not constructed from the training data
    #[arg(long = "read-vocab", value_name = "FILE")]
    read_vocab_file: Option<PathBuf>,
}

impl Options {
    fn config(&self) -> TrainingConfig {
        TrainingConfig {
            embed_dims: self.embed_dims,
            window: self.window,
            batch_size: self.batch_size,
            negative_samples_k: self.negative,
            hierarchical_softmax: self.hs,
            initial_learning_rate: self.alpha,
            lr_decay_interval: self.decay_interval,
            table_size: self.table_size,
            length: TrainingLength::Epochs(self.iter),
            min_count: self.min_count,
            seed: self.seed,
            ..TrainingConfig::default()
        }
    }
}

fn read_tokens(train_file: &Path) -> Result<Vec<String>> {
    let fin = BufReader::new(File::open(train_file).context("error opening training data file")?);
    read_words(fin)
        .collect::<std::io::Result<Vec<String>>>()
        .context("error reading training data file")
}

fn read_vocab(vocab_file: &Path) -> Result<Vocabulary> {
    let fin = BufReader::new(File::open(vocab_file).context("error opening vocabulary file")?);
    Vocabulary::read_from(fin).context("error reading vocabulary file")
}

fn save_vocab(vocab: &Vocabulary, vocab_file: &Path) -> Result<()> {
    let fo = BufWriter::new(
        File::create(vocab_file).context("error creating vocab file for write")?,
    );
    vocab.write_to(fo).context("error writing vocab file")
}

fn train_model(options: &Options) -> Result<()> {
    println!(
        "Starting training using file {}",
        options.train_file.display()
    );
    rayon::ThreadPoolBuilder::new()
        .num_threads(options.num_threads)
        .build_global()
        .context("error starting worker threads")?;

    let tokens = read_tokens(&options.train_file)?;
    let config = options.config();
    let mut trainer = match &options.read_vocab_file {
        Some(f) => Trainer::with_vocabulary(config, read_vocab(f)?, &tokens)?,
        None => Trainer::new(config, &tokens)?,
    };
    drop(tokens);
    if let Some(f) = &options.save_vocab_file {
        save_vocab(trainer.vocabulary(), f)?;
    }
    println!("Vocab size: {}", trainer.vocabulary().len());
    println!("Words in train file: {}", trainer.vocabulary().total_count());

    let progress = ProgressBar::new(trainer.total_pairs());
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {percent:>3}% {per_sec} {msg}")
            .context("bad progress bar template")?,
    );
    let stop = trainer.stop_handle();
    let report = trainer.train_with(|stats| {
        progress.set_position(stats.pairs_processed);
        progress.set_message(format!(
            "loss = {:.4}, lr = {:.8}",
            stats.loss / stats.batch_pairs as f32,
            stats.learning_rate
        ));
    });
    progress.finish();
    let report = report?;
    info!(
        "{:?} after {} pairs, final alpha {}, {} negatives skipped",
        report.state,
        report.pairs_processed,
        report.final_learning_rate,
        report.dropped_negatives
    );
    if stop.is_stop_requested() {
        println!("Training stopped early");
    }

    save_output(&trainer, options)
}

fn save_output(trainer: &Trainer, options: &Options) -> Result<()> {
    let fo = BufWriter::new(
        File::create(&options.output_file).context("error creating output file")?,
    );
    if options.bincode {
        bincode::serialize_into(fo, &trainer.snapshot()).context("error writing output file")?;
    } else if options.binary {
        trainer
            .vectors()
            .write_binary(fo)
            .context("error writing output file")?;
    } else {
        trainer
            .vectors()
            .write_text(fo)
            .context("error writing output file")?;
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let options = Options::parse();

    if let Err(err) = train_model(&options) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
