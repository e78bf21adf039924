use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How long to train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingLength {
    /// Full passes over the corpus.
    Epochs(usize),
    /// Total number of positive pairs, regardless of epoch boundaries.
    Pairs(u64),
}

/// Training hyperparameters. Defaults follow the usual word2vec skip-gram
/// settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Embedding vector length.
    pub embed_dims: usize,
    /// Max skip length between words.
    pub window: usize,
    /// Positive pairs per batch.
    pub batch_size: usize,
    /// Negative examples per positive pair; 0 disables negative sampling.
    pub negative_samples_k: usize,
    /// Score contexts through the Huffman tree. When this is set and
    /// `negative_samples_k` is 0, the direct target/context score is skipped.
    pub hierarchical_softmax: bool,
    pub initial_learning_rate: f32,
    /// Pairs between learning-rate recomputations.
    pub lr_decay_interval: u64,
    /// The rate never drops below `initial_learning_rate * min_lr_fraction`.
    pub min_lr_fraction: f32,
    pub table_size: usize,
    pub smoothing_exponent: f64,
    pub length: TrainingLength,
    /// Discard tokens that appear less than this many times.
    pub min_count: u64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            embed_dims: 100,
            window: 5,
            batch_size: 150,
            negative_samples_k: 5,
            hierarchical_softmax: false,
            initial_learning_rate: 0.025,
            lr_decay_interval: 100_000,
            min_lr_fraction: 0.01,
            table_size: 100_000_000,
            smoothing_exponent: 0.75,
            length: TrainingLength::Epochs(5),
            min_count: 1,
            seed: 1,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));
        if self.embed_dims == 0 {
            return fail("embed_dims must be positive");
        }
        if self.window == 0 {
            return fail("window must be positive");
        }
        if self.batch_size == 0 {
            return fail("batch_size must be positive");
        }
        if !(self.initial_learning_rate.is_finite() && self.initial_learning_rate > 0.0) {
            return fail("initial_learning_rate must be a positive number");
        }
        if self.lr_decay_interval == 0 {
            return fail("lr_decay_interval must be positive");
        }
        if !(self.min_lr_fraction > 0.0 && self.min_lr_fraction <= 1.0) {
            return fail("min_lr_fraction must be in (0, 1]");
        }
        if self.negative_samples_k > 0 && self.table_size == 0 {
            return fail("table_size must be positive when negative sampling is enabled");
        }
        if !self.smoothing_exponent.is_finite() {
            return fail("smoothing_exponent must be finite");
        }
        match self.length {
            TrainingLength::Epochs(0) | TrainingLength::Pairs(0) => {
                fail("training length must be positive")
            }
            _ => Ok(()),
        }
    }
}
