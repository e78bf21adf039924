use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config::{TrainingConfig, TrainingLength};
use crate::embedding::{EmbeddingStore, Table};
use crate::error::{Error, Result};
use crate::huffman::HuffmanTree;
use crate::pairs::{PairGenerator, TrainingPair};
use crate::sampling::NegativeSamplingTable;
use crate::schedule::LearningRateSchedule;
use crate::vectors::{Model, Vectors};
use crate::vocab::Vocabulary;
use crate::{log_sigmoid, sigmoid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Initialized,
    Training,
    /// The planned number of pairs has been consumed.
    Converged,
    /// Stopped early, by request or by a fatal error. The store is still
    /// usable.
    Stopped,
}

/// Requests early termination from another thread.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Optimizer state threaded through each update step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepState {
    pub learning_rate: f32,
    pub pairs_processed: u64,
    pub batches: u64,
    /// Negative log-likelihood summed over the most recent batch.
    pub last_loss: f32,
}

/// Reported to the `train_with` callback after every batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStats {
    pub epoch: usize,
    pub batch: u64,
    pub batch_pairs: usize,
    pub pairs_processed: u64,
    pub total_pairs: u64,
    pub loss: f32,
    pub learning_rate: f32,
    /// Negative draws skipped so far because no eligible id turned up.
    pub dropped_negatives: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub state: TrainerState,
    pub pairs_processed: u64,
    pub batches: u64,
    pub final_learning_rate: f32,
    pub last_loss: f32,
    pub dropped_negatives: u64,
}

/// Gradient contributions of one positive pair, computed against a
/// read-only view of the store.
struct PairGradient {
    target: usize,
    d_input: Array1<f32>,
    d_output: Vec<(usize, Array1<f32>)>,
    loss: f32,
}

#[derive(Debug)]
pub struct Trainer {
    config: TrainingConfig,
    vocab: Vocabulary,
    tree: HuffmanTree,
    table: Option<NegativeSamplingTable>,
    generator: PairGenerator,
    store: EmbeddingStore,
    schedule: LearningRateSchedule,
    step: StepState,
    state: TrainerState,
    total_pairs: u64,
    epoch: usize,
    dropped_negatives: u64,
    stop: Arc<AtomicBool>,
    rng: StdRng,
}

impl Trainer {
    /// Builds the vocabulary from `tokens` and prepares a run over them.
    pub fn new<S: AsRef<str>>(config: TrainingConfig, tokens: &[S]) -> Result<Self> {
        config.validate()?;
        let vocab = Vocabulary::build_with_min_count(tokens, config.min_count)?;
        Self::assemble(config, vocab, tokens)
    }

    /// Like `new`, with a vocabulary prepared elsewhere (e.g. read from a
    /// file). Tokens missing from `vocab` are dropped from the corpus.
    pub fn with_vocabulary<S: AsRef<str>>(
        config: TrainingConfig,
        vocab: Vocabulary,
        tokens: &[S],
    ) -> Result<Self> {
        config.validate()?;
        Self::assemble(config, vocab, tokens)
    }

    /// Builds the tree, table and store for an already validated config.
    fn assemble<S: AsRef<str>>(
        config: TrainingConfig,
        vocab: Vocabulary,
        tokens: &[S],
    ) -> Result<Self> {
        let tree = HuffmanTree::build(&vocab)?;
        let table = if config.negative_samples_k > 0 {
            Some(NegativeSamplingTable::build(
                &vocab,
                config.smoothing_exponent,
                config.table_size,
            )?)
        } else {
            None
        };

        let corpus = vocab.encode(tokens);
        let generator = PairGenerator::new(corpus, config.window, config.negative_samples_k);
        let total_pairs = match config.length {
            TrainingLength::Epochs(n) => n as u64 * generator.positive_pair_count(),
            TrainingLength::Pairs(n) => n,
        };

        let mut rng = StdRng::seed_from_u64(config.seed);
        let store = EmbeddingStore::new(tree.num_nodes(), config.embed_dims, &mut rng);
        let schedule = LearningRateSchedule::new(
            config.initial_learning_rate,
            config.lr_decay_interval,
            total_pairs,
            config.min_lr_fraction,
        );

        info!(
            "vocab size: {}, words in corpus: {}, planned pairs: {}",
            vocab.len(),
            generator.corpus().len(),
            total_pairs
        );

        Ok(Trainer {
            step: StepState {
                learning_rate: config.initial_learning_rate,
                pairs_processed: 0,
                batches: 0,
                last_loss: 0.0,
            },
            config,
            vocab,
            tree,
            table,
            generator,
            store,
            schedule,
            state: TrainerState::Initialized,
            total_pairs,
            epoch: 0,
            dropped_negatives: 0,
            stop: Arc::new(AtomicBool::new(false)),
            rng,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn tree(&self) -> &HuffmanTree {
        &self.tree
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn step(&self) -> &StepState {
        &self.step
    }

    pub fn learning_rate(&self) -> f32 {
        self.step.learning_rate
    }

    pub fn total_pairs(&self) -> u64 {
        self.total_pairs
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop))
    }

    pub fn train(&mut self) -> Result<TrainingReport> {
        self.train_with(|_| {})
    }

    /// Runs until the planned number of pairs is consumed or a stop is
    /// requested. `on_batch` is called after every applied batch.
    ///
    /// Calling this again after `Stopped` or `Converged` does nothing.
    pub fn train_with<F>(&mut self, mut on_batch: F) -> Result<TrainingReport>
    where
        F: FnMut(&BatchStats),
    {
        if matches!(self.state, TrainerState::Converged | TrainerState::Stopped) {
            return Ok(self.report());
        }
        self.state = TrainerState::Training;
        info!(
            "starting training: {} pairs, batch size {}, alpha {}",
            self.total_pairs, self.config.batch_size, self.step.learning_rate
        );

        let batch_size = self.config.batch_size;
        let mut batch: Vec<TrainingPair> = Vec::with_capacity(batch_size);
        let outcome = 'epochs: loop {
            if self.step.pairs_processed >= self.total_pairs {
                break TrainerState::Converged;
            }
            if self.stop.load(Ordering::Relaxed) {
                break TrainerState::Stopped;
            }

            let before_epoch = self.step.pairs_processed;
            let dropped_before_epoch = self.dropped_negatives;
            let mut pairs = self
                .generator
                .pairs(self.table.as_ref(), &mut self.rng)
                .with_stop(&self.stop);
            loop {
                let remaining = self.total_pairs - self.step.pairs_processed;
                batch.clear();
                batch.extend(pairs.by_ref().take(batch_size.min(remaining as usize)));
                self.dropped_negatives = dropped_before_epoch + pairs.dropped_negatives();
                if batch.is_empty() {
                    break;
                }

                let loss = match train_batch(
                    &mut self.store,
                    &self.tree,
                    &self.config,
                    &self.schedule,
                    &mut self.step,
                    &batch,
                ) {
                    Ok(loss) => loss,
                    Err(err) => {
                        self.state = TrainerState::Stopped;
                        return Err(err);
                    }
                };
                on_batch(&BatchStats {
                    epoch: self.epoch,
                    batch: self.step.batches,
                    batch_pairs: batch.len(),
                    pairs_processed: self.step.pairs_processed,
                    total_pairs: self.total_pairs,
                    loss,
                    learning_rate: self.step.learning_rate,
                    dropped_negatives: self.dropped_negatives,
                });

                if self.step.pairs_processed >= self.total_pairs {
                    break 'epochs TrainerState::Converged;
                }
            }
            if self.stop.load(Ordering::Relaxed) {
                break TrainerState::Stopped;
            }
            if self.step.pairs_processed == before_epoch {
                // The corpus yields no pairs at all; more epochs won't help.
                break TrainerState::Converged;
            }
            self.epoch += 1;
            debug!("epoch {} done", self.epoch);
        };

        if self.dropped_negatives > 0 {
            warn!(
                "{} negative draws were skipped: every redraw hit the target or context",
                self.dropped_negatives
            );
        }
        if outcome == TrainerState::Stopped {
            warn!(
                "training stopped after {} of {} pairs",
                self.step.pairs_processed, self.total_pairs
            );
        } else {
            info!(
                "training finished: {} pairs in {} batches",
                self.step.pairs_processed, self.step.batches
            );
        }
        self.state = outcome;
        Ok(self.report())
    }

    pub fn report(&self) -> TrainingReport {
        TrainingReport {
            state: self.state,
            pairs_processed: self.step.pairs_processed,
            batches: self.step.batches,
            final_learning_rate: self.step.learning_rate,
            last_loss: self.step.last_loss,
            dropped_negatives: self.dropped_negatives,
        }
    }

    /// Input embeddings of the vocabulary tokens.
    pub fn vectors(&self) -> Vectors {
        let v = self.vocab.len();
        let embeddings = self
            .store
            .input()
            .slice(s![..v, ..])
            .iter()
            .copied()
            .collect();
        Vectors::new(self.config.embed_dims, self.vocab.words().to_vec(), embeddings)
    }

    /// Both tables plus the vocabulary, for serialization.
    pub fn snapshot(&self) -> Model {
        Model {
            config: self.config.clone(),
            vocab: self
                .vocab
                .words()
                .iter()
                .cloned()
                .zip(self.vocab.counts().iter().copied())
                .collect(),
            size: self.config.embed_dims,
            embeddings: self.store.input().iter().copied().collect(),
            weights: self.store.output().iter().copied().collect(),
        }
    }
}

/// One scored (row, label) term: returns the NLL and the factor
/// `label - sigmoid(score)` that scales both gradients.
fn logistic_term(score: f32, label: f32) -> (f32, f32) {
    let nll = -(label * log_sigmoid(score) + (1.0 - label) * log_sigmoid(-score));
    (nll, label - sigmoid(score))
}

fn pair_gradient(
    store: &EmbeddingStore,
    tree: &HuffmanTree,
    config: &TrainingConfig,
    pair: &TrainingPair,
) -> Result<PairGradient> {
    let u = store.get_input(pair.target);
    let mut d_input = Array1::<f32>::zeros(store.dims());
    let mut d_output = vec![];
    let mut loss = 0.0f32;

    let mut score = |id: usize, label: f32| -> Result<()> {
        let v = store.get_output(id);
        let f = u.dot(&v);
        if !f.is_finite() {
            return Err(Error::NumericInstability { what: "score", id });
        }
        let (nll, g) = logistic_term(f, label);
        if !nll.is_finite() {
            return Err(Error::NumericInstability { what: "loss", id });
        }
        loss += nll;
        // 'g' is the gradient of the log-likelihood with respect to the score
        d_input.scaled_add(g, &v);
        d_output.push((id, &u * g));
        Ok(())
    };

    // Direct target/context scoring, unless hierarchical softmax alone was asked for.
    if config.negative_samples_k > 0 || !config.hierarchical_softmax {
        score(pair.context, 1.0)?;
        for &n in &pair.negatives {
            score(n, 0.0)?;
        }
    }

    // Over predictors in the tree
    if config.hierarchical_softmax {
        let path = tree.path(pair.context);
        let code = tree.code(pair.context);
        for (&node, &bit) in path.iter().zip(code) {
            score(node, 1.0 - bit as f32)?;
        }
    }

    if !d_input.iter().all(|x| x.is_finite()) {
        return Err(Error::NumericInstability {
            what: "gradient",
            id: pair.target,
        });
    }
    Ok(PairGradient {
        target: pair.target,
        d_input,
        d_output,
        loss,
    })
}

/// Computes gradients for the whole batch in parallel, then applies them one
/// row at a time. Returns the batch loss.
fn train_batch(
    store: &mut EmbeddingStore,
    tree: &HuffmanTree,
    config: &TrainingConfig,
    schedule: &LearningRateSchedule,
    step: &mut StepState,
    batch: &[TrainingPair],
) -> Result<f32> {
    let gradients = {
        let store: &EmbeddingStore = store;
        batch
            .par_iter()
            .map(|pair| pair_gradient(store, tree, config, pair))
            .collect::<Result<Vec<PairGradient>>>()?
    };

    let dims = store.dims();
    let mut input_rows: BTreeMap<usize, Array1<f32>> = BTreeMap::new();
    let mut output_rows: BTreeMap<usize, Array1<f32>> = BTreeMap::new();
    let mut loss = 0.0f32;
    for g in gradients {
        loss += g.loss;
        *input_rows
            .entry(g.target)
            .or_insert_with(|| Array1::zeros(dims)) += &g.d_input;
        for (id, d) in g.d_output {
            *output_rows
                .entry(id)
                .or_insert_with(|| Array1::zeros(dims)) += &d;
        }
    }
    if !loss.is_finite() {
        return Err(Error::NumericInstability {
            what: "batch loss",
            id: batch[0].target,
        });
    }

    let alpha = step.learning_rate;
    for (id, delta) in &output_rows {
        store.apply_gradient(Table::Output, *id, delta.view(), alpha);
        store.check_finite(Table::Output, *id)?;
    }
    for (id, delta) in &input_rows {
        store.apply_gradient(Table::Input, *id, delta.view(), alpha);
        store.check_finite(Table::Input, *id)?;
    }

    let before = step.pairs_processed;
    step.pairs_processed += batch.len() as u64;
    step.batches += 1;
    step.last_loss = loss;
    if schedule.crosses_step(before, step.pairs_processed) {
        step.learning_rate = schedule.rate_at(step.pairs_processed);
        debug!(
            "alpha: {}  progress: {:.2}%",
            step.learning_rate,
            step.pairs_processed as f64 / schedule.total().max(1) as f64 * 100.0
        );
    }
    Ok(loss)
}
