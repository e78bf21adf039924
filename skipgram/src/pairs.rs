use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use rand::Rng;

use crate::sampling::NegativeSamplingTable;

/// A positive `(target, context)` pair and the negatives drawn for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingPair {
    pub target: usize,
    pub context: usize,
    pub negatives: Vec<usize>,
}

/// Sliding-window skip-gram pair source over an encoded corpus.
///
/// The corpus is held in memory, so `pairs` can be called once per epoch and
/// always replays the same positive pairs in the same order.
#[derive(Debug, Clone)]
pub struct PairGenerator {
    corpus: Vec<usize>,
    window: usize,
    negatives: usize,
}

impl PairGenerator {
    pub fn new(corpus: Vec<usize>, window: usize, negatives: usize) -> Self {
        PairGenerator {
            corpus,
            window,
            negatives,
        }
    }

    pub fn corpus(&self) -> &[usize] {
        &self.corpus
    }

    /// Number of positive pairs one pass produces.
    pub fn positive_pair_count(&self) -> u64 {
        let n = self.corpus.len();
        (0..n)
            .map(|i| (self.window.min(i) + self.window.min(n - 1 - i)) as u64)
            .sum()
    }

    /// Starts a pass over the corpus. `table` may be `None` only when no
    /// negatives are requested.
    pub fn pairs<'a, R: Rng + ?Sized>(
        &'a self,
        table: Option<&'a NegativeSamplingTable>,
        rng: &'a mut R,
    ) -> Pairs<'a, R> {
        assert!(
            self.negatives == 0 || table.is_some(),
            "negative sampling requires a table"
        );
        Pairs {
            generator: self,
            table,
            rng,
            stop: None,
            sentence_position: 0,
            offset: 0,
            dropped_negatives: 0,
        }
    }
}

/// Lazy iterator returned by `PairGenerator::pairs`.
pub struct Pairs<'a, R: ?Sized> {
    generator: &'a PairGenerator,
    table: Option<&'a NegativeSamplingTable>,
    rng: &'a mut R,
    stop: Option<&'a AtomicBool>,
    sentence_position: usize,
    /// Index into `-w..=w` minus zero, as `0..2w`.
    offset: usize,
    dropped_negatives: u64,
}

impl<'a, R: Rng + ?Sized> Pairs<'a, R> {
    /// Stop producing pairs once `flag` is set.
    pub fn with_stop(mut self, flag: &'a AtomicBool) -> Self {
        self.stop = Some(flag);
        self
    }

    /// Negative draws given up on so far in this pass because every redraw
    /// hit the target or the context.
    pub fn dropped_negatives(&self) -> u64 {
        self.dropped_negatives
    }

    fn next_positive(&mut self) -> Option<(usize, usize)> {
        let sen = &self.generator.corpus;
        let window = self.generator.window;
        while self.sentence_position < sen.len() {
            while self.offset < 2 * window {
                let a = self.offset;
                self.offset += 1;
                // a in 0..w is to the left, w..2w to the right
                let c = if a < window {
                    match self.sentence_position.checked_sub(window - a) {
                        Some(c) => c,
                        None => continue,
                    }
                } else {
                    self.sentence_position + (a - window) + 1
                };
                if c >= sen.len() {
                    continue;
                }
                return Some((sen[self.sentence_position], sen[c]));
            }
            self.sentence_position += 1;
            self.offset = 0;
        }
        None
    }
}

impl<'a, R: Rng + ?Sized> Iterator for Pairs<'a, R> {
    type Item = TrainingPair;

    fn next(&mut self) -> Option<TrainingPair> {
        if self.stop.map_or(false, |s| s.load(Ordering::Relaxed)) {
            return None;
        }
        let (target, context) = self.next_positive()?;

        let k = self.generator.negatives;
        let mut negatives = Vec::with_capacity(k);
        if let Some(table) = self.table {
            for _ in 0..k {
                match table.draw(&mut *self.rng, &[target, context]) {
                    Ok(id) => negatives.push(id),
                    Err(err) => {
                        self.dropped_negatives += 1;
                        debug!("skipping negative for ({target}, {context}): {err}");
                    }
                }
            }
        }
        Some(TrainingPair {
            target,
            context,
            negatives,
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn positives(generator: &PairGenerator) -> Vec<(usize, usize)> {
        let mut rng = StdRng::seed_from_u64(0);
        generator
            .pairs(None, &mut rng)
            .map(|p| (p.target, p.context))
            .collect()
    }

    #[test]
    fn window_is_clipped_at_bounds() {
        let generator = PairGenerator::new(vec![10, 11, 12, 13], 2, 0);
        assert_eq!(
            positives(&generator),
            vec![
                (10, 11),
                (10, 12),
                (11, 10),
                (11, 12),
                (11, 13),
                (12, 10),
                (12, 11),
                (12, 13),
                (13, 11),
                (13, 12),
            ]
        );
        assert_eq!(generator.positive_pair_count(), 10);
    }

    #[test]
    fn replays_identically() {
        let generator = PairGenerator::new(vec![0, 1, 2, 1, 0, 2, 2], 3, 0);
        let first = positives(&generator);
        assert_eq!(first, positives(&generator));
        assert_eq!(first.len() as u64, generator.positive_pair_count());
    }

    #[test]
    fn empty_and_single_token_corpora() {
        assert!(positives(&PairGenerator::new(vec![], 5, 0)).is_empty());
        let single = PairGenerator::new(vec![3], 5, 0);
        assert!(positives(&single).is_empty());
        assert_eq!(single.positive_pair_count(), 0);
    }

    #[test]
    fn negatives_avoid_target_and_context() {
        let table = NegativeSamplingTable::from_counts(&[5, 5, 5, 5], 0.75, 400).unwrap();
        let generator = PairGenerator::new(vec![0, 1, 2, 3, 0, 1], 2, 4);
        let mut rng = StdRng::seed_from_u64(9);
        for pair in generator.pairs(Some(&table), &mut rng) {
            assert_eq!(pair.negatives.len(), 4);
            for &n in &pair.negatives {
                assert_ne!(n, pair.target);
                assert_ne!(n, pair.context);
            }
        }
    }

    #[test]
    fn exhausted_draws_are_counted() {
        // Two tokens: excluding both target and context leaves nothing to draw.
        let table = NegativeSamplingTable::from_counts(&[3, 3], 0.75, 100).unwrap();
        let generator = PairGenerator::new(vec![0, 1, 0, 1], 1, 2);
        let mut rng = StdRng::seed_from_u64(1);
        let mut pairs = generator.pairs(Some(&table), &mut rng);
        let mut seen = 0;
        for pair in pairs.by_ref() {
            assert!(pair.negatives.is_empty());
            seen += 1;
        }
        assert_eq!(seen, 6);
        assert_eq!(pairs.dropped_negatives(), 12);
    }

    #[test]
    fn stop_flag_ends_the_pass() {
        let generator = PairGenerator::new(vec![0, 1, 0, 1, 0, 1], 2, 0);
        let flag = AtomicBool::new(false);
        let mut rng = StdRng::seed_from_u64(0);
        let mut pairs = generator.pairs(None, &mut rng).with_stop(&flag);
        assert!(pairs.next().is_some());
        flag.store(true, Ordering::Relaxed);
        assert!(pairs.next().is_none());
    }
}
