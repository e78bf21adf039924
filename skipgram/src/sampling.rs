use log::debug;
use rand::Rng;

use crate::error::{Error, Result};
use crate::vocab::Vocabulary;

/// Draws that hit an excluded id are retried at most this many times.
pub const MAX_REDRAWS: usize = 64;

/// Unigram table for negative sampling.
///
/// Token `t` owns `round(count(t)^α / Σ count^α * table_size)` consecutive
/// slots, so a uniform slot draw picks `t` with probability proportional to
/// its smoothed frequency. Tokens that round to zero slots are never drawn.
#[derive(Debug, Clone)]
pub struct NegativeSamplingTable {
    table: Vec<u32>,
}

impl NegativeSamplingTable {
    pub fn build(vocab: &Vocabulary, exponent: f64, table_size: usize) -> Result<Self> {
        Self::from_counts(vocab.counts(), exponent, table_size)
    }

    pub fn from_counts(counts: &[u64], exponent: f64, table_size: usize) -> Result<Self> {
        if table_size == 0 {
            return Err(Error::InvalidConfig("table_size must be positive".into()));
        }
        if !exponent.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "smoothing exponent must be finite, got {exponent}"
            )));
        }

        let train_words_pow = counts
            .iter()
            .map(|&cn| (cn as f64).powf(exponent))
            .sum::<f64>();
        if !(train_words_pow > 0.0) {
            return Err(Error::InvalidConfig(
                "negative sampling table needs at least one token with a nonzero count".into(),
            ));
        }

        let mut table = Vec::with_capacity(table_size);
        for (id, &cn) in counts.iter().enumerate() {
            let weight = (cn as f64).powf(exponent) / train_words_pow;
            let slots = (weight * table_size as f64).round() as usize;
            table.extend(std::iter::repeat(id as u32).take(slots));
        }
        if table.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "table_size {table_size} is too small: every token rounded to zero slots"
            )));
        }
        debug!(
            "negative sampling table: {} slots over {} tokens",
            table.len(),
            counts.len()
        );
        Ok(NegativeSamplingTable { table })
    }

    /// Actual number of slots (may differ from the requested size by rounding).
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Fraction of slots owned by `id`.
    pub fn share(&self, id: usize) -> f64 {
        let n = self.table.iter().filter(|&&t| t as usize == id).count();
        n as f64 / self.table.len() as f64
    }

    /// Draw one id, redrawing while it is in `exclude`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R, exclude: &[usize]) -> Result<usize> {
        for _ in 0..MAX_REDRAWS {
            let id = self.table[rng.gen_range(0..self.table.len())] as usize;
            if !exclude.contains(&id) {
                return Ok(id);
            }
        }
        Err(Error::SamplingExhausted {
            exclude: exclude.to_vec(),
            attempts: MAX_REDRAWS,
        })
    }

    /// `k` independent draws, none of them in `exclude`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        k: usize,
        exclude: &[usize],
    ) -> Result<Vec<usize>> {
        (0..k).map(|_| self.draw(rng, exclude)).collect()
    }
}
