//! Skip-gram word embeddings trained with negative sampling and/or
//! hierarchical softmax over a Huffman tree.
//!
//! The pipeline is: token stream → [`Vocabulary`] → {[`HuffmanTree`],
//! [`NegativeSamplingTable`]} → [`PairGenerator`] → [`Trainer`], which
//! updates an [`EmbeddingStore`] in place. [`Vectors`] holds the result.

mod config;
pub use config::{TrainingConfig, TrainingLength};

mod error;
pub use error::{Error, Result};

pub mod corpus;

mod embedding;
pub use embedding::{EmbeddingStore, Table};

mod huffman;
pub use huffman::{HuffmanNode, HuffmanTree};

mod pairs;
pub use pairs::{PairGenerator, Pairs, TrainingPair};

mod sampling;
pub use sampling::{NegativeSamplingTable, MAX_REDRAWS};

mod schedule;
pub use schedule::LearningRateSchedule;

mod trainer;
pub use trainer::{BatchStats, StepState, StopHandle, Trainer, TrainerState, TrainingReport};

mod vectors;
pub use vectors::{Model, Vectors};

mod vocab;
pub use vocab::Vocabulary;

pub fn norm(v: &[f32]) -> f32 {
    v.iter().copied().map(|e| e * e).sum::<f32>().sqrt()
}

pub fn normalize(v: &mut [f32]) {
    let len = norm(v);
    if len > 0.0 {
        for e in v {
            *e /= len;
        }
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(&a, &b)| a * b).sum()
}

/// The logistic function, 1 / (1 + e^-x), without overflow for large |x|.
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln(sigmoid(x))`, computed as `-softplus(-x)` so it stays finite.
pub fn log_sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert_eq!(sigmoid(1000.0), 1.0);
        assert_eq!(sigmoid(-1000.0), 0.0);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn log_sigmoid_never_overflows() {
        assert!((log_sigmoid(0.0) - 0.5f32.ln()).abs() < 1e-6);
        assert_eq!(log_sigmoid(1000.0), 0.0);
        assert_eq!(log_sigmoid(-1000.0), -1000.0);
        for x in [-30.0f32, -3.0, -0.5, 0.5, 3.0, 30.0] {
            let naive = (1.0 / (1.0 + (-x).exp())).ln();
            assert!((log_sigmoid(x) - naive).abs() < 1e-5, "x = {x}");
        }
    }

    #[test]
    fn dot_and_norm() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, -5.0, 6.0]), 12.0);
        let mut v = [3.0, 4.0];
        assert_eq!(norm(&v), 5.0);
        normalize(&mut v);
        assert_eq!(v, [0.6, 0.8]);
    }
}
