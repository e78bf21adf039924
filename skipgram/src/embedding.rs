use ndarray::prelude::*;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

use crate::error::{Error, Result};

/// Which of the two tables an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    /// The learned word vectors ("target" embeddings).
    Input,
    /// Context vectors for negative sampling, and per-node predictors for
    /// hierarchical softmax.
    Output,
}

/// Two `(num_ids, dims)` tables of `f32`.
///
/// Row `k` of `input` is the embedding for id `k`. Only the trainer writes to
/// the store once it has been initialized.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    input: Array2<f32>,
    output: Array2<f32>,
}

impl EmbeddingStore {
    /// Input rows are uniform in `[-0.5/dims, 0.5/dims]`; output rows are zero.
    pub fn new<R: Rng + ?Sized>(num_ids: usize, dims: usize, rng: &mut R) -> Self {
        assert!(dims > 0, "embedding dimensionality must be positive");
        let initrange = 0.5 / dims as f32;
        EmbeddingStore {
            input: Array2::random_using(
                (num_ids, dims),
                Uniform::new_inclusive(-initrange, initrange),
                rng,
            ),
            output: Array2::zeros((num_ids, dims)),
        }
    }

    pub fn num_ids(&self) -> usize {
        self.input.nrows()
    }

    pub fn dims(&self) -> usize {
        self.input.ncols()
    }

    pub fn get_input(&self, id: usize) -> ArrayView1<'_, f32> {
        self.input.row(id)
    }

    pub fn get_output(&self, id: usize) -> ArrayView1<'_, f32> {
        self.output.row(id)
    }

    pub fn input(&self) -> ArrayView2<'_, f32> {
        self.input.view()
    }

    pub fn output(&self) -> ArrayView2<'_, f32> {
        self.output.view()
    }

    /// `row += learning_rate * delta`, in place. No clipping.
    pub fn apply_gradient(
        &mut self,
        table: Table,
        id: usize,
        delta: ArrayView1<'_, f32>,
        learning_rate: f32,
    ) {
        let m = match table {
            Table::Input => &mut self.input,
            Table::Output => &mut self.output,
        };
        assert_eq!(delta.len(), m.ncols(), "gradient length must match dims");
        m.row_mut(id).scaled_add(learning_rate, &delta);
    }

    /// Fails if any element of the given row is NaN or infinite.
    pub fn check_finite(&self, table: Table, id: usize) -> Result<()> {
        let (row, what) = match table {
            Table::Input => (self.input.row(id), "input embedding"),
            Table::Output => (self.output.row(id), "output embedding"),
        };
        if row.iter().all(|x| x.is_finite()) {
            Ok(())
        } else {
            Err(Error::NumericInstability { what, id })
        }
    }
}
