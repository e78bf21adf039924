//! Error types for vocabulary, tree, sampling and training operations.

use std::io;

use thiserror::Error;

/// Errors produced while building the model or training it.
#[derive(Debug, Error)]
pub enum Error {
    /// The token stream contained no tokens (or none survived `min_count`).
    #[error("vocabulary is empty: the token stream contained no usable tokens")]
    EmptyVocabulary,

    /// A Huffman tree needs at least two leaves to have any internal node.
    #[error("cannot build a Huffman tree over {size} token(s); at least 2 are required")]
    DegenerateTree { size: usize },

    /// Every draw in the retry budget hit an excluded id.
    #[error("negative sampling gave up after {attempts} draws hitting excluded ids {exclude:?}")]
    SamplingExhausted { exclude: Vec<usize>, attempts: usize },

    /// A score, loss, gradient or embedding row became NaN or infinite.
    #[error("numeric instability: non-finite {what} (id {id})")]
    NumericInstability { what: &'static str, id: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Syntax error in a saved vocabulary file.
    #[error("vocabulary file syntax error on line {line}: {message}")]
    Vocabulary { line: usize, message: String },

    #[error("invalid vectors file: {0}")]
    VectorsFile(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, Error>;
