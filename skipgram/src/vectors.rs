use std::io::{BufRead, Read, Write};
use std::ops::Index;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{dot, normalize, TrainingConfig};

/// Final word vectors: one input-embedding row per vocabulary entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Vectors {
    /// Embedding vector length (number of dimensions).
    size: usize,

    /// The vocabulary.
    vocab: Vec<String>,

    /// `embeddings[k * size..(k+1) * size]` is the vector embedding for word `k`.
    embeddings: Vec<f32>,
}

impl Index<usize> for Vectors {
    type Output = [f32];

    fn index(&self, i: usize) -> &[f32] {
        &self.embeddings[i * self.size..][..self.size]
    }
}

impl Vectors {
    pub fn new(size: usize, vocab: Vec<String>, embeddings: Vec<f32>) -> Self {
        assert_eq!(vocab.len() * size, embeddings.len());
        Vectors {
            size,
            vocab,
            embeddings,
        }
    }

    pub fn num_words(&self) -> usize {
        self.vocab.len()
    }

    /// Returns the vector size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the index for a word as string. Exact match only, case-sensitive.
    pub fn lookup_word(&self, word: &str) -> Option<usize> {
        self.vocab.iter().position(|v| v == word)
    }

    /// Get the word for a word-index. Panics if `word` is out of range.
    pub fn word(&self, word: usize) -> &str {
        &self.vocab[word]
    }

    pub fn get(&self, word: &str) -> Option<&[f32]> {
        self.lookup_word(word).map(|i| &self[i])
    }

    /// The `n` words closest to `word` by cosine similarity, best first.
    pub fn nearest(&self, word: &str, n: usize) -> Option<Vec<(&str, f32)>> {
        let i = self.lookup_word(word)?;
        let mut query = self[i].to_vec();
        normalize(&mut query);

        let mut best: Vec<(&str, f32)> = (0..self.num_words())
            .filter(|&c| c != i)
            .map(|c| {
                let mut row = self[c].to_vec();
                normalize(&mut row);
                (self.vocab[c].as_str(), dot(&query, &row))
            })
            .collect();
        best.sort_by_key(|&(_word, dist)| std::cmp::Reverse(OrderedFloat(dist)));
        best.truncate(n);
        Some(best)
    }

    /// Text layout: a `words size` header, then `word v1 v2 ...` per line.
    pub fn write_text<W: Write>(&self, mut fo: W) -> Result<()> {
        writeln!(fo, "{} {}", self.num_words(), self.size)?;
        for (a, word) in self.vocab.iter().enumerate() {
            write!(fo, "{word} ")?;
            for f in &self[a] {
                write!(fo, "{f} ")?;
            }
            writeln!(fo)?;
        }
        fo.flush()?;
        Ok(())
    }

    /// Binary layout: the text header, then for each word `word `, the raw
    /// native-endian `f32`s, and a newline.
    pub fn write_binary<W: Write>(&self, mut fo: W) -> Result<()> {
        writeln!(fo, "{} {}", self.num_words(), self.size)?;
        for (a, word) in self.vocab.iter().enumerate() {
            write!(fo, "{word} ")?;
            fo.write_all(bytemuck::cast_slice::<f32, u8>(&self[a]))?;
            writeln!(fo)?;
        }
        fo.flush()?;
        Ok(())
    }

    /// Reads the layout produced by `write_binary`.
    pub fn load_binary<R: BufRead>(mut f: R) -> Result<Self> {
        let invalid = |msg: &str| Error::VectorsFile(msg.to_string());

        let mut line = String::new();
        f.read_line(&mut line)?;
        let mut fields = line.split_whitespace();
        let mut header_field = || -> Result<usize> {
            fields
                .next()
                .ok_or_else(|| invalid("short header"))?
                .parse()
                .map_err(|_| invalid("bad number in header"))
        };
        let num_words = header_field()?;
        let size = header_field()?;

        let row_bytes = size.checked_mul(std::mem::size_of::<f32>());
        let row_bytes = match (row_bytes, num_words.checked_mul(size)) {
            (Some(n), Some(_)) => n,
            _ => return Err(invalid("header too large")),
        };

        // Rows are appended as they are read; the header alone never sizes an
        // allocation.
        let mut vocab: Vec<String> = vec![];
        let mut m: Vec<f32> = vec![];
        let mut row: Vec<u8> = vec![];
        for _ in 0..num_words {
            let mut vocab_word = Vec::<u8>::new();
            let count = f.read_until(b' ', &mut vocab_word)?;
            if count == 0 {
                return Err(invalid("unexpected end of file"));
            }
            if vocab_word.last() == Some(&b' ') {
                vocab_word.pop();
            }
            vocab_word.retain(|c| *c != b'\n');
            let word =
                String::from_utf8(vocab_word).map_err(|_| invalid("word is not UTF-8"))?;
            vocab.push(word);

            row.clear();
            f.by_ref().take(row_bytes as u64).read_to_end(&mut row)?;
            if row.len() != row_bytes {
                return Err(invalid("unexpected end of file"));
            }
            m.extend(
                row.chunks_exact(4)
                    .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]])),
            );
        }

        Ok(Vectors::new(size, vocab, m))
    }
}

/// Everything needed to resume or inspect a run, for bincode output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub config: TrainingConfig,
    pub vocab: Vec<(String, u64)>,
    pub size: usize,
    /// Input table, row-major, `2V - 1` rows.
    pub embeddings: Vec<f32>,
    /// Output table, row-major, `2V - 1` rows.
    pub weights: Vec<f32>,
}
