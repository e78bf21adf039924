use std::collections::HashMap;
use std::io::{BufRead, Write};

use crate::error::{Error, Result};

/// Deduplicated token set with per-token counts.
///
/// Ids are dense, in `0..len()`, and assigned in first-seen order, so the
/// same token stream always produces the same ids. Huffman tie-breaking
/// relies on that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    words: Vec<String>,
    counts: Vec<u64>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn build<I>(tokens: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self::build_with_min_count(tokens, 1)
    }

    /// Like `build`, but tokens seen fewer than `min_count` times are
    /// discarded. Survivors keep their relative first-seen order.
    pub fn build_with_min_count<I>(tokens: I, min_count: u64) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut words: Vec<String> = vec![];
        let mut counts: Vec<u64> = vec![];
        let mut index: HashMap<String, usize> = HashMap::new();
        for token in tokens {
            let token = token.as_ref();
            if let Some(&a) = index.get(token) {
                counts[a] += 1;
            } else {
                index.insert(token.to_string(), words.len());
                words.push(token.to_string());
                counts.push(1);
            }
        }

        Self::from_counts(
            words
                .into_iter()
                .zip(counts)
                .filter(|&(_, cn)| cn >= min_count.max(1)),
        )
    }

    /// Builds a vocabulary from `(word, count)` pairs, in the order given.
    ///
    /// Repeated words have their counts merged into the first occurrence.
    pub fn from_counts<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut vocab = Vocabulary {
            words: vec![],
            counts: vec![],
            index: HashMap::new(),
        };
        for (word, cn) in entries {
            if let Some(&a) = vocab.index.get(&word) {
                vocab.counts[a] += cn;
            } else {
                vocab.index.insert(word.clone(), vocab.words.len());
                vocab.words.push(word);
                vocab.counts.push(cn);
            }
        }
        if vocab.words.is_empty() {
            return Err(Error::EmptyVocabulary);
        }
        Ok(vocab)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Get the word for an id. Panics if `id` is out of range.
    pub fn word(&self, id: usize) -> &str {
        &self.words[id]
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn count(&self, id: usize) -> u64 {
        self.counts[id]
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Sum of all token counts.
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Exact match only, case-sensitive.
    pub fn lookup(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    /// Maps a token stream to ids. Tokens not in the vocabulary are dropped.
    pub fn encode<I>(&self, tokens: I) -> Vec<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        tokens
            .into_iter()
            .filter_map(|t| self.lookup(t.as_ref()))
            .collect()
    }

    /// Writes one `word count` line per entry, in id order.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        for (word, cn) in self.words.iter().zip(&self.counts) {
            writeln!(out, "{word} {cn}")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Reads the format produced by `write_to`. Blank lines are skipped.
    pub fn read_from<R: BufRead>(input: R) -> Result<Self> {
        let mut entries = vec![];
        for (line_num, line) in input.lines().enumerate() {
            let line = line?;
            let fields = line.split_whitespace().collect::<Vec<&str>>();
            if fields.is_empty() {
                continue;
            }
            if fields.len() != 2 {
                return Err(Error::Vocabulary {
                    line: line_num + 1,
                    message: format!("expected 2 fields, found {}", fields.len()),
                });
            }
            let cn = fields[1].parse::<u64>().map_err(|err| Error::Vocabulary {
                line: line_num + 1,
                message: format!("unrecognized frequency number format: {err}"),
            })?;
            entries.push((fields[0].to_string(), cn));
        }
        Self::from_counts(entries)
    }
}
