//! Whitespace tokenizer for training files.

use std::io::{self, BufRead, ErrorKind};
use std::iter;

/// Words longer than this many bytes are truncated.
pub const MAX_STRING: usize = 100;

fn read_byte<R: BufRead>(fin: &mut R) -> Option<io::Result<u8>> {
    loop {
        return match fin.fill_buf() {
            Ok([]) => None,
            Ok(buf) => {
                let b = buf[0];
                fin.consume(1);
                Some(Ok(b))
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => Some(Err(e)),
        };
    }
}

/// Read words from `fin`, assuming space + tab + EOL to be word boundaries.
///
/// Interrupted reads are retried; any other I/O error is yielded once and
/// ends the stream.
pub fn read_words<R: BufRead>(mut fin: R) -> impl Iterator<Item = io::Result<String>> {
    let mut failed = false;
    iter::from_fn(move || -> Option<io::Result<String>> {
        if failed {
            return None;
        }
        let mut word = Vec::<u8>::new();
        loop {
            let ch = match read_byte(&mut fin) {
                None => break,
                Some(Ok(ch)) => ch,
                Some(Err(err)) => {
                    failed = true;
                    return Some(Err(err));
                }
            };
            if ch == b'\r' {
                continue;
            }
            if ch == b' ' || ch == b'\t' || ch == b'\n' {
                if word.is_empty() {
                    continue;
                }
                break;
            }
            if word.len() < MAX_STRING - 1 {
                word.push(ch); // Truncate too long words
            }
        }
        if word.is_empty() {
            None
        } else {
            Some(Ok(String::from_utf8_lossy(&word).to_string()))
        }
    })
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Read};

    use super::*;

    fn words(text: &str) -> Vec<String> {
        read_words(text.as_bytes()).collect::<io::Result<_>>().unwrap()
    }

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(
            words("the  cat\tsat\r\non\n\nthe mat "),
            ["the", "cat", "sat", "on", "the", "mat"]
        );
        assert!(words(" \n\t ").is_empty());
    }

    #[test]
    fn long_words_are_truncated() {
        let long = "x".repeat(500);
        let w = words(&long);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].len(), MAX_STRING - 1);
    }

    /// Fails with `Interrupted` every other call.
    struct Flaky<'a> {
        data: &'a [u8],
        interrupt: bool,
    }

    impl Read for Flaky<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::Error::new(ErrorKind::Interrupted, "try again"));
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let flaky = Flaky {
            data: b"a b c",
            interrupt: false,
        };
        let got = read_words(BufReader::with_capacity(1, flaky))
            .collect::<io::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(got, ["a", "b", "c"]);
    }
}
