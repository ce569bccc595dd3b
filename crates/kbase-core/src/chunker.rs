//! Recursive character text splitter.
//!
//! Text is split on the first separator of the ladder that occurs in it,
//! keeping each separator attached to the start of the piece that follows.
//! Small pieces are merged back into chunks of at most `chunk_size`
//! characters with up to `chunk_overlap` characters carried over between
//! neighbours; pieces that are still too large are split again with the
//! remaining separators.
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

use crate::error::{Error, Result};

pub const DEFAULT_SEPARATORS: &[&str] =
    &["\n## ", "\n### ", "\n#### ", "\n", ". ", "! ", "? ", ";", ":", " ", ""];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be positive".into()));
        }
        if self.chunk_overlap > self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) is larger than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: ChunkingConfig,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        Self::with_separators(config, DEFAULT_SEPARATORS)
    }

    pub fn with_separators<S: AsRef<str>>(config: ChunkingConfig, separators: &[S]) -> Result<Self> {
        config.validate()?;
        let separators = separators.iter().map(|s| s.as_ref().to_string()).collect();
        Ok(Self { config, separators })
    }

    pub fn config(&self) -> &ChunkingConfig { &self.config }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        self.split_recursive(text, &self.separators, &mut chunks);
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String], out: &mut Vec<String>) {
        let mut separator = separators.last().map_or("", String::as_str);
        let mut remaining: &[String] = &[];
        for (i, s) in separators.iter().enumerate() {
            if s.is_empty() {
                separator = "";
                break;
            }
            if text.contains(s.as_str()) {
                separator = s;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut small: Vec<&str> = Vec::new();
        for piece in split_keep_start(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                self.merge(&small, out);
                small.clear();
            }
            if remaining.is_empty() {
                out.push(piece.to_string());
            } else {
                self.split_recursive(piece, remaining, out);
            }
        }
        if !small.is_empty() {
            self.merge(&small, out);
        }
    }

    fn merge(&self, pieces: &[&str], out: &mut Vec<String>) {
        let ChunkingConfig { chunk_size, chunk_overlap } = self.config;
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;
        for &piece in pieces {
            let len = char_len(piece);
            if total + len > chunk_size {
                if total > chunk_size {
                    warn!(total, chunk_size, "created a chunk longer than the configured size");
                }
                if !current.is_empty() {
                    push_joined(&current, out);
                    while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                        match current.pop_front() {
                            Some(front) => total -= char_len(front),
                            None => break,
                        }
                    }
                }
            }
            current.push_back(piece);
            total += len;
        }
        push_joined(&current, out);
    }
}

fn char_len(s: &str) -> usize { s.chars().count() }

fn push_joined(pieces: &VecDeque<&str>, out: &mut Vec<String>) {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Split `text` on `separator`, attaching each separator to the start of the
/// following piece. The empty separator splits into single characters.
fn split_keep_start<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (at, _) in text.match_indices(separator) {
        pieces.push(&text[start..at]);
        start = at;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}
