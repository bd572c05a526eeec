//! Splits document text into overlapping chunks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::RagError;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chunked {
    /// Text to embed, possibly prefixed with document metadata.
    pub chunks: Vec<String>,
    /// Bare chunk text.
    pub raw_chunks: Vec<String>,
    pub metadata: Map<String, Value>,
}

pub trait Chunker: Send + Sync {
    fn generate(&self, content: &str, metadata: Map<String, Value>) -> Chunked;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    #[serde(default = "default_split_on")]
    pub split_on: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub overlap: usize,
    #[serde(default = "default_true")]
    pub add_document_metadata: bool,
}

fn default_split_on() -> String {
    "\n\n".into()
}
fn default_chunk_size() -> usize {
    1000
}
fn default_true() -> bool {
    true
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            split_on: default_split_on(),
            chunk_size: default_chunk_size(),
            overlap: 100,
            add_document_metadata: true,
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 || self.chunk_size <= self.overlap {
            return Err(RagError::Config(format!(
                "chunk_size ({}) must be greater than overlap ({})",
                self.chunk_size, self.overlap
            )));
        }
        Ok(())
    }
}

/// Splits on a separator and greedily merges pieces up to `chunk_size`
/// characters, carrying up to `overlap` characters of trailing pieces into
/// the next chunk. A single piece longer than `chunk_size` becomes its own chunk.
#[derive(Clone, Debug)]
pub struct CharacterChunker {
    cfg: ChunkerConfig,
}

impl CharacterChunker {
    pub fn new(cfg: ChunkerConfig) -> Result<Self, RagError> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let sep = self.cfg.split_on.as_str();
        let pieces: Vec<&str> = if sep.is_empty() {
            vec![text]
        } else {
            text.split(sep).filter(|s| !s.is_empty()).collect()
        };
        merge_pieces(&pieces, sep, self.cfg.chunk_size, self.cfg.overlap)
    }
}

impl Chunker for CharacterChunker {
    fn generate(&self, content: &str, metadata: Map<String, Value>) -> Chunked {
        let raw_chunks = self.split_text(content);
        debug!(chunks = raw_chunks.len(), "content chunked");

        let title = metadata
            .get("title")
            .and_then(Value::as_str)
            .filter(|_| self.cfg.add_document_metadata);
        let chunks = match title {
            Some(t) => raw_chunks.iter().map(|c| format!("{t}\n\n{c}")).collect(),
            None => raw_chunks.clone(),
        };

        Chunked {
            chunks,
            raw_chunks,
            metadata,
        }
    }
}

fn merge_pieces(pieces: &[&str], sep: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let sep_len = sep.chars().count();
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut total = 0usize;

    let flush = |current: &[&str], out: &mut Vec<String>| {
        let joined = current.join(sep);
        let trimmed = joined.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
    };

    for piece in pieces {
        let len = piece.chars().count();
        let joiner = if current.is_empty() { 0 } else { sep_len };
        if total + len + joiner > chunk_size {
            if total > chunk_size {
                warn!(total, chunk_size, "chunk longer than configured size");
            }
            if !current.is_empty() {
                flush(&current, &mut out);
                while total > overlap
                    || (total > 0 && total + len + if current.is_empty() { 0 } else { sep_len } > chunk_size)
                {
                    let first = current.remove(0);
                    total -= first.chars().count() + if current.is_empty() { 0 } else { sep_len };
                }
            }
        }
        current.push(piece);
        total += len + if current.len() > 1 { sep_len } else { 0 };
    }
    flush(&current, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunker(size: usize, overlap: usize) -> CharacterChunker {
        CharacterChunker::new(ChunkerConfig {
            split_on: " ".into(),
            chunk_size: size,
            overlap,
            add_document_metadata: true,
        })
        .unwrap()
    }

    #[test]
    fn merges_up_to_size_with_overlap() {
        let c = chunker(11, 5);
        let out = c.split_text("aaa bbb ccc ddd");
        assert_eq!(out, vec!["aaa bbb ccc", "ccc ddd"]);
    }

    #[test]
    fn no_overlap_means_disjoint_chunks() {
        let c = chunker(7, 0);
        assert_eq!(c.split_text("aaa bbb ccc"), vec!["aaa bbb", "ccc"]);
    }

    #[test]
    fn oversized_piece_stands_alone() {
        let c = chunker(4, 1);
        assert_eq!(c.split_text("abcdefgh ij"), vec!["abcdefgh", "ij"]);
    }

    #[test]
    fn title_prefix_only_on_embedded_chunks() {
        let c = chunker(100, 0);
        let meta = json!({"title": "Hours"}).as_object().cloned().unwrap();
        let out = c.generate("open nine to five", meta);
        assert_eq!(out.raw_chunks, vec!["open nine to five"]);
        assert_eq!(out.chunks, vec!["Hours\n\nopen nine to five"]);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let cfg = ChunkerConfig {
            chunk_size: 10,
            overlap: 10,
            ..Default::default()
        };
        assert!(CharacterChunker::new(cfg).is_err());
    }
}
