//! Core data models: documents on the way in, result rows on the way out.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::RagError;

/// A collected item after chunking and encoding.
///
/// `chunks[i]`, `raw_chunks[i]` and `embeddings[i]` describe the same slice.
/// `chunks` may carry metadata prefixes; `raw_chunks` is the bare text.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub raw_chunks: Vec<String>,
    pub chunks: Vec<String>,
    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn check_consistent(&self) -> Result<(), RagError> {
        let inconsistent = |detail: String| RagError::InconsistentDocument {
            id: self.id.clone(),
            detail,
        };
        if self.chunks.len() != self.raw_chunks.len() {
            return Err(inconsistent(format!(
                "{} chunks vs {} raw chunks",
                self.chunks.len(),
                self.raw_chunks.len()
            )));
        }
        if self.embeddings.len() != self.chunks.len() {
            return Err(inconsistent(format!(
                "{} embeddings for {} chunks",
                self.embeddings.len(),
                self.chunks.len()
            )));
        }
        Ok(())
    }
}

/// One retrieved chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Store-assigned embedding id.
    pub id: u64,
    pub text: String,
    pub doc_id: String,
    pub chunk_id: usize,
    /// Retrieval distance; lower is closer. Sparse rows use `1 - normalized score`.
    pub distance: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ResultRow {
    /// First of `url`, `source_url`, `source` in the row metadata that looks like a link.
    pub fn url(&self) -> Option<&str> {
        ["url", "source_url", "source"]
            .iter()
            .filter_map(|k| self.metadata.get(*k).and_then(Value::as_str))
            .find(|u| u.starts_with("http://") || u.starts_with("https://"))
    }
}

/// Ranked rows. Ordered by `rerank_score` descending once reranked, else by
/// `distance` ascending.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRow> {
        self.rows.iter()
    }

    pub fn sort_by_distance(&mut self) {
        self.rows.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    }

    /// Rows without a rerank score sink to the bottom.
    pub fn sort_by_rerank_score(&mut self) {
        self.rows.sort_by(|a, b| {
            let a = a.rerank_score.unwrap_or(f32::NEG_INFINITY);
            let b = b.rerank_score.unwrap_or(f32::NEG_INFINITY);
            b.total_cmp(&a)
        });
    }

    pub fn truncate(&mut self, n: usize) {
        self.rows.truncate(n);
    }
}

impl IntoIterator for ResultTable {
    type Item = ResultRow;
    type IntoIter = std::vec::IntoIter<ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a ResultRow;
    type IntoIter = std::slice::Iter<'a, ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl FromIterator<ResultRow> for ResultTable {
    fn from_iter<I: IntoIterator<Item = ResultRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
pub(crate) fn row(text: &str, doc_id: &str, chunk_id: usize, distance: f32) -> ResultRow {
    ResultRow {
        id: 0,
        text: text.to_string(),
        doc_id: doc_id.to_string(),
        chunk_id,
        distance,
        rerank_score: None,
        metadata: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rerank_sort_is_descending_with_unscored_last() {
        let mut a = row("a", "d", 0, 0.1);
        a.rerank_score = Some(0.2);
        let b = row("b", "d", 1, 0.2);
        let mut c = row("c", "d", 2, 0.3);
        c.rerank_score = Some(0.9);
        let mut t = ResultTable::new(vec![a, b, c]);
        t.sort_by_rerank_score();
        let order: Vec<&str> = t.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(order, ["c", "a", "b"]);
    }

    #[test]
    fn url_prefers_http_links() {
        let mut r = row("t", "d", 0, 0.0);
        r.metadata.insert("source".into(), json!("/tmp/file.md"));
        assert_eq!(r.url(), None);
        r.metadata.insert("url".into(), json!("https://lib.example/hours"));
        assert_eq!(r.url(), Some("https://lib.example/hours"));
    }

    #[test]
    fn inconsistent_document_is_rejected() {
        let doc = Document {
            id: "x".into(),
            raw_chunks: vec!["a".into()],
            chunks: vec!["a".into()],
            embeddings: vec![],
            metadata: Map::new(),
        };
        assert!(doc.check_consistent().is_err());
    }

    #[test]
    fn table_serializes_as_plain_array() {
        let t = ResultTable::new(vec![row("a", "d", 0, 0.5)]);
        let v = serde_json::to_value(&t).unwrap();
        assert!(v.is_array());
        assert!(v[0].get("rerank_score").is_none());
    }
}
