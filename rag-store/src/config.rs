//! Distance kinds, Qdrant connection settings and on-disk layout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::RagError;
use crate::similarity::{cosine, dot};

/// Distance function used for the vector space. Lower distance is closer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceKind {
    /// `1 - cos(a, b)`, in `0.0..=2.0`.
    #[default]
    Cosine,
    /// Negated dot product (useful for normalized vectors).
    Dot,
    /// Squared Euclidean distance.
    Euclid,
}

impl DistanceKind {
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => 1.0 - cosine(a, b),
            Self::Dot => -dot(a, b),
            Self::Euclid => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum(),
        }
    }

    /// Converts a Qdrant similarity score into this crate's distance.
    pub fn from_qdrant_score(&self, score: f32) -> f32 {
        match self {
            Self::Cosine => 1.0 - score,
            Self::Dot => -score,
            // Qdrant already reports Euclid as a distance.
            Self::Euclid => score * score,
        }
    }
}

/// Connection settings for a Qdrant-backed store.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Qdrant gRPC endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Target collection name.
    pub collection: String,
    pub distance: DistanceKind,
    /// Exact search flag (false = HNSW ANN).
    pub exact_search: bool,
}

impl RagConfig {
    pub fn new_default(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            collection: collection.into(),
            distance: DistanceKind::Cosine,
            exact_search: true,
        }
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.qdrant_url.trim().is_empty() {
            return Err(RagError::Config("qdrant_url is empty".into()));
        }
        if self.collection.trim().is_empty() {
            return Err(RagError::Config("collection is empty".into()));
        }
        Ok(())
    }
}

/// `<data_dir>/databases/<kind>/<name>.jsonl`
pub fn database_path(data_dir: &Path, kind: &str, name: &str) -> PathBuf {
    data_dir
        .join("databases")
        .join(kind)
        .join(format!("{name}.jsonl"))
}
