//! Storage side of the RAG pipeline.
//!
//! - Data model: [`Document`] on the way in, [`ResultTable`] on the way out.
//! - Interfaces: [`Encoder`], [`Reranker`], [`VectorStore`], [`ContextStore`],
//!   [`SparseSearch`], [`Collector`], [`Chunker`].
//! - Build pipelines: [`RagBuilder`] and [`QaBuilder`].
//!
//! Every interface is object-safe; async methods return boxed futures so
//! implementations can be selected at runtime from configuration.

pub mod build;
pub mod chunker;
pub mod collect;
pub mod config;
pub mod context_store;
pub mod embed;
pub mod embed_pool;
pub mod errors;
pub mod io_jsonl;
pub mod progress;
pub mod record;
pub mod rerank;
pub mod similarity;
pub mod sparse;
pub mod vector;

pub use build::{BuildReport, QaBuilder, QaEntry, QaLinkSpec, RagBuilder};
pub use chunker::{CharacterChunker, Chunked, Chunker, ChunkerConfig};
pub use collect::{CollectedItem, Collector, DirectoryCollector, JsonlCollector};
pub use config::{DistanceKind, RagConfig, database_path};
pub use context_store::{ContextStore, JsonlContextStore};
pub use embed::{Encoder, HashingEmbedder, OllamaEmbedder};
pub use errors::RagError;
pub use progress::{IndicatifProgress, NoopProgress, Progress};
pub use record::{Document, ResultRow, ResultTable};
pub use rerank::{CosineReranker, NoopReranker, Reranker};
pub use sparse::{KeywordIndex, SolrSparseSearch, SparseSearch};
pub use vector::{JsonlVectorStore, QdrantVectorStore, VectorStore};
