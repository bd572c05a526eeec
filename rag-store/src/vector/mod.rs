//! Dense vector stores.
//!
//! Ids are assigned by the caller: a document's chunks receive
//! `start_id + 1 ..= start_id + n` and `add_embeddings` returns the last id
//! written, which is the `start_id` for the next document.

use futures::future::BoxFuture;

use crate::errors::RagError;
use crate::record::{Document, ResultTable};

pub mod jsonl;
pub mod qdrant;

pub use jsonl::JsonlVectorStore;
pub use qdrant::QdrantVectorStore;

pub trait VectorStore: Send + Sync {
    /// Drops every stored vector.
    fn flush_data(&self) -> BoxFuture<'_, Result<(), RagError>>;

    /// Stores one vector per chunk. `create_table` replaces existing contents.
    fn add_embeddings<'a>(
        &'a self,
        doc: &'a Document,
        start_id: u64,
        create_table: bool,
    ) -> BoxFuture<'a, Result<u64, RagError>>;

    /// Nearest rows by ascending distance. Rows farther than `max_distance` are never returned.
    fn query<'a>(
        &'a self,
        vector: &'a [f32],
        limit: usize,
        max_distance: f32,
    ) -> BoxFuture<'a, Result<ResultTable, RagError>>;

    fn describe(&self) -> String;
}
