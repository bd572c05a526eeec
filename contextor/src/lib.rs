//! Retrieval orchestration for named pipelines.
//!
//! - [`cfg`]: the pipeline definition file and process settings
//! - [`registry`]: config entries to live encoders, stores and builders
//! - [`rag_stack`]: query processing, dense + sparse retrieval, context, chain
//! - [`qa_stack`]: curated question/answer lookup
//! - [`context`]: context assemblers bounded by a character budget

pub mod cfg;
pub mod context;
pub mod error;
pub mod qa_stack;
pub mod query;
pub mod rag_stack;
pub mod registry;
pub mod select;

pub use cfg::{
    DeckardConfig, EncoderConfig, OrchestrationConfig, PipelineConfig, QaConfig, config_path,
    data_dir,
};
pub use context::{ContextBuilder, ContextBundle, ParentDocumentAssembler, SimpleAggregator};
pub use error::ContextorError;
pub use qa_stack::{QaResponse, QaStack};
pub use query::{QueryProcessor, RawQueryProcessor, StandardQueryProcessor};
pub use rag_stack::{MAX_CONTEXTS, RagResponse, RagStack};
pub use registry::Registry;
pub use select::interleave;
