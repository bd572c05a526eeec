//! Turns configuration entries into live components.
//!
//! JSONL-backed stores live under `<data_dir>/databases/<kind>/<name>.jsonl`.
//! Ollama encoders share the process-wide LLM profiles unless a pipeline
//! names its own embedding model.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use rag_store::{
    CharacterChunker, Collector, ContextStore, CosineReranker, DirectoryCollector, Encoder,
    HashingEmbedder, JsonlCollector, JsonlContextStore, JsonlVectorStore, KeywordIndex,
    NoopReranker, OllamaEmbedder, QaBuilder, QdrantVectorStore, RagBuilder, RagConfig, Reranker,
    SolrSparseSearch, SparseSearch, VectorStore, database_path,
};
use tracing::{debug, info};

use crate::cfg::{
    CollectorConfig, ContextDatabaseConfig, DatabaseConfig, EncoderConfig, PipelineConfig,
    QaConfig, RerankerConfig, RerankerKind, SparseSearchConfig, parse,
};
use crate::context::builder_for;
use crate::error::ContextorError;
use crate::qa_stack::QaStack;
use crate::query::processor_for;
use crate::rag_stack::RagStack;

#[derive(Clone)]
pub struct Registry {
    data_dir: PathBuf,
    llm: Option<Arc<LlmServiceProfiles>>,
}

impl Registry {
    /// `llm` may be `None` when every encoder in use is offline.
    pub fn new(data_dir: impl Into<PathBuf>, llm: Option<Arc<LlmServiceProfiles>>) -> Self {
        Self {
            data_dir: data_dir.into(),
            llm,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /* ------------------------------ components ----------------------------- */

    pub fn encoder(&self, cfg: &EncoderConfig) -> Result<Arc<dyn Encoder>, ContextorError> {
        match cfg {
            EncoderConfig::Hashing { dim } => Ok(Arc::new(HashingEmbedder::new(*dim))),
            EncoderConfig::Ollama { model, dim } => {
                let shared = self.llm.clone().ok_or_else(|| {
                    ContextorError::Config("ollama encoder requires LLM profiles".into())
                })?;
                let svc = match model {
                    Some(m) if *m != shared.embedding_config().model => {
                        let mut embedding = shared.embedding_config().clone();
                        embedding.model = m.clone();
                        debug!(model = %m, "dedicated embedding profile");
                        Arc::new(LlmServiceProfiles::new(
                            shared.generation_config().clone(),
                            embedding,
                            Some(10),
                        )?)
                    }
                    _ => shared,
                };
                Ok(Arc::new(OllamaEmbedder::new(svc, *dim)))
            }
        }
    }

    pub fn vector_store(
        &self,
        cfg: &DatabaseConfig,
        kind: &str,
    ) -> Result<Arc<dyn VectorStore>, ContextorError> {
        match cfg {
            DatabaseConfig::Jsonl { name, distance } => Ok(Arc::new(JsonlVectorStore::open(
                database_path(&self.data_dir, kind, name),
                *distance,
            )?)),
            DatabaseConfig::Qdrant {
                name,
                url,
                api_key,
                distance,
                exact,
            } => {
                let rag_cfg = RagConfig {
                    qdrant_url: url.clone(),
                    qdrant_api_key: api_key.clone(),
                    collection: name.clone(),
                    distance: *distance,
                    exact_search: *exact,
                };
                rag_cfg.validate()?;
                Ok(Arc::new(QdrantVectorStore::new(&rag_cfg)?))
            }
        }
    }

    pub fn context_store(
        &self,
        cfg: &ContextDatabaseConfig,
    ) -> Result<Arc<dyn ContextStore>, ContextorError> {
        match cfg {
            ContextDatabaseConfig::Jsonl { name } => Ok(Arc::new(JsonlContextStore::open(
                database_path(&self.data_dir, "contexts", name),
            )?)),
        }
    }

    /// Solr is pinged here, so an unreachable core fails at build time.
    pub async fn sparse_search(
        &self,
        cfg: &SparseSearchConfig,
    ) -> Result<Option<Arc<dyn SparseSearch>>, ContextorError> {
        let sparse: Arc<dyn SparseSearch> = match cfg {
            SparseSearchConfig::None => return Ok(None),
            SparseSearchConfig::Keyword { name } => Arc::new(KeywordIndex::open(database_path(
                &self.data_dir,
                "sparse",
                name,
            ))?),
            SparseSearchConfig::Solr { uri } => Arc::new(SolrSparseSearch::connect(uri).await?),
        };
        debug!(sparse = %sparse.describe(), "sparse search ready");
        Ok(Some(sparse))
    }

    pub fn reranker(
        &self,
        cfg: &RerankerConfig,
        encoder: Arc<dyn Encoder>,
    ) -> Arc<dyn Reranker> {
        match cfg.kind {
            RerankerKind::Cosine => Arc::new(CosineReranker::new(encoder, cfg.max_raw_results)),
            RerankerKind::None => Arc::new(NoopReranker::new(cfg.max_raw_results)),
        }
    }

    pub fn collectors(
        &self,
        cfgs: &[CollectorConfig],
    ) -> Result<Vec<Box<dyn Collector>>, ContextorError> {
        let mut out: Vec<Box<dyn Collector>> = Vec::with_capacity(cfgs.len());
        for c in cfgs {
            match c {
                CollectorConfig::Jsonl { path } => out.push(Box::new(JsonlCollector::open(path)?)),
                CollectorConfig::Directory { path, extensions } => {
                    out.push(Box::new(DirectoryCollector::open(path, extensions)?))
                }
            }
        }
        Ok(out)
    }

    /* -------------------------------- stacks ------------------------------- */

    pub async fn build_rag_stack(&self, cfg: &PipelineConfig) -> Result<RagStack, ContextorError> {
        let encoder = self.encoder(&cfg.embedding_encoder)?;
        let stack = RagStack {
            reranker: self.reranker(&cfg.reranker, encoder.clone()),
            vectors: self.vector_store(&cfg.embedding_database, "vectors")?,
            contexts: self.context_store(&cfg.context_database)?,
            sparse: self.sparse_search(&cfg.sparse_search).await?,
            context_builder: builder_for(cfg.context_builder),
            query_processor: processor_for(cfg.query_processor),
            encoder,
            config: cfg.clone(),
        };
        info!(pipeline = %cfg.name, encoder = %stack.encoder.describe(), vectors = %stack.vectors.describe(), "rag stack ready");
        Ok(stack)
    }

    pub fn build_qa_stack(&self, cfg: &QaConfig) -> Result<QaStack, ContextorError> {
        let stack = QaStack {
            encoder: self.encoder(&cfg.encoder)?,
            store: self.vector_store(&cfg.database, "qa")?,
            config: cfg.clone(),
        };
        info!(qa = %cfg.name, "qa stack ready");
        Ok(stack)
    }

    /* ------------------------------- builders ------------------------------ */

    /// `EMBED_CONCURRENCY` (default 4) bounds encoder calls per document.
    pub async fn rag_builder(&self, cfg: &PipelineConfig) -> Result<RagBuilder, ContextorError> {
        let encoder = self.encoder(&cfg.embedding_encoder)?;
        Ok(RagBuilder {
            vectors: self.vector_store(&cfg.embedding_database, "vectors")?,
            contexts: self.context_store(&cfg.context_database)?,
            sparse: self.sparse_search(&cfg.sparse_search).await?,
            chunker: Arc::new(CharacterChunker::new(cfg.chunker.clone())?),
            collectors: self.collectors(&cfg.collectors)?,
            concurrency: parse("EMBED_CONCURRENCY", 4usize),
            encoder,
        })
    }

    pub fn qa_builder(&self, cfg: &QaConfig) -> Result<QaBuilder, ContextorError> {
        Ok(QaBuilder {
            encoder: self.encoder(&cfg.encoder)?,
            store: self.vector_store(&cfg.database, "qa")?,
            questions: cfg.questions.clone(),
        })
    }
}
