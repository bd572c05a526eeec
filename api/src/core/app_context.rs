//! Heavy objects (RAG stacks, QA stack, chains) and their lifecycle.
//!
//! With `keep` set the objects are built on first use and reused until
//! [`AppContext::invalidate`]; otherwise every request builds its own.
//! Build phases are recorded on the request's timings; on a cache hit the
//! timings from the original build are copied in.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use ai_llm_service::{LlmServiceProfiles, TextGenerator};
use contextor::{DeckardConfig, QaStack, RagStack, Registry};
use llm_chains::Chains;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::timing::{TimingManager, Timings};
use crate::error_handler::{AppError, AppResult};

/// Where prompt chains come from.
#[derive(Clone)]
pub enum ChainSource {
    /// Prompt chains over the generation profile.
    Llm(Arc<LlmServiceProfiles>),
    /// Prebuilt chains, used as-is.
    Fixed(Chains),
}

pub struct HeavyObjects {
    pub stacks: BTreeMap<String, Arc<RagStack>>,
    pub qa: Option<Arc<QaStack>>,
    pub chains: Chains,
    pub build_timings: Timings,
}

impl HeavyObjects {
    pub fn stack(&self, pipeline: &str) -> AppResult<Arc<RagStack>> {
        self.stacks
            .get(pipeline)
            .cloned()
            .ok_or_else(|| AppError::UnknownPipeline(pipeline.to_string()))
    }
}

pub struct AppContext {
    config: Arc<DeckardConfig>,
    registry: Registry,
    chains: ChainSource,
    keep: bool,
    slot: Mutex<Option<Arc<HeavyObjects>>>,
}

impl AppContext {
    pub fn new(config: DeckardConfig, registry: Registry, chains: ChainSource, keep: bool) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            chains,
            keep,
            slot: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &DeckardConfig {
        &self.config
    }

    /// Cached objects if present, else a fresh build (cached when `keep`).
    pub async fn heavy(&self, timings: &mut TimingManager) -> AppResult<Arc<HeavyObjects>> {
        if !self.keep {
            let built = self.build().await?;
            timings.extend(&built.build_timings);
            return Ok(Arc::new(built));
        }

        let mut slot = self.slot.lock().await;
        if let Some(heavy) = slot.as_ref() {
            debug!("reusing cached stacks and chains");
            timings.extend(&heavy.build_timings);
            return Ok(heavy.clone());
        }
        let heavy = Arc::new(self.build().await?);
        timings.extend(&heavy.build_timings);
        *slot = Some(heavy.clone());
        Ok(heavy)
    }

    /// Drops cached objects. Returns whether anything was cached.
    pub async fn invalidate(&self) -> bool {
        let dropped = self.slot.lock().await.take().is_some();
        info!(dropped, "heavy object cache invalidated");
        dropped
    }

    async fn build(&self) -> AppResult<HeavyObjects> {
        let mut t = TimingManager::new();

        let start = Instant::now();
        let mut stacks = BTreeMap::new();
        for (name, pipeline) in &self.config.pipelines {
            let stack = self.registry.build_rag_stack(pipeline).await?;
            stacks.insert(name.clone(), Arc::new(stack));
        }
        let qa = match &self.config.qa {
            Some(qa) => Some(Arc::new(self.registry.build_qa_stack(qa)?)),
            None => None,
        };
        t.record("rag_stack_build_time", start.elapsed());

        let start = Instant::now();
        let chains = match &self.chains {
            ChainSource::Llm(profiles) => {
                let generator: Arc<dyn TextGenerator> = profiles.clone();
                t.record("model_load_time", start.elapsed());
                let start = Instant::now();
                let chains = Chains::build(generator);
                t.record("chain_build_time", start.elapsed());
                chains
            }
            ChainSource::Fixed(chains) => {
                t.record("chain_build_time", start.elapsed());
                chains.clone()
            }
        };

        info!(pipelines = stacks.len(), qa = qa.is_some(), "heavy objects built");
        Ok(HeavyObjects {
            stacks,
            qa,
            chains,
            build_timings: t.snapshot(),
        })
    }
}
