//! Process-wide state shared by every handler.

use std::path::PathBuf;
use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use contextor::cfg::{env, parse};
use contextor::{DeckardConfig, Registry, config_path, data_dir};
use serde_json::{Value, json};
use tracing::info;

use crate::core::app_context::{AppContext, ChainSource};
use crate::core::lock::{ComputeLock, ExclusiveLock, PerRequestLock};
use crate::error_handler::{AppError, AppResult};

pub struct AppState {
    pub context: AppContext,
    pub lock: Arc<dyn ComputeLock>,
    pub llm: Option<Arc<LlmServiceProfiles>>,
    pub data_dir: PathBuf,
}

impl AppState {
    pub fn new(
        context: AppContext,
        lock: Arc<dyn ComputeLock>,
        llm: Option<Arc<LlmServiceProfiles>>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            context,
            lock,
            llm,
            data_dir: data_dir.into(),
        }
    }

    /// Reads the pipeline file and the LLM profiles from the environment.
    ///
    /// - `GPU_EXCLUSIVE_MODE` (default false): hold the compute lock for the process lifetime
    /// - `GPU_LOCK_FILE` (default `<data_dir>/gpu.lock`)
    /// - `CACHE_STACKS` (default false): reuse heavy objects in per-request mode
    pub async fn from_env() -> AppResult<Self> {
        let data_dir = data_dir();
        let config = DeckardConfig::load(config_path())?;
        let llm = Arc::new(
            LlmServiceProfiles::from_env().map_err(|e| AppError::Config(e.to_string()))?,
        );

        let exclusive = parse("GPU_EXCLUSIVE_MODE", false);
        let lock_path = PathBuf::from(env(
            "GPU_LOCK_FILE",
            &data_dir.join("gpu.lock").to_string_lossy(),
        ));
        let lock: Arc<dyn ComputeLock> = if exclusive {
            Arc::new(ExclusiveLock::open(&lock_path).await?)
        } else {
            Arc::new(PerRequestLock::new(lock_path.clone()))
        };
        let keep = exclusive || parse("CACHE_STACKS", false);
        info!(exclusive, keep, lock = %lock_path.display(), "compute lock configured");

        let registry = Registry::new(data_dir.clone(), Some(llm.clone()));
        let context = AppContext::new(config, registry, ChainSource::Llm(llm.clone()), keep);
        Ok(Self::new(context, lock, Some(llm), data_dir))
    }

    pub fn exclusive_mode(&self) -> bool {
        self.lock.exclusive_mode()
    }

    /// Generation settings recorded in query metadata; API keys never appear.
    pub fn llm_config(&self) -> Value {
        match &self.llm {
            Some(llm) => serde_json::to_value(llm.generation_config()).unwrap_or_default(),
            None => json!({}),
        }
    }
}
