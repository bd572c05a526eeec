//! All chains a request needs, built once over one generator.

use std::sync::Arc;

use ai_llm_service::TextGenerator;

use crate::chain::{Chain, PromptChain};
use crate::prompts;

#[derive(Clone)]
pub struct Chains {
    pub context_only: Arc<dyn Chain>,
    pub context_plus: Arc<dyn Chain>,
    pub malicious: Arc<dyn Chain>,
    pub compound: Arc<dyn Chain>,
    pub verify: Arc<dyn Chain>,
    pub summarize: Arc<dyn Chain>,
    pub sources: Arc<dyn Chain>,
    pub qa: Arc<dyn Chain>,
}

impl Chains {
    pub fn build(generator: Arc<dyn TextGenerator>) -> Self {
        let chain = |name: &str, template: &str| -> Arc<dyn Chain> {
            Arc::new(PromptChain::new(name, template, generator.clone()))
        };
        Self {
            context_only: chain("context-only", prompts::CONTEXT_ONLY),
            context_plus: chain("context-plus", prompts::CONTEXT_PLUS),
            malicious: chain("malicious", prompts::MALICIOUS_CLASSIFICATION),
            compound: chain("compound", prompts::EXPLODE_QUERY),
            verify: chain("verify", prompts::VERIFY_RESPONSE),
            summarize: chain("summarize", prompts::SUMMARIZE_RESPONSES),
            sources: chain("sources", prompts::EXTRACT_SOURCES),
            qa: chain("qa", prompts::QA_RESPONSE),
        }
    }
}
