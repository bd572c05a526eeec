//! Prompt chains and their parsing contracts.
//!
//! Every wrapper invokes one [`Chain`], scans the raw output for a JSON object
//! with [`json_extract::extract_first_json_block`] and maps parse failures to a
//! documented fallback. Only upstream model errors are returned as `Err`.

pub mod bundle;
pub mod chain;
pub mod compound;
pub mod error;
pub mod json_extract;
pub mod malicious;
pub mod postprocess;
pub mod prompts;
pub mod qa_responder;
pub mod responses;
pub mod sources;
pub mod summarizer;
pub mod verifier;

pub use bundle::Chains;
pub use chain::{Chain, ChainInputs, PromptChain, ScriptedChain};
pub use compound::{CompoundClassifier, Decomposition, SubQuery, contextualize};
pub use error::ChainError;
pub use malicious::{Classification, MaliciousClassifier, MaliciousVerdict};
pub use postprocess::{Guarded, ResponseProcessor, guard};
pub use qa_responder::{QaLink, QaResponder, QaVerdict};
pub use responses::{CAVEAT, ERROR_RESPONSE, FAIL_RESPONSE, NO_CONTEXT_RESPONSE};
pub use sources::{SourceChunk, SourceExtraction, SourceExtractor};
pub use summarizer::{AnsweredQuery, ResponseSummarizer, Summary};
pub use verifier::{ResponseVerifier, Verification};
