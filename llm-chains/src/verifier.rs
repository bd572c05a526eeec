//! Checks whether a generated response actually answers its query.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::chain::{Chain, ChainInputs};
use crate::error::ChainError;
use crate::json_extract::{extract_or_warn, loose_bool};

#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub is_answer: bool,
    pub reason: String,
    pub raw: Value,
}

pub struct ResponseVerifier {
    chain: Arc<dyn Chain>,
}

impl ResponseVerifier {
    pub fn new(chain: Arc<dyn Chain>) -> Self {
        Self { chain }
    }

    /// Unparseable verifier output counts as "not an answer".
    pub async fn verify(&self, query: &str, response: &str) -> Result<Verification, ChainError> {
        let inputs = ChainInputs::new()
            .with("query", query)
            .with("response", response);
        let raw = self.chain.invoke(&inputs).await?;

        let Some(obj) = extract_or_warn(&raw, "verification") else {
            return Ok(rejected("no JSON found in verification output"));
        };
        let Some(is_answer) = loose_bool(obj.get("is_answer")) else {
            return Ok(rejected("`is_answer` not found in verification output"));
        };

        let reason = obj
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("Success")
            .to_string();
        info!(is_answer, "response verified");
        Ok(Verification {
            is_answer,
            reason,
            raw: Value::Object(obj),
        })
    }
}

fn rejected(reason: &str) -> Verification {
    error!(%reason, "verification fell back to false");
    Verification {
        is_answer: false,
        reason: reason.to_string(),
        raw: Value::Object(Default::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ScriptedChain;

    async fn verify(reply: &str) -> Verification {
        let chain = Arc::new(ScriptedChain::always("verify", reply));
        ResponseVerifier::new(chain)
            .verify("q", "r")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn positive_verdict() {
        let v = verify(r#"{"is_answer": true, "reason": "direct"}"#).await;
        assert!(v.is_answer);
        assert_eq!(v.reason, "direct");
    }

    #[tokio::test]
    async fn parse_failure_is_false_with_reason() {
        let v = verify("maybe?").await;
        assert!(!v.is_answer);
        assert!(!v.reason.is_empty());
    }

    #[tokio::test]
    async fn missing_flag_is_false() {
        assert!(!verify(r#"{"reason": "n/a"}"#).await.is_answer);
    }

    #[tokio::test]
    async fn passes_query_and_response() {
        let chain = Arc::new(ScriptedChain::always("v", r#"{"is_answer": false}"#));
        ResponseVerifier::new(chain.clone())
            .verify("when?", "at noon")
            .await
            .unwrap();
        let call = &chain.calls()[0];
        assert_eq!(call.get("query"), Some("when?"));
        assert_eq!(call.get("response"), Some("at noon"));
    }
}
