//! Attributes a final answer to the URLs of consulted chunks.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::chain::{Chain, ChainInputs};
use crate::error::ChainError;
use crate::json_extract::{extract_or_warn, loose_bool};

/// A chunk that was shown to the model, with the URL it came from (if any).
#[derive(Debug, Clone)]
pub struct SourceChunk {
    pub url: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceExtraction {
    pub found: bool,
    pub reason: String,
    pub source_urls: Vec<String>,
}

pub struct SourceExtractor {
    chain: Arc<dyn Chain>,
    excerpt_chars: usize,
}

impl SourceExtractor {
    pub fn new(chain: Arc<dyn Chain>) -> Self {
        Self {
            chain,
            excerpt_chars: 400,
        }
    }

    /// URLs returned by the model but absent from `chunks` are dropped.
    pub async fn extract(
        &self,
        query: &str,
        response: &str,
        chunks: &[SourceChunk],
    ) -> Result<SourceExtraction, ChainError> {
        let allowed: BTreeSet<&str> = chunks.iter().filter_map(|c| c.url.as_deref()).collect();
        if allowed.is_empty() {
            return Ok(SourceExtraction {
                found: false,
                reason: "no consulted chunk carries a URL".into(),
                source_urls: Vec::new(),
            });
        }

        let sources: Vec<Value> = chunks
            .iter()
            .filter_map(|c| {
                let url = c.url.as_deref()?;
                let excerpt: String = c.text.chars().take(self.excerpt_chars).collect();
                Some(json!({ "url": url, "excerpt": excerpt }))
            })
            .collect();
        let sources = serde_json::to_string_pretty(&sources).unwrap_or_default();

        let inputs = ChainInputs::new()
            .with("query", query)
            .with("response", response)
            .with("sources", sources);
        let raw = self.chain.invoke(&inputs).await?;

        let Some(obj) = extract_or_warn(&raw, "source extraction") else {
            return Ok(SourceExtraction {
                found: false,
                reason: "no JSON found in source extraction output".into(),
                source_urls: Vec::new(),
            });
        };

        let mut urls = Vec::new();
        for url in obj
            .get("source_urls")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
        {
            let url = url.trim();
            if !allowed.contains(url) {
                warn!(%url, "dropping source URL that was not consulted");
                continue;
            }
            if !urls.iter().any(|u| u == url) {
                urls.push(url.to_string());
            }
        }

        let found = loose_bool(obj.get("found")).unwrap_or(!urls.is_empty()) && !urls.is_empty();
        let reason = obj
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("Success")
            .to_string();
        info!(found, count = urls.len(), "sources extracted");

        Ok(SourceExtraction {
            found,
            reason,
            source_urls: urls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ScriptedChain;

    fn chunk(url: &str) -> SourceChunk {
        SourceChunk {
            url: Some(url.into()),
            text: "body".into(),
        }
    }

    #[tokio::test]
    async fn unknown_urls_are_discarded() {
        let reply = r#"{"found": true, "reason": "ok",
            "source_urls": ["https://a", "https://evil", "https://a"]}"#;
        let chain = Arc::new(ScriptedChain::always("src", reply));
        let out = SourceExtractor::new(chain)
            .extract("q", "r", &[chunk("https://a"), chunk("https://b")])
            .await
            .unwrap();
        assert!(out.found);
        assert_eq!(out.source_urls, ["https://a"]);
    }

    #[tokio::test]
    async fn no_urls_means_no_llm_call() {
        let chain = Arc::new(ScriptedChain::always("src", "{}"));
        let chunks = [SourceChunk {
            url: None,
            text: "t".into(),
        }];
        let out = SourceExtractor::new(chain.clone())
            .extract("q", "r", &chunks)
            .await
            .unwrap();
        assert!(!out.found);
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn only_fabricated_urls_is_not_found() {
        let chain = Arc::new(ScriptedChain::always(
            "src",
            r#"{"found": true, "source_urls": ["https://made-up"]}"#,
        ));
        let out = SourceExtractor::new(chain)
            .extract("q", "r", &[chunk("https://a")])
            .await
            .unwrap();
        assert!(!out.found);
        assert!(out.source_urls.is_empty());
    }
}
