//! Folds per-sub-query answers into one response.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::chain::{Chain, ChainInputs};
use crate::error::ChainError;
use crate::responses::{CAVEAT, FAIL_RESPONSE};

/// One sub-query outcome as seen by the summarizer.
#[derive(Debug, Clone)]
pub struct AnsweredQuery<'a> {
    pub query: &'a str,
    pub response: &'a str,
    pub is_answer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub response: String,
    /// The summarization chain ran.
    pub summarized: bool,
    /// At least one sub-query was answered.
    pub has_answer: bool,
    /// Some sub-queries were unanswered and the caveat sentence is present.
    pub caveat_appended: bool,
}

#[derive(Serialize)]
struct ChainItem<'a> {
    query: &'a str,
    response: &'a str,
    is_response: bool,
}

pub struct ResponseSummarizer {
    chain: Arc<dyn Chain>,
}

impl ResponseSummarizer {
    pub fn new(chain: Arc<dyn Chain>) -> Self {
        Self { chain }
    }

    pub async fn summarize(&self, items: &[AnsweredQuery<'_>]) -> Result<Summary, ChainError> {
        let answered: Vec<&AnsweredQuery<'_>> = items.iter().filter(|i| i.is_answer).collect();

        if answered.is_empty() {
            info!(count = items.len(), "no sub-query was answered");
            return Ok(Summary {
                response: FAIL_RESPONSE.to_string(),
                summarized: false,
                has_answer: false,
                caveat_appended: false,
            });
        }

        if answered.len() == 1 {
            info!("single answered sub-query, passing through");
            return Ok(Summary {
                response: answered[0].response.to_string(),
                summarized: false,
                has_answer: true,
                caveat_appended: false,
            });
        }

        let chain_items: Vec<ChainItem<'_>> = items
            .iter()
            .map(|i| ChainItem {
                query: i.query,
                response: if i.is_answer { i.response } else { "" },
                is_response: i.is_answer,
            })
            .collect();
        let json_data = serde_json::to_string_pretty(&chain_items).unwrap_or_default();

        info!(answered = answered.len(), total = items.len(), "summarizing responses");
        let mut response = self
            .chain
            .invoke(&ChainInputs::new().with("json_data", json_data))
            .await?
            .trim()
            .to_string();

        let caveat_appended = answered.len() < items.len();
        if caveat_appended && !response.contains(CAVEAT) {
            if !response.is_empty() {
                response.push(' ');
            }
            response.push_str(CAVEAT);
        }

        Ok(Summary {
            response,
            summarized: true,
            has_answer: true,
            caveat_appended,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item<'a>(query: &'a str, response: &'a str, is_answer: bool) -> AnsweredQuery<'a> {
        AnsweredQuery {
            query,
            response,
            is_answer,
        }
    }

    #[tokio::test]
    async fn nothing_answered_is_fail_without_llm() {
        let chain = Arc::new(crate::ScriptedChain::always("s", "x"));
        let s = ResponseSummarizer::new(chain.clone());
        for items in [vec![], vec![item("a", "no", false)]] {
            let out = s.summarize(&items).await.unwrap();
            assert_eq!(out.response, FAIL_RESPONSE);
            assert!(!out.has_answer);
        }
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn single_answer_passes_through_verbatim() {
        let chain = Arc::new(crate::ScriptedChain::always("s", "x"));
        let s = ResponseSummarizer::new(chain.clone());
        let out = s
            .summarize(&[item("a", "Paris.", true), item("b", "??", false)])
            .await
            .unwrap();
        assert_eq!(out.response, "Paris.");
        assert!(!out.summarized);
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn multiple_answers_invoke_chain_and_flag_caveat() {
        let chain = Arc::new(crate::ScriptedChain::always("s", "Paris, and Macron."));
        let s = ResponseSummarizer::new(chain.clone());
        let out = s
            .summarize(&[
                item("a", "Paris", true),
                item("b", "Macron", true),
                item("c", "secret", false),
            ])
            .await
            .unwrap();
        assert!(out.summarized && out.caveat_appended);
        assert!(out.response.ends_with(CAVEAT));

        let data = chain.calls()[0].get("json_data").unwrap().to_string();
        assert!(!data.contains("secret"));
        assert!(data.contains("\"is_response\": false"));
    }

    #[tokio::test]
    async fn caveat_is_not_duplicated() {
        let reply = format!("Paris and Macron. {CAVEAT}");
        let chain = Arc::new(crate::ScriptedChain::always("s", reply.clone()));
        let out = ResponseSummarizer::new(chain)
            .summarize(&[item("a", "P", true), item("b", "M", true), item("c", "", false)])
            .await
            .unwrap();
        assert_eq!(out.response, reply);
    }

    #[tokio::test]
    async fn all_answered_has_no_caveat() {
        let chain = Arc::new(crate::ScriptedChain::always("s", "both"));
        let out = ResponseSummarizer::new(chain)
            .summarize(&[item("a", "P", true), item("b", "M", true)])
            .await
            .unwrap();
        assert!(!out.caveat_appended);
        assert_eq!(out.response, "both");
    }
}
