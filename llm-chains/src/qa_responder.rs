//! Decides whether curated question/answer entries answer a user question.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::chain::{Chain, ChainInputs};
use crate::error::ChainError;
use crate::json_extract::{extract_or_warn, loose_bool};
use crate::responses::FAIL_RESPONSE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaLink {
    #[serde(default, alias = "label")]
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QaVerdict {
    pub has_response: bool,
    pub response: String,
    pub links: Vec<QaLink>,
}

impl QaVerdict {
    fn miss() -> Self {
        Self {
            has_response: false,
            response: FAIL_RESPONSE.to_string(),
            links: Vec::new(),
        }
    }
}

pub struct QaResponder {
    chain: Arc<dyn Chain>,
}

impl QaResponder {
    pub fn new(chain: Arc<dyn Chain>) -> Self {
        Self { chain }
    }

    /// `qa_data` is a JSON array of `{question, response, links}` entries.
    /// Anything other than a parseable `{"match": true, ...}` is a miss.
    pub async fn respond(&self, query: &str, qa_data: &[Value]) -> Result<QaVerdict, ChainError> {
        if qa_data.is_empty() {
            info!("no QA entries to check");
            return Ok(QaVerdict::miss());
        }

        let inputs = ChainInputs::new()
            .with("user_question", query)
            .with(
                "qa_data",
                serde_json::to_string_pretty(qa_data).unwrap_or_default(),
            );
        let raw = self.chain.invoke(&inputs).await?;

        let Some(obj) = extract_or_warn(&raw, "QA response") else {
            return Ok(QaVerdict::miss());
        };
        let Some(matched) = loose_bool(obj.get("match")) else {
            error!("QA response has no `match` field");
            return Ok(QaVerdict::miss());
        };
        if !matched {
            return Ok(QaVerdict::miss());
        }

        let Some(response) = obj
            .get("response")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|r| !r.is_empty())
        else {
            error!("QA match without a response; treating as miss");
            return Ok(QaVerdict::miss());
        };

        let links = obj
            .get("links")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|l| serde_json::from_value::<QaLink>(l.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        info!("QA entry matched");
        Ok(QaVerdict {
            has_response: true,
            response: response.to_string(),
            links,
        })
    }
}
