//! Compound-query decomposition and sequential re-contextualisation.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::chain::{Chain, ChainInputs};
use crate::error::ChainError;
use crate::json_extract::{extract_or_warn, loose_bool};

/// One numbered sub-query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubQuery {
    pub key: String,
    pub query: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Decomposition {
    pub is_compound: bool,
    /// Ordered by numeric key; never empty.
    pub queries: Vec<SubQuery>,
    /// `true` when the original query was used because decomposition failed.
    pub fallback: bool,
    pub reason: String,
    pub raw_response: String,
}

pub struct CompoundClassifier {
    chain: Arc<dyn Chain>,
}

impl CompoundClassifier {
    pub fn new(chain: Arc<dyn Chain>) -> Self {
        Self { chain }
    }

    pub async fn explode(&self, query: &str) -> Result<Decomposition, ChainError> {
        let raw = self
            .chain
            .invoke(&ChainInputs::new().with("query", query))
            .await?;

        let parsed = extract_or_warn(&raw, "sub-query extraction").and_then(|obj| {
            let queries = obj.get("queries").map(ordered_queries).unwrap_or_default();
            if queries.is_empty() {
                return None;
            }
            let is_compound = loose_bool(obj.get("is_compound")).unwrap_or(queries.len() > 1);
            Some((is_compound, queries))
        });

        match parsed {
            Some((is_compound, queries)) => {
                info!(count = queries.len(), is_compound, "query decomposed");
                Ok(Decomposition {
                    is_compound,
                    queries,
                    fallback: false,
                    reason: "Successful".into(),
                    raw_response: raw,
                })
            }
            None => {
                let reason = "no usable `queries` in decomposition output".to_string();
                error!(%reason, "using the original query as the only sub-query");
                Ok(Decomposition {
                    is_compound: false,
                    queries: vec![SubQuery {
                        key: "1".into(),
                        query: query.to_string(),
                    }],
                    fallback: true,
                    reason,
                    raw_response: raw,
                })
            }
        }
    }
}

/// Non-blank string entries of a `{"1": "..", "2": ".."}` map, sorted by
/// numeric key (non-numeric keys last, in key order). Arrays are accepted too.
fn ordered_queries(v: &Value) -> Vec<SubQuery> {
    let mut out: Vec<SubQuery> = match v {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, q)| {
                let q = q.as_str()?.trim();
                (!q.is_empty()).then(|| SubQuery {
                    key: k.clone(),
                    query: q.to_string(),
                })
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|q| q.as_str().map(str::trim).filter(|q| !q.is_empty()))
            .enumerate()
            .map(|(i, q)| SubQuery {
                key: (i + 1).to_string(),
                query: q.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };
    out.sort_by_key(|s| s.key.parse::<u64>().unwrap_or(u64::MAX));
    out
}

/// Builds `"Given that <a> and <b>, <sub-query>"` from the answered priors.
///
/// Unanswered priors are skipped. With no answered priors the sub-query is
/// returned unchanged.
pub fn contextualize<'a, I>(sub_query: &str, prior_answers: I) -> String
where
    I: IntoIterator<Item = (&'a str, bool)>,
{
    let facts: Vec<&str> = prior_answers
        .into_iter()
        .filter(|(_, answered)| *answered)
        .map(|(answer, _)| answer.trim().trim_end_matches(['.', '!']).trim())
        .filter(|a| !a.is_empty())
        .collect();

    if facts.is_empty() {
        return sub_query.to_string();
    }
    format!("Given that {}, {}", facts.join(" and "), lower_first(sub_query.trim()))
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
