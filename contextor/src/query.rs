//! Query processors: rewrite the user query into the text used for retrieval.
//!
//! The original query is always what reaches the generation chain.

use crate::cfg::QueryProcessorKind;

pub trait QueryProcessor: Send + Sync {
    fn embedding_query(&self, query: &str) -> String;
}

/// Uses the query as typed.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawQueryProcessor;

impl QueryProcessor for RawQueryProcessor {
    fn embedding_query(&self, query: &str) -> String {
        query.to_string()
    }
}

/// Longest prefixes first so "what is the" wins over "what".
const INTERROGATIVE_PREFIXES: &[&str] = &[
    "who are the",
    "what are the",
    "where are the",
    "who is the",
    "what is the",
    "where is the",
    "who is",
    "what is",
    "where is",
    "who are",
    "what are",
    "where are",
    "who",
    "what",
    "where",
];

/// Drops a leading interrogative phrase and trailing punctuation.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardQueryProcessor;

impl QueryProcessor for StandardQueryProcessor {
    fn embedding_query(&self, query: &str) -> String {
        let trimmed = query.trim();
        let rest = INTERROGATIVE_PREFIXES
            .iter()
            .find_map(|p| {
                trimmed
                    .get(..p.len())
                    .filter(|head| head.eq_ignore_ascii_case(p))
                    .map(|_| &trimmed[p.len()..])
            })
            .unwrap_or(trimmed);
        rest.trim_end_matches(['.', ',', '?', '!']).trim().to_string()
    }
}

pub fn processor_for(kind: QueryProcessorKind) -> Box<dyn QueryProcessor> {
    match kind {
        QueryProcessorKind::Raw => Box::new(RawQueryProcessor),
        QueryProcessorKind::Standard => Box::new(StandardQueryProcessor),
    }
}
