//! Context assemblers: ranked rows in, one bounded string plus provenance out.
//!
//! Lengths are measured in characters. The returned context never exceeds
//! the requested size.

use futures::future::BoxFuture;
use rag_store::{ContextStore, ResultTable};
use serde::Serialize;
use serde_json::Value;

use crate::cfg::ContextBuilderKind;
use crate::error::ContextorError;

pub mod parent_document;
pub mod simple;

pub use parent_document::ParentDocumentAssembler;
pub use simple::SimpleAggregator;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ContextBundle {
    pub context: String,
    /// `{"contextbuilder": {...}}` with the items used and the final length.
    pub metadata: Value,
}

impl ContextBundle {
    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }
}

pub trait ContextBuilder: Send + Sync {
    fn build_context<'a>(
        &'a self,
        results: &'a ResultTable,
        store: &'a dyn ContextStore,
        size: usize,
    ) -> BoxFuture<'a, Result<ContextBundle, ContextorError>>;
}

pub fn builder_for(kind: ContextBuilderKind) -> Box<dyn ContextBuilder> {
    match kind {
        ContextBuilderKind::Simple => Box::new(SimpleAggregator),
        ContextBuilderKind::ParentDocument => Box::new(ParentDocumentAssembler),
    }
}

/// First `n` characters of `s`.
pub(crate) fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Characters `start..end` of `s`, clamped to its length.
pub(crate) fn char_slice(s: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let byte_at = |n: usize| s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len());
    &s[byte_at(start)..byte_at(end)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_helpers_respect_multibyte_text() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
        assert_eq!(char_slice("héllo wörld", 1, 4), "éll");
        assert_eq!(char_slice("abc", 2, 99), "c");
        assert_eq!(char_slice("abc", 3, 1), "");
    }
}
