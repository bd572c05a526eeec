//! Newline-joined chunk texts in rank order.

use futures::future::BoxFuture;
use rag_store::{ContextStore, ResultTable};
use serde_json::json;
use tracing::debug;

use crate::context::{ContextBuilder, ContextBundle, truncate_chars};
use crate::error::ContextorError;

/// Appends `text + "\n"` per row until the context reaches `size`, then cuts
/// it to exactly `size` characters. Every appended row is listed in
/// `chunks_used`, including one that was cut.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleAggregator;

impl SimpleAggregator {
    pub fn aggregate(results: &ResultTable, size: usize) -> ContextBundle {
        let mut context = String::new();
        let mut len = 0usize;
        let mut chunks_used: Vec<&str> = Vec::new();

        for row in results {
            context.push_str(&row.text);
            context.push('\n');
            len += row.text.chars().count() + 1;
            chunks_used.push(&row.text);
            if len >= size {
                break;
            }
        }

        let context = truncate_chars(&context, size).to_string();
        let context_length = context.chars().count();
        debug!(rows = chunks_used.len(), context_length, "simple context built");
        let metadata = json!({
            "contextbuilder": {
                "chunks_used": chunks_used,
                "context": context,
                "context_length": context_length,
            }
        });
        ContextBundle { context, metadata }
    }
}

impl ContextBuilder for SimpleAggregator {
    fn build_context<'a>(
        &'a self,
        results: &'a ResultTable,
        _store: &'a dyn ContextStore,
        size: usize,
    ) -> BoxFuture<'a, Result<ContextBundle, ContextorError>> {
        Box::pin(async move { Ok(Self::aggregate(results, size)) })
    }
}
