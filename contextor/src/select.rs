//! Merging dense and sparse hits into one ranked stream.

use std::collections::HashSet;

use rag_store::{ResultRow, ResultTable};

/// Alternates dense and sparse rows, dense first, keeping each source's own
/// order. A chunk already taken from one source is skipped in the other.
pub fn interleave(dense: &ResultTable, sparse: &ResultTable) -> ResultTable {
    let mut seen: HashSet<(&str, usize)> = HashSet::new();
    let mut out: Vec<ResultRow> = Vec::with_capacity(dense.len() + sparse.len());

    let mut d = dense.iter();
    let mut s = sparse.iter();
    loop {
        let (a, b) = (d.next(), s.next());
        if a.is_none() && b.is_none() {
            break;
        }
        for row in [a, b].into_iter().flatten() {
            if seen.insert((row.doc_id.as_str(), row.chunk_id)) {
                out.push(row.clone());
            }
        }
    }
    ResultTable::new(out)
}
