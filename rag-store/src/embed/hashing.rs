//! Deterministic feature-hashing encoder for offline runs and tests.
//!
//! Each lowercase alphanumeric token is hashed (FNV-1a) into one of `dim`
//! buckets with a hash-derived sign; the result is L2-normalized. Texts that
//! share words end up close under cosine distance.

use futures::future::BoxFuture;

use crate::embed::Encoder;
use crate::errors::RagError;
use crate::similarity::l2_normalize;

#[derive(Clone, Debug)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn encode_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for token in tokens(text) {
            let h = fnv1a(token.as_bytes());
            let idx = (h % self.dim as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Encoder for HashingEmbedder {
    fn encode<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, RagError>> {
        let v = self.encode_sync(text);
        Box::pin(async move { Ok(v) })
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn describe(&self) -> String {
        format!("hashing:{}", self.dim)
    }
}

/// Lowercased alphanumeric runs.
pub(crate) fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        h ^= u64::from(*b);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine;

    #[tokio::test]
    async fn same_text_same_vector() {
        let e = HashingEmbedder::new(64);
        let a = e.encode("Library hours").await.unwrap();
        let b = e.encode("library HOURS!").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn overlapping_texts_are_closer() {
        let e = HashingEmbedder::new(256);
        let q = e.encode_sync("library hours");
        let near = e.encode_sync("the library hours are nine to five");
        let far = e.encode_sync("parking permits for students");
        assert!(cosine(&q, &near) > cosine(&q, &far));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let v = HashingEmbedder::new(8).encode_sync("  ?! ");
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
