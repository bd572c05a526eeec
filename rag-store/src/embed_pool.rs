//! Concurrent chunk encoding with dimension checks.

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use crate::{embed::Encoder, errors::RagError};

/// Encodes `texts` with at most `concurrency` requests in flight.
///
/// Output order matches input order.
///
/// # Errors
/// The first encoder failure, or [`RagError::VectorSizeMismatch`] when a
/// vector does not have `encoder.dim()` components.
pub async fn encode_all(
    encoder: &dyn Encoder,
    texts: &[String],
    concurrency: usize,
) -> Result<Vec<Vec<f32>>, RagError> {
    debug!(total = texts.len(), concurrency, "encoding chunks");
    let want = encoder.dim();

    stream::iter(texts.iter())
        .map(|text| async move {
            let v = encoder.encode(text).await?;
            if v.len() != want {
                return Err(RagError::VectorSizeMismatch { got: v.len(), want });
            }
            Ok(v)
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashingEmbedder;

    #[tokio::test]
    async fn keeps_input_order() {
        let enc = HashingEmbedder::new(16);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let out = encode_all(&enc, &texts, 2).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], enc.encode_sync("beta"));
    }
}
