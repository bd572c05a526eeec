//! Qdrant-backed vector store.
//!
//! Keeps every `qdrant-client` builder call in one place. Payload per point:
//! `embedding_id`, `text`, `doc_id`, `chunk_id`, `metadata`.

use std::collections::HashMap;

use futures::future::BoxFuture;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeleteCollectionBuilder, Distance, ListValue, PointId, PointStruct,
    SearchParamsBuilder, SearchPointsBuilder, Struct, UpsertPointsBuilder, Value as QValue,
    Vector, VectorParamsBuilder, Vectors, value, vectors,
};
use serde_json::{Map, Value};
use services::uuid::stable_uuid;
use tracing::{debug, info, warn};

use crate::config::{DistanceKind, RagConfig};
use crate::errors::RagError;
use crate::record::{Document, ResultRow, ResultTable};
use crate::vector::VectorStore;

pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    distance: DistanceKind,
    exact: bool,
}

impl QdrantVectorStore {
    pub fn new(cfg: &RagConfig) -> Result<Self, RagError> {
        cfg.validate()?;

        let mut builder = Qdrant::from_url(&cfg.qdrant_url);
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder.build().map_err(qerr)?;

        Ok(Self {
            client,
            collection: cfg.collection.clone(),
            distance: cfg.distance,
            exact: cfg.exact_search,
        })
    }

    /// Creates the collection when it is missing.
    async fn ensure_collection(&self, dim: usize) -> Result<(), RagError> {
        if self.client.collection_info(&self.collection).await.is_ok() {
            debug!(collection = %self.collection, "collection exists");
            return Ok(());
        }
        warn!(collection = %self.collection, dim, "collection missing, creating");

        let distance = match self.distance {
            DistanceKind::Cosine => Distance::Cosine,
            DistanceKind::Dot => Distance::Dot,
            DistanceKind::Euclid => Distance::Euclid,
        };
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dim as u64, distance)),
            )
            .await
            .map_err(qerr)?;
        info!(collection = %self.collection, "collection created");
        Ok(())
    }

    async fn drop_collection(&self) -> Result<(), RagError> {
        if self.client.collection_info(&self.collection).await.is_err() {
            return Ok(());
        }
        self.client
            .delete_collection(DeleteCollectionBuilder::new(&self.collection))
            .await
            .map_err(qerr)?;
        Ok(())
    }
}

impl VectorStore for QdrantVectorStore {
    fn flush_data(&self) -> BoxFuture<'_, Result<(), RagError>> {
        Box::pin(async move {
            self.drop_collection().await?;
            info!(collection = %self.collection, "qdrant collection flushed");
            Ok(())
        })
    }

    fn add_embeddings<'a>(
        &'a self,
        doc: &'a Document,
        start_id: u64,
        create_table: bool,
    ) -> BoxFuture<'a, Result<u64, RagError>> {
        Box::pin(async move {
            doc.check_consistent()?;
            let Some(dim) = doc.embeddings.first().map(Vec::len) else {
                return Ok(start_id);
            };
            if create_table {
                self.drop_collection().await?;
            }
            self.ensure_collection(dim).await?;

            let (points, last_id) = build_points(doc, start_id);
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
                .await
                .map_err(qerr)?;
            debug!(doc_id = %doc.id, last_id, "points upserted");
            Ok(last_id)
        })
    }

    fn query<'a>(
        &'a self,
        vector: &'a [f32],
        limit: usize,
        max_distance: f32,
    ) -> BoxFuture<'a, Result<ResultTable, RagError>> {
        Box::pin(async move {
            let mut builder =
                SearchPointsBuilder::new(&self.collection, vector.to_vec(), limit as u64)
                    .with_payload(true);
            if self.exact {
                builder = builder.params(SearchParamsBuilder::default().exact(true));
            }
            let res = self.client.search_points(builder).await.map_err(qerr)?;

            let mut rows = Vec::with_capacity(res.result.len());
            for hit in res.result {
                let distance = self.distance.from_qdrant_score(hit.score);
                if distance > max_distance {
                    continue;
                }
                let payload = qpayload_to_json(hit.payload);
                rows.push(row_from_payload(payload, distance));
            }
            let mut table = ResultTable::new(rows);
            table.sort_by_distance();
            debug!(returned = table.len(), limit, max_distance, "qdrant query");
            Ok(table)
        })
    }

    fn describe(&self) -> String {
        format!("qdrant:{}", self.collection)
    }
}

fn qerr(e: impl std::fmt::Display) -> RagError {
    RagError::Qdrant(e.to_string())
}

fn build_points(doc: &Document, start_id: u64) -> (Vec<PointStruct>, u64) {
    let mut id = start_id;
    let mut pts = Vec::with_capacity(doc.embeddings.len());
    for (chunk_id, vector) in doc.embeddings.iter().enumerate() {
        id += 1;
        let mut payload: HashMap<String, QValue> = HashMap::new();
        payload.insert("embedding_id".into(), json_to_qvalue(Value::from(id)));
        payload.insert("text".into(), json_to_qvalue(Value::from(doc.raw_chunks[chunk_id].clone())));
        payload.insert("doc_id".into(), json_to_qvalue(Value::from(doc.id.clone())));
        payload.insert("chunk_id".into(), json_to_qvalue(Value::from(chunk_id as u64)));
        payload.insert("metadata".into(), json_to_qvalue(Value::Object(doc.metadata.clone())));

        let pid: PointId = stable_uuid(&format!("{}:{}", doc.id, chunk_id)).to_string().into();
        let vectors = Vectors {
            vectors_options: Some(vectors::VectorsOptions::Vector(Vector {
                data: vector.clone(),
                indices: None,
                vectors_count: None,
                vector: None,
            })),
        };
        pts.push(PointStruct {
            id: Some(pid),
            payload,
            vectors: Some(vectors),
            ..Default::default()
        });
    }
    (pts, id)
}

fn row_from_payload(payload: Value, distance: f32) -> ResultRow {
    let get_str = |k: &str| {
        payload
            .get(k)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    ResultRow {
        id: payload.get("embedding_id").and_then(Value::as_u64).unwrap_or(0),
        text: get_str("text"),
        doc_id: get_str("doc_id"),
        chunk_id: payload.get("chunk_id").and_then(Value::as_u64).unwrap_or(0) as usize,
        distance,
        rerank_score: None,
        metadata: payload
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    }
}

fn json_to_qvalue(v: Value) -> QValue {
    use value::Kind as K;
    let kind = match v {
        Value::String(s) => Some(K::StringValue(s)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(K::IntegerValue(i)),
            (None, Some(f)) => Some(K::DoubleValue(f)),
            _ => Some(K::StringValue(n.to_string())),
        },
        Value::Bool(b) => Some(K::BoolValue(b)),
        Value::Array(arr) => Some(K::ListValue(ListValue {
            values: arr.into_iter().map(json_to_qvalue).collect(),
        })),
        Value::Object(map) => Some(K::StructValue(Struct {
            fields: map.into_iter().map(|(k, v)| (k, json_to_qvalue(v))).collect(),
        })),
        Value::Null => None,
    };
    QValue { kind }
}

fn qvalue_to_json(v: QValue) -> Value {
    use value::Kind as K;
    match v.kind {
        Some(K::StringValue(s)) => Value::String(s),
        Some(K::IntegerValue(i)) => Value::from(i),
        Some(K::DoubleValue(f)) => serde_json::json!(f),
        Some(K::BoolValue(b)) => Value::Bool(b),
        Some(K::ListValue(l)) => Value::Array(l.values.into_iter().map(qvalue_to_json).collect()),
        Some(K::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, qvalue_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
        Some(K::NullValue(_)) | None => Value::Null,
    }
}

fn qpayload_to_json(p: HashMap<String, QValue>) -> Value {
    Value::Object(p.into_iter().map(|(k, v)| (k, qvalue_to_json(v))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn points_get_sequential_embedding_ids() {
        let doc = Document {
            id: "d1".into(),
            raw_chunks: vec!["a".into(), "b".into()],
            chunks: vec!["T\n\na".into(), "T\n\nb".into()],
            embeddings: vec![vec![0.1, 0.2], vec![0.3, 0.4]],
            metadata: json!({"url": "https://x.example"}).as_object().cloned().unwrap(),
        };
        let (pts, last) = build_points(&doc, 10);
        assert_eq!(last, 12);
        assert_eq!(pts.len(), 2);

        let payload = qpayload_to_json(pts[1].payload.clone());
        let row = row_from_payload(payload, 0.25);
        assert_eq!(row.id, 12);
        assert_eq!(row.text, "b");
        assert_eq!(row.chunk_id, 1);
        assert_eq!(row.url(), Some("https://x.example"));
    }

    #[test]
    fn nested_payload_survives_conversion() {
        let v = json!({"tags": ["a", 1, true], "inner": {"k": 2.5}, "none": null});
        assert_eq!(qvalue_to_json(json_to_qvalue(v.clone())), v);
    }
}
