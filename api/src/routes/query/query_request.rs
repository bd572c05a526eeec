use serde::Deserialize;

/// Body of `POST /query/v1`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub pipeline: String,
    /// Free-form caller tag, copied into the response and the query log.
    #[serde(default)]
    pub client: Option<String>,
}
