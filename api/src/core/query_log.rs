//! Per-query JSON records on disk.
//!
//! - `<data_dir>/logs/queries/<stamp>_<id>.json`: one log per query, success or not
//! - `<data_dir>/deckard_responses/response_<stamp>_<id>.json`: successful responses

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use services::time::{cur_timestamp, file_stamp};
use tracing::debug;

use crate::core::query_response::QueryResponse;
use crate::error_handler::AppResult;

#[derive(Debug, Serialize)]
pub struct QueryLog {
    pub id: String,
    pub client: Option<String>,
    pub pipeline: String,
    pub timestamp: f64,
    pub query: String,
    pub raw_response: String,
    pub response: String,
    pub circuit_breaker: bool,
    pub failure: bool,
    pub lock_wait: f64,
    /// Request time excluding the lock wait.
    pub query_time: f64,
    pub metadata: Vec<Value>,
}

impl QueryLog {
    pub fn from_response(resp: &QueryResponse, raw_response: &str, lock_wait: f64) -> Self {
        let total = resp.timings.get("total").map(|t| t.seconds()).unwrap_or(0.0);
        Self {
            id: resp.id.clone(),
            client: resp.client.clone(),
            pipeline: resp.pipeline.clone(),
            timestamp: cur_timestamp(),
            query: resp.query.clone(),
            raw_response: raw_response.to_string(),
            response: resp.response.clone(),
            circuit_breaker: resp.circuit_breaker,
            failure: !resp.is_answer,
            lock_wait,
            query_time: (total - lock_wait).max(0.0),
            metadata: resp
                .inferences
                .iter()
                .flat_map(|i| i.answer_data.iter().cloned())
                .collect(),
        }
    }

    pub fn write(&self, data_dir: &Path) -> AppResult<PathBuf> {
        let dir = data_dir.join("logs").join("queries");
        let path = dir.join(format!("{}_{}.json", file_stamp(), self.id));
        write_json(&dir, &path, self)?;
        debug!(path = %path.display(), "query log written");
        Ok(path)
    }
}

pub fn write_response(data_dir: &Path, resp: &QueryResponse) -> AppResult<PathBuf> {
    let dir = data_dir.join("deckard_responses");
    let path = dir.join(format!("response_{}_{}.json", file_stamp(), resp.id));
    write_json(&dir, &path, resp)?;
    debug!(path = %path.display(), "response written");
    Ok(path)
}

fn write_json<T: Serialize>(dir: &Path, path: &Path, value: &T) -> AppResult<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(path, serde_json::to_vec_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query_response::QueryResponseBuilder;
    use crate::core::timing::{Timing, Timings};

    #[test]
    fn log_excludes_lock_wait_from_query_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut timings = Timings::new();
        timings.insert("total".into(), Timing::Elapsed(3.0));
        let resp = QueryResponseBuilder::new("q", "library", None, false).finalize(timings);

        let log = QueryLog::from_response(&resp, "raw", 1.0);
        assert!((log.query_time - 2.0).abs() < 1e-9);
        assert!(log.failure);

        let path = log.write(dir.path()).unwrap();
        assert!(path.starts_with(dir.path().join("logs").join("queries")));
        let v: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(v["raw_response"], "raw");
        assert_eq!(v["id"], resp.id.as_str());
    }

    #[test]
    fn responses_go_to_their_own_directory() {
        let dir = tempfile::tempdir().unwrap();
        let resp = QueryResponseBuilder::new("q", "library", None, true).finalize(Timings::new());
        let path = write_response(dir.path(), &resp).unwrap();
        assert!(path.starts_with(dir.path().join("deckard_responses")));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("response_"));
    }

    #[test]
    fn responses_in_the_same_millisecond_keep_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = QueryResponseBuilder::new("q", "library", None, true).finalize(Timings::new());
        let b = QueryResponseBuilder::new("q", "library", None, true).finalize(Timings::new());

        let pa = write_response(dir.path(), &a).unwrap();
        let pb = write_response(dir.path(), &b).unwrap();
        assert_ne!(pa, pb);
        assert!(pa.to_string_lossy().ends_with(&format!("_{}.json", a.id)));
        assert_eq!(std::fs::read_dir(dir.path().join("deckard_responses")).unwrap().count(), 2);
    }
}
