//! Malicious-intent classification.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::chain::{Chain, ChainInputs};
use crate::error::ChainError;
use crate::json_extract::extract_or_warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Classification {
    Safe,
    #[serde(rename = "Potentially Malicious")]
    PotentiallyMalicious,
    Malicious,
    Unknown,
}

impl Classification {
    fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "safe" => Self::Safe,
            "potentially malicious" => Self::PotentiallyMalicious,
            "malicious" => Self::Malicious,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "Safe",
            Self::PotentiallyMalicious => "Potentially Malicious",
            Self::Malicious => "Malicious",
            Self::Unknown => "Unknown",
        }
    }

    /// Only an explicit `Safe` lets the request through.
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MaliciousVerdict {
    pub classification: Classification,
    pub reason: String,
    pub raw: Value,
}

pub struct MaliciousClassifier {
    chain: Arc<dyn Chain>,
}

impl MaliciousClassifier {
    pub fn new(chain: Arc<dyn Chain>) -> Self {
        Self { chain }
    }

    /// Classifies `query`. Unparseable output yields `Unknown`, which is not safe.
    pub async fn classify(&self, query: &str) -> Result<MaliciousVerdict, ChainError> {
        let raw = self
            .chain
            .invoke(&ChainInputs::new().with("query", query))
            .await?;

        let Some(obj) = extract_or_warn(&raw, "malicious classification") else {
            let reason = "no JSON found in classifier output".to_string();
            error!(%reason, "malicious classification fell back to Unknown");
            return Ok(unknown(reason));
        };

        let Some(label) = obj.get("classification").and_then(Value::as_str) else {
            let reason = "`classification` not found in classifier output".to_string();
            error!(%reason, "malicious classification fell back to Unknown");
            return Ok(unknown(reason));
        };

        let classification = Classification::parse(label);
        let reason = obj
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("Success")
            .to_string();
        info!(classification = classification.as_str(), "query classified");

        Ok(MaliciousVerdict {
            classification,
            reason,
            raw: Value::Object(obj),
        })
    }
}

fn unknown(reason: String) -> MaliciousVerdict {
    MaliciousVerdict {
        classification: Classification::Unknown,
        reason,
        raw: Value::Object(Default::default()),
    }
}
