//! The `/query/v1` response and its builder.
//!
//! Stages write through named setters; [`QueryResponseBuilder::finalize`] is
//! the only way to obtain a serializable [`QueryResponse`].

use llm_chains::{
    Classification, Decomposition, ERROR_RESPONSE, FAIL_RESPONSE, MaliciousVerdict, QaLink,
    SourceExtraction, SubQuery, Summary,
};
use serde::Serialize;
use serde_json::Value;
use services::uuid::gen_uuid;

use crate::core::timing::Timings;

/// One sub-query's pass through retrieval, generation and verification.
#[derive(Clone, Debug, Serialize)]
pub struct InferenceRecord {
    pub key: String,
    pub query: String,
    /// The sub-query after "Given that ..." contextualization.
    pub constructed_query: String,
    pub response: String,
    pub is_answer: bool,
    pub reason: String,
    /// Metadata accumulated by the RAG stack.
    pub answer_data: Vec<Value>,
    pub chunks_used: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MaliciousSection {
    pub classification: Classification,
    pub reason: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct QueryResponse {
    pub id: String,
    pub query: String,
    pub pipeline: String,
    pub client: Option<String>,
    pub exclusive_mode: bool,
    pub is_answer: bool,
    pub qa_answered: bool,
    pub qa_links: Vec<QaLink>,
    pub malicious: Option<MaliciousSection>,
    pub sub_queries: Vec<SubQuery>,
    pub inferences: Vec<InferenceRecord>,
    pub response: String,
    pub source_urls: Vec<String>,
    pub summarized: bool,
    pub caveat_appended: bool,
    pub circuit_breaker: bool,
    pub timings: Timings,
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

pub struct QueryResponseBuilder {
    inner: QueryResponse,
    raw_response: String,
}

impl QueryResponseBuilder {
    /// Starts a response with a fresh id and the fail sentence as the answer.
    pub fn new(query: &str, pipeline: &str, client: Option<String>, exclusive_mode: bool) -> Self {
        Self {
            inner: QueryResponse {
                id: gen_uuid(),
                query: query.to_string(),
                pipeline: pipeline.to_string(),
                client,
                exclusive_mode,
                is_answer: false,
                qa_answered: false,
                qa_links: Vec::new(),
                malicious: None,
                sub_queries: Vec::new(),
                inferences: Vec::new(),
                response: FAIL_RESPONSE.to_string(),
                source_urls: Vec::new(),
                summarized: false,
                caveat_appended: false,
                circuit_breaker: false,
                timings: Timings::new(),
                error: None,
            },
            raw_response: String::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn is_answer(&self) -> bool {
        self.inner.is_answer
    }

    pub fn qa_answered(&self) -> bool {
        self.inner.qa_answered
    }

    pub fn response(&self) -> &str {
        &self.inner.response
    }

    /// The answer before postprocessing and the tripwire.
    pub fn raw_response(&self) -> &str {
        &self.raw_response
    }

    pub fn inferences(&self) -> &[InferenceRecord] {
        &self.inner.inferences
    }

    /* -------------------------------- stages ------------------------------- */

    pub fn qa_hit(&mut self, response: String, links: Vec<QaLink>) {
        self.inner.qa_answered = true;
        self.inner.is_answer = true;
        self.inner.qa_links = links;
        self.set_answer(response);
    }

    /// Records the classification; an unsafe one fixes the answer to the fail sentence.
    pub fn malicious(&mut self, verdict: &MaliciousVerdict) {
        self.inner.malicious = Some(MaliciousSection {
            classification: verdict.classification.clone(),
            reason: verdict.reason.clone(),
        });
        if !verdict.classification.is_safe() {
            self.inner.is_answer = false;
            self.set_answer(FAIL_RESPONSE.to_string());
        }
    }

    pub fn decomposition(&mut self, d: &Decomposition) {
        self.inner.sub_queries = d.queries.clone();
    }

    pub fn push_inference(&mut self, record: InferenceRecord) {
        self.inner.inferences.push(record);
    }

    pub fn summary(&mut self, s: Summary) {
        self.inner.is_answer = s.has_answer;
        self.inner.summarized = s.summarized;
        self.inner.caveat_appended = s.caveat_appended;
        self.set_answer(s.response);
    }

    pub fn sources(&mut self, s: SourceExtraction) {
        self.inner.source_urls = s.source_urls;
    }

    /// Replaces the answer after postprocessing; keeps the raw one for the log.
    pub fn postprocessed(&mut self, response: String, tripwire_thrown: bool) {
        self.inner.response = response;
        if tripwire_thrown {
            self.inner.circuit_breaker = true;
            self.inner.is_answer = false;
        }
    }

    /// A stage failed: the answer becomes the error sentence and `is_answer` false.
    pub fn error(&mut self, message: String) {
        self.inner.error = Some(message);
        self.inner.is_answer = false;
        self.set_answer(ERROR_RESPONSE.to_string());
    }

    pub fn finalize(mut self, timings: Timings) -> QueryResponse {
        self.inner.timings = timings;
        if self.inner.error.is_some() {
            self.inner.is_answer = false;
        }
        self.inner
    }

    fn set_answer(&mut self, response: String) {
        self.raw_response = response.clone();
        self.inner.response = response;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder() -> QueryResponseBuilder {
        QueryResponseBuilder::new("q", "library", Some("cli".into()), false)
    }

    #[test]
    fn starts_unanswered_with_a_fresh_id() {
        let a = builder();
        let b = builder();
        assert_ne!(a.id(), b.id());
        assert!(!a.is_answer());
        assert_eq!(a.response(), FAIL_RESPONSE);
    }

    #[test]
    fn unsafe_classification_pins_the_fail_sentence() {
        let mut b = builder();
        b.malicious(&MaliciousVerdict {
            classification: Classification::Malicious,
            reason: "nope".into(),
            raw: json!({}),
        });
        let r = b.finalize(Timings::new());
        assert!(!r.is_answer);
        assert_eq!(r.response, FAIL_RESPONSE);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["malicious"]["classification"], "Malicious");
    }

    #[test]
    fn error_forces_is_answer_false() {
        let mut b = builder();
        b.summary(Summary {
            response: "Paris.".into(),
            summarized: false,
            has_answer: true,
            caveat_appended: false,
        });
        assert!(b.is_answer());
        b.error("store unreachable".into());
        let r = b.finalize(Timings::new());
        assert!(r.failed());
        assert!(!r.is_answer);
        assert_eq!(r.response, ERROR_RESPONSE);
    }

    #[test]
    fn tripwire_trips_the_circuit_breaker() {
        let mut b = builder();
        b.qa_hit("9-5".into(), Vec::new());
        b.postprocessed(FAIL_RESPONSE.into(), true);
        assert_eq!(b.raw_response(), "9-5");
        let r = b.finalize(Timings::new());
        assert!(r.circuit_breaker);
        assert!(!r.is_answer);
    }
}
