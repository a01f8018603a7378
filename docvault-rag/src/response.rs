//! Response bodies returned to transports.
//!
//! Field names (including the ones with spaces) are part of the external
//! contract and must not change.

use serde::{Deserialize, Serialize};

use crate::error::RagError;
use crate::pipeline::{Answer, IngestReport};

pub const UPLOAD_OK: &str = "File uploaded successful";
pub const UPLOAD_FAILED: &str = "File uploaded not successful :(";
pub const SERVICE_HEALTHY: &str = "Service is healthy!";
pub const SERVICE_DOWN: &str = "Service is down :(";
pub const STORE_DOWN: &str = "ChromaDB is not alive :(";
pub const RESET_OK: &str = "Reset successful!";
pub const RESET_FAILED: &str = "Failed to reset :(";

/// Result of an upload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum IngestResponse {
    Success {
        message: String,
        #[serde(rename = "collection count")]
        collection_count: usize,
    },
    /// `partial` is `true` when some chunks may already be in the store.
    Failure {
        message: String,
        error: String,
        partial: bool,
        #[serde(rename = "collection count", skip_serializing_if = "Option::is_none")]
        collection_count: Option<usize>,
    },
}

impl IngestResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, IngestResponse::Success { .. })
    }
}

impl From<IngestReport> for IngestResponse {
    fn from(report: IngestReport) -> Self {
        IngestResponse::Success {
            message: UPLOAD_OK.to_string(),
            collection_count: report.collection_count,
        }
    }
}

impl From<&RagError> for IngestResponse {
    fn from(e: &RagError) -> Self {
        IngestResponse::Failure {
            message: UPLOAD_FAILED.to_string(),
            error: e.to_string(),
            partial: e.may_be_partial(),
            collection_count: e.collection_count(),
        }
    }
}

/// Result of a search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResponse {
    pub answer: String,
    pub sources: Vec<String>,
}

impl From<Answer> for SearchResponse {
    fn from(answer: Answer) -> Self {
        Self { answer: answer.matched_text, sources: answer.sources }
    }
}

/// Result of a health check.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum HealthResponse {
    Healthy {
        #[serde(rename = "service status")]
        service_status: String,
        #[serde(rename = "chromadb status")]
        store_status: u64,
    },
    Down {
        #[serde(rename = "service status")]
        service_status: String,
        #[serde(rename = "chromaDB status")]
        store_status: String,
    },
}

impl HealthResponse {
    pub fn healthy(heartbeat: u64) -> Self {
        HealthResponse::Healthy { service_status: SERVICE_HEALTHY.to_string(), store_status: heartbeat }
    }

    pub fn down() -> Self {
        HealthResponse::Down {
            service_status: SERVICE_DOWN.to_string(),
            store_status: STORE_DOWN.to_string(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthResponse::Healthy { .. })
    }
}

/// Result of a reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetResponse {
    pub message: String,
}

impl ResetResponse {
    pub fn ok() -> Self {
        Self { message: RESET_OK.to_string() }
    }

    pub fn failed() -> Self {
        Self { message: RESET_FAILED.to_string() }
    }

    pub fn is_success(&self) -> bool {
        self.message == RESET_OK
    }
}

/// Generic failure body for requests that never reached the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub message: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ingest_success_shape() {
        let body = IngestResponse::from(IngestReport {
            documents: 1,
            chunks_added: 1,
            collection_count: 1,
        });
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"message": "File uploaded successful", "collection count": 1})
        );
    }

    #[test]
    fn ingest_failure_shape() {
        let err = RagError::DocumentLoad { path: "a.bin".into(), message: "not text".into() };
        let body = serde_json::to_value(IngestResponse::from(&err)).unwrap();
        assert_eq!(body["message"], "File uploaded not successful :(");
        assert_eq!(body["partial"], false);
        assert!(body["error"].as_str().unwrap().contains("a.bin"));
        assert!(body.get("collection count").is_none());
    }

    #[test]
    fn partial_failure_reports_count() {
        let err = RagError::PartialCommit {
            committed: 2,
            attempted: 5,
            collection_count: Some(7),
            message: "boom".into(),
        };
        let body = serde_json::to_value(IngestResponse::from(&err)).unwrap();
        assert_eq!(body["partial"], true);
        assert_eq!(body["collection count"], 7);
    }

    #[test]
    fn health_shapes() {
        assert_eq!(
            serde_json::to_value(HealthResponse::healthy(42)).unwrap(),
            json!({"service status": "Service is healthy!", "chromadb status": 42})
        );
        assert_eq!(
            serde_json::to_value(HealthResponse::down()).unwrap(),
            json!({"service status": "Service is down :(", "chromaDB status": "ChromaDB is not alive :("})
        );
    }

    #[test]
    fn reset_shapes() {
        assert_eq!(serde_json::to_value(ResetResponse::ok()).unwrap(), json!({"message": "Reset successful!"}));
        assert!(!ResetResponse::failed().is_success());
    }
}
