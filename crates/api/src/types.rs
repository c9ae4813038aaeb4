//! Request and response bodies for the HTTP API

use chrono::{DateTime, Utc};
use dealflow_common::{DealInfo, WorkflowId};
use serde::{Deserialize, Serialize};

/// Body of `POST /workflows`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartWorkflowRequest {
    /// The client's request in natural language
    pub query: String,

    /// Optional metadata about the company or deal
    #[serde(default)]
    pub deal: DealInfo,
}

/// Response when a run has been accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartWorkflowResponse {
    pub workflow_id: WorkflowId,

    /// Where to poll for progress
    pub status_url: String,
}

/// Query string of `GET /workflows`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

impl ListParams {
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 100;

    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,

    pub message: Option<String>,

    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Machine-readable error code
    pub code: Option<String>,

    /// Opaque id of an internal failure, for matching against server logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,

    pub timestamp: DateTime<Utc>,
}
