use dealflow_storage::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Failures raised by capability providers (LLM, market data)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider rate limited the request")]
    RateLimited,

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider returned an empty response")]
    Empty,
}

impl ProviderError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::RateLimited | Self::Unavailable(_)
        )
    }
}

/// Agent-level failure. Recorded on the agent's result, never propagated to the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl AgentError {
    pub fn provider_unavailable(msg: impl Into<String>) -> Self {
        Self::ProviderUnavailable(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedUpstreamResponse(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn budget_exhausted() -> Self {
        Self::ProviderUnavailable("workflow time budget exhausted".to_string())
    }
}

// Every provider failure looks the same to the engine
impl From<ProviderError> for AgentError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) => Self::ProviderUnavailable(msg),
            other => Self::ProviderUnavailable(other.to_string()),
        }
    }
}

/// Workflow-fatal failures
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Pipeline construction failed: {0}")]
    Pipeline(String),
}

impl EngineError {
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Work queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Service is shutting down")]
    ShuttingDown,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),
}

impl ServiceError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Temporary conditions a client may retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QueueFull { .. } | Self::ShuttingDown)
    }
}

pub type AgentOutcome<T> = std::result::Result<T, AgentError>;
pub type EngineResult<T> = std::result::Result<T, EngineError>;
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
