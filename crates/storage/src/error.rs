use dealflow_common::{Mode, WorkflowStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition for workflow {workflow_id}: {from} -> {to}")]
    InvalidTransition {
        workflow_id: String,
        from: WorkflowStatus,
        to: WorkflowStatus,
    },

    #[error("Mode already set for workflow {workflow_id}: {existing} (requested {requested})")]
    ModeAlreadySet {
        workflow_id: String,
        existing: Mode,
        requested: Mode,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn not_found(workflow_id: impl ToString) -> Self {
        Self::NotFound(workflow_id.to_string())
    }

    pub fn corrupt(details: impl Into<String>) -> Self {
        Self::Corrupt(details.into())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
