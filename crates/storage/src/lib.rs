pub mod error;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteWorkflowStore;
pub use store::WorkflowStore;

use dealflow_common::StorageConfig;
use std::sync::Arc;

/// Open the configured backend and apply migrations
pub async fn initialize_storage(config: &StorageConfig) -> StoreResult<Arc<dyn WorkflowStore>> {
    let store = SqliteWorkflowStore::connect(&config.database_url, config.max_connections).await?;
    tracing::info!("Workflow store initialized");
    Ok(Arc::new(store))
}
