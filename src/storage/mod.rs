//! Storage implementations.

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageConfig, StorageType};
use crate::interfaces::{LedgerStore, Result};

pub mod memory;
pub mod schema;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryLedgerStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLedgerStore;

/// Initialize the ledger store selected by configuration.
///
/// SQLite stores come back connected with their tables created.
pub async fn init_storage(config: &StorageConfig) -> Result<Arc<dyn LedgerStore>> {
    match config.storage_type {
        StorageType::Memory => {
            info!("Storage: memory");
            Ok(Arc::new(MemoryLedgerStore::new()))
        }
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            info!("Storage: sqlite at {}", config.path);
            Ok(Arc::new(SqliteLedgerStore::connect(config).await?))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => {
            tracing::error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err(crate::interfaces::StorageError::Unavailable(
                "sqlite feature not enabled".to_string(),
            )
            .into())
        }
    }
}
