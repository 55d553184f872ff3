//! Storage configuration types.

use serde::Deserialize;

/// Storage type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Sqlite,
    Memory,
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Sqlite => f.write_str("sqlite"),
            StorageType::Memory => f.write_str("memory"),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// SQLite database file, or `:memory:`.
    pub path: String,
    /// Pool size. In-memory SQLite is always a single connection.
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Sqlite,
            path: "data/stepledger.db".to_string(),
            max_connections: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

impl StorageConfig {
    /// Config for a throwaway in-process store.
    pub fn memory() -> Self {
        Self {
            storage_type: StorageType::Memory,
            ..Self::default()
        }
    }

    /// Config for a SQLite database at `path`.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            storage_type: StorageType::Sqlite,
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn is_in_memory_sqlite(&self) -> bool {
        self.path == ":memory:" || self.path.starts_with("file::memory:")
    }
}
