//! Engine connection settings and presets.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// SQLite `journal_mode` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    /// Rollback journal deleted after each transaction.
    #[default]
    Delete,
    /// Write-ahead log.
    Wal,
    /// Journal kept in memory.
    Memory,
    /// No journal.
    Off,
}

impl JournalMode {
    /// Pragma value.
    pub fn as_pragma(self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Wal => "WAL",
            JournalMode::Memory => "MEMORY",
            JournalMode::Off => "OFF",
        }
    }
}

/// SQLite `synchronous` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Sync at every critical moment.
    #[default]
    Full,
    /// Sync less often; safe with WAL.
    Normal,
    /// Leave syncing to the OS.
    Off,
}

impl SyncMode {
    /// Pragma value.
    pub fn as_pragma(self) -> &'static str {
        match self {
            SyncMode::Full => "FULL",
            SyncMode::Normal => "NORMAL",
            SyncMode::Off => "OFF",
        }
    }
}

/// Connection settings for [`crate::sqlite_adapter::SqliteEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Database file; `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    /// How long a locked database is retried before failing.
    pub busy_timeout_ms: u64,
    /// Journal mode applied when the connection opens.
    pub journal_mode: JournalMode,
    /// Synchronous level applied when the connection opens.
    pub synchronous: SyncMode,
    /// Enforce foreign key constraints.
    pub foreign_keys: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
            journal_mode: JournalMode::Delete,
            synchronous: SyncMode::Full,
            foreign_keys: true,
        }
    }
}

impl EngineConfig {
    /// Private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            journal_mode: JournalMode::Memory,
            synchronous: SyncMode::Off,
            ..Self::default()
        }
    }

    /// On-disk database with full durability.
    pub fn durable(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            journal_mode: JournalMode::Wal,
            synchronous: SyncMode::Full,
            ..Self::default()
        }
    }

    /// On-disk database tuned for bulk loads.
    pub fn fast(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            busy_timeout_ms: 1000,
            journal_mode: JournalMode::Wal,
            synchronous: SyncMode::Normal,
            foreign_keys: false,
        }
    }

    /// Replaces the database path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}
