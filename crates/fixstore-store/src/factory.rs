use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fixstore_core::{Clock, LogScope, SessionKey, SystemClock};
use fixstore_settings::FixStoreSettings;
use parking_lot::Mutex;
use tracing::instrument;

use crate::audit_log::SqliteLog;
use crate::database::Database;
use crate::error::StoreError;
use crate::message_store::SqliteStore;

/// Path that selects a private in-memory database instead of a file.
pub const IN_MEMORY: &str = ":memory:";

/// One open [`Database`] per path, shared by every store and log built
/// through the same pool.
#[derive(Clone, Default)]
pub struct DatabasePool {
    open: Arc<Mutex<HashMap<PathBuf, Database>>>,
}

impl DatabasePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Result<Database, StoreError> {
        let mut open = self.open.lock();
        if let Some(db) = open.get(path) {
            return Ok(db.clone());
        }
        let db = if path == Path::new(IN_MEMORY) {
            Database::in_memory()?
        } else {
            Database::open(path)?
        };
        let _ = open.insert(path.to_owned(), db.clone());
        Ok(db)
    }
}

/// Builds [`SqliteStore`]s from settings, applying per-session overrides.
pub struct StoreFactory {
    settings: FixStoreSettings,
    pool: DatabasePool,
    clock: Arc<dyn Clock>,
}

impl StoreFactory {
    pub fn new(settings: FixStoreSettings) -> Self {
        Self::with_pool(settings, DatabasePool::new(), Arc::new(SystemClock))
    }

    /// Default table names on the given database file.
    pub fn for_database(path: impl Into<PathBuf>) -> Self {
        let mut settings = FixStoreSettings::default();
        settings.store.database = path.into();
        Self::new(settings)
    }

    pub fn with_pool(settings: FixStoreSettings, pool: DatabasePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            pool,
            clock,
        }
    }

    pub fn settings(&self) -> &FixStoreSettings {
        &self.settings
    }

    #[instrument(skip(self, key), fields(session = %key))]
    pub fn create(&self, key: &SessionKey) -> Result<SqliteStore, StoreError> {
        let tables = self.settings.store_for(key);
        let db = self.pool.get(&tables.database)?;
        SqliteStore::open(db, key.clone(), tables, self.clock.clone())
    }
}

/// Builds [`SqliteLog`]s, session-bound or global.
pub struct LogFactory {
    settings: FixStoreSettings,
    pool: DatabasePool,
    clock: Arc<dyn Clock>,
}

impl LogFactory {
    pub fn new(settings: FixStoreSettings) -> Self {
        Self::with_pool(settings, DatabasePool::new(), Arc::new(SystemClock))
    }

    /// Default table names on the given database file.
    pub fn for_database(path: impl Into<PathBuf>) -> Self {
        let mut settings = FixStoreSettings::default();
        settings.log.database = path.into();
        Self::new(settings)
    }

    pub fn with_pool(settings: FixStoreSettings, pool: DatabasePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            pool,
            clock,
        }
    }

    #[instrument(skip(self, key), fields(session = %key))]
    pub fn create(&self, key: &SessionKey) -> Result<SqliteLog, StoreError> {
        let tables = self.settings.log_for(key);
        let db = self.pool.get(&tables.database)?;
        SqliteLog::open(db, LogScope::PerSession(key.clone()), tables, self.clock.clone())
    }

    /// A log not bound to any session, on the top-level log settings.
    #[instrument(skip(self))]
    pub fn create_global(&self) -> Result<SqliteLog, StoreError> {
        let tables = self.settings.log.clone();
        let db = self.pool.get(&tables.database)?;
        SqliteLog::open(db, LogScope::Global, tables, self.clock.clone())
    }
}
