pub mod audit_log;
pub mod database;
pub mod error;
pub mod factory;
pub mod message_store;
pub mod row_helpers;
pub mod schema;
pub mod statements;

pub use audit_log::{LogEntry, SqliteLog};
pub use database::Database;
pub use error::StoreError;
pub use factory::{DatabasePool, LogFactory, StoreFactory, IN_MEMORY};
pub use message_store::{SessionRecord, SqliteStore};
