use fixstore_core::SeqNum;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A statement against storage could not be executed.
    #[error("query failed [{query}]: {detail}")]
    Query { query: String, detail: String },

    /// Persisted state is unusable as found, or the store was configured
    /// with something it cannot work with.
    #[error("configuration error: {0}")]
    Config(String),

    /// The value cannot be represented in a signed 64-bit column.
    #[error("sequence number {0} exceeds storage range")]
    SeqOutOfRange(SeqNum),

    #[error("no session row for {0}")]
    SessionMissing(String),

    #[error("corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        table: String,
        column: &'static str,
        detail: String,
    },

    #[error("database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl StoreError {
    pub(crate) fn query(sql: &str, e: rusqlite::Error) -> Self {
        StoreError::Query {
            query: compact_sql(sql),
            detail: e.to_string(),
        }
    }

    /// Corruption or misconfiguration, as opposed to a failed statement.
    pub fn is_config(&self) -> bool {
        matches!(self, StoreError::Config(_) | StoreError::CorruptRow { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<fixstore_settings::SettingsError> for StoreError {
    fn from(e: fixstore_settings::SettingsError) -> Self {
        StoreError::Config(e.to_string())
    }
}

/// Collapse whitespace so multi-line SQL reads on one line in errors.
fn compact_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_compacts_sql() {
        let err = StoreError::query(
            "UPDATE sessions\n   SET outgoing_seqnum = ?1",
            rusqlite::Error::QueryReturnedNoRows,
        );
        let msg = err.to_string();
        assert!(msg.starts_with("query failed [UPDATE sessions SET outgoing_seqnum = ?1]"), "got: {msg}");
    }

    #[test]
    fn classification() {
        assert!(StoreError::Config("two rows".into()).is_config());
        assert!(!StoreError::Database("locked".into()).is_config());
        assert!(!StoreError::SessionMissing("k".into()).is_config());
        assert!(!StoreError::SeqOutOfRange(u64::MAX).is_config());
    }

    #[test]
    fn settings_error_becomes_config() {
        let err: StoreError =
            fixstore_settings::SettingsError::InvalidValue("table name \"\"".into()).into();
        assert!(matches!(err, StoreError::Config(_)));
    }
}
