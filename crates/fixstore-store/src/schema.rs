/// SQL DDL for the message store and audit log. Table names come from
/// settings, so the DDL is generated after the names are validated.
use fixstore_settings::{LogSettings, StoreSettings};
use rusqlite::Connection;

use crate::error::StoreError;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;

pub fn store_tables_ddl(sessions_table: &str, messages_table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {sessions_table} (
    beginstring TEXT NOT NULL,
    sendercompid TEXT NOT NULL,
    targetcompid TEXT NOT NULL,
    session_qualifier TEXT NOT NULL,
    creation_time TEXT NOT NULL,
    incoming_seqnum INTEGER NOT NULL,
    outgoing_seqnum INTEGER NOT NULL,
    PRIMARY KEY (beginstring, sendercompid, targetcompid, session_qualifier)
);

CREATE TABLE IF NOT EXISTS {messages_table} (
    beginstring TEXT NOT NULL,
    sendercompid TEXT NOT NULL,
    targetcompid TEXT NOT NULL,
    session_qualifier TEXT NOT NULL,
    msgseqnum INTEGER NOT NULL,
    message BLOB NOT NULL,
    PRIMARY KEY (beginstring, sendercompid, targetcompid, session_qualifier, msgseqnum)
);
"#
    )
}

pub fn log_table_ddl(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    time TEXT NOT NULL,
    time_milliseconds INTEGER NOT NULL,
    beginstring TEXT,
    sendercompid TEXT,
    targetcompid TEXT,
    session_qualifier TEXT,
    text BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{table}_session
    ON {table}(beginstring, sendercompid, targetcompid, session_qualifier);
"#
    )
}

pub fn ensure_store_tables(conn: &Connection, tables: &StoreSettings) -> Result<(), StoreError> {
    tables.validate()?;
    conn.execute_batch(&store_tables_ddl(&tables.sessions_table, &tables.messages_table))
        .map_err(|e| StoreError::Database(format!("schema: {e}")))
}

/// Streams sharing a table get it created once.
pub fn ensure_log_tables(conn: &Connection, tables: &LogSettings) -> Result<(), StoreError> {
    tables.validate()?;
    let mut created: Vec<&str> = Vec::with_capacity(3);
    for table in [&tables.incoming_table, &tables.outgoing_table, &tables.event_table] {
        if created.contains(&table.as_str()) {
            continue;
        }
        conn.execute_batch(&log_table_ddl(table))
            .map_err(|e| StoreError::Database(format!("schema: {e}")))?;
        created.push(table);
    }
    Ok(())
}
