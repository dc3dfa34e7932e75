use std::sync::Arc;

use chrono::{DateTime, Utc};
use fixstore_core::sqltime::{parse_sql_time, split_millis};
use fixstore_core::{AppendOutcome, Clock, Log, LogScope, LogStream, SessionKey};
use fixstore_settings::LogSettings;
use rusqlite::{params, params_from_iter};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;
use crate::schema;
use crate::statements::{execute, query_rows};

const KEY_MATCH: &str =
    "beginstring = ?1 AND sendercompid = ?2 AND targetcompid = ?3 AND session_qualifier = ?4";

/// One audit row read back from a stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub id: i64,
    /// Second-resolution `time` plus `time_milliseconds`.
    pub time: DateTime<Utc>,
    pub session_key: Option<SessionKey>,
    pub text: String,
}

/// SQLite-backed audit log over three streams.
///
/// Appends are best-effort: a failed insert is traced and reported as
/// [`AppendOutcome::Dropped`], never as an error.
pub struct SqliteLog {
    db: Database,
    scope: LogScope,
    tables: LogSettings,
    clock: Arc<dyn Clock>,
    insert_sql: [String; 3],
}

impl SqliteLog {
    #[instrument(skip(db, scope, tables, clock), fields(scope = %scope))]
    pub fn open(
        db: Database,
        scope: LogScope,
        tables: LogSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        db.with_conn(|conn| schema::ensure_log_tables(conn, &tables))?;
        let insert_sql = LogStream::ALL.map(|stream| {
            format!(
                "INSERT INTO {} (time, time_milliseconds, beginstring, sendercompid, targetcompid,
                     session_qualifier, text)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                table_for(&tables, stream)
            )
        });
        debug!(
            incoming = %tables.incoming_table,
            outgoing = %tables.outgoing_table,
            event = %tables.event_table,
            "audit log ready"
        );
        Ok(Self {
            db,
            scope,
            tables,
            clock,
            insert_sql,
        })
    }

    pub fn scope(&self) -> &LogScope {
        &self.scope
    }

    pub fn table(&self, stream: LogStream) -> &str {
        table_for(&self.tables, stream)
    }

    fn append(&self, stream: LogStream, text: &str) -> AppendOutcome {
        match self.try_append(stream, text) {
            Ok(id) => AppendOutcome::Appended { id },
            Err(e) => {
                warn!(scope = %self.scope, %stream, error = %e, "audit append dropped");
                AppendOutcome::Dropped {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn try_append(&self, stream: LogStream, text: &str) -> Result<i64, StoreError> {
        let (time, millis) = split_millis(&self.clock.now());
        let [begin, sender, target, qualifier] = key_columns(&self.scope);
        let sql = &self.insert_sql[stream_index(stream)];
        self.db.with_conn(|conn| {
            let _ = execute(
                conn,
                sql,
                params![time, millis, begin, sender, target, qualifier, text.as_bytes()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Tables in use, each once even when streams share one.
    fn distinct_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::with_capacity(3);
        for stream in LogStream::ALL {
            let table = self.table(stream);
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
        tables
    }

    /// Rows of `stream` in scope, oldest first, at most `limit` of the most
    /// recent. Global scope sees every row.
    pub fn entries(&self, stream: LogStream, limit: u32) -> Result<Vec<LogEntry>, StoreError> {
        let table = self.table(stream);
        let columns = "id, time, time_milliseconds, beginstring, sendercompid, targetcompid,
                       session_qualifier, text";
        let mut entries = self.db.with_conn(|conn| match &self.scope {
            LogScope::PerSession(key) => {
                let sql = format!(
                    "SELECT {columns} FROM {table} WHERE {KEY_MATCH} ORDER BY id DESC LIMIT ?5"
                );
                let [b, s, t, q] = key.columns();
                query_rows(conn, &sql, params![b, s, t, q, limit], |row| {
                    row_to_entry(row, table)
                })
            }
            LogScope::Global => {
                let sql = format!("SELECT {columns} FROM {table} ORDER BY id DESC LIMIT ?1");
                query_rows(conn, &sql, params![limit], |row| row_to_entry(row, table))
            }
        })?;
        entries.reverse();
        Ok(entries)
    }
}

impl Log for SqliteLog {
    type Error = StoreError;

    fn on_incoming(&self, text: &str) -> AppendOutcome {
        self.append(LogStream::Incoming, text)
    }

    fn on_outgoing(&self, text: &str) -> AppendOutcome {
        self.append(LogStream::Outgoing, text)
    }

    fn on_event(&self, text: &str) -> AppendOutcome {
        self.append(LogStream::Event, text)
    }

    /// Delete every row in scope from all three streams in one transaction.
    /// Clearing an empty log succeeds with zero.
    #[instrument(skip(self), fields(scope = %self.scope))]
    fn clear(&self) -> Result<usize, StoreError> {
        let tables = self.distinct_tables();
        let removed = self.db.with_transaction(|tx| {
            let mut removed = 0;
            for table in &tables {
                removed += match &self.scope {
                    LogScope::PerSession(key) => execute(
                        tx,
                        &format!("DELETE FROM {table} WHERE {KEY_MATCH}"),
                        params_from_iter(key.columns()),
                    )?,
                    LogScope::Global => execute(tx, &format!("DELETE FROM {table}"), [])?,
                };
            }
            Ok(removed)
        })?;
        info!(removed, "audit log cleared");
        Ok(removed)
    }

    fn backup(&self) -> Result<(), StoreError> {
        debug!(scope = %self.scope, "audit log backup requested, nothing to archive");
        Ok(())
    }
}

fn table_for(tables: &LogSettings, stream: LogStream) -> &str {
    match stream {
        LogStream::Incoming => &tables.incoming_table,
        LogStream::Outgoing => &tables.outgoing_table,
        LogStream::Event => &tables.event_table,
    }
}

fn stream_index(stream: LogStream) -> usize {
    match stream {
        LogStream::Incoming => 0,
        LogStream::Outgoing => 1,
        LogStream::Event => 2,
    }
}

/// Session-bound rows carry the key; global rows carry NULL in all four.
fn key_columns(scope: &LogScope) -> [Option<&str>; 4] {
    match scope {
        LogScope::PerSession(key) => key.columns().map(Some),
        LogScope::Global => [None; 4],
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>, table: &str) -> Result<LogEntry, StoreError> {
    let id: i64 = row_helpers::get(row, 0, table, "id")?;
    let raw_time: String = row_helpers::get(row, 1, table, "time")?;
    let millis: i64 = row_helpers::get(row, 2, table, "time_milliseconds")?;
    let time = parse_sql_time(&raw_time).map_err(|e| StoreError::CorruptRow {
        table: table.to_string(),
        column: "time",
        detail: format!("{raw_time:?}: {e}"),
    })? + chrono::Duration::milliseconds(millis);

    let key_parts = [
        row_helpers::get_opt::<String>(row, 3, table, "beginstring")?,
        row_helpers::get_opt::<String>(row, 4, table, "sendercompid")?,
        row_helpers::get_opt::<String>(row, 5, table, "targetcompid")?,
        row_helpers::get_opt::<String>(row, 6, table, "session_qualifier")?,
    ];
    let session_key = match key_parts {
        [Some(b), Some(s), Some(t), Some(q)] => Some(SessionKey::new(b, s, t).with_qualifier(q)),
        [None, None, None, None] => None,
        _ => {
            return Err(StoreError::CorruptRow {
                table: table.to_string(),
                column: "beginstring",
                detail: "session key columns partially null".to_string(),
            })
        }
    };

    let corrupt_text = |detail: String| StoreError::CorruptRow {
        table: table.to_string(),
        column: "text",
        detail,
    };
    let raw = row.get_ref(7).map_err(|e| corrupt_text(e.to_string()))?;
    let bytes = raw.as_bytes().map_err(|e| corrupt_text(e.to_string()))?;
    let text = String::from_utf8_lossy(bytes).into_owned();

    Ok(LogEntry {
        id,
        time,
        session_key,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fixstore_core::ManualClock;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::milliseconds(427)
    }

    fn key() -> SessionKey {
        SessionKey::new("FIX.4.2", "BUYER", "SELLER")
    }

    fn open(db: &Database, scope: LogScope, clock: &Arc<ManualClock>) -> SqliteLog {
        SqliteLog::open(db.clone(), scope, LogSettings::default(), clock.clone()).unwrap()
    }

    fn setup() -> (Database, Arc<ManualClock>, SqliteLog) {
        let db = Database::in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let log = open(&db, LogScope::PerSession(key()), &clock);
        (db, clock, log)
    }

    fn texts(log: &SqliteLog, stream: LogStream) -> Vec<String> {
        log.entries(stream, 100)
            .unwrap()
            .into_iter()
            .map(|e| e.text)
            .collect()
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn each_stream_appends_to_its_own_table() {
        let (_, _, log) = setup();
        assert!(log.on_incoming("A").is_appended());
        assert!(log.on_outgoing("B").is_appended());
        assert!(log.on_event("C").is_appended());

        assert_eq!(texts(&log, LogStream::Incoming), vec!["A"]);
        assert_eq!(texts(&log, LogStream::Outgoing), vec!["B"]);
        assert_eq!(texts(&log, LogStream::Event), vec!["C"]);
    }

    #[test]
    fn rows_carry_key_and_millisecond_time() {
        let (db, _, log) = setup();
        let _ = log.on_incoming("8=FIX.4.2\x0135=A\x01");

        let entry = log.entries(LogStream::Incoming, 10).unwrap().remove(0);
        assert_eq!(entry.session_key, Some(key()));
        assert_eq!(entry.time, start());
        assert_eq!(entry.text, "8=FIX.4.2\x0135=A\x01");

        let (time, millis): (String, i64) = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT time, time_milliseconds FROM incoming_log",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?)
            })
            .unwrap();
        assert_eq!(time, "2026-06-01 12:00:00");
        assert_eq!(millis, 427);
    }

    #[test]
    fn global_rows_have_all_key_columns_null() {
        let (db, clock, _) = setup();
        let global = open(&db, LogScope::Global, &clock);
        let _ = global.on_event("engine started");

        let nulls: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM event_log WHERE beginstring IS NULL AND sendercompid IS NULL
                     AND targetcompid IS NULL AND session_qualifier IS NULL",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(nulls, 1);
        assert_eq!(global.entries(LogStream::Event, 10).unwrap()[0].session_key, None);
    }

    #[test]
    fn clear_removes_only_bound_session() {
        let (db, clock, log) = setup();
        let other = open(&db, LogScope::PerSession(key().with_qualifier("alt")), &clock);

        let _ = log.on_incoming("A");
        let _ = log.on_outgoing("B");
        let _ = log.on_event("C");
        let _ = other.on_incoming("keep");
        let _ = other.on_event("keep too");

        assert_eq!(log.clear().unwrap(), 3);
        for stream in LogStream::ALL {
            assert!(log.entries(stream, 10).unwrap().is_empty());
        }
        assert_eq!(texts(&other, LogStream::Incoming), vec!["keep"]);
        assert_eq!(texts(&other, LogStream::Event), vec!["keep too"]);
    }

    #[test]
    fn clearing_empty_log_is_noop() {
        let (_, _, log) = setup();
        assert_eq!(log.clear().unwrap(), 0);
        assert_eq!(log.clear().unwrap(), 0);
    }

    #[test]
    fn global_clear_empties_every_table() {
        let (db, clock, log) = setup();
        let global = open(&db, LogScope::Global, &clock);
        let _ = log.on_incoming("session row");
        let _ = global.on_event("global row");

        assert_eq!(global.clear().unwrap(), 2);
        assert_eq!(count(&db, "incoming_log"), 0);
        assert_eq!(count(&db, "event_log"), 0);
    }

    #[test]
    fn failed_clear_rolls_back_every_stream() {
        let (db, _, log) = setup();
        let _ = log.on_incoming("A");
        let _ = log.on_event("C");
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER keep_events BEFORE DELETE ON event_log
                 BEGIN SELECT RAISE(ABORT, 'events are sacred'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        assert!(log.clear().is_err());
        assert_eq!(texts(&log, LogStream::Incoming), vec!["A"]);
        assert_eq!(texts(&log, LogStream::Event), vec!["C"]);
    }

    #[test]
    fn failed_append_is_swallowed() {
        let (db, _, log) = setup();
        db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE outgoing_log")?;
            Ok(())
        })
        .unwrap();

        match log.on_outgoing("lost") {
            AppendOutcome::Dropped { reason } => assert!(reason.contains("outgoing_log"), "got: {reason}"),
            other => panic!("expected drop, got {other:?}"),
        }
        assert!(log.on_incoming("still fine").is_appended());
    }

    #[test]
    fn shared_table_streams_are_conflated() {
        let db = Database::in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let tables = LogSettings {
            incoming_table: "messages_log".into(),
            outgoing_table: "messages_log".into(),
            ..Default::default()
        };
        let log = SqliteLog::open(db.clone(), LogScope::PerSession(key()), tables, clock).unwrap();
        let _ = log.on_incoming("in");
        let _ = log.on_outgoing("out");

        assert_eq!(texts(&log, LogStream::Incoming), vec!["in", "out"]);
        assert_eq!(log.clear().unwrap(), 2);
        assert_eq!(count(&db, "messages_log"), 0);
    }

    #[test]
    fn entries_limit_keeps_most_recent() {
        let (_, clock, log) = setup();
        for i in 0..5 {
            let _ = log.on_event(&format!("event {i}"));
            clock.advance(chrono::Duration::seconds(1));
        }
        assert_eq!(texts_limited(&log, 2), vec!["event 3", "event 4"]);
    }

    fn texts_limited(log: &SqliteLog, limit: u32) -> Vec<String> {
        log.entries(LogStream::Event, limit)
            .unwrap()
            .into_iter()
            .map(|e| e.text)
            .collect()
    }

    #[test]
    fn partially_null_key_is_corrupt() {
        let (db, clock, _) = setup();
        db.with_conn(|conn| {
            let _ = conn.execute(
                "INSERT INTO event_log (time, time_milliseconds, beginstring, text)
                 VALUES ('2026-06-01 12:00:00', 0, 'FIX.4.2', 'half keyed')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let global = open(&db, LogScope::Global, &clock);
        assert!(matches!(
            global.entries(LogStream::Event, 10),
            Err(StoreError::CorruptRow { .. })
        ));
    }

    #[test]
    fn backup_is_accepted() {
        let (_, _, log) = setup();
        assert!(log.backup().is_ok());
    }
}
