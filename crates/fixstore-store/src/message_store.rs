use std::sync::Arc;

use chrono::{DateTime, Utc};
use fixstore_core::sqltime::{format_sql_time, parse_sql_time};
use fixstore_core::{Clock, MessageStore, SeqNum, SequenceCache, SessionKey};
use fixstore_settings::StoreSettings;
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

/// One session row as persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub session_key: SessionKey,
    pub creation_time: DateTime<Utc>,
    pub next_target_seq: SeqNum,
    pub next_sender_seq: SeqNum,
}

/// SQL text per query shape, built once from the configured table names.
struct StoreSql {
    select_session: String,
    insert_session: String,
    reset_session: String,
    update_outgoing: String,
    update_incoming: String,
    upsert_message: String,
    select_messages: String,
    delete_messages: String,
    count_messages: String,
}

impl StoreSql {
    fn new(tables: &StoreSettings) -> Self {
        let sessions = &tables.sessions_table;
        let messages = &tables.messages_table;
        Self {
            select_session: format!(
                "SELECT creation_time, incoming_seqnum, outgoing_seqnum FROM {sessions} WHERE {KEY_MATCH}"
            ),
            insert_session: format!(
                "INSERT INTO {sessions} (beginstring, sendercompid, targetcompid, session_qualifier,
                     creation_time, incoming_seqnum, outgoing_seqnum)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ),
            reset_session: format!(
                "UPDATE {sessions} SET creation_time = ?5, incoming_seqnum = ?6, outgoing_seqnum = ?7
                 WHERE {KEY_MATCH}"
            ),
            update_outgoing: format!(
                "UPDATE {sessions} SET outgoing_seqnum = ?5 WHERE {KEY_MATCH}"
            ),
            update_incoming: format!(
                "UPDATE {sessions} SET incoming_seqnum = ?5 WHERE {KEY_MATCH}"
            ),
            upsert_message: format!(
                "INSERT INTO {messages} (beginstring, sendercompid, targetcompid, session_qualifier,
                     msgseqnum, message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (beginstring, sendercompid, targetcompid, session_qualifier, msgseqnum)
                 DO UPDATE SET message = excluded.message"
            ),
            select_messages: format!(
                "SELECT message FROM {messages}
                 WHERE {KEY_MATCH} AND msgseqnum >= ?5 AND msgseqnum <= ?6
                 ORDER BY msgseqnum ASC"
            ),
            delete_messages: format!("DELETE FROM {messages} WHERE {KEY_MATCH}"),
            count_messages: format!("SELECT COUNT(*) FROM {messages} WHERE {KEY_MATCH}"),
        }
    }
}

/// SQLite-backed message store for one session.
///
/// Sequence numbers are served from a [`SequenceCache`] that is loaded when
/// the store opens and on [`refresh`](MessageStore::refresh). Every mutation
/// hits storage first; the cache only moves once the write succeeded.
pub struct SqliteStore {
    db: Database,
    key: SessionKey,
    tables: StoreSettings,
    sql: StoreSql,
    clock: Arc<dyn Clock>,
    cache: SequenceCache,
}

impl SqliteStore {
    /// Create the tables if needed and load (or create) this session's row.
    #[instrument(skip(db, key, tables, clock), fields(session = %key))]
    pub fn open(
        db: Database,
        key: SessionKey,
        tables: StoreSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        db.with_conn(|conn| schema::ensure_store_tables(conn, &tables))?;
        let sql = StoreSql::new(&tables);
        let mut store = Self {
            db,
            key,
            tables,
            sql,
            cache: SequenceCache::new(clock.now()),
            clock,
        };
        store.cache = store.populate()?;
        info!(
            next_sender = store.cache.next_sender_seq(),
            next_target = store.cache.next_target_seq(),
            "message store ready"
        );
        Ok(store)
    }

    pub fn session_key(&self) -> &SessionKey {
        &self.key
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The session row as currently persisted, bypassing the cache.
    pub fn session_record(&self) -> Result<Option<SessionRecord>, StoreError> {
        let mut rows = self.select_session_rows()?;
        if rows.len() > 1 {
            return Err(self.multiple_rows_error());
        }
        Ok(rows.pop().map(|cache| SessionRecord {
            session_key: self.key.clone(),
            creation_time: cache.creation_time(),
            next_target_seq: cache.next_target_seq(),
            next_sender_seq: cache.next_sender_seq(),
        }))
    }

    /// Number of archived messages for this session.
    pub fn message_count(&self) -> Result<u64, StoreError> {
        let sql = &self.sql.count_messages;
        let counts = self.db.with_conn(|conn| {
            query_rows(conn, sql, params_from_iter(self.key.columns()), |row| {
                row_helpers::get_seq(row, 0, &self.tables.messages_table, "count")
            })
        })?;
        Ok(counts.into_iter().next().unwrap_or(0))
    }

    /// Crash-recovery population: reconcile the cache with the session row.
    ///
    /// One row: load it. No row: a new session, so anchor one at 1/1 with
    /// the current time. More than one row: corrupt, refuse to guess.
    fn populate(&self) -> Result<SequenceCache, StoreError> {
        let mut rows = self.select_session_rows()?;
        match rows.len() {
            1 => {
                let cache = rows.remove(0);
                debug!(
                    next_sender = cache.next_sender_seq(),
                    next_target = cache.next_target_seq(),
                    "loaded session row"
                );
                Ok(cache)
            }
            0 => {
                let cache = SequenceCache::new(self.clock.now());
                self.insert_session_row(&cache).map_err(|e| {
                    StoreError::Config(format!(
                        "unable to create session {} in database: {e}",
                        self.key
                    ))
                })?;
                info!("created session row");
                Ok(cache)
            }
            _ => Err(self.multiple_rows_error()),
        }
    }

    /// Reads at most two rows; two is already enough to know the key is
    /// ambiguous.
    fn select_session_rows(&self) -> Result<Vec<SequenceCache>, StoreError> {
        let sql = &self.sql.select_session;
        let table = &self.tables.sessions_table;
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(sql)
                .map_err(|e| StoreError::query(sql, e))?;
            let mut rows = stmt
                .query(params_from_iter(self.key.columns()))
                .map_err(|e| StoreError::query(sql, e))?;
            let mut found = Vec::new();
            while let Some(row) = rows.next().map_err(|e| StoreError::query(sql, e))? {
                found.push(row_to_cache(row, table)?);
                if found.len() > 1 {
                    break;
                }
            }
            Ok(found)
        })?;
        Ok(rows)
    }

    fn insert_session_row(&self, cache: &SequenceCache) -> Result<(), StoreError> {
        let [begin, sender, target, qualifier] = self.key.columns();
        let created = format_sql_time(&cache.creation_time());
        let incoming = row_helpers::seq_to_sql(cache.next_target_seq())?;
        let outgoing = row_helpers::seq_to_sql(cache.next_sender_seq())?;
        self.db.with_conn(|conn| {
            execute(
                conn,
                &self.sql.insert_session,
                params![begin, sender, target, qualifier, created, incoming, outgoing],
            )
        })?;
        Ok(())
    }

    fn update_seq(&self, sql: &str, seq: SeqNum) -> Result<(), StoreError> {
        let [begin, sender, target, qualifier] = self.key.columns();
        let value = row_helpers::seq_to_sql(seq)?;
        let changed = self.db.with_conn(|conn| {
            execute(conn, sql, params![begin, sender, target, qualifier, value])
        })?;
        if changed == 0 {
            warn!(seq, "sequence update matched no session row");
            return Err(StoreError::SessionMissing(self.key.to_string()));
        }
        Ok(())
    }

    fn multiple_rows_error(&self) -> StoreError {
        StoreError::Config(format!(
            "multiple entries found for session {} in {}",
            self.key, self.tables.sessions_table
        ))
    }
}

impl MessageStore for SqliteStore {
    type Error = StoreError;

    fn next_sender_seq(&self) -> SeqNum {
        self.cache.next_sender_seq()
    }

    fn next_target_seq(&self) -> SeqNum {
        self.cache.next_target_seq()
    }

    #[instrument(skip(self), fields(session = %self.key))]
    fn set_next_sender_seq(&mut self, seq: SeqNum) -> Result<(), StoreError> {
        self.update_seq(&self.sql.update_outgoing, seq)?;
        self.cache.set_next_sender_seq(seq);
        debug!(seq, "next sender seq persisted");
        Ok(())
    }

    #[instrument(skip(self), fields(session = %self.key))]
    fn set_next_target_seq(&mut self, seq: SeqNum) -> Result<(), StoreError> {
        self.update_seq(&self.sql.update_incoming, seq)?;
        self.cache.set_next_target_seq(seq);
        debug!(seq, "next target seq persisted");
        Ok(())
    }

    fn creation_time(&self) -> DateTime<Utc> {
        self.cache.creation_time()
    }

    /// Last write wins on a repeated sequence number. Resends and duplicate
    /// handling may legitimately rewrite a slot.
    #[instrument(skip(self, message), fields(session = %self.key, len = message.len()))]
    fn put_message(&mut self, seq: SeqNum, message: &[u8]) -> Result<(), StoreError> {
        let [begin, sender, target, qualifier] = self.key.columns();
        let value = row_helpers::seq_to_sql(seq)?;
        self.db.with_conn(|conn| {
            execute(
                conn,
                &self.sql.upsert_message,
                params![begin, sender, target, qualifier, value, message],
            )
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(session = %self.key))]
    fn get_messages(&self, begin: SeqNum, end: SeqNum) -> Result<Vec<Vec<u8>>, StoreError> {
        if begin > end {
            return Ok(Vec::new());
        }
        let [b, s, t, q] = self.key.columns();
        // Nothing can be stored past the storage range.
        let Ok(low) = row_helpers::seq_to_sql(begin) else {
            return Ok(Vec::new());
        };
        // Anything past the storage range is simply "to the end".
        let high = row_helpers::seq_to_sql(end).unwrap_or(i64::MAX);
        let table = &self.tables.messages_table;
        self.db.with_conn(|conn| {
            query_rows(
                conn,
                &self.sql.select_messages,
                params![b, s, t, q, low, high],
                |row| {
                    let value = row.get_ref(0).map_err(|e| StoreError::CorruptRow {
                        table: table.clone(),
                        column: "message",
                        detail: e.to_string(),
                    })?;
                    value
                        .as_bytes()
                        .map(<[u8]>::to_vec)
                        .map_err(|e| StoreError::CorruptRow {
                            table: table.clone(),
                            column: "message",
                            detail: e.to_string(),
                        })
                },
            )
        })
    }

    /// Drop the archive and restart both counters, in one transaction.
    #[instrument(skip(self), fields(session = %self.key))]
    fn reset(&mut self) -> Result<(), StoreError> {
        let now = self.clock.now();
        let created = format_sql_time(&now);
        let [begin, sender, target, qualifier] = self.key.columns();
        let sql = &self.sql;

        let deleted = self.db.with_transaction(|tx| {
            let deleted = execute(
                tx,
                &sql.delete_messages,
                params![begin, sender, target, qualifier],
            )?;
            let updated = execute(
                tx,
                &sql.reset_session,
                params![begin, sender, target, qualifier, created, 1_i64, 1_i64],
            )?;
            if updated == 0 {
                let _ = execute(
                    tx,
                    &sql.insert_session,
                    params![begin, sender, target, qualifier, created, 1_i64, 1_i64],
                )?;
            }
            Ok(deleted)
        })?;

        self.cache.reset(now);
        info!(deleted, "message store reset");
        Ok(())
    }

    #[instrument(skip(self), fields(session = %self.key))]
    fn refresh(&mut self) -> Result<(), StoreError> {
        self.cache = self.populate()?;
        Ok(())
    }
}

fn row_to_cache(row: &rusqlite::Row<'_>, table: &str) -> Result<SequenceCache, StoreError> {
    let created: String = row_helpers::get(row, 0, table, "creation_time")?;
    let creation_time = parse_sql_time(&created).map_err(|e| StoreError::CorruptRow {
        table: table.to_string(),
        column: "creation_time",
        detail: format!("{created:?}: {e}"),
    })?;
    let incoming = row_helpers::get_seq(row, 1, table, "incoming_seqnum")?;
    let outgoing = row_helpers::get_seq(row, 2, table, "outgoing_seqnum")?;
    Ok(SequenceCache::from_parts(creation_time, outgoing, incoming))
}
