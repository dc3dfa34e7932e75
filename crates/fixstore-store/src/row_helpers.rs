use fixstore_core::SeqNum;

use crate::error::StoreError;

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table: table.to_string(),
        column,
        detail: e.to_string(),
    })
}

/// Get an optional column value.
pub fn get_opt<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &str,
    column: &'static str,
) -> Result<Option<T>, StoreError> {
    get(row, idx, table, column)
}

/// Read a sequence number column; negative values are corrupt.
pub fn get_seq(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &str,
    column: &'static str,
) -> Result<SeqNum, StoreError> {
    let raw: i64 = get(row, idx, table, column)?;
    SeqNum::try_from(raw).map_err(|_| StoreError::CorruptRow {
        table: table.to_string(),
        column,
        detail: format!("negative sequence number {raw}"),
    })
}

/// SQLite integers are signed 64-bit.
pub fn seq_to_sql(seq: SeqNum) -> Result<i64, StoreError> {
    i64::try_from(seq).map_err(|_| StoreError::SeqOutOfRange(seq))
}
