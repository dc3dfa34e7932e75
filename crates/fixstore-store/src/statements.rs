//! Thin wrappers over `prepare_cached`.
//!
//! A cached statement is reset and has its bindings cleared when its guard
//! drops, which happens on every exit path out of these helpers, error or
//! not. Each distinct SQL string is prepared once per connection and reused.

use rusqlite::{Connection, Params};

use crate::error::StoreError;

/// Run one statement, returning the number of rows changed.
pub fn execute<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<usize, StoreError> {
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(|e| StoreError::query(sql, e))?;
    stmt.execute(params).map_err(|e| StoreError::query(sql, e))
}

/// Run a query and map every row with `f`.
pub fn query_rows<P, T, F>(conn: &Connection, sql: &str, params: P, mut f: F) -> Result<Vec<T>, StoreError>
where
    P: Params,
    F: FnMut(&rusqlite::Row<'_>) -> Result<T, StoreError>,
{
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(|e| StoreError::query(sql, e))?;
    let mut rows = stmt.query(params).map_err(|e| StoreError::query(sql, e))?;
    let mut results = Vec::new();
    while let Some(row) = rows.next().map_err(|e| StoreError::query(sql, e))? {
        results.push(f(row)?);
    }
    Ok(results)
}
