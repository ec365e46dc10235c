use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;

use crate::cache::FileHandle;
use crate::models::{ArtifactOutput, Row};

/// Offset between the Cocoa reference date (2001-01-01) and the Unix epoch
pub const COCOA_EPOCH_OFFSET: i64 = 978_307_200;

/// Run `sql` and return its column names and rows as JSON values
pub fn query_rows(conn: &Connection, sql: &str) -> Result<ArtifactOutput> {
    let mut stmt = conn.prepare(sql).context("Failed to prepare query")?;
    let headers: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let column_count = headers.len();

    let mut rows: Vec<Row> = Vec::new();
    let mut cursor = stmt.query([]).context("Failed to run query")?;
    while let Some(row) = cursor.next().context("Failed to read row")? {
        let mut values = Vec::with_capacity(column_count);
        for index in 0..column_count {
            values.push(to_json(row.get_ref(index)?));
        }
        rows.push(values);
    }

    Ok(ArtifactOutput::new(headers, rows))
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Value::String(format!("<{} byte blob>", blob.len())),
    }
}

/// Run `sql` against every database in `found` and concatenate the rows.
///
/// A file that cannot be queried is logged and skipped; the call only fails
/// when no file could be queried at all.
pub fn collect_from_databases(found: &[Arc<FileHandle>], sql: &str) -> Result<ArtifactOutput> {
    let mut merged: Option<ArtifactOutput> = None;
    let mut last_error = None;

    for handle in found {
        match handle.with_database(|conn| query_rows(conn, sql)) {
            Ok(output) => {
                debug!("{}: {} row(s)", handle.path().display(), output.rows.len());
                match merged.as_mut() {
                    Some(existing) => existing.rows.extend(output.rows),
                    None => merged = Some(output),
                }
            }
            Err(e) => {
                warn!("Could not query {}: {:#}", handle.path().display(), e);
                last_error = Some(e.context(format!("Failed to query {}", handle.path().display())));
            }
        }
    }

    match (merged, last_error) {
        (Some(output), _) => Ok(output),
        (None, Some(e)) => Err(e),
        (None, None) => Err(anyhow!("No database files to query")),
    }
}
