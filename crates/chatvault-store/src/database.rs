//! Read-only access to a decrypted snapshot.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] opened with
//! `SQLITE_OPEN_READ_ONLY` and `query_only`, so nothing in this crate can
//! write to the source. Table readers live in sibling modules as further
//! `impl Database` blocks.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chatvault_shared::RowId;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OpenFlags, Params, Row};

use crate::error::{Result, StoreError};
use crate::models::{LossyTextRow, MalformedRow, OpaqueValue, TableRead};
use crate::schema::TableSpec;

/// Wrapper around a read-only [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the snapshot at `path` for reading.
    ///
    /// Fails if the file is missing or is not an SQLite database. The check
    /// runs one query up front because SQLite opens lazily.
    pub fn open_snapshot(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(StoreError::SnapshotNotFound(path.to_path_buf()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        tracing::info!(path = %path.display(), "opening snapshot");

        Self::from_connection(conn)
    }

    /// Wrap an already open connection (e.g. an in-memory fixture).
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "query_only", "ON")?;
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }

    /// Column names of `table`, or `None` when the table does not exist.
    pub fn table_columns(&self, table: &str) -> Result<Option<BTreeSet<String>>> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        Ok(if names.is_empty() { None } else { Some(names) })
    }

    /// Build the select list for `spec` under `alias`.
    ///
    /// Returns `None` when the table is absent. Missing key columns are an
    /// error; any other missing column is selected as `NULL` under its own
    /// name so row mappers can always read by name.
    pub(crate) fn projection(&self, spec: &TableSpec, alias: &str) -> Result<Option<String>> {
        let Some(present) = self.table_columns(spec.name)? else {
            return Ok(None);
        };

        if let Some(column) = spec.key.iter().copied().find(|c| !present.contains(*c)) {
            return Err(StoreError::MissingColumn {
                table: spec.name,
                column,
            });
        }

        let select = spec
            .key
            .iter()
            .chain(spec.columns)
            .map(|col| {
                if present.contains(*col) {
                    format!("{alias}.{col} AS {col}")
                } else {
                    format!("NULL AS {col}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Some(select))
    }

    /// Like [`Database::projection`] but the table must exist.
    pub(crate) fn require_projection(&self, spec: &TableSpec, alias: &str) -> Result<String> {
        self.projection(spec, alias)?
            .ok_or(StoreError::MissingTable(spec.name))
    }

    /// Run `sql` and decode every row with `map`.
    ///
    /// A row that fails to decode is skipped and reported in
    /// [`TableRead::malformed`] together with its key (the first selected
    /// column) when that is still readable. A decoded row whose text held
    /// invalid UTF-8 is kept and reported in [`TableRead::lossy_text`].
    /// Statement-level failures are returned as errors.
    pub(crate) fn read_table<T, P, F>(
        &self,
        table: &'static str,
        sql: &str,
        params: P,
        mut map: F,
    ) -> Result<TableRead<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;

        let mut read = TableRead::default();
        while let Some(row) = rows.next()? {
            let key = row.get::<_, i64>(0).ok();
            match map(row) {
                Ok(value) => {
                    read.rows.push(value);
                    let columns = invalid_text_columns(row);
                    if !columns.is_empty() {
                        tracing::warn!(table, key = ?key, ?columns, "replaced invalid UTF-8 in row");
                        read.lossy_text.push(LossyTextRow { table, key, columns });
                    }
                }
                Err(e) => {
                    tracing::warn!(table, key = ?key, error = %e, "skipping malformed row");
                    read.malformed.push(MalformedRow {
                        table,
                        key,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            table,
            rows = read.rows.len(),
            malformed = read.malformed.len(),
            lossy_text = read.lossy_text.len(),
            "table read"
        );
        Ok(read)
    }
}

// ---------------------------------------------------------------------------
// Column helpers shared by the row mappers
// ---------------------------------------------------------------------------

/// Integer flag column; NULL reads as `false`.
pub(crate) fn flag(row: &Row<'_>, column: &str) -> rusqlite::Result<bool> {
    Ok(row.get::<_, Option<i64>>(column)?.is_some_and(|v| v != 0))
}

/// Row key column that must hold an integer.
pub(crate) fn key(row: &Row<'_>, column: &str) -> rusqlite::Result<RowId> {
    row.get::<_, i64>(column).map(RowId)
}

/// Reference to a jid/message row. Zero and negative values mean "none".
pub(crate) fn reference(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<RowId>> {
    Ok(row
        .get::<_, Option<i64>>(column)?
        .filter(|id| *id > 0)
        .map(RowId))
}

/// Optional text column. Invalid UTF-8 is replaced rather than failing the
/// row; any other non-text value still fails as usual.
pub(crate) fn text(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<String>> {
    match row.get_ref(column)? {
        ValueRef::Text(bytes) => Ok(Some(String::from_utf8_lossy(bytes).into_owned())),
        _ => row.get(column),
    }
}

/// Like [`text`] but NULL is an error.
pub(crate) fn required_text(row: &Row<'_>, column: &str) -> rusqlite::Result<String> {
    match row.get_ref(column)? {
        ValueRef::Text(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        _ => row.get(column),
    }
}

/// Names of the text columns in `row` that are not valid UTF-8.
fn invalid_text_columns(row: &Row<'_>) -> Vec<String> {
    let stmt = row.as_ref();
    (0..stmt.column_count())
        .filter(|&i| {
            matches!(row.get_ref(i), Ok(ValueRef::Text(bytes)) if std::str::from_utf8(bytes).is_err())
        })
        .filter_map(|i| stmt.column_name(i).ok().map(str::to_string))
        .collect()
}

/// Column carried through byte-for-byte.
pub(crate) fn opaque(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<OpaqueValue>> {
    Ok(match row.get::<_, Value>(column)? {
        Value::Null => None,
        Value::Blob(bytes) => Some(OpaqueValue::Bytes(bytes)),
        Value::Text(text) => Some(OpaqueValue::Text(text)),
        Value::Integer(n) => Some(OpaqueValue::Text(n.to_string())),
        Value::Real(r) => Some(OpaqueValue::Text(r.to_string())),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::{JID, REFERENCE_SCHEMA};

    /// In-memory snapshot with the reference schema, populated by `seed`.
    pub(crate) fn fixture(seed: &str) -> Database {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(REFERENCE_SCHEMA).unwrap();
        conn.execute_batch(seed).unwrap();
        Database::from_connection(conn).unwrap()
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let err = Database::open_snapshot(&path).err().expect("should fail");
        assert!(matches!(err, StoreError::SnapshotNotFound(_)));
    }

    #[test]
    fn open_non_database_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, b"definitely not sqlite, just some bytes to fill a page").unwrap();
        let err = Database::open_snapshot(&path).err().expect("should fail");
        assert!(matches!(err, StoreError::Sqlite(_)));
    }

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msgstore.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(REFERENCE_SCHEMA).unwrap();
        }

        let db = Database::open_snapshot(&path).expect("should open");
        assert!(db.path().is_some());
        assert!(db.table_columns("jid").unwrap().is_some());
        assert!(db.table_columns("nope").unwrap().is_none());
    }

    #[test]
    fn snapshot_is_read_only() {
        let db = fixture("");
        let res = db.conn().execute("INSERT INTO jid (raw_string) VALUES ('x')", []);
        assert!(res.is_err());
    }

    #[test]
    fn projection_fills_missing_columns_with_null() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE jid (_id INTEGER PRIMARY KEY, raw_string TEXT);")
            .unwrap();
        let db = Database::from_connection(conn).unwrap();

        let select = db.projection(&JID, "j").unwrap().unwrap();
        assert_eq!(
            select,
            "j._id AS _id, j.raw_string AS raw_string, NULL AS user, NULL AS server"
        );
    }

    #[test]
    fn invalid_utf8_text_is_replaced_not_skipped() {
        let db = fixture(
            "INSERT INTO jid (_id, raw_string) VALUES (1, CAST(x'48c328' AS TEXT)), (2, 'fine');",
        );

        let sql = "SELECT j._id AS _id, j.raw_string AS raw_string FROM jid j ORDER BY j._id";
        let read = db
            .read_table("jid", sql, [], |row| text(row, "raw_string"))
            .unwrap();

        assert!(read.malformed.is_empty());
        assert_eq!(read.rows, vec![Some("H\u{fffd}(".to_string()), Some("fine".to_string())]);
        assert_eq!(
            read.lossy_text,
            vec![LossyTextRow {
                table: "jid",
                key: Some(1),
                columns: vec!["raw_string".to_string()],
            }]
        );
    }

    #[test]
    fn text_helpers_still_reject_other_types() {
        let db = fixture("INSERT INTO jid (_id, raw_string) VALUES (1, x'00ff'), (2, NULL);");

        let sql = "SELECT j._id AS _id, j.raw_string AS raw_string FROM jid j ORDER BY j._id";
        let optional = db.read_table("jid", sql, [], |row| text(row, "raw_string")).unwrap();
        assert_eq!(optional.rows, vec![None]);
        assert_eq!(optional.malformed[0].key, Some(1));

        let required = db
            .read_table("jid", sql, [], |row| required_text(row, "raw_string"))
            .unwrap();
        assert!(required.rows.is_empty());
        assert_eq!(required.malformed.len(), 2);
    }

    #[test]
    fn projection_requires_key_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE jid (_id INTEGER PRIMARY KEY, user TEXT);")
            .unwrap();
        let db = Database::from_connection(conn).unwrap();

        let err = db.projection(&JID, "j").unwrap_err();
        assert!(matches!(
            err,
            StoreError::MissingColumn {
                table: "jid",
                column: "raw_string"
            }
        ));
    }
}
