use rusqlite::Row;

use crate::database::{key, text, Database};
use crate::error::Result;
use crate::models::{JidRow, TableRead};
use crate::schema::JID;

impl Database {
    /// Every address row, in storage order.
    pub fn read_jids(&self) -> Result<TableRead<JidRow>> {
        let select = self.require_projection(&JID, "j")?;
        let sql = format!("SELECT {select} FROM jid j ORDER BY j._id");
        self.read_table(JID.name, &sql, [], row_to_jid)
    }
}

fn row_to_jid(row: &Row<'_>) -> rusqlite::Result<JidRow> {
    Ok(JidRow {
        row_id: key(row, "_id")?,
        raw_string: text(row, "raw_string")?,
        user: text(row, "user")?,
        server: text(row, "server")?,
    })
}
