use crate::database::{key, reference, Database};
use crate::error::Result;
use crate::models::{ReceiptRow, TableRead};
use crate::schema::RECEIPT_USER;

impl Database {
    /// Per-recipient receipt rows. Timestamps are returned as stored; the
    /// engine decides what a missing one means.
    pub fn read_receipts(&self) -> Result<Option<TableRead<ReceiptRow>>> {
        let Some(select) = self.projection(&RECEIPT_USER, "r")? else {
            return Ok(None);
        };
        let sql = format!("SELECT {select} FROM receipt_user r ORDER BY r._id");
        self.read_table(RECEIPT_USER.name, &sql, [], |row| {
            Ok(ReceiptRow {
                row_id: key(row, "_id")?,
                message_row_id: key(row, "message_row_id")?,
                user_jid_row_id: reference(row, "receipt_user_jid_row_id")?,
                receipt_timestamp: row.get("receipt_timestamp")?,
                read_timestamp: row.get("read_timestamp")?,
                played_timestamp: row.get("played_timestamp")?,
            })
        })
        .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use chatvault_shared::RowId;

    use crate::database::tests::fixture;

    #[test]
    fn receipt_timestamps_are_raw() {
        let db = fixture(
            "INSERT INTO receipt_user
                (_id, message_row_id, receipt_user_jid_row_id, receipt_timestamp, read_timestamp)
             VALUES (1, 8, 2, 0, 1700000005000);",
        );

        let rows = db.read_receipts().unwrap().unwrap().rows;
        assert_eq!(rows[0].message_row_id, RowId(8));
        assert_eq!(rows[0].user_jid_row_id, Some(RowId(2)));
        assert_eq!(rows[0].receipt_timestamp, Some(0));
        assert_eq!(rows[0].read_timestamp, Some(1_700_000_005_000));
        assert_eq!(rows[0].played_timestamp, None);
    }
}
