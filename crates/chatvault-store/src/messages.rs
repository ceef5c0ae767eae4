use chatvault_shared::RowId;
use rusqlite::Row;

use crate::database::{flag, key, reference, text, Database};
use crate::error::Result;
use crate::models::{EditRow, ForwardRow, MentionRow, MessageRow, QuotedRow, TableRead};
use crate::schema::{
    MESSAGE, MESSAGE_EDIT_INFO, MESSAGE_FORWARDED, MESSAGE_MENTIONS, MESSAGE_QUOTED,
};

impl Database {
    /// Every message row, in storage order (including the placeholder row).
    pub fn read_messages(&self) -> Result<TableRead<MessageRow>> {
        let select = self.require_projection(&MESSAGE, "m")?;
        let sql = format!("SELECT {select} FROM message m ORDER BY m._id");
        self.read_table(MESSAGE.name, &sql, [], row_to_message)
    }

    pub fn read_quotes(&self) -> Result<Option<TableRead<QuotedRow>>> {
        let Some(select) = self.projection(&MESSAGE_QUOTED, "q")? else {
            return Ok(None);
        };
        let sql = format!("SELECT {select} FROM message_quoted q ORDER BY q.rowid");
        self.read_table(MESSAGE_QUOTED.name, &sql, [], |row| {
            Ok(QuotedRow {
                message_row_id: key(row, "message_row_id")?,
                key_id: text(row, "key_id")?,
                from_me: flag(row, "from_me")?,
                sender_jid_row_id: reference(row, "sender_jid_row_id")?,
                message_type: row.get("message_type")?,
                text_data: text(row, "text_data")?,
            })
        })
        .map(Some)
    }

    pub fn read_forwards(&self) -> Result<Option<TableRead<ForwardRow>>> {
        let Some(select) = self.projection(&MESSAGE_FORWARDED, "f")? else {
            return Ok(None);
        };
        let sql = format!("SELECT {select} FROM message_forwarded f ORDER BY f.rowid");
        self.read_table(MESSAGE_FORWARDED.name, &sql, [], |row| {
            Ok(ForwardRow {
                message_row_id: key(row, "message_row_id")?,
                forward_score: row.get("forward_score")?,
            })
        })
        .map(Some)
    }

    pub fn read_mentions(&self) -> Result<Option<TableRead<MentionRow>>> {
        let Some(select) = self.projection(&MESSAGE_MENTIONS, "mm")? else {
            return Ok(None);
        };
        let sql = format!("SELECT {select} FROM message_mentions mm ORDER BY mm._id");
        self.read_table(MESSAGE_MENTIONS.name, &sql, [], |row| {
            Ok(MentionRow {
                row_id: key(row, "_id")?,
                message_row_id: key(row, "message_row_id")?,
                jid_row_id: reference(row, "jid_row_id")?,
            })
        })
        .map(Some)
    }

    pub fn read_edits(&self) -> Result<Option<TableRead<EditRow>>> {
        let Some(select) = self.projection(&MESSAGE_EDIT_INFO, "e")? else {
            return Ok(None);
        };
        let sql = format!("SELECT {select} FROM message_edit_info e ORDER BY e.rowid");
        self.read_table(MESSAGE_EDIT_INFO.name, &sql, [], |row| {
            Ok(EditRow {
                message_row_id: key(row, "message_row_id")?,
                original_key_id: text(row, "original_key_id")?,
                edited_timestamp: row.get("edited_timestamp")?,
                sender_timestamp: row.get("sender_timestamp")?,
            })
        })
        .map(Some)
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        row_id: key(row, "_id")?,
        chat_row_id: row.get::<_, Option<i64>>("chat_row_id")?.map(RowId),
        from_me: flag(row, "from_me")?,
        key_id: text(row, "key_id")?,
        sender_jid_row_id: reference(row, "sender_jid_row_id")?,
        status: row.get("status")?,
        timestamp: row.get("timestamp")?,
        received_timestamp: row.get("received_timestamp")?,
        receipt_server_timestamp: row.get("receipt_server_timestamp")?,
        message_type: row.get("message_type")?,
        text_data: text(row, "text_data")?,
        starred: flag(row, "starred")?,
    })
}
