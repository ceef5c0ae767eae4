//! Readers for chat-level tables: [`ChatRow`], [`ParticipantRow`] and
//! [`CallLogRow`].

use rusqlite::Row;

use crate::database::{flag, key, reference, required_text, text, Database};
use crate::error::Result;
use crate::models::{CallLogRow, ChatRow, ParticipantRow, TableRead};
use crate::schema::{CALL_LOG, CHAT, GROUP_PARTICIPANTS};

impl Database {
    // ------------------------------------------------------------------
    // Chats
    // ------------------------------------------------------------------

    /// All chats, in storage order.
    pub fn read_chats(&self) -> Result<TableRead<ChatRow>> {
        let select = self.require_projection(&CHAT, "c")?;
        let sql = format!("SELECT {select} FROM chat c ORDER BY c._id");
        self.read_table(CHAT.name, &sql, [], row_to_chat)
    }

    // ------------------------------------------------------------------
    // Group membership
    // ------------------------------------------------------------------

    /// Group membership rows. `None` when the snapshot has no such table.
    pub fn read_participants(&self) -> Result<Option<TableRead<ParticipantRow>>> {
        let Some(select) = self.projection(&GROUP_PARTICIPANTS, "p")? else {
            return Ok(None);
        };
        let sql = format!("SELECT {select} FROM group_participants p ORDER BY p._id");
        self.read_table(GROUP_PARTICIPANTS.name, &sql, [], row_to_participant)
            .map(Some)
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Call history rows. `None` when the snapshot has no call log.
    pub fn read_call_log(&self) -> Result<Option<TableRead<CallLogRow>>> {
        let Some(select) = self.projection(&CALL_LOG, "cl")? else {
            return Ok(None);
        };
        let sql = format!("SELECT {select} FROM call_log cl ORDER BY cl._id");
        self.read_table(CALL_LOG.name, &sql, [], row_to_call)
            .map(Some)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`ChatRow`].
fn row_to_chat(row: &Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        row_id: key(row, "_id")?,
        jid_row_id: reference(row, "jid_row_id")?,
        subject: text(row, "subject")?,
        group_type: row.get("group_type")?,
        created_timestamp: row.get("created_timestamp")?,
        archived: flag(row, "archived")?,
        hidden: flag(row, "hidden")?,
        mute_end_timestamp: row.get("mute_end_timestamp")?,
        pinned_message_row_id: reference(row, "pinned_message_row_id")?,
        ephemeral_expiration: row.get("ephemeral_expiration")?,
    })
}

fn row_to_participant(row: &Row<'_>) -> rusqlite::Result<ParticipantRow> {
    Ok(ParticipantRow {
        row_id: key(row, "_id")?,
        group_jid: required_text(row, "gjid")?,
        member_jid: required_text(row, "jid")?,
        admin: flag(row, "admin")?,
    })
}

fn row_to_call(row: &Row<'_>) -> rusqlite::Result<CallLogRow> {
    Ok(CallLogRow {
        row_id: key(row, "_id")?,
        jid_row_id: reference(row, "jid_row_id")?,
        from_me: flag(row, "from_me")?,
        call_id: text(row, "call_id")?,
        timestamp: row.get("timestamp")?,
        video_call: flag(row, "video_call")?,
        duration: row.get("duration")?,
        call_result: row.get("call_result")?,
        bytes_transferred: row.get("bytes_transferred")?,
    })
}
