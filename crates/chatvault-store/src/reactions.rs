use chatvault_shared::constants::ADD_ON_REACTION;

use crate::database::{flag, key, reference, text, Database};
use crate::error::Result;
use crate::models::{ReactionRow, TableRead};
use crate::schema::{MESSAGE_ADD_ON, MESSAGE_ADD_ON_REACTION};

impl Database {
    /// Reaction add-ons, oldest first.
    ///
    /// Every stored reaction is returned, including repeated reactions from
    /// the same sender and empty ones (a retracted reaction).
    pub fn read_reactions(&self) -> Result<Option<TableRead<ReactionRow>>> {
        let (Some(add_on), Some(reaction)) = (
            self.projection(&MESSAGE_ADD_ON, "ao")?,
            self.projection(&MESSAGE_ADD_ON_REACTION, "ar")?,
        ) else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {add_on}, {reaction}
             FROM message_add_on ao
             JOIN message_add_on_reaction ar ON ar.message_add_on_row_id = ao._id
             WHERE ao.message_add_on_type = ?1
             ORDER BY ao._id"
        );

        self.read_table(MESSAGE_ADD_ON_REACTION.name, &sql, [ADD_ON_REACTION], |row| {
            Ok(ReactionRow {
                add_on_row_id: key(row, "_id")?,
                message_row_id: key(row, "parent_message_row_id")?,
                from_me: flag(row, "from_me")?,
                sender_jid_row_id: reference(row, "sender_jid_row_id")?,
                emoji: text(row, "reaction")?,
                sender_timestamp: row.get("sender_timestamp")?,
            })
        })
        .map(Some)
    }
}
