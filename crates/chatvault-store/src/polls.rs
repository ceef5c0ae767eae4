use chatvault_shared::constants::ADD_ON_POLL_VOTE;

use crate::database::{flag, key, reference, text, Database};
use crate::error::Result;
use crate::models::{PollOptionRow, PollRow, PollVoteRow, TableRead};
use crate::schema::{
    MESSAGE_ADD_ON, MESSAGE_ADD_ON_POLL_VOTE, MESSAGE_ADD_ON_POLL_VOTE_SELECTED_OPTION,
    MESSAGE_POLL, MESSAGE_POLL_OPTION,
};

impl Database {
    pub fn read_polls(&self) -> Result<Option<TableRead<PollRow>>> {
        let Some(select) = self.projection(&MESSAGE_POLL, "p")? else {
            return Ok(None);
        };
        let sql = format!("SELECT {select} FROM message_poll p ORDER BY p.rowid");
        self.read_table(MESSAGE_POLL.name, &sql, [], |row| {
            Ok(PollRow {
                message_row_id: key(row, "message_row_id")?,
                selectable_options_count: row.get("selectable_options_count")?,
                poll_type: row.get("poll_type")?,
            })
        })
        .map(Some)
    }

    pub fn read_poll_options(&self) -> Result<Option<TableRead<PollOptionRow>>> {
        let Some(select) = self.projection(&MESSAGE_POLL_OPTION, "o")? else {
            return Ok(None);
        };
        let sql = format!("SELECT {select} FROM message_poll_option o ORDER BY o._id");
        self.read_table(MESSAGE_POLL_OPTION.name, &sql, [], |row| {
            Ok(PollOptionRow {
                row_id: key(row, "_id")?,
                message_row_id: key(row, "message_row_id")?,
                option_name: text(row, "option_name")?,
                vote_total: row.get("vote_total")?,
            })
        })
        .map(Some)
    }

    /// One row per (vote, selected option), oldest vote first.
    pub fn read_poll_votes(&self) -> Result<Option<TableRead<PollVoteRow>>> {
        let (Some(add_on), Some(vote), Some(selected)) = (
            self.projection(&MESSAGE_ADD_ON, "ao")?,
            self.projection(&MESSAGE_ADD_ON_POLL_VOTE, "pv")?,
            self.projection(&MESSAGE_ADD_ON_POLL_VOTE_SELECTED_OPTION, "so")?,
        ) else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {add_on}, {vote}, {selected}
             FROM message_add_on ao
             JOIN message_add_on_poll_vote pv ON pv.message_add_on_row_id = ao._id
             JOIN message_add_on_poll_vote_selected_option so ON so.message_add_on_row_id = ao._id
             WHERE ao.message_add_on_type = ?1
             ORDER BY ao._id, so.rowid"
        );

        self.read_table(MESSAGE_ADD_ON_POLL_VOTE.name, &sql, [ADD_ON_POLL_VOTE], |row| {
            Ok(PollVoteRow {
                add_on_row_id: key(row, "_id")?,
                message_row_id: key(row, "parent_message_row_id")?,
                from_me: flag(row, "from_me")?,
                sender_jid_row_id: reference(row, "sender_jid_row_id")?,
                sender_timestamp: row.get("sender_timestamp")?,
                option_row_id: reference(row, "message_poll_option_id")?,
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
    fn multi_choice_vote_yields_one_row_per_option() {
        let db = fixture(
            "INSERT INTO message_poll (message_row_id, selectable_options_count) VALUES (20, 0);
             INSERT INTO message_poll_option (_id, message_row_id, option_name, vote_total)
             VALUES (1, 20, 'Pizza', 1), (2, 20, 'Sushi', 1);
             INSERT INTO message_add_on (_id, parent_message_row_id, message_add_on_type, sender_jid_row_id)
             VALUES (9, 20, 67, 4);
             INSERT INTO message_add_on_poll_vote (message_add_on_row_id, sender_timestamp)
             VALUES (9, 1700000000000);
             INSERT INTO message_add_on_poll_vote_selected_option (message_add_on_row_id, message_poll_option_id)
             VALUES (9, 1), (9, 2);",
        );

        assert_eq!(db.read_polls().unwrap().unwrap().rows.len(), 1);
        assert_eq!(db.read_poll_options().unwrap().unwrap().rows.len(), 2);

        let votes = db.read_poll_votes().unwrap().unwrap().rows;
        let options: Vec<_> = votes.iter().map(|v| v.option_row_id).collect();
        assert_eq!(options, vec![Some(RowId(1)), Some(RowId(2))]);
        assert!(votes.iter().all(|v| v.message_row_id == RowId(20)));
    }
}
