//! Reference indexing.
//!
//! Side tables (media, receipts, reactions, ...) are grouped by their owning
//! message row once, so normalization never scans a table per message.
//! Rows whose owner is not a message that will be archived are dropped here
//! and counted.

use std::collections::{HashMap, HashSet};

use chatvault_shared::RowId;
use chatvault_store::{
    schema, EditRow, ForwardRow, LinkPreviewRow, LocationRow, MediaRow, MentionRow, MessageRow,
    PollOptionRow, PollRow, PollVoteRow, QuotedRow, ReactionRow, ReceiptRow, Snapshot,
    ThumbnailRow,
};

use crate::summary::RunSummary;

/// A side-table row owned by one message.
pub trait OwnedRow {
    const TABLE: &'static str;

    fn owner(&self) -> RowId;
}

macro_rules! owned_by_message {
    ($($row:ty => $table:expr),* $(,)?) => {
        $(
            impl OwnedRow for $row {
                const TABLE: &'static str = $table;

                fn owner(&self) -> RowId {
                    self.message_row_id
                }
            }
        )*
    };
}

owned_by_message! {
    QuotedRow => schema::MESSAGE_QUOTED.name,
    MediaRow => schema::MESSAGE_MEDIA.name,
    ThumbnailRow => schema::MESSAGE_THUMBNAIL.name,
    LinkPreviewRow => schema::MESSAGE_TEXT.name,
    ReceiptRow => schema::RECEIPT_USER.name,
    ReactionRow => schema::MESSAGE_ADD_ON_REACTION.name,
    LocationRow => schema::MESSAGE_LOCATION.name,
    ForwardRow => schema::MESSAGE_FORWARDED.name,
    MentionRow => schema::MESSAGE_MENTIONS.name,
    EditRow => schema::MESSAGE_EDIT_INFO.name,
    PollRow => schema::MESSAGE_POLL.name,
    PollOptionRow => schema::MESSAGE_POLL_OPTION.name,
    PollVoteRow => schema::MESSAGE_ADD_ON_POLL_VOTE.name,
}

/// Rows of one side table grouped by owner, in storage order.
#[derive(Debug)]
pub struct RowIndex<'a, T> {
    by_owner: HashMap<RowId, Vec<&'a T>>,
    indexed: usize,
}

impl<'a, T: OwnedRow> RowIndex<'a, T> {
    pub fn build(rows: &'a [T], owners: &HashSet<RowId>, summary: &mut RunSummary) -> Self {
        let mut by_owner: HashMap<RowId, Vec<&'a T>> = HashMap::new();
        let mut orphans = 0;

        for row in rows {
            if owners.contains(&row.owner()) {
                by_owner.entry(row.owner()).or_default().push(row);
            } else {
                orphans += 1;
            }
        }

        if orphans > 0 {
            tracing::warn!(table = T::TABLE, orphans, "rows without an owning message");
        }
        summary.record_orphans(T::TABLE, orphans);

        Self {
            by_owner,
            indexed: rows.len() - orphans,
        }
    }

    pub fn get(&self, owner: RowId) -> &[&'a T] {
        self.by_owner.get(&owner).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, owner: RowId) -> Option<&'a T> {
        self.get(owner).first().copied()
    }

    /// Number of rows kept.
    pub fn len(&self) -> usize {
        self.indexed
    }

    pub fn is_empty(&self) -> bool {
        self.indexed == 0
    }
}

/// Finds a message by the external id a reply quotes.
///
/// External ids are only unique per chat and per direction, so the key is
/// the chat row plus the id.
#[derive(Debug, Default)]
pub struct MessageKeyIndex {
    by_key: HashMap<(RowId, String), Vec<(RowId, bool)>>,
}

impl MessageKeyIndex {
    pub fn build<'m>(messages: impl IntoIterator<Item = &'m MessageRow>) -> Self {
        let mut index = Self::default();
        for msg in messages {
            if let (Some(chat), Some(key)) = (msg.chat_row_id, msg.key_id.as_ref()) {
                index
                    .by_key
                    .entry((chat, key.clone()))
                    .or_default()
                    .push((msg.row_id, msg.from_me));
            }
        }
        index
    }

    /// Prefer the candidate whose direction matches the quote, otherwise
    /// take the first in storage order.
    pub fn resolve(&self, chat: RowId, key: &str, from_me: bool) -> Option<RowId> {
        let candidates = self.by_key.get(&(chat, key.to_string()))?;
        candidates
            .iter()
            .find(|(_, dir)| *dir == from_me)
            .or_else(|| candidates.first())
            .map(|(row, _)| *row)
    }
}

/// Every side table of a snapshot, indexed by owning message.
#[derive(Debug)]
pub struct ReferenceIndex<'a> {
    pub quotes: RowIndex<'a, QuotedRow>,
    pub media: RowIndex<'a, MediaRow>,
    pub thumbnails: RowIndex<'a, ThumbnailRow>,
    pub link_previews: RowIndex<'a, LinkPreviewRow>,
    pub receipts: RowIndex<'a, ReceiptRow>,
    pub reactions: RowIndex<'a, ReactionRow>,
    pub locations: RowIndex<'a, LocationRow>,
    pub forwards: RowIndex<'a, ForwardRow>,
    pub mentions: RowIndex<'a, MentionRow>,
    pub edits: RowIndex<'a, EditRow>,
    pub polls: RowIndex<'a, PollRow>,
    pub poll_options: RowIndex<'a, PollOptionRow>,
    pub poll_votes: RowIndex<'a, PollVoteRow>,
    pub message_keys: MessageKeyIndex,
}

impl<'a> ReferenceIndex<'a> {
    pub fn build(snapshot: &'a Snapshot, summary: &mut RunSummary) -> Self {
        let archived = || snapshot.messages.iter().filter(|m| !m.is_placeholder());
        let owners: HashSet<RowId> = archived().map(|m| m.row_id).collect();

        let index = Self {
            quotes: RowIndex::build(&snapshot.quotes, &owners, summary),
            media: RowIndex::build(&snapshot.media, &owners, summary),
            thumbnails: RowIndex::build(&snapshot.thumbnails, &owners, summary),
            link_previews: RowIndex::build(&snapshot.link_previews, &owners, summary),
            receipts: RowIndex::build(&snapshot.receipts, &owners, summary),
            reactions: RowIndex::build(&snapshot.reactions, &owners, summary),
            locations: RowIndex::build(&snapshot.locations, &owners, summary),
            forwards: RowIndex::build(&snapshot.forwards, &owners, summary),
            mentions: RowIndex::build(&snapshot.mentions, &owners, summary),
            edits: RowIndex::build(&snapshot.edits, &owners, summary),
            polls: RowIndex::build(&snapshot.polls, &owners, summary),
            poll_options: RowIndex::build(&snapshot.poll_options, &owners, summary),
            poll_votes: RowIndex::build(&snapshot.poll_votes, &owners, summary),
            message_keys: MessageKeyIndex::build(archived()),
        };

        tracing::debug!(
            messages = owners.len(),
            reactions = index.reactions.len(),
            receipts = index.receipts.len(),
            media = index.media.len(),
            "reference index built"
        );
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(row: i64, chat: i64, key: &str, from_me: bool) -> MessageRow {
        MessageRow {
            row_id: RowId(row),
            chat_row_id: Some(RowId(chat)),
            key_id: Some(key.to_string()),
            from_me,
            ..Default::default()
        }
    }

    fn reaction(add_on: i64, message: i64) -> ReactionRow {
        ReactionRow {
            add_on_row_id: RowId(add_on),
            message_row_id: RowId(message),
            emoji: Some("👍".into()),
            ..Default::default()
        }
    }

    #[test]
    fn orphaned_reaction_is_counted_and_excluded() {
        let snapshot = Snapshot {
            messages: vec![message(1, 1, "A", false)],
            reactions: vec![reaction(10, 1), reaction(11, 999)],
            ..Default::default()
        };
        let mut summary = RunSummary::new();
        let index = ReferenceIndex::build(&snapshot, &mut summary);

        assert_eq!(index.reactions.get(RowId(1)).len(), 1);
        assert!(index.reactions.get(RowId(999)).is_empty());
        assert_eq!(index.reactions.len(), 1);
        assert_eq!(summary.orphaned_rows.get("message_add_on_reaction"), Some(&1));
    }

    #[test]
    fn rows_on_the_placeholder_are_orphans() {
        let snapshot = Snapshot {
            messages: vec![message(1, -1, "", false), message(2, 1, "B", true)],
            reactions: vec![reaction(10, 1), reaction(11, 2)],
            ..Default::default()
        };
        let mut summary = RunSummary::new();
        let index = ReferenceIndex::build(&snapshot, &mut summary);

        assert_eq!(index.reactions.len(), 1);
        assert_eq!(summary.orphaned_rows.get("message_add_on_reaction"), Some(&1));
    }

    #[test]
    fn grouping_keeps_storage_order() {
        let snapshot = Snapshot {
            messages: vec![message(1, 1, "A", false)],
            reactions: vec![reaction(12, 1), reaction(10, 1), reaction(11, 1)],
            ..Default::default()
        };
        let mut summary = RunSummary::new();
        let index = ReferenceIndex::build(&snapshot, &mut summary);

        let ids: Vec<i64> = index
            .reactions
            .get(RowId(1))
            .iter()
            .map(|r| r.add_on_row_id.0)
            .collect();
        assert_eq!(ids, vec![12, 10, 11]);
        assert!(summary.orphaned_rows.is_empty());
    }

    #[test]
    fn key_lookup_is_scoped_to_the_chat() {
        let messages = vec![
            message(1, 1, "K", false),
            message(2, 2, "K", false),
            message(3, 1, "K", true),
        ];
        let keys = MessageKeyIndex::build(&messages);

        assert_eq!(keys.resolve(RowId(1), "K", false), Some(RowId(1)));
        assert_eq!(keys.resolve(RowId(1), "K", true), Some(RowId(3)));
        assert_eq!(keys.resolve(RowId(2), "K", true), Some(RowId(2)));
        assert_eq!(keys.resolve(RowId(3), "K", false), None);
        assert_eq!(keys.resolve(RowId(1), "missing", false), None);
    }
}
