//! Bulk read of one snapshot into memory.
//!
//! The whole source is read once, up front, so the engine never issues a
//! query while it builds the archive. Row-level problems are collected
//! rather than raised; only snapshot-level problems return an error.

use crate::database::Database;
use crate::error::Result;
use crate::models::*;
use crate::schema;

/// Every table the engine consumes, fully decoded.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub jids: Vec<JidRow>,
    pub chats: Vec<ChatRow>,
    pub messages: Vec<MessageRow>,
    pub participants: Vec<ParticipantRow>,
    pub calls: Vec<CallLogRow>,
    pub quotes: Vec<QuotedRow>,
    pub media: Vec<MediaRow>,
    pub thumbnails: Vec<ThumbnailRow>,
    pub link_previews: Vec<LinkPreviewRow>,
    pub receipts: Vec<ReceiptRow>,
    pub reactions: Vec<ReactionRow>,
    pub locations: Vec<LocationRow>,
    pub forwards: Vec<ForwardRow>,
    pub mentions: Vec<MentionRow>,
    pub edits: Vec<EditRow>,
    pub polls: Vec<PollRow>,
    pub poll_options: Vec<PollOptionRow>,
    pub poll_votes: Vec<PollVoteRow>,
    /// Rows skipped because they could not be decoded.
    pub malformed: Vec<MalformedRow>,
    /// Rows kept with invalid UTF-8 replaced.
    pub lossy_text: Vec<LossyTextRow>,
    /// Optional tables this snapshot does not have.
    pub absent_tables: Vec<&'static str>,
}

impl Snapshot {
    fn take<T>(&mut self, read: TableRead<T>) -> Vec<T> {
        self.malformed.extend(read.malformed);
        self.lossy_text.extend(read.lossy_text);
        read.rows
    }

    fn take_optional<T>(&mut self, table: &'static str, read: Option<TableRead<T>>) -> Vec<T> {
        match read {
            Some(read) => self.take(read),
            None => {
                tracing::warn!(table, "optional table absent from snapshot");
                self.absent_tables.push(table);
                Vec::new()
            }
        }
    }
}

impl Database {
    /// Read every table the engine needs.
    pub fn load_snapshot(&self) -> Result<Snapshot> {
        let mut snap = Snapshot::default();

        let jids = self.read_jids()?;
        snap.jids = snap.take(jids);
        let chats = self.read_chats()?;
        snap.chats = snap.take(chats);
        let messages = self.read_messages()?;
        snap.messages = snap.take(messages);

        let read = self.read_participants()?;
        snap.participants = snap.take_optional(schema::GROUP_PARTICIPANTS.name, read);
        let read = self.read_call_log()?;
        snap.calls = snap.take_optional(schema::CALL_LOG.name, read);
        let read = self.read_quotes()?;
        snap.quotes = snap.take_optional(schema::MESSAGE_QUOTED.name, read);
        let read = self.read_media()?;
        snap.media = snap.take_optional(schema::MESSAGE_MEDIA.name, read);
        let read = self.read_thumbnails()?;
        snap.thumbnails = snap.take_optional(schema::MESSAGE_THUMBNAIL.name, read);
        let read = self.read_link_previews()?;
        snap.link_previews = snap.take_optional(schema::MESSAGE_TEXT.name, read);
        let read = self.read_receipts()?;
        snap.receipts = snap.take_optional(schema::RECEIPT_USER.name, read);
        let read = self.read_reactions()?;
        snap.reactions = snap.take_optional(schema::MESSAGE_ADD_ON_REACTION.name, read);
        let read = self.read_locations()?;
        snap.locations = snap.take_optional(schema::MESSAGE_LOCATION.name, read);
        let read = self.read_forwards()?;
        snap.forwards = snap.take_optional(schema::MESSAGE_FORWARDED.name, read);
        let read = self.read_mentions()?;
        snap.mentions = snap.take_optional(schema::MESSAGE_MENTIONS.name, read);
        let read = self.read_edits()?;
        snap.edits = snap.take_optional(schema::MESSAGE_EDIT_INFO.name, read);
        let read = self.read_polls()?;
        snap.polls = snap.take_optional(schema::MESSAGE_POLL.name, read);
        let read = self.read_poll_options()?;
        snap.poll_options = snap.take_optional(schema::MESSAGE_POLL_OPTION.name, read);
        let read = self.read_poll_votes()?;
        snap.poll_votes = snap.take_optional(schema::MESSAGE_ADD_ON_POLL_VOTE.name, read);

        tracing::info!(
            jids = snap.jids.len(),
            chats = snap.chats.len(),
            messages = snap.messages.len(),
            reactions = snap.reactions.len(),
            media = snap.media.len(),
            receipts = snap.receipts.len(),
            malformed = snap.malformed.len(),
            lossy_text = snap.lossy_text.len(),
            absent_tables = snap.absent_tables.len(),
            "snapshot loaded"
        );

        Ok(snap)
    }
}
