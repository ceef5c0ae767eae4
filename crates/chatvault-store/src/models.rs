//! Typed rows read from the snapshot.
//!
//! Rows carry raw column values only. Timestamps stay as stored
//! milliseconds, flags are decoded to `bool`, and foreign keys become
//! [`RowId`]s. Interpretation happens in the engine.

use chatvault_shared::RowId;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Read bookkeeping
// ---------------------------------------------------------------------------

/// A row that could not be decoded and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedRow {
    pub table: &'static str,
    /// First selected key column (`_id`, or the owning `message_row_id` for
    /// side tables) when it could still be read.
    pub key: Option<i64>,
    pub reason: String,
}

/// A row that was kept although some of its text was not valid UTF-8.
/// The invalid bytes were replaced with U+FFFD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LossyTextRow {
    pub table: &'static str,
    /// Same key as [`MalformedRow::key`].
    pub key: Option<i64>,
    pub columns: Vec<String>,
}

/// Decoded rows of one table plus whatever had to be skipped or repaired.
#[derive(Debug, Clone)]
pub struct TableRead<T> {
    pub rows: Vec<T>,
    pub malformed: Vec<MalformedRow>,
    pub lossy_text: Vec<LossyTextRow>,
}

impl<T> Default for TableRead<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            malformed: Vec::new(),
            lossy_text: Vec::new(),
        }
    }
}

/// A column whose bytes are carried through untouched (key material,
/// thumbnails). Text columns stay text, blobs stay bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpaqueValue {
    Bytes(Vec<u8>),
    Text(String),
}

// ---------------------------------------------------------------------------
// Identities and chats
// ---------------------------------------------------------------------------

/// `jid`: one participant or group address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JidRow {
    pub row_id: RowId,
    pub raw_string: Option<String>,
    pub user: Option<String>,
    pub server: Option<String>,
}

/// `chat`: one conversation scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRow {
    pub row_id: RowId,
    pub jid_row_id: Option<RowId>,
    pub subject: Option<String>,
    pub group_type: Option<i64>,
    pub created_timestamp: Option<i64>,
    pub archived: bool,
    pub hidden: bool,
    pub mute_end_timestamp: Option<i64>,
    pub pinned_message_row_id: Option<RowId>,
    pub ephemeral_expiration: Option<i64>,
}

/// `group_participants`: addresses are stored as raw strings here, not jid
/// row references. An empty member address is the archive owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantRow {
    pub row_id: RowId,
    pub group_jid: String,
    pub member_jid: String,
    pub admin: bool,
}

/// `call_log`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLogRow {
    pub row_id: RowId,
    pub jid_row_id: Option<RowId>,
    pub from_me: bool,
    pub call_id: Option<String>,
    pub timestamp: Option<i64>,
    pub video_call: bool,
    pub duration: Option<i64>,
    pub call_result: Option<i64>,
    pub bytes_transferred: Option<i64>,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// `message`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageRow {
    pub row_id: RowId,
    /// Kept as stored: the placeholder row uses a negative chat id.
    pub chat_row_id: Option<RowId>,
    pub from_me: bool,
    pub key_id: Option<String>,
    pub sender_jid_row_id: Option<RowId>,
    pub status: Option<i64>,
    pub timestamp: Option<i64>,
    pub received_timestamp: Option<i64>,
    pub receipt_server_timestamp: Option<i64>,
    pub message_type: Option<i64>,
    pub text_data: Option<String>,
    pub starred: bool,
}

impl MessageRow {
    /// The source keeps one dummy row that belongs to no chat.
    pub fn is_placeholder(&self) -> bool {
        self.chat_row_id.is_some_and(|id| id.0 < 0)
    }
}

/// `message_quoted`: the reply context of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotedRow {
    pub message_row_id: RowId,
    /// External id of the quoted message.
    pub key_id: Option<String>,
    pub from_me: bool,
    pub sender_jid_row_id: Option<RowId>,
    pub message_type: Option<i64>,
    /// Text of the quoted message as copied when the reply was sent.
    pub text_data: Option<String>,
}

/// `message_forwarded`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardRow {
    pub message_row_id: RowId,
    pub forward_score: Option<i64>,
}

/// `message_mentions`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionRow {
    pub row_id: RowId,
    pub message_row_id: RowId,
    pub jid_row_id: Option<RowId>,
}

/// `message_edit_info`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditRow {
    pub message_row_id: RowId,
    pub original_key_id: Option<String>,
    pub edited_timestamp: Option<i64>,
    pub sender_timestamp: Option<i64>,
}

/// `receipt_user`: per-recipient delivery state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptRow {
    pub row_id: RowId,
    pub message_row_id: RowId,
    pub user_jid_row_id: Option<RowId>,
    pub receipt_timestamp: Option<i64>,
    pub read_timestamp: Option<i64>,
    pub played_timestamp: Option<i64>,
}

/// `message_add_on` joined with `message_add_on_reaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionRow {
    pub add_on_row_id: RowId,
    pub message_row_id: RowId,
    pub from_me: bool,
    pub sender_jid_row_id: Option<RowId>,
    pub emoji: Option<String>,
    pub sender_timestamp: Option<i64>,
}

// ---------------------------------------------------------------------------
// Media and previews
// ---------------------------------------------------------------------------

/// `message_media`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaRow {
    pub message_row_id: RowId,
    pub mime_type: Option<String>,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub file_length: Option<i64>,
    pub media_duration: Option<i64>,
    pub media_caption: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub media_name: Option<String>,
    pub file_hash: Option<String>,
    pub media_key: Option<OpaqueValue>,
    pub media_key_timestamp: Option<i64>,
    pub direct_path: Option<String>,
    pub message_url: Option<String>,
}

/// `message_thumbnail`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailRow {
    pub message_row_id: RowId,
    pub thumbnail: Option<OpaqueValue>,
}

/// `message_text`: link-preview text attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPreviewRow {
    pub message_row_id: RowId,
    pub url: Option<String>,
    pub page_title: Option<String>,
    pub description: Option<String>,
}

/// `message_location`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationRow {
    pub message_row_id: RowId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub place_name: Option<String>,
    pub place_address: Option<String>,
}

// ---------------------------------------------------------------------------
// Polls
// ---------------------------------------------------------------------------

/// `message_poll`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollRow {
    pub message_row_id: RowId,
    pub selectable_options_count: Option<i64>,
    pub poll_type: Option<i64>,
}

/// `message_poll_option`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOptionRow {
    pub row_id: RowId,
    pub message_row_id: RowId,
    pub option_name: Option<String>,
    pub vote_total: Option<i64>,
}

/// `message_add_on` joined with the poll vote tables. One row per selected
/// option, so a multi-choice vote appears several times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollVoteRow {
    pub add_on_row_id: RowId,
    pub message_row_id: RowId,
    pub from_me: bool,
    pub sender_jid_row_id: Option<RowId>,
    pub sender_timestamp: Option<i64>,
    pub option_row_id: Option<RowId>,
}
