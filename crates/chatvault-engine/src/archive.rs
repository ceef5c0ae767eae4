//! Archive document types.
//!
//! These are the records that end up in the JSON file. Field order here is
//! output order, so changing it changes every archive.

use chatvault_shared::{CallResult, DeliveryStatus, Direction, MessageKind, RowId};
use serde::Serialize;

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Archive {
    pub format_version: u32,
    /// File name of the snapshot, not its full path.
    pub source_db: String,
    pub total_chats: usize,
    pub total_messages: usize,
    pub contacts_count: usize,
    pub chats: Vec<ChatRecord>,
}

/// A party as it appears in the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartyRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub is_me: bool,
    /// Set when the source pointed at a jid row that does not exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved_row_id: Option<RowId>,
}

/// A reply's quoted message or a chat's pinned message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MessageReference {
    Resolved {
        message_id: Option<String>,
        text: Option<String>,
    },
    Unresolved {
        unresolved: bool,
        message_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        quoted_text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        row_id: Option<RowId>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRecord {
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_id: Option<RowId>,
    /// Jid row the chat points at when that row is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved_jid_row_id: Option<RowId>,
    pub name: String,
    pub subject: Option<String>,
    pub is_group: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub synthetic: bool,
    pub group_type: Option<i64>,
    pub created: Option<i64>,
    pub archived: bool,
    pub hidden: bool,
    pub muted_until: Option<i64>,
    pub ephemeral_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_message: Option<MessageReference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<ParticipantRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub call_history: Vec<CallRecord>,
    pub message_count: usize,
    pub messages: Vec<MessageRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantRecord {
    #[serde(flatten)]
    pub party: PartyRecord,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub call_id: Option<String>,
    pub direction: Direction,
    pub timestamp: Option<i64>,
    pub timestamp_iso: Option<String>,
    pub video: bool,
    pub duration_seconds: Option<i64>,
    pub result: CallResult,
    pub bytes_transferred: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRecord {
    pub row_id: RowId,
    pub message_id: Option<String>,
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(rename = "fromName", skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_row_id: Option<RowId>,
    pub timestamp: Option<i64>,
    pub timestamp_iso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<i64>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: Option<String>,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "is_false")]
    pub starred: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub forwarded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_score: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<PartyRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies_to: Option<MessageReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<LinkPreviewRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<ReactionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipts: Option<ReceiptsRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit: Option<EditRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRecord {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub mimetype: Option<String>,
    pub content_path: Option<String>,
    pub url: Option<String>,
    pub media_key: Option<String>,
    pub media_key_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub size: Option<i64>,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub caption: Option<String>,
    pub duration_seconds: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub file_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionRecord {
    pub emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(rename = "fromName", skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub from_me: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_row_id: Option<RowId>,
    pub timestamp: Option<i64>,
}

/// A party plus the time of its receipt or vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StampedParty {
    #[serde(flatten)]
    pub party: PartyRecord,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptsRecord {
    pub delivered: Vec<StampedParty>,
    pub read: Vec<StampedParty>,
    pub played: Vec<StampedParty>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkPreviewRecord {
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRecord {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditRecord {
    pub original_message_id: Option<String>,
    pub edited_at: Option<i64>,
    pub sender_timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollRecord {
    pub max_selectable: Option<i64>,
    pub poll_type: Option<i64>,
    pub options: Vec<PollOptionRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollOptionRecord {
    pub option_id: RowId,
    pub text: Option<String>,
    pub vote_count: usize,
    pub stored_vote_count: Option<i64>,
    pub voters: Vec<StampedParty>,
}
