//! Message normalization.
//!
//! Turns one raw message row plus its indexed side rows into a
//! [`NormalizedMessage`]: identities resolved, codes decoded, receipts
//! folded into per-state sets and media collected into one descriptor.
//! Replies are recorded as a weak [`ReplyLink`] and only looked up when the
//! archive is serialized.

use std::collections::HashMap;

use chatvault_shared::types::stored_millis;
use chatvault_shared::{DeliveryStatus, Direction, MessageKind, RowId};
use chatvault_store::schema::{MESSAGE_ADD_ON_POLL_VOTE_SELECTED_OPTION, MESSAGE_MENTIONS, RECEIPT_USER};
use chatvault_store::{ChatRow, MediaRow, MessageRow, OpaqueValue};

use crate::identity::{IdentityRef, IdentityResolver, Namespace};
use crate::index::ReferenceIndex;
use crate::summary::RunSummary;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamps {
    /// When the sender wrote the message. Primary sort key.
    pub authored: Option<i64>,
    pub received: Option<i64>,
    pub server: Option<i64>,
}

/// Weak reference from a reply to the message it quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLink {
    /// Row of the quoted message when it could be found by external id.
    pub target: Option<RowId>,
    pub quoted_message_id: Option<String>,
    /// Text as copied into the reply when it was sent.
    pub quoted_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub kind: MessageKind,
    pub mime_type: Option<String>,
    pub content_path: Option<String>,
    pub url: Option<String>,
    pub key: Option<OpaqueValue>,
    pub key_timestamp: Option<i64>,
    pub thumbnail: Option<OpaqueValue>,
    pub size: Option<i64>,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub caption: Option<String>,
    pub duration_seconds: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub file_hash: Option<String>,
}

impl MediaDescriptor {
    fn from_row(row: &MediaRow, kind: MessageKind) -> Self {
        Self {
            kind,
            mime_type: row.mime_type.clone(),
            content_path: row.direct_path.clone(),
            url: row.message_url.clone(),
            key: row.media_key.clone(),
            key_timestamp: stored_millis(row.media_key_timestamp),
            thumbnail: None,
            size: row.file_size.or(row.file_length),
            file_path: row.file_path.clone(),
            file_name: row.media_name.clone(),
            caption: row.media_caption.clone(),
            duration_seconds: row.media_duration,
            width: row.width,
            height: row.height,
            file_hash: row.file_hash.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: Option<String>,
    pub from: Option<IdentityRef>,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub identity: IdentityRef,
    pub timestamp: Option<i64>,
}

/// Per-recipient receipts grouped by state. Each identity appears at most
/// once per set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptSets {
    pub delivered: Vec<Receipt>,
    pub read: Vec<Receipt>,
    pub played: Vec<Receipt>,
}

impl ReceiptSets {
    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty() && self.read.is_empty() && self.played.is_empty()
    }

    fn add(set: &mut Vec<Receipt>, identity: IdentityRef, timestamp: Option<i64>) {
        match set.iter_mut().find(|r| r.identity == identity) {
            Some(existing) => {
                if existing.timestamp.is_none() {
                    existing.timestamp = timestamp;
                }
            }
            None => set.push(Receipt { identity, timestamp }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPreview {
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditInfo {
    pub original_message_id: Option<String>,
    pub edited_at: Option<i64>,
    pub sender_timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poll {
    pub max_selectable: Option<i64>,
    pub poll_type: Option<i64>,
    pub options: Vec<PollOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOption {
    pub row_id: RowId,
    pub text: Option<String>,
    /// Count as stored by the client, which may lag the vote rows.
    pub stored_votes: Option<i64>,
    pub voters: Vec<PollVoter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollVoter {
    pub from: Option<IdentityRef>,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    pub row_id: RowId,
    /// Position in storage order, the tiebreak for equal timestamps.
    pub seq: usize,
    pub chat_row_id: Option<RowId>,
    pub message_id: Option<String>,
    pub direction: Direction,
    pub sender: Option<IdentityRef>,
    pub timestamps: Timestamps,
    pub kind: MessageKind,
    pub body: Option<String>,
    pub status: DeliveryStatus,
    pub starred: bool,
    /// `Some` when forwarded; the inner value is the forward score.
    pub forwarded: Option<Option<i64>>,
    pub mentions: Vec<IdentityRef>,
    pub reply: Option<ReplyLink>,
    pub media: Option<MediaDescriptor>,
    /// Thumbnail of a message that has no media row.
    pub thumbnail: Option<OpaqueValue>,
    pub link_preview: Option<LinkPreview>,
    pub location: Option<Location>,
    pub reactions: Vec<Reaction>,
    pub receipts: ReceiptSets,
    pub edit: Option<EditInfo>,
    pub poll: Option<Poll>,
}

pub struct Normalizer<'a> {
    resolver: &'a IdentityResolver,
    index: &'a ReferenceIndex<'a>,
    /// Chat row -> the other party, for one-to-one chats only.
    peers: HashMap<RowId, IdentityRef>,
    include_thumbnails: bool,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        resolver: &'a IdentityResolver,
        index: &'a ReferenceIndex<'a>,
        chats: &[ChatRow],
        include_thumbnails: bool,
    ) -> Self {
        let peers = chats
            .iter()
            .filter_map(|chat| match resolver.reference(chat.jid_row_id)? {
                IdentityRef::Known(id)
                    if matches!(
                        resolver.get(id).namespace,
                        Namespace::Person | Namespace::Linked
                    ) =>
                {
                    Some((chat.row_id, IdentityRef::Known(id)))
                }
                _ => None,
            })
            .collect();

        Self {
            resolver,
            index,
            peers,
            include_thumbnails,
        }
    }

    /// Normalize every archivable row, in storage order.
    pub fn normalize_all(
        &self,
        messages: &[MessageRow],
        summary: &mut RunSummary,
    ) -> Vec<NormalizedMessage> {
        let mut out = Vec::with_capacity(messages.len());
        for (seq, row) in messages.iter().enumerate() {
            if row.is_placeholder() {
                tracing::debug!(row_id = %row.row_id, "skipping placeholder message row");
                summary.placeholder_rows += 1;
                continue;
            }
            out.push(self.normalize(seq, row, summary));
        }

        tracing::info!(
            messages = out.len(),
            placeholders = summary.placeholder_rows,
            "messages normalized"
        );
        out
    }

    pub fn normalize(&self, seq: usize, row: &MessageRow, summary: &mut RunSummary) -> NormalizedMessage {
        let id = row.row_id;
        let chat = row.chat_row_id;

        let status = DeliveryStatus::from_code(row.status);
        if !status.is_known() {
            tracing::debug!(row_id = %id, code = ?row.status, "unrecognised status code");
            summary.unknown_status_codes += 1;
        }
        let kind = MessageKind::from_code(row.message_type);

        let mut media = self
            .index
            .media
            .first(id)
            .map(|m| MediaDescriptor::from_row(m, kind));
        let mut thumbnail = None;
        if self.include_thumbnails {
            let stored = self.index.thumbnails.first(id).and_then(|t| t.thumbnail.clone());
            match media.as_mut() {
                Some(media) => media.thumbnail = stored,
                None => thumbnail = stored,
            }
        }

        let reply = self.index.quotes.first(id).map(|q| ReplyLink {
            target: match (chat, q.key_id.as_deref()) {
                (Some(chat), Some(key)) => self
                    .index
                    .message_keys
                    .resolve(chat, key, q.from_me)
                    .filter(|target| *target != id),
                _ => None,
            },
            quoted_message_id: q.key_id.clone(),
            quoted_text: q.text_data.clone(),
        });

        let mut reactions = Vec::new();
        for r in self.index.reactions.get(id) {
            reactions.push(Reaction {
                emoji: r.emoji.clone(),
                from: self.sender(r.from_me, r.sender_jid_row_id, chat, summary),
                timestamp: stored_millis(r.sender_timestamp),
            });
        }

        let mut mentions = Vec::new();
        for m in self.index.mentions.get(id) {
            match self.resolve(m.jid_row_id, summary) {
                Some(who) => mentions.push(who),
                None => summary.record_orphan(MESSAGE_MENTIONS.name),
            }
        }

        NormalizedMessage {
            row_id: id,
            seq,
            chat_row_id: chat,
            message_id: row.key_id.clone(),
            direction: Direction::from_flag(row.from_me),
            sender: self.sender(row.from_me, row.sender_jid_row_id, chat, summary),
            timestamps: Timestamps {
                authored: stored_millis(row.timestamp),
                received: stored_millis(row.received_timestamp),
                server: stored_millis(row.receipt_server_timestamp),
            },
            kind,
            body: row.text_data.clone(),
            status,
            starred: row.starred,
            forwarded: self.index.forwards.first(id).map(|f| f.forward_score),
            mentions,
            reply,
            media,
            thumbnail,
            link_preview: self.index.link_previews.first(id).map(|p| LinkPreview {
                url: p.url.clone(),
                title: p.page_title.clone(),
                description: p.description.clone(),
            }),
            location: self.index.locations.first(id).map(|l| Location {
                latitude: l.latitude,
                longitude: l.longitude,
                name: l.place_name.clone(),
                address: l.place_address.clone(),
            }),
            reactions,
            receipts: self.receipts(id, summary),
            edit: self.index.edits.first(id).map(|e| EditInfo {
                original_message_id: e.original_key_id.clone(),
                edited_at: stored_millis(e.edited_timestamp),
                sender_timestamp: stored_millis(e.sender_timestamp),
            }),
            poll: self.poll(id, chat, summary),
        }
    }

    fn resolve(&self, row: Option<RowId>, summary: &mut RunSummary) -> Option<IdentityRef> {
        let resolved = self.resolver.reference(row);
        if let Some(IdentityRef::Dangling(missing)) = resolved {
            tracing::debug!(jid_row_id = %missing, "reference to missing jid row");
            summary.dangling_identities += 1;
        }
        resolved
    }

    /// Who authored a message or add-on.
    ///
    /// Own rows are always the archive owner. Received rows without a
    /// sender column come from one-to-one chats, where the sender is the
    /// chat's other party.
    fn sender(
        &self,
        from_me: bool,
        sender: Option<RowId>,
        chat: Option<RowId>,
        summary: &mut RunSummary,
    ) -> Option<IdentityRef> {
        if from_me {
            return Some(IdentityRef::Me);
        }
        if let Some(who) = self.resolve(sender, summary) {
            return Some(who);
        }
        chat.and_then(|c| self.peers.get(&c).copied())
    }

    fn receipts(&self, id: RowId, summary: &mut RunSummary) -> ReceiptSets {
        let mut sets = ReceiptSets::default();

        for r in self.index.receipts.get(id) {
            let Some(who) = self.resolve(r.user_jid_row_id, summary) else {
                tracing::debug!(row_id = %r.row_id, "receipt without a recipient");
                summary.record_orphan(RECEIPT_USER.name);
                continue;
            };

            let delivered = stored_millis(r.receipt_timestamp);
            let read = stored_millis(r.read_timestamp);
            let played = stored_millis(r.played_timestamp);

            if delivered.is_some() || read.is_some() || played.is_some() {
                // Clients skip the delivery stamp when the read arrives first.
                if delivered.is_none() {
                    summary.implied_deliveries += 1;
                }
                ReceiptSets::add(&mut sets.delivered, who, delivered);
            }
            if read.is_some() {
                ReceiptSets::add(&mut sets.read, who, read);
            }
            if played.is_some() {
                ReceiptSets::add(&mut sets.played, who, played);
            }
        }
        sets
    }

    fn poll(&self, id: RowId, chat: Option<RowId>, summary: &mut RunSummary) -> Option<Poll> {
        let header = self.index.polls.first(id);
        let mut options: Vec<PollOption> = self
            .index
            .poll_options
            .get(id)
            .iter()
            .map(|o| PollOption {
                row_id: o.row_id,
                text: o.option_name.clone(),
                stored_votes: o.vote_total,
                voters: Vec::new(),
            })
            .collect();
        let votes = self.index.poll_votes.get(id);

        if header.is_none() && options.is_empty() {
            summary.record_orphans(MESSAGE_ADD_ON_POLL_VOTE_SELECTED_OPTION.name, votes.len());
            return None;
        }

        for v in votes {
            let voter = PollVoter {
                from: self.sender(v.from_me, v.sender_jid_row_id, chat, summary),
                timestamp: stored_millis(v.sender_timestamp),
            };
            let option = v
                .option_row_id
                .and_then(|opt| options.iter_mut().find(|o| o.row_id == opt));
            match option {
                Some(option) => option.voters.push(voter),
                None => summary.record_orphan(MESSAGE_ADD_ON_POLL_VOTE_SELECTED_OPTION.name),
            }
        }

        Some(Poll {
            max_selectable: header.and_then(|p| p.selectable_options_count),
            poll_type: header.and_then(|p| p.poll_type),
            options,
        })
    }
}
