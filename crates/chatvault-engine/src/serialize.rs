//! Archive serialization.
//!
//! Converts assembled chats into [`Archive`] records, resolving reply and
//! pin references on the way, then renders deterministic bytes and writes
//! them atomically.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chatvault_shared::constants::{ARCHIVE_FORMAT_VERSION, UNKNOWN_CHAT_ID};
use chatvault_shared::types::millis_to_iso;
use chatvault_shared::{CallResult, Direction, RowId};
use chatvault_store::{CallLogRow, OpaqueValue};
use tempfile::NamedTempFile;

use crate::archive::*;
use crate::assemble::AssembledChat;
use crate::error::{EngineError, Result};
use crate::identity::{IdentityRef, IdentityResolver};
use crate::normalize::{NormalizedMessage, Receipt, ReplyLink};
use crate::summary::RunSummary;

/// What a reply or pin can point at.
struct Target<'m> {
    bucket: usize,
    message_id: Option<&'m str>,
    text: Option<&'m str>,
}

pub struct ArchiveSerializer<'a> {
    resolver: &'a IdentityResolver,
    source_db: String,
    contacts_count: usize,
}

impl<'a> ArchiveSerializer<'a> {
    pub fn new(resolver: &'a IdentityResolver, source_db: impl Into<String>, contacts_count: usize) -> Self {
        Self {
            resolver,
            source_db: source_db.into(),
            contacts_count,
        }
    }

    /// Build the archive document. Chats are taken in the order given.
    pub fn render(&self, chats: &[AssembledChat<'_>], summary: &mut RunSummary) -> Archive {
        let mut targets: HashMap<RowId, Target<'_>> = HashMap::new();
        for (bucket, chat) in chats.iter().enumerate() {
            for msg in &chat.messages {
                targets.insert(
                    msg.row_id,
                    Target {
                        bucket,
                        message_id: msg.message_id.as_deref(),
                        text: msg
                            .body
                            .as_deref()
                            .or_else(|| msg.media.as_ref().and_then(|m| m.caption.as_deref())),
                    },
                );
            }
        }

        let mut records = Vec::with_capacity(chats.len());
        for (bucket, chat) in chats.iter().enumerate() {
            records.push(self.chat_record(bucket, chat, &targets, summary));
        }

        let total_messages = records.iter().map(|c| c.message_count).sum();
        summary.total_chats = records.len();
        summary.total_messages = total_messages;
        summary.total_reactions = records
            .iter()
            .flat_map(|c| &c.messages)
            .map(|m| m.reactions.len())
            .sum();

        Archive {
            format_version: ARCHIVE_FORMAT_VERSION,
            source_db: self.source_db.clone(),
            total_chats: records.len(),
            total_messages,
            contacts_count: self.contacts_count,
            chats: records,
        }
    }

    fn chat_record(
        &self,
        bucket: usize,
        chat: &AssembledChat<'_>,
        targets: &HashMap<RowId, Target<'_>>,
        summary: &mut RunSummary,
    ) -> ChatRecord {
        let (id, unresolved_jid_row_id) = match (chat.chat, chat.identity) {
            (None, _) => (Some(UNKNOWN_CHAT_ID.to_string()), None),
            (Some(_), Some(IdentityRef::Known(id))) => (Some(self.resolver.get(id).address.clone()), None),
            (Some(_), Some(IdentityRef::Dangling(row))) => (None, Some(row)),
            (Some(_), _) => (None, None),
        };

        let pinned_message = chat
            .chat
            .and_then(|row| row.pinned_message_row_id)
            .map(|pinned| match lookup(targets, bucket, Some(pinned)) {
                Some(target) => resolved(target),
                None => {
                    tracing::debug!(row_id = %pinned, "pinned message not in chat");
                    summary.unresolved_pins += 1;
                    MessageReference::Unresolved {
                        unresolved: true,
                        message_id: None,
                        quoted_text: None,
                        row_id: Some(pinned),
                    }
                }
            });

        let mut messages = Vec::with_capacity(chat.messages.len());
        for msg in &chat.messages {
            messages.push(self.message_record(bucket, msg, targets, summary));
        }

        ChatRecord {
            id,
            row_id: chat.chat.map(|row| row.row_id),
            unresolved_jid_row_id,
            name: self.chat_name(chat),
            subject: chat.chat.and_then(|row| row.subject.clone()),
            is_group: chat.is_group,
            synthetic: chat.is_synthetic(),
            group_type: chat.chat.and_then(|row| row.group_type),
            created: chat.chat.and_then(|row| row.created_timestamp.filter(|ts| *ts > 0)),
            archived: chat.chat.is_some_and(|row| row.archived),
            hidden: chat.chat.is_some_and(|row| row.hidden),
            muted_until: chat.chat.and_then(|row| row.mute_end_timestamp.filter(|ts| *ts > 0)),
            ephemeral_seconds: chat.chat.and_then(|row| row.ephemeral_expiration.filter(|s| *s > 0)),
            pinned_message,
            participants: chat
                .participants
                .iter()
                .map(|m| ParticipantRecord {
                    party: self.party(Some(m.identity)),
                    is_admin: m.admin,
                })
                .collect(),
            call_history: chat.calls.iter().map(|call| call_record(call)).collect(),
            message_count: messages.len(),
            messages,
        }
    }

    /// Subject, then contact name, then the address's user part.
    fn chat_name(&self, chat: &AssembledChat<'_>) -> String {
        let Some(row) = chat.chat else {
            return "Unknown chat".to_string();
        };
        if let Some(subject) = row.subject.as_deref().filter(|s| !s.trim().is_empty()) {
            return subject.to_string();
        }
        match chat.identity {
            Some(IdentityRef::Known(id)) => {
                let identity = self.resolver.get(id);
                identity
                    .display_name
                    .clone()
                    .unwrap_or_else(|| identity.user_part().to_string())
            }
            _ => format!("chat:{}", row.row_id),
        }
    }

    fn message_record(
        &self,
        bucket: usize,
        msg: &NormalizedMessage,
        targets: &HashMap<RowId, Target<'_>>,
        summary: &mut RunSummary,
    ) -> MessageRecord {
        let sender = self.party(msg.sender);

        MessageRecord {
            row_id: msg.row_id,
            message_id: msg.message_id.clone(),
            direction: msg.direction,
            from: sender.address,
            from_name: sender.name,
            from_row_id: sender.unresolved_row_id,
            timestamp: msg.timestamps.authored,
            timestamp_iso: msg.timestamps.authored.and_then(millis_to_iso),
            received_timestamp: msg.timestamps.received,
            server_timestamp: msg.timestamps.server,
            kind: msg.kind,
            text: msg.body.clone(),
            status: msg.status,
            starred: msg.starred,
            forwarded: msg.forwarded.is_some(),
            forward_score: msg.forwarded.flatten(),
            mentions: msg.mentions.iter().map(|m| self.party(Some(*m))).collect(),
            replies_to: msg
                .reply
                .as_ref()
                .map(|link| reply_reference(bucket, link, targets, summary)),
            media: msg.media.as_ref().map(|m| MediaRecord {
                kind: m.kind,
                mimetype: m.mime_type.clone(),
                content_path: m.content_path.clone(),
                url: m.url.clone(),
                media_key: m.key.as_ref().map(opaque),
                media_key_timestamp: m.key_timestamp,
                thumbnail: m.thumbnail.as_ref().map(opaque),
                size: m.size,
                file_path: m.file_path.clone(),
                file_name: m.file_name.clone(),
                caption: m.caption.clone(),
                duration_seconds: m.duration_seconds,
                width: m.width,
                height: m.height,
                file_hash: m.file_hash.clone(),
            }),
            thumbnail: msg.thumbnail.as_ref().map(opaque),
            link_preview: msg.link_preview.as_ref().map(|p| LinkPreviewRecord {
                url: p.url.clone(),
                title: p.title.clone(),
                description: p.description.clone(),
            }),
            location: msg.location.as_ref().map(|l| LocationRecord {
                latitude: l.latitude,
                longitude: l.longitude,
                name: l.name.clone(),
                address: l.address.clone(),
            }),
            reactions: msg
                .reactions
                .iter()
                .map(|r| {
                    let from = self.party(r.from);
                    ReactionRecord {
                        emoji: r.emoji.clone(),
                        from: from.address,
                        from_name: from.name,
                        from_me: from.is_me,
                        from_row_id: from.unresolved_row_id,
                        timestamp: r.timestamp,
                    }
                })
                .collect(),
            receipts: (!msg.receipts.is_empty()).then(|| ReceiptsRecord {
                delivered: self.stamped(&msg.receipts.delivered),
                read: self.stamped(&msg.receipts.read),
                played: self.stamped(&msg.receipts.played),
            }),
            edit: msg.edit.as_ref().map(|e| EditRecord {
                original_message_id: e.original_message_id.clone(),
                edited_at: e.edited_at,
                sender_timestamp: e.sender_timestamp,
            }),
            poll: msg.poll.as_ref().map(|p| PollRecord {
                max_selectable: p.max_selectable,
                poll_type: p.poll_type,
                options: p
                    .options
                    .iter()
                    .map(|o| PollOptionRecord {
                        option_id: o.row_id,
                        text: o.text.clone(),
                        vote_count: o.voters.len(),
                        stored_vote_count: o.stored_votes,
                        voters: o
                            .voters
                            .iter()
                            .map(|v| StampedParty {
                                party: self.party(v.from),
                                timestamp: v.timestamp,
                            })
                            .collect(),
                    })
                    .collect(),
            }),
        }
    }

    fn party(&self, who: Option<IdentityRef>) -> PartyRecord {
        match who {
            None => PartyRecord::default(),
            Some(IdentityRef::Known(id)) => {
                let identity = self.resolver.get(id);
                PartyRecord {
                    address: Some(identity.address.clone()),
                    name: identity.display_name.clone(),
                    ..Default::default()
                }
            }
            Some(IdentityRef::Dangling(row)) => PartyRecord {
                unresolved_row_id: Some(row),
                ..Default::default()
            },
            Some(IdentityRef::Me) => PartyRecord {
                is_me: true,
                ..Default::default()
            },
        }
    }

    fn stamped(&self, receipts: &[Receipt]) -> Vec<StampedParty> {
        receipts
            .iter()
            .map(|r| StampedParty {
                party: self.party(Some(r.identity)),
                timestamp: r.timestamp,
            })
            .collect()
    }
}

/// Find a reference target, but only inside the same chat bucket.
fn lookup<'t, 'm>(
    targets: &'t HashMap<RowId, Target<'m>>,
    bucket: usize,
    row: Option<RowId>,
) -> Option<&'t Target<'m>> {
    targets.get(&row?).filter(|t| t.bucket == bucket)
}

fn resolved(target: &Target<'_>) -> MessageReference {
    MessageReference::Resolved {
        message_id: target.message_id.map(str::to_string),
        text: target.text.map(str::to_string),
    }
}

fn reply_reference(
    bucket: usize,
    link: &ReplyLink,
    targets: &HashMap<RowId, Target<'_>>,
    summary: &mut RunSummary,
) -> MessageReference {
    match lookup(targets, bucket, link.target) {
        Some(target) => resolved(target),
        None => {
            summary.unresolved_replies += 1;
            MessageReference::Unresolved {
                unresolved: true,
                message_id: link.quoted_message_id.clone(),
                quoted_text: link.quoted_text.clone(),
                row_id: None,
            }
        }
    }
}

fn call_record(call: &CallLogRow) -> CallRecord {
    let timestamp = call.timestamp.filter(|ts| *ts > 0);
    CallRecord {
        call_id: call.call_id.clone(),
        direction: Direction::from_flag(call.from_me),
        timestamp,
        timestamp_iso: timestamp.and_then(millis_to_iso),
        video: call.video_call,
        duration_seconds: call.duration,
        result: CallResult::from_code(call.call_result),
        bytes_transferred: call.bytes_transferred,
    }
}

/// Blobs become standard base64; text columns are kept verbatim.
fn opaque(value: &OpaqueValue) -> String {
    match value {
        OpaqueValue::Bytes(bytes) => STANDARD.encode(bytes),
        OpaqueValue::Text(text) => text.clone(),
    }
}

/// Render the archive. Identical input gives identical bytes.
pub fn to_bytes(archive: &Archive, pretty: bool) -> Result<Vec<u8>> {
    let mut bytes = if pretty {
        serde_json::to_vec_pretty(archive)?
    } else {
        serde_json::to_vec(archive)?
    };
    bytes.push(b'\n');
    Ok(bytes)
}

/// BLAKE3 digest of the rendered archive, hex encoded.
pub fn digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Write `bytes` to `path` so that readers see either the old file or the
/// complete new one. The destination directory is created if missing.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| EngineError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "archive written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::ChatAssembler;
    use crate::contacts::ContactDirectory;
    use crate::index::ReferenceIndex;
    use crate::normalize::tests::{base_snapshot, message};
    use crate::normalize::Normalizer;
    use chatvault_store::{ChatRow, MediaRow, QuotedRow, Snapshot, ThumbnailRow};
    use serde_json::{json, Value};

    fn render(snapshot: &Snapshot, contacts: &ContactDirectory) -> (Archive, RunSummary) {
        let mut summary = RunSummary::new();
        let resolver = IdentityResolver::build(&snapshot.jids, [], contacts, &mut summary);
        let index = ReferenceIndex::build(snapshot, &mut summary);
        let messages = Normalizer::new(&resolver, &index, &snapshot.chats, true)
            .normalize_all(&snapshot.messages, &mut summary);
        let chats = ChatAssembler::new(&resolver, snapshot).assemble(messages, &mut summary);
        let archive = ArchiveSerializer::new(&resolver, "msgstore.db", contacts.len())
            .render(&chats, &mut summary);
        (archive, summary)
    }

    fn as_json(archive: &Archive) -> Value {
        serde_json::to_value(archive).unwrap()
    }

    fn reply_snapshot() -> Snapshot {
        let mut snapshot = base_snapshot();
        snapshot.messages = vec![message(10, 1, "A1", 1000), message(11, 1, "B1", 2000)];
        snapshot.quotes = vec![QuotedRow {
            message_row_id: RowId(11),
            key_id: Some("A1".into()),
            text_data: Some("Hi".into()),
            ..Default::default()
        }];
        snapshot.messages[0].text_data = Some("Hi".into());
        snapshot.messages[1].text_data = Some("Hello back".into());
        snapshot
    }

    #[test]
    fn reply_resolves_to_quoted_message() {
        let (archive, summary) = render(&reply_snapshot(), &ContactDirectory::new());
        let value = as_json(&archive);

        let reply = &value["chats"][0]["messages"][1]["replies_to"];
        assert_eq!(reply, &json!({ "message_id": "A1", "text": "Hi" }));
        assert!(value["chats"][0]["messages"][0].get("replies_to").is_none());
        assert_eq!(summary.unresolved_replies, 0);
    }

    #[test]
    fn unresolved_reply_keeps_quoted_context() {
        let mut snapshot = reply_snapshot();
        snapshot.quotes[0].key_id = Some("GONE".into());

        let (archive, summary) = render(&snapshot, &ContactDirectory::new());
        let reply = &as_json(&archive)["chats"][0]["messages"][1]["replies_to"];
        assert_eq!(
            reply,
            &json!({ "unresolved": true, "message_id": "GONE", "quoted_text": "Hi" })
        );
        assert_eq!(summary.unresolved_replies, 1);
    }

    #[test]
    fn sender_name_present_only_with_contact() {
        let mut snapshot = base_snapshot();
        snapshot.messages = vec![message(10, 1, "A", 1), message(11, 3, "B", 2)];
        snapshot.chats.push(ChatRow {
            row_id: RowId(3),
            jid_row_id: Some(RowId(3)),
            ..Default::default()
        });
        let contacts = ContactDirectory::from_pairs([("+111", "Alice")]);

        let (archive, _) = render(&snapshot, &contacts);
        let value = as_json(&archive);
        let by_id = |id: &str| {
            value["chats"]
                .as_array()
                .unwrap()
                .iter()
                .find(|c| c["id"] == id)
                .cloned()
                .unwrap()
        };

        let alice = by_id("111@s.whatsapp.net");
        assert_eq!(alice["name"], "Alice");
        assert_eq!(alice["messages"][0]["from"], "111@s.whatsapp.net");
        assert_eq!(alice["messages"][0]["fromName"], "Alice");

        let stranger = by_id("222@s.whatsapp.net");
        assert_eq!(stranger["name"], "222");
        assert_eq!(stranger["messages"][0]["from"], "222@s.whatsapp.net");
        assert!(stranger["messages"][0].get("fromName").is_none());
        assert_eq!(archive.contacts_count, 1);
    }

    #[test]
    fn dangling_sender_keeps_row_id() {
        let mut snapshot = base_snapshot();
        let mut row = message(10, 2, "A", 1);
        row.sender_jid_row_id = Some(RowId(404));
        snapshot.messages = vec![row];

        let (archive, summary) = render(&snapshot, &ContactDirectory::new());
        let msg = &as_json(&archive)["chats"][0]["messages"][0];
        assert!(msg.get("from").is_none());
        assert_eq!(msg["from_row_id"], 404);
        assert_eq!(summary.dangling_identities, 1);
    }

    #[test]
    fn blobs_are_base64() {
        let mut snapshot = base_snapshot();
        snapshot.messages = vec![message(10, 1, "A", 1)];
        snapshot.media = vec![MediaRow {
            message_row_id: RowId(10),
            media_key: Some(OpaqueValue::Bytes(b"key".to_vec())),
            ..Default::default()
        }];
        snapshot.thumbnails = vec![ThumbnailRow {
            message_row_id: RowId(10),
            thumbnail: Some(OpaqueValue::Text("already-text".into())),
        }];

        let (archive, _) = render(&snapshot, &ContactDirectory::new());
        let media = &as_json(&archive)["chats"][0]["messages"][0]["media"];
        assert_eq!(media["media_key"], "a2V5");
        assert_eq!(media["thumbnail"], "already-text");
    }

    #[test]
    fn pinned_message_resolves_inside_chat() {
        let mut snapshot = reply_snapshot();
        snapshot.chats[0].pinned_message_row_id = Some(RowId(10));
        snapshot.chats[1].pinned_message_row_id = Some(RowId(11));

        let (archive, summary) = render(&snapshot, &ContactDirectory::new());
        let value = as_json(&archive);
        assert_eq!(
            value["chats"][0]["pinned_message"],
            json!({ "message_id": "A1", "text": "Hi" })
        );
        assert_eq!(value["chats"][1]["pinned_message"]["unresolved"], true);
        assert_eq!(value["chats"][1]["pinned_message"]["row_id"], 11);
        assert_eq!(summary.unresolved_pins, 1);
    }

    #[test]
    fn top_level_counts_and_order() {
        let mut snapshot = reply_snapshot();
        snapshot.messages.push(message(12, 2, "G", 5000));
        let mut lost = message(13, 99, "L", 10);
        lost.text_data = Some("lost".into());
        snapshot.messages.push(lost);

        let (archive, summary) = render(&snapshot, &ContactDirectory::new());
        let value = as_json(&archive);
        assert_eq!(value["format_version"], 1);
        assert_eq!(value["source_db"], "msgstore.db");
        assert_eq!(value["total_chats"], 3);
        assert_eq!(value["total_messages"], 4);

        let ids: Vec<&str> = value["chats"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["111-1600000000@g.us", "111@s.whatsapp.net", "unknown"]);
        assert_eq!(value["chats"][2]["synthetic"], true);
        assert_eq!(summary.total_messages, 4);
    }

    #[test]
    fn rendering_is_byte_identical() {
        let snapshot = reply_snapshot();
        let contacts = ContactDirectory::from_pairs([("+111", "Alice")]);
        let (first, _) = render(&snapshot, &contacts);
        let (second, _) = render(&snapshot, &contacts);

        let a = to_bytes(&first, true).unwrap();
        let b = to_bytes(&second, true).unwrap();
        assert_eq!(a, b);
        assert_eq!(digest(&a), digest(&b));
        assert!(a.ends_with(b"\n"));
        assert!(to_bytes(&first, false).unwrap().len() < a.len());
    }

    #[test]
    fn timestamps_have_iso_companions() {
        let (archive, _) = render(&reply_snapshot(), &ContactDirectory::new());
        let msg = &as_json(&archive)["chats"][0]["messages"][0];
        assert_eq!(msg["timestamp"], 1000);
        assert_eq!(msg["timestamp_iso"], "1970-01-01T00:00:01.000Z");
        assert_eq!(msg["status"], "received");
        assert_eq!(msg["type"], "text");
    }

    #[test]
    fn atomic_write_creates_directory_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("archive.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
