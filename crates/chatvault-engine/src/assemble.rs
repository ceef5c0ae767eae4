//! Chat assembly.
//!
//! Places every normalized message in exactly one chat bucket, orders each
//! bucket, attaches group membership and call history, and orders the
//! chats themselves. Messages whose chat row is missing go to one synthetic
//! bucket that is always emitted last.

use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use chatvault_shared::RowId;
use chatvault_store::schema::{CALL_LOG, GROUP_PARTICIPANTS};
use chatvault_store::{CallLogRow, ChatRow, ParticipantRow, Snapshot};

use crate::identity::{IdentityId, IdentityRef, IdentityResolver, Namespace};
use crate::normalize::NormalizedMessage;
use crate::summary::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub identity: IdentityRef,
    pub admin: bool,
}

#[derive(Debug, Clone)]
pub struct AssembledChat<'a> {
    /// `None` for the synthetic bucket.
    pub chat: Option<&'a ChatRow>,
    pub identity: Option<IdentityRef>,
    pub is_group: bool,
    pub participants: Vec<Member>,
    pub calls: Vec<&'a CallLogRow>,
    /// Ordered by authored time, storage order on ties.
    pub messages: Vec<NormalizedMessage>,
}

impl<'a> AssembledChat<'a> {
    fn empty(chat: Option<&'a ChatRow>, identity: Option<IdentityRef>, is_group: bool) -> Self {
        Self {
            chat,
            identity,
            is_group,
            participants: Vec::new(),
            calls: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.chat.is_none()
    }

    /// Authored time of the newest message.
    pub fn last_activity(&self) -> Option<i64> {
        self.messages.iter().filter_map(|m| m.timestamps.authored).max()
    }

    fn sort_messages(&mut self) {
        self.messages
            .sort_by_key(|m| (m.timestamps.authored, m.seq));
    }
}

pub struct ChatAssembler<'a> {
    resolver: &'a IdentityResolver,
    chats: &'a [ChatRow],
    participants: &'a [ParticipantRow],
    calls: &'a [CallLogRow],
}

impl<'a> ChatAssembler<'a> {
    pub fn new(resolver: &'a IdentityResolver, snapshot: &'a Snapshot) -> Self {
        Self {
            resolver,
            chats: &snapshot.chats,
            participants: &snapshot.participants,
            calls: &snapshot.calls,
        }
    }

    /// Consume the normalized messages and return the chats in archive order.
    pub fn assemble(
        &self,
        messages: Vec<NormalizedMessage>,
        summary: &mut RunSummary,
    ) -> Vec<AssembledChat<'a>> {
        let mut slots: Vec<AssembledChat<'a>> = self
            .chats
            .iter()
            .map(|chat| {
                let identity = self.resolver.reference(chat.jid_row_id);
                if let Some(IdentityRef::Dangling(row)) = identity {
                    tracing::warn!(chat = %chat.row_id, jid_row_id = %row, "chat points at a missing jid row");
                    summary.dangling_identities += 1;
                }
                let is_group = matches!(
                    identity,
                    Some(IdentityRef::Known(id)) if self.resolver.get(id).namespace == Namespace::Group
                );
                AssembledChat::empty(Some(chat), identity, is_group)
            })
            .collect();

        let position: HashMap<RowId, usize> = self
            .chats
            .iter()
            .enumerate()
            .map(|(i, chat)| (chat.row_id, i))
            .collect();

        let mut unknown = AssembledChat::empty(None, None, false);
        for msg in messages {
            match msg.chat_row_id.and_then(|chat| position.get(&chat)) {
                Some(&i) => slots[i].messages.push(msg),
                None => {
                    tracing::debug!(row_id = %msg.row_id, chat = ?msg.chat_row_id, "message has no chat");
                    summary.unknown_chat_messages += 1;
                    unknown.messages.push(msg);
                }
            }
        }

        self.attach_participants(&mut slots, summary);
        self.attach_calls(&mut slots, summary);

        for slot in &mut slots {
            slot.sort_messages();
        }
        slots.sort_by(|a, b| self.chat_order(a, b));

        if !unknown.messages.is_empty() {
            tracing::warn!(
                messages = unknown.messages.len(),
                "messages without a chat collected in the unknown bucket"
            );
            unknown.sort_messages();
            slots.push(unknown);
        }

        tracing::info!(chats = slots.len(), "chats assembled");
        slots
    }

    /// Most recent activity first; chats without messages after all others.
    /// Canonical id then row id break ties.
    fn chat_order(&self, a: &AssembledChat<'_>, b: &AssembledChat<'_>) -> Ordering {
        let key = |c: &AssembledChat<'_>| {
            let address = match c.identity {
                Some(IdentityRef::Known(id)) => Some(self.resolver.get(id).address.as_str()),
                _ => None,
            };
            (
                c.messages.is_empty(),
                Reverse(c.last_activity()),
                address.is_none(),
                address.map(str::to_string),
                c.chat.map(|row| row.row_id),
            )
        };
        key(a).cmp(&key(b))
    }

    fn attach_participants(&self, slots: &mut [AssembledChat<'a>], summary: &mut RunSummary) {
        let mut by_group: HashMap<IdentityId, Vec<Member>> = HashMap::new();
        let mut orphans = 0;

        for p in self.participants {
            let Some(group) = self.resolver.by_address(&p.group_jid) else {
                orphans += 1;
                continue;
            };
            // An empty member address is how the source lists the owner.
            let identity = if p.member_jid.trim().is_empty() {
                IdentityRef::Me
            } else {
                match self.resolver.by_address(&p.member_jid) {
                    Some(id) => IdentityRef::Known(id),
                    None => {
                        orphans += 1;
                        continue;
                    }
                }
            };
            by_group.entry(group).or_default().push(Member {
                identity,
                admin: p.admin,
            });
        }

        for slot in slots.iter_mut().filter(|s| s.is_group) {
            if let Some(IdentityRef::Known(id)) = slot.identity {
                if let Some(members) = by_group.remove(&id) {
                    slot.participants = members;
                }
            }
        }

        orphans += by_group.values().map(Vec::len).sum::<usize>();
        if orphans > 0 {
            tracing::warn!(orphans, "group participants without a group chat");
        }
        summary.record_orphans(GROUP_PARTICIPANTS.name, orphans);
    }

    fn attach_calls(&self, slots: &mut [AssembledChat<'a>], summary: &mut RunSummary) {
        let mut by_identity: HashMap<IdentityId, Vec<&'a CallLogRow>> = HashMap::new();
        let mut orphans = 0;

        for call in self.calls {
            match self.resolver.reference(call.jid_row_id) {
                Some(IdentityRef::Known(id)) => by_identity.entry(id).or_default().push(call),
                _ => orphans += 1,
            }
        }

        for slot in slots.iter_mut() {
            if let Some(IdentityRef::Known(id)) = slot.identity {
                if let Some(calls) = by_identity.remove(&id) {
                    slot.calls = calls;
                }
            }
        }

        orphans += by_identity.values().map(Vec::len).sum::<usize>();
        if orphans > 0 {
            tracing::warn!(orphans, "calls without a matching chat");
        }
        summary.record_orphans(CALL_LOG.name, orphans);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::ContactDirectory;
    use crate::index::ReferenceIndex;
    use crate::normalize::tests::{base_snapshot, chat, jid, message};
    use crate::normalize::Normalizer;

    fn assemble<'s>(snapshot: &'s Snapshot, summary: &mut RunSummary, resolver: &'s IdentityResolver) -> Vec<AssembledChat<'s>> {
        let index = ReferenceIndex::build(snapshot, summary);
        let messages = Normalizer::new(resolver, &index, &snapshot.chats, true)
            .normalize_all(&snapshot.messages, summary);
        ChatAssembler::new(resolver, snapshot).assemble(messages, summary)
    }

    fn resolver_for(snapshot: &Snapshot, summary: &mut RunSummary) -> IdentityResolver {
        let extra = snapshot
            .participants
            .iter()
            .flat_map(|p| [p.group_jid.as_str(), p.member_jid.as_str()]);
        IdentityResolver::build(&snapshot.jids, extra, &ContactDirectory::new(), summary)
    }

    fn rows(chat: &AssembledChat<'_>) -> Vec<i64> {
        chat.messages.iter().map(|m| m.row_id.0).collect()
    }

    #[test]
    fn messages_are_ordered_with_storage_ties() {
        let mut snapshot = base_snapshot();
        let mut undated = message(13, 1, "D", 0);
        undated.timestamp = None;
        snapshot.messages = vec![
            message(10, 1, "A", 5),
            message(11, 1, "B", 3),
            message(12, 1, "C", 5),
            undated,
        ];

        let mut summary = RunSummary::new();
        let resolver = resolver_for(&snapshot, &mut summary);
        let chats = assemble(&snapshot, &mut summary, &resolver);

        assert_eq!(rows(&chats[0]), vec![13, 11, 10, 12]);
        let stamps: Vec<_> = chats[0].messages.iter().map(|m| m.timestamps.authored).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn missing_chat_goes_to_unknown_bucket_last() {
        let mut snapshot = base_snapshot();
        let mut no_chat = message(12, 1, "C", 9);
        no_chat.chat_row_id = None;
        snapshot.messages = vec![message(10, 1, "A", 1), message(11, 42, "B", 99), no_chat];

        let mut summary = RunSummary::new();
        let resolver = resolver_for(&snapshot, &mut summary);
        let chats = assemble(&snapshot, &mut summary, &resolver);

        let last = chats.last().unwrap();
        assert!(last.is_synthetic());
        assert_eq!(rows(last), vec![12, 11]);
        assert_eq!(summary.unknown_chat_messages, 2);

        let total: usize = chats.iter().map(|c| c.messages.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn chats_order_by_recent_activity() {
        let mut snapshot = base_snapshot();
        snapshot.jids.push(jid(4, "000@s.whatsapp.net"));
        snapshot.chats.push(chat(3, 3));
        snapshot.chats.push(chat(4, 4));
        snapshot.messages = vec![
            message(10, 1, "A", 100),
            message(11, 2, "B", 300),
            message(12, 3, "C", 200),
        ];

        let mut summary = RunSummary::new();
        let resolver = resolver_for(&snapshot, &mut summary);
        let chats = assemble(&snapshot, &mut summary, &resolver);

        let order: Vec<i64> = chats.iter().map(|c| c.chat.unwrap().row_id.0).collect();
        assert_eq!(order, vec![2, 3, 1, 4]);
        assert_eq!(chats[0].last_activity(), Some(300));
    }

    #[test]
    fn empty_chats_tie_break_on_address() {
        let mut snapshot = base_snapshot();
        snapshot.jids.push(jid(4, "000@s.whatsapp.net"));
        snapshot.chats.push(chat(4, 4));

        let mut summary = RunSummary::new();
        let resolver = resolver_for(&snapshot, &mut summary);
        let chats = assemble(&snapshot, &mut summary, &resolver);

        let order: Vec<i64> = chats.iter().map(|c| c.chat.unwrap().row_id.0).collect();
        // "000@..." < "111-...@g.us" < "111@..."
        assert_eq!(order, vec![4, 2, 1]);
    }

    #[test]
    fn participants_attach_to_groups_only() {
        let mut snapshot = base_snapshot();
        let member = |row, group: &str, member: &str, admin| ParticipantRow {
            row_id: RowId(row),
            group_jid: group.into(),
            member_jid: member.into(),
            admin,
        };
        snapshot.participants = vec![
            member(1, "111-1600000000@g.us", "222@s.whatsapp.net", true),
            member(2, "111-1600000000@g.us", "", false),
            member(3, "999-1@g.us", "222@s.whatsapp.net", false),
        ];

        let mut summary = RunSummary::new();
        let resolver = resolver_for(&snapshot, &mut summary);
        let chats = assemble(&snapshot, &mut summary, &resolver);

        let group = chats.iter().find(|c| c.is_group).unwrap();
        assert_eq!(group.participants.len(), 2);
        assert!(group.participants[0].admin);
        assert_eq!(group.participants[1].identity, IdentityRef::Me);
        assert!(chats.iter().filter(|c| !c.is_group).all(|c| c.participants.is_empty()));
        assert_eq!(summary.orphaned_rows.get("group_participants"), Some(&1));
    }

    #[test]
    fn calls_follow_the_chat_identity() {
        let mut snapshot = base_snapshot();
        snapshot.jids.push(jid(5, "111:4@s.whatsapp.net"));
        let call = |row, jid| CallLogRow {
            row_id: RowId(row),
            jid_row_id: Some(RowId(jid)),
            call_result: Some(5),
            ..Default::default()
        };
        snapshot.calls = vec![call(1, 1), call(2, 5), call(3, 3), call(4, 88)];

        let mut summary = RunSummary::new();
        let resolver = resolver_for(&snapshot, &mut summary);
        let chats = assemble(&snapshot, &mut summary, &resolver);

        let direct = chats.iter().find(|c| c.chat.unwrap().row_id == RowId(1)).unwrap();
        let ids: Vec<i64> = direct.calls.iter().map(|c| c.row_id.0).collect();
        assert_eq!(ids, vec![1, 2]);
        // jid 3 has no chat and jid 88 does not exist
        assert_eq!(summary.orphaned_rows.get("call_log"), Some(&2));
    }

    #[test]
    fn dangling_chat_identity_is_counted() {
        let mut snapshot = base_snapshot();
        snapshot.chats.push(chat(9, 404));

        let mut summary = RunSummary::new();
        let resolver = resolver_for(&snapshot, &mut summary);
        let chats = assemble(&snapshot, &mut summary, &resolver);

        let dangling = chats.iter().find(|c| c.chat.unwrap().row_id == RowId(9)).unwrap();
        assert_eq!(dangling.identity, Some(IdentityRef::Dangling(RowId(404))));
        assert_eq!(summary.dangling_identities, 1);
    }
}
