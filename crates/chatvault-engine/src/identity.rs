//! Identity resolution.
//!
//! Every address in the snapshot (jid rows and the raw strings used by the
//! group membership table) is canonicalised and registered exactly once.
//! The resolver is built before anything else and is read-only afterwards;
//! all other stages hold plain [`IdentityId`] handles into it.

use std::collections::HashMap;

use chatvault_shared::constants::{
    SERVER_BROADCAST, SERVER_GROUP, SERVER_LINKED, SERVER_NEWSLETTER, SERVER_PERSON,
    SERVER_PERSON_LEGACY,
};
use chatvault_shared::RowId;
use chatvault_store::JidRow;
use serde::Serialize;

use crate::contacts::ContactDirectory;
use crate::summary::RunSummary;

/// Address family, decided by the server part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Person,
    /// Hidden person id that is not a phone number.
    Linked,
    Group,
    Broadcast,
    Newsletter,
    Other,
}

impl Namespace {
    fn of_server(server: &str) -> Self {
        match server {
            SERVER_PERSON => Self::Person,
            SERVER_LINKED => Self::Linked,
            SERVER_GROUP => Self::Group,
            SERVER_BROADCAST => Self::Broadcast,
            SERVER_NEWSLETTER => Self::Newsletter,
            _ => Self::Other,
        }
    }
}

/// A canonical address and its family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalAddress {
    pub address: String,
    pub namespace: Namespace,
}

/// Canonicalise a raw address.
///
/// Lowercases, folds the legacy person server into the current one, and
/// drops the `.agent:device` suffix person ids carry when they name one
/// device rather than the account.
pub fn canonicalize(raw: &str) -> CanonicalAddress {
    let lowered = raw.trim().to_lowercase();
    let Some((user, server)) = lowered.split_once('@') else {
        return CanonicalAddress {
            address: lowered,
            namespace: Namespace::Other,
        };
    };

    let server = if server == SERVER_PERSON_LEGACY {
        SERVER_PERSON
    } else {
        server
    };
    let namespace = Namespace::of_server(server);
    let user = match namespace {
        Namespace::Person | Namespace::Linked => {
            let account = user.split(':').next().unwrap_or(user);
            account.split('.').next().unwrap_or(account)
        }
        _ => user,
    };

    CanonicalAddress {
        address: format!("{user}@{server}"),
        namespace,
    }
}

/// One distinct party. Owned by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Canonical address; unique within a resolver.
    pub address: String,
    pub namespace: Namespace,
    pub display_name: Option<String>,
}

impl Identity {
    /// The part before `@`.
    pub fn user_part(&self) -> &str {
        self.address
            .split_once('@')
            .map_or(self.address.as_str(), |(user, _)| user)
    }
}

/// Handle to an [`Identity`] inside one resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityId(usize);

/// What a sender/participant reference resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityRef {
    Known(IdentityId),
    /// The referenced jid row does not exist. Kept so the archive can still
    /// say which row was meant.
    Dangling(RowId),
    /// The archive owner.
    Me,
}

#[derive(Debug, Default)]
pub struct IdentityResolver {
    identities: Vec<Identity>,
    by_row: HashMap<RowId, IdentityId>,
    by_address: HashMap<String, IdentityId>,
}

impl IdentityResolver {
    /// Register every jid row, then every extra raw address.
    ///
    /// Jid rows that yield no address at all are counted as malformed.
    pub fn build<'s>(
        jids: &[JidRow],
        extra_addresses: impl IntoIterator<Item = &'s str>,
        contacts: &ContactDirectory,
        summary: &mut RunSummary,
    ) -> Self {
        let mut resolver = Self::default();

        for jid in jids {
            let Some(raw) = jid_address(jid) else {
                tracing::warn!(row_id = %jid.row_id, "jid row has no address, skipping");
                summary.record_malformed("jid");
                continue;
            };
            let id = resolver.register(&raw, contacts);
            resolver.by_row.insert(jid.row_id, id);
        }

        for raw in extra_addresses {
            if !raw.trim().is_empty() {
                resolver.register(raw, contacts);
            }
        }

        tracing::debug!(
            identities = resolver.identities.len(),
            jid_rows = resolver.by_row.len(),
            "identities resolved"
        );
        resolver
    }

    fn register(&mut self, raw: &str, contacts: &ContactDirectory) -> IdentityId {
        let canonical = canonicalize(raw);
        if let Some(id) = self.by_address.get(&canonical.address) {
            return *id;
        }

        let mut identity = Identity {
            address: canonical.address,
            namespace: canonical.namespace,
            display_name: None,
        };
        if matches!(identity.namespace, Namespace::Person | Namespace::Linked) {
            identity.display_name = contacts.lookup_phone(identity.user_part()).map(str::to_string);
        }

        let id = IdentityId(self.identities.len());
        self.by_address.insert(identity.address.clone(), id);
        self.identities.push(identity);
        id
    }

    pub fn get(&self, id: IdentityId) -> &Identity {
        &self.identities[id.0]
    }

    /// Resolve a jid row reference. `None` when there is no reference.
    pub fn reference(&self, row: Option<RowId>) -> Option<IdentityRef> {
        let row = row?;
        Some(match self.by_row.get(&row) {
            Some(id) => IdentityRef::Known(*id),
            None => IdentityRef::Dangling(row),
        })
    }

    /// Look up a raw address registered at build time.
    pub fn by_address(&self, raw: &str) -> Option<IdentityId> {
        self.by_address.get(&canonicalize(raw).address).copied()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

fn jid_address(jid: &JidRow) -> Option<String> {
    if let Some(raw) = jid.raw_string.as_deref().filter(|r| !r.trim().is_empty()) {
        return Some(raw.to_string());
    }
    match (jid.user.as_deref(), jid.server.as_deref()) {
        (Some(user), Some(server)) if !user.trim().is_empty() && !server.trim().is_empty() => {
            Some(format!("{user}@{server}"))
        }
        _ => None,
    }
}
