//! The export pipeline.
//!
//! open snapshot -> load -> resolve identities -> index side tables ->
//! normalize -> assemble -> serialize -> write. Each run owns its own
//! [`RunSummary`]; nothing is shared between runs.

use std::path::Path;

use chatvault_store::{Database, Snapshot};

use crate::archive::Archive;
use crate::assemble::ChatAssembler;
use crate::contacts::ContactDirectory;
use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::index::ReferenceIndex;
use crate::normalize::Normalizer;
use crate::serialize::{digest, to_bytes, write_atomic, ArchiveSerializer};
use crate::summary::RunSummary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub include_thumbnails: bool,
    pub pretty: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_thumbnails: true,
            pretty: true,
        }
    }
}

/// Run every in-memory stage over a loaded snapshot.
pub fn build_archive(
    snapshot: &Snapshot,
    contacts: &ContactDirectory,
    source_db: &str,
    options: &ExportOptions,
) -> (Archive, RunSummary) {
    let mut summary = RunSummary::new();
    summary.absorb_snapshot(snapshot);

    // Membership rows name parties by raw address rather than jid row.
    let membership = snapshot
        .participants
        .iter()
        .flat_map(|p| [p.group_jid.as_str(), p.member_jid.as_str()]);
    let resolver = IdentityResolver::build(&snapshot.jids, membership, contacts, &mut summary);

    let index = ReferenceIndex::build(snapshot, &mut summary);
    let normalizer = Normalizer::new(&resolver, &index, &snapshot.chats, options.include_thumbnails);
    let messages = normalizer.normalize_all(&snapshot.messages, &mut summary);

    let chats = ChatAssembler::new(&resolver, snapshot).assemble(messages, &mut summary);
    let archive = ArchiveSerializer::new(&resolver, source_db, contacts.len()).render(&chats, &mut summary);

    (archive, summary)
}

/// Export the snapshot at `db` to `output`.
///
/// Any error means nothing was written; an existing archive at `output` is
/// left untouched.
pub fn export(
    db: &Path,
    contacts: &ContactDirectory,
    output: &Path,
    options: &ExportOptions,
) -> Result<RunSummary> {
    let snapshot = Database::open_snapshot(db)?.load_snapshot()?;

    let source_db = db
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| db.display().to_string());
    let (archive, mut summary) = build_archive(&snapshot, contacts, &source_db, options);

    let bytes = to_bytes(&archive, options.pretty)?;
    summary.archive_bytes = bytes.len() as u64;
    summary.archive_digest = Some(digest(&bytes));
    write_atomic(output, &bytes)?;

    tracing::info!(
        output = %output.display(),
        chats = summary.total_chats,
        messages = summary.total_messages,
        bytes = summary.archive_bytes,
        outcome = ?summary.outcome(),
        "archive exported"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::summary::Outcome;
    use chatvault_store::schema::REFERENCE_SCHEMA;
    use rusqlite::Connection;
    use serde_json::Value;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const SEED: &str = "
        INSERT INTO jid (_id, raw_string) VALUES
            (1, '111@s.whatsapp.net'),
            (2, '111-1600000000@g.us'),
            (3, '222@s.whatsapp.net');
        INSERT INTO chat (_id, jid_row_id, subject) VALUES
            (1, 1, NULL),
            (2, 2, 'Climbing');
        INSERT INTO group_participants (gjid, jid, admin) VALUES
            ('111-1600000000@g.us', '222@s.whatsapp.net', 1),
            ('111-1600000000@g.us', '', 0);
        INSERT INTO message (_id, chat_row_id, from_me, key_id, status, timestamp, message_type, text_data) VALUES
            (1, -1, 0, '', NULL, 0, NULL, NULL),
            (2, 1, 0, 'A1', 0, 1000, 0, 'Hi'),
            (3, 1, 1, 'B1', 99, 2000, 0, 'Hello back'),
            (4, 2, 1, 'G1', 6, 1500, 0, 'Anyone up?');
        INSERT INTO message_quoted (message_row_id, key_id, from_me, text_data) VALUES
            (3, 'A1', 0, 'Hi');
        INSERT INTO receipt_user (message_row_id, receipt_user_jid_row_id, receipt_timestamp, read_timestamp) VALUES
            (4, 3, 0, 1600);
        INSERT INTO message_add_on (_id, parent_message_row_id, message_add_on_type, from_me, sender_jid_row_id) VALUES
            (1, 2, 56, 1, NULL),
            (2, 999, 56, 0, 3);
        INSERT INTO message_add_on_reaction (message_add_on_row_id, reaction, sender_timestamp) VALUES
            (1, '👍', 1100),
            (2, '😂', 1200);
    ";

    fn snapshot_file(dir: &TempDir, seed: &str) -> PathBuf {
        let path = dir.path().join("msgstore.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(REFERENCE_SCHEMA).unwrap();
        conn.execute_batch(seed).unwrap();
        path
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn exports_fixture_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let db = snapshot_file(&dir, SEED);
        let out = dir.path().join("out").join("archive.json");
        let contacts = ContactDirectory::from_pairs([("+222", "Bea")]);

        let summary = export(&db, &contacts, &out, &ExportOptions::default()).unwrap();
        let value = read_json(&out);

        assert_eq!(value["total_chats"], 2);
        assert_eq!(value["total_messages"], 3);
        assert_eq!(value["contacts_count"], 1);

        let direct = &value["chats"][0];
        assert_eq!(direct["id"], "111@s.whatsapp.net");
        assert_eq!(direct["messages"][1]["replies_to"]["message_id"], "A1");
        assert_eq!(direct["messages"][1]["replies_to"]["text"], "Hi");
        assert_eq!(direct["messages"][1]["status"], "unknown:99");
        assert_eq!(direct["messages"][0]["reactions"][0]["emoji"], "👍");

        let group = &value["chats"][1];
        assert_eq!(group["name"], "Climbing");
        assert_eq!(group["participants"][0]["name"], "Bea");
        assert_eq!(group["participants"][1]["is_me"], true);
        let receipts = &group["messages"][0]["receipts"];
        assert_eq!(receipts["delivered"][0]["address"], "222@s.whatsapp.net");
        assert_eq!(receipts["read"][0]["timestamp"], 1600);

        assert_eq!(summary.placeholder_rows, 1);
        assert_eq!(summary.orphaned_rows.get("message_add_on_reaction"), Some(&1));
        assert_eq!(summary.unknown_status_codes, 1);
        assert_eq!(summary.implied_deliveries, 1);
        assert_eq!(summary.outcome(), Outcome::Degraded);
        assert_eq!(summary.archive_bytes, std::fs::metadata(&out).unwrap().len());
    }

    #[test]
    fn repeated_runs_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let db = snapshot_file(&dir, SEED);
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        let contacts = ContactDirectory::from_pairs([("+222", "Bea")]);

        let a = export(&db, &contacts, &first, &ExportOptions::default()).unwrap();
        let b = export(&db, &contacts, &second, &ExportOptions::default()).unwrap();

        assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
        assert_eq!(a.archive_digest, b.archive_digest);
        assert_eq!(a, b);
    }

    #[test]
    fn clean_snapshot_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        let db = snapshot_file(
            &dir,
            "INSERT INTO jid (_id, raw_string) VALUES (1, '111@s.whatsapp.net');
             INSERT INTO chat (_id, jid_row_id) VALUES (1, 1);
             INSERT INTO message (_id, chat_row_id, from_me, key_id, status, timestamp, message_type)
                 VALUES (1, 1, 1, 'K', 5, 10, 0);",
        );
        let out = dir.path().join("archive.json");

        let summary = export(&db, &ContactDirectory::new(), &out, &ExportOptions::default()).unwrap();
        assert_eq!(summary.outcome(), Outcome::Complete);
        assert_eq!(read_json(&out)["chats"][0]["messages"][0]["status"], "delivered");
    }

    #[test]
    fn missing_snapshot_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("archive.json");
        std::fs::write(&out, b"previous").unwrap();

        let err = export(
            &dir.path().join("nope.db"),
            &ContactDirectory::new(),
            &out,
            &ExportOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::Store(_)));
        assert_eq!(std::fs::read(&out).unwrap(), b"previous");
    }

    #[test]
    fn every_message_row_is_accounted_for() {
        let dir = tempfile::tempdir().unwrap();
        let db = snapshot_file(&dir, SEED);
        let snapshot = Database::open_snapshot(&db).unwrap().load_snapshot().unwrap();

        let (archive, summary) =
            build_archive(&snapshot, &ContactDirectory::new(), "msgstore.db", &ExportOptions::default());

        let archived: usize = archive.chats.iter().map(|c| c.messages.len()).sum();
        let skipped = summary.placeholder_rows + summary.malformed_rows.get("message").copied().unwrap_or(0);
        assert_eq!(archived + skipped, 4);

        let mut seen: Vec<i64> = archive
            .chats
            .iter()
            .flat_map(|c| c.messages.iter().map(|m| m.row_id.0))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), archived);
    }

    #[test]
    fn invalid_utf8_body_is_archived_with_its_reactions() {
        let dir = tempfile::tempdir().unwrap();
        let db = snapshot_file(
            &dir,
            "INSERT INTO jid (_id, raw_string) VALUES (1, '111@s.whatsapp.net');
             INSERT INTO chat (_id, jid_row_id) VALUES (1, 1);
             INSERT INTO message (_id, chat_row_id, from_me, key_id, status, timestamp, message_type, text_data)
                 VALUES (10, 1, 1, 'K', 5, 10, 0, CAST(x'48c328' AS TEXT));
             INSERT INTO message_add_on (_id, parent_message_row_id, message_add_on_type, from_me)
                 VALUES (1, 10, 56, 1);
             INSERT INTO message_add_on_reaction (message_add_on_row_id, reaction, sender_timestamp)
                 VALUES (1, '👍', 20);",
        );
        let out = dir.path().join("archive.json");

        let summary = export(&db, &ContactDirectory::new(), &out, &ExportOptions::default()).unwrap();
        let message = &read_json(&out)["chats"][0]["messages"][0];

        assert_eq!(message["message_id"], "K");
        assert_eq!(message["text"], "H\u{fffd}(");
        assert_eq!(message["reactions"][0]["emoji"], "👍");
        assert!(summary.malformed_rows.is_empty());
        assert!(summary.orphaned_rows.is_empty());
        assert_eq!(summary.lossy_text_rows.get("message"), Some(&1));
        assert_eq!(summary.outcome(), Outcome::Degraded);
    }

    #[test]
    fn compact_output_without_thumbnails() {
        let dir = tempfile::tempdir().unwrap();
        let db = snapshot_file(
            &dir,
            "INSERT INTO jid (_id, raw_string) VALUES (1, '111@s.whatsapp.net');
             INSERT INTO chat (_id, jid_row_id) VALUES (1, 1);
             INSERT INTO message (_id, chat_row_id, from_me, key_id, timestamp) VALUES (1, 1, 0, 'K', 10);
             INSERT INTO message_thumbnail (message_row_id, thumbnail) VALUES (1, x'0102');",
        );
        let out = dir.path().join("archive.json");
        let options = ExportOptions {
            include_thumbnails: false,
            pretty: false,
        };

        export(&db, &ContactDirectory::new(), &out, &options).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(!text.contains("thumbnail"));
    }
}
