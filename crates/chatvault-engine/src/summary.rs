//! Per-run counters.
//!
//! A [`RunSummary`] is created at the start of each run and threaded by
//! `&mut` through every stage. There is no process-wide state, so two runs
//! in the same process never see each other's counts.

use std::collections::BTreeMap;

use chatvault_store::Snapshot;
use serde::Serialize;

/// How a completed run went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every row made it into the archive with all its context.
    Complete,
    /// The archive is complete, but rows were skipped or lost context.
    Degraded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Rows that could not be decoded, per table.
    pub malformed_rows: BTreeMap<&'static str, usize>,
    /// Rows kept with invalid UTF-8 text replaced, per table.
    pub lossy_text_rows: BTreeMap<&'static str, usize>,
    /// Side-table rows whose owner does not exist, per table.
    pub orphaned_rows: BTreeMap<&'static str, usize>,
    /// The source's dummy message row.
    pub placeholder_rows: usize,
    /// Identity references to jid rows that do not exist.
    pub dangling_identities: usize,
    pub unresolved_replies: usize,
    pub unresolved_pins: usize,
    /// Messages placed in the synthetic unknown chat.
    pub unknown_chat_messages: usize,
    /// Status codes kept as `unknown:<code>`. Informational.
    pub unknown_status_codes: usize,
    /// Receipts treated as delivered because only a read/played time exists.
    pub implied_deliveries: usize,
    pub absent_tables: Vec<&'static str>,
    pub total_chats: usize,
    pub total_messages: usize,
    pub total_reactions: usize,
    pub archive_bytes: u64,
    pub archive_digest: Option<String>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_malformed(&mut self, table: &'static str) {
        *self.malformed_rows.entry(table).or_default() += 1;
    }

    pub fn record_orphan(&mut self, table: &'static str) {
        *self.orphaned_rows.entry(table).or_default() += 1;
    }

    pub fn record_orphans(&mut self, table: &'static str, count: usize) {
        if count > 0 {
            *self.orphaned_rows.entry(table).or_default() += count;
        }
    }

    /// Fold in what the snapshot reader already skipped or repaired.
    pub fn absorb_snapshot(&mut self, snapshot: &Snapshot) {
        for row in &snapshot.malformed {
            self.record_malformed(row.table);
        }
        for row in &snapshot.lossy_text {
            *self.lossy_text_rows.entry(row.table).or_default() += 1;
        }
        self.absent_tables.extend_from_slice(&snapshot.absent_tables);
    }

    /// Rows skipped or archived with missing context.
    ///
    /// The placeholder row and informational counters are not included:
    /// every snapshot has the former, and the latter lose nothing.
    pub fn degraded_rows(&self) -> usize {
        self.malformed_rows.values().sum::<usize>()
            + self.lossy_text_rows.values().sum::<usize>()
            + self.orphaned_rows.values().sum::<usize>()
            + self.dangling_identities
            + self.unresolved_replies
            + self.unresolved_pins
            + self.unknown_chat_messages
    }

    pub fn outcome(&self) -> Outcome {
        if self.degraded_rows() == 0 {
            Outcome::Complete
        } else {
            Outcome::Degraded
        }
    }
}
