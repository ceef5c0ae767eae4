//! Address-book lookups.
//!
//! The directory is produced outside the engine (from a contact export) as
//! a JSON object mapping phone numbers to display names. Phone numbers in
//! exports come in every format, so keys are normalised on load and
//! registered both with and without a leading `+`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Default)]
pub struct ContactDirectory {
    names: HashMap<String, String>,
    entries: usize,
}

impl ContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(phone, name)` pairs. Exact keys win over the derived
    /// `+`/no-`+` variants; among equals the first pair wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut dir = Self::default();
        let mut variants = Vec::new();

        for (phone, name) in pairs {
            let normalized = normalize_phone(phone.as_ref());
            let name = name.into();
            dir.entries += 1;
            if normalized.is_empty() || name.trim().is_empty() {
                continue;
            }

            let variant = match normalized.strip_prefix('+') {
                Some(bare) => bare.to_string(),
                None => format!("+{normalized}"),
            };
            variants.push((variant, name.clone()));
            dir.names.entry(normalized).or_insert(name);
        }

        for (variant, name) in variants {
            dir.names.entry(variant).or_insert(name);
        }
        dir
    }

    /// Parse a `{ "phone": "name", ... }` JSON document.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        // BTreeMap keeps load order independent of the file's key order.
        let map: BTreeMap<String, String> = serde_json::from_str(json)?;
        Ok(Self::from_pairs(map))
    }

    /// Load a directory file written by the contact export step.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| EngineError::ContactDirectory {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let dir = Self::from_json_str(&json).map_err(|e| EngineError::ContactDirectory {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            path = %path.display(),
            entries = dir.len(),
            "contact directory loaded"
        );
        Ok(dir)
    }

    /// Look up the user part of a person address (digits, no `+`).
    pub fn lookup_phone(&self, digits: &str) -> Option<&str> {
        let digits = normalize_phone(digits);
        let bare = digits.trim_start_matches('+');
        self.names
            .get(&format!("+{bare}"))
            .or_else(|| self.names.get(bare))
            .map(String::as_str)
    }

    /// Number of entries in the source mapping.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

/// Strip the formatting characters phone exports use.
fn normalize_phone(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect()
}
