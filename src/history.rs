use crate::fingerprint::Fingerprint;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One forwarded booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub first_seen: DateTime<Utc>,
    pub message_id: String,
    pub forwarded_at: DateTime<Utc>,
    /// Sorted leg identifiers at the time of forwarding. Empty for
    /// content-identity records.
    #[serde(default)]
    pub flights: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryData {
    /// Keyed by `airline:code`.
    #[serde(default)]
    confirmations: HashMap<String, HistoryRecord>,
    /// Keyed by content hash.
    #[serde(default)]
    contents: HashMap<String, HistoryRecord>,
}

/// Persisted forwarding history. Every record() persists immediately, so an
/// interrupted run keeps exactly the forwards it completed. Only the store
/// mutates the underlying data; the decision engine goes through lookups
/// and record().
pub struct HistoryStore {
    path: Option<PathBuf>,
    data: HistoryData,
}

impl HistoryStore {
    /// Open the store at `path`. A missing or unreadable file is a cold
    /// start, not an error: the worst case is re-forwarding old mail, which
    /// the operator can correct, while refusing to run cannot be.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!(
                        "History file {} is corrupt ({e}); starting with an empty history",
                        path.display()
                    );
                    HistoryData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HistoryData::default(),
            Err(e) => {
                log::warn!(
                    "Could not read history file {} ({e}); starting with an empty history",
                    path.display()
                );
                HistoryData::default()
            }
        };

        HistoryStore {
            path: Some(path),
            data,
        }
    }

    /// Store that never touches disk, for tests and probe runs.
    pub fn in_memory() -> Self {
        HistoryStore {
            path: None,
            data: HistoryData::default(),
        }
    }

    pub fn lookup_confirmation(&self, key: &str) -> Option<&HistoryRecord> {
        self.data.confirmations.get(key)
    }

    pub fn lookup_content(&self, hash: &str) -> Option<&HistoryRecord> {
        self.data.contents.get(hash)
    }

    /// Record a forwarded candidate under every identity the fingerprint
    /// carries, then persist. A booking change keeps the original
    /// `first_seen` and overwrites the rest.
    pub fn record(
        &mut self,
        fingerprint: &Fingerprint,
        message_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if let Some(identity) = &fingerprint.confirmation {
            let flights: Vec<String> = identity.flights.iter().cloned().collect();
            self.data
                .confirmations
                .entry(identity.key())
                .and_modify(|record| {
                    record.message_id = message_id.to_string();
                    record.forwarded_at = now;
                    record.flights = flights.clone();
                })
                .or_insert_with(|| HistoryRecord {
                    first_seen: now,
                    message_id: message_id.to_string(),
                    forwarded_at: now,
                    flights,
                });
        }

        self.data
            .contents
            .insert(fingerprint.content.clone(), HistoryRecord {
                first_seen: now,
                message_id: message_id.to_string(),
                forwarded_at: now,
                flights: Vec::new(),
            });

        self.persist()
    }

    /// Unconditionally empty the store. Operator action only.
    pub fn reset(&mut self) -> anyhow::Result<()> {
        self.data = HistoryData::default();
        self.persist()
    }

    pub fn is_empty(&self) -> bool {
        self.data.confirmations.is_empty() && self.data.contents.is_empty()
    }

    /// Confirmation records, for the flight summary report.
    pub fn confirmation_records(&self) -> impl Iterator<Item = (&String, &HistoryRecord)> {
        self.data.confirmations.iter()
    }

    fn persist(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write history file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::ConfirmationIdentity;
    use std::collections::BTreeSet;

    fn fp(code: Option<&str>, flights: &[&str], content: &str) -> Fingerprint {
        Fingerprint {
            confirmation: code.map(|code| ConfirmationIdentity {
                airline: "Delta".to_string(),
                code: code.to_string(),
                flights: flights.iter().map(|f| f.to_string()).collect::<BTreeSet<_>>(),
            }),
            content: content.to_string(),
        }
    }

    #[test]
    fn records_are_found_under_both_identities() {
        let mut store = HistoryStore::in_memory();
        let fingerprint = fp(Some("DJWNTF"), &["DL123 2024-06-01"], "abc123");
        store
            .record(&fingerprint, "INBOX:1.eml", Utc::now())
            .unwrap();

        assert!(store.lookup_confirmation("delta:DJWNTF").is_some());
        assert!(store.lookup_content("abc123").is_some());
        assert!(store.lookup_confirmation("delta:OTHER").is_none());
    }

    #[test]
    fn booking_change_keeps_first_seen() {
        let mut store = HistoryStore::in_memory();
        let first = Utc::now();
        store
            .record(&fp(Some("DJWNTF"), &["DL123 2024-06-01"], "a"), "INBOX:1.eml", first)
            .unwrap();

        let later = first + chrono::Duration::hours(2);
        store
            .record(&fp(Some("DJWNTF"), &["DL789 2024-06-01"], "b"), "INBOX:2.eml", later)
            .unwrap();

        let record = store.lookup_confirmation("delta:DJWNTF").unwrap();
        assert_eq!(record.first_seen, first);
        assert_eq!(record.forwarded_at, later);
        assert_eq!(record.message_id, "INBOX:2.eml");
        assert_eq!(record.flights, vec!["DL789 2024-06-01".to_string()]);
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = HistoryStore::in_memory();
        store
            .record(&fp(Some("DJWNTF"), &[], "a"), "INBOX:1.eml", Utc::now())
            .unwrap();
        assert!(!store.is_empty());

        store.reset().unwrap();
        assert!(store.is_empty());
        assert!(store.lookup_confirmation("delta:DJWNTF").is_none());
        assert!(store.lookup_content("a").is_none());
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut store = HistoryStore::open(&path);
        store
            .record(
                &fp(Some("DJWNTF"), &["DL123 2024-06-01"], "abc"),
                "INBOX:1.eml",
                Utc::now(),
            )
            .unwrap();

        let reloaded = HistoryStore::open(&path);
        assert!(reloaded.lookup_confirmation("delta:DJWNTF").is_some());
        assert!(reloaded.lookup_content("abc").is_some());
    }

    #[test]
    fn corrupt_file_loads_as_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = HistoryStore::open(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn missing_file_loads_as_empty_store() {
        let store = HistoryStore::open("/nonexistent/dir/history.json");
        assert!(store.is_empty());
    }
}
