//! Mailbox collaborators.
//!
//! The decision core only sees these traits. Network transport (IMAP/SMTP)
//! is out of scope; the shipped implementations work against local
//! directories of `.eml` files.

use crate::message::{self, CandidateEmail};

use anyhow::Context;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Supplies a finite, ordered batch of candidates for a folder set and time
/// window. Re-enumeration may re-yield already-processed messages; the
/// dedup history is the only safeguard against re-forwarding them.
pub trait MailboxReader {
    fn fetch(
        &mut self,
        folders: &[String],
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<CandidateEmail>>;
}

/// Delivers one candidate to the fixed destination address.
pub trait ForwardingSender {
    fn forward(&mut self, candidate: &CandidateEmail, destination: &str) -> anyhow::Result<()>;
}

/// Reads `.eml` files from folder subdirectories under a mailbox root.
/// The mailbox-unique identifier is `folder:filename`.
pub struct MaildirReader {
    root: PathBuf,
}

impl MaildirReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        MaildirReader { root: root.into() }
    }
}

impl MailboxReader for MaildirReader {
    fn fetch(
        &mut self,
        folders: &[String],
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<CandidateEmail>> {
        let mut candidates = Vec::new();

        for folder in folders {
            let dir = self.root.join(folder);
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Could not open folder {}: {e}", dir.display());
                    continue;
                }
            };

            let mut files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    path.extension().map(|ext| ext == "eml").unwrap_or(false)
                })
                .collect();
            files.sort();

            for path in files {
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let id = format!("{folder}:{name}");
                let raw = match std::fs::read(&path) {
                    Ok(raw) => raw,
                    Err(e) => {
                        log::warn!("Could not read {}: {e}", path.display());
                        continue;
                    }
                };
                let candidate = match message::parse_candidate(&raw, id.clone()) {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        log::warn!("Skipping unparseable message {id}: {e}");
                        continue;
                    }
                };
                // Messages outside the window are skipped; a message with no
                // parseable date stays in, dedup catches repeats.
                if let (Some(since), Some(received)) = (since, candidate.received) {
                    if received < since {
                        continue;
                    }
                }
                candidates.push(candidate);
            }
        }

        Ok(candidates)
    }
}

/// Writes each forwarded message verbatim into an outbox directory. Stands
/// in for SMTP delivery, which is outside this crate's scope.
pub struct OutboxSender {
    dir: PathBuf,
}

impl OutboxSender {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        OutboxSender { dir: dir.into() }
    }
}

impl ForwardingSender for OutboxSender {
    fn forward(&mut self, candidate: &CandidateEmail, destination: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create outbox {}", self.dir.display()))?;

        let name: String = candidate
            .id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        let path = self.dir.join(name);
        std::fs::write(&path, &candidate.raw)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        log::info!("Delivered {} to {destination} ({})", candidate.id, path.display());
        Ok(())
    }
}
