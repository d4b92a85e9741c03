pub mod config;
pub mod engine;
pub mod extractor;
pub mod fingerprint;
pub mod history;
pub mod mailbox;
pub mod message;
pub mod report;
pub mod signature;

pub use config::Config;
pub use engine::{Decision, DecisionEngine, RunSummary, Verdict};
pub use extractor::{ExtractionResult, Extractor, FlightLeg};
pub use fingerprint::{ConfirmationIdentity, Fingerprint};
pub use history::{HistoryRecord, HistoryStore};
pub use mailbox::{ForwardingSender, MailboxReader, MaildirReader, OutboxSender};
pub use message::CandidateEmail;
