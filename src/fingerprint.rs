use crate::extractor::ExtractionResult;
use crate::message::CandidateEmail;

use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// The airline's own booking identity: reservation code plus the set of
/// legs it currently covers. Two emails agreeing on airline and code but
/// not on the leg set describe a booking change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationIdentity {
    pub airline: String,
    pub code: String,
    /// Sorted, de-duplicated leg identifiers.
    pub flights: BTreeSet<String>,
}

impl ConfirmationIdentity {
    /// History-store key. Leg set is intentionally excluded so a changed
    /// booking still finds its earlier record.
    pub fn key(&self) -> String {
        format!("{}:{}", self.airline.to_lowercase(), self.code)
    }
}

/// Identity signals for one classified email. `content` is always present;
/// `confirmation` only when a code was extracted.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub confirmation: Option<ConfirmationIdentity>,
    pub content: String,
}

/// Derive both identity signals. Pure function of its inputs.
pub fn fingerprint(candidate: &CandidateEmail, extraction: &ExtractionResult) -> Fingerprint {
    let confirmation = extraction
        .confirmation_code
        .as_ref()
        .map(|code| ConfirmationIdentity {
            airline: extraction.airline.clone(),
            code: code.clone(),
            flights: extraction.flights.iter().map(|leg| leg.id()).collect(),
        });

    Fingerprint {
        confirmation,
        content: content_hash(&candidate.subject, &candidate.body),
    }
}

lazy_static! {
    static ref QUOTED_LINE: Regex = Regex::new(r"^\s*>").unwrap();
    static ref REPLY_HEADER: Regex =
        Regex::new(r"(?i)^on .{0,120} wrote:\s*$").unwrap();
    static ref FORWARD_MARKER: Regex =
        Regex::new(r"^-{3,}\s*forwarded message\s*-{3,}").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Stable hash over normalized subject and body, so re-delivered or lightly
/// re-rendered copies of the same message still collide.
pub fn content_hash(subject: &str, body: &str) -> String {
    let normalized = format!(
        "{}\n{}",
        normalize_text(subject),
        normalize_text(&strip_boilerplate(body))
    );

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Drop quoted replies, reply headers, and everything below a signature or
/// forwarded-message marker.
fn strip_boilerplate(body: &str) -> String {
    let mut kept = Vec::new();
    for line in body.lines() {
        let lower = line.to_lowercase();
        if line.trim_end() == "--" || line == "-- " || FORWARD_MARKER.is_match(&lower) {
            break;
        }
        if QUOTED_LINE.is_match(line) || REPLY_HEADER.is_match(line) {
            continue;
        }
        kept.push(line);
    }
    kept.join("\n")
}

fn normalize_text(text: &str) -> String {
    WHITESPACE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::FlightLeg;

    fn candidate(subject: &str, body: &str) -> CandidateEmail {
        CandidateEmail {
            id: "INBOX:fp.eml".to_string(),
            sender: "notify@delta.com".to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            received: None,
            raw: Vec::new(),
        }
    }

    fn extraction(code: Option<&str>, flights: &[(&str, &str)]) -> ExtractionResult {
        ExtractionResult {
            airline: "Delta".to_string(),
            confirmation_code: code.map(str::to_string),
            flights: flights
                .iter()
                .map(|(number, date)| FlightLeg {
                    number: number.to_string(),
                    date: date.to_string(),
                    route: None,
                })
                .collect(),
            confidence: 0.9,
        }
    }

    #[test]
    fn confirmation_identity_present_iff_code_present() {
        let c = candidate("Confirmation", "body");
        let with_code = fingerprint(&c, &extraction(Some("DJWNTF"), &[]));
        assert!(with_code.confirmation.is_some());

        let without_code = fingerprint(&c, &extraction(None, &[]));
        assert!(without_code.confirmation.is_none());
        assert!(!without_code.content.is_empty());
    }

    #[test]
    fn flight_order_does_not_affect_identity() {
        let c = candidate("Confirmation", "body");
        let forward = fingerprint(
            &c,
            &extraction(Some("DJWNTF"), &[("DL123", "2024-06-01"), ("DL456", "2024-06-01")]),
        );
        let reversed = fingerprint(
            &c,
            &extraction(Some("DJWNTF"), &[("DL456", "2024-06-01"), ("DL123", "2024-06-01")]),
        );
        assert_eq!(forward.confirmation, reversed.confirmation);
    }

    #[test]
    fn whitespace_and_case_do_not_affect_content_hash() {
        assert_eq!(
            content_hash("Your  Trip", "Flight DL123\non 2024-06-01"),
            content_hash("your trip", "flight   dl123 on 2024-06-01"),
        );
    }

    #[test]
    fn quoted_reply_and_signature_are_ignored() {
        let original = content_hash("Re: Trip", "See you there");
        let replied = content_hash(
            "Re: Trip",
            "See you there\nOn Mon, Jun 3, 2024 someone wrote:\n> earlier text\n> more\n-- \nSent from my phone",
        );
        assert_eq!(original, replied);
    }

    #[test]
    fn different_content_hashes_differently() {
        assert_ne!(
            content_hash("Trip A", "Flight DL123"),
            content_hash("Trip B", "Flight DL123"),
        );
    }

    #[test]
    fn identity_key_folds_airline_case_but_keeps_code() {
        let identity = ConfirmationIdentity {
            airline: "Delta".to_string(),
            code: "DJWNTF".to_string(),
            flights: BTreeSet::new(),
        };
        assert_eq!(identity.key(), "delta:DJWNTF");
    }
}
