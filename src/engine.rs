//! Decision engine.
//!
//! Orchestrates extractor, fingerprinter, and history store into a per-email
//! verdict and drives the forward/record cycle for a batch. The store is
//! injected, never ambient, so tests run against an in-memory store.

use crate::extractor::Extractor;
use crate::fingerprint::{self, Fingerprint};
use crate::history::HistoryStore;
use crate::mailbox::ForwardingSender;
use crate::message::CandidateEmail;

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Forward,
    SkipDuplicate,
    SkipNotFlight,
}

/// Verdict for one candidate, with the signals that produced it.
#[derive(Debug, Clone)]
pub struct Decision {
    pub verdict: Verdict,
    pub airline: Option<String>,
    pub fingerprint: Option<Fingerprint>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub scanned: usize,
    /// Candidates classified as flight confirmations (forwarded or duplicate).
    pub flights_found: usize,
    pub forwarded: usize,
    pub duplicates: usize,
    pub not_flight: usize,
    pub send_failures: usize,
    pub interrupted: bool,
}

pub struct DecisionEngine {
    extractor: Extractor,
    store: HistoryStore,
    dry_run: bool,
}

impl DecisionEngine {
    pub fn new(extractor: Extractor, store: HistoryStore, dry_run: bool) -> Self {
        DecisionEngine {
            extractor,
            store,
            dry_run,
        }
    }

    /// Decide one candidate. Read-only: the history update belongs to
    /// `mark_forwarded`, which runs only after the sender reports success.
    pub fn decide(&self, candidate: &CandidateEmail) -> Decision {
        let Some(extraction) = self.extractor.classify(candidate) else {
            return Decision {
                verdict: Verdict::SkipNotFlight,
                airline: None,
                fingerprint: None,
                reason: "no airline signature matched".to_string(),
            };
        };

        let airline = extraction.airline.clone();
        let fp = fingerprint::fingerprint(candidate, &extraction);

        let (verdict, reason) = if let Some(identity) = &fp.confirmation {
            match self.store.lookup_confirmation(&identity.key()) {
                // The change check runs before the duplicate check so a
                // legitimate itinerary change is never suppressed.
                Some(record) if !same_flight_set(&record.flights, identity) => (
                    Verdict::Forward,
                    format!(
                        "booking change for {} (flights {:?} -> {:?})",
                        identity.key(),
                        record.flights,
                        identity.flights
                    ),
                ),
                Some(_) => (
                    Verdict::SkipDuplicate,
                    format!("already forwarded booking {}", identity.key()),
                ),
                None => (
                    Verdict::Forward,
                    format!("new booking {}", identity.key()),
                ),
            }
        } else if self.store.lookup_content(&fp.content).is_some() {
            (
                Verdict::SkipDuplicate,
                "identical content already forwarded".to_string(),
            )
        } else {
            (
                Verdict::Forward,
                "new flight email without confirmation code".to_string(),
            )
        };

        Decision {
            verdict,
            airline: Some(airline),
            fingerprint: Some(fp),
            reason,
        }
    }

    /// Record a decided FORWARD in the history. Call only after the sender
    /// reported success; dry runs never reach this.
    pub fn mark_forwarded(
        &mut self,
        decision: &Decision,
        candidate: &CandidateEmail,
    ) -> anyhow::Result<()> {
        let Some(fp) = &decision.fingerprint else {
            anyhow::bail!("cannot record a candidate that was never fingerprinted");
        };
        self.store.record(fp, &candidate.id, Utc::now())
    }

    /// Process a batch sequentially. The interrupt flag is honored at
    /// candidate boundaries only, so no decision is ever applied partially.
    pub fn process_batch(
        &mut self,
        candidates: &[CandidateEmail],
        sender: &mut dyn ForwardingSender,
        destination: &str,
        interrupted: &AtomicBool,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        for candidate in candidates {
            if interrupted.load(Ordering::SeqCst) {
                log::info!("Interrupted; stopping before {}", candidate.id);
                summary.interrupted = true;
                break;
            }
            summary.scanned += 1;

            let decision = self.decide(candidate);
            match decision.verdict {
                Verdict::SkipNotFlight => {
                    summary.not_flight += 1;
                    log::debug!("{}: skipped ({})", candidate.id, decision.reason);
                }
                Verdict::SkipDuplicate => {
                    summary.flights_found += 1;
                    summary.duplicates += 1;
                    log::info!("{}: duplicate ({})", candidate.id, decision.reason);
                }
                Verdict::Forward => {
                    summary.flights_found += 1;
                    let airline = decision.airline.as_deref().unwrap_or("unknown");
                    if self.dry_run {
                        summary.forwarded += 1;
                        log::info!(
                            "[DRY RUN] {}: would forward {airline} booking ({})",
                            candidate.id,
                            decision.reason
                        );
                        continue;
                    }

                    match sender.forward(candidate, destination) {
                        Ok(()) => {
                            summary.forwarded += 1;
                            log::info!(
                                "{}: forwarded {airline} booking ({})",
                                candidate.id,
                                decision.reason
                            );
                            if let Err(e) = self.mark_forwarded(&decision, candidate) {
                                log::error!(
                                    "{}: forwarded but history update failed: {e}",
                                    candidate.id
                                );
                            }
                        }
                        Err(e) => {
                            // Not recorded, so the next run retries it.
                            summary.send_failures += 1;
                            log::error!("{}: delivery failed: {e}", candidate.id);
                        }
                    }
                }
            }
        }

        summary
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }
}

/// Flight-set equality: set inequality on the sorted leg identifiers counts
/// as a booking change, subset or not.
fn same_flight_set(
    recorded: &[String],
    identity: &crate::fingerprint::ConfirmationIdentity,
) -> bool {
    recorded.len() == identity.flights.len()
        && recorded.iter().all(|leg| identity.flights.contains(leg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(dry_run: bool) -> DecisionEngine {
        DecisionEngine::new(Extractor::new().unwrap(), HistoryStore::in_memory(), dry_run)
    }

    fn delta_confirmation(id: &str, legs: &str) -> CandidateEmail {
        CandidateEmail {
            id: id.to_string(),
            sender: "notify@delta.com".to_string(),
            subject: "Your Delta confirmation DJWNTF".to_string(),
            body: legs.to_string(),
            received: None,
            raw: b"raw".to_vec(),
        }
    }

    fn codeless_flight(id: &str, body: &str) -> CandidateEmail {
        CandidateEmail {
            id: id.to_string(),
            sender: "noreply@tinyair.example".to_string(),
            subject: "Your flight confirmation".to_string(),
            body: body.to_string(),
            received: None,
            raw: b"raw".to_vec(),
        }
    }

    /// Sender double for tests: records calls, optionally fails.
    struct TestSender {
        delivered: Vec<String>,
        fail: bool,
    }

    impl TestSender {
        fn new() -> Self {
            TestSender {
                delivered: Vec::new(),
                fail: false,
            }
        }
    }

    impl ForwardingSender for TestSender {
        fn forward(&mut self, candidate: &CandidateEmail, _destination: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp unavailable");
            }
            self.delivered.push(candidate.id.clone());
            Ok(())
        }
    }

    fn run(
        engine: &mut DecisionEngine,
        sender: &mut TestSender,
        candidates: &[CandidateEmail],
    ) -> RunSummary {
        let flag = AtomicBool::new(false);
        engine.process_batch(candidates, sender, "track@my.flightyapp.com", &flag)
    }

    #[test]
    fn delta_scenario_forward_then_duplicate_then_change() {
        let mut engine = engine(false);
        let mut sender = TestSender::new();

        let original = delta_confirmation("INBOX:1.eml", "DL123 2024-06-01\nDL456 2024-06-01");
        let decision = engine.decide(&original);
        assert_eq!(decision.verdict, Verdict::Forward);
        assert_eq!(decision.airline.as_deref(), Some("Delta"));

        run(&mut engine, &mut sender, std::slice::from_ref(&original));

        // Re-delivered copy of the same booking.
        let copy = delta_confirmation("INBOX:2.eml", "DL123 2024-06-01\nDL456 2024-06-01");
        assert_eq!(engine.decide(&copy).verdict, Verdict::SkipDuplicate);

        // Same code, one leg replaced: booking change, must forward.
        let changed = delta_confirmation("INBOX:3.eml", "DL789 2024-06-01\nDL456 2024-06-01");
        let decision = engine.decide(&changed);
        assert_eq!(decision.verdict, Verdict::Forward);
        assert!(decision.reason.contains("booking change"));
    }

    #[test]
    fn decide_is_idempotent_without_history_update() {
        let engine = engine(false);
        let candidate = delta_confirmation("INBOX:1.eml", "DL123 2024-06-01");

        let first = engine.decide(&candidate);
        let second = engine.decide(&candidate);
        assert_eq!(first.verdict, second.verdict);
        assert_eq!(first.reason, second.reason);
    }

    #[test]
    fn no_double_forward_for_identical_bookings() {
        let mut engine = engine(false);
        let mut sender = TestSender::new();

        let batch: Vec<CandidateEmail> = (1..=4)
            .map(|i| delta_confirmation(&format!("INBOX:{i}.eml"), "DL123 2024-06-01"))
            .collect();
        let summary = run(&mut engine, &mut sender, &batch);

        assert_eq!(summary.forwarded, 1);
        assert_eq!(summary.duplicates, 3);
        assert_eq!(sender.delivered, vec!["INBOX:1.eml"]);
    }

    #[test]
    fn content_fallback_dedupes_codeless_emails() {
        let mut engine = engine(false);
        let mut sender = TestSender::new();

        let first = codeless_flight("INBOX:1.eml", "Departure at 09:00, gate B12.");
        let second = codeless_flight("INBOX:2.eml", "Departure at 09:00, gate B12.");
        let summary = run(&mut engine, &mut sender, &[first, second]);

        assert_eq!(summary.forwarded, 1);
        assert_eq!(summary.duplicates, 1);

        // Any difference in content is a new email, not a partial match.
        let different = codeless_flight("INBOX:3.eml", "Departure at 10:30, gate B12.");
        assert_eq!(engine.decide(&different).verdict, Verdict::Forward);
    }

    #[test]
    fn non_flight_email_skips_without_history_update() {
        let mut engine = engine(false);
        let mut sender = TestSender::new();

        let candidate = CandidateEmail {
            id: "INBOX:1.eml".to_string(),
            sender: "friend@example.com".to_string(),
            subject: "Lunch tomorrow?".to_string(),
            body: "Noon at the usual place?".to_string(),
            received: None,
            raw: b"raw".to_vec(),
        };
        let summary = run(&mut engine, &mut sender, std::slice::from_ref(&candidate));

        assert_eq!(summary.not_flight, 1);
        assert_eq!(summary.forwarded, 0);
        assert!(sender.delivered.is_empty());
        assert!(engine.store().is_empty());
    }

    #[test]
    fn reset_makes_duplicates_forward_again() {
        let mut engine = engine(false);
        let mut sender = TestSender::new();

        let candidate = delta_confirmation("INBOX:1.eml", "DL123 2024-06-01");
        run(&mut engine, &mut sender, std::slice::from_ref(&candidate));
        assert_eq!(engine.decide(&candidate).verdict, Verdict::SkipDuplicate);

        engine.store.reset().unwrap();
        assert_eq!(engine.decide(&candidate).verdict, Verdict::Forward);
    }

    #[test]
    fn dry_run_reports_forward_but_touches_nothing() {
        let mut engine = engine(true);
        let mut sender = TestSender::new();

        let candidate = delta_confirmation("INBOX:1.eml", "DL123 2024-06-01");
        let summary = run(&mut engine, &mut sender, std::slice::from_ref(&candidate));

        assert_eq!(summary.forwarded, 1);
        assert!(sender.delivered.is_empty());
        assert!(engine.store().is_empty());

        // Still a FORWARD verdict on the next run: nothing was recorded.
        assert_eq!(engine.decide(&candidate).verdict, Verdict::Forward);
    }

    #[test]
    fn send_failure_leaves_booking_eligible_for_retry() {
        let mut engine = engine(false);
        let mut sender = TestSender::new();
        sender.fail = true;

        let candidate = delta_confirmation("INBOX:1.eml", "DL123 2024-06-01");
        let summary = run(&mut engine, &mut sender, std::slice::from_ref(&candidate));
        assert_eq!(summary.send_failures, 1);
        assert_eq!(summary.forwarded, 0);
        assert!(engine.store().is_empty());

        sender.fail = false;
        let summary = run(&mut engine, &mut sender, std::slice::from_ref(&candidate));
        assert_eq!(summary.forwarded, 1);
    }

    #[test]
    fn interrupt_stops_at_candidate_boundary() {
        let mut engine = engine(false);
        let mut sender = TestSender::new();
        let flag = AtomicBool::new(true);

        let batch = vec![delta_confirmation("INBOX:1.eml", "DL123 2024-06-01")];
        let summary =
            engine.process_batch(&batch, &mut sender, "track@my.flightyapp.com", &flag);

        assert!(summary.interrupted);
        assert_eq!(summary.scanned, 0);
        assert!(engine.store().is_empty());
    }
}
