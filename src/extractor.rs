use crate::message::CandidateEmail;
use crate::signature::{AirlineSignature, GENERIC_FLIGHT_PATTERNS, SIGNATURES};

use regex::Regex;
use std::collections::HashMap;

/// One flight leg pulled out of a confirmation body.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlightLeg {
    /// Carrier code plus number, normalized to uppercase without spaces.
    pub number: String,
    /// Date string as printed in the email.
    pub date: String,
    pub route: Option<String>,
}

impl FlightLeg {
    /// Stable identifier used for flight-set comparison and history records.
    pub fn id(&self) -> String {
        match &self.route {
            Some(route) => format!("{} {} {}", self.number, self.date, route),
            None => format!("{} {}", self.number, self.date),
        }
    }
}

/// Outcome of classifying one candidate against the signature table.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub airline: String,
    /// Normalized (uppercase, no whitespace) confirmation code, when one
    /// could be parsed. Absence is not an error.
    pub confirmation_code: Option<String>,
    /// Legs in order of appearance; multi-leg and round-trip bookings keep
    /// every leg.
    pub flights: Vec<FlightLeg>,
    pub confidence: f32,
}

/// Walks the airline signature table in priority order and extracts booking
/// details from the first matching signature. All patterns are compiled once
/// at construction.
pub struct Extractor {
    signatures: &'static [AirlineSignature],
    compiled_patterns: HashMap<&'static str, Regex>,
}

impl Extractor {
    pub fn new() -> anyhow::Result<Self> {
        let mut compiled_patterns = HashMap::new();
        for sig in SIGNATURES {
            for &pattern in sig
                .sender_patterns
                .iter()
                .chain(sig.subject_patterns)
                .chain(sig.negative_patterns)
                .chain(sig.code_patterns)
                .chain(sig.flight_patterns)
            {
                compile_into(&mut compiled_patterns, pattern)?;
            }
        }
        for &pattern in GENERIC_FLIGHT_PATTERNS {
            compile_into(&mut compiled_patterns, pattern)?;
        }

        Ok(Extractor {
            signatures: SIGNATURES,
            compiled_patterns,
        })
    }

    /// Classify a candidate. `None` means no signature matched, the terminal
    /// not-a-flight-email case.
    pub fn classify(&self, candidate: &CandidateEmail) -> Option<ExtractionResult> {
        let signature = self.match_signature(candidate)?;

        let confirmation_code = self.extract_code(signature, candidate);
        let flights = self.extract_flights(signature, &candidate.body);

        let mut confidence: f32 = if signature.name == "Generic" { 0.6 } else { 0.9 };
        if confirmation_code.is_some() {
            confidence += 0.05;
        }
        if !flights.is_empty() {
            confidence += 0.05;
        }

        log::debug!(
            "Classified '{}' as {} (code: {:?}, {} legs, confidence {:.2})",
            candidate.subject,
            signature.name,
            confirmation_code,
            flights.len(),
            confidence
        );

        Some(ExtractionResult {
            airline: signature.name.to_string(),
            confirmation_code,
            flights,
            confidence: confidence.min(1.0),
        })
    }

    /// First signature whose positive markers match and whose negative
    /// markers do not. Specific airlines come before the generic fallback,
    /// so a generic pattern can never shadow an airline row.
    fn match_signature(&self, candidate: &CandidateEmail) -> Option<&'static AirlineSignature> {
        self.signatures.iter().find(|sig| {
            let sender_match = sig
                .sender_patterns
                .iter()
                .any(|p| self.matches(p, &candidate.sender));
            let subject_match = sig
                .subject_patterns
                .iter()
                .any(|p| self.matches(p, &candidate.subject));
            if !sender_match || !subject_match {
                return false;
            }

            let negative = sig
                .negative_patterns
                .iter()
                .find(|p| self.matches(p, &candidate.subject));
            if let Some(marker) = negative {
                log::debug!(
                    "Signature {} vetoed by marketing marker {marker:?} on '{}'",
                    sig.name,
                    candidate.subject
                );
                return false;
            }
            true
        })
    }

    /// Run the airline's code patterns over subject then body; the first
    /// capture wins. Whitespace is stripped and the code forced uppercase.
    fn extract_code(
        &self,
        signature: &AirlineSignature,
        candidate: &CandidateEmail,
    ) -> Option<String> {
        for pattern in signature.code_patterns {
            let Some(re) = self.compiled_patterns.get(*pattern) else {
                continue;
            };
            for text in [&candidate.subject, &candidate.body] {
                if let Some(caps) = re.captures(text) {
                    if let Some(code) = caps.get(1) {
                        return Some(normalize_code(code.as_str()));
                    }
                }
            }
        }
        None
    }

    /// Airline-specific flight patterns first; when they produce nothing the
    /// shared generic patterns run. Legs keep their order of appearance,
    /// duplicates dropped.
    fn extract_flights(&self, signature: &AirlineSignature, body: &str) -> Vec<FlightLeg> {
        let specific = self.run_flight_patterns(signature.flight_patterns, body);
        if !specific.is_empty() {
            return specific;
        }
        self.run_flight_patterns(GENERIC_FLIGHT_PATTERNS, body)
    }

    fn run_flight_patterns(&self, patterns: &[&'static str], body: &str) -> Vec<FlightLeg> {
        let mut legs: Vec<FlightLeg> = Vec::new();
        for pattern in patterns {
            let Some(re) = self.compiled_patterns.get(*pattern) else {
                continue;
            };
            for caps in re.captures_iter(body) {
                let (Some(number), Some(date)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };
                let leg = FlightLeg {
                    number: number.as_str().replace(char::is_whitespace, "").to_uppercase(),
                    date: date.as_str().trim().to_string(),
                    route: caps.get(3).map(|r| r.as_str().trim().to_string()),
                };
                if !legs.contains(&leg) {
                    legs.push(leg);
                }
            }
        }
        legs
    }

    fn matches(&self, pattern: &str, text: &str) -> bool {
        self.compiled_patterns
            .get(pattern)
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    }
}

fn compile_into(
    patterns: &mut HashMap<&'static str, Regex>,
    pattern: &'static str,
) -> anyhow::Result<()> {
    if !patterns.contains_key(pattern) {
        let regex = Regex::new(pattern)
            .map_err(|e| anyhow::anyhow!("Invalid signature pattern '{}': {}", pattern, e))?;
        patterns.insert(pattern, regex);
    }
    Ok(())
}

fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}
