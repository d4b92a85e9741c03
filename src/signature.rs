//! Airline signature table.
//!
//! One row per supported airline plus a generic fallback, walked in order by
//! the extractor with first match winning. New airlines are added by
//! appending a row, not by introducing new types.

/// Declarative match and extraction rules for one airline.
///
/// `sender_patterns` and `subject_patterns` are positive markers: the sender
/// must match one of the former and the subject one of the latter.
/// `negative_patterns` veto the match so that promotional mail from a real
/// airline domain is not mistaken for a booking confirmation.
#[derive(Debug, Clone, Copy)]
pub struct AirlineSignature {
    pub name: &'static str,
    pub sender_patterns: &'static [&'static str],
    pub subject_patterns: &'static [&'static str],
    pub negative_patterns: &'static [&'static str],
    /// Confirmation-code patterns, first capture group is the code. The code
    /// character class is deliberately case-sensitive; airlines issue
    /// uppercase references and this keeps ordinary words from matching.
    pub code_patterns: &'static [&'static str],
    /// Airline-specific flight patterns: captures (number, date, [route]).
    /// Empty slice means only the shared generic patterns apply.
    pub flight_patterns: &'static [&'static str],
}

/// Markers that veto a signature match. Checked against the subject.
pub const MARKETING_MARKERS: &[&str] = &[
    r"(?i)\d+\s*%\s*off",
    r"(?i)\bsale\b",
    r"(?i)\bdeals?\b",
    r"(?i)special offer",
    r"(?i)\bnewsletter\b",
    r"(?i)\bpromotion(?:al)?\b",
    r"(?i)earn (?:miles|points)",
    r"(?i)last chance",
    r"(?i)limited time",
    r"(?i)flash (?:sale|fare)",
];

/// Shared confirmation-code patterns for airlines without a known
/// house format. Codes are 5-7 uppercase alphanumerics.
const CODE_COMMON: &[&str] = &[
    r"(?i:confirmation|booking reference|record locator|reservation)\s*(?i:code|number|no\.?)?\s*[:#]?\s*\b([A-Z0-9]{5,7})\b",
    r"\bPNR\s*[:#]?\s*\b([A-Z0-9]{5,7})\b",
];

/// Six-character record locator preceded by a confirmation keyword, the
/// format shared by the large US carriers.
const CODE_SIX_ALNUM: &[&str] = &[
    r"(?i:confirmation|record locator|booking reference)\s*(?i:code|number|no\.?)?\s*[:#]?\s*\b([A-Z0-9]{6})\b",
];

/// American Airlines uses letter-only record locators.
const CODE_SIX_ALPHA: &[&str] = &[
    r"(?i:confirmation|record locator)\s*(?i:code|number|no\.?)?\s*[:#]?\s*\b([A-Z]{6})\b",
];

/// Flight patterns shared by all signatures, applied when the airline's own
/// patterns produce nothing. Captures (number, date, [route]).
pub const GENERIC_FLIGHT_PATTERNS: &[&str] = &[
    // "DL123 2024-06-01", optionally followed by a "JFK-LAX" route
    r"\b([A-Z]{2}\s?\d{1,4})[,:]?\s+(\d{4}-\d{2}-\d{2})(?:\s+([A-Z]{3}\s*(?:-|to)\s*[A-Z]{3}))?",
    // "Flight DL123 ... 2024-06-01" with up to a line of text between
    r"(?i:flight)\s*#?\s*\b([A-Z]{2}\s?\d{1,4})\b[^\r\n]{0,60}?(\d{4}-\d{2}-\d{2})",
    // "DL123 Jun 1, 2024" style dates
    r"\b([A-Z]{2}\s?\d{1,4})[,:]?\s+((?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4})",
];

macro_rules! carrier_flights {
    ($prefix:literal) => {
        &[
            concat!(
                r"\b(",
                $prefix,
                r"\s?\d{1,4})[,:]?\s+(\d{4}-\d{2}-\d{2})(?:\s+([A-Z]{3}\s*(?:-|to)\s*[A-Z]{3}))?"
            ),
            concat!(
                r"\b(",
                $prefix,
                r"\s?\d{1,4})[,:]?\s+((?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4})"
            ),
        ]
    };
}

/// The signature table, specific airlines before the generic fallback.
pub const SIGNATURES: &[AirlineSignature] = &[
    AirlineSignature {
        name: "JetBlue",
        sender_patterns: &[r"(?i)jetblue", r"(?i)@.*jetblue\.com"],
        subject_patterns: &[
            r"(?i)booking confirmation",
            r"(?i)itinerary",
            r"(?i)flight confirmation",
        ],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_SIX_ALNUM,
        flight_patterns: carrier_flights!("B6"),
    },
    AirlineSignature {
        name: "Delta",
        sender_patterns: &[r"(?i)delta", r"(?i)@.*delta\.com"],
        subject_patterns: &[
            r"(?i)ereceipt",
            r"(?i)trip confirmation",
            r"(?i)itinerary",
            r"(?i)booking confirmation",
            r"(?i)confirmation",
        ],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_SIX_ALNUM,
        flight_patterns: carrier_flights!("DL"),
    },
    AirlineSignature {
        name: "United",
        sender_patterns: &[r"(?i)united", r"(?i)@.*united\.com"],
        subject_patterns: &[
            r"(?i)confirmation",
            r"(?i)itinerary",
            r"(?i)trip details",
        ],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_SIX_ALNUM,
        flight_patterns: carrier_flights!("UA"),
    },
    AirlineSignature {
        name: "American Airlines",
        sender_patterns: &[
            r"(?i)american",
            r"(?i)@.*aa\.com",
            r"(?i)americanairlines",
        ],
        subject_patterns: &[
            r"(?i)reservation",
            r"(?i)confirmation",
            r"(?i)itinerary",
        ],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_SIX_ALPHA,
        flight_patterns: carrier_flights!("AA"),
    },
    AirlineSignature {
        name: "Southwest",
        sender_patterns: &[r"(?i)southwest", r"(?i)@.*southwest\.com"],
        subject_patterns: &[r"(?i)confirmation", r"(?i)itinerary", r"(?i)trip"],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_SIX_ALNUM,
        flight_patterns: carrier_flights!("WN"),
    },
    AirlineSignature {
        name: "Alaska Airlines",
        sender_patterns: &[r"(?i)alaska", r"(?i)@.*alaskaair\.com"],
        subject_patterns: &[r"(?i)confirmation", r"(?i)itinerary"],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_SIX_ALNUM,
        flight_patterns: carrier_flights!("AS"),
    },
    AirlineSignature {
        name: "Spirit",
        sender_patterns: &[r"(?i)spirit", r"(?i)@.*spirit\.com"],
        subject_patterns: &[r"(?i)confirmation", r"(?i)itinerary"],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_COMMON,
        flight_patterns: carrier_flights!("NK"),
    },
    AirlineSignature {
        name: "Frontier",
        sender_patterns: &[r"(?i)frontier", r"(?i)@.*flyfrontier\.com"],
        subject_patterns: &[r"(?i)confirmation", r"(?i)itinerary"],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_COMMON,
        flight_patterns: carrier_flights!("F9"),
    },
    AirlineSignature {
        name: "Hawaiian Airlines",
        sender_patterns: &[r"(?i)hawaiian", r"(?i)@.*hawaiianairlines\.com"],
        subject_patterns: &[r"(?i)confirmation", r"(?i)itinerary"],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_COMMON,
        flight_patterns: carrier_flights!("HA"),
    },
    AirlineSignature {
        name: "Air Canada",
        sender_patterns: &[r"(?i)aircanada", r"(?i)@.*aircanada\.com"],
        subject_patterns: &[r"(?i)confirmation", r"(?i)itinerary"],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_COMMON,
        flight_patterns: carrier_flights!("AC"),
    },
    AirlineSignature {
        name: "British Airways",
        sender_patterns: &[
            r"(?i)british",
            r"(?i)@.*britishairways\.com",
            r"(?i)@.*ba\.com",
        ],
        subject_patterns: &[
            r"(?i)confirmation",
            r"(?i)booking",
            r"(?i)itinerary",
        ],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_COMMON,
        flight_patterns: carrier_flights!("BA"),
    },
    AirlineSignature {
        name: "Lufthansa",
        sender_patterns: &[r"(?i)lufthansa", r"(?i)@.*lufthansa\.com"],
        subject_patterns: &[r"(?i)confirmation", r"(?i)booking"],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_COMMON,
        flight_patterns: carrier_flights!("LH"),
    },
    AirlineSignature {
        name: "Emirates",
        sender_patterns: &[r"(?i)emirates", r"(?i)@.*emirates\.com"],
        subject_patterns: &[
            r"(?i)confirmation",
            r"(?i)booking",
            r"(?i)itinerary",
        ],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_COMMON,
        flight_patterns: carrier_flights!("EK"),
    },
    AirlineSignature {
        name: "KLM",
        sender_patterns: &[r"(?i)klm", r"(?i)@.*klm\.com"],
        subject_patterns: &[
            r"(?i)confirmation",
            r"(?i)booking",
            r"(?i)itinerary",
        ],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_COMMON,
        flight_patterns: carrier_flights!("KL"),
    },
    AirlineSignature {
        name: "Air France",
        sender_patterns: &[r"(?i)airfrance", r"(?i)@.*airfrance\.com"],
        subject_patterns: &[
            r"(?i)confirmation",
            r"(?i)booking",
            r"(?i)itinerary",
        ],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_COMMON,
        flight_patterns: carrier_flights!("AF"),
    },
    AirlineSignature {
        name: "Qantas",
        sender_patterns: &[r"(?i)qantas", r"(?i)@.*qantas\.com"],
        subject_patterns: &[
            r"(?i)confirmation",
            r"(?i)booking",
            r"(?i)itinerary",
        ],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_COMMON,
        flight_patterns: carrier_flights!("QF"),
    },
    AirlineSignature {
        name: "Singapore Airlines",
        sender_patterns: &[r"(?i)singapore", r"(?i)@.*singaporeair\.com"],
        subject_patterns: &[
            r"(?i)confirmation",
            r"(?i)booking",
            r"(?i)itinerary",
        ],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_COMMON,
        flight_patterns: carrier_flights!("SQ"),
    },
    // Generic fallback: any sender, flight-specific subject required.
    AirlineSignature {
        name: "Generic",
        sender_patterns: &[r".*"],
        subject_patterns: &[
            r"(?i)flight.*confirmation",
            r"(?i)booking.*confirmation.*flight",
            r"(?i)e-?ticket",
            r"(?i)itinerary.*flight",
            r"(?i)your.*trip.*confirmation",
            r"(?i)airline.*confirmation",
        ],
        negative_patterns: MARKETING_MARKERS,
        code_patterns: CODE_COMMON,
        flight_patterns: &[],
    },
];
