//! Flight summary report: forwarded bookings grouped by month, rendered as
//! plain text or JSON from the history store.

use crate::history::HistoryStore;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => anyhow::bail!("unknown report format '{other}' (expected text or json)"),
        }
    }
}

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"(\d{4})-(\d{2})-\d{2}").unwrap();
    static ref NAMED_DATE: Regex =
        Regex::new(r"(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s+\d{1,2},?\s+(\d{4})").unwrap();
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// (year, month, display name) for one flight identifier; flights whose
/// date cannot be read sort into a final "Unknown" bucket.
fn month_of(flight: &str) -> (i32, u32, String) {
    if let Some(caps) = ISO_DATE.captures(flight) {
        let year: i32 = caps[1].parse().unwrap_or(9999);
        let month: u32 = caps[2].parse().unwrap_or(0);
        if (1..=12).contains(&month) {
            let name = MONTH_NAMES[month as usize - 1];
            return (year, month, format!("{name} {year}"));
        }
    }
    if let Some(caps) = NAMED_DATE.captures(flight) {
        let year: i32 = caps[2].parse().unwrap_or(9999);
        if let Some(month) = MONTH_NAMES
            .iter()
            .position(|name| name.starts_with(&caps[1]))
        {
            let name = MONTH_NAMES[month];
            return (year, month as u32 + 1, format!("{name} {year}"));
        }
    }
    (9999, 0, "Unknown".to_string())
}

struct ReportLine {
    airline: String,
    code: String,
    flight: String,
}

fn grouped(store: &HistoryStore) -> BTreeMap<(i32, u32, String), Vec<ReportLine>> {
    let mut months: BTreeMap<(i32, u32, String), Vec<ReportLine>> = BTreeMap::new();

    for (key, record) in store.confirmation_records() {
        let (airline, code) = key.split_once(':').unwrap_or((key.as_str(), ""));
        for flight in &record.flights {
            months.entry(month_of(flight)).or_default().push(ReportLine {
                airline: airline.to_string(),
                code: code.to_string(),
                flight: flight.clone(),
            });
        }
    }

    for lines in months.values_mut() {
        lines.sort_by(|a, b| a.flight.cmp(&b.flight));
    }
    months
}

pub fn render(store: &HistoryStore, format: ReportFormat) -> String {
    let months = grouped(store);

    match format {
        ReportFormat::Text => {
            let mut out = String::from("Flight summary\n==============\n");
            if months.is_empty() {
                out.push_str("\nNo forwarded flights on record.\n");
                return out;
            }
            for ((_, _, name), lines) in &months {
                out.push_str(&format!("\n{name}\n"));
                for line in lines {
                    out.push_str(&format!(
                        "  {} {}: {}\n",
                        line.airline, line.code, line.flight
                    ));
                }
            }
            out
        }
        ReportFormat::Json => {
            let months: Vec<_> = months
                .iter()
                .map(|((_, _, name), lines)| {
                    json!({
                        "month": name,
                        "flights": lines
                            .iter()
                            .map(|line| {
                                json!({
                                    "airline": line.airline,
                                    "code": line.code,
                                    "flight": line.flight,
                                })
                            })
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            serde_json::to_string_pretty(&json!({ "months": months }))
                .unwrap_or_else(|_| "{}".to_string())
        }
    }
}
