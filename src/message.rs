use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use regex::Regex;

/// One mailbox message under evaluation. Constructed per message from the
/// raw RFC 822 bytes and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CandidateEmail {
    /// Mailbox-unique identifier, e.g. `INBOX:1042.eml`.
    pub id: String,
    /// Bare sender address, display name stripped.
    pub sender: String,
    pub subject: String,
    /// Plain text body; HTML messages are stripped to text.
    pub body: String,
    pub received: Option<DateTime<Utc>>,
    /// Original message bytes, forwarded verbatim on a FORWARD verdict.
    pub raw: Vec<u8>,
}

lazy_static! {
    static ref HTML_DROP: Regex =
        Regex::new(r"(?is)<(style|script|head)\b.*?</(style|script|head)>").unwrap();
    static ref HTML_BREAK: Regex = Regex::new(r"(?i)<(br|/p|/div|/tr|/li|/h[1-6])\s*/?>").unwrap();
    static ref HTML_TAG: Regex = Regex::new(r"(?s)<[^>]+>").unwrap();
}

/// Parse raw message bytes into a candidate. Header decoding, charset
/// handling, and multipart traversal are delegated to `mailparse`; a message
/// it cannot parse is an error the caller downgrades to a skipped candidate.
pub fn parse_candidate(raw: &[u8], id: String) -> anyhow::Result<CandidateEmail> {
    let mail = mailparse::parse_mail(raw)?;

    let sender = mail
        .headers
        .get_first_value("From")
        .map(|from| extract_address(&from))
        .unwrap_or_default();
    let subject = mail.headers.get_first_value("Subject").unwrap_or_default();
    let received = mail
        .headers
        .get_first_value("Date")
        .and_then(|date| mailparse::dateparse(&date).ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    let (plain, html) = best_bodies(&mail);
    let body = if !plain.is_empty() {
        plain
    } else {
        strip_html(&html)
    };

    Ok(CandidateEmail {
        id,
        sender,
        subject,
        body,
        received,
        raw: raw.to_vec(),
    })
}

/// Extract the bare address from a header like `Name <email@domain.com>`.
pub fn extract_address(header: &str) -> String {
    if let Some(start) = header.rfind('<') {
        if let Some(end) = header.rfind('>') {
            if start < end {
                return header[start + 1..end].trim().to_string();
            }
        }
    }
    header.trim().to_string()
}

/// Walk the MIME tree collecting the largest plain and HTML bodies. Some
/// airlines send several text parts; the largest one carries the itinerary.
/// Attachment parts are skipped.
fn best_bodies(mail: &ParsedMail) -> (String, String) {
    let mut plain = String::new();
    let mut html = String::new();
    collect_parts(mail, &mut plain, &mut html);
    (plain, html)
}

fn collect_parts(part: &ParsedMail, plain: &mut String, html: &mut String) {
    if part.subparts.is_empty() {
        if part.get_content_disposition().disposition == DispositionType::Attachment {
            return;
        }
        let text = match part.get_body() {
            Ok(text) => text,
            Err(e) => {
                log::debug!("Undecodable message part skipped: {e}");
                return;
            }
        };
        match part.ctype.mimetype.as_str() {
            "text/plain" => {
                if text.len() > plain.len() {
                    *plain = text;
                }
            }
            "text/html" => {
                if text.len() > html.len() {
                    *html = text;
                }
            }
            _ => {}
        }
    } else {
        for sub in &part.subparts {
            collect_parts(sub, plain, html);
        }
    }
}

/// Reduce an HTML body to the text the recipient reads: drop style/script
/// blocks, turn structural tags into line breaks, strip the rest, and decode
/// entities.
pub fn strip_html(html: &str) -> String {
    let without_blocks = HTML_DROP.replace_all(html, " ");
    let with_breaks = HTML_BREAK.replace_all(&without_blocks, "\n");
    let stripped = HTML_TAG.replace_all(&with_breaks, " ");
    let decoded = html_escape::decode_html_entities(stripped.as_ref()).into_owned();

    decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eml(from: &str, subject: &str, body: &str) -> Vec<u8> {
        format!(
            "From: {from}\r\nTo: me@example.com\r\nSubject: {subject}\r\n\
             Date: Sat, 01 Jun 2024 10:00:00 +0000\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\r\n{body}"
        )
        .into_bytes()
    }

    #[test]
    fn parses_plain_text_message() {
        let raw = eml(
            "Delta Air Lines <notify@delta.com>",
            "Your Delta confirmation DJWNTF",
            "Flight DL123 2024-06-01",
        );
        let candidate = parse_candidate(&raw, "INBOX:1.eml".to_string()).unwrap();
        assert_eq!(candidate.sender, "notify@delta.com");
        assert_eq!(candidate.subject, "Your Delta confirmation DJWNTF");
        assert!(candidate.body.contains("DL123"));
        assert!(candidate.received.is_some());
    }

    #[test]
    fn html_body_is_stripped_to_text() {
        let raw = format!(
            "From: notify@delta.com\r\nSubject: Itinerary\r\n\
             Content-Type: text/html; charset=utf-8\r\n\r\n\
             <html><head><style>p {{ color: red; }}</style></head>\
             <body><p>Flight DL123</p><p>2024-06-01 JFK-LAX</p></body></html>"
        )
        .into_bytes();
        let candidate = parse_candidate(&raw, "INBOX:2.eml".to_string()).unwrap();
        assert!(candidate.body.contains("Flight DL123"));
        assert!(candidate.body.contains("JFK-LAX"));
        assert!(!candidate.body.contains("color"));
        assert!(!candidate.body.contains('<'));
    }

    #[test]
    fn address_extraction_handles_bare_and_bracketed_forms() {
        assert_eq!(extract_address("notify@delta.com"), "notify@delta.com");
        assert_eq!(
            extract_address("\"Delta\" <notify@delta.com>"),
            "notify@delta.com"
        );
        assert_eq!(extract_address("Broken <notify@delta.com"), "Broken <notify@delta.com");
    }

    #[test]
    fn empty_message_yields_empty_fields() {
        let raw = b"From: someone@example.com\r\n\r\n".to_vec();
        let candidate = parse_candidate(&raw, "INBOX:3.eml".to_string()).unwrap();
        assert_eq!(candidate.subject, "");
        assert_eq!(candidate.body, "");
    }
}
