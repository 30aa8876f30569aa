//! Email extractor.
//!
//! Handles RFC 822 style messages: header block (with folded continuation
//! lines), blank line, body. For multipart messages the first `text/plain`
//! part is used; `base64` and `quoted-printable` transfer encodings are
//! decoded.

use async_trait::async_trait;
use base64::Engine;
use conduit_core::{ActionSuggestion, ClassificationResult, Extraction, JsonMap};
use conduit_runtime::Extractor;
use regex::Regex;
use serde_json::json;
use std::borrow::Cow;
use std::sync::LazyLock;
use uuid::Uuid;

pub const SOURCE: &str = "email_agent";

const SUMMARY_CHARS: usize = 200;

const URGENT_KEYWORDS: [&str; 4] = ["urgent", "asap", "immediately", "as soon as possible"];

/// Headers whose presence marks a leading block as an email header block.
pub(crate) const KNOWN_HEADERS: [&str; 10] = [
    "from",
    "to",
    "subject",
    "date",
    "cc",
    "message-id",
    "in-reply-to",
    "reply-to",
    "mime-version",
    "content-type",
];

static RE_THREATENING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(lawyers?|attorney|legal action|lawsuit|sue|or else|report you)\b").unwrap()
});
static RE_ANGRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(angry|furious|outraged|unacceptable|ridiculous|terrible|worst|disgusted)\b|!!!")
        .unwrap()
});
static RE_SPAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(unsubscribe|click here|winner|free money|limited time offer|congratulations)\b")
        .unwrap()
});

#[derive(Debug, Default)]
pub struct EmailExtractor;

impl EmailExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for EmailExtractor {
    async fn extract(
        &self,
        raw: &[u8],
        _metadata: &ClassificationResult,
    ) -> anyhow::Result<Extraction> {
        let message = Message::parse(&String::from_utf8_lossy(raw));

        let sender = message.header("From").unwrap_or_default();
        let subject = message.header("Subject").unwrap_or_default();
        let body = message.text();

        let urgency = urgency(subject, &body);
        let tone = tone(&body);
        let thread_id = match message.header("In-Reply-To") {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().simple().to_string(),
        };

        let action_suggestion = if urgency == "high" || tone == "angry" {
            ActionSuggestion::new("escalate", "crm")
        } else {
            ActionSuggestion::new("log", "database")
        };

        let mut data = JsonMap::new();
        data.insert("sender".to_string(), json!(sender));
        data.insert("subject".to_string(), json!(subject));
        data.insert("body_summary".to_string(), json!(summarize(&body)));
        data.insert("urgency".to_string(), json!(urgency));
        data.insert("tone".to_string(), json!(tone));
        data.insert("thread_id".to_string(), json!(thread_id));

        Ok(Extraction {
            source: SOURCE.to_string(),
            data,
            action_suggestion,
        })
    }
}

fn summarize(body: &str) -> String {
    body.trim().chars().take(SUMMARY_CHARS).collect()
}

fn urgency(subject: &str, body: &str) -> &'static str {
    let text = format!("{} {}", subject, body).to_lowercase();
    if URGENT_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        "high"
    } else {
        "normal"
    }
}

fn tone(body: &str) -> &'static str {
    if body.trim().is_empty() {
        return "polite";
    }
    if RE_THREATENING.is_match(body) {
        "threatening"
    } else if RE_ANGRY.is_match(body) {
        "angry"
    } else if RE_SPAM.is_match(body) {
        "spam"
    } else {
        "polite"
    }
}

/// A parsed message or MIME part.
#[derive(Debug, Clone, Default)]
pub(crate) struct Message {
    headers: Vec<(String, String)>,
    body: String,
}

impl Message {
    /// Split `text` into headers and body. Parsing stops at the first blank
    /// line or at the first line that is not a header.
    pub(crate) fn parse(text: &str) -> Self {
        let text: Cow<'_, str> = if text.contains('\r') {
            Cow::Owned(text.replace("\r\n", "\n"))
        } else {
            Cow::Borrowed(text)
        };
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            let content = line.trim_end_matches('\n');
            if content.is_empty() {
                offset += line.len();
                break;
            }
            if content.starts_with([' ', '\t']) {
                match headers.last_mut() {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(content.trim());
                        offset += line.len();
                        continue;
                    }
                    None => break,
                }
            }
            match content.split_once(':') {
                Some((name, value)) if is_header_name(name) => {
                    headers.push((name.to_string(), value.trim().to_string()));
                    offset += line.len();
                }
                _ => break,
            }
        }

        Self {
            headers,
            body: text[offset..].to_string(),
        }
    }

    /// First header named `name`, case-insensitively.
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn has_known_header(&self) -> bool {
        self.headers
            .iter()
            .any(|(n, _)| KNOWN_HEADERS.iter().any(|k| n.eq_ignore_ascii_case(k)))
    }

    fn content_type(&self) -> String {
        self.header("Content-Type")
            .unwrap_or("text/plain")
            .to_ascii_lowercase()
    }

    /// Readable body text: the first `text/plain` part of a multipart
    /// message, otherwise the decoded body.
    pub(crate) fn text(&self) -> String {
        if self.content_type().starts_with("multipart/") {
            self.first_plain_part().unwrap_or_default()
        } else {
            self.decoded_body()
        }
    }

    fn first_plain_part(&self) -> Option<String> {
        let boundary = self.header("Content-Type").and_then(boundary)?;
        let delimiter = format!("--{}", boundary);

        for chunk in self.body.split(delimiter.as_str()).skip(1) {
            // Closing delimiter
            if chunk.starts_with("--") {
                break;
            }
            let part = Message::parse(chunk.strip_prefix('\n').unwrap_or(chunk));
            let content_type = part.content_type();
            if content_type.starts_with("multipart/") {
                if let Some(text) = part.first_plain_part() {
                    return Some(text);
                }
            } else if content_type.starts_with("text/plain") {
                return Some(part.decoded_body());
            }
        }
        None
    }

    fn decoded_body(&self) -> String {
        let encoding = self
            .header("Content-Transfer-Encoding")
            .map(|e| e.trim().to_ascii_lowercase());

        match encoding.as_deref() {
            Some("base64") => {
                let compact: String = self.body.split_whitespace().collect();
                match base64::engine::general_purpose::STANDARD.decode(compact) {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(e) => {
                        tracing::debug!(error = %e, "Undecodable base64 body, using raw text");
                        self.body.clone()
                    }
                }
            }
            Some("quoted-printable") => decode_quoted_printable(&self.body),
            _ => self.body.clone(),
        }
    }
}

fn is_header_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic())
}

fn boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("boundary") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

fn decode_quoted_printable(body: &str) -> String {
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        // Soft line break
        if bytes.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }
        let hex = bytes
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match hex {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::DocumentFormat;

    fn metadata() -> ClassificationResult {
        ClassificationResult::new(DocumentFormat::Email, "Complaint")
    }

    async fn extract(raw: &str) -> Extraction {
        EmailExtractor::new()
            .extract(raw.as_bytes(), &metadata())
            .await
            .unwrap()
    }

    #[test]
    fn test_parse_folded_headers() {
        let message = Message::parse(
            "From: alice@example.com\r\nSubject: Order\r\n  #12987 delayed\r\n\r\nHello\r\n",
        );
        assert_eq!(message.header("from"), Some("alice@example.com"));
        assert_eq!(message.header("Subject"), Some("Order #12987 delayed"));
        assert_eq!(message.text(), "Hello\n");
        assert!(message.has_known_header());
    }

    #[test]
    fn test_plain_text_has_no_headers() {
        let message = Message::parse("Dear team,\nplease advise.");
        assert!(!message.has_known_header());
        assert_eq!(message.text(), "Dear team,\nplease advise.");
    }

    #[test]
    fn test_multipart_uses_first_plain_part() {
        let raw = "From: bob@example.com\n\
                   Content-Type: multipart/alternative; boundary=\"XYZ\"\n\
                   \n\
                   --XYZ\n\
                   Content-Type: text/html\n\
                   \n\
                   <p>html</p>\n\
                   --XYZ\n\
                   Content-Type: text/plain; charset=utf-8\n\
                   Content-Transfer-Encoding: base64\n\
                   \n\
                   SGVsbG8gdGhlcmU=\n\
                   --XYZ--\n";
        let message = Message::parse(raw);
        assert_eq!(message.text(), "Hello there");
    }

    #[test]
    fn test_quoted_printable() {
        assert_eq!(decode_quoted_printable("caf=C3=A9 =\nnow"), "café now");
        assert_eq!(decode_quoted_printable("a=zz"), "a=zz");
    }

    #[tokio::test]
    async fn test_urgent_email_escalates() {
        let extraction = extract(
            "From: carol@example.com\nSubject: Urgent complaint about order #12987\n\nI received the wrong item.\n",
        )
        .await;

        assert_eq!(extraction.source, "email_agent");
        assert_eq!(extraction.data["sender"], "carol@example.com");
        assert_eq!(extraction.data["urgency"], "high");
        assert_eq!(extraction.data["tone"], "polite");
        assert_eq!(extraction.data["body_summary"], "I received the wrong item.");
        assert_eq!(extraction.action_suggestion, ActionSuggestion::new("escalate", "crm"));
    }

    #[tokio::test]
    async fn test_angry_email_escalates() {
        let extraction = extract(
            "From: dan@example.com\nSubject: My order\n\nThis is unacceptable, the box arrived crushed.\n",
        )
        .await;

        assert_eq!(extraction.data["urgency"], "normal");
        assert_eq!(extraction.data["tone"], "angry");
        assert_eq!(extraction.action_suggestion.target, "crm");
    }

    #[tokio::test]
    async fn test_calm_email_is_logged() {
        let extraction = extract(
            "From: erin@example.com\nSubject: Question\nIn-Reply-To: <abc@example.com>\n\nCould you send the catalogue? There is no issue.\n",
        )
        .await;

        assert_eq!(extraction.data["tone"], "polite");
        assert_eq!(extraction.data["thread_id"], "<abc@example.com>");
        assert_eq!(extraction.action_suggestion, ActionSuggestion::new("log", "database"));
    }

    #[tokio::test]
    async fn test_fresh_thread_id_and_summary_cut() {
        let body = "x".repeat(500);
        let extraction = extract(&format!("Subject: Long\n\n{}", body)).await;

        let thread_id = extraction.data["thread_id"].as_str().unwrap();
        assert_eq!(thread_id.len(), 32);
        assert!(thread_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(extraction.data["body_summary"].as_str().unwrap().len(), 200);
        assert_eq!(extraction.data["sender"], "");
    }

    #[test]
    fn test_tone_labels() {
        assert_eq!(tone(""), "polite");
        assert_eq!(tone("Fix this or else I will call my lawyer"), "threatening");
        assert_eq!(tone("Congratulations, you are a WINNER"), "spam");
        assert_eq!(tone("Thanks for the quick reply"), "polite");
    }
}
