//! PDF extractor.
//!
//! Text comes from literal and hex strings shown by `Tj`, `TJ`, `'` and `"`
//! inside content streams. Unfiltered and `/FlateDecode` streams are read;
//! streams with any other filter (images, fonts) are skipped.

use async_trait::async_trait;
use conduit_core::{ActionSuggestion, ClassificationResult, Extraction, JsonMap};
use conduit_runtime::Extractor;
use regex::Regex;
use flate2::read::ZlibDecoder;
use serde_json::{Value, json};
use std::borrow::Cow;
use std::io::Read;
use std::sync::LazyLock;

use crate::error::AgentError;

pub const SOURCE: &str = "pdf_agent";

pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Invoices above this total are flagged for compliance review.
pub const INVOICE_REVIEW_THRESHOLD: f64 = 10_000.0;

pub const POLICY_KEYWORDS: [&str; 4] = ["GDPR", "FDA", "HIPAA", "PCI-DSS"];

/// Upper bound on the inflated size of one content stream.
const MAX_INFLATED_STREAM: u64 = 16 * 1024 * 1024;

// `item qty unit_price line_total`, one per line
static RE_LINE_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?P<item>[A-Za-z0-9 \-]+?)[ \t]+(?P<qty>\d+)[ \t]+\$?(?P<unit_price>[0-9,]+(?:\.\d{1,2})?)[ \t]+\$?(?P<line_total>[0-9,]+(?:\.\d{1,2})?)[ \t]*$",
    )
    .unwrap()
});
static RE_TOTAL_DUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)total\s+due[:\s]+\$?([0-9,]+(?:\.\d{1,2})?)").unwrap()
});
static RE_POLICIES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    POLICY_KEYWORDS
        .iter()
        .map(|kw| {
            let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw))).unwrap();
            (*kw, re)
        })
        .collect()
});

#[derive(Debug, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for PdfExtractor {
    async fn extract(
        &self,
        raw: &[u8],
        metadata: &ClassificationResult,
    ) -> anyhow::Result<Extraction> {
        if !raw.starts_with(PDF_MAGIC) {
            return Err(AgentError::MissingPdfHeader.into());
        }

        let full_text = extract_text(raw);
        let mut data = JsonMap::new();
        data.insert("full_text".to_string(), json!(full_text));

        let flagged = match metadata.intent.to_lowercase().as_str() {
            "invoice" => {
                let invoice = parse_invoice(&full_text);
                tracing::debug!(
                    items = invoice.line_items.len(),
                    total = invoice.total,
                    "Parsed invoice"
                );
                data.insert("line_items".to_string(), Value::Array(invoice.line_items));
                data.insert("invoice_total".to_string(), json!(invoice.total));
                invoice.total > INVOICE_REVIEW_THRESHOLD
            }
            "regulation" => {
                let mentions = find_policies(&full_text);
                let flagged = !mentions.is_empty();
                data.insert("policy_mentions".to_string(), json!(mentions));
                flagged
            }
            _ => false,
        };

        let action_suggestion = if flagged {
            ActionSuggestion::new("flag_compliance", "risk_alert")
        } else {
            ActionSuggestion::new("archive", "database")
        };

        Ok(Extraction {
            source: SOURCE.to_string(),
            data,
            action_suggestion,
        })
    }
}

struct Invoice {
    line_items: Vec<Value>,
    total: f64,
}

/// Sum of parsed line items, or the `Total Due` figure when none parse.
fn parse_invoice(text: &str) -> Invoice {
    let mut line_items = Vec::new();
    let mut total = 0.0;

    for caps in RE_LINE_ITEM.captures_iter(text) {
        let (Ok(qty), Some(unit_price), Some(line_total)) = (
            caps["qty"].parse::<u64>(),
            parse_amount(&caps["unit_price"]),
            parse_amount(&caps["line_total"]),
        ) else {
            continue;
        };

        total += line_total;
        line_items.push(json!({
            "item": caps["item"].trim(),
            "qty": qty,
            "unit_price": unit_price,
            "total": line_total,
        }));
    }

    if line_items.is_empty() {
        if let Some(amount) = RE_TOTAL_DUE
            .captures(text)
            .and_then(|caps| parse_amount(&caps[1]))
        {
            total = amount;
        }
    }

    Invoice {
        line_items,
        total: (total * 100.0).round() / 100.0,
    }
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

fn find_policies(text: &str) -> Vec<&'static str> {
    RE_POLICIES
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(kw, _)| *kw)
        .collect()
}

/// Best-effort text of every readable content stream, one shown line per
/// output line.
pub fn extract_text(raw: &[u8]) -> String {
    let mut lines = Vec::new();
    for stream in content_streams(raw) {
        collect_text(&stream, &mut lines);
    }
    lines.join("\n")
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

fn content_streams(raw: &[u8]) -> Vec<Cow<'_, [u8]>> {
    let mut streams = Vec::new();
    let mut pos = 0;

    while let Some(found) = find(&raw[pos..], b"stream") {
        let keyword = pos + found;
        let mut body = keyword + b"stream".len();
        pos = body;

        if raw[..keyword].ends_with(b"end") {
            continue;
        }
        if raw[body..].starts_with(b"\r\n") {
            body += 2;
        } else if raw[body..].starts_with(b"\n") || raw[body..].starts_with(b"\r") {
            body += 1;
        } else {
            continue;
        }

        let dict_start = rfind(&raw[..keyword], b"obj").unwrap_or(0);
        let dict = &raw[dict_start..keyword];

        // Compressed data may contain anything, so trust a direct /Length
        // when it lands on `endstream`
        let declared = direct_length(dict)
            .filter(|&len| body + len <= raw.len())
            .filter(|&len| {
                let tail = &raw[body + len..];
                let skipped = tail.iter().take_while(|b| b.is_ascii_whitespace()).count();
                tail[skipped..].starts_with(b"endstream")
            });
        let len = match declared {
            Some(len) => len,
            None => match find(&raw[body..], b"endstream") {
                Some(len) => len,
                None => break,
            },
        };
        let data = &raw[body..body + len];
        pos = body + len;

        match filters(dict).as_slice() {
            [] => streams.push(Cow::Borrowed(data)),
            [name] if *name == b"FlateDecode" => match inflate(data) {
                Some(inflated) => streams.push(Cow::Owned(inflated)),
                None => tracing::debug!(offset = keyword, "Undecodable FlateDecode stream"),
            },
            _ => tracing::trace!(offset = keyword, "Skipping PDF stream with unsupported filter"),
        }
    }

    streams
}

/// `/Length N` when it is a direct integer rather than a reference.
fn direct_length(dict: &[u8]) -> Option<usize> {
    let start = find(dict, b"/Length")? + b"/Length".len();
    let rest = &dict[start..];
    let rest = &rest[rest.iter().take_while(|b| b.is_ascii_whitespace()).count()..];
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    let after = &rest[digits..];
    let after = &after[after.iter().take_while(|b| b.is_ascii_whitespace()).count()..];
    // `12 0 R` is an indirect reference
    if after.first().is_some_and(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(&rest[..digits]).ok()?.parse().ok()
}

/// Filter names of a stream dictionary: `/Filter /A` or `/Filter [/A /B]`.
fn filters(dict: &[u8]) -> Vec<&[u8]> {
    let Some(found) = find(dict, b"/Filter") else {
        return Vec::new();
    };
    let rest = &dict[found + b"/Filter".len()..];
    let rest = &rest[rest.iter().take_while(|b| b.is_ascii_whitespace()).count()..];

    let value = if rest.first() == Some(&b'[') {
        let end = rest.iter().position(|&b| b == b']').unwrap_or(rest.len());
        &rest[1..end]
    } else {
        let name_end = rest
            .iter()
            .skip(1)
            .position(|&b| b == b'/' || b == b'>' || b.is_ascii_whitespace())
            .map_or(rest.len(), |p| p + 1);
        &rest[..name_end]
    };

    value
        .split(|&b| b == b'/' || b.is_ascii_whitespace())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Inflate a zlib stream. Truncated streams keep whatever was recovered.
fn inflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let result = ZlibDecoder::new(data)
        .take(MAX_INFLATED_STREAM)
        .read_to_end(&mut out);
    match result {
        Ok(_) => Some(out),
        Err(e) if !out.is_empty() => {
            tracing::debug!(error = %e, recovered = out.len(), "Partially inflated PDF stream");
            Some(out)
        }
        Err(_) => None,
    }
}

fn collect_text(content: &[u8], lines: &mut Vec<String>) {
    let mut line = String::new();
    let mut pending: Vec<String> = Vec::new();
    let mut i = 0;

    let flush = |line: &mut String, lines: &mut Vec<String>| {
        let trimmed = line.trim_end();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
        line.clear();
    };

    while i < content.len() {
        match content[i] {
            b'(' => {
                let (text, next) = literal_string(content, i + 1);
                pending.push(text);
                i = next;
            }
            b'<' if content.get(i + 1) == Some(&b'<') => i += 2,
            b'<' => {
                let (text, next) = hex_string(content, i + 1);
                pending.push(text);
                i = next;
            }
            b'%' => {
                while i < content.len() && content[i] != b'\n' && content[i] != b'\r' {
                    i += 1;
                }
            }
            b'\'' | b'"' => {
                flush(&mut line, lines);
                line.extend(pending.drain(..));
                i += 1;
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < content.len() && (content[i].is_ascii_alphanumeric() || content[i] == b'*')
                {
                    i += 1;
                }
                match &content[start..i] {
                    b"Tj" | b"TJ" => line.extend(pending.drain(..)),
                    b"Td" | b"TD" | b"T*" | b"Tm" | b"ET" => {
                        pending.clear();
                        flush(&mut line, lines);
                    }
                    _ => pending.clear(),
                }
            }
            _ => i += 1,
        }
    }

    flush(&mut line, lines);
}

/// Decode a literal string starting just after its opening parenthesis.
/// Returns the text and the index after the closing parenthesis.
fn literal_string(content: &[u8], start: usize) -> (String, usize) {
    let mut bytes = Vec::new();
    let mut depth = 1;
    let mut i = start;

    while i < content.len() {
        let c = content[i];
        i += 1;
        match c {
            b'\\' => {
                let Some(&escaped) = content.get(i) else { break };
                i += 1;
                match escaped {
                    b'n' => bytes.push(b'\n'),
                    b'r' => bytes.push(b'\r'),
                    b't' => bytes.push(b'\t'),
                    b'b' => bytes.push(0x08),
                    b'f' => bytes.push(0x0c),
                    b'0'..=b'7' => {
                        let mut value = u32::from(escaped - b'0');
                        for _ in 0..2 {
                            match content.get(i) {
                                Some(d @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(d - b'0');
                                    i += 1;
                                }
                                _ => break,
                            }
                        }
                        bytes.push((value & 0xff) as u8);
                    }
                    // Line continuation
                    b'\n' => {}
                    b'\r' => {
                        if content.get(i) == Some(&b'\n') {
                            i += 1;
                        }
                    }
                    other => bytes.push(other),
                }
            }
            b'(' => {
                depth += 1;
                bytes.push(c);
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                bytes.push(c);
            }
            _ => bytes.push(c),
        }
    }

    (latin1(&bytes), i)
}

fn hex_string(content: &[u8], start: usize) -> (String, usize) {
    let mut digits = Vec::new();
    let mut i = start;
    while i < content.len() && content[i] != b'>' {
        if let Some(d) = (content[i] as char).to_digit(16) {
            digits.push(d as u8);
        }
        i += 1;
    }
    if digits.len() % 2 == 1 {
        digits.push(0);
    }
    let bytes: Vec<u8> = digits.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect();
    (latin1(&bytes), i + 1)
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
