//! Header block extraction and field parsing.
//!
//! A message is split at the first blank line; everything before it is the
//! header block. Field lines follow the grammar
//!
//! ```text
//! field-line   = field-name ":" value
//! field-name   = 1*(printable ASCII except SP, HTAB and ":")
//! continuation = (SP / HTAB) text      ; joined onto the previous value
//! ```
//!
//! Lines that fit neither rule (for instance an mbox `From ` separator)
//! are skipped and end any pending continuation.

use std::collections::HashMap;

/// Return the header block of `raw`, decoded lossily.
///
/// The boundary is the first `CRLF CRLF` or bare `LF LF`, whichever comes
/// first. Without a boundary the whole input is treated as header.
pub fn extract_header(raw: &[u8]) -> String {
    let end = [&b"\r\n\r\n"[..], &b"\n\n"[..]]
        .iter()
        .filter_map(|sep| find(raw, sep))
        .min()
        .unwrap_or(raw.len());

    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic() && b != b':')
}

/// Join continuation lines and split the header block into
/// `(name, value)` pairs, in order of appearance.
pub fn unfold(header: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    let mut continuing = false;

    for line in header.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.starts_with(' ') || line.starts_with('\t') {
            if continuing {
                if let Some((_, value)) = fields.last_mut() {
                    let text = line.trim();
                    if !text.is_empty() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(text);
                    }
                }
            }
            continue;
        }

        match line.split_once(':') {
            Some((name, value)) if is_field_name(name) => {
                fields.push((name.to_string(), value.trim().to_string()));
                continuing = true;
            }
            _ => continuing = false,
        }
    }

    fields
}

/// Header fields parsed once from the header block.
///
/// Holds the first value seen for every field name (keyed lower-case) and
/// every `Received` value in order. Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFields {
    first: HashMap<String, String>,
    received: Vec<String>,
}

impl ParsedFields {
    pub fn parse(header: &str) -> Self {
        let mut parsed = Self::default();

        for (name, value) in unfold(header) {
            if value.is_empty() {
                continue;
            }
            let key = name.to_ascii_lowercase();
            if key == "received" {
                parsed.received.push(value.clone());
            }
            parsed.first.entry(key).or_insert(value);
        }

        parsed
    }

    /// Case-insensitive lookup of the first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.first
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn from(&self) -> Option<&str> {
        self.get("From")
    }

    pub fn reply_to(&self) -> Option<&str> {
        self.get("Reply-To")
    }

    pub fn return_path(&self) -> Option<&str> {
        self.get("Return-Path")
    }

    pub fn dkim_signature(&self) -> Option<&str> {
        self.get("DKIM-Signature")
    }

    /// Every `Received` trace value, topmost first.
    pub fn received(&self) -> &[String] {
        &self.received
    }
}

/// Look up a single field in a header block.
///
/// Prefer [`ParsedFields`] when more than one field is needed.
pub fn field(header: &str, name: &str) -> Option<String> {
    ParsedFields::parse(header).get(name).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_header_crlf() {
        let raw = b"From: a@x.com\r\nSubject: hi\r\n\r\nbody\r\n\r\nmore";
        assert_eq!(extract_header(raw), "From: a@x.com\r\nSubject: hi");
    }

    #[test]
    fn test_extract_header_bare_lf() {
        let raw = b"From: a@x.com\nSubject: hi\n\nbody";
        assert_eq!(extract_header(raw), "From: a@x.com\nSubject: hi");
    }

    #[test]
    fn test_extract_header_without_boundary() {
        let raw = b"From: a@x.com\r\nSubject: hi";
        assert_eq!(extract_header(raw), "From: a@x.com\r\nSubject: hi");
    }

    #[test]
    fn test_extract_header_invalid_utf8() {
        let raw = b"Subject: \xff\xfe\r\n\r\nbody";
        let header = extract_header(raw);
        assert!(header.starts_with("Subject: "));
        assert!(header.contains('\u{FFFD}'));
    }

    #[test]
    fn test_extract_header_empty() {
        assert_eq!(extract_header(b""), "");
    }

    #[test]
    fn test_unfold_continuation_lines() {
        let header = "DKIM-Signature: v=1; a=rsa-sha256;\r\n\tc=relaxed/relaxed; d=x.com;\r\n s=sel\r\nFrom: a@x.com";
        let fields = unfold(header);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].0, "DKIM-Signature");
        assert_eq!(
            fields[0].1,
            "v=1; a=rsa-sha256; c=relaxed/relaxed; d=x.com; s=sel"
        );
        assert_eq!(fields[1], ("From".to_string(), "a@x.com".to_string()));
    }

    #[test]
    fn test_unfold_skips_malformed_lines() {
        let header = "From alice@x.com Mon Jan  1 12:00:00 2024\n continued\nTo: b@y.com";
        let fields = unfold(header);
        assert_eq!(fields, vec![("To".to_string(), "b@y.com".to_string())]);
    }

    #[test]
    fn test_field_is_case_insensitive_and_trimmed() {
        let header = "from:    Alice <a@x.com>   \r\nREPLY-TO: b@y.com";
        assert_eq!(field(header, "From"), Some("Alice <a@x.com>".to_string()));
        assert_eq!(field(header, "reply-to"), Some("b@y.com".to_string()));
        assert_eq!(field(header, "Return-Path"), None);
    }

    #[test]
    fn test_field_empty_value_is_absent() {
        assert_eq!(field("Reply-To:   \r\nFrom: a@x.com", "Reply-To"), None);
    }

    #[test]
    fn test_parsed_fields_keeps_first_value() {
        let parsed = ParsedFields::parse("From: first@x.com\nFrom: second@y.com");
        assert_eq!(parsed.from(), Some("first@x.com"));
    }

    #[test]
    fn test_parsed_fields_collects_all_received() {
        let header = "Received: from a.example [192.0.2.1]\nReceived: from b.example\n  [192.0.2.2]\nFrom: a@x.com";
        let parsed = ParsedFields::parse(header);
        assert_eq!(
            parsed.received(),
            &[
                "from a.example [192.0.2.1]".to_string(),
                "from b.example [192.0.2.2]".to_string()
            ]
        );
    }
}
