//! Log sanitization for patient identifiers.
//!
//! Formatted log lines pass through `SanitizingMakeWriter` before reaching any
//! sink. The patterns cover what can identify a patient in this setting:
//! - Result / record UUIDs
//! - Clinical history numbers (NHC) and MRNs
//! - Spanish national ID numbers (DNI / NIE)
//! - E-mail addresses and phone numbers
//! - Dates (birth dates, visit dates)
//!
//! Sanitizing strings is a fallback. Clinical values and identifiers should not
//! be formatted into log messages in the first place.
//!
//! `sanitize()` caps the input size (see `NEST_SANITIZE_MAX_BYTES`).

use regex::{Regex, RegexSet};
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

/// Compiled patterns for PII detection and sanitization.
static PII_PATTERNS: OnceLock<PiiPatterns> = OnceLock::new();

/// Maximum number of bytes to sanitize per call (16 KiB unless overridden).
const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

/// A compiled PII pattern with its replacement text.
struct PiiPattern {
    regex: Regex,
    replacement: &'static str,
}

struct PiiPatterns {
    set: RegexSet,
    patterns: Vec<PiiPattern>,
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }

    let mut end = max_bytes.min(input.len());
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

fn max_sanitize_bytes() -> usize {
    std::env::var("NEST_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn get_patterns() -> &'static PiiPatterns {
    PII_PATTERNS.get_or_init(|| {
        let rules: Vec<(&'static str, &'static str)> = vec![
            (
                r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
                "[REDACTED-UUID]",
            ),
            // NHC / MRN with an explicit prefix
            (r"(?i)\b(?:NHC|MRN)\s*[:#]?\s*\d{5,10}\b", "[REDACTED-NHC]"),
            // DNI (8 digits + letter) and NIE (X/Y/Z + 7 digits + letter)
            (r"(?i)\b(?:\d{8}|[XYZ]\d{7})[A-Z]\b", "[REDACTED-ID]"),
            (
                r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
                "[REDACTED-EMAIL]",
            ),
            // Spanish phone numbers, optional +34 prefix
            (
                r"(?:\+34[\s-]?)?\b[6789]\d{2}[\s-]?\d{3}[\s-]?\d{3}\b",
                "[REDACTED-PHONE]",
            ),
            (r"\b\d{1,2}[/-]\d{1,2}[/-]\d{4}\b", "[REDACTED-DATE]"),
        ];

        let set = RegexSet::new(rules.iter().map(|(p, _)| *p)).expect("Valid regex set");
        let patterns = rules
            .into_iter()
            .map(|(pattern, replacement)| PiiPattern {
                regex: Regex::new(pattern).expect("Valid regex"),
                replacement,
            })
            .collect();

        PiiPatterns { set, patterns }
    })
}

/// Sanitize a string by replacing PII patterns.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let patterns = get_patterns();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    // Only apply patterns that matched the original prefix.
    let mut result = prefix.to_string();
    for idx in patterns.set.matches(prefix).into_iter() {
        let pattern = &patterns.patterns[idx];
        result = pattern
            .regex
            .replace_all(&result, pattern.replacement)
            .to_string();
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// Check if a string contains potential PII.
#[must_use]
pub fn contains_pii(input: &str) -> bool {
    let (prefix, _truncated) = truncate_to_char_boundary(input, max_sanitize_bytes());
    get_patterns().set.is_match(prefix)
}

/// Wraps a `MakeWriter` so that every formatted log line is sanitized
/// before it reaches the sink.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer())
    }
}

/// Per-event writer. Complete lines are sanitized and forwarded as they
/// arrive; a trailing partial line is held until the next newline, `flush`
/// or drop.
pub struct SanitizingWriter<W: Write> {
    inner: W,
    pending: Vec<u8>,
}

impl<W: Write> SanitizingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            pending: Vec::new(),
        }
    }

    fn emit(&mut self, bytes: &[u8]) -> io::Result<()> {
        let text = String::from_utf8_lossy(bytes);
        self.inner.write_all(sanitize(&text).as_bytes())
    }

    fn emit_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        self.emit(&pending)
    }
}

impl<W: Write> Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (line, tail) = rest.split_at(pos + 1);
            self.pending.extend_from_slice(line);
            self.emit_pending()?;
            rest = tail;
        }
        self.pending.extend_from_slice(rest);

        // A newline-free run longer than the sanitize limit is cut here;
        // `sanitize` marks it truncated.
        if self.pending.len() > max_sanitize_bytes() {
            self.emit_pending()?;
            self.inner.write_all(b"\n")?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit_pending()?;
        self.inner.flush()
    }
}

impl<W: Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        let _ = self.emit_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_uuid() {
        let input = "Result 550e8400-e29b-41d4-a716-446655440000 stored";
        let sanitized = sanitize(input);
        assert!(sanitized.contains("[REDACTED-UUID]"));
        assert!(!sanitized.contains("550e8400"));
    }

    #[test]
    fn test_sanitize_nhc() {
        assert!(sanitize("NHC: 1234567 imported").contains("[REDACTED-NHC]"));
        assert!(sanitize("mrn#00123456").contains("[REDACTED-NHC]"));
    }

    #[test]
    fn test_sanitize_national_ids() {
        let sanitized = sanitize("DNI 12345678Z, NIE X1234567L");
        assert!(!sanitized.contains("12345678Z"));
        assert!(!sanitized.contains("X1234567L"));
        assert_eq!(sanitized.matches("[REDACTED-ID]").count(), 2);
    }

    #[test]
    fn test_sanitize_email_and_phone() {
        let sanitized = sanitize("Contact: paciente@hospital.es or +34 612 345 678");
        assert!(sanitized.contains("[REDACTED-EMAIL]"));
        assert!(sanitized.contains("[REDACTED-PHONE]"));
    }

    #[test]
    fn test_sanitize_dates() {
        assert!(sanitize("born 03/11/1958").contains("[REDACTED-DATE]"));
    }

    #[test]
    fn test_pipeline_messages_pass_through() {
        let line = "Inference complete: probability=0.4123, risk=MODERATE, n_imputed=11";
        assert!(!contains_pii(line));
        assert_eq!(sanitize(line), line);
    }

    #[test]
    fn test_sanitize_truncates_large_inputs() {
        let input = "prefix NHC 1234567 then a long tail of text";
        let sanitized = sanitize_with_limit(input, 16);
        assert!(sanitized.ends_with("[TRUNCATED]"));
        assert!(!sanitized.contains("1234567"));
    }

    #[test]
    fn test_writer_sanitizes_complete_lines() {
        let mut sink = Vec::new();
        {
            let mut writer = SanitizingWriter::new(&mut sink);
            writer.write_all(b"row NHC 7654321 ").expect("write");
            writer.write_all(b"imported\nnext").expect("write");
            writer.flush().expect("flush");
        }
        let out = String::from_utf8(sink).expect("utf8");
        assert_eq!(out, "row [REDACTED-NHC] imported\nnext");
    }

    #[test]
    fn test_writer_joins_lines_split_across_writes() {
        let mut sink = Vec::new();
        {
            let mut writer = SanitizingWriter::new(&mut sink);
            writer.write_all(b"patient paciente@hosp").expect("write");
            writer.write_all(b"ital.es scored\n").expect("write");
        }
        let out = String::from_utf8(sink).expect("utf8");
        assert_eq!(out, "patient [REDACTED-EMAIL] scored\n");
    }

    #[test]
    fn test_writer_emits_partial_line_on_drop() {
        let mut sink = Vec::new();
        {
            let mut writer = SanitizingWriter::new(&mut sink);
            writer.write_all(b"DNI 12345678Z").expect("write");
        }
        let out = String::from_utf8(sink).expect("utf8");
        assert_eq!(out, "DNI [REDACTED-ID]");
    }
}
