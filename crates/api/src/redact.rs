//! Scrubbing of PII and credentials from free text before it is logged.
//!
//! Chat messages are user-authored and may contain anything. They are passed
//! through [`redact`] before reaching a log line or a Sentry breadcrumb.

use std::sync::LazyLock;

use regex::Regex;

/// Replacement for every redacted span.
pub const REDACTED: &str = "[REDACTED]";

/// Patterns replaced wholesale, applied in order.
///
/// Card numbers and SSNs run before phone numbers so their digits are not
/// half-consumed by the looser phone pattern.
static WHOLE_MATCH: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Email addresses
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        // Payment card numbers
        r"\b(?:\d{4}[-\s]?){3}\d{4}\b",
        // AWS access key IDs
        r"\bAKIA[0-9A-Z]{16}\b",
        // US social security numbers
        r"\b\d{3}-\d{2}-\d{4}\b",
        // Phone numbers
        r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
        // IPv4 addresses
        r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("Invalid regex"))
    .collect()
});

/// `key: value` pairs whose value is replaced and whose key is kept.
static KEYED_SECRET: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)\b((?:api[_-]?key|apikey|access[_-]?key|secret[_-]?key)["']?\s*[:=]\s*["']?)[A-Za-z0-9_\-]{20,}"#,
        r#"(?i)\b((?:password|passwd|pwd)["']?\s*[:=]\s*["']?)[^"'\s,}]+"#,
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("Invalid regex"))
    .collect()
});

static BEARER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bBearer\s+[A-Za-z0-9_\-.]+").expect("Invalid regex"));

static AUTH_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAuthorization\s*:\s*[^\s,]+").expect("Invalid regex"));

/// Redact emails, card numbers, API keys, bearer tokens, passwords, SSNs,
/// phone numbers and IP addresses from `text`.
///
/// ```
/// use shopkeep_api::redact::redact;
///
/// assert_eq!(
///     redact("mail me at jane@example.com"),
///     "mail me at [REDACTED]"
/// );
/// ```
#[must_use]
pub fn redact(text: &str) -> String {
    let mut out = text.to_owned();

    for re in KEYED_SECRET.iter() {
        out = re.replace_all(&out, format!("${{1}}{REDACTED}")).into_owned();
    }

    out = BEARER_TOKEN
        .replace_all(&out, format!("Bearer {REDACTED}"))
        .into_owned();
    out = AUTH_HEADER
        .replace_all(&out, format!("Authorization: {REDACTED}"))
        .into_owned();

    for re in WHOLE_MATCH.iter() {
        out = re.replace_all(&out, REDACTED).into_owned();
    }

    out
}
