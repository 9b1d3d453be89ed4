//! Input sanitization and validation.
//!
//! Pure functions exposed to page logic. Nothing here is applied
//! automatically; callers choose where untrusted text is cleaned.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

/// Escape text so it renders inert inside HTML.
///
/// # Examples
///
/// ```
/// use dashguard::security::sanitize::sanitize_html;
///
/// assert_eq!(sanitize_html("<b>hi</b> & bye"), "&lt;b&gt;hi&lt;/b&gt; &amp; bye");
/// ```
pub fn sanitize_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Return `url` unchanged if it is an absolute http(s) URL, else empty.
pub fn sanitize_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => url.to_string(),
        _ => String::new(),
    }
}

struct TextPatterns {
    script_block: Regex,
    script_tag: Regex,
    event_handler: Regex,
    js_uri: Regex,
}

fn text_patterns() -> &'static TextPatterns {
    static PATTERNS: OnceLock<TextPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| TextPatterns {
        script_block: Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("static regex"),
        script_tag: Regex::new(r"(?i)</?script\b[^>]*>").expect("static regex"),
        event_handler: Regex::new(r#"(?i)\s*\bon[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).expect("static regex"),
        js_uri: Regex::new(r"(?i)javascript\s*:").expect("static regex"),
    })
}

/// Strip script blocks, inline event-handler attributes, and `javascript:`
/// URIs from free text.
///
/// # Examples
///
/// ```
/// use dashguard::security::sanitize::validate_text_input;
///
/// assert_eq!(validate_text_input("<script>alert(1)</script>hi"), "hi");
/// ```
pub fn validate_text_input(text: &str) -> String {
    let patterns = text_patterns();
    let text = patterns.script_block.replace_all(text, "");
    let text = patterns.script_tag.replace_all(&text, "");
    let text = patterns.event_handler.replace_all(&text, "");
    patterns.js_uri.replace_all(&text, "").into_owned()
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"))
}

/// Loose `local@domain.tld` shape check.
pub fn validate_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

/// True if the text is a finite decimal number.
pub fn validate_number(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return false;
    }
    trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// True if the text parses as a calendar date or timestamp.
pub fn validate_date(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    DateTime::parse_from_rfc3339(trimmed).is_ok()
        || DateTime::parse_from_rfc2822(trimmed).is_ok()
        || NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok()
        || DATE_TIME_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).is_ok())
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}
