//! Utility functions for log output.

use regex::Regex;
use std::sync::OnceLock;

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Works on character boundaries, so Cyrillic text and emoji are safe.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

fn secret_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?i)(bearer)\s+\S{10,}", "$1 ***REDACTED***"),
            (r"sk-[a-zA-Z0-9]{20,}", "***REDACTED_API_KEY***"),
            // Telegram bot tokens embedded in API URLs
            (r"bot\d{5,}:[A-Za-z0-9_-]{20,}", "bot***REDACTED***"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
    })
}

/// Sanitize a string for safe logging.
///
/// reqwest errors include the request URL, and Telegram URLs carry the bot
/// token, so every transport error goes through here before being logged.
pub fn sanitize_for_log(s: &str) -> String {
    let mut result = s.to_string();
    for (re, replacement) in secret_patterns() {
        result = re.replace_all(&result, *replacement).to_string();
    }
    result
}
