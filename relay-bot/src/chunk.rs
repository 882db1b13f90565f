//! Splitting of long replies into platform-sized parts.

/// Split `text` into parts of at most `max_length` characters.
///
/// Text that fits is returned unchanged as a single part. Otherwise each cut
/// prefers the last newline at or before `max_length`, then the last space,
/// and falls back to a hard cut. Whitespace at the start of each
/// continuation is dropped, and so is any part that would be blank. Lengths
/// are counted in characters, not bytes.
pub fn split_message(text: &str, max_length: usize) -> Vec<String> {
    let max_length = max_length.max(1);

    if text.chars().count() <= max_length {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        // Byte offset of the first character past the limit.
        let Some((limit, next)) = remaining.char_indices().nth(max_length) else {
            parts.push(remaining.to_string());
            break;
        };

        // A separator sitting exactly at `max_length` still counts.
        let window = &remaining[..limit + next.len_utf8()];
        let split_at = window
            .rfind('\n')
            .filter(|&pos| pos > 0)
            .or_else(|| window.rfind(' ').filter(|&pos| pos > 0))
            .unwrap_or(limit);

        // Telegram rejects whitespace-only messages.
        let part = &remaining[..split_at];
        if !part.trim().is_empty() {
            parts.push(part.to_string());
        }
        remaining = remaining[split_at..].trim_start();
    }

    parts
}
