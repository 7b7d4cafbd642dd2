//! Small text helpers for log lines.

/// Truncate `text` to at most `max_len` bytes, breaking at the nearest
/// preceding char boundary so the result is always valid UTF-8.
/// Appends `"..."` when truncation occurs and `max_len >= 3`.
/// For `max_len < 3`, returns a boundary-safe prefix without an ellipsis.
#[must_use]
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_owned();
    }

    if max_len < 3 {
        return text[..floor_boundary(text, max_len)].to_owned();
    }

    let boundary = floor_boundary(text, max_len - 3);
    format!("{}...", &text[..boundary])
}

fn floor_boundary(text: &str, limit: usize) -> usize {
    text.char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= limit)
        .last()
        .unwrap_or(0)
}
