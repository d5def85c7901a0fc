//! Shared utility functions used across the codebase.

/// Largest char boundary `<= max_bytes`, so slicing never splits a UTF-8 sequence.
pub fn safe_truncate_index(s: &str, max_bytes: usize) -> usize {
    if s.len() <= max_bytes {
        return s.len();
    }
    s.char_indices()
        .take_while(|(i, _)| *i < max_bytes)
        .last()
        .map(|(i, c)| {
            let end = i + c.len_utf8();
            if end > max_bytes {
                i
            } else {
                end
            }
        })
        .unwrap_or(0)
}

/// Shorten text for log lines, appending `...` when cut.
pub fn preview(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        s.to_string()
    } else {
        format!("{}...", &s[..safe_truncate_index(s, max_bytes)])
    }
}
