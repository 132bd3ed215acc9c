use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Truncates a string to at most `max_width` terminal columns, appending
/// "..." if truncated. Wide characters (e.g. CJK) count as two columns.
pub fn truncate_str(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }

    let budget = max_width.saturating_sub(3);
    let mut width = 0;
    let mut end = 0;
    for (i, c) in s.char_indices() {
        let w = c.width().unwrap_or(0);
        if width + w > budget {
            break;
        }
        width += w;
        end = i + c.len_utf8();
    }
    format!("{}...", &s[..end])
}

/// Pads with spaces to exactly `width` columns, truncating when longer.
pub fn fit_width(s: &str, width: usize) -> String {
    let truncated = truncate_str(s, width);
    let pad = width.saturating_sub(truncated.width());
    format!("{}{}", truncated, " ".repeat(pad))
}
