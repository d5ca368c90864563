//! String helpers.

/// Truncate `s` to at most `max_chars` characters on a char boundary,
/// appending an ellipsis when anything was cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_untouched() {
        assert_eq!(truncate_chars("hold", 10), "hold");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn long_text_cut_with_ellipsis() {
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
    }

    #[test]
    fn multibyte_boundary_is_respected() {
        assert_eq!(truncate_chars("ééééé", 2), "éé...");
    }
}
