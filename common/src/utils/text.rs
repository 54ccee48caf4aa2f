/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text.get(..idx).unwrap_or(text),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("₹1,346 crore", 2), "₹1");
        assert_eq!(truncate_chars("short", 50), "short");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
