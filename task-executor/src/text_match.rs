//! Shared regex-first, substring-fallback matcher used by `verify` and the
//! `output_contains`/`page_state` success criteria. Both are case
//! insensitive; an unparseable regex degrades to a plain substring test.

/// True if `needle` matches `haystack` as a case-insensitive regex, or
/// (failing that) appears in it as a case-insensitive substring.
pub(crate) fn matches(needle: &str, haystack: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    if let Ok(re) = regex::Regex::new(&format!("(?i){needle}")) {
        if re.is_match(haystack) {
            return true;
        }
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_match_wins_first() {
        assert!(matches(r"^hello\b", "Hello, world"));
    }

    #[test]
    fn invalid_regex_falls_back_to_substring() {
        assert!(matches("(unbalanced", "text with (unbalanced inside"));
    }

    #[test]
    fn case_insensitive_substring() {
        assert!(matches("SUCCESS", "operation success"));
    }

    #[test]
    fn no_match_is_false() {
        assert!(!matches("failure", "all good here"));
    }
}
