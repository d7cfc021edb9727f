use std::sync::OnceLock;

use regex::Regex;

/// Max length of a report summary; longer DB values would be truncated by
/// the column anyway, so cut cleanly here.
pub const SUMMARY_LIMIT: usize = 250;

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_len).collect();
    format!("{}...(truncated)", cut)
}

pub fn trim_summary(s: &str) -> String {
    let trimmed = s.trim();
    trimmed.chars().take(SUMMARY_LIMIT).collect()
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"))
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Markup-heavy feed content is fed to the second analysis pass as plain
/// prompt text.
pub fn strip_html(s: &str) -> String {
    let no_tags = tag_regex().replace_all(s, " ");
    whitespace_regex().replace_all(&no_tags, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_marks_cut_content() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd...(truncated)");
    }

    #[test]
    fn test_trim_summary_caps_length() {
        let long = "x".repeat(400);
        assert_eq!(trim_summary(&long).len(), SUMMARY_LIMIT);
        assert_eq!(trim_summary("  padded  "), "padded");
    }

    #[test]
    fn test_strip_html_flattens_markup() {
        assert_eq!(
            strip_html("<p>BTC  breaks\n<b>all-time</b> high</p>"),
            "BTC breaks all-time high"
        );
        assert_eq!(strip_html("plain"), "plain");
    }
}
