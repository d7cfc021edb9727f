/// The workflow service fills optional form fields with literal "NONE" or
/// "NULL" when it has nothing to say. Treat those, empty strings and
/// whitespace as absent so they never leak into persisted state.
pub fn normalize(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("NONE")
        || trimmed.eq_ignore_ascii_case("NULL")
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_sentinels() {
        assert_eq!(normalize(Some("none")), None);
        assert_eq!(normalize(Some("NONE")), None);
        assert_eq!(normalize(Some("Null")), None);
        assert_eq!(normalize(Some("  ")), None);
        assert_eq!(normalize(Some("")), None);
        assert_eq!(normalize(None), None);
    }

    #[test]
    fn test_normalize_keeps_real_values() {
        assert_eq!(normalize(Some("BTC")), Some("BTC".to_string()));
        assert_eq!(normalize(Some("  ETH  ")), Some("ETH".to_string()));
        // "NONEXISTENT" is not the sentinel literal
        assert_eq!(
            normalize(Some("NONEXISTENT")),
            Some("NONEXISTENT".to_string())
        );
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(None));
        assert!(is_blank(Some("   ")));
        assert!(!is_blank(Some("x")));
    }
}
