//! Shared utility functions used across multiple modules.

/// Current Unix timestamp in milliseconds.
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_millis_now_is_positive() {
        assert!(unix_millis_now() > 0);
    }

    #[test]
    fn compact_text_trims_and_truncates() {
        assert_eq!(compact_text("  hello  "), "hello");
        let long = "x".repeat(400);
        assert_eq!(compact_text(&long).len(), 180);
    }
}
