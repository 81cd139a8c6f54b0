/// Format an elapsed number of seconds for display ("just now", "5m", "2h", "3d")
pub fn format_age(seconds: i64) -> String {
    let minutes = seconds / 60;
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h", hours + 1)
        } else {
            format!("{}h", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d", days + 1)
        } else {
            format!("{}d", days)
        }
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Score with two decimals, the way match results are usually published
pub fn format_score(score: f64) -> String {
    format!("{:.2}", score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(-30), "just now");
        assert_eq!(format_age(59), "just now");
        assert_eq!(format_age(5 * 60), "5m");
        assert_eq!(format_age(90 * 60), "2h");
        assert_eq!(format_age(80 * 60), "1h");
        assert_eq!(format_age(3 * 1440 * 60), "3d");
        assert_eq!(format_age((1440 + 13 * 60) * 60), "2d");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(73.710073), "73.71");
        assert_eq!(format_score(150.0), "150.00");
    }
}
