use chrono::{DateTime, Local, TimeZone};

pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    kept + "..."
}

pub(crate) fn format_updated_display(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M %:z")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}

pub(crate) fn format_last_checked(millis: i64) -> String {
    if millis <= 0 {
        return "never".to_string();
    }
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M %:z").to_string(),
        None => millis.to_string(),
    }
}

pub(crate) fn format_offset(seconds: f64) -> String {
    let centis = (seconds * 100.0).round() as i64;
    let minutes = centis / 6_000;
    let rest = centis % 6_000;
    format!("{minutes}:{:02}.{:02}", rest / 100, rest % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text_and_marks_cut_text() {
        assert_eq!(truncate("Frieren", 10), "Frieren");
        assert_eq!(truncate("Sousou no Frieren", 10), "Sousou ...");
        assert_eq!(truncate("葬送のフリーレン", 6), "葬送の...");
    }

    #[test]
    fn unparseable_timestamp_is_shown_raw() {
        assert_eq!(format_updated_display("yesterday"), "yesterday");
        assert!(format_updated_display("2024-03-01T10:00:00+00:00").starts_with("2024-03-0"));
    }

    #[test]
    fn offsets_and_checks_render_for_humans() {
        assert_eq!(format_offset(658.73), "10:58.73");
        assert_eq!(format_offset(0.0), "0:00.00");
        assert_eq!(format_last_checked(0), "never");
        assert!(format_last_checked(1_700_000_000_000).starts_with("2023-11-1"));
    }
}
