use chrono::{DateTime, Duration, NaiveDate};

const ABSOLUTE_FORMATS: &[&str] = &[
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y-%m-%d",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Parses the date cell of a listing row. Relative phrases ("3 hours ago",
/// "yesterday") are resolved against `today`.
pub fn parse_release_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    if let Some(date) = parse_relative(&text.to_ascii_lowercase(), today) {
        return Some(date);
    }

    // two-digit years must be tried before %Y, which would read "24" as AD 24
    for format in ABSOLUTE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&text, format) {
            return Some(date);
        }
    }

    DateTime::parse_from_rfc3339(&text)
        .ok()
        .map(|dt| dt.date_naive())
}

fn parse_relative(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    match text {
        "today" | "just now" => return Some(today),
        "yesterday" => return today.checked_sub_signed(Duration::try_days(1)?),
        _ => {}
    }

    let rest = text.strip_suffix(" ago")?;
    let (amount, unit) = rest.split_once(' ')?;
    let amount: i64 = match amount {
        "a" | "an" => 1,
        n => n.parse().ok()?,
    };

    let offset = match unit.trim_end_matches('s') {
        // sub-day offsets resolve to today
        "sec" | "second" | "min" | "minute" | "hour" | "hr" => Duration::zero(),
        "day" => Duration::try_days(amount)?,
        "week" => Duration::try_weeks(amount)?,
        "month" => Duration::try_days(amount.checked_mul(30)?)?,
        "year" => Duration::try_days(amount.checked_mul(365)?)?,
        _ => return None,
    };

    today.checked_sub_signed(offset)
}
