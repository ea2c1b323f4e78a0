use chrono::{DateTime, Utc};

/// Day of month with its English suffix: 1st, 2nd, 11th, 23rd.
pub fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}

pub fn date(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

pub fn date_opt(at: Option<DateTime<Utc>>) -> String {
    at.map(date).unwrap_or_else(|| "\u{2014}".to_string())
}

/// How far `target` is from `now`, in whole days.
pub fn relative(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = target.date_naive().signed_duration_since(now.date_naive()).num_days();
    match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        -1 => "1 day overdue".to_string(),
        d if d > 1 => format!("in {d} days"),
        d => format!("{} days overdue", -d),
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
