use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

/// Start/end of a coverage window in HHMM. An end earlier than the start falls on the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShiftWindow {
    pub start: &'static str,
    pub end: &'static str,
}

pub const MORNING: ShiftWindow = ShiftWindow { start: "0600", end: "1800" };
pub const AFTERNOON: ShiftWindow = ShiftWindow { start: "1200", end: "1800" };
pub const EVENING: ShiftWindow = ShiftWindow { start: "1800", end: "0600" };

pub const PHRASE_TABLE: [(&str, ShiftWindow); 4] = [
    ("morning", MORNING),
    ("afternoon", AFTERNOON),
    ("evening", EVENING),
    ("tonight", EVENING),
];

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

pub fn window_for_phrase(phrase: &str) -> Option<ShiftWindow> {
    let phrase = phrase.trim().to_lowercase();
    PHRASE_TABLE
        .iter()
        .find(|(name, _)| *name == phrase)
        .map(|(_, window)| *window)
}

/// Normalizes a time-of-day to four-digit HHMM.
///
/// Accepts `HHMM`, `HMM`, `HH:MM`, and the literals `midnight` (0000) and `noon` (1200).
pub fn normalize_hhmm(raw: &str) -> Option<String> {
    let value = raw.trim().to_lowercase();
    match value.as_str() {
        "midnight" => return Some("0000".to_string()),
        "noon" => return Some("1200".to_string()),
        _ => {}
    }
    let digits = match value.split_once(':') {
        Some((hours, minutes)) => {
            if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
                return None;
            }
            format!("{}{}", hours, minutes)
        }
        None => value,
    };
    if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let padded = format!("{:0>4}", digits);
    let hours: u32 = padded[..2].parse().ok()?;
    let minutes: u32 = padded[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(padded)
}

/// Parses `YYYYMMDD` (or `YYYY-MM-DD`) into a real calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let compact: String = raw.trim().chars().filter(|c| *c != '-').collect();
    if compact.len() != 8 {
        return None;
    }
    NaiveDate::parse_from_str(&compact, "%Y%m%d").ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Parses an explicit range such as `1800 - midnight` or `0600-1800`.
pub fn parse_explicit_range(raw: &str) -> Option<(String, String)> {
    let (start, end) = raw.split_once('-')?;
    Some((normalize_hhmm(start)?, normalize_hhmm(end)?))
}

/// Next occurrence of `weekday` strictly after `from`.
pub fn next_weekday(from: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = from.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut days = (target - current).rem_euclid(7);
    if days == 0 {
        days = 7;
    }
    from + Duration::days(days)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedShift {
    pub date: String,
    pub shift_start: String,
    pub shift_end: String,
}

/// Resolves a colloquial reference ("Saturday morning", "tonight", "tomorrow 1800 - midnight")
/// to an absolute date and window, relative to `today`.
///
/// Defaults to the evening window on `today` when nothing more specific is present.
pub fn resolve_reference(reference: &str, today: NaiveDate) -> ResolvedShift {
    let lower = reference.to_lowercase();

    let mut date = today;
    if lower.contains("tomorrow") {
        date = today + Duration::days(1);
    } else if let Some((_, weekday)) = WEEKDAYS.iter().find(|(name, _)| lower.contains(name)) {
        date = next_weekday(today, *weekday);
    }

    let explicit = lower
        .split(|c: char| c == ',' || c == ';')
        .find_map(|part| {
            let part = part.trim();
            let range_start = part.find(|c: char| c.is_ascii_digit())?;
            parse_explicit_range(&part[range_start..])
        });

    let (shift_start, shift_end) = match explicit {
        Some(range) => range,
        None => {
            let window = PHRASE_TABLE
                .iter()
                .find(|(name, _)| lower.contains(name))
                .and_then(|(name, _)| window_for_phrase(name))
                .unwrap_or(EVENING);
            (window.start.to_string(), window.end.to_string())
        }
    };

    ResolvedShift {
        date: format_date(date),
        shift_start,
        shift_end,
    }
}

/// Markdown rendering of the phrase table, embedded in model prompts.
pub fn render_table() -> String {
    let mut table = String::from("| phrase | start | end |\n|---|---|---|\n");
    for (phrase, window) in PHRASE_TABLE.iter() {
        let next_day = if window.end < window.start { " (next day)" } else { "" };
        table.push_str(&format!(
            "| {} | {} | {}{} |\n",
            phrase, window.start, window.end, next_day
        ));
    }
    table.push_str("| explicit \"HHMM - HHMM\" | as given | as given, \"midnight\" = 0000 |\n");
    table
}
