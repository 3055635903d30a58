//! Presentation views over event collections.
//!
//! Two alternate groupings are derived from a flat list of events:
//!
//! - [`group_by_year`]: a chronological view, newest first, bucketed by the
//!   calendar year of `start_date`.
//! - [`group_by_type`]: a categorical view, one bucket per event type, each
//!   bucket newest first.
//!
//! Both are pure: the input slice is never reordered and the output owns
//! clones of the records. Unparseable dates never abort a grouping; they are
//! logged and land in the [`YearBucket::Undated`] bucket.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::models::Event;

/// Label of the bucket holding events whose start date cannot be parsed.
pub const UNDATED_LABEL: &str = "undated";

// ============================================================================
// DATE PARSING
// ============================================================================

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an event date.
///
/// Accepts RFC 3339 timestamps, naive date-times and plain `YYYY-MM-DD`
/// dates. Naive values are taken as UTC.
pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_start(event: &Event) -> Option<DateTime<Utc>> {
    let parsed = parse_event_date(&event.start_date);
    if parsed.is_none() {
        tracing::warn!(
            event_id = event.id,
            start_date = %event.start_date,
            "Invalid start date for event"
        );
    }
    parsed
}

/// Newest-first ordering on optional start dates.
///
/// An unparseable left operand sorts after, an unparseable right operand
/// sorts before. Two unparseable dates compare equal so the stable sort keeps
/// their input order.
pub fn compare_start_desc(a: Option<&DateTime<Utc>>, b: Option<&DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => b.cmp(a),
    }
}

fn sort_newest_first(events: impl IntoIterator<Item = Event>) -> Vec<(Option<DateTime<Utc>>, Event)> {
    let mut dated: Vec<_> = events
        .into_iter()
        .map(|event| (parse_start(&event), event))
        .collect();
    dated.sort_by(|(a, _), (b, _)| compare_start_desc(a.as_ref(), b.as_ref()));
    dated
}

// ============================================================================
// GROUP BY YEAR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum YearBucket {
    Year(i32),
    /// Start date could not be parsed.
    Undated,
}

impl YearBucket {
    pub fn label(&self) -> String {
        match self {
            YearBucket::Year(year) => year.to_string(),
            YearBucket::Undated => UNDATED_LABEL.to_string(),
        }
    }

    pub fn year(&self) -> Option<i32> {
        match self {
            YearBucket::Year(year) => Some(*year),
            YearBucket::Undated => None,
        }
    }
}

impl fmt::Display for YearBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearGroup {
    pub year: YearBucket,
    pub events: Vec<Event>,
}

/// Chronological view: years descending, events newest first within a year.
///
/// Undated events form the last group.
pub fn group_by_year(events: &[Event]) -> Vec<YearGroup> {
    let mut groups: Vec<YearGroup> = Vec::new();
    for (start, event) in sort_newest_first(events.iter().cloned()) {
        let bucket = match start {
            Some(at) => YearBucket::Year(at.year()),
            None => YearBucket::Undated,
        };
        // The global sort keeps each year contiguous.
        match groups.last_mut() {
            Some(group) if group.year == bucket => group.events.push(event),
            _ => groups.push(YearGroup {
                year: bucket,
                events: vec![event],
            }),
        }
    }
    tracing::debug!(
        years = ?groups.iter().map(|g| g.year.label()).collect::<Vec<_>>(),
        "Grouped events by year"
    );
    groups
}

// ============================================================================
// GROUP BY TYPE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TypeGroup {
    pub event_type: String,
    pub events: Vec<Event>,
}

/// Categorical view: one group per event type, in first-appearance order,
/// each sorted newest first.
pub fn group_by_type(events: &[Event]) -> Vec<TypeGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut buckets: Vec<(String, Vec<Event>)> = Vec::new();
    for event in events {
        let slot = *index.entry(event.event_type.as_str()).or_insert_with(|| {
            buckets.push((event.event_type.clone(), Vec::new()));
            buckets.len() - 1
        });
        buckets[slot].1.push(event.clone());
    }

    buckets
        .into_iter()
        .map(|(event_type, bucket)| TypeGroup {
            event_type,
            events: sort_newest_first(bucket)
                .into_iter()
                .map(|(_, event)| event)
                .collect(),
        })
        .collect()
}

// ============================================================================
// DATE FORMATTING
// ============================================================================

/// Medium date styles supported by the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    /// `May 1, 2024`
    English,
    /// `2024年5月1日`
    Cjk,
    /// `2024년 5월 1일`
    Korean,
    /// `1. Mai 2024`
    German,
    /// `1 mai 2024`
    French,
}

impl DateStyle {
    /// Pick the style for a BCP 47 locale tag. Unknown locales use English.
    pub fn for_locale(locale: &str) -> Self {
        let primary = locale
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "zh" | "ja" => DateStyle::Cjk,
            "ko" => DateStyle::Korean,
            "de" => DateStyle::German,
            "fr" => DateStyle::French,
            _ => DateStyle::English,
        }
    }

    pub fn format(&self, date: &DateTime<Utc>) -> String {
        let (year, month, day) = (date.year(), date.month(), date.day());
        match self {
            DateStyle::English => date.format("%b %-d, %Y").to_string(),
            DateStyle::Cjk => format!("{}年{}月{}日", year, month, day),
            DateStyle::Korean => format!("{}년 {}월 {}일", year, month, day),
            DateStyle::German => format!("{}. {} {}", day, GERMAN_MONTHS[month0(date)], year),
            DateStyle::French => format!("{} {} {}", day, FRENCH_MONTHS[month0(date)], year),
        }
    }
}

const GERMAN_MONTHS: [&str; 12] = [
    "Jan.", "Feb.", "März", "Apr.", "Mai", "Juni", "Juli", "Aug.", "Sept.", "Okt.", "Nov.", "Dez.",
];

const FRENCH_MONTHS: [&str; 12] = [
    "janv.", "févr.", "mars", "avr.", "mai", "juin", "juil.", "août", "sept.", "oct.", "nov.",
    "déc.",
];

fn month0(date: &DateTime<Utc>) -> usize {
    date.month0() as usize
}

fn format_one(raw: &str, style: DateStyle) -> String {
    match parse_event_date(raw) {
        Some(date) => style.format(&date),
        None => {
            tracing::warn!(date = %raw, "Cannot format invalid date");
            raw.to_string()
        }
    }
}

fn same_date(start: &str, end: &str) -> bool {
    start == end
        || matches!(
            (parse_event_date(start), parse_event_date(end)),
            (Some(a), Some(b)) if a == b
        )
}

/// Render an event's date range for display.
///
/// A missing end date, or one equal to the start, yields the single formatted
/// start date.
pub fn format_date_range(start: &str, end: Option<&str>, locale: &str) -> String {
    let style = DateStyle::for_locale(locale);
    match end {
        Some(end) if !same_date(start, end) => {
            format!("{} - {}", format_one(start, style), format_one(end, style))
        }
        _ => format_one(start, style),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(id: i64, event_type: &str, start: &str) -> Event {
        serde_json::from_value(json!({
            "id": id,
            "name": format!("event-{}", id),
            "slug": format!("event-{}", id),
            "type": event_type,
            "start_date": start,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    fn ids(events: &[Event]) -> Vec<i64> {
        events.iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_parse_event_date_formats() {
        assert!(parse_event_date("2024-05-01").is_some());
        assert!(parse_event_date("2024-05-01T10:00:00Z").is_some());
        assert!(parse_event_date("2024-05-01T10:00:00+09:00").is_some());
        assert!(parse_event_date("2024-05-01T10:00:00").is_some());
        assert!(parse_event_date("2024-05-01 10:00:00.250").is_some());
        assert!(parse_event_date("not a date").is_none());
        assert!(parse_event_date("").is_none());
    }

    #[test]
    fn test_group_by_year_scenario() {
        let events = vec![
            event(1, "M3", "2024-05-01"),
            event(2, "M3", "2023-11-20"),
            event(3, "Comiket", "2024-01-10"),
        ];
        let groups = group_by_year(&events);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].year, YearBucket::Year(2024));
        assert_eq!(ids(&groups[0].events), vec![1, 3]);
        assert_eq!(groups[1].year, YearBucket::Year(2023));
        assert_eq!(ids(&groups[1].events), vec![2]);
        // Input untouched.
        assert_eq!(ids(&events), vec![1, 2, 3]);
    }

    #[test]
    fn test_group_by_year_undated_bucket_is_last() {
        let events = vec![
            event(1, "M3", "garbage"),
            event(2, "M3", "2022-03-01"),
            event(3, "M3", "also garbage"),
            event(4, "M3", "2024-08-12"),
        ];
        let groups = group_by_year(&events);

        let labels: Vec<_> = groups.iter().map(|g| g.year.label()).collect();
        assert_eq!(labels, vec!["2024", "2022", UNDATED_LABEL]);
        assert_eq!(ids(&groups[2].events), vec![1, 3]);
    }

    #[test]
    fn test_group_by_year_empty() {
        assert!(group_by_year(&[]).is_empty());
    }

    #[test]
    fn test_comparator_is_asymmetric_for_invalid_operands() {
        let valid = parse_event_date("2024-01-01");
        assert_eq!(compare_start_desc(None, valid.as_ref()), Ordering::Greater);
        assert_eq!(compare_start_desc(valid.as_ref(), None), Ordering::Less);
        assert_eq!(compare_start_desc(None, None), Ordering::Equal);
    }

    #[test]
    fn test_group_by_type_first_appearance_order() {
        let events = vec![
            event(1, "M3", "2023-04-30"),
            event(2, "Comiket", "2023-12-30"),
            event(3, "M3", "2024-04-28"),
            event(4, "Reitaisai", "2024-05-03"),
            event(5, "Comiket", "2024-08-11"),
        ];
        let groups = group_by_type(&events);

        let types: Vec<_> = groups.iter().map(|g| g.event_type.as_str()).collect();
        assert_eq!(types, vec!["M3", "Comiket", "Reitaisai"]);
        assert_eq!(ids(&groups[0].events), vec![3, 1]);
        assert_eq!(ids(&groups[1].events), vec![5, 2]);
        assert_eq!(ids(&groups[2].events), vec![4]);
    }

    #[test]
    fn test_format_date_range_single_and_range() {
        assert_eq!(format_date_range("2024-05-01", None, "en"), "May 1, 2024");
        assert_eq!(
            format_date_range("2024-05-01", Some("2024-05-01"), "en"),
            "May 1, 2024"
        );
        assert_eq!(
            format_date_range("2024-12-30", Some("2024-12-31"), "en-US"),
            "Dec 30, 2024 - Dec 31, 2024"
        );
    }

    #[test]
    fn test_format_date_range_equal_instants() {
        assert_eq!(
            format_date_range("2024-05-01", Some("2024-05-01T00:00:00Z"), "en"),
            format_date_range("2024-05-01", None, "en")
        );
    }

    #[test]
    fn test_format_date_range_locales() {
        assert_eq!(format_date_range("2024-05-01", None, "zh-CN"), "2024年5月1日");
        assert_eq!(format_date_range("2024-05-01", None, "ja"), "2024年5月1日");
        assert_eq!(format_date_range("2024-05-01", None, "ko-KR"), "2024년 5월 1일");
        assert_eq!(format_date_range("2024-03-01", None, "de-DE"), "1. März 2024");
        assert_eq!(format_date_range("2024-08-15", None, "fr"), "15 août 2024");
        assert_eq!(format_date_range("2024-05-01", None, "xx"), "May 1, 2024");
    }

    #[test]
    fn test_format_date_range_invalid_is_verbatim() {
        assert_eq!(format_date_range("TBD", None, "en"), "TBD");
        assert_eq!(
            format_date_range("2024-05-01", Some("TBD"), "en"),
            "May 1, 2024 - TBD"
        );
    }

    #[test]
    fn test_date_style_for_locale() {
        assert_eq!(DateStyle::for_locale("zh_TW"), DateStyle::Cjk);
        assert_eq!(DateStyle::for_locale("EN-gb"), DateStyle::English);
        assert_eq!(DateStyle::for_locale(""), DateStyle::English);
    }
}
