use std::sync::LazyLock;

use chrono::{Duration, Local, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use scraper::{Html, Selector};

use super::types::CourseMetadata;

pub const DEFAULT_PREREQS: &str = "There are no prerequisites for this course.";
pub const DEFAULT_DESC: &str = "There is no description provided for this course.";
pub const DEFAULT_GRADING: &str = "Graded";
pub const UNKNOWN_CREDITS: &str = "Unknown Credits";

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".single-course > h3:nth-child(2)").unwrap());
static GRADING: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".grading-basis").unwrap());
static CREDITS: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".credits").unwrap());
static PREREQS: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".prerequisites").unwrap());
static LAST_REFRESH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".last-refresh").unwrap());
static DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".description").unwrap());

static TITLE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{3,4}(?:Q|E|W)*\.\s").unwrap());
static PREREQ_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Prerequisites?:\s").unwrap());
static REFRESH_FRACTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\d{6}").unwrap());

const REFRESH_FORMATS: &[&str] = &["%d-%b-%y %I:%M:%S %p", "%d-%b-%Y %I:%M:%S %p"];

/// Parse the header blocks of a catalog page. Missing blocks fall back to
/// their documented defaults.
pub fn parse_metadata(html: &str) -> CourseMetadata {
    let document = Html::parse_document(html);
    let text_of = |selector: &Selector| {
        document
            .select(selector)
            .next()
            .map(|e| e.text().collect::<String>())
            .unwrap_or_default()
    };

    CourseMetadata {
        name: parse_title(&text_of(&TITLE)),
        grading: parse_grading(&text_of(&GRADING)),
        credits: parse_credits(&text_of(&CREDITS)),
        prereqs: normalize_prereqs(&text_of(&PREREQS)),
        last_data_marker: parse_refresh_marker(&text_of(&LAST_REFRESH))
            .unwrap_or_else(|| Local::now().naive_local()),
        description: non_empty_or(&text_of(&DESCRIPTION), DEFAULT_DESC),
    }
}

/// "CSE 1010. Introduction to Computing" -> "Introduction to Computing".
pub fn parse_title(raw: &str) -> String {
    let raw = raw.trim();
    match TITLE_CODE_RE.splitn(raw, 2).nth(1) {
        Some(name) => name.trim().to_string(),
        None => raw.to_string(),
    }
}

pub fn parse_grading(raw: &str) -> String {
    raw.trim()
        .split("Grading Basis: ")
        .nth(1)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_GRADING)
        .to_string()
}

pub fn parse_credits(raw: &str) -> String {
    raw.trim()
        .split(' ')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_CREDITS)
        .to_string()
}

/// Strip the "Prerequisites:" label and any trailing recommended preparation.
/// "None." and empty blocks normalize to [`DEFAULT_PREREQS`].
pub fn normalize_prereqs(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || raw == DEFAULT_PREREQS {
        return DEFAULT_PREREQS.to_string();
    }

    let parts: Vec<&str> = PREREQ_LABEL_RE.split(raw).collect();
    let mut prereqs = if parts.len() == 1 { parts[0] } else { parts[1] }.trim();

    if prereqs.contains("None.") {
        return DEFAULT_PREREQS.to_string();
    }
    if let Some((before, _)) = prereqs.split_once("Recommended Preparation") {
        prereqs = before.trim();
    }
    non_empty_or(prereqs, DEFAULT_PREREQS)
}

/// "16-OCT-24 03.45.12.123456 PM" -> 2024-10-16 15:45:12.
pub fn parse_refresh_marker(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let normalized = REFRESH_FRACTION_RE
        .replace_all(&raw.replace('.', ":"), "")
        .to_string();
    REFRESH_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
}

/// Marker for answers served from offline mappings: today at midnight, or
/// 18:00 yesterday when it is not yet 06:00.
pub fn offline_marker(now: NaiveDateTime) -> NaiveDateTime {
    let midnight = now.date().and_time(NaiveTime::MIN);
    if now.hour() < 6 {
        midnight - Duration::hours(6)
    } else {
        midnight
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn undergrad_fixture_metadata() {
        let html = std::fs::read_to_string("tests/fixtures/course_undergrad.html").unwrap();
        let meta = parse_metadata(&html);
        assert_eq!(meta.name, "Introduction to Computing for Engineers");
        assert_eq!(meta.grading, "Graded");
        assert_eq!(meta.credits, "3");
        assert_eq!(meta.prereqs, "MATH 1131Q.");
        assert_eq!(meta.last_data_marker, at(2024, 10, 16, 15, 45, 12));
        assert!(meta.description.starts_with("Introduction to computing logic"));
    }

    #[test]
    fn grad_fixture_defaults() {
        let html = std::fs::read_to_string("tests/fixtures/course_grad.html").unwrap();
        let meta = parse_metadata(&html);
        assert_eq!(meta.name, "Advanced Organic Chemistry");
        assert_eq!(meta.grading, DEFAULT_GRADING);
        assert_eq!(meta.prereqs, DEFAULT_PREREQS);
        assert_eq!(meta.description, DEFAULT_DESC);
    }

    #[test]
    fn empty_page_defaults() {
        let meta = parse_metadata("<html></html>");
        assert_eq!(meta.credits, UNKNOWN_CREDITS);
        assert_eq!(meta.grading, DEFAULT_GRADING);
        assert_eq!(meta.prereqs, DEFAULT_PREREQS);
        assert_eq!(meta.description, DEFAULT_DESC);
        assert_eq!(meta.name, "");
    }

    #[test]
    fn prereq_normalization() {
        assert_eq!(normalize_prereqs("Prerequisite: CSE 1010."), "CSE 1010.");
        assert_eq!(normalize_prereqs("Prerequisites: None."), DEFAULT_PREREQS);
        assert_eq!(
            normalize_prereqs("Open to juniors or higher. Recommended Preparation: STAT 1000Q."),
            "Open to juniors or higher."
        );
        assert_eq!(normalize_prereqs("  "), DEFAULT_PREREQS);
    }

    #[test]
    fn refresh_marker_formats() {
        assert_eq!(
            parse_refresh_marker("01-FEB-25 9.05.00.000000 AM"),
            Some(at(2025, 2, 1, 9, 5, 0))
        );
        assert_eq!(parse_refresh_marker("not a date"), None);
        assert_eq!(parse_refresh_marker(""), None);
    }

    #[test]
    fn offline_marker_window() {
        assert_eq!(offline_marker(at(2024, 10, 16, 14, 0, 0)), at(2024, 10, 16, 0, 0, 0));
        assert_eq!(offline_marker(at(2024, 10, 16, 3, 0, 0)), at(2024, 10, 15, 18, 0, 0));
    }
}
