use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use super::table::{Field, SectionTable};
use super::text::{flip_name, fragment_text, split_breaks};
use super::types::{Enrollment, InternalCodes, LocationEntry, SectionRecord};
use super::Campus;
use crate::catalog::course::INSTRUCTOR_SEPARATOR;

static ENROLLMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*/\s*(\d+)").unwrap());
static WAITLIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Waitlist Spaces:\s*(\d+)").unwrap());

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static TERM_CODE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.term-code").unwrap());
static CLASS_NUMBER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.class-number").unwrap());
static CLASS_SECTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.class-section").unwrap());
static SESSION_CODE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.session-code").unwrap());

const WAITLIST_MARKER: &str = "Waitlist Spaces:";
const OFF_CAMPUS: &str = "off-campus";
/// Width of the trailing markup the catalog appends to every schedule cell.
const SCHEDULE_SUFFIX_LEN: usize = 4;

/// Turns the cells of a [`SectionTable`] into [`SectionRecord`]s.
pub struct SectionAssembler<'a> {
    room_directory_host: &'a str,
}

impl<'a> SectionAssembler<'a> {
    pub fn new(room_directory_host: &'a str) -> Self {
        Self { room_directory_host }
    }

    /// Build every record, drop the header entry and off-campus rows, then
    /// scope to `campus`.
    pub fn assemble(&self, table: &SectionTable, campus: Campus) -> Vec<SectionRecord> {
        let built: Vec<SectionRecord> = (0..table.entry_count())
            .map(|entry| self.build(table, entry))
            .collect();

        let records: Vec<SectionRecord> = built
            .into_iter()
            .skip(1)
            .filter(|r| !r.campus.eq_ignore_ascii_case(OFF_CAMPUS))
            .filter(|r| campus.matches_label(&r.campus))
            .collect();

        debug!(
            "Assembled {} of {} table entries for campus {}",
            records.len(),
            table.entry_count().saturating_sub(1),
            campus
        );
        records
    }

    pub fn build(&self, table: &SectionTable, entry: usize) -> SectionRecord {
        SectionRecord {
            internal: parse_internal(table.cell(Field::Internal, entry)),
            term: fragment_text(table.cell(Field::Term, entry)),
            mode: fragment_text(table.cell(Field::Mode, entry)),
            campus: fragment_text(table.cell(Field::Campus, entry)),
            instructor: normalize_instructors(table.cell(Field::Instructor, entry)),
            section: fragment_text(table.cell(Field::Section, entry)),
            session: parse_session(table.cell(Field::Session, entry)),
            schedule: trim_schedule(table.cell(Field::Schedule, entry)),
            location: parse_locations(table.cell(Field::Location, entry), self.room_directory_host),
            enrollment: parse_enrollment(table.cell(Field::Enrollment, entry)),
            notes: fragment_text(table.cell(Field::Notes, entry)),
        }
    }
}

/// `"Smith, John<br>Doe, Jane"` -> `"John Smith & Jane Doe"`.
pub fn normalize_instructors(raw: &str) -> String {
    let raw = raw.replace("&nbsp;", " ");
    split_breaks(&raw)
        .into_iter()
        .map(|part| flip_name(&fragment_text(part)))
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(INSTRUCTOR_SEPARATOR)
}

pub fn trim_schedule(raw: &str) -> String {
    let count = raw.chars().count();
    raw.chars()
        .take(count.saturating_sub(SCHEDULE_SUFFIX_LEN))
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn parse_session(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let session = fragment
        .select(&ANCHOR)
        .next()
        .map(|a| a.text().collect::<String>().trim().to_string());
    session.unwrap_or_else(|| fragment_text(raw))
}

pub fn parse_internal(raw: &str) -> InternalCodes {
    let fragment = Html::parse_fragment(raw);
    let text_of = |selector: &Selector| {
        fragment
            .select(selector)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    };

    InternalCodes {
        term_code: text_of(&TERM_CODE),
        class_number: text_of(&CLASS_NUMBER),
        class_section: text_of(&CLASS_SECTION),
        session_code: text_of(&SESSION_CODE),
    }
}

/// Rooms linked to the room directory become `{name, url}` pairs, anything
/// else is one literal location name.
pub fn parse_locations(raw: &str, room_directory_host: &str) -> Vec<LocationEntry> {
    let entries = if !room_directory_host.is_empty() && raw.contains(room_directory_host) {
        Html::parse_fragment(raw)
            .select(&ANCHOR)
            .map(|a| LocationEntry {
                name: a.text().collect::<String>().trim().to_string(),
                url: a.value().attr("href").map(str::to_string),
            })
            .collect()
    } else {
        vec![LocationEntry {
            name: fragment_text(raw),
            url: None,
        }]
    };
    dedup_locations(entries)
}

/// First occurrence of each name wins; empty names are dropped.
pub fn dedup_locations(entries: Vec<LocationEntry>) -> Vec<LocationEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| !e.name.is_empty())
        .filter(|e| seen.insert(e.name.clone()))
        .collect()
}

pub fn parse_enrollment(raw: &str) -> Enrollment {
    let spaces = raw.split('<').next().unwrap_or("");
    let (current, max) = ENROLLMENT_RE
        .captures(spaces)
        .map(|c| {
            (
                c[1].parse::<u32>().unwrap_or(0),
                c[2].parse::<u32>().unwrap_or(0),
            )
        })
        .unwrap_or((0, 0));

    let waitlist = raw.contains(WAITLIST_MARKER).then(|| {
        WAITLIST_RE
            .captures(raw)
            .and_then(|c| c[1].parse::<u32>().ok())
            .unwrap_or(0)
    });

    Enrollment::new(current, max, waitlist)
}
