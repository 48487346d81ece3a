use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Opaque codes the catalog embeds in the first table column; the enrollment
/// endpoint is keyed by them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalCodes {
    pub term_code: String,
    pub class_number: String,
    pub class_section: String,
    pub session_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub max: u32,
    pub current: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waitlist: Option<u32>,
    pub full: bool,
}

impl Enrollment {
    pub fn new(current: u32, max: u32, waitlist: Option<u32>) -> Self {
        Self {
            max,
            current,
            waitlist,
            full: current >= max,
        }
    }
}

/// One scheduled offering of a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRecord {
    pub internal: InternalCodes,
    pub term: String,
    pub mode: String,
    pub campus: String,
    /// One or more "First Last" names joined by `" & "`.
    pub instructor: String,
    pub section: String,
    pub session: String,
    pub schedule: String,
    pub location: Vec<LocationEntry>,
    pub enrollment: Enrollment,
    pub notes: String,
}

impl SectionRecord {
    pub fn instructors(&self) -> impl Iterator<Item = &str> {
        self.instructor
            .split(crate::catalog::course::INSTRUCTOR_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorRecord {
    pub name: String,
    pub sections: Vec<Arc<SectionRecord>>,
    pub rating_ids: Vec<String>,
}

/// Course-level fields scraped from the catalog page header blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMetadata {
    pub name: String,
    pub grading: String,
    pub credits: String,
    pub prereqs: String,
    pub last_data_marker: NaiveDateTime,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoursePayload {
    #[serde(flatten)]
    pub course: CourseMetadata,
    pub sections: Vec<Arc<SectionRecord>>,
    pub professors: Vec<ProfessorRecord>,
}

impl CoursePayload {
    pub fn metadata_only(course: CourseMetadata) -> Self {
        Self {
            course,
            sections: Vec::new(),
            professors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionPayload {
    #[serde(flatten)]
    pub course: CourseMetadata,
    pub section: Arc<SectionRecord>,
}
