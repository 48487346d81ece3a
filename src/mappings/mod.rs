pub mod generate;
pub mod merge;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::info;

use crate::catalog::metadata::{DEFAULT_DESC, DEFAULT_PREREQS, UNKNOWN_CREDITS};
use crate::catalog::CourseMetadata;

pub use generate::UNAVAILABLE;
pub use merge::{merge, run_merge, MergeOptions, MergeOutcome, MergeReport};

/// Older snapshots used this wording for a missing description.
pub const LEGACY_DESC: &str = "There is no description for this course.";

/// General education content areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentArea {
    #[serde(rename = "CA1")]
    Ca1,
    #[serde(rename = "CA2")]
    Ca2,
    #[serde(rename = "CA3")]
    Ca3,
    #[serde(rename = "CA4")]
    Ca4,
    #[serde(rename = "CA4INT")]
    Ca4Int,
}

impl ContentArea {
    pub fn code(self) -> &'static str {
        match self {
            ContentArea::Ca1 => "CA1",
            ContentArea::Ca2 => "CA2",
            ContentArea::Ca3 => "CA3",
            ContentArea::Ca4 => "CA4",
            ContentArea::Ca4Int => "CA4INT",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ContentArea::Ca1 => "Arts and Humanities",
            ContentArea::Ca2 => "Social Sciences",
            ContentArea::Ca3 => "Science and Technology",
            ContentArea::Ca4 => "Diversity and Multiculturalism",
            ContentArea::Ca4Int => "Diversity and Multiculturalism (International)",
        }
    }
}

impl fmt::Display for ContentArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ContentArea {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CA1" => Ok(ContentArea::Ca1),
            "CA2" => Ok(ContentArea::Ca2),
            "CA3" => Ok(ContentArea::Ca3),
            "CA4" => Ok(ContentArea::Ca4),
            "CA4INT" => Ok(ContentArea::Ca4Int),
            other => Err(format!("unknown content area: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAttributes {
    #[serde(default)]
    pub lab: bool,
    #[serde(default)]
    pub writing: bool,
    #[serde(default)]
    pub quantitative: bool,
    #[serde(default)]
    pub environmental: bool,
    #[serde(default, deserialize_with = "known_content_areas")]
    pub content_areas: Vec<ContentArea>,
    #[serde(default)]
    pub graduate: bool,
}

/// Unmapped codes are written as `null` or as raw strings; both are dropped.
fn known_content_areas<'de, D>(deserializer: D) -> Result<Vec<ContentArea>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Option<String>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter_map(|code| code.parse().ok())
        .collect())
}

/// Offline course record produced by the batch scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMapping {
    /// Course identifier, e.g. `CSE1010`.
    pub name: String,
    pub catalog_name: String,
    pub catalog_number: String,
    #[serde(default)]
    pub prerequisites: String,
    #[serde(default)]
    pub attributes: Option<CourseAttributes>,
    #[serde(default)]
    pub credits: Option<u32>,
    #[serde(default)]
    pub grading: String,
    #[serde(default)]
    pub description: String,
}

/// Identity of a mapping across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingKey {
    pub name: String,
    pub catalog_name: String,
    pub catalog_number: String,
}

impl CourseMapping {
    pub fn key(&self) -> MappingKey {
        MappingKey {
            name: self.name.clone(),
            catalog_name: self.catalog_name.clone(),
            catalog_number: self.catalog_number.clone(),
        }
    }

    /// Course metadata served from this record, stamped with `marker`.
    pub fn metadata(&self, marker: NaiveDateTime) -> CourseMetadata {
        CourseMetadata {
            name: self.catalog_name.clone(),
            grading: self.grading.clone(),
            credits: self
                .credits
                .map(|c| c.to_string())
                .unwrap_or_else(|| UNKNOWN_CREDITS.to_string()),
            prereqs: self.prerequisites.clone(),
            last_data_marker: marker,
            description: self.description.clone(),
        }
    }
}

/// Empty text or one of the stand-in sentences the scraper writes when the
/// catalog had nothing.
pub fn is_placeholder(text: &str) -> bool {
    let text = text.trim();
    text.is_empty()
        || text == DEFAULT_PREREQS
        || text == DEFAULT_DESC
        || text == LEGACY_DESC
        || text == UNAVAILABLE
}

#[derive(Debug, Clone, Default)]
pub struct MappingSet {
    records: Vec<CourseMapping>,
}

impl MappingSet {
    pub fn new(records: Vec<CourseMapping>) -> Self {
        Self { records }
    }

    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let records = load_snapshot(path)?;
        info!("Loaded {} course mappings from {}", records.len(), path.display());
        Ok(Self { records })
    }

    pub fn records(&self) -> &[CourseMapping] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Lookup by course identifier, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<&CourseMapping> {
        let name = name.trim();
        self.records.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, key: &MappingKey) -> Option<&CourseMapping> {
        self.records.iter().find(|r| {
            r.name == key.name
                && r.catalog_name == key.catalog_name
                && r.catalog_number == key.catalog_number
        })
    }

    pub fn matching<F>(&self, predicate: F) -> Vec<&CourseMapping>
    where
        F: Fn(&CourseMapping) -> bool,
    {
        self.records.iter().filter(|r| predicate(r)).collect()
    }
}

pub fn load_snapshot(path: impl AsRef<Path>) -> crate::Result<Vec<CourseMapping>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write records as 4-space indented JSON.
pub fn write_snapshot(path: impl AsRef<Path>, records: &[CourseMapping]) -> crate::Result<()> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    records.serialize(&mut ser)?;
    fs::write(path, buf)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    pub fn mapping(name: &str, catalog_name: &str) -> CourseMapping {
        let split = name.find(|c: char| c.is_ascii_digit()).unwrap_or(0);
        CourseMapping {
            name: name.into(),
            catalog_name: catalog_name.into(),
            catalog_number: name[split..].into(),
            prerequisites: DEFAULT_PREREQS.into(),
            attributes: None,
            credits: None,
            grading: String::new(),
            description: DEFAULT_DESC.into(),
        }
    }

    #[test]
    fn reads_snapshot_json() {
        let raw = r#"[{
            "name": "CSE1010",
            "catalogName": "Introduction to Computing for Engineers",
            "catalogNumber": "1010",
            "prerequisites": "MATH 1131Q.",
            "attributes": {"lab": false, "writing": false, "quantitative": true, "environmental": false, "contentAreas": ["CA3"]},
            "credits": 3,
            "grading": "Graded",
            "description": "Intro."
        }, {
            "name": "ART1000",
            "catalogName": "Art",
            "catalogNumber": "1000",
            "credits": null
        }]"#;
        let records: Vec<CourseMapping> = serde_json::from_str(raw).unwrap();
        let attrs = records[0].attributes.as_ref().unwrap();
        assert_eq!(attrs.content_areas, vec![ContentArea::Ca3]);
        assert!(!attrs.graduate);
        assert_eq!(records[1].credits, None);
        assert!(records[1].attributes.is_none());
    }

    #[test]
    fn unknown_content_areas_are_skipped() {
        let raw = r#"[{
            "name": "HIST1100",
            "catalogName": "World History",
            "catalogNumber": "1100",
            "attributes": {"contentAreas": ["CA1", null, "CA9", "ca4int"]}
        }, {
            "name": "HIST1200",
            "catalogName": "US History",
            "catalogNumber": "1200",
            "attributes": {"contentAreas": null}
        }]"#;
        let records: Vec<CourseMapping> = serde_json::from_str(raw).unwrap();
        let areas = &records[0].attributes.as_ref().unwrap().content_areas;
        assert_eq!(areas, &vec![ContentArea::Ca1, ContentArea::Ca4Int]);
        assert!(records[1].attributes.as_ref().unwrap().content_areas.is_empty());
    }

    #[test]
    fn set_queries() {
        let set = MappingSet::new(vec![mapping("CSE1010", "Intro"), mapping("CSE2050", "Data")]);
        assert_eq!(set.find_by_name("cse1010").unwrap().catalog_name, "Intro");
        assert!(set.get(&mapping("CSE2050", "Data").key()).is_some());
        assert!(set.get(&mapping("CSE2050", "Other").key()).is_none());
        assert_eq!(set.matching(|m| m.name.starts_with("CSE")).len(), 2);
    }

    #[test]
    fn metadata_from_mapping() {
        let mut m = mapping("CSE1010", "Intro");
        let marker = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(m.metadata(marker).credits, UNKNOWN_CREDITS);
        m.credits = Some(3);
        let meta = m.metadata(marker);
        assert_eq!(meta.credits, "3");
        assert_eq!(meta.name, "Intro");
        assert_eq!(meta.last_data_marker, marker);
    }

    #[test]
    fn placeholders() {
        assert!(is_placeholder(""));
        assert!(is_placeholder(UNAVAILABLE));
        assert!(is_placeholder(LEGACY_DESC));
        assert!(!is_placeholder("MATH 1131Q."));
    }

    #[test]
    fn content_area_names() {
        assert_eq!("ca4int".parse::<ContentArea>().unwrap(), ContentArea::Ca4Int);
        assert_eq!(ContentArea::Ca1.display_name(), "Arts and Humanities");
        assert!("CA9".parse::<ContentArea>().is_err());
    }

    #[test]
    fn snapshot_uses_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.json");
        write_snapshot(&path, &[mapping("CSE1010", "Intro")]).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n    {\n        \"name\": \"CSE1010\""));
        assert_eq!(load_snapshot(&path).unwrap().len(), 1);
    }
}
