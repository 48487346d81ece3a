pub mod course;
pub mod enrollment;
pub mod metadata;
pub mod search;
pub mod section;
pub mod table;
pub mod text;
pub mod types;

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Settings;

pub use search::Catalog;
pub use table::CatalogVariant;
pub use types::*;

static COURSE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]{2,4}\d{3,4}(Q|E|W)*$").unwrap());
static SECTION_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(H|Z|W|N)*\d{2,3}(L|D|X)*$").unwrap());

/// Numbers above this are listed in the graduate catalog.
const GRADUATE_THRESHOLD: u32 = 5000;
/// Pharmacy numbers from here up stay in the undergraduate catalog.
const PHRX_GRADUATE_CEILING: u32 = 5199;

/// A validated course identifier such as `CSE1010` or `ENGL1010W`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CourseCode {
    pub prefix: String,
    pub number: String,
}

impl CourseCode {
    pub fn parse(identifier: &str) -> Option<Self> {
        let identifier = identifier.trim();
        if !COURSE_IDENTIFIER.is_match(identifier) {
            return None;
        }
        let split = identifier.find(|c: char| c.is_ascii_digit())?;
        Some(Self {
            prefix: identifier[..split].to_ascii_uppercase(),
            number: identifier[split..].to_ascii_uppercase(),
        })
    }

    pub fn numeric(&self) -> u32 {
        self.number
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .unwrap_or(0)
    }

    pub fn variant(&self) -> CatalogVariant {
        let num = self.numeric();
        if num > GRADUATE_THRESHOLD && (self.prefix != "PHRX" || num < PHRX_GRADUATE_CEILING) {
            CatalogVariant::Graduate
        } else {
            CatalogVariant::Undergraduate
        }
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.number)
    }
}

pub fn is_section_identifier(section: &str) -> bool {
    SECTION_IDENTIFIER.is_match(&section.trim().to_ascii_uppercase())
}

/// Catalog page URL for a course, together with the variant it resolves to.
pub fn catalog_url(settings: &Settings, code: &CourseCode) -> (String, CatalogVariant) {
    let variant = code.variant();
    let url = match variant {
        CatalogVariant::Graduate => format!(
            "{}/{}/{}/",
            settings.grad_catalog_url.trim_end_matches('/'),
            code.prefix,
            code.number
        ),
        CatalogVariant::Undergraduate => {
            let number = if code.number.len() == 3 {
                format!("%20{}", code.number)
            } else {
                code.number.clone()
            };
            format!(
                "{}/{}/{}/",
                settings.catalog_url.trim_end_matches('/'),
                code.prefix,
                number
            )
        }
    };
    (url, variant)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Campus {
    #[default]
    Any,
    Storrs,
    Hartford,
    Stamford,
    Waterbury,
    AveryPoint,
}

impl Campus {
    pub fn as_str(self) -> &'static str {
        match self {
            Campus::Any => "any",
            Campus::Storrs => "storrs",
            Campus::Hartford => "hartford",
            Campus::Stamford => "stamford",
            Campus::Waterbury => "waterbury",
            Campus::AveryPoint => "avery_point",
        }
    }

    /// Whether a campus label from the section table belongs to this campus.
    /// Labels normalize by lowercasing and replacing spaces with underscores.
    pub fn matches_label(self, label: &str) -> bool {
        self == Campus::Any || label.trim().replace(' ', "_").to_lowercase() == self.as_str()
    }
}

impl fmt::Display for Campus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Campus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().replace(' ', "_").to_lowercase().as_str() {
            "any" => Ok(Campus::Any),
            "storrs" => Ok(Campus::Storrs),
            "hartford" => Ok(Campus::Hartford),
            "stamford" => Ok(Campus::Stamford),
            "waterbury" => Ok(Campus::Waterbury),
            "avery_point" => Ok(Campus::AveryPoint),
            other => Err(format!("unknown campus: {}", other)),
        }
    }
}

/// Guess a section's campus from its letter prefix. Storrs and off-campus
/// sections carry no prefix, so both read as Storrs.
pub fn detect_campus(section: &str) -> Campus {
    match section.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('h') => Campus::Hartford,
        Some('z') => Campus::Stamford,
        Some('w') => Campus::Waterbury,
        Some('n') => Campus::AveryPoint,
        _ => Campus::Storrs,
    }
}

/// Parts of a course payload a caller can ask for. Professors depend on
/// sections and are dropped whenever sections are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchParts {
    Sections,
    Professors,
}

pub const DEFAULT_SEARCH_PARTS: &[SearchParts] = &[SearchParts::Sections, SearchParts::Professors];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_identifiers() {
        assert!(CourseCode::parse("CSE1010").is_some());
        assert!(CourseCode::parse("ENGL1010W").is_some());
        assert!(CourseCode::parse("math1131Q").is_some());
        assert!(CourseCode::parse("MATH1131q").is_none());
        assert!(CourseCode::parse("ART100").is_some());
        assert!(CourseCode::parse("C1010").is_none());
        assert!(CourseCode::parse("CSE10").is_none());
        assert!(CourseCode::parse("CSE 1010").is_none());
        assert!(CourseCode::parse("").is_none());
    }

    #[test]
    fn course_code_parts() {
        let code = CourseCode::parse("math1131Q").unwrap();
        assert_eq!(code.prefix, "MATH");
        assert_eq!(code.number, "1131Q");
        assert_eq!(code.numeric(), 1131);
        assert_eq!(code.to_string(), "MATH1131Q");
    }

    #[test]
    fn section_identifiers() {
        for ok in ["001", "H01", "Z01", "002L", "10D", "n01"] {
            assert!(is_section_identifier(ok), "{}", ok);
        }
        for bad in ["1", "ABC", "0001", "Q01"] {
            assert!(!is_section_identifier(bad), "{}", bad);
        }
    }

    #[test]
    fn variant_by_number() {
        let v = |id: &str| CourseCode::parse(id).unwrap().variant();
        assert_eq!(v("CSE1010"), CatalogVariant::Undergraduate);
        assert_eq!(v("CSE5000"), CatalogVariant::Undergraduate);
        assert_eq!(v("CHEM5310"), CatalogVariant::Graduate);
        assert_eq!(v("PHRX5100"), CatalogVariant::Graduate);
        assert_eq!(v("PHRX5199"), CatalogVariant::Undergraduate);
        assert_eq!(v("PHRX5400"), CatalogVariant::Undergraduate);
    }

    #[test]
    fn urls_per_variant() {
        let settings = Settings::default();
        let (url, variant) = catalog_url(&settings, &CourseCode::parse("CHEM5310").unwrap());
        assert_eq!(variant, CatalogVariant::Graduate);
        assert_eq!(url, "https://gradcatalog.uconn.edu/course-descriptions/course/CHEM/5310/");

        let (url, _) = catalog_url(&settings, &CourseCode::parse("CSE1010").unwrap());
        assert_eq!(url, "https://catalog.uconn.edu/directory-of-courses/course/CSE/1010/");

        let (url, _) = catalog_url(&settings, &CourseCode::parse("ART100").unwrap());
        assert_eq!(url, "https://catalog.uconn.edu/directory-of-courses/course/ART/%20100/");
    }

    #[test]
    fn campus_detection() {
        assert_eq!(detect_campus("H01"), Campus::Hartford);
        assert_eq!(detect_campus("Z81"), Campus::Stamford);
        assert_eq!(detect_campus("w01"), Campus::Waterbury);
        assert_eq!(detect_campus("N01"), Campus::AveryPoint);
        assert_eq!(detect_campus("123"), Campus::Storrs);
        assert_eq!(detect_campus(""), Campus::Storrs);
    }

    #[test]
    fn campus_labels() {
        assert!(Campus::AveryPoint.matches_label("Avery Point"));
        assert!(Campus::Storrs.matches_label("STORRS"));
        assert!(!Campus::Storrs.matches_label("Hartford"));
        assert!(Campus::Any.matches_label("anything"));
        assert_eq!("Avery Point".parse::<Campus>().unwrap(), Campus::AveryPoint);
        assert!("mars".parse::<Campus>().is_err());
    }
}
