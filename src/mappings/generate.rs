use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::merge::backup_file;
use super::{load_snapshot, write_snapshot, ContentArea, CourseAttributes, CourseMapping};
use crate::catalog::metadata::parse_metadata;
use crate::catalog::table::PivotTable;
use crate::catalog::text::fragment_text;
use crate::catalog::{catalog_url, CatalogVariant, CourseCode, CourseMetadata};
use crate::config::Settings;
use crate::error::CatalogError;
use crate::http::PageSource;

/// Stand-in text for courses whose catalog page could not be fetched.
pub const UNAVAILABLE: &str = "Unavailable";

/// Default output of the graduate generator, next to the canonical file.
pub const GRADUATE_FILE: &str = "courses-grad.json";

/// Subject prefixes with a course listing in the graduate catalog.
pub const GRADUATE_PREFIXES: &[&str] = &[
    "ACCT", "ADMN", "AMES", "AFRI", "AFRA", "ARE", "AGNR", "AH", "AMST", "ANSC", "ANTH", "ALDS",
    "ART", "ARTH", "BASC", "BME", "BIST", "BADM", "BLAW", "CHEG", "CHEM", "CE", "CAMS", "CLTR",
    "COGS", "COMM", "CORG", "CLCS", "CSE", "CHIP", "DENT", "DMD", "DSEL", "DRAM", "ERTH", "EEB",
    "ECON", "EGEN", "EDCI", "EDLR", "EPSY", "ECE", "ENGR", "ENGL", "ENVE", "ES", "EMBA", "FED",
    "FNCE", "FREN", "GEOG", "GERM", "GRAD", "HCMI", "HEJS", "HIST", "HBEL", "HDFS", "HRTS", "IS",
    "INDS", "IGFP", "ISKM", "ISG", "IMS", "IMED", "INTS", "ILCS", "KINS", "LLAS", "LING", "LCL",
    "MENT", "MFGE", "MARN", "MKTG", "MSE", "MATH", "ME", "MLSC", "MEDS", "MCB", "MUSI", "NRE",
    "NURS", "NUSC", "OPIM", "PATH", "PHAR", "PHIL", "PT", "PHYS", "PNB", "PLSC", "POPR", "POLS",
    "POLY", "PSYC", "PUBH", "PP", "RSCH", "ROML", "SSW", "SWEL", "SOCI", "SPAN", "SPTP", "SLHS",
    "STAT", "SE", "TRST", "WGSS",
];

const HREF_COLUMN: usize = 1;
const SUBJECT_COLUMN: usize = 3;
const NUMBER_COLUMN: usize = 4;
const NAME_COLUMN: usize = 5;
const ATTRIBUTE_COLUMN: usize = 6;

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static COURSE_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".single-course > h3").unwrap());

/// One course in the catalog's course-search listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub href: Option<String>,
    pub subject: String,
    pub number: String,
    pub name: String,
    pub attributes: Vec<String>,
    /// Listed by the graduate catalog. Such rows are dropped when their
    /// course page is missing.
    pub graduate: bool,
}

pub fn parse_listing(html: &str) -> Vec<ListingRow> {
    let Some(table) = PivotTable::parse(html) else {
        return Vec::new();
    };

    (1..table.entry_count())
        .map(|entry| ListingRow {
            href: first_href(table.cell(HREF_COLUMN, entry)),
            subject: fragment_text(table.cell(SUBJECT_COLUMN, entry)),
            number: fragment_text(table.cell(NUMBER_COLUMN, entry)),
            name: fragment_text(table.cell(NAME_COLUMN, entry)),
            attributes: anchor_words(table.cell(ATTRIBUTE_COLUMN, entry)),
            graduate: false,
        })
        .filter(|row| !row.subject.is_empty())
        .collect()
}

/// Listing page of one subject in the graduate catalog.
pub fn graduate_listing_url(settings: &Settings, prefix: &str) -> String {
    format!("{}/{}/", settings.grad_catalog_url.trim_end_matches('/'), prefix)
}

/// Course headings of a graduate subject page, `"5310. Title"` or
/// `"CHEM 5310. Title"`. Headings without a valid number are skipped.
pub fn parse_graduate_listing(prefix: &str, html: &str) -> Vec<ListingRow> {
    let doc = Html::parse_document(html);
    let rows: Vec<ListingRow> = doc
        .select(&COURSE_HEADING)
        .filter_map(|heading| {
            let text = heading.text().collect::<String>();
            let (number, name) = text.split_once('.')?;
            let number: String = number.split_whitespace().collect();
            let number = if number.get(..prefix.len()).is_some_and(|h| h.eq_ignore_ascii_case(prefix)) {
                number[prefix.len()..].to_string()
            } else {
                number
            };
            CourseCode::parse(&format!("{}{}", prefix, number))?;
            Some(ListingRow {
                href: None,
                subject: prefix.to_string(),
                number,
                name: name.trim().to_string(),
                attributes: Vec::new(),
                graduate: true,
            })
        })
        .collect();
    rows
}

fn first_href(raw: &str) -> Option<String> {
    Html::parse_fragment(raw)
        .select(&ANCHOR)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

fn anchor_words(raw: &str) -> Vec<String> {
    Html::parse_fragment(raw)
        .select(&ANCHOR)
        .flat_map(|a| {
            a.text()
                .collect::<String>()
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Translate listing attribute codes into flags and content areas.
pub fn attributes_from(codes: &[String], graduate: bool) -> CourseAttributes {
    let has = |code: &str| codes.iter().any(|c| c.eq_ignore_ascii_case(code));

    let mut content_areas: Vec<ContentArea> = Vec::new();
    for code in codes {
        let code = if code.eq_ignore_ascii_case("CA3LAB") { "CA3" } else { code.as_str() };
        if !code.to_ascii_uppercase().starts_with("CA") {
            continue;
        }
        if let Ok(area) = code.parse::<ContentArea>() {
            if !content_areas.contains(&area) {
                content_areas.push(area);
            }
        }
    }

    CourseAttributes {
        lab: has("CA3LAB"),
        writing: has("COMPW"),
        quantitative: has("COMPQ"),
        environmental: has("COMPE"),
        content_areas,
        graduate,
    }
}

/// Mapping for a listing row before its catalog page is consulted.
pub fn skeleton(row: &ListingRow) -> CourseMapping {
    let name = format!("{}{}", row.subject, row.number);
    let graduate = row.graduate
        || CourseCode::parse(&name).is_some_and(|c| c.variant() == CatalogVariant::Graduate);

    CourseMapping {
        attributes: Some(attributes_from(&row.attributes, graduate)),
        name,
        catalog_name: row.name.clone(),
        catalog_number: row.number.clone(),
        prerequisites: UNAVAILABLE.to_string(),
        credits: None,
        grading: UNAVAILABLE.to_string(),
        description: UNAVAILABLE.to_string(),
    }
}

pub fn apply_metadata(mapping: &mut CourseMapping, metadata: CourseMetadata) {
    mapping.credits = metadata.credits.parse().ok();
    mapping.prerequisites = metadata.prereqs;
    mapping.grading = metadata.grading;
    mapping.description = metadata.description;
}

async fn enrich<P: PageSource>(pages: &P, settings: &Settings, row: ListingRow) -> Option<CourseMapping> {
    let mut mapping = skeleton(&row);
    let Some(code) = CourseCode::parse(&mapping.name) else {
        debug!("Listing entry {} is not a course identifier", mapping.name);
        return (!row.graduate).then_some(mapping);
    };

    let (url, _) = catalog_url(settings, &code);
    match pages.fetch(&url).await {
        Some(html) => {
            apply_metadata(&mut mapping, parse_metadata(&html));
            Some(mapping)
        }
        None if row.graduate => {
            warn!("Could not find course {}", mapping.name);
            None
        }
        None => {
            debug!("No catalog page for {}", mapping.name);
            Some(mapping)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    pub limit: Option<usize>,
    /// Regenerate even when the listing size matches the existing file.
    pub force: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReport {
    pub listed: usize,
    pub previous: Option<usize>,
    pub generated: usize,
    pub written: bool,
    pub backup: Option<PathBuf>,
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb
}

/// Scrape the course-search listing, enrich every course from its catalog
/// page and write the result to `path`, keeping the previous file as a
/// timestamped backup.
pub async fn generate<P: PageSource>(
    pages: &P,
    settings: &Settings,
    path: &Path,
    options: GenerateOptions,
) -> crate::Result<GenerateReport> {
    let listing = pages
        .fetch(&settings.course_search_url)
        .await
        .ok_or_else(|| CatalogError::Unavailable(settings.course_search_url.clone()))?;
    let rows = parse_listing(&listing);
    write_generated(pages, settings, path, rows, options).await
}

/// Same as [`generate`], sourced from every subject page of the graduate
/// catalog. Courses whose page cannot be fetched are left out.
pub async fn generate_graduate<P: PageSource>(
    pages: &P,
    settings: &Settings,
    path: &Path,
    options: GenerateOptions,
) -> crate::Result<GenerateReport> {
    let listings: Vec<(&str, Option<String>)> = stream::iter(GRADUATE_PREFIXES.iter().copied())
        .map(|prefix| async move { (prefix, pages.fetch(&graduate_listing_url(settings, prefix)).await) })
        .buffered(settings.resolve_concurrency.max(1))
        .collect()
        .await;

    let mut rows = Vec::new();
    for (prefix, html) in listings {
        match html {
            Some(html) => rows.extend(parse_graduate_listing(prefix, &html)),
            None => debug!("No graduate listing for {}", prefix),
        }
    }
    if rows.is_empty() {
        return Err(CatalogError::Unavailable(settings.grad_catalog_url.clone()));
    }
    write_generated(pages, settings, path, rows, options).await
}

async fn write_generated<P: PageSource>(
    pages: &P,
    settings: &Settings,
    path: &Path,
    mut rows: Vec<ListingRow>,
    options: GenerateOptions,
) -> crate::Result<GenerateReport> {
    let mut report = GenerateReport {
        listed: rows.len(),
        ..Default::default()
    };
    if path.exists() {
        let previous = load_snapshot(path)?.len();
        report.previous = Some(previous);
        if previous == rows.len() && !options.force {
            info!("Listing has the same {} entries as {}, skipping", previous, path.display());
            return Ok(report);
        }
    }

    if let Some(limit) = options.limit {
        rows.truncate(limit);
    }
    info!("Generating mappings for {} courses", rows.len());

    let pb = progress_bar(rows.len());
    let progress = &pb;
    let enriched: Vec<Option<CourseMapping>> = stream::iter(rows)
        .map(|row| async move {
            progress.set_message(format!("{}{}", row.subject, row.number));
            let mapping = enrich(pages, settings, row).await;
            progress.inc(1);
            mapping
        })
        .buffered(settings.resolve_concurrency.max(1))
        .collect()
        .await;
    pb.finish_and_clear();
    let records: Vec<CourseMapping> = enriched.into_iter().flatten().collect();

    if path.exists() {
        report.backup = Some(backup_file(path)?);
    }
    write_snapshot(path, &records)?;
    report.generated = records.len();
    report.written = true;
    info!("Wrote {} mappings to {}", records.len(), path.display());
    Ok(report)
}
