use chrono::Local;
use tracing::{debug, info};

use super::course::CourseAssembler;
use super::metadata::{offline_marker, parse_metadata};
use super::section::SectionAssembler;
use super::types::{CoursePayload, SectionPayload};
use super::{catalog_url, detect_campus, is_section_identifier, table, Campus, CourseCode, SearchParts};
use crate::config::Settings;
use crate::http::PageSource;
use crate::mappings::MappingSet;
use crate::ratings::{DiceSimilarity, InstructorResolver, RatingsClient, Similarity};

/// Entry point for course lookups: fetches catalog pages through a
/// [`PageSource`] and resolves instructors through an [`InstructorResolver`].
pub struct Catalog<P, C, S = DiceSimilarity> {
    settings: Settings,
    pages: P,
    resolver: InstructorResolver<C, S>,
    mappings: MappingSet,
}

impl<P, C, S> Catalog<P, C, S>
where
    P: PageSource,
    C: RatingsClient,
    S: Similarity,
{
    pub fn new(
        settings: Settings,
        pages: P,
        resolver: InstructorResolver<C, S>,
        mappings: MappingSet,
    ) -> Self {
        Self {
            settings,
            pages,
            resolver,
            mappings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn pages(&self) -> &P {
        &self.pages
    }

    pub fn resolver(&self) -> &InstructorResolver<C, S> {
        &self.resolver
    }

    pub fn mappings(&self) -> &MappingSet {
        &self.mappings
    }

    /// Look up a course. With `use_mappings`, the offline record answers
    /// without sections; a missing record falls back to the catalog page,
    /// again without sections.
    pub async fn search_course(
        &self,
        identifier: &str,
        campus: Campus,
        use_mappings: bool,
        include: &[SearchParts],
    ) -> Option<CoursePayload> {
        let Some(code) = CourseCode::parse(identifier) else {
            debug!("Rejected course identifier '{}'", identifier);
            return None;
        };

        if use_mappings {
            if let Some(mapping) = self.mappings.find_by_name(&code.to_string()) {
                let marker = offline_marker(Local::now().naive_local());
                return Some(CoursePayload::metadata_only(mapping.metadata(marker)));
            }
            debug!("No mapping for {}, querying catalog", code);
            return self.search_catalog(&code, campus, &[]).await;
        }

        self.search_catalog(&code, campus, include).await
    }

    async fn search_catalog(
        &self,
        code: &CourseCode,
        campus: Campus,
        include: &[SearchParts],
    ) -> Option<CoursePayload> {
        let (url, variant) = catalog_url(&self.settings, code);
        let html = self.pages.fetch(&url).await?;
        let course = parse_metadata(&html);

        if !include.contains(&SearchParts::Sections) {
            return Some(CoursePayload::metadata_only(course));
        }

        let Some(table) = table::extract(&html, variant) else {
            info!("{} has no section table", code);
            return Some(CoursePayload::metadata_only(course));
        };

        let sections = SectionAssembler::new(&self.settings.room_directory_host).assemble(&table, campus);
        let assembler = CourseAssembler::new(&self.resolver, self.settings.resolve_concurrency);
        Some(assembler.assemble(course, sections, include).await)
    }

    /// One section of a course, scoped to the campus its id implies.
    pub async fn search_by_section(&self, identifier: &str, section: &str) -> Option<SectionPayload> {
        let section = section.trim();
        if !is_section_identifier(section) {
            debug!("Rejected section identifier '{}'", section);
            return None;
        }

        let payload = self
            .search_course(identifier, detect_campus(section), false, &[SearchParts::Sections])
            .await?;
        let found = payload
            .sections
            .iter()
            .find(|s| s.section.eq_ignore_ascii_case(section))?
            .clone();

        Some(SectionPayload {
            course: payload.course,
            section: found,
        })
    }
}
