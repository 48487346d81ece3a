use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::debug;

use super::types::{CourseMetadata, CoursePayload, ProfessorRecord, SectionRecord};
use super::SearchParts;
use crate::ratings::{InstructorResolver, RatingsClient, Similarity};

pub const INSTRUCTOR_SEPARATOR: &str = " & ";

/// Distinct instructor names in order of first appearance.
pub fn distinct_instructors(sections: &[Arc<SectionRecord>]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in sections.iter().flat_map(|s| s.instructors()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Sections listing `name` among their instructors, ordered by section id.
pub fn sections_taught_by(sections: &[Arc<SectionRecord>], name: &str) -> Vec<Arc<SectionRecord>> {
    let mut teaching: Vec<Arc<SectionRecord>> = sections
        .iter()
        .filter(|s| s.instructors().any(|n| n == name))
        .cloned()
        .collect();
    teaching.sort_by(|a, b| a.section.cmp(&b.section));
    teaching
}

/// Builds course payloads from assembled sections, resolving each instructor
/// once.
pub struct CourseAssembler<'a, C, S> {
    resolver: &'a InstructorResolver<C, S>,
    concurrency: usize,
}

impl<'a, C: RatingsClient, S: Similarity> CourseAssembler<'a, C, S> {
    pub fn new(resolver: &'a InstructorResolver<C, S>, concurrency: usize) -> Self {
        Self {
            resolver,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn assemble(
        &self,
        course: CourseMetadata,
        sections: Vec<SectionRecord>,
        include: &[SearchParts],
    ) -> CoursePayload {
        if !include.contains(&SearchParts::Sections) {
            return CoursePayload::metadata_only(course);
        }

        let sections: Vec<Arc<SectionRecord>> = sections.into_iter().map(Arc::new).collect();
        let professors = if include.contains(&SearchParts::Professors) {
            self.professors(&sections).await
        } else {
            Vec::new()
        };

        CoursePayload {
            course,
            sections,
            professors,
        }
    }

    pub async fn professors(&self, sections: &[Arc<SectionRecord>]) -> Vec<ProfessorRecord> {
        let names = distinct_instructors(sections);
        let resolutions: Vec<_> = stream::iter(names.iter().map(|n| self.resolver.resolve(n)))
            .buffered(self.concurrency)
            .collect()
            .await;

        debug!("Resolved {} instructors", names.len());
        names
            .iter()
            .zip(resolutions)
            .filter(|(_, r)| !r.name.trim().is_empty())
            .map(|(name, r)| ProfessorRecord {
                name: r.name,
                sections: sections_taught_by(sections, name),
                rating_ids: r.rating_ids,
            })
            .collect()
    }
}
