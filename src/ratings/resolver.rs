use serde::Serialize;
use tracing::{debug, warn};

use super::index::RatingIndex;
use super::similarity::{passes, DiceSimilarity, Similarity};
use super::{Candidate, RatingsClient};

/// Which lookup produced a [`Resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Fuzzy,
    Remote,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub name: String,
    pub rating_ids: Vec<String>,
    pub tier: MatchTier,
}

impl Resolution {
    fn unresolved(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rating_ids: Vec::new(),
            tier: MatchTier::Unresolved,
        }
    }
}

/// Maps instructor display names to rating ids: local exact match, then local
/// fuzzy match, then a remote search gated on institution and similarity.
pub struct InstructorResolver<C, S = DiceSimilarity> {
    index: RatingIndex,
    client: C,
    similarity: S,
    institution: String,
}

impl<C: RatingsClient> InstructorResolver<C> {
    pub fn new(index: RatingIndex, client: C, institution: impl Into<String>) -> Self {
        Self::with_similarity(index, client, DiceSimilarity, institution)
    }
}

impl<C: RatingsClient, S: Similarity> InstructorResolver<C, S> {
    pub fn with_similarity(
        index: RatingIndex,
        client: C,
        similarity: S,
        institution: impl Into<String>,
    ) -> Self {
        Self {
            index,
            client,
            similarity,
            institution: institution.into(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn index(&self) -> &RatingIndex {
        &self.index
    }

    pub async fn resolve(&self, name: &str) -> Resolution {
        let name = name.trim();

        if let Some(entry) = self.index.exact(name) {
            debug!("'{}' resolved exactly", name);
            return Resolution {
                name: name.to_string(),
                rating_ids: entry.rating_ids.clone(),
                tier: MatchTier::Exact,
            };
        }

        if let Some((entry, score)) = self.index.fuzzy(&self.similarity, name) {
            debug!("'{}' resolved to '{}' ({:.2})", name, entry.name, score);
            return Resolution {
                name: entry.name.clone(),
                rating_ids: entry.rating_ids.clone(),
                tier: MatchTier::Fuzzy,
            };
        }

        // Comma-bearing names never flipped to "First Last"; searching them is noise.
        if name.is_empty() || name.contains(',') {
            return Resolution::unresolved(name);
        }

        let candidates = match self.client.search(name).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Ratings search for '{}' failed: {}", name, e);
                return Resolution::unresolved(name);
            }
        };

        let rating_ids: Vec<String> = candidates
            .into_iter()
            .filter(|c| self.accepts(name, c))
            .map(|c| c.id)
            .collect();

        if rating_ids.is_empty() {
            debug!("'{}' has no remote match", name);
            return Resolution::unresolved(name);
        }

        debug!("'{}' resolved remotely to {} ids", name, rating_ids.len());
        Resolution {
            name: name.to_string(),
            rating_ids,
            tier: MatchTier::Remote,
        }
    }

    fn accepts(&self, name: &str, candidate: &Candidate) -> bool {
        if !candidate
            .institution
            .to_lowercase()
            .contains(&self.institution.to_lowercase())
        {
            return false;
        }

        let query = name.to_lowercase();
        let found = candidate.name.to_lowercase();
        let found_tokens: Vec<&str> = found.split_whitespace().collect();
        query.split_whitespace().all(|t| found_tokens.contains(&t))
            || passes(self.similarity.score(&query, &found))
    }
}
