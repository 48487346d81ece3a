use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::similarity::{best_match, Similarity};

/// One instructor in the local ratings index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingIndexEntry {
    pub name: String,
    #[serde(alias = "rmpIds")]
    pub rating_ids: Vec<String>,
}

/// A `{name, id}` pair from a per-campus instructor listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampusListing {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Default)]
pub struct RatingIndex {
    entries: Vec<RatingIndexEntry>,
}

impl RatingIndex {
    pub fn new(entries: Vec<RatingIndexEntry>) -> Self {
        Self { entries }
    }

    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let entries: Vec<RatingIndexEntry> = serde_json::from_str(&raw)?;
        info!("Loaded {} rating index entries from {}", entries.len(), path.display());
        Ok(Self { entries })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        fs::write(path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }

    pub fn entries(&self) -> &[RatingIndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive exact name lookup.
    pub fn exact(&self, name: &str) -> Option<&RatingIndexEntry> {
        let name = name.trim();
        self.entries.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Closest entry above the match threshold.
    pub fn fuzzy<S: Similarity + ?Sized>(
        &self,
        similarity: &S,
        name: &str,
    ) -> Option<(&RatingIndexEntry, f64)> {
        best_match(similarity, name, &self.entries, |e| e.name.as_str())
            .map(|(i, score)| (&self.entries[i], score))
    }
}

/// Fold per-campus listings into index entries: one entry per exact name,
/// ids concatenated in listing order, sorted by name.
pub fn build_index(listings: Vec<Vec<CampusListing>>) -> Vec<RatingIndexEntry> {
    let mut all: Vec<CampusListing> = listings.into_iter().flatten().collect();
    all.sort_by(|a, b| a.name.cmp(&b.name));

    let mut entries: Vec<RatingIndexEntry> = Vec::new();
    for listing in all {
        match entries.last_mut() {
            Some(last) if last.name == listing.name => last.rating_ids.push(listing.id),
            _ => entries.push(RatingIndexEntry {
                name: listing.name,
                rating_ids: vec![listing.id],
            }),
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratings::similarity::DiceSimilarity;

    fn entry(name: &str, ids: &[&str]) -> RatingIndexEntry {
        RatingIndexEntry {
            name: name.into(),
            rating_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn listing(name: &str, id: &str) -> CampusListing {
        CampusListing { name: name.into(), id: id.into() }
    }

    #[test]
    fn exact_ignores_case() {
        let index = RatingIndex::new(vec![entry("John Smith", &["a"])]);
        assert_eq!(index.exact("john smith").unwrap().rating_ids, vec!["a"]);
        assert!(index.exact("John Smyth").is_none());
    }

    #[test]
    fn fuzzy_picks_closest() {
        let index = RatingIndex::new(vec![
            entry("Maria Garcia", &["m"]),
            entry("Jonathon Smith", &["j"]),
        ]);
        let (hit, score) = index.fuzzy(&DiceSimilarity, "Jonathan Smith").unwrap();
        assert_eq!(hit.name, "Jonathon Smith");
        assert!(score > 0.7);
        assert!(index.fuzzy(&DiceSimilarity, "Unrelated Person").is_none());
    }

    #[test]
    fn reads_legacy_key() {
        let entries: Vec<RatingIndexEntry> =
            serde_json::from_str(r#"[{"name":"Ann Lee","rmpIds":["x","y"]}]"#).unwrap();
        assert_eq!(entries[0].rating_ids, vec!["x", "y"]);
        let written = serde_json::to_string(&entries[0]).unwrap();
        assert!(written.contains("ratingIds"));
    }

    #[test]
    fn build_groups_duplicate_names() {
        let built = build_index(vec![
            vec![listing("Zed Ray", "1"), listing("Ann Lee", "2")],
            vec![listing("Ann Lee", "3")],
        ]);
        assert_eq!(built, vec![entry("Ann Lee", &["2", "3"]), entry("Zed Ray", &["1"])]);
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        RatingIndex::new(vec![entry("Ann Lee", &["2"])]).save(&path).unwrap();
        let loaded = RatingIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.entries()[0].name, "Ann Lee");
    }
}
