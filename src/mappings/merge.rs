use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use super::{is_placeholder, load_snapshot, write_snapshot, CourseAttributes, CourseMapping, MappingKey};
use crate::error::CatalogError;

pub const CANONICAL_FILE: &str = "courses.json";

static BACKUP_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^courses(-[\w-]+?)?-\d{10,}\.json$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub records: Vec<CourseMapping>,
    pub added: usize,
    pub patched: usize,
}

/// Fold `candidates` into `canonical`. Unknown records are appended, known
/// ones only have their gaps filled. The result drops unnamed records and is
/// sorted by name.
pub fn merge(canonical: Vec<CourseMapping>, candidates: Vec<CourseMapping>) -> MergeOutcome {
    let mut records = canonical;
    let mut positions: HashMap<MappingKey, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.key(), i))
        .rev()
        .collect();

    let mut added = 0;
    let mut patched = 0;
    for candidate in candidates {
        let key = candidate.key();
        match positions.get(&key) {
            Some(&i) => {
                if patch(&mut records[i], &candidate) {
                    debug!("Patched {}", records[i].name);
                    patched += 1;
                }
            }
            None => {
                debug!("New {} :: {}", candidate.name, candidate.catalog_name);
                positions.insert(key, records.len());
                records.push(candidate);
                added += 1;
            }
        }
    }

    records.retain(|r| !r.name.is_empty());
    records.sort_by(|a, b| a.name.cmp(&b.name));

    MergeOutcome {
        records,
        added,
        patched,
    }
}

fn adopt_text(existing: &mut String, candidate: &str) -> bool {
    if is_placeholder(existing) && !is_placeholder(candidate) {
        *existing = candidate.to_string();
        return true;
    }
    false
}

fn adopt_flag(existing: &mut bool, candidate: bool) -> bool {
    if !*existing && candidate {
        *existing = true;
        return true;
    }
    false
}

fn patch_attributes(existing: &mut CourseAttributes, candidate: &CourseAttributes) -> bool {
    let mut changed = adopt_flag(&mut existing.lab, candidate.lab);
    changed |= adopt_flag(&mut existing.writing, candidate.writing);
    changed |= adopt_flag(&mut existing.quantitative, candidate.quantitative);
    changed |= adopt_flag(&mut existing.environmental, candidate.environmental);
    changed |= adopt_flag(&mut existing.graduate, candidate.graduate);
    if existing.content_areas.is_empty() && !candidate.content_areas.is_empty() {
        existing.content_areas = candidate.content_areas.clone();
        changed = true;
    }
    changed
}

/// Fill gaps in `existing` from `candidate`. Returns whether anything changed.
fn patch(existing: &mut CourseMapping, candidate: &CourseMapping) -> bool {
    let mut changed = adopt_text(&mut existing.description, &candidate.description);
    changed |= adopt_text(&mut existing.prerequisites, &candidate.prerequisites);
    changed |= adopt_text(&mut existing.grading, &candidate.grading);

    if existing.credits.unwrap_or(0) == 0 && candidate.credits.unwrap_or(0) > 0 {
        existing.credits = candidate.credits;
        changed = true;
    }

    if let Some(theirs) = &candidate.attributes {
        match existing.attributes.as_mut() {
            Some(ours) => changed |= patch_attributes(ours, theirs),
            None => {
                existing.attributes = Some(theirs.clone());
                changed = true;
            }
        }
    }
    changed
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Compute and report without touching disk.
    pub dry_run: bool,
    /// Write even when nothing was added or patched.
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub canonical: PathBuf,
    pub sources: Vec<PathBuf>,
    pub before: usize,
    pub after: usize,
    pub added: usize,
    pub patched: usize,
    pub written: bool,
    pub backup: Option<PathBuf>,
}

/// Mapping snapshots in `dir` (`courses*.json`), timestamped backups
/// excluded, in filename order.
pub fn discover_snapshots(dir: &Path) -> crate::Result<Vec<PathBuf>> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| {
                    n.starts_with("courses") && n.ends_with(".json") && !BACKUP_FILE.is_match(n)
                })
        })
        .collect();
    found.sort();
    Ok(found)
}

fn pick_canonical(snapshots: &[PathBuf]) -> Option<PathBuf> {
    if let Some(p) = snapshots
        .iter()
        .find(|p| p.file_name().and_then(|n| n.to_str()) == Some(CANONICAL_FILE))
    {
        return Some(p.clone());
    }
    snapshots
        .iter()
        .max_by_key(|p| {
            fs::metadata(p)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        })
        .cloned()
}

/// Copy `path` aside as `<stem>-<unix millis>.json` next to it.
pub fn backup_file(path: &Path) -> crate::Result<PathBuf> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("courses");
    let backup = dir.join(format!("{}-{}.json", stem, chrono::Utc::now().timestamp_millis()));
    fs::copy(path, &backup)?;
    Ok(backup)
}

/// Merge every snapshot in `dir` into `dir/courses.json`.
pub fn run_merge(dir: &Path, options: MergeOptions) -> crate::Result<MergeReport> {
    let snapshots = discover_snapshots(dir)?;
    if snapshots.is_empty() {
        return Err(CatalogError::NoSnapshots(dir.to_path_buf()));
    }
    if snapshots.len() < 2 {
        return Err(CatalogError::NotEnoughSnapshots(snapshots.len()));
    }
    let canonical = pick_canonical(&snapshots)
        .ok_or_else(|| CatalogError::NoSnapshots(dir.to_path_buf()))?;

    let base = load_snapshot(&canonical)?;
    let before = base.len();
    info!("Canonical snapshot {} ({} entries)", canonical.display(), before);

    let sources: Vec<PathBuf> = snapshots.into_iter().filter(|p| *p != canonical).collect();
    let mut candidates = Vec::new();
    for source in &sources {
        let records = load_snapshot(source)?;
        info!("Snapshot {} ({} entries)", source.display(), records.len());
        candidates.extend(records);
    }

    let outcome = merge(base, candidates);
    info!(
        "Merged: {} added, {} patched, {} -> {} entries",
        outcome.added,
        outcome.patched,
        before,
        outcome.records.len()
    );

    let changed = outcome.added > 0 || outcome.patched > 0;
    let mut report = MergeReport {
        canonical: canonical.clone(),
        sources,
        before,
        after: outcome.records.len(),
        added: outcome.added,
        patched: outcome.patched,
        written: false,
        backup: None,
    };

    if options.dry_run || (!changed && !options.force) {
        return Ok(report);
    }

    let target = dir.join(CANONICAL_FILE);
    if target.exists() {
        report.backup = Some(backup_file(&target)?);
    }
    write_snapshot(&target, &outcome.records)?;
    report.written = true;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::metadata::{DEFAULT_DESC, DEFAULT_PREREQS};
    use crate::mappings::tests::mapping;
    use crate::mappings::{ContentArea, UNAVAILABLE};

    fn attrs(lab: bool, writing: bool, areas: &[ContentArea]) -> CourseAttributes {
        CourseAttributes {
            lab,
            writing,
            content_areas: areas.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn merging_with_itself_is_identity() {
        let mut a = mapping("CSE1010", "Intro");
        a.description = "Computing.".into();
        a.credits = Some(3);
        let canonical = vec![a, mapping("CSE2050", "Data")];
        let outcome = merge(canonical.clone(), canonical.clone());
        assert_eq!(outcome.records, canonical);
        assert_eq!((outcome.added, outcome.patched), (0, 0));
    }

    #[test]
    fn appends_unknown_and_sorts() {
        let outcome = merge(
            vec![mapping("MATH1131Q", "Calculus")],
            vec![mapping("ART1000", "Art"), mapping("", "Nameless")],
        );
        let names: Vec<_> = outcome.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["ART1000", "MATH1131Q"]);
        assert_eq!(outcome.added, 2);
    }

    #[test]
    fn fills_placeholders_only() {
        let mut ours = mapping("CSE1010", "Intro");
        ours.prerequisites = "MATH 1131Q.".into();
        ours.grading = UNAVAILABLE.into();

        let mut theirs = mapping("CSE1010", "Intro");
        theirs.description = "Computing.".into();
        theirs.prerequisites = "Something else.".into();
        theirs.grading = "Graded".into();
        theirs.credits = Some(3);

        let outcome = merge(vec![ours], vec![theirs]);
        let merged = &outcome.records[0];
        assert_eq!(merged.description, "Computing.");
        assert_eq!(merged.prerequisites, "MATH 1131Q.");
        assert_eq!(merged.grading, "Graded");
        assert_eq!(merged.credits, Some(3));
        assert_eq!(outcome.patched, 1);
    }

    #[test]
    fn placeholder_never_replaces_real_text() {
        let mut ours = mapping("CSE1010", "Intro");
        ours.description = "Computing.".into();
        let mut theirs = mapping("CSE1010", "Intro");
        theirs.description = DEFAULT_DESC.into();
        theirs.prerequisites = DEFAULT_PREREQS.into();

        let outcome = merge(vec![ours.clone()], vec![theirs]);
        assert_eq!(outcome.records, vec![ours]);
        assert_eq!(outcome.patched, 0);
    }

    #[test]
    fn attribute_flags_only_turn_on() {
        let mut ours = mapping("ENGL1010", "Writing");
        ours.attributes = Some(attrs(true, false, &[]));
        let mut theirs = mapping("ENGL1010", "Writing");
        theirs.attributes = Some(attrs(false, true, &[ContentArea::Ca1]));

        let outcome = merge(vec![ours], vec![theirs]);
        let merged = outcome.records[0].attributes.as_ref().unwrap();
        assert!(merged.lab);
        assert!(merged.writing);
        assert_eq!(merged.content_areas, vec![ContentArea::Ca1]);
    }

    #[test]
    fn missing_attributes_adopted_wholesale() {
        let ours = mapping("ENGL1010", "Writing");
        let mut theirs = mapping("ENGL1010", "Writing");
        theirs.attributes = Some(attrs(false, true, &[ContentArea::Ca4]));
        let outcome = merge(vec![ours], vec![theirs.clone()]);
        assert_eq!(outcome.records[0].attributes, theirs.attributes);
    }

    #[test]
    fn discovery_skips_backups() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "courses.json",
            "courses-1700000000000.json",
            "courses-grad-1700000000000.json",
            "courses-grad.json",
            "courses-old.json",
            "notes.json",
        ] {
            std::fs::write(dir.path().join(name), "[]").unwrap();
        }
        let found: Vec<_> = discover_snapshots(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(found, vec!["courses-grad.json", "courses-old.json", "courses.json"]);
    }

    #[test]
    fn backup_keeps_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grad.json");
        std::fs::write(&path, "[]").unwrap();
        let backup = backup_file(&path).unwrap();
        let name = backup.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("grad-") && name.ends_with(".json"), "{}", name);
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "[]");
    }

    #[test]
    fn run_merge_writes_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(dir.path().join("courses.json"), &[mapping("CSE1010", "Intro")]).unwrap();
        let mut extra = mapping("CSE1010", "Intro");
        extra.description = "Computing.".into();
        write_snapshot(
            dir.path().join("courses-fall.json"),
            &[extra, mapping("ART1000", "Art")],
        )
        .unwrap();

        let dry = run_merge(dir.path(), MergeOptions { dry_run: true, force: false }).unwrap();
        assert!(!dry.written);
        assert_eq!((dry.added, dry.patched), (1, 1));

        let report = run_merge(dir.path(), MergeOptions::default()).unwrap();
        assert!(report.written);
        assert!(report.backup.as_ref().unwrap().exists());
        let merged = load_snapshot(dir.path().join("courses.json")).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "ART1000");
        assert_eq!(merged[1].description, "Computing.");

        let again = run_merge(dir.path(), MergeOptions::default()).unwrap();
        assert!(!again.written);
    }

    #[test]
    fn run_merge_needs_two_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            run_merge(dir.path(), MergeOptions::default()),
            Err(CatalogError::NoSnapshots(_))
        ));
        std::fs::write(dir.path().join("courses.json"), "[]").unwrap();
        assert!(matches!(
            run_merge(dir.path(), MergeOptions::default()),
            Err(CatalogError::NotEnoughSnapshots(1))
        ));
    }
}
