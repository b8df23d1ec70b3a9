//! Diffing local assets against the last known metadata.

use crate::metadata::AssetRecord;
use crate::scan::LocalAsset;
use std::collections::{HashMap, HashSet};

/// Path -> content hash lookup over the last known records.
pub struct RecordIndex<'a> {
    hashes: HashMap<&'a str, &'a str>,
}

impl<'a> RecordIndex<'a> {
    pub fn new(records: &'a [AssetRecord]) -> Self {
        Self {
            hashes: records
                .iter()
                .map(|r| (r.path.as_str(), r.content_hash.as_str()))
                .collect(),
        }
    }

    /// Whether `asset` is new or its content differs from the record.
    pub fn is_changed(&self, asset: &LocalAsset) -> bool {
        self.hashes.get(asset.path.as_str()) != Some(&asset.content_hash.as_str())
    }
}

/// Local assets that are new or modified relative to `existing`.
///
/// With no existing records every asset counts as changed.
pub fn changed_assets<'a>(existing: &[AssetRecord], local: &'a [LocalAsset]) -> Vec<&'a LocalAsset> {
    let index = RecordIndex::new(existing);
    local.iter().filter(|asset| index.is_changed(asset)).collect()
}

/// Records whose path is no longer present locally.
pub fn deleted_records<'a, 'p>(
    existing: &'a [AssetRecord],
    present: impl IntoIterator<Item = &'p str>,
) -> Vec<&'a AssetRecord> {
    let present: HashSet<&str> = present.into_iter().collect();
    existing
        .iter()
        .filter(|r| !present.contains(r.path.as_str()))
        .collect()
}

/// Local paths that do not appear among `kept` (used when pruning a pull).
pub fn stale_paths<'a, 'k>(
    local: &'a [String],
    kept: impl IntoIterator<Item = &'k str>,
) -> Vec<&'a str> {
    let kept: HashSet<&str> = kept.into_iter().collect();
    local
        .iter()
        .map(String::as_str)
        .filter(|p| !kept.contains(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(path: &str, hash: &str) -> LocalAsset {
        LocalAsset {
            path: path.to_string(),
            data: Vec::new(),
            content_hash: hash.to_string(),
        }
    }

    #[test]
    fn test_changed_new_and_modified() {
        let existing = vec![AssetRecord::new("A", "h1"), AssetRecord::new("B", "h2")];
        let local = vec![asset("A", "h1"), asset("B", "h2'"), asset("C", "h3")];
        let changed: Vec<&str> = changed_assets(&existing, &local)
            .iter()
            .map(|a| a.path.as_str())
            .collect();
        assert_eq!(changed, vec!["B", "C"]);
    }

    #[test]
    fn test_no_baseline_everything_changed() {
        let local = vec![asset("a.txt", "h")];
        assert_eq!(changed_assets(&[], &local).len(), 1);
    }

    #[test]
    fn test_unchanged_is_empty() {
        let existing = vec![AssetRecord::new("A", "h1")];
        let local = vec![asset("A", "h1")];
        assert!(changed_assets(&existing, &local).is_empty());
    }

    #[test]
    fn test_deleted_records() {
        let existing = vec![AssetRecord::new("A", "h1"), AssetRecord::new("B", "h2")];
        let deleted = deleted_records(&existing, ["A", "C"]);
        assert_eq!(deleted, vec![&existing[1]]);
    }

    #[test]
    fn test_deleted_records_none_missing() {
        let existing = vec![AssetRecord::new("A", "h1")];
        assert!(deleted_records(&existing, ["A"]).is_empty());
    }

    #[test]
    fn test_stale_paths() {
        let local = vec!["old.png".to_string(), "keep.json".to_string()];
        assert_eq!(stale_paths(&local, ["keep.json", "new.txt"]), vec!["old.png"]);
    }
}
