// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory, indexed reference store.

use std::collections::{BTreeMap, BTreeSet};

use crate::{MdKind, MdReference, RefError, RefQuery, RefTarget, ReferenceStore};

/// In-memory reference store.
///
/// Records are kept in insertion order in an append-only arena; three
/// indexes (file, file+stream, directory) point into it so every
/// [`RefQuery`] target is answered without scanning.
///
/// # Invariants
///
/// - Only normalized, valid records are stored (see [`MdReference::into_normalized`]).
/// - Records are never removed or mutated.
/// - Duplicate records are harmless: lookups return sets.
#[derive(Debug, Default)]
pub struct MemoryRefStore {
    records: Vec<MdReference>,
    by_file: BTreeMap<String, Vec<usize>>,
    by_stream: BTreeMap<(String, u32), Vec<usize>>,
    by_directory: BTreeMap<String, Vec<usize>>,
}

impl MemoryRefStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate, normalize and append a record.
    pub fn insert(&mut self, record: MdReference) -> Result<(), RefError> {
        let record = record.into_normalized()?;
        let idx = self.records.len();
        match (&record.file, record.stream, &record.directory) {
            (Some(file), Some(stream), _) => {
                self.by_stream
                    .entry((file.clone(), stream))
                    .or_default()
                    .push(idx);
            }
            (Some(file), None, _) => self.by_file.entry(file.clone()).or_default().push(idx),
            (None, _, Some(dir)) => self.by_directory.entry(dir.clone()).or_default().push(idx),
            (None, _, None) => {}
        }
        self.records.push(record);
        Ok(())
    }

    /// Append many records, stopping at the first invalid one.
    pub fn extend<I>(&mut self, records: I) -> Result<(), RefError>
    where
        I: IntoIterator<Item = MdReference>,
    {
        for record in records {
            self.insert(record)?;
        }
        Ok(())
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn collect_ids<'s, I>(&'s self, indexes: I, kind: Option<MdKind>) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'s usize>,
    {
        indexes
            .into_iter()
            .filter_map(|&idx| self.records.get(idx))
            .filter(|record| kind.is_none_or(|k| record.kind == k))
            .map(|record| record.md_id.clone())
            .collect()
    }
}

impl ReferenceStore for MemoryRefStore {
    fn lookup(&self, query: &RefQuery<'_>) -> BTreeSet<String> {
        let empty = Vec::new();
        match query.target {
            RefTarget::All => self
                .records
                .iter()
                .filter(|record| query.kind.is_none_or(|k| record.kind == k))
                .map(|record| record.md_id.clone())
                .collect(),
            RefTarget::Directory(dir) => self.collect_ids(
                self.by_directory.get(dir).unwrap_or(&empty),
                query.kind,
            ),
            RefTarget::File(file) => {
                self.collect_ids(self.by_file.get(file).unwrap_or(&empty), query.kind)
            }
            RefTarget::FileStream(file, stream) => self.collect_ids(
                self.by_stream
                    .get(&(file.to_owned(), stream))
                    .unwrap_or(&empty),
                query.kind,
            ),
        }
    }

    fn streams(&self, file: &str) -> BTreeSet<u32> {
        self.by_stream
            .range((file.to_owned(), 0)..=(file.to_owned(), u32::MAX))
            .map(|((_, stream), _)| *stream)
            .collect()
    }

    fn content_files(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .filter(|record| record.kind == MdKind::Amd)
            .filter_map(|record| record.file.clone())
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> MemoryRefStore {
        let mut store = MemoryRefStore::new();
        store
            .extend([
                MdReference::file("_tech1", MdKind::Amd, "./a/x.txt"),
                MdReference::file("_prov1", MdKind::Amd, "a/x.txt"),
                MdReference::stream("_audio0", "a/x.txt", 0),
                MdReference::stream("_video1", "a/x.txt", 1),
                MdReference::directory("_dir_a", MdKind::Dmd, "a"),
                MdReference::directory("_pkg", MdKind::Dmd, "."),
                MdReference::file("_desc", MdKind::Dmd, "b/only-described.txt"),
            ])
            .unwrap();
        store
    }

    // ── 1. empty store answers every query with nothing ─────────────────

    #[test]
    fn empty_store_lookups_are_empty() {
        let store = MemoryRefStore::new();
        assert!(store.is_empty());
        assert!(store.lookup(&RefQuery::all()).is_empty());
        assert!(store.lookup(&RefQuery::file("a/x.txt")).is_empty());
        assert!(store.streams("a/x.txt").is_empty());
    }

    // ── 2. file lookups exclude stream records ──────────────────────────

    #[test]
    fn file_lookup_excludes_streams() {
        let store = sample();
        let ids = store.lookup(&RefQuery::file("a/x.txt"));
        assert_eq!(ids, BTreeSet::from(["_prov1".to_owned(), "_tech1".to_owned()]));
    }

    // ── 3. stream lookups are exact ─────────────────────────────────────

    #[test]
    fn stream_lookup_is_exact() {
        let store = sample();
        let ids = store.lookup(&RefQuery::stream("a/x.txt", 1));
        assert_eq!(ids, BTreeSet::from(["_video1".to_owned()]));
        assert_eq!(store.streams("a/x.txt"), BTreeSet::from([0, 1]));
    }

    // ── 4. streams are listed per exact file ────────────────────────────

    #[test]
    fn streams_ignore_neighbouring_files() {
        let mut store = sample();
        store
            .extend([
                MdReference::stream("_a", "a/x", 9),
                MdReference::stream("_b", "a/x.txt.bak", 2),
                MdReference::stream("_c", "a/x.txt", u32::MAX),
            ])
            .unwrap();
        assert_eq!(store.streams("a/x.txt"), BTreeSet::from([0, 1, u32::MAX]));
        assert_eq!(store.streams("a/x"), BTreeSet::from([9]));
        assert!(store.streams("a").is_empty());
    }

    // ── 5. kind filter narrows directory lookups ────────────────────────

    #[test]
    fn directory_lookup_respects_kind() {
        let store = sample();
        assert_eq!(
            store.lookup(&RefQuery::directory("a").kind(MdKind::Dmd)),
            BTreeSet::from(["_dir_a".to_owned()])
        );
        assert!(store
            .lookup(&RefQuery::directory("a").kind(MdKind::Amd))
            .is_empty());
        assert_eq!(
            store.lookup(&RefQuery::directory(".")),
            BTreeSet::from(["_pkg".to_owned()])
        );
    }

    // ── 6. content files come from administrative records only ──────────

    #[test]
    fn content_files_skip_descriptive_only() {
        let store = sample();
        assert_eq!(store.content_files(), BTreeSet::from(["a/x.txt".to_owned()]));
        assert_eq!(store.lookup(&RefQuery::all().kind(MdKind::Dmd)).len(), 3);
    }

    // ── 7. invalid record is rejected and store stays unchanged ─────────

    #[test]
    fn invalid_record_leaves_store_unchanged() {
        let mut store = MemoryRefStore::new();
        let bad = MdReference {
            file: None,
            ..MdReference::file("_x", MdKind::Amd, "x")
        };
        assert!(store.insert(bad).is_err());
        assert_eq!(store.len(), 0);
    }
}
