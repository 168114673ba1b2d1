// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! File section builder and the run's path → id table.
//!
//! # Id Policy
//!
//! A file id is `_` followed by the first 32 hex digits of `BLAKE3(path)`.
//! Minting is idempotent within a run (the table is consulted first) and
//! deterministic across runs. A hash-prefix collision between two different
//! paths gets a numeric suffix so ids stay unique.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use sip_refs::{MdKind, RefQuery, ReferenceStore};

use crate::model::{FileEntry, FileGroup, FileId, FilePointer, FileSec, StreamEntry};
use crate::properties::FileProperties;

/// Path → id map of a finished run.
pub type FileIds = BTreeMap<String, FileId>;

/// Hex digits of the path hash kept in an id.
const ID_HEX_LEN: usize = 32;

/// Deterministic id for `path` before collision handling.
pub fn mint_id(path: &str) -> FileId {
    let hex = blake3::hash(path.as_bytes()).to_hex();
    FileId(format!("_{}", &hex[..ID_HEX_LEN]))
}

/// Accumulates `mets:file` entries and owns the path → id table.
///
/// One builder exists per compilation run and is threaded `&mut` through
/// every structMap synthesized in that run, so the main and supplementary
/// maps agree on ids.
#[derive(Debug)]
pub struct FileSecBuilder {
    ids: HashMap<String, FileId>,
    owners: HashMap<FileId, String>,
    groups: IndexMap<Option<String>, Vec<FileEntry>>,
}

impl Default for FileSecBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSecBuilder {
    /// Empty builder; the main group always sorts first.
    pub fn new() -> Self {
        let mut groups = IndexMap::new();
        groups.insert(None, Vec::new());
        Self {
            ids: HashMap::new(),
            owners: HashMap::new(),
            groups,
        }
    }

    /// Resolve `path` to a pointer, registering its entry on first sight.
    ///
    /// `group` is the fileGrp `USE` (`None` = main content). A path keeps the
    /// group it was first registered in.
    pub fn resolve(
        &mut self,
        path: &str,
        props: &FileProperties,
        group: Option<&str>,
        refs: &dyn ReferenceStore,
    ) -> FilePointer {
        if let Some(id) = self.ids.get(path) {
            return FilePointer {
                file_id: id.clone(),
            };
        }
        let id = self.unique_id(path);
        let entry = FileEntry {
            id: id.clone(),
            path: path.to_owned(),
            amd_ids: refs.lookup(&RefQuery::file(path).kind(MdKind::Amd)),
            bit_level: props.bit_level,
            streams: refs
                .streams(path)
                .into_iter()
                .map(|index| StreamEntry {
                    index,
                    amd_ids: refs.lookup(&RefQuery::stream(path, index).kind(MdKind::Amd)),
                })
                .filter(|stream| !stream.amd_ids.is_empty())
                .collect(),
        };
        self.groups
            .entry(group.map(str::to_owned))
            .or_default()
            .push(entry);
        self.ids.insert(path.to_owned(), id.clone());
        self.owners.insert(id.clone(), path.to_owned());
        FilePointer { file_id: id }
    }

    fn unique_id(&self, path: &str) -> FileId {
        let base = mint_id(path);
        if !self.owners.contains_key(&base) {
            return base;
        }
        let mut n = 1_usize;
        loop {
            let candidate = FileId(format!("{base}-{n}"));
            if !self.owners.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Snapshot of the path → id table.
    pub fn file_ids(&self) -> FileIds {
        self.ids
            .iter()
            .map(|(path, id)| (path.clone(), id.clone()))
            .collect()
    }

    /// Finish the run: the file section (empty groups dropped) and the id table.
    pub fn finish(self) -> (FileSec, FileIds) {
        let ids = self.file_ids();
        let groups = self
            .groups
            .into_iter()
            .filter(|(_, files)| !files.is_empty())
            .map(|(use_label, files)| FileGroup { use_label, files })
            .collect();
        (FileSec { groups }, ids)
    }
}

#[cfg(test)]
impl FileSecBuilder {
    fn len(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sip_refs::{MdReference, MemoryRefStore};

    fn refs() -> MemoryRefStore {
        let mut store = MemoryRefStore::new();
        store
            .extend([
                MdReference::file("_tech", MdKind::Amd, "a/x.wav"),
                MdReference::file("_desc", MdKind::Dmd, "a/x.wav"),
                MdReference::stream("_s0", "a/x.wav", 0),
            ])
            .unwrap();
        store
    }

    // ── 1. minting is idempotent within a run ───────────────────────────

    #[test]
    fn resolve_is_idempotent() {
        let refs = refs();
        let mut builder = FileSecBuilder::new();
        let props = FileProperties::default();
        let first = builder.resolve("a/x.wav", &props, None, &refs);
        let again = builder.resolve("a/x.wav", &props, Some("other-group"), &refs);
        assert_eq!(first, again);
        assert_eq!(builder.len(), 1);
        let (filesec, ids) = builder.finish();
        assert_eq!(filesec.groups.len(), 1);
        assert_eq!(ids["a/x.wav"], first.file_id);
    }

    // ── 2. ids are deterministic across runs ────────────────────────────

    #[test]
    fn ids_are_stable_across_builders() {
        let refs = MemoryRefStore::new();
        let props = FileProperties::default();
        let a = FileSecBuilder::new().resolve("p/q.txt", &props, None, &refs);
        let b = FileSecBuilder::new().resolve("p/q.txt", &props, None, &refs);
        assert_eq!(a, b);
        assert_eq!(a.file_id.as_str().len(), 1 + ID_HEX_LEN);
        assert!(a.file_id.as_str().starts_with('_'));
    }

    // ── 3. entry carries administrative ids only ────────────────────────

    #[test]
    fn entry_links_amd_and_streams() {
        let refs = refs();
        let mut builder = FileSecBuilder::new();
        let props = FileProperties {
            bit_level: true,
            ..FileProperties::default()
        };
        let ptr = builder.resolve("a/x.wav", &props, None, &refs);
        let (filesec, _) = builder.finish();
        let entry = filesec.entry(&ptr.file_id).unwrap();
        assert_eq!(entry.amd_ids.iter().collect::<Vec<_>>(), ["_tech"]);
        assert!(entry.bit_level);
        assert_eq!(entry.streams.len(), 1);
        assert_eq!(entry.streams[0].index, 0);
    }

    // ── 4. groups: main first, empty main dropped ───────────────────────

    #[test]
    fn supplementary_group_is_separate() {
        let refs = MemoryRefStore::new();
        let props = FileProperties::default();
        let mut builder = FileSecBuilder::new();
        builder.resolve("schemas/a.xsd", &props, Some("fi-preservation-xml-schemas"), &refs);
        let (filesec, _) = builder.finish();
        assert_eq!(filesec.groups.len(), 1);
        assert_eq!(
            filesec.groups[0].use_label.as_deref(),
            Some("fi-preservation-xml-schemas")
        );
        assert!(filesec.group(None).is_none());
    }

    // ── 5. a hash-prefix collision gets a suffix ────────────────────────

    #[test]
    fn colliding_id_gets_suffix() {
        let mut builder = FileSecBuilder::new();
        let taken = mint_id("new.txt");
        builder.owners.insert(taken.clone(), "someone-else".into());
        let id = builder.unique_id("new.txt");
        assert_eq!(id.as_str(), format!("{taken}-1"));
    }
}
