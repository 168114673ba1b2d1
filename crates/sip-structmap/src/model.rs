// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory shapes of the emitted METS sections.
//!
//! These mirror `mets:structMap` / `mets:div` / `mets:fptr` and
//! `mets:fileSec` / `mets:fileGrp` / `mets:file` closely enough that
//! [`crate::mets`] is a direct walk. Id lists are ordered sets so repeated
//! runs serialize identically.

use std::collections::BTreeSet;
use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters kept verbatim in `FLocat` hrefs: `/` plus RFC 3986 unreserved.
const LOCATION: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// `mets:file/@ID`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FileId(pub String);

impl FileId {
    /// The id text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `mets:fptr`: a reference into the file section.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FilePointer {
    /// Referenced `mets:file/@ID`.
    pub file_id: FileId,
}

/// Child of a division, in emitted order.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DivChild {
    /// Bare file pointer.
    Pointer(FilePointer),
    /// Nested division.
    Div(Div),
}

/// `mets:div`.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Div {
    /// `TYPE`.
    pub kind: String,
    /// `LABEL`.
    pub label: Option<String>,
    /// `DMDID`.
    pub dmd_ids: BTreeSet<String>,
    /// `ADMID`.
    pub amd_ids: BTreeSet<String>,
    /// `ORDER`; only set when the division wraps exactly one ordered file.
    pub order: Option<i64>,
    /// Children in emitted order.
    pub children: Vec<DivChild>,
}

impl Div {
    /// Division of the given `TYPE` with no attributes or children.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Set `LABEL`.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Division wrapping a single pointer.
    pub fn wrapping(kind: impl Into<String>, pointer: FilePointer) -> Self {
        let mut div = Self::new(kind);
        div.children.push(DivChild::Pointer(pointer));
        div
    }

    /// Direct child divisions.
    pub fn subdivs(&self) -> impl Iterator<Item = &Div> {
        self.children.iter().filter_map(|child| match child {
            DivChild::Div(div) => Some(div),
            DivChild::Pointer(_) => None,
        })
    }

    /// Direct child pointers.
    pub fn pointers(&self) -> impl Iterator<Item = &FilePointer> {
        self.children.iter().filter_map(|child| match child {
            DivChild::Pointer(ptr) => Some(ptr),
            DivChild::Div(_) => None,
        })
    }
}

#[cfg(test)]
impl Div {
    /// Every pointer below this division, depth-first in document order.
    pub(crate) fn all_pointers(&self) -> Vec<&FilePointer> {
        let mut out = Vec::new();
        collect_pointers(self, &mut out);
        out
    }

    /// First direct child division with the given `LABEL`, else `TYPE`.
    pub(crate) fn child(&self, name: &str) -> Option<&Self> {
        self.subdivs()
            .find(|div| div.label.as_deref() == Some(name))
            .or_else(|| self.subdivs().find(|div| div.kind == name))
    }
}

#[cfg(test)]
fn collect_pointers<'d>(div: &'d Div, out: &mut Vec<&'d FilePointer>) {
    for child in &div.children {
        match child {
            DivChild::Pointer(ptr) => out.push(ptr),
            DivChild::Div(sub) => collect_pointers(sub, out),
        }
    }
}

/// `mets:structMap` with its single container division.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StructMap {
    /// `TYPE`.
    pub kind: String,
    /// `LABEL`.
    pub label: Option<String>,
    /// Container division.
    pub root: Div,
}

/// `mets:stream` inside a `mets:file`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StreamEntry {
    /// Stream index as recorded by the metadata step.
    pub index: u32,
    /// `ADMID`.
    pub amd_ids: BTreeSet<String>,
}

/// `mets:file`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FileEntry {
    /// `ID`.
    pub id: FileId,
    /// Workspace-relative path of the object.
    pub path: String,
    /// `ADMID`.
    pub amd_ids: BTreeSet<String>,
    /// Bit-level-only preservation (`USE` marker).
    pub bit_level: bool,
    /// Streams with their own administrative metadata.
    pub streams: Vec<StreamEntry>,
}

impl FileEntry {
    /// `FLocat/@xlink:href`: the percent-encoded path as a `file://` URL.
    pub fn location(&self) -> String {
        format!("file://{}", utf8_percent_encode(&self.path, LOCATION))
    }
}

/// `mets:fileGrp`.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct FileGroup {
    /// `USE`; `None` for the main content group.
    pub use_label: Option<String>,
    /// Entries in minting order.
    pub files: Vec<FileEntry>,
}

/// `mets:fileSec`.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct FileSec {
    /// Non-empty groups, main group first.
    pub groups: Vec<FileGroup>,
}

impl FileSec {
    /// Every entry across groups.
    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.groups.iter().flat_map(|group| group.files.iter())
    }

    /// Group with the given `USE`.
    pub fn group(&self, use_label: Option<&str>) -> Option<&FileGroup> {
        self.groups
            .iter()
            .find(|group| group.use_label.as_deref() == use_label)
    }
}

#[cfg(test)]
impl FileSec {
    /// Entry with the given id.
    pub(crate) fn entry(&self, id: &FileId) -> Option<&FileEntry> {
        self.entries().find(|entry| &entry.id == id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn entry(path: &str) -> FileEntry {
        FileEntry {
            id: FileId("_x".into()),
            path: path.into(),
            amd_ids: BTreeSet::new(),
            bit_level: false,
            streams: Vec::new(),
        }
    }

    #[test]
    fn location_percent_encodes_but_keeps_separators() {
        assert_eq!(entry("a/b c.txt").location(), "file://a/b%20c.txt");
        assert_eq!(entry("data/ä#1~x.tif").location(), "file://data/%C3%A4%231~x.tif");
    }

    #[test]
    fn all_pointers_walks_document_order() {
        let mut root = Div::new("root");
        root.children
            .push(DivChild::Pointer(FilePointer { file_id: FileId("_1".into()) }));
        let mut sub = Div::new("sub");
        sub.children
            .push(DivChild::Pointer(FilePointer { file_id: FileId("_2".into()) }));
        root.children.push(DivChild::Div(sub));
        let ids: Vec<&str> = root
            .all_pointers()
            .into_iter()
            .map(|ptr| ptr.file_id.as_str())
            .collect();
        assert_eq!(ids, ["_1", "_2"]);
        assert!(root.child("sub").is_some());
    }
}
