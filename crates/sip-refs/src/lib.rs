// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Metadata reference store for SIP workspaces.
//!
//! Every upstream metadata-generation step (technical metadata, provenance
//! events, descriptive import, ...) records *which* targets its fragments
//! describe as [`MdReference`] records. `sip-refs` provides the
//! [`ReferenceStore`] trait for querying those records and [`MemoryRefStore`],
//! an indexed in-memory implementation loaded from the workspace by
//! [`workspace::load_references`].
//!
//! # Absence Semantics
//!
//! A missing reference file is the normal "no metadata yet" case. Loading
//! yields an empty store and every lookup yields an empty set. Errors are
//! reserved for documents that exist but are malformed.
//!
//! # Path Policy
//!
//! Paths are workspace-relative, `/`-separated and normalized on insert
//! ([`normalize_path`]); the package root directory is `"."`.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

mod memory;
pub mod workspace;

pub use memory::MemoryRefStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Path of the package root directory.
pub const ROOT_DIRECTORY: &str = ".";

/// Which METS section a referenced fragment ends up in.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MdKind {
    /// Administrative metadata (technical, provenance, rights): `ADMID`.
    Amd,
    /// Descriptive metadata: `DMDID`.
    Dmd,
}

/// "Fragment `md_id` describes this target."
///
/// Exactly one of `file` / `directory` is set; `stream` refines `file`.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MdReference {
    /// Identifier of the metadata fragment.
    pub md_id: String,
    /// Section the fragment belongs to.
    pub kind: MdKind,
    /// Described file, if the target is a file or one of its streams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Stream index within `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<u32>,
    /// Described directory, if the target is a directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

impl MdReference {
    /// Reference describing a whole file.
    pub fn file(md_id: impl Into<String>, kind: MdKind, file: impl Into<String>) -> Self {
        Self {
            md_id: md_id.into(),
            kind,
            file: Some(file.into()),
            stream: None,
            directory: None,
        }
    }

    /// Reference describing one stream of a file.
    pub fn stream(md_id: impl Into<String>, file: impl Into<String>, stream: u32) -> Self {
        Self {
            stream: Some(stream),
            ..Self::file(md_id, MdKind::Amd, file)
        }
    }

    /// Reference describing a directory.
    pub fn directory(md_id: impl Into<String>, kind: MdKind, directory: impl Into<String>) -> Self {
        Self {
            md_id: md_id.into(),
            kind,
            file: None,
            stream: None,
            directory: Some(directory.into()),
        }
    }

    /// Check the target invariant and normalize the target paths.
    pub fn into_normalized(self) -> Result<Self, RefError> {
        let invalid = |reason: &'static str| RefError::InvalidRecord {
            md_id: self.md_id.clone(),
            reason,
        };
        if self.md_id.trim().is_empty() {
            return Err(invalid("empty md_id"));
        }
        match (&self.file, &self.directory) {
            (Some(_), Some(_)) => return Err(invalid("both file and directory set")),
            (None, None) => return Err(invalid("neither file nor directory set")),
            (None, Some(_)) if self.stream.is_some() => {
                return Err(invalid("stream set on a directory reference"));
            }
            (Some(file), None) if normalize_path(file) == ROOT_DIRECTORY => {
                return Err(invalid("file path is empty"));
            }
            _ => {}
        }
        Ok(Self {
            file: self.file.as_deref().map(normalize_path),
            directory: self.directory.as_deref().map(normalize_path),
            ..self
        })
    }
}

/// Target part of a [`RefQuery`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RefTarget<'a> {
    /// Every record.
    All,
    /// Records describing this directory.
    Directory(&'a str),
    /// Records describing this file as a whole (stream records excluded).
    File(&'a str),
    /// Records describing one stream of this file.
    FileStream(&'a str, u32),
}

/// Lookup criteria for [`ReferenceStore::lookup`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RefQuery<'a> {
    /// What the records must describe.
    pub target: RefTarget<'a>,
    /// Restrict to one kind; `None` matches both.
    pub kind: Option<MdKind>,
}

impl<'a> RefQuery<'a> {
    /// Match every record.
    pub fn all() -> Self {
        Self {
            target: RefTarget::All,
            kind: None,
        }
    }

    /// Match records for a directory.
    pub fn directory(path: &'a str) -> Self {
        Self {
            target: RefTarget::Directory(path),
            kind: None,
        }
    }

    /// Match file-level records for a file.
    pub fn file(path: &'a str) -> Self {
        Self {
            target: RefTarget::File(path),
            kind: None,
        }
    }

    /// Match records for one stream of a file.
    pub fn stream(path: &'a str, stream: u32) -> Self {
        Self {
            target: RefTarget::FileStream(path, stream),
            kind: None,
        }
    }

    /// Restrict the query to one kind.
    pub fn kind(self, kind: MdKind) -> Self {
        Self {
            kind: Some(kind),
            ..self
        }
    }
}

/// Errors raised while loading or extending a reference store.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    /// Reading or writing a workspace document failed.
    #[error("[REF_IO] {path}: {source}")]
    Io {
        /// Document path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// A workspace document is not valid JSON of the expected shape.
    #[error("[REF_JSON] {path}: {source}")]
    Json {
        /// Document path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
    /// A workspace document lacks its root key.
    #[error("[REF_MISSING_ROOT] {path}: no `{key}` root")]
    MissingRoot {
        /// Document path.
        path: PathBuf,
        /// Expected root key.
        key: &'static str,
    },
    /// A record breaks the target invariant.
    #[error("[REF_INVALID] reference `{md_id}`: {reason}")]
    InvalidRecord {
        /// Offending fragment id.
        md_id: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Read-only query surface over metadata references.
///
/// Filtering happens inside the store; callers only ever see the matching
/// ids. Returned sets are ordered so downstream output is deterministic.
pub trait ReferenceStore {
    /// Ids of fragments matching `query`. Empty when nothing matches.
    fn lookup(&self, query: &RefQuery<'_>) -> BTreeSet<String>;

    /// Stream indexes of `file` that have their own references.
    fn streams(&self, file: &str) -> BTreeSet<u32>;

    /// Files with at least one administrative reference (file or stream level).
    fn content_files(&self) -> BTreeSet<String>;
}

/// Normalize a workspace-relative path.
///
/// Drops empty and `.` segments wherever they occur, so leading `/` or `./`,
/// repeated and trailing separators all disappear. An empty result is the
/// root directory `"."`.
pub fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    if parts.is_empty() {
        ROOT_DIRECTORY.to_owned()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_noise_segments() {
        assert_eq!(normalize_path("/a/b.txt"), "a/b.txt");
        assert_eq!(normalize_path("./a//b.txt"), "a/b.txt");
        assert_eq!(normalize_path("a/./b.txt"), "a/b.txt");
        assert_eq!(normalize_path("a/b/."), "a/b");
        assert_eq!(normalize_path("a/.hidden"), "a/.hidden");
        assert_eq!(normalize_path("a/"), "a");
        assert_eq!(normalize_path(""), ".");
        assert_eq!(normalize_path("./"), ".");
        assert_eq!(normalize_path("."), ".");
    }

    #[test]
    fn both_targets_rejected() {
        let record = MdReference {
            directory: Some("a".into()),
            ..MdReference::file("_1", MdKind::Amd, "a/x.txt")
        };
        let err = record.into_normalized().unwrap_err();
        assert!(matches!(err, RefError::InvalidRecord { reason, .. } if reason.contains("both")));
    }

    #[test]
    fn stream_on_directory_rejected() {
        let record = MdReference {
            stream: Some(1),
            ..MdReference::directory("_1", MdKind::Amd, "a")
        };
        assert!(record.into_normalized().is_err());
    }

    #[test]
    fn empty_directory_becomes_root() {
        let record = MdReference::directory("_1", MdKind::Dmd, "")
            .into_normalized()
            .unwrap();
        assert_eq!(record.directory.as_deref(), Some(ROOT_DIRECTORY));
    }

    #[test]
    fn serde_omits_unset_targets() {
        let json = serde_json::to_string(&MdReference::file("_1", MdKind::Amd, "x")).unwrap();
        assert_eq!(json, r#"{"md_id":"_1","kind":"amd","file":"x"}"#);
    }
}
