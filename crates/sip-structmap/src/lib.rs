// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! METS structural map and file section compiler.
//!
//! Given a SIP workspace (metadata reference documents plus the import step's
//! object properties) this crate synthesizes:
//!
//! - a `structMap` mirroring the directory tree (physical or logical
//!   grammar) or an EAD3 finding aid,
//! - the paired `fileSec` inventory every `fptr` resolves into,
//! - a supplementary `structMap` for bit-level-only content, when present.
//!
//! # Pipeline
//!
//! ```text
//! sip_refs (references) ─┐
//!                        ├─► properties::collect ─► tree::build ─► synth / ead ─► mets
//! property records ──────┘
//! ```
//!
//! [`compile::CompileRun`] owns one run: the loaded references, the collected
//! properties and the single [`filesec::FileSecBuilder`] whose path → id table
//! is shared by every structMap of the run.

pub mod compile;
pub mod ead;
pub mod filesec;
pub mod mets;
pub mod model;
pub mod properties;
pub mod synth;
pub mod tree;

pub use compile::{compile_structmap, CompileOptions, CompileOutput, CompileRun, StructGrammar};
pub use model::{Div, DivChild, FileEntry, FileGroup, FileId, FilePointer, FileSec, StructMap};

use std::path::PathBuf;

/// Errors raised by a compilation run.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Workspace reference or property documents could not be loaded.
    #[error(transparent)]
    Refs(#[from] sip_refs::RefError),
    /// The EAD3 description could not be used.
    #[error(transparent)]
    Ead(#[from] ead::EadError),
    /// Two import runs tagged one path with different supplementary types.
    #[error("[SUPPLEMENTARY_CONFLICT] `{path}` tagged both `{first}` and `{second}`")]
    SupplementaryConflict {
        /// Object path.
        path: String,
        /// Tag seen first.
        first: String,
        /// Conflicting later tag.
        second: String,
    },
    /// The EAD3 grammar was selected without a description file.
    #[error("[MISSING_DESCRIPTION] the EAD3-logical structure needs a description file")]
    MissingDescription,
    /// Reading the description or writing an output document failed.
    #[error("[IO] {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// An output document could not be serialized.
    #[error("[SERIALIZE] {0}")]
    Serialize(String),
}
