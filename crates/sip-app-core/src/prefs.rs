// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Saved preferences for the structural-map compiler.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Supplementary tag written by the import step for XML schema files.
pub const XML_SCHEMA_TAG: &str = "xml_schema";
/// fileGrp `USE` / div `TYPE` label for XML schema supplementary files.
pub const XML_SCHEMA_LABEL: &str = "fi-preservation-xml-schemas";

/// How to resolve two import runs tagging the same path with different
/// supplementary types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SupplementaryConflict {
    /// The most recently written tag replaces earlier ones.
    #[default]
    LastWins,
    /// The first tag seen for a path sticks.
    FirstWins,
    /// Conflicting tags abort the compilation.
    Reject,
}

/// Compiler preferences (workspace-local or user-wide).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompilerPrefs {
    /// `TYPE` of the container division wrapping the whole structure.
    pub root_type: String,
    /// Conflict policy for supplementary tags.
    pub supplementary_conflict: SupplementaryConflict,
    /// Supplementary tag → METS label (fileGrp `USE`, div `TYPE`).
    pub supplementary_labels: BTreeMap<String, String>,
}

impl Default for CompilerPrefs {
    fn default() -> Self {
        let mut supplementary_labels = BTreeMap::new();
        supplementary_labels.insert(XML_SCHEMA_TAG.to_owned(), XML_SCHEMA_LABEL.to_owned());
        Self {
            root_type: "directory".to_owned(),
            supplementary_conflict: SupplementaryConflict::default(),
            supplementary_labels,
        }
    }
}

impl CompilerPrefs {
    /// METS label for a supplementary tag, if the tag is mapped.
    pub fn supplementary_label(&self, tag: &str) -> Option<&str> {
        self.supplementary_labels.get(tag).map(String::as_str)
    }
}
