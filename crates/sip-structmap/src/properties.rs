// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Property collector: the set of content paths and their structural properties.

use std::collections::BTreeMap;

use sip_app_core::prefs::{CompilerPrefs, SupplementaryConflict};
use sip_refs::workspace::PropertyRecord;
use sip_refs::{normalize_path, ReferenceStore, ROOT_DIRECTORY};
use tracing::{debug, warn};

use crate::CompileError;

/// Structural properties of one digital object.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct FileProperties {
    /// Ordering hint, passed through verbatim.
    pub order: Option<i64>,
    /// Bit-level-only preservation.
    pub bit_level: bool,
    /// Supplementary type tag; supplementary objects live outside the main tree.
    pub supplementary: Option<String>,
}

impl FileProperties {
    /// Whether the object needs its own wrapper division in a structMap.
    pub fn is_decorated(&self) -> bool {
        self.order.is_some() || self.bit_level
    }
}

/// Output of [`collect`]: sorted content paths and the property bag.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Collected {
    /// Every content path, sorted lexicographically.
    pub paths: Vec<String>,
    /// Properties of every path in `paths`.
    pub properties: BTreeMap<String, FileProperties>,
}

impl Collected {
    /// Properties of `path`, if it is a known content path.
    pub fn get(&self, path: &str) -> Option<&FileProperties> {
        self.properties.get(path)
    }

    /// Sorted paths that carry a supplementary tag.
    pub fn supplementary_paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str).filter(|path| {
            self.properties
                .get(*path)
                .is_some_and(|props| props.supplementary.is_some())
        })
    }

    /// Whether any path carries a supplementary tag.
    pub fn has_supplementary(&self) -> bool {
        self.supplementary_paths().next().is_some()
    }
}

/// Gather every content path and merge the import step's properties into it.
///
/// Content paths are the files with administrative references plus every
/// path named by a property record. Later records override `order` and
/// `bit_level`; conflicting supplementary tags follow `prefs`.
pub fn collect(
    refs: &dyn ReferenceStore,
    records: &[PropertyRecord],
    prefs: &CompilerPrefs,
) -> Result<Collected, CompileError> {
    let mut properties: BTreeMap<String, FileProperties> = refs
        .content_files()
        .into_iter()
        .map(|path| (path, FileProperties::default()))
        .collect();

    for record in records {
        let path = normalize_path(&record.path);
        if path == ROOT_DIRECTORY {
            warn!(path = %record.path, "property record names the package root; skipped");
            continue;
        }
        let props = properties.entry(path.clone()).or_default();
        if record.order.is_some() {
            props.order = record.order;
        }
        if let Some(bit_level) = record.bit_level {
            props.bit_level = bit_level;
        }
        if let Some(tag) = &record.supplementary {
            merge_supplementary(&path, props, tag, prefs.supplementary_conflict)?;
        }
    }

    for (path, props) in &properties {
        if let Some(tag) = &props.supplementary {
            if prefs.supplementary_label(tag).is_none() {
                warn!(%path, %tag, "unmapped supplementary tag; using it verbatim as the label");
            }
        }
    }

    let paths: Vec<String> = properties.keys().cloned().collect();
    debug!(paths = paths.len(), "collected content paths");
    Ok(Collected { paths, properties })
}

fn merge_supplementary(
    path: &str,
    props: &mut FileProperties,
    tag: &str,
    policy: SupplementaryConflict,
) -> Result<(), CompileError> {
    let Some(existing) = props.supplementary.clone() else {
        props.supplementary = Some(tag.to_owned());
        return Ok(());
    };
    if existing == tag {
        return Ok(());
    }
    warn!(%path, first = %existing, second = %tag, ?policy, "conflicting supplementary tags");
    match policy {
        SupplementaryConflict::LastWins => props.supplementary = Some(tag.to_owned()),
        SupplementaryConflict::FirstWins => {}
        SupplementaryConflict::Reject => {
            return Err(CompileError::SupplementaryConflict {
                path: path.to_owned(),
                first: existing,
                second: tag.to_owned(),
            });
        }
    }
    Ok(())
}

/// METS label for a supplementary tag: the configured mapping, else the tag.
pub fn supplementary_label(prefs: &CompilerPrefs, tag: &str) -> String {
    prefs.supplementary_label(tag).unwrap_or(tag).to_owned()
}
