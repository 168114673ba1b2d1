// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Workspace documents: reference files and object property records.
//!
//! Each upstream step writes its own JSON document into the workspace
//! directory. Reference documents end with [`REFERENCE_SUFFIX`] and carry a
//! `md_references` array; the import step's property documents end with
//! [`PROPERTY_SUFFIX`] and carry an `object_properties` array. Documents are
//! read in file-name order, records in array order.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{normalize_path, MdReference, MemoryRefStore, RefError};

/// File-name suffix of reference documents.
pub const REFERENCE_SUFFIX: &str = "md-references.json";
/// Root key of reference documents.
pub const REFERENCE_ROOT: &str = "md_references";
/// File-name suffix of object property documents.
pub const PROPERTY_SUFFIX: &str = "object-properties.json";
/// Root key of object property documents.
pub const PROPERTY_ROOT: &str = "object_properties";

/// Structural properties the import step records for one digital object.
///
/// Absent fields leave earlier records for the same path untouched when
/// properties are merged.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Workspace-relative object path.
    pub path: String,
    /// Ordering hint, passed through to `ORDER` verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Object is preserved at the bit level only (no format validation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_level: Option<bool>,
    /// Supplementary type tag (e.g. `xml_schema`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplementary: Option<String>,
}

impl PropertyRecord {
    /// Record with only a path set.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Load and merge every reference document in `dir`.
///
/// A missing directory or no matching documents yields an empty store.
pub fn load_references(dir: &Path) -> Result<MemoryRefStore, RefError> {
    let mut store = MemoryRefStore::new();
    for path in documents(dir, REFERENCE_SUFFIX)? {
        let records: Vec<MdReference> = read_rooted(&path, REFERENCE_ROOT)?;
        debug!(path = %path.display(), records = records.len(), "loaded reference document");
        store.extend(records)?;
    }
    Ok(store)
}

/// Load every object property record in `dir`, paths normalized.
///
/// A missing directory or no matching documents yields no records.
pub fn load_property_records(dir: &Path) -> Result<Vec<PropertyRecord>, RefError> {
    let mut out = Vec::new();
    for path in documents(dir, PROPERTY_SUFFIX)? {
        let records: Vec<PropertyRecord> = read_rooted(&path, PROPERTY_ROOT)?;
        debug!(path = %path.display(), records = records.len(), "loaded property document");
        out.extend(records.into_iter().map(|record| PropertyRecord {
            path: normalize_path(&record.path),
            ..record
        }));
    }
    Ok(out)
}

/// Append reference records to the `<step>-md-references.json` document.
pub fn append_references(
    dir: &Path,
    step: &str,
    records: &[MdReference],
) -> Result<PathBuf, RefError> {
    for record in records {
        record.clone().into_normalized()?;
    }
    let path = dir.join(format!("{step}-{REFERENCE_SUFFIX}"));
    append_rooted(&path, REFERENCE_ROOT, records)?;
    Ok(path)
}

/// Append property records to the `<step>-object-properties.json` document.
pub fn append_property_records(
    dir: &Path,
    step: &str,
    records: &[PropertyRecord],
) -> Result<PathBuf, RefError> {
    let path = dir.join(format!("{step}-{PROPERTY_SUFFIX}"));
    append_rooted(&path, PROPERTY_ROOT, records)?;
    Ok(path)
}

fn documents(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, RefError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(RefError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| RefError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(suffix));
        if matches && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn read_rooted<T: DeserializeOwned>(path: &Path, key: &'static str) -> Result<Vec<T>, RefError> {
    let bytes = fs::read(path).map_err(|source| RefError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|source| RefError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let Value::Object(mut root) = value else {
        return Err(RefError::MissingRoot {
            path: path.to_path_buf(),
            key,
        });
    };
    let items = root.remove(key).ok_or_else(|| RefError::MissingRoot {
        path: path.to_path_buf(),
        key,
    })?;
    serde_json::from_value(items).map_err(|source| RefError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn append_rooted<T>(path: &Path, key: &'static str, records: &[T]) -> Result<(), RefError>
where
    T: Serialize + DeserializeOwned + Clone,
{
    let mut all: Vec<T> = if path.is_file() {
        read_rooted(path, key)?
    } else {
        Vec::new()
    };
    all.extend_from_slice(records);
    let mut root = serde_json::Map::new();
    let items = serde_json::to_value(&all).map_err(|source| RefError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    root.insert(key.to_owned(), items);
    let bytes = serde_json::to_vec_pretty(&Value::Object(root)).map_err(|source| RefError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RefError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| RefError::Io {
        path: path.to_path_buf(),
        source,
    })
}
