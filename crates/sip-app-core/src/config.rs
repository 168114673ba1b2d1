// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config service and storage port for SIP workspace tools.
//!
//! Config values are JSON blobs addressed by a logical key. Storage is behind
//! [`ConfigStore`] so the same service works against a workspace directory,
//! the user's platform config dir, or an in-memory map in tests.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Key under which the structural-map compiler keeps its preferences.
pub const COMPILER_PREFS_KEY: &str = "compile-structmap";

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("config `{key}` is not valid: {source}")]
    Serde {
        /// Key whose blob failed to (de)serialize.
        key: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Thin service that serializes config values and delegates storage to a `ConfigStore`.
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the inner store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Load and deserialize a config value for `key`. Returns `Ok(None)` if missing or empty.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                if bytes.iter().all(u8::is_ascii_whitespace) {
                    return Ok(None);
                }
                let value = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Serde {
                    key: key.to_owned(),
                    source,
                })?;
                Ok(Some(value))
            }
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Like [`load`](Self::load), falling back to `T::default()` when the key is absent.
    pub fn load_or_default<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Default,
    {
        Ok(self.load(key)?.unwrap_or_default())
    }

    /// Serialize and persist a config value for `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value).map_err(|source| ConfigError::Serde {
            key: key.to_owned(),
            source,
        })?;
        self.store.save_raw(key, &data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::prefs::{CompilerPrefs, SupplementaryConflict};
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore {
        blobs: RefCell<HashMap<String, Vec<u8>>>,
    }

    impl ConfigStore for MapStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
            self.blobs
                .borrow()
                .get(key)
                .cloned()
                .ok_or(ConfigError::NotFound)
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.blobs.borrow_mut().insert(key.to_owned(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn missing_key_loads_as_none() {
        let svc = ConfigService::new(MapStore::default());
        let prefs: Option<CompilerPrefs> = svc.load(COMPILER_PREFS_KEY).unwrap();
        assert!(prefs.is_none());
    }

    #[test]
    fn blank_blob_loads_as_none() {
        let svc = ConfigService::new(MapStore::default());
        svc.store().save_raw(COMPILER_PREFS_KEY, b"  \n").unwrap();
        let prefs: Option<CompilerPrefs> = svc.load(COMPILER_PREFS_KEY).unwrap();
        assert!(prefs.is_none());
    }

    #[test]
    fn save_then_load_keeps_policy() {
        let svc = ConfigService::new(MapStore::default());
        let prefs = CompilerPrefs {
            supplementary_conflict: SupplementaryConflict::Reject,
            ..CompilerPrefs::default()
        };
        svc.save(COMPILER_PREFS_KEY, &prefs).unwrap();
        let loaded: CompilerPrefs = svc.load_or_default(COMPILER_PREFS_KEY).unwrap();
        assert_eq!(loaded.supplementary_conflict, SupplementaryConflict::Reject);
        assert_eq!(loaded.root_type, "directory");
    }

    #[test]
    fn malformed_blob_names_the_key() {
        let svc = ConfigService::new(MapStore::default());
        svc.store().save_raw(COMPILER_PREFS_KEY, b"{not json").unwrap();
        let err = svc.load::<CompilerPrefs>(COMPILER_PREFS_KEY).unwrap_err();
        assert!(err.to_string().contains(COMPILER_PREFS_KEY));
    }
}
