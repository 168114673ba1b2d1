// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `ConfigStore` for SIP workspace tools.
//!
//! A store is either rooted at the platform config dir (user-wide defaults)
//! or at an explicit directory, typically the SIP workspace itself.

use directories::ProjectDirs;
use sip_app_core::config::{ConfigError, ConfigStore};
use std::fs;
use std::path::{Path, PathBuf};

/// Store configs as `<key>.json` files under a base directory.
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at the user config directory (e.g., `~/.config/sip-tools`).
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("fi", "dpres", "sip-tools")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        let base = proj.config_dir().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Create a store rooted at `dir`. The directory is not created until a save.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { base: dir.into() }
    }

    /// Directory holding the config files.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let path = self.path_for(key);
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
impl FsConfigStore {
    fn contains(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sip_app_core::config::{ConfigService, COMPILER_PREFS_KEY};
    use sip_app_core::prefs::{CompilerPrefs, SupplementaryConflict};

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::at(dir.path());
        assert!(matches!(store.load_raw("nope"), Err(ConfigError::NotFound)));
        assert!(!store.contains("nope"));
    }

    #[test]
    fn prefs_round_trip_through_workspace_dir() {
        let dir = tempfile::tempdir().unwrap();
        let svc = ConfigService::new(FsConfigStore::at(dir.path().join("nested")));
        let prefs = CompilerPrefs {
            root_type: "collection".to_owned(),
            supplementary_conflict: SupplementaryConflict::FirstWins,
            ..CompilerPrefs::default()
        };
        svc.save(COMPILER_PREFS_KEY, &prefs).unwrap();
        assert!(svc.store().contains(COMPILER_PREFS_KEY));
        assert!(dir.path().join("nested/compile-structmap.json").is_file());

        let loaded: CompilerPrefs = svc.load_or_default(COMPILER_PREFS_KEY).unwrap();
        assert_eq!(loaded, prefs);
    }

    #[test]
    fn hand_written_json_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("compile-structmap.json"),
            serde_json::to_vec(&serde_json::json!({ "root_type": "fonds" })).unwrap(),
        )
        .unwrap();
        let svc = ConfigService::new(FsConfigStore::at(dir.path()));
        let loaded: CompilerPrefs = svc.load_or_default(COMPILER_PREFS_KEY).unwrap();
        assert_eq!(loaded.root_type, "fonds");
    }
}
