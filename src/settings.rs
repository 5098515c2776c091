use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::DEFAULT_SHELL;
use crate::storage::{read_json, write_json, StorageError};

/// CLI-level settings stored in the config directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerSettings {
    pub version: u32,
    pub data_dir: PathBuf,
    pub workspace_id: String,
    /// Shell injected into commands that carry no `shell` attribute.
    #[serde(default = "default_shell")]
    pub default_shell: String,
}

const SETTINGS_VERSION: u32 = 1;

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

impl ManagerSettings {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            version: SETTINGS_VERSION,
            data_dir,
            workspace_id: "local".to_string(),
            default_shell: default_shell(),
        }
    }
}

pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join("settings.json")
}

/// Load settings from the config directory. Returns None if no settings file
/// exists or it cannot be parsed.
pub fn load_settings(config_dir: &Path) -> Option<ManagerSettings> {
    let path = settings_path(config_dir);
    if !path.exists() {
        return None;
    }
    read_json(&path).ok()
}

/// Save settings to the config directory.
pub fn save_settings(
    config_dir: &Path,
    settings: &ManagerSettings,
) -> Result<(), StorageError> {
    std::fs::create_dir_all(config_dir)?;
    write_json(&settings_path(config_dir), settings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip() {
        let dir = std::env::temp_dir().join("workrunner_test_settings");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let settings = ManagerSettings::new(PathBuf::from("/some/data/dir"));
        save_settings(&dir, &settings).unwrap();

        let loaded = load_settings(&dir).expect("should load");
        assert_eq!(loaded.data_dir, PathBuf::from("/some/data/dir"));
        assert_eq!(loaded.workspace_id, "local");
        assert_eq!(loaded.default_shell, DEFAULT_SHELL);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_default_shell_falls_back() {
        let dir = std::env::temp_dir().join("workrunner_test_settings_shell");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let old_json = serde_json::json!({
            "version": 1,
            "data_dir": "/some/dir",
            "workspace_id": "ws-1"
        });
        std::fs::write(
            settings_path(&dir),
            serde_json::to_string_pretty(&old_json).unwrap(),
        )
        .unwrap();

        let loaded = load_settings(&dir).expect("should load");
        assert_eq!(loaded.default_shell, DEFAULT_SHELL);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = std::env::temp_dir().join("workrunner_test_no_settings");
        let _ = std::fs::remove_dir_all(&dir);
        assert!(load_settings(&dir).is_none());
    }
}
