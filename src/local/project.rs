use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::RemoteError;
use crate::model::ProjectConfig;
use crate::remote::ProjectClient;
use crate::storage::{read_json, write_json, StorageError};

/// File-backed implementation of [`ProjectClient`]: each project's full
/// configuration lives in `<dir>/<slug>.json` and is rewritten wholesale on
/// every update, mirroring the no-partial-update contract of the trait.
pub struct FileProjectClient {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileProjectClient {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slugify(name)))
    }

    /// Load a project config by name. A project that has never been written
    /// yields a fresh config with no attributes.
    pub fn load(&self, name: &str) -> Result<ProjectConfig, RemoteError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(ProjectConfig::new(name));
        }
        read_json(&path).map_err(to_remote)
    }
}

fn to_remote(e: StorageError) -> RemoteError {
    RemoteError::new(e.to_string())
}

#[async_trait]
impl ProjectClient for FileProjectClient {
    async fn update_project(&self, config: &ProjectConfig) -> Result<ProjectConfig, RemoteError> {
        let _guard = self.lock.lock().await;
        fs::create_dir_all(&self.dir).map_err(|e| to_remote(StorageError::Io(e)))?;
        write_json(&self.path_for(&config.name), config).map_err(to_remote)?;
        Ok(config.clone())
    }
}

/// Convert a project name to a safe filename slug.
pub(crate) fn slugify(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    // Collapse multiple dashes
    let mut result = String::new();
    let mut last_dash = false;
    for c in slug.chars() {
        if c == '-' {
            if !last_dash && !result.is_empty() {
                result.push('-');
            }
            last_dash = true;
        } else {
            result.push(c);
            last_dash = false;
        }
    }
    // Trim trailing dash
    while result.ends_with('-') {
        result.pop();
    }
    if result.is_empty() {
        "untitled".to_string()
    } else {
        result
    }
}
