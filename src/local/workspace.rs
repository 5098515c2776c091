use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::RemoteError;
use crate::model::Command;
use crate::remote::WorkspaceClient;
use crate::storage::{read_json, write_json, StorageError};

/// The on-disk document: the workspace's whole command list.
#[derive(Default, Serialize, Deserialize)]
struct CommandsFile {
    commands: Vec<Command>,
}

/// File-backed implementation of [`WorkspaceClient`] for a single workspace.
/// The command list lives in one JSON document, rewritten atomically on every
/// mutation; the workspace id argument is accepted and ignored.
pub struct FileWorkspaceClient {
    path: PathBuf,
    // Serializes read-modify-write sequences across tasks; the storage layer
    // only guards the write itself.
    lock: Mutex<()>,
}

impl FileWorkspaceClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Vec<Command>, RemoteError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        read_json::<CommandsFile>(&self.path)
            .map(|file| file.commands)
            .map_err(to_remote)
    }

    fn store(&self, commands: Vec<Command>) -> Result<(), RemoteError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| to_remote(StorageError::Io(e)))?;
        }
        write_json(&self.path, &CommandsFile { commands }).map_err(to_remote)
    }
}

fn to_remote(e: StorageError) -> RemoteError {
    RemoteError::new(e.to_string())
}

#[async_trait]
impl WorkspaceClient for FileWorkspaceClient {
    async fn list_commands(&self, _workspace_id: &str) -> Result<Vec<Command>, RemoteError> {
        let _guard = self.lock.lock().await;
        self.load()
    }

    async fn add_command(
        &self,
        _workspace_id: &str,
        command: &Command,
    ) -> Result<(), RemoteError> {
        let _guard = self.lock.lock().await;
        let mut commands = self.load()?;
        if commands.iter().any(|c| c.name == command.name) {
            return Err(RemoteError::new(format!(
                "command {} already exists",
                command.name
            )));
        }
        commands.push(command.clone());
        self.store(commands)
    }

    async fn update_command(
        &self,
        _workspace_id: &str,
        old_name: &str,
        command: &Command,
    ) -> Result<(), RemoteError> {
        let _guard = self.lock.lock().await;
        let mut commands = self.load()?;
        let Some(slot) = commands.iter_mut().find(|c| c.name == old_name) else {
            return Err(RemoteError::new(format!("no command named {old_name}")));
        };
        *slot = command.clone();
        self.store(commands)
    }

    async fn delete_command(&self, _workspace_id: &str, name: &str) -> Result<(), RemoteError> {
        let _guard = self.lock.lock().await;
        let mut commands = self.load()?;
        let before = commands.len();
        commands.retain(|c| c.name != name);
        if commands.len() == before {
            return Err(RemoteError::new(format!("no command named {name}")));
        }
        self.store(commands)
    }
}
