//! Collaborator trait boundaries. The stores and the dispatcher consume these
//! as opaque asynchronous operations; `crate::local` ships file- and
//! process-backed implementations, and any conforming transport client can be
//! substituted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{MacroError, RemoteError};
use crate::model::{Command, ProjectConfig};

/// Handle to a process started on an execution target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessHandle {
    pub pid: u64,
    pub name: String,
    pub command_line: String,
}

/// Remote command-storage service owning the workspace's command list.
#[async_trait]
pub trait WorkspaceClient: Send + Sync {
    async fn list_commands(&self, workspace_id: &str) -> Result<Vec<Command>, RemoteError>;

    async fn add_command(&self, workspace_id: &str, command: &Command)
        -> Result<(), RemoteError>;

    /// Replace the command stored under `old_name` with `command` (which may
    /// carry a different name).
    async fn update_command(
        &self,
        workspace_id: &str,
        old_name: &str,
        command: &Command,
    ) -> Result<(), RemoteError>;

    async fn delete_command(&self, workspace_id: &str, name: &str) -> Result<(), RemoteError>;
}

/// Persists a project's full attribute set and returns the updated project.
/// There is no partial-update primitive: callers hand over the whole config.
#[async_trait]
pub trait ProjectClient: Send + Sync {
    async fn update_project(&self, config: &ProjectConfig) -> Result<ProjectConfig, RemoteError>;
}

/// Machine/process execution service.
#[async_trait]
pub trait ExecClient: Send + Sync {
    /// Start `command` on the machine, routing its output events to
    /// `output_channel`, and return a handle to the started process.
    async fn execute_command(
        &self,
        workspace_id: &str,
        machine_id: &str,
        command: &Command,
        output_channel: &str,
    ) -> Result<ProcessHandle, RemoteError>;
}

/// Expands macro placeholders in a command line prior to execution.
#[async_trait]
pub trait MacroExpander: Send + Sync {
    async fn expand(&self, command_line: &str) -> Result<String, MacroError>;
}
