//! In-memory fake collaborators shared by store and dispatch tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{MacroError, RemoteError};
use crate::events::CommandChangedListener;
use crate::model::{Command, ProjectConfig};
use crate::registry::{CommandType, CommandTypeRegistry};
use crate::remote::{ExecClient, MacroExpander, ProcessHandle, ProjectClient, WorkspaceClient};

/// Registry with the single "custom" type used throughout the tests.
pub fn test_registry() -> Arc<CommandTypeRegistry> {
    let registry = CommandTypeRegistry::new();
    registry.register(
        CommandType::new("custom", "Custom")
            .with_command_line_template("echo hello")
            .with_preview_url_template("http://preview/custom"),
    );
    Arc::new(registry)
}

fn take_failure(slot: &Mutex<Option<String>>) -> Result<(), RemoteError> {
    match slot.lock().take() {
        Some(message) => Err(RemoteError::new(message)),
        None => Ok(()),
    }
}

// ── Workspace storage fake ──────────────────────────────────────────

#[derive(Default)]
pub struct FakeWorkspaceClient {
    commands: Mutex<Vec<Command>>,
    fail: Mutex<Option<String>>,
    mutations: AtomicUsize,
}

impl FakeWorkspaceClient {
    /// Pre-populate the remote side (visible to the next `list_commands`).
    pub fn seed(&self, command: Command) {
        self.commands.lock().push(command);
    }

    /// Make the next call fail with the given transport message.
    pub fn fail_next(&self, message: &str) {
        *self.fail.lock() = Some(message.to_string());
    }

    /// Number of add/update/delete calls received.
    pub fn mutation_calls(&self) -> usize {
        self.mutations.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl WorkspaceClient for FakeWorkspaceClient {
    async fn list_commands(&self, _workspace_id: &str) -> Result<Vec<Command>, RemoteError> {
        take_failure(&self.fail)?;
        Ok(self.commands.lock().clone())
    }

    async fn add_command(
        &self,
        _workspace_id: &str,
        command: &Command,
    ) -> Result<(), RemoteError> {
        self.mutations.fetch_add(1, Ordering::Relaxed);
        take_failure(&self.fail)?;
        self.commands.lock().push(command.clone());
        Ok(())
    }

    async fn update_command(
        &self,
        _workspace_id: &str,
        old_name: &str,
        command: &Command,
    ) -> Result<(), RemoteError> {
        self.mutations.fetch_add(1, Ordering::Relaxed);
        take_failure(&self.fail)?;
        let mut commands = self.commands.lock();
        let Some(slot) = commands.iter_mut().find(|c| c.name == old_name) else {
            return Err(RemoteError::new(format!("no command named {old_name}")));
        };
        *slot = command.clone();
        Ok(())
    }

    async fn delete_command(&self, _workspace_id: &str, name: &str) -> Result<(), RemoteError> {
        self.mutations.fetch_add(1, Ordering::Relaxed);
        take_failure(&self.fail)?;
        let mut commands = self.commands.lock();
        let before = commands.len();
        commands.retain(|c| c.name != name);
        if commands.len() == before {
            return Err(RemoteError::new(format!("no command named {name}")));
        }
        Ok(())
    }
}

// ── Project update fake ─────────────────────────────────────────────

#[derive(Default)]
pub struct FakeProjectClient {
    updates: Mutex<Vec<ProjectConfig>>,
    fail: Mutex<Option<String>>,
}

impl FakeProjectClient {
    pub fn fail_next(&self, message: &str) {
        *self.fail.lock() = Some(message.to_string());
    }

    pub fn last_update(&self) -> Option<ProjectConfig> {
        self.updates.lock().last().cloned()
    }

    pub fn update_calls(&self) -> usize {
        self.updates.lock().len()
    }
}

#[async_trait]
impl ProjectClient for FakeProjectClient {
    async fn update_project(&self, config: &ProjectConfig) -> Result<ProjectConfig, RemoteError> {
        take_failure(&self.fail)?;
        self.updates.lock().push(config.clone());
        Ok(config.clone())
    }
}

// ── Execution fake ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub workspace_id: String,
    pub machine_id: String,
    pub command: Command,
    pub channel: String,
}

#[derive(Default)]
pub struct FakeExecClient {
    requests: Mutex<Vec<ExecRequest>>,
    fail: Mutex<Option<String>>,
    next_pid: AtomicU64,
}

impl FakeExecClient {
    pub fn fail_next(&self, message: &str) {
        *self.fail.lock() = Some(message.to_string());
    }

    pub fn last_request(&self) -> Option<ExecRequest> {
        self.requests.lock().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ExecClient for FakeExecClient {
    async fn execute_command(
        &self,
        workspace_id: &str,
        machine_id: &str,
        command: &Command,
        output_channel: &str,
    ) -> Result<ProcessHandle, RemoteError> {
        take_failure(&self.fail)?;
        self.requests.lock().push(ExecRequest {
            workspace_id: workspace_id.to_string(),
            machine_id: machine_id.to_string(),
            command: command.clone(),
            channel: output_channel.to_string(),
        });
        Ok(ProcessHandle {
            pid: 1000 + self.next_pid.fetch_add(1, Ordering::Relaxed),
            name: command.name.clone(),
            command_line: command.command_line.clone(),
        })
    }
}

// ── Macro expansion fake ────────────────────────────────────────────

#[derive(Default)]
pub struct FakeMacroExpander {
    entries: Mutex<Vec<(String, String)>>,
    fail: Mutex<Option<String>>,
}

impl FakeMacroExpander {
    pub fn define(&self, name: &str, value: &str) {
        self.entries
            .lock()
            .push((name.to_string(), value.to_string()));
    }

    pub fn fail_next(&self, message: &str) {
        *self.fail.lock() = Some(message.to_string());
    }
}

#[async_trait]
impl MacroExpander for FakeMacroExpander {
    async fn expand(&self, command_line: &str) -> Result<String, MacroError> {
        if let Some(message) = self.fail.lock().take() {
            return Err(MacroError::new(message));
        }
        let mut expanded = command_line.to_string();
        for (name, value) in self.entries.lock().iter() {
            expanded = expanded.replace(&format!("${{{name}}}"), value);
        }
        Ok(expanded)
    }
}

// ── Recording listener ──────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingListener {
    added: Mutex<Vec<Command>>,
    updated: Mutex<Vec<Command>>,
    removed: Mutex<Vec<Command>>,
}

impl RecordingListener {
    pub fn added(&self) -> Vec<String> {
        self.added.lock().iter().map(|c| c.name.clone()).collect()
    }

    pub fn updated(&self) -> Vec<String> {
        self.updated.lock().iter().map(|c| c.name.clone()).collect()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().iter().map(|c| c.name.clone()).collect()
    }

    pub fn last_removed_command(&self) -> Option<Command> {
        self.removed.lock().last().cloned()
    }
}

impl CommandChangedListener for RecordingListener {
    fn on_command_added(&self, command: &Command) {
        self.added.lock().push(command.clone());
    }

    fn on_command_updated(&self, command: &Command) {
        self.updated.lock().push(command.clone());
    }

    fn on_command_removed(&self, command: &Command) {
        self.removed.lock().push(command.clone());
    }
}
