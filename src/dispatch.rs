//! Command execution dispatch.

use std::sync::Arc;

use uuid::Uuid;

use crate::console::{CommandConsole, OutputRouter};
use crate::model::{Command, Machine, DEFAULT_SHELL, SHELL_ATTRIBUTE};
use crate::remote::{ExecClient, MacroExpander};

/// Prefix for per-execution output channel ids.
const OUTPUT_CHANNEL_PREFIX: &str = "process:output:";

/// Expands a command's macros, derives execution attributes, issues the
/// remote execution request, and wires the resulting process handle to an
/// output console.
pub struct CommandDispatcher {
    workspace_id: String,
    exec: Arc<dyn ExecClient>,
    macros: Arc<dyn MacroExpander>,
    router: Arc<OutputRouter>,
    default_shell: String,
}

impl CommandDispatcher {
    pub fn new(
        workspace_id: impl Into<String>,
        exec: Arc<dyn ExecClient>,
        macros: Arc<dyn MacroExpander>,
        router: Arc<OutputRouter>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            exec,
            macros,
            router,
            default_shell: DEFAULT_SHELL.to_string(),
        }
    }

    /// Override the shell injected into commands that carry none.
    pub fn with_default_shell(mut self, shell: impl Into<String>) -> Self {
        self.default_shell = shell.into();
        self
    }

    pub fn router(&self) -> &Arc<OutputRouter> {
        &self.router
    }

    /// Execute `command` on `machine`. Fire-and-forget from the caller's
    /// perspective: the returned console carries the outcome — running with a
    /// process attached, finished, or failed. No retry is attempted.
    ///
    /// The console is registered on a fresh output channel before any remote
    /// call so early output is never lost. Macro-expansion failure aborts the
    /// whole operation: the console fails and no execution request is sent.
    pub async fn execute(&self, command: &Command, machine: &Machine) -> Arc<CommandConsole> {
        let channel = format!("{OUTPUT_CHANNEL_PREFIX}{}", Uuid::new_v4());
        let console = Arc::new(CommandConsole::new(
            command.clone(),
            machine.clone(),
            channel.clone(),
        ));
        self.router.register(&channel, Arc::clone(&console));

        let expanded = match self.macros.expand(&command.command_line).await {
            Ok(line) => line,
            Err(e) => {
                console.mark_failed(e.to_string());
                self.router.unregister(&channel);
                return console;
            }
        };

        let mut to_execute = command.clone();
        to_execute.command_line = expanded;
        to_execute
            .attributes
            .entry(SHELL_ATTRIBUTE.to_string())
            .or_insert_with(|| self.default_shell.clone());

        let shell = to_execute.shell().unwrap_or(DEFAULT_SHELL).to_string();
        tracing::info!(command = %to_execute.name, %shell, "invoking command");

        match self
            .exec
            .execute_command(&self.workspace_id, &machine.id, &to_execute, &channel)
            .await
        {
            Ok(handle) => console.attach(handle),
            Err(e) => {
                console.mark_failed(e.to_string());
                self.router.unregister(&channel);
            }
        }

        console
    }
}
