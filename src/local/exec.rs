use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::console::{OutputRouter, ProcessEvent};
use crate::error::RemoteError;
use crate::model::{Command, DEFAULT_SHELL};
use crate::remote::{ExecClient, ProcessHandle};

/// Runs commands on the local machine. The command line is handed to the
/// command's `shell` attribute (`/bin/bash` when absent) via `-c`; stdout and
/// stderr stream into the output router line by line, and a death event is
/// published after the process exits and all output has been delivered.
pub struct LocalExecClient {
    router: Arc<OutputRouter>,
}

impl LocalExecClient {
    pub fn new(router: Arc<OutputRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl ExecClient for LocalExecClient {
    async fn execute_command(
        &self,
        _workspace_id: &str,
        _machine_id: &str,
        command: &Command,
        output_channel: &str,
    ) -> Result<ProcessHandle, RemoteError> {
        let shell = command.shell().unwrap_or(DEFAULT_SHELL);
        let mut child = tokio::process::Command::new(shell)
            .arg("-c")
            .arg(&command.command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RemoteError::new(format!("failed to spawn {shell}: {e}")))?;

        let pid = u64::from(child.id().unwrap_or(0));
        let channel = output_channel.to_string();
        let router = Arc::clone(&self.router);
        router.publish(&channel, ProcessEvent::ProcessStarted { pid });

        let stdout_task = child
            .stdout
            .take()
            .map(|stdout| stream_lines(stdout, Arc::clone(&router), channel.clone(), false));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| stream_lines(stderr, Arc::clone(&router), channel.clone(), true));

        tokio::spawn(async move {
            let status = child.wait().await;
            // Drain the readers before announcing death so no output is lost.
            if let Some(task) = stdout_task {
                let _ = task.await;
            }
            if let Some(task) = stderr_task {
                let _ = task.await;
            }
            match status {
                Ok(status) => tracing::debug!(pid, %status, "local process exited"),
                Err(e) => tracing::warn!(pid, error = %e, "failed to reap local process"),
            }
            router.publish(&channel, ProcessEvent::ProcessDied { pid });
        });

        Ok(ProcessHandle {
            pid,
            name: command.name.clone(),
            command_line: command.command_line.clone(),
        })
    }
}

fn stream_lines<R>(
    reader: R,
    router: Arc<OutputRouter>,
    channel: String,
    stderr: bool,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(text)) = lines.next_line().await {
            let event = if stderr {
                ProcessEvent::Stderr { text }
            } else {
                ProcessEvent::Stdout { text }
            };
            router.publish(&channel, event);
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::console::{CommandConsole, ConsoleState, OutputStream};
    use crate::model::{Machine, SHELL_ATTRIBUTE};

    fn sh_command(name: &str, line: &str) -> Command {
        let mut command = Command::new(name, line, "custom");
        command
            .attributes
            .insert(SHELL_ATTRIBUTE.to_string(), "/bin/sh".to_string());
        command
    }

    async fn wait_until_done(console: &Arc<CommandConsole>) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !console.is_done() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("process did not finish in time");
    }

    #[tokio::test]
    async fn streams_output_and_exit_through_the_router() {
        let router = Arc::new(OutputRouter::new());
        let client = LocalExecClient::new(router.clone());

        let command = sh_command("greet", "echo one; echo two; echo oops 1>&2");
        let console = Arc::new(CommandConsole::new(
            command.clone(),
            Machine::new("local", "ws-1"),
            "process:output:exec-test".to_string(),
        ));
        router.register(console.channel(), console.clone());

        let handle = client
            .execute_command("ws-1", "local", &command, console.channel())
            .await
            .unwrap();
        assert_eq!(handle.name, "greet");

        wait_until_done(&console).await;

        let output = console.output();
        let stdout: Vec<&str> = output
            .iter()
            .filter(|l| l.stream == OutputStream::Stdout)
            .map(|l| l.text.as_str())
            .collect();
        let stderr: Vec<&str> = output
            .iter()
            .filter(|l| l.stream == OutputStream::Stderr)
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(stdout, ["one", "two"]);
        assert_eq!(stderr, ["oops"]);
        assert!(matches!(console.state(), ConsoleState::Finished { .. }));
    }

    #[tokio::test]
    async fn unknown_shell_fails_the_request() {
        let router = Arc::new(OutputRouter::new());
        let client = LocalExecClient::new(router);

        let mut command = Command::new("broken", "echo hi", "custom");
        command.attributes.insert(
            SHELL_ATTRIBUTE.to_string(),
            "/nonexistent/shell".to_string(),
        );

        let err = client
            .execute_command("ws-1", "local", &command, "process:output:none")
            .await
            .unwrap_err();
        assert!(err.message.contains("failed to spawn"));
    }
}
