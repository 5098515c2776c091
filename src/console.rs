//! Output consoles and the channel router that feeds them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::{Command, Machine};
use crate::remote::ProcessHandle;

/// An event emitted by an execution backend for one process. The variant
/// names match the wire vocabulary of the execution agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessEvent {
    ProcessStarted { pid: u64 },
    Stdout { text: String },
    Stderr { text: String },
    ProcessDied { pid: u64 },
}

/// Which stream a captured output line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One captured line of process output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// Lifecycle of a console: registered and waiting, running with a process
/// handle, finished, or failed before/at dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleState {
    /// Registered on its output channel; no process attached yet.
    Listening,
    Running(ProcessHandle),
    Finished { pid: u64 },
    /// Macro expansion or the execution request failed; no process is
    /// attached and none will be.
    Failed { reason: String },
}

/// A sink for one execution's output and exit status, bound to the command
/// and machine it was dispatched with. Created by the dispatcher and
/// registered on its output channel before any remote call is issued, so
/// early output is never lost.
pub struct CommandConsole {
    command: Command,
    machine: Machine,
    channel: String,
    state: Mutex<ConsoleState>,
    output: Mutex<Vec<OutputLine>>,
}

impl CommandConsole {
    pub(crate) fn new(command: Command, machine: Machine, channel: String) -> Self {
        Self {
            command,
            machine,
            channel,
            state: Mutex::new(ConsoleState::Listening),
            output: Mutex::new(Vec::new()),
        }
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn state(&self) -> ConsoleState {
        self.state.lock().clone()
    }

    /// All output captured so far, in arrival order.
    pub fn output(&self) -> Vec<OutputLine> {
        self.output.lock().clone()
    }

    /// Whether the console has reached a terminal state.
    pub fn is_done(&self) -> bool {
        matches!(
            *self.state.lock(),
            ConsoleState::Finished { .. } | ConsoleState::Failed { .. }
        )
    }

    /// Route a process event into this console.
    pub fn handle_event(&self, event: ProcessEvent) {
        match event {
            // Informational: the authoritative Listening → Running transition
            // is `attach`, driven by the dispatcher's returned handle.
            ProcessEvent::ProcessStarted { .. } => {}
            ProcessEvent::Stdout { text } => self.output.lock().push(OutputLine {
                stream: OutputStream::Stdout,
                text,
            }),
            ProcessEvent::Stderr { text } => self.output.lock().push(OutputLine {
                stream: OutputStream::Stderr,
                text,
            }),
            ProcessEvent::ProcessDied { pid } => {
                let mut state = self.state.lock();
                if !matches!(*state, ConsoleState::Failed { .. }) {
                    *state = ConsoleState::Finished { pid };
                }
            }
        }
    }

    /// Attach the started process. A console whose process already died (the
    /// death event can outrun the dispatch reply) stays Finished.
    pub(crate) fn attach(&self, handle: ProcessHandle) {
        let mut state = self.state.lock();
        if matches!(*state, ConsoleState::Listening) {
            *state = ConsoleState::Running(handle);
        }
    }

    pub(crate) fn mark_failed(&self, reason: impl Into<String>) {
        *self.state.lock() = ConsoleState::Failed {
            reason: reason.into(),
        };
    }
}

/// Routes process events from execution backends to the console registered
/// for each output channel. Stands in for the original message-bus channels:
/// a remote transport bridges its subscription into `publish`.
pub struct OutputRouter {
    channels: Mutex<HashMap<String, Arc<CommandConsole>>>,
}

impl OutputRouter {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, channel: &str, console: Arc<CommandConsole>) {
        self.channels.lock().insert(channel.to_string(), console);
    }

    pub fn unregister(&self, channel: &str) -> Option<Arc<CommandConsole>> {
        self.channels.lock().remove(channel)
    }

    /// Deliver an event to the channel's console. Events for unknown channels
    /// are dropped; a death event retires the channel after delivery.
    pub fn publish(&self, channel: &str, event: ProcessEvent) {
        let console = self.channels.lock().get(channel).cloned();
        let Some(console) = console else {
            tracing::debug!(channel, "dropping event for unknown channel");
            return;
        };
        let died = matches!(event, ProcessEvent::ProcessDied { .. });
        console.handle_event(event);
        if died {
            self.unregister(channel);
        }
    }
}

impl Default for OutputRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn console() -> Arc<CommandConsole> {
        Arc::new(CommandConsole::new(
            Command::new("build", "make", "custom"),
            Machine::new("machine-1", "ws-1"),
            "process:output:test".to_string(),
        ))
    }

    #[test]
    fn output_lines_keep_stream_and_order() {
        let console = console();
        console.handle_event(ProcessEvent::Stdout {
            text: "compiling".to_string(),
        });
        console.handle_event(ProcessEvent::Stderr {
            text: "warning: unused".to_string(),
        });

        let output = console.output();
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].stream, OutputStream::Stdout);
        assert_eq!(output[1].stream, OutputStream::Stderr);
        assert_eq!(output[1].text, "warning: unused");
    }

    #[test]
    fn death_before_attach_wins() {
        let console = console();
        console.handle_event(ProcessEvent::ProcessDied { pid: 42 });
        console.attach(ProcessHandle {
            pid: 42,
            name: "build".to_string(),
            command_line: "make".to_string(),
        });
        assert_eq!(console.state(), ConsoleState::Finished { pid: 42 });
    }

    #[test]
    fn failure_is_terminal() {
        let console = console();
        console.mark_failed("macro expansion failed");
        console.handle_event(ProcessEvent::ProcessDied { pid: 1 });
        assert!(matches!(console.state(), ConsoleState::Failed { .. }));
    }

    #[test]
    fn router_delivers_and_retires_on_death() {
        let router = OutputRouter::new();
        let console = console();
        router.register(console.channel(), console.clone());

        router.publish(console.channel(), ProcessEvent::Stdout {
            text: "hello".to_string(),
        });
        router.publish(console.channel(), ProcessEvent::ProcessDied { pid: 7 });
        // Channel is gone; this event is dropped silently.
        router.publish(console.channel(), ProcessEvent::Stdout {
            text: "late".to_string(),
        });

        assert_eq!(console.output().len(), 1);
        assert_eq!(console.state(), ConsoleState::Finished { pid: 7 });
    }

    #[test]
    fn process_event_wire_names() {
        let started = serde_json::to_value(ProcessEvent::ProcessStarted { pid: 3 }).unwrap();
        assert_eq!(started["type"], "process_started");
        let died = serde_json::to_value(ProcessEvent::ProcessDied { pid: 3 }).unwrap();
        assert_eq!(died["type"], "process_died");
    }
}
