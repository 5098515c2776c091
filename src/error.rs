use std::fmt;

use serde::Serialize;

/// Error reported by a remote collaborator (command storage, project update,
/// process execution). Wraps the underlying transport failure as a message;
/// the transport itself is outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote service error: {}", self.message)
    }
}

impl std::error::Error for RemoteError {}

/// Error reported by the macro-expansion collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacroError {
    pub message: String,
}

impl MacroError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for MacroError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "macro expansion failed: {}", self.message)
    }
}

impl std::error::Error for MacroError {}

/// Structured error type for command-store and dispatch operations.
/// Replaces stringly-typed errors so callers can match on error codes.
///
/// The local-validation variants (`UnknownType`, `AlreadyAssociated`,
/// `NotAssociated`, `NotFound`, `NotReady`) are raised before any remote
/// collaborator is contacted, so no partial state change can occur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "detail")]
pub enum CommandError {
    /// The command type id is not registered.
    UnknownType { type_id: String },
    /// A command with this name is already bound to the project.
    AlreadyAssociated { name: String, project: String },
    /// The named command is not bound to the project.
    NotAssociated { name: String, project: String },
    /// The named command is not in the workspace cache.
    NotFound { name: String },
    /// The workspace store has not been initialized yet.
    NotReady,
    /// A remote collaborator failed; local caches are untouched.
    Remote(RemoteError),
    /// Macro expansion failed; execution was aborted before dispatch.
    MacroExpansion(MacroError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::UnknownType { type_id } => {
                write!(f, "Unknown command type: {type_id}")
            }
            CommandError::AlreadyAssociated { name, project } => {
                write!(
                    f,
                    "Command with name {name} is already associated to the project {project}"
                )
            }
            CommandError::NotAssociated { name, project } => {
                write!(f, "Command {name} isn't associated with the project {project}")
            }
            CommandError::NotFound { name } => write!(f, "Command {name} not found"),
            CommandError::NotReady => write!(f, "Workspace commands are not loaded yet"),
            CommandError::Remote(e) => write!(f, "{e}"),
            CommandError::MacroExpansion(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<RemoteError> for CommandError {
    fn from(e: RemoteError) -> Self {
        CommandError::Remote(e)
    }
}

impl From<MacroError> for CommandError {
    fn from(e: MacroError) -> Self {
        CommandError::MacroExpansion(e)
    }
}

/// Allow converting CommandError to String for CLI display paths.
impl From<CommandError> for String {
    fn from(e: CommandError) -> String {
        e.to_string()
    }
}
