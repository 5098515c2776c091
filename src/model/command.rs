use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute key under which a command carries the preview-URL template
/// copied from its type at creation.
pub const PREVIEW_URL_ATTRIBUTE: &str = "previewUrl";

/// Attribute key selecting the shell that runs the command line.
pub const SHELL_ATTRIBUTE: &str = "shell";

/// Shell used when a command carries no `shell` attribute.
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// A named, typed, executable invocation.
///
/// This is a value type: stores hand out copies, and callers' later edits are
/// never observed by in-flight remote calls. The serde shape doubles as the
/// wire/persisted form — one JSON object `{name, type, commandLine,
/// attributes}` per command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: String,
    pub command_line: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Command {
    pub fn new(
        name: impl Into<String>,
        command_line: impl Into<String>,
        type_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_id: type_id.into(),
            command_line: command_line.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// The preview-URL template injected from the command's type, if any.
    pub fn preview_url(&self) -> Option<&str> {
        self.attributes.get(PREVIEW_URL_ATTRIBUTE).map(String::as_str)
    }

    /// The shell this command requests, if any. The dispatcher fills in
    /// [`DEFAULT_SHELL`] at execution time when this is absent.
    pub fn shell(&self) -> Option<&str> {
        self.attributes.get(SHELL_ATTRIBUTE).map(String::as_str)
    }

    /// Parse a command from its serialized JSON form.
    pub fn from_json(entry: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(entry)
    }

    /// Serialize to the wire/persisted JSON form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
