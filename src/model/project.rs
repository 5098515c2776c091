use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Project attribute key holding the serialized command list, one JSON string
/// per command.
pub const COMMANDS_ATTRIBUTE: &str = "commands";

/// A project's configuration as the persistence collaborator sees it: a name
/// plus the full attribute map. Commands live under [`COMMANDS_ATTRIBUTE`];
/// every other attribute is preserved untouched when commands are rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl ProjectConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// The serialized command entries currently stored on this project.
    pub fn command_entries(&self) -> &[String] {
        self.attributes
            .get(COMMANDS_ATTRIBUTE)
            .map_or(&[], Vec::as_slice)
    }

    /// A copy of this config with the command entries replaced wholesale.
    /// All other attributes are carried over unchanged.
    pub fn with_command_entries(&self, entries: Vec<String>) -> Self {
        let mut config = self.clone();
        config
            .attributes
            .insert(COMMANDS_ATTRIBUTE.to_string(), entries);
        config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn with_command_entries_preserves_other_attributes() {
        let mut project = ProjectConfig::new("demo");
        project
            .attributes
            .insert("language".to_string(), vec!["java".to_string()]);

        let updated = project.with_command_entries(vec!["{}".to_string()]);
        assert_eq!(updated.command_entries(), ["{}".to_string()]);
        assert_eq!(
            updated.attributes.get("language"),
            Some(&vec!["java".to_string()])
        );
        // The original is untouched.
        assert!(project.command_entries().is_empty());
    }
}
