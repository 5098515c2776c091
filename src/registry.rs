use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Descriptor of an editor page associated with a command type. The pages
/// themselves are UI collaborators; the registry only carries their identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescriptor {
    pub id: String,
    pub title: String,
}

/// A category of commands supplying defaults: a command-line template, a
/// preview-URL template, and the editor pages used to edit commands of this
/// type. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandType {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub command_line_template: String,
    #[serde(default)]
    pub preview_url_template: String,
    #[serde(default)]
    pub pages: Vec<PageDescriptor>,
}

impl CommandType {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            command_line_template: String::new(),
            preview_url_template: String::new(),
            pages: Vec::new(),
        }
    }

    pub fn with_command_line_template(mut self, template: impl Into<String>) -> Self {
        self.command_line_template = template.into();
        self
    }

    pub fn with_preview_url_template(mut self, template: impl Into<String>) -> Self {
        self.preview_url_template = template.into();
        self
    }

    pub fn with_page(mut self, id: impl Into<String>, title: impl Into<String>) -> Self {
        self.pages.push(PageDescriptor {
            id: id.into(),
            title: title.into(),
        });
        self
    }
}

/// Registry of command types, keyed by type id. Registration order is
/// preserved for listing. Types are handed out as `Arc` — the stores hold
/// read references only.
pub struct CommandTypeRegistry {
    types: RwLock<IndexMap<String, Arc<CommandType>>>,
}

impl CommandTypeRegistry {
    pub fn new() -> Self {
        Self {
            types: RwLock::new(IndexMap::new()),
        }
    }

    /// Register a type. A type with the same id replaces the previous entry.
    pub fn register(&self, command_type: CommandType) {
        let mut types = self.types.write();
        types.insert(command_type.id.clone(), Arc::new(command_type));
    }

    pub fn by_id(&self, type_id: &str) -> Option<Arc<CommandType>> {
        self.types.read().get(type_id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<CommandType>> {
        self.types.read().values().cloned().collect()
    }

    /// Editor-page descriptors for a type; empty when the type is unknown.
    pub fn pages(&self, type_id: &str) -> Vec<PageDescriptor> {
        self.by_id(type_id)
            .map(|t| t.pages.clone())
            .unwrap_or_default()
    }
}

impl Default for CommandTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
