//! Project-scoped command store.
//!
//! Commands bound to one project are persisted as a serialized attribute list
//! on that project's configuration. There is no partial-update primitive, so
//! every mutation is a read-modify-write of the whole set: the new full list
//! is written through the project-update collaborator, and the per-project
//! cache is replaced as a unit on success.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::Mutex;

use crate::error::CommandError;
use crate::events::ChangeNotifier;
use crate::model::{Command, ProjectConfig, PREVIEW_URL_ATTRIBUTE};
use crate::naming::unique_command_name;
use crate::registry::{CommandType, CommandTypeRegistry};
use crate::remote::ProjectClient;

/// Store of commands bound to individual projects, keyed by project name.
///
/// Like the workspace store, the async mutex spans each remote call so
/// mutations against the store queue rather than race. Callers must still
/// await each mutation against the same project before issuing the next.
pub struct ProjectCommandStore {
    client: Arc<dyn ProjectClient>,
    registry: Arc<CommandTypeRegistry>,
    notifier: Arc<ChangeNotifier>,
    caches: Mutex<HashMap<String, IndexMap<String, Command>>>,
}

impl ProjectCommandStore {
    pub fn new(
        client: Arc<dyn ProjectClient>,
        registry: Arc<CommandTypeRegistry>,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        Self {
            client,
            registry,
            notifier,
            caches: Mutex::new(HashMap::new()),
        }
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Parse the project's current attribute values into the cache for that
    /// project, replacing any previous cache for it, and return the commands.
    pub async fn list_for(&self, project: &ProjectConfig) -> Vec<Command> {
        let commands = parse_entries(project);
        let values = commands.values().cloned().collect();
        self.caches.lock().await.insert(project.name.clone(), commands);
        values
    }

    /// Create a command from the type's defaults and a generated name.
    pub async fn create_by_type(
        &self,
        project: &ProjectConfig,
        type_id: &str,
    ) -> Result<Command, CommandError> {
        let command_type = self.resolve_type(type_id)?;
        let template = command_type.command_line_template.clone();
        self.create(project, "", &template, type_id, BTreeMap::new())
            .await
    }

    /// Create a command bound to `project`. Requesting a name that is already
    /// bound to the project fails with `AlreadyAssociated`; generated-name
    /// collisions are resolved within the project's own namespace.
    pub async fn create(
        &self,
        project: &ProjectConfig,
        desired_name: &str,
        command_line: &str,
        type_id: &str,
        attributes: BTreeMap<String, String>,
    ) -> Result<Command, CommandError> {
        let command_type = self.resolve_type(type_id)?;

        let mut caches = self.caches.lock().await;
        let commands = working_set(&caches, project);

        if !desired_name.is_empty() && commands.contains_key(desired_name) {
            return Err(CommandError::AlreadyAssociated {
                name: desired_name.to_string(),
                project: project.name.clone(),
            });
        }

        let name = unique_command_name(|n| commands.contains_key(n), &command_type, desired_name);

        let mut attributes = attributes;
        attributes.insert(
            PREVIEW_URL_ATTRIBUTE.to_string(),
            command_type.preview_url_template.clone(),
        );

        let command = Command {
            name: name.clone(),
            type_id: type_id.to_string(),
            command_line: command_line.to_string(),
            attributes,
        };

        let mut next = commands;
        next.insert(name, command.clone());
        self.write_project(project, &next).await?;
        caches.insert(project.name.clone(), next);
        drop(caches);

        self.notifier.notify_added(&command);
        Ok(command)
    }

    /// Replace the command bound under `old_name` with `command`, allocating
    /// a fresh unique name within the project if the replacement's name
    /// collides with another of the project's commands.
    pub async fn update(
        &self,
        project: &ProjectConfig,
        old_name: &str,
        command: &Command,
    ) -> Result<Command, CommandError> {
        let command_type = self.resolve_type(&command.type_id)?;

        let mut caches = self.caches.lock().await;
        let commands = working_set(&caches, project);
        if !commands.contains_key(old_name) {
            return Err(CommandError::NotAssociated {
                name: old_name.to_string(),
                project: project.name.clone(),
            });
        }

        let mut next = commands;
        next.shift_remove(old_name);

        let name = unique_command_name(|n| next.contains_key(n), &command_type, &command.name);
        let mut updated = command.clone();
        updated.name = name;
        next.insert(updated.name.clone(), updated.clone());

        self.write_project(project, &next).await?;
        caches.insert(project.name.clone(), next);
        drop(caches);

        self.notifier.notify_updated(&updated);
        Ok(updated)
    }

    /// Unbind a command from the project by writing the full list without it.
    pub async fn remove(&self, project: &ProjectConfig, name: &str) -> Result<(), CommandError> {
        let mut caches = self.caches.lock().await;
        let commands = working_set(&caches, project);
        if !commands.contains_key(name) {
            return Err(CommandError::NotAssociated {
                name: name.to_string(),
                project: project.name.clone(),
            });
        }

        let mut next = commands;
        let removed = next.shift_remove(name);
        self.write_project(project, &next).await?;
        caches.insert(project.name.clone(), next);
        drop(caches);

        if let Some(removed) = removed {
            self.notifier.notify_removed(&removed);
        }
        Ok(())
    }

    async fn write_project(
        &self,
        project: &ProjectConfig,
        commands: &IndexMap<String, Command>,
    ) -> Result<(), CommandError> {
        let entries: Vec<String> = commands.values().map(Command::to_json).collect();
        let config = project.with_command_entries(entries);
        self.client.update_project(&config).await?;
        Ok(())
    }

    fn resolve_type(&self, type_id: &str) -> Result<Arc<CommandType>, CommandError> {
        self.registry
            .by_id(type_id)
            .ok_or_else(|| CommandError::UnknownType {
                type_id: type_id.to_string(),
            })
    }
}

/// The project's current command set: the cached map when present, otherwise
/// parsed fresh from the project's persisted attributes. Mutating on a
/// never-listed project must still read-modify-write the full persisted set.
fn working_set(
    caches: &HashMap<String, IndexMap<String, Command>>,
    project: &ProjectConfig,
) -> IndexMap<String, Command> {
    caches
        .get(&project.name)
        .cloned()
        .unwrap_or_else(|| parse_entries(project))
}

fn parse_entries(project: &ProjectConfig) -> IndexMap<String, Command> {
    let mut commands = IndexMap::new();
    for entry in project.command_entries() {
        match Command::from_json(entry) {
            Ok(command) => {
                commands.insert(command.name.clone(), command);
            }
            Err(e) => {
                tracing::warn!(project = %project.name, error = %e, "skipping unparsable command entry");
            }
        }
    }
    commands
}
