//! Workspace-scoped command store.
//!
//! Cache-aside over the remote command-storage service: the in-memory map
//! reflects the last known-successful remote write. Every mutation persists
//! remotely first and touches the cache only on success, so a remote failure
//! leaves no local trace.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::Mutex;

use crate::error::CommandError;
use crate::events::ChangeNotifier;
use crate::model::{Command, PREVIEW_URL_ATTRIBUTE};
use crate::naming::unique_command_name;
use crate::registry::{CommandType, CommandTypeRegistry};
use crate::remote::WorkspaceClient;

enum Phase {
    Uninitialized,
    Ready,
}

struct State {
    phase: Phase,
    commands: IndexMap<String, Command>,
}

impl State {
    fn ensure_ready(&self) -> Result<(), CommandError> {
        match self.phase {
            Phase::Ready => Ok(()),
            Phase::Uninitialized => Err(CommandError::NotReady),
        }
    }
}

/// Store of commands bound to the whole workspace.
///
/// The async mutex is held across each remote call, serializing the
/// read-modify-write sequences: concurrent mutations against the same store
/// queue instead of racing on the cache. Callers that need a specific
/// inter-operation order must still await each operation before issuing the
/// next.
pub struct WorkspaceCommandStore {
    workspace_id: String,
    client: Arc<dyn WorkspaceClient>,
    registry: Arc<CommandTypeRegistry>,
    notifier: Arc<ChangeNotifier>,
    state: Mutex<State>,
}

impl WorkspaceCommandStore {
    pub fn new(
        workspace_id: impl Into<String>,
        client: Arc<dyn WorkspaceClient>,
        registry: Arc<CommandTypeRegistry>,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            client,
            registry,
            notifier,
            state: Mutex::new(State {
                phase: Phase::Uninitialized,
                commands: IndexMap::new(),
            }),
        }
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// One-shot population from the remote list: Uninitialized → Ready.
    /// Invoked by whoever owns the workspace-ready signal. Idempotent after
    /// success; on failure the store stays Uninitialized.
    pub async fn initialize(&self) -> Result<(), CommandError> {
        let mut state = self.state.lock().await;
        if matches!(state.phase, Phase::Ready) {
            return Ok(());
        }
        let commands = self.client.list_commands(&self.workspace_id).await?;
        state.commands = commands.into_iter().map(|c| (c.name.clone(), c)).collect();
        state.phase = Phase::Ready;
        Ok(())
    }

    /// Defensive copies of all cached commands. Does not re-fetch remotely.
    pub async fn list(&self) -> Result<Vec<Command>, CommandError> {
        let state = self.state.lock().await;
        state.ensure_ready()?;
        Ok(state.commands.values().cloned().collect())
    }

    /// Create a command from the type's defaults and a generated name.
    pub async fn create_by_type(&self, type_id: &str) -> Result<Command, CommandError> {
        let command_type = self.resolve_type(type_id)?;
        let template = command_type.command_line_template.clone();
        self.create("", &template, type_id, BTreeMap::new()).await
    }

    /// Create a command with a caller-supplied line and attributes. The
    /// desired name is made unique within the workspace namespace, and the
    /// type's preview-URL template is injected into the attributes.
    pub async fn create(
        &self,
        desired_name: &str,
        command_line: &str,
        type_id: &str,
        attributes: BTreeMap<String, String>,
    ) -> Result<Command, CommandError> {
        let command_type = self.resolve_type(type_id)?;

        let mut state = self.state.lock().await;
        state.ensure_ready()?;

        let name = unique_command_name(
            |n| state.commands.contains_key(n),
            &command_type,
            desired_name,
        );

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

        self.client.add_command(&self.workspace_id, &command).await?;
        state.commands.insert(name, command.clone());
        drop(state);

        self.notifier.notify_added(&command);
        Ok(command)
    }

    /// Replace the command stored under `old_name` with `command`, allocating
    /// a fresh unique name if the replacement's name collides with another
    /// command. Keeping the same name is not a collision.
    pub async fn update(&self, old_name: &str, command: &Command) -> Result<Command, CommandError> {
        let command_type = self.resolve_type(&command.type_id)?;

        let mut state = self.state.lock().await;
        state.ensure_ready()?;
        if !state.commands.contains_key(old_name) {
            return Err(CommandError::NotFound {
                name: old_name.to_string(),
            });
        }

        let name = unique_command_name(
            |n| n != old_name && state.commands.contains_key(n),
            &command_type,
            &command.name,
        );
        let mut updated = command.clone();
        updated.name = name;

        self.client
            .update_command(&self.workspace_id, old_name, &updated)
            .await?;
        state.commands.shift_remove(old_name);
        state.commands.insert(updated.name.clone(), updated.clone());
        drop(state);

        self.notifier.notify_updated(&updated);
        Ok(updated)
    }

    /// Delete a command remotely, then evict it from the cache.
    pub async fn remove(&self, name: &str) -> Result<(), CommandError> {
        let mut state = self.state.lock().await;
        state.ensure_ready()?;
        if !state.commands.contains_key(name) {
            return Err(CommandError::NotFound {
                name: name.to_string(),
            });
        }

        self.client.delete_command(&self.workspace_id, name).await?;
        let removed = state.commands.shift_remove(name);
        drop(state);

        if let Some(removed) = removed {
            self.notifier.notify_removed(&removed);
        }
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

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::testutil::{test_registry, FakeWorkspaceClient, RecordingListener};

    fn store_with(
        client: Arc<FakeWorkspaceClient>,
    ) -> (WorkspaceCommandStore, Arc<RecordingListener>) {
        let notifier = Arc::new(ChangeNotifier::new());
        let listener = Arc::new(RecordingListener::default());
        notifier.subscribe(listener.clone());
        let store = WorkspaceCommandStore::new("ws-1", client, test_registry(), notifier);
        (store, listener)
    }

    #[tokio::test]
    async fn operations_rejected_before_initialize() {
        let (store, _) = store_with(Arc::new(FakeWorkspaceClient::default()));
        assert_eq!(store.list().await.unwrap_err(), CommandError::NotReady);
        assert_eq!(
            store.remove("build").await.unwrap_err(),
            CommandError::NotReady
        );
    }

    #[tokio::test]
    async fn initialize_populates_from_remote_once() {
        let client = Arc::new(FakeWorkspaceClient::default());
        client.seed(Command::new("build", "mvn package", "custom"));
        let (store, _) = store_with(client.clone());

        store.initialize().await.unwrap();
        client.seed(Command::new("late", "echo", "custom"));
        // Second call is a no-op: the late remote entry is not picked up.
        store.initialize().await.unwrap();

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["build"]);
    }

    #[tokio::test]
    async fn create_then_list_round_trips() {
        let (store, listener) = store_with(Arc::new(FakeWorkspaceClient::default()));
        store.initialize().await.unwrap();

        let created = store
            .create("build", "mvn package", "custom", BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(created.name, "build");
        assert_eq!(created.preview_url(), Some("http://preview/custom"));
        // Shell is a dispatch-time default, not a creation-time one.
        assert_eq!(created.shell(), None);

        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![created.clone()]);
        assert_eq!(listener.added(), ["build"]);
    }

    #[tokio::test]
    async fn create_with_unknown_type_is_rejected_without_remote_call() {
        let client = Arc::new(FakeWorkspaceClient::default());
        let (store, listener) = store_with(client.clone());
        store.initialize().await.unwrap();

        let err = store
            .create("x", "ls", "gradle", BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::UnknownType {
                type_id: "gradle".to_string()
            }
        );
        assert_eq!(client.mutation_calls(), 0);
        assert!(listener.added().is_empty());
    }

    #[tokio::test]
    async fn colliding_desired_name_gets_copy_suffix() {
        let (store, _) = store_with(Arc::new(FakeWorkspaceClient::default()));
        store.initialize().await.unwrap();

        store
            .create("build", "mvn package", "custom", BTreeMap::new())
            .await
            .unwrap();
        let second = store
            .create("build", "mvn verify", "custom", BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(second.name, "build copy");

        let third = store
            .create("build", "mvn deploy", "custom", BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(third.name, "build copy-1");
    }

    #[tokio::test]
    async fn create_by_type_uses_template_and_generated_name() {
        let (store, _) = store_with(Arc::new(FakeWorkspaceClient::default()));
        store.initialize().await.unwrap();

        let created = store.create_by_type("custom").await.unwrap();
        assert_eq!(created.name, "newCustom");
        assert_eq!(created.command_line, "echo hello");

        // Generated names collide straight into the numeric suffixes; the
        // " copy" step applies only to caller-supplied names.
        let again = store.create_by_type("custom").await.unwrap();
        assert_eq!(again.name, "newCustom-1");
    }

    #[tokio::test]
    async fn update_keeping_name_does_not_self_collide() {
        let (store, listener) = store_with(Arc::new(FakeWorkspaceClient::default()));
        store.initialize().await.unwrap();

        let created = store
            .create("build", "mvn package", "custom", BTreeMap::new())
            .await
            .unwrap();
        let mut edited = created.clone();
        edited.command_line = "mvn -T4 package".to_string();

        let updated = store.update("build", &edited).await.unwrap();
        assert_eq!(updated.name, "build");
        assert_eq!(updated.command_line, "mvn -T4 package");
        assert_eq!(listener.updated(), ["build"]);
    }

    #[tokio::test]
    async fn update_renaming_to_taken_name_suffixes_instead_of_overwriting() {
        let (store, _) = store_with(Arc::new(FakeWorkspaceClient::default()));
        store.initialize().await.unwrap();

        store
            .create("build", "mvn package", "custom", BTreeMap::new())
            .await
            .unwrap();
        let other = store
            .create("test", "mvn test", "custom", BTreeMap::new())
            .await
            .unwrap();

        let mut renamed = other.clone();
        renamed.name = "build".to_string();
        let updated = store.update("test", &renamed).await.unwrap();

        assert_eq!(updated.name, "build copy");
        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert!(names.contains(&"build".to_string()));
        assert!(names.contains(&"build copy".to_string()));
        assert!(!names.contains(&"test".to_string()));
    }

    #[tokio::test]
    async fn update_of_uncached_name_fails_not_found() {
        let client = Arc::new(FakeWorkspaceClient::default());
        let (store, _) = store_with(client.clone());
        store.initialize().await.unwrap();

        let err = store
            .update("ghost", &Command::new("ghost", "ls", "custom"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::NotFound {
                name: "ghost".to_string()
            }
        );
        assert_eq!(client.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn remove_evicts_and_fires_one_removed_event() {
        let (store, listener) = store_with(Arc::new(FakeWorkspaceClient::default()));
        store.initialize().await.unwrap();

        let created = store
            .create("build", "mvn package", "custom", BTreeMap::new())
            .await
            .unwrap();
        store.remove("build").await.unwrap();

        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(listener.removed(), ["build"]);
        // The event carried the removed command's prior value.
        assert_eq!(listener.last_removed_command(), Some(created));
    }

    #[tokio::test]
    async fn remove_of_unknown_name_fails_not_found_without_remote_call() {
        let client = Arc::new(FakeWorkspaceClient::default());
        let (store, listener) = store_with(client.clone());
        store.initialize().await.unwrap();

        let err = store.remove("ghost").await.unwrap_err();
        assert_eq!(
            err,
            CommandError::NotFound {
                name: "ghost".to_string()
            }
        );
        assert_eq!(client.mutation_calls(), 0);
        assert!(listener.removed().is_empty());
    }

    #[tokio::test]
    async fn remote_failure_leaves_cache_untouched() {
        let client = Arc::new(FakeWorkspaceClient::default());
        let (store, listener) = store_with(client.clone());
        store.initialize().await.unwrap();
        store
            .create("build", "mvn package", "custom", BTreeMap::new())
            .await
            .unwrap();

        client.fail_next("connection reset");
        let err = store
            .create("test", "mvn test", "custom", BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Remote(_)));

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["build"]);
        assert_eq!(listener.added(), ["build"]);

        client.fail_next("connection reset");
        assert!(matches!(
            store.remove("build").await.unwrap_err(),
            CommandError::Remote(_)
        ));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
