// CLI binary — panicking on unrecoverable errors is standard for CLI tools.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use workrunner::console::{CommandConsole, ConsoleState, OutputRouter, OutputStream};
use workrunner::dispatch::CommandDispatcher;
use workrunner::error::CommandError;
use workrunner::events::{ChangeNotifier, CommandChangedListener};
use workrunner::local::{
    FileProjectClient, FileWorkspaceClient, LocalExecClient, TableMacroExpander,
};
use workrunner::model::{Command, Machine};
use workrunner::registry::{CommandType, CommandTypeRegistry};
use workrunner::settings::{self, ManagerSettings};
use workrunner::store::{ProjectCommandStore, WorkspaceCommandStore};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "workrunner", about = "Workspace command registry and runner", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory override
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered command types
    Types,
    /// Workspace-scoped commands
    Commands {
        #[command(subcommand)]
        action: CommandAction,
    },
    /// Project-scoped commands
    Project {
        /// Project name
        name: String,
        #[command(subcommand)]
        action: CommandAction,
    },
    /// Execute a command on the local machine
    Run {
        name: String,
        /// Run a project-scoped command instead of a workspace one
        #[arg(long)]
        project: Option<String>,
    },
    /// Show current settings
    Settings,
}

#[derive(Subcommand)]
enum CommandAction {
    /// List commands
    List,
    /// Create a command
    Create {
        /// Desired name; generated from the type when omitted
        #[arg(long)]
        name: Option<String>,
        /// Command line; the type's template when omitted
        #[arg(long)]
        line: Option<String>,
        /// Command type id
        #[arg(long = "type", default_value = "custom")]
        type_id: String,
    },
    /// Update a command's line and/or name
    Update {
        name: String,
        #[arg(long)]
        new_name: Option<String>,
        #[arg(long)]
        line: Option<String>,
    },
    /// Remove a command
    Remove { name: String },
}

// ── Wiring ───────────────────────────────────────────────────────

fn dirs_config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map_or_else(|_| dirs_home().join(".config"), PathBuf::from);
    base.join("workrunner")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_or_else(|_| PathBuf::from("."), PathBuf::from)
}

fn resolve_settings(data_dir_override: Option<&str>) -> ManagerSettings {
    let config_dir = dirs_config_dir();
    let mut loaded = settings::load_settings(&config_dir)
        .unwrap_or_else(|| ManagerSettings::new(config_dir.join("data")));
    if let Some(dd) = data_dir_override {
        loaded.data_dir = PathBuf::from(dd);
    }
    loaded
}

/// The built-in command types. A full deployment would discover these from
/// plugins; the CLI ships a fixed set.
fn builtin_registry() -> Arc<CommandTypeRegistry> {
    let registry = CommandTypeRegistry::new();
    registry.register(CommandType::new("custom", "Custom").with_page("arguments", "Arguments"));
    registry.register(
        CommandType::new("maven", "Maven")
            .with_command_line_template("mvn clean install")
            .with_page("goals", "Goals"),
    );
    Arc::new(registry)
}

fn workspace_store(
    manager_settings: &ManagerSettings,
    registry: Arc<CommandTypeRegistry>,
    notifier: Arc<ChangeNotifier>,
) -> WorkspaceCommandStore {
    let client = Arc::new(FileWorkspaceClient::new(
        manager_settings.data_dir.join("commands.json"),
    ));
    WorkspaceCommandStore::new(
        manager_settings.workspace_id.clone(),
        client,
        registry,
        notifier,
    )
}

/// Mirrors lifecycle events to stderr so mutations are visible as they land.
struct EventPrinter;

impl CommandChangedListener for EventPrinter {
    fn on_command_added(&self, command: &Command) {
        eprintln!("[workrunner] Added command '{}'", command.name);
    }

    fn on_command_updated(&self, command: &Command) {
        eprintln!("[workrunner] Updated command '{}'", command.name);
    }

    fn on_command_removed(&self, command: &Command) {
        eprintln!("[workrunner] Removed command '{}'", command.name);
    }
}

// ── Actions ──────────────────────────────────────────────────────

async fn run_workspace_action(
    manager_settings: &ManagerSettings,
    registry: Arc<CommandTypeRegistry>,
    notifier: Arc<ChangeNotifier>,
    action: CommandAction,
    raw_json: bool,
) -> Result<(), CommandError> {
    let store = workspace_store(manager_settings, Arc::clone(&registry), notifier);
    store.initialize().await?;

    match action {
        CommandAction::List => print_commands(&store.list().await?, raw_json),
        CommandAction::Create {
            name,
            line,
            type_id,
        } => {
            let created = if name.is_none() && line.is_none() {
                store.create_by_type(&type_id).await?
            } else {
                let template = registry
                    .by_id(&type_id)
                    .map(|t| t.command_line_template.clone())
                    .unwrap_or_default();
                store
                    .create(
                        name.as_deref().unwrap_or(""),
                        line.as_deref().unwrap_or(&template),
                        &type_id,
                        BTreeMap::new(),
                    )
                    .await?
            };
            print_command(&created, raw_json);
        }
        CommandAction::Update {
            name,
            new_name,
            line,
        } => {
            let mut command = store
                .list()
                .await?
                .into_iter()
                .find(|c| c.name == name)
                .ok_or_else(|| CommandError::NotFound { name: name.clone() })?;
            if let Some(new_name) = new_name {
                command.name = new_name;
            }
            if let Some(line) = line {
                command.command_line = line;
            }
            let updated = store.update(&name, &command).await?;
            print_command(&updated, raw_json);
        }
        CommandAction::Remove { name } => {
            store.remove(&name).await?;
            if raw_json {
                println!("{}", serde_json::json!({ "removed": name }));
            }
        }
    }
    Ok(())
}

async fn run_project_action(
    manager_settings: &ManagerSettings,
    registry: Arc<CommandTypeRegistry>,
    notifier: Arc<ChangeNotifier>,
    project_name: &str,
    action: CommandAction,
    raw_json: bool,
) -> Result<(), CommandError> {
    let client = Arc::new(FileProjectClient::new(
        manager_settings.data_dir.join("projects"),
    ));
    let project = client.load(project_name)?;
    let store = ProjectCommandStore::new(client, Arc::clone(&registry), notifier);

    match action {
        CommandAction::List => print_commands(&store.list_for(&project).await, raw_json),
        CommandAction::Create {
            name,
            line,
            type_id,
        } => {
            let created = if name.is_none() && line.is_none() {
                store.create_by_type(&project, &type_id).await?
            } else {
                let template = registry
                    .by_id(&type_id)
                    .map(|t| t.command_line_template.clone())
                    .unwrap_or_default();
                store
                    .create(
                        &project,
                        name.as_deref().unwrap_or(""),
                        line.as_deref().unwrap_or(&template),
                        &type_id,
                        BTreeMap::new(),
                    )
                    .await?
            };
            print_command(&created, raw_json);
        }
        CommandAction::Update {
            name,
            new_name,
            line,
        } => {
            let mut command = store
                .list_for(&project)
                .await
                .into_iter()
                .find(|c| c.name == name)
                .ok_or_else(|| CommandError::NotAssociated {
                    name: name.clone(),
                    project: project.name.clone(),
                })?;
            if let Some(new_name) = new_name {
                command.name = new_name;
            }
            if let Some(line) = line {
                command.command_line = line;
            }
            let updated = store.update(&project, &name, &command).await?;
            print_command(&updated, raw_json);
        }
        CommandAction::Remove { name } => {
            store.remove(&project, &name).await?;
            if raw_json {
                println!("{}", serde_json::json!({ "removed": name }));
            }
        }
    }
    Ok(())
}

async fn run_command(
    manager_settings: &ManagerSettings,
    registry: Arc<CommandTypeRegistry>,
    notifier: Arc<ChangeNotifier>,
    name: &str,
    project: Option<&str>,
    raw_json: bool,
) -> Result<(), CommandError> {
    let command = match project {
        None => {
            let store = workspace_store(manager_settings, registry, notifier);
            store.initialize().await?;
            store
                .list()
                .await?
                .into_iter()
                .find(|c| c.name == name)
                .ok_or_else(|| CommandError::NotFound {
                    name: name.to_string(),
                })?
        }
        Some(project_name) => {
            let client = Arc::new(FileProjectClient::new(
                manager_settings.data_dir.join("projects"),
            ));
            let config = client.load(project_name)?;
            let store = ProjectCommandStore::new(client, registry, notifier);
            store
                .list_for(&config)
                .await
                .into_iter()
                .find(|c| c.name == name)
                .ok_or_else(|| CommandError::NotAssociated {
                    name: name.to_string(),
                    project: project_name.to_string(),
                })?
        }
    };

    let router = Arc::new(OutputRouter::new());
    let macros = Arc::new(TableMacroExpander::new());
    macros.define("workspace.id", manager_settings.workspace_id.as_str());
    macros.define("machine.id", "local");
    let exec = Arc::new(LocalExecClient::new(Arc::clone(&router)));
    let dispatcher = CommandDispatcher::new(
        manager_settings.workspace_id.clone(),
        exec,
        macros,
        router,
    )
    .with_default_shell(manager_settings.default_shell.clone());

    let machine = Machine::new("local", manager_settings.workspace_id.clone());
    if !raw_json {
        eprintln!("[workrunner] Running '{}' on machine '{}'", command.name, machine.id);
    }
    let console = dispatcher.execute(&command, &machine).await;

    // Stream output until the console reaches a terminal state. The death
    // event arrives only after all output has been delivered, so one final
    // drain after is_done() catches everything.
    let mut printed = 0;
    loop {
        printed = print_new_output(&console, printed);
        if console.is_done() {
            print_new_output(&console, printed);
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    if let ConsoleState::Failed { reason } = console.state() {
        eprintln!("Error: {reason}");
        process::exit(1);
    }
    Ok(())
}

// ── Output formatting ────────────────────────────────────────────

fn print_commands(commands: &[Command], raw_json: bool) {
    if raw_json {
        println!("{}", serde_json::to_string_pretty(commands).unwrap_or_default());
        return;
    }
    if commands.is_empty() {
        println!("No commands.");
        return;
    }
    for command in commands {
        println!("{}  [{}]  {}", command.name, command.type_id, command.command_line);
    }
}

fn print_command(command: &Command, raw_json: bool) {
    if raw_json {
        println!("{}", serde_json::to_string_pretty(command).unwrap_or_default());
    } else {
        println!("{}  [{}]  {}", command.name, command.type_id, command.command_line);
    }
}

fn print_types(registry: &CommandTypeRegistry, raw_json: bool) {
    let types = registry.all();
    if raw_json {
        let refs: Vec<&CommandType> = types.iter().map(|t| t.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&refs).unwrap_or_default());
        return;
    }
    for command_type in &types {
        println!(
            "{}  ({})  {}",
            command_type.id, command_type.display_name, command_type.command_line_template
        );
    }
}

fn print_new_output(console: &Arc<CommandConsole>, printed: usize) -> usize {
    let output = console.output();
    for line in output.iter().skip(printed) {
        match line.stream {
            OutputStream::Stdout => println!("{}", line.text),
            OutputStream::Stderr => eprintln!("{}", line.text),
        }
    }
    output.len()
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let manager_settings = resolve_settings(cli.data_dir.as_deref());
    let registry = builtin_registry();
    let notifier = Arc::new(ChangeNotifier::new());
    if !cli.json {
        notifier.subscribe(Arc::new(EventPrinter));
    }

    let result = match cli.command {
        Commands::Types => {
            print_types(&registry, cli.json);
            Ok(())
        }
        Commands::Commands { action } => {
            run_workspace_action(&manager_settings, registry, notifier, action, cli.json).await
        }
        Commands::Project { name, action } => {
            run_project_action(&manager_settings, registry, notifier, &name, action, cli.json)
                .await
        }
        Commands::Run { name, project } => {
            run_command(
                &manager_settings,
                registry,
                notifier,
                &name,
                project.as_deref(),
                cli.json,
            )
            .await
        }
        Commands::Settings => {
            println!(
                "{}",
                serde_json::to_string_pretty(&manager_settings).unwrap_or_default()
            );
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
