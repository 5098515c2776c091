pub mod command;
pub mod machine;
pub mod project;

pub use command::{Command, DEFAULT_SHELL, PREVIEW_URL_ATTRIBUTE, SHELL_ATTRIBUTE};
pub use machine::Machine;
pub use project::{ProjectConfig, COMMANDS_ATTRIBUTE};
