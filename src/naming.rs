//! Unique command-name allocation.

use crate::registry::CommandType;

/// Highest numeric suffix tried before giving up on uniqueness.
const MAX_SUFFIX: u32 = 999;

/// Produce a command name unique within the namespace `is_taken` closes over.
///
/// An empty `desired` name yields `"new" + display name` of the type. A
/// non-empty untaken name is returned unchanged; a taken one gets `" copy"`
/// appended, then `-1`, `-2`, … up to `-999` until an untaken candidate is
/// found. If every suffix is taken the base candidate is returned unchecked —
/// the namespace degrades to a duplicate name rather than failing.
pub fn unique_command_name<F>(is_taken: F, command_type: &CommandType, desired: &str) -> String
where
    F: Fn(&str) -> bool,
{
    let base = if desired.is_empty() {
        format!("new{}", command_type.display_name)
    } else {
        if !is_taken(desired) {
            return desired.to_string();
        }
        format!("{desired} copy")
    };

    if !is_taken(&base) {
        return base;
    }

    for count in 1..=MAX_SUFFIX {
        let candidate = format!("{base}-{count}");
        if !is_taken(&candidate) {
            return candidate;
        }
    }

    base
}
