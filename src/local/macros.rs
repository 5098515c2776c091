use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::MacroError;
use crate::remote::MacroExpander;

/// Table-driven implementation of [`MacroExpander`]: replaces `${name}`
/// placeholders with registered values. Unknown placeholders and unterminated
/// `${` sequences are left verbatim, so a command line never loses text.
pub struct TableMacroExpander {
    entries: RwLock<HashMap<String, String>>,
}

impl TableMacroExpander {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a macro value. Re-defining a name replaces its value.
    pub fn define(&self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(name.into(), value.into());
    }

    fn substitute(&self, command_line: &str) -> String {
        let entries = self.entries.read();
        let mut out = String::with_capacity(command_line.len());
        let mut rest = command_line;

        while let Some(start) = rest.find("${") {
            let (before, tail) = rest.split_at(start);
            out.push_str(before);

            // Find the closing brace of this placeholder, if any.
            let Some(close) = tail.get(2..).and_then(|s| s.find('}')).map(|i| i + 2) else {
                // Unterminated: emit the tail verbatim and stop scanning.
                out.push_str(tail);
                return out;
            };

            let name = tail.get(2..close).unwrap_or("");
            match entries.get(name) {
                Some(value) => out.push_str(value),
                None => out.push_str(tail.get(..=close).unwrap_or("")),
            }
            rest = tail.get(close + 1..).unwrap_or("");
        }

        out.push_str(rest);
        out
    }
}

impl Default for TableMacroExpander {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MacroExpander for TableMacroExpander {
    async fn expand(&self, command_line: &str) -> Result<String, MacroError> {
        Ok(self.substitute(command_line))
    }
}
