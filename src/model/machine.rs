use serde::{Deserialize, Serialize};

/// An execution target. Opaque to this crate: identity is stable across a
/// single execution and meaningful only to the execution collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: String,
    pub workspace_id: String,
}

impl Machine {
    pub fn new(id: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
        }
    }
}
