//! IAM policies of the workspace and of projects.

use serde::{Deserialize, Serialize};

use super::Expr;

/// A full IAM policy. Writes replace every binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IamPolicy {
    pub bindings: Vec<Binding>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub etag: String,
}

/// Grants `role` to `members`, optionally under a condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Binding {
    pub role: String,
    pub members: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expr>,
}

impl Binding {
    /// Condition expression, empty when unconditional.
    pub fn expression(&self) -> &str {
        self.condition
            .as_ref()
            .map(|c| c.expression.as_str())
            .unwrap_or_default()
    }
}
