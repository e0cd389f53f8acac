//! Protocol messages.
//!
//! Serde mirrors of the server's canonical JSON mapping: lowerCamelCase
//! field names, unknown fields discarded on parse, oneof fields flattened
//! into the parent object. Each message that lives in a collection
//! implements [`ApiMessage`](crate::client::ApiMessage). Field names follow
//! the server's schema and are left undocumented.

#![allow(missing_docs)]

pub mod catalog;
pub mod database;
pub mod database_group;
pub mod group;
pub mod iam;
pub mod instance;
pub mod policy;
pub mod project;
pub mod review_config;
pub mod risk;
pub mod role;
pub mod setting;
pub mod user;
pub mod vcs;

use serde::{Deserialize, Serialize};

use crate::client::Collection;

/// Lifecycle state of soft-deletable messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// Not reported.
    #[default]
    StateUnspecified,
    /// Live.
    Active,
    /// Soft-deleted; can be undeleted.
    Deleted,
}

impl State {
    /// True for soft-deleted objects.
    pub fn is_deleted(self) -> bool {
        self == Self::Deleted
    }
}

/// A condition expression with optional metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Expr {
    /// Expression text.
    pub expression: String,
    /// Short title.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Longer description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Expr {
    /// An expression without metadata.
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Default::default()
        }
    }

    /// `None` for empty expressions.
    pub fn non_empty(expression: impl Into<String>) -> Option<Self> {
        let expression = expression.into();
        if expression.is_empty() {
            None
        } else {
            Some(Self::new(expression))
        }
    }
}

/// The workspace singleton, target of workspace IAM calls.
pub static WORKSPACES: Collection = Collection::rest("workspaces", "Workspace", "WorkspaceService", "workspace");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serde() {
        assert_eq!(serde_json::to_string(&State::Deleted).unwrap(), "\"DELETED\"");
        let state: State = serde_json::from_str("\"ACTIVE\"").unwrap();
        assert_eq!(state, State::Active);
        assert!(!state.is_deleted());
    }

    #[test]
    fn test_expr_skips_empty_metadata() {
        let expr = Expr::new("resource.environment_id == \"prod\"");
        assert_eq!(
            serde_json::to_value(&expr).unwrap(),
            serde_json::json!({"expression": "resource.environment_id == \"prod\""})
        );
        assert!(Expr::non_empty("").is_none());
    }
}
