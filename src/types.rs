//! Shared value types and constants.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::Diagnostic;

/// Version segment prepended to every API path.
pub const API_VERSION: &str = "v1";

/// Page size for every list request.
pub const DEFAULT_PAGE_SIZE: i32 = 500;

/// Deadline for the login exchange.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable for the server URL.
pub const ENV_URL: &str = "BYTEBASE_URL";

/// Environment variable for the service account email.
pub const ENV_SERVICE_ACCOUNT: &str = "BYTEBASE_SERVICE_ACCOUNT";

/// Environment variable for the service account key.
pub const ENV_SERVICE_KEY: &str = "BYTEBASE_SERVICE_KEY";

/// Name of the provider, used as the type name prefix.
pub const PROVIDER_NAME: &str = "bytebase";

/// A change to a single attribute between prior and desired state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if absent).
    pub before: Option<Value>,
    /// The value after the change (None if removed).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// What a handler hands back to the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandlerOutcome {
    /// New state. `None` clears the handle.
    pub state: Option<Value>,
    /// Warnings (and errors, for outcomes built from failures).
    pub diagnostics: Vec<Diagnostic>,
}

impl HandlerOutcome {
    /// Outcome carrying a state.
    pub fn with_state(state: Value, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            state: Some(state),
            diagnostics,
        }
    }

    /// Outcome clearing the handle.
    pub fn cleared(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            state: None,
            diagnostics,
        }
    }

    /// The canonical name recorded in `state.id`, if any.
    pub fn id(&self) -> Option<&str> {
        self.state.as_ref()?.get("id")?.as_str()
    }

    /// Warning diagnostics only.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }
}

/// Provider metadata: the names of every registered type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
}

/// Full type name for a short name, e.g. `project` → `bytebase_project`.
pub fn type_name(short: &str) -> String {
    format!("{}_{}", PROVIDER_NAME, short)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("title", json!("Acme"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("Acme")));

        let removed = AttributeChange::removed("title", json!("old"));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("port", json!(1), json!(2));
        assert_eq!(modified.before, Some(json!(1)));
        assert_eq!(modified.after, Some(json!(2)));
    }

    #[test]
    fn test_handler_outcome() {
        let outcome = HandlerOutcome::with_state(
            json!({"id": "projects/acme"}),
            vec![Diagnostic::warning("upsert")],
        );
        assert_eq!(outcome.id(), Some("projects/acme"));
        assert_eq!(outcome.warnings().count(), 1);

        let cleared = HandlerOutcome::cleared(Vec::new());
        assert!(cleared.id().is_none());
    }

    #[test]
    fn test_constants() {
        assert_eq!(API_VERSION, "v1");
        assert_eq!(DEFAULT_PAGE_SIZE, 500);
        assert_eq!(LOGIN_TIMEOUT, Duration::from_secs(10));
        assert_eq!(type_name("project"), "bytebase_project");
    }
}
