//! Projects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::State;
use crate::client::{ApiMessage, Collection};

/// `projects/{id}`, soft-deletable.
pub static PROJECTS: Collection = Collection {
    id_param: Some("project_id"),
    soft_delete: true,
    ..Collection::rest("projects", "Project", "ProjectService", "project")
};

/// Default project holding databases not assigned anywhere else.
pub const DEFAULT_PROJECT: &str = "projects/default";

/// A project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub name: String,
    pub state: State,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub workflow: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub visibility: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tenant_mode: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub schema_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub schema_change: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub data_classification_config_id: String,
    pub allow_modify_statement: bool,
    pub auto_resolve_issue: bool,
    pub enforce_issue_title: bool,
    pub auto_enable_backup: bool,
    pub skip_backup_errors: bool,
    pub postgres_database_tenant_mode: bool,
    pub allow_self_approval: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ApiMessage for Project {
    fn collection() -> &'static Collection {
        &PROJECTS
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> State {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_discards_unknown_fields() {
        let project: Project = serde_json::from_value(json!({
            "name": "projects/acme",
            "state": "DELETED",
            "title": "Acme",
            "webhooks": [],
            "allowModifyStatement": true
        }))
        .unwrap();
        assert_eq!(project.name, "projects/acme");
        assert!(project.state.is_deleted());
        assert!(project.allow_modify_statement);
    }

    #[test]
    fn test_serialize_skips_empty_enums() {
        let value = serde_json::to_value(Project {
            name: "projects/acme".to_string(),
            title: "Acme".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(value.get("visibility").is_none());
        assert_eq!(value["title"], "Acme");
    }
}
