//! Databases.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::State;
use crate::client::{ApiMessage, Collection};

/// `instances/{i}/databases/{d}`. Databases are discovered by instance sync,
/// never created or deleted through the API.
pub static DATABASES: Collection =
    Collection::rest("databases", "Database", "DatabaseService", "database");

/// Parent used to list databases across every instance.
pub const ALL_DATABASES_PARENT: &str = "workspaces/-";

/// A database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Database {
    pub name: String,
    pub state: State,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub effective_environment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub schema_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sync_state: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub successful_sync_time: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ApiMessage for Database {
    fn collection() -> &'static Collection {
        &DATABASES
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> State {
        self.state
    }
}
