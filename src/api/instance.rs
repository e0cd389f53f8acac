//! Instances and their data sources.

use serde::{Deserialize, Serialize};

use super::State;
use crate::client::{ApiMessage, Collection};

/// `instances/{id}`, soft-deletable.
pub static INSTANCES: Collection = Collection {
    id_param: Some("instance_id"),
    soft_delete: true,
    ..Collection::rest("instances", "Instance", "InstanceService", "instance")
};

/// A database server registered with Bytebase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Instance {
    pub name: String,
    pub state: State,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub engine: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub engine_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub external_link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment: String,
    pub activation: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sync_interval: String,
    pub maximum_connections: i32,
    pub data_sources: Vec<DataSource>,
}

/// Connection settings of one data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataSource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub host: String,
    pub port: String,
    pub database: String,
    pub use_ssl: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ssl_ca: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ssl_cert: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ssl_key: String,
}

impl ApiMessage for Instance {
    fn collection() -> &'static Collection {
        &INSTANCES
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> State {
        self.state
    }
}
