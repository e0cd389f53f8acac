//! `bytebase_database`.
//!
//! Databases are discovered by instance sync. The resource only adopts an
//! existing database and manages its project, environment and labels;
//! destroying it forgets the database without touching the server.

use async_trait::async_trait;

use super::{required_str, CreateMode, Reconcile};
use crate::api::database::Database;
use crate::client::Result;
use crate::data::ResourceData;
use crate::mapper::map_value;
use crate::names::{self, DATABASE_PREFIX, ENVIRONMENT_PREFIX, INSTANCE_PREFIX, PROJECT_PREFIX};
use crate::schema::{Attribute, AttributeFlags, Schema, Validator};

/// Pattern of database names.
pub const DATABASE_NAME_PATTERN: &str = "^instances/[^/]+/databases/[^/]+$";

/// Reconciles databases.
#[derive(Debug, Default, Clone, Copy)]
pub struct DatabaseResource;

#[async_trait]
impl Reconcile for DatabaseResource {
    type Message = Database;

    const TYPE: &'static str = "database";
    const CREATE_MODE: CreateMode = CreateMode::Adopt;
    const DELETABLE: bool = false;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("An existing database discovered by instance sync.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .immutable()
                    .with_validator(Validator::name_pattern(&[DATABASE_NAME_PATTERN]))
                    .with_description("The database name, `instances/{instance}/databases/{database}`."),
            )
            .with_attribute(
                "project",
                Attribute::optional_computed_string()
                    .with_validator(Validator::Prefix(format!("{}/", PROJECT_PREFIX)))
                    .with_update_path("project"),
            )
            .with_attribute(
                "environment",
                Attribute::optional_computed_string()
                    .with_validator(Validator::Prefix(format!("{}/", ENVIRONMENT_PREFIX)))
                    .with_update_path("environment"),
            )
            .with_attribute(
                "labels",
                Attribute::string_map(AttributeFlags::optional()).with_update_path("labels"),
            )
            .with_attribute("effective_environment", Attribute::computed_string())
            .with_attribute("schema_version", Attribute::computed_string())
            .with_attribute("sync_state", Attribute::computed_string())
            .with_attribute("successful_sync_time", Attribute::computed_string())
            .importable()
    }

    fn lookup_keys(&self) -> &'static [&'static str] {
        &["name"]
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        let name = required_str(data, "name")?;
        names::parse(name, &[INSTANCE_PREFIX, DATABASE_PREFIX])?;
        Ok(Some(name.to_string()))
    }

    fn resource_id(&self, _data: &ResourceData) -> Option<String> {
        None
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<Database> {
        Ok(Database {
            name: name.to_string(),
            project: data.get_string("project"),
            environment: data.get_string("environment"),
            labels: data.get_str_map("labels").into_iter().collect(),
            ..Default::default()
        })
    }

    fn flatten(&self, database: &Database, data: &mut ResourceData) -> Result<()> {
        names::parse(&database.name, &[INSTANCE_PREFIX, DATABASE_PREFIX])?;
        data.set("name", database.name.as_str());
        data.set("project", database.project.as_str());
        data.set("environment", database.environment.as_str());
        data.set("labels", map_value(&database.labels));
        data.set("effective_environment", database.effective_environment.as_str());
        data.set("schema_version", database.schema_version.as_str());
        data.set("sync_state", database.sync_state.as_str());
        data.set("successful_sync_time", database.successful_sync_time.as_str());
        Ok(())
    }
}
