//! `bytebase_project`.
//!
//! `visibility` and `schema_version` are fixed at creation. The optional
//! `databases` set is reconciled by moving databases into the project and
//! back to the default project.

use async_trait::async_trait;

use super::{name_attribute, resource_id_attribute, top_level_name, Reconcile};
use crate::api::database::{Database, ALL_DATABASES_PARENT};
use crate::api::project::{Project, DEFAULT_PROJECT};
use crate::client::{ListOptions, Result};
use crate::context::Context;
use crate::data::ResourceData;
use crate::filter::Filter;
use crate::mapper::map_value;
use crate::names::{self, PROJECT_PREFIX};
use crate::schema::{Attribute, AttributeFlags, Schema, Validator};

const FLAGS: [&str; 7] = [
    "allow_modify_statement",
    "auto_resolve_issue",
    "enforce_issue_title",
    "auto_enable_backup",
    "skip_backup_errors",
    "postgres_database_tenant_mode",
    "allow_self_approval",
];

/// Reconciles projects.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectResource;

impl ProjectResource {
    async fn move_database(&self, ctx: &Context, database: &str, project: &str) -> Result<()> {
        let message = Database {
            name: database.to_string(),
            project: project.to_string(),
            ..Default::default()
        };
        ctx.client()
            .update(&message, &["project".to_string()])
            .await
            .map_err(|e| e.for_resource(database))?;
        tracing::info!(database, project, "moved database");
        Ok(())
    }
}

#[async_trait]
impl Reconcile for ProjectResource {
    type Message = Project;

    const TYPE: &'static str = "project";

    fn schema(&self) -> Schema {
        let mut schema = Schema::v0()
            .with_description("A Bytebase project.")
            .with_attribute("resource_id", resource_id_attribute("project"))
            .with_attribute("name", name_attribute())
            .with_attribute(
                "title",
                Attribute::required_string()
                    .with_validator(Validator::NonEmpty)
                    .with_update_path("title"),
            )
            .with_attribute(
                "key",
                Attribute::optional_computed_string().with_update_path("key"),
            )
            .with_attribute(
                "workflow",
                Attribute::optional_computed_string()
                    .with_validator(Validator::one_of(&["UI", "VCS"]))
                    .with_update_path("workflow"),
            )
            .with_attribute(
                "visibility",
                Attribute::optional_computed_string()
                    .immutable()
                    .with_validator(Validator::one_of(&["VISIBILITY_PUBLIC", "VISIBILITY_PRIVATE"])),
            )
            .with_attribute(
                "tenant_mode",
                Attribute::optional_computed_string()
                    .with_validator(Validator::one_of(&["TENANT_MODE_DISABLED", "TENANT_MODE_ENABLED"]))
                    .with_update_path("tenant_mode"),
            )
            .with_attribute(
                "schema_version",
                Attribute::optional_computed_string().immutable().with_validator(Validator::one_of(&[
                    "SCHEMA_VERSION_TIMESTAMP",
                    "SCHEMA_VERSION_SEMANTIC",
                ])),
            )
            .with_attribute(
                "schema_change",
                Attribute::optional_computed_string()
                    .with_validator(Validator::one_of(&["DDL", "SDL"]))
                    .with_update_path("schema_change"),
            )
            .with_attribute(
                "data_classification_config_id",
                Attribute::optional_computed_string()
                    .with_update_path("data_classification_config_id"),
            )
            .with_attribute(
                "labels",
                Attribute::string_map(AttributeFlags::optional()).with_update_path("labels"),
            )
            .with_attribute(
                "databases",
                Attribute::string_set(AttributeFlags::optional_computed())
                    .with_validator(Validator::name_pattern(&["^instances/[^/]+/databases/[^/]+$"]))
                    .with_description("Full names of the databases assigned to the project."),
            )
            .importable();
        for flag in FLAGS {
            schema = schema.with_attribute(
                flag,
                Attribute::optional_computed_bool().with_update_path(flag),
            );
        }
        schema
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        top_level_name(data, PROJECT_PREFIX)
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<Project> {
        Ok(Project {
            name: name.to_string(),
            title: data.get_string("title"),
            key: data.get_string("key"),
            workflow: data.get_string("workflow"),
            visibility: data.get_string("visibility"),
            tenant_mode: data.get_string("tenant_mode"),
            schema_version: data.get_string("schema_version"),
            schema_change: data.get_string("schema_change"),
            data_classification_config_id: data.get_string("data_classification_config_id"),
            allow_modify_statement: data.get_bool("allow_modify_statement"),
            auto_resolve_issue: data.get_bool("auto_resolve_issue"),
            enforce_issue_title: data.get_bool("enforce_issue_title"),
            auto_enable_backup: data.get_bool("auto_enable_backup"),
            skip_backup_errors: data.get_bool("skip_backup_errors"),
            postgres_database_tenant_mode: data.get_bool("postgres_database_tenant_mode"),
            allow_self_approval: data.get_bool("allow_self_approval"),
            labels: data.get_str_map("labels").into_iter().collect(),
            ..Default::default()
        })
    }

    fn flatten(&self, project: &Project, data: &mut ResourceData) -> Result<()> {
        let id = names::parse_one(&project.name, PROJECT_PREFIX)?;
        data.set("resource_id", id);
        data.set("name", project.name.as_str());
        data.set("title", project.title.as_str());
        data.set("key", project.key.as_str());
        data.set("workflow", project.workflow.as_str());
        data.set("visibility", project.visibility.as_str());
        data.set("tenant_mode", project.tenant_mode.as_str());
        data.set("schema_version", project.schema_version.as_str());
        data.set("schema_change", project.schema_change.as_str());
        data.set(
            "data_classification_config_id",
            project.data_classification_config_id.as_str(),
        );
        data.set("allow_modify_statement", project.allow_modify_statement);
        data.set("auto_resolve_issue", project.auto_resolve_issue);
        data.set("enforce_issue_title", project.enforce_issue_title);
        data.set("auto_enable_backup", project.auto_enable_backup);
        data.set("skip_backup_errors", project.skip_backup_errors);
        data.set("postgres_database_tenant_mode", project.postgres_database_tenant_mode);
        data.set("allow_self_approval", project.allow_self_approval);
        data.set("labels", map_value(&project.labels));
        Ok(())
    }

    async fn after_read(&self, ctx: &Context, data: &mut ResourceData, name: &str) -> Result<()> {
        if data.get("databases").is_none() && data.get_prior("databases").is_none() {
            return Ok(());
        }
        let filter = Filter {
            project: Some(name.to_string()),
            ..Default::default()
        };
        let databases: Vec<Database> = ctx
            .client()
            .list(ALL_DATABASES_PARENT, &ListOptions::filtered(filter.compile()))
            .await?;
        let mut names: Vec<String> = databases
            .into_iter()
            .filter(|db| db.project == name)
            .map(|db| db.name)
            .collect();
        names.sort();
        data.set("databases", names);
        Ok(())
    }

    async fn after_apply(&self, ctx: &Context, data: &ResourceData, name: &str) -> Result<()> {
        if data.get("databases").is_none() || !data.has_change("databases") {
            return Ok(());
        }
        let desired = data.get_str_list("databases");
        let prior = data.get_prior_str_list("databases");
        for database in desired.iter().filter(|d| !prior.contains(d)) {
            self.move_database(ctx, database, name).await?;
        }
        for database in prior.iter().filter(|d| !desired.contains(d)) {
            self.move_database(ctx, database, DEFAULT_PROJECT).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBytebase;
    use serde_json::json;
    use std::sync::Arc;

    fn data(prior: Option<serde_json::Value>, desired: serde_json::Value) -> ResourceData {
        ResourceData::new(Arc::new(ProjectResource.schema()), prior, desired)
    }

    #[test]
    fn test_expand_and_flatten() {
        let input = data(
            None,
            json!({
                "resource_id": "acme",
                "title": "Acme",
                "workflow": "UI",
                "labels": {"team": "db"},
                "allow_self_approval": true
            }),
        );
        let name = ProjectResource.canonical_name(&input).unwrap().unwrap();
        assert_eq!(name, "projects/acme");
        let project = ProjectResource.expand(&input, &name).unwrap();
        assert_eq!(project.title, "Acme");
        assert!(project.allow_self_approval);
        assert_eq!(project.labels.get("team").map(String::as_str), Some("db"));

        let mut output = data(None, json!({}));
        ProjectResource.flatten(&project, &mut output).unwrap();
        let state = output.attributes();
        assert_eq!(state["resource_id"], "acme");
        assert_eq!(state["workflow"], "UI");
        assert_eq!(state["labels"], json!({"team": "db"}));
    }

    #[test]
    fn test_invalid_resource_id() {
        let input = data(None, json!({"resource_id": "Acme!", "title": "Acme"}));
        assert!(ProjectResource.canonical_name(&input).is_err());
    }

    #[tokio::test]
    async fn test_databases_are_moved() {
        let fake = FakeBytebase::new();
        fake.insert(
            "databases",
            json!({"name": "instances/i/databases/a", "project": "projects/acme"}),
        );
        fake.insert(
            "databases",
            json!({"name": "instances/i/databases/b", "project": "projects/default"}),
        );
        let ctx = Context::new(fake.client());
        let input = data(
            Some(json!({"resource_id": "acme", "databases": ["instances/i/databases/a"]})),
            json!({"resource_id": "acme", "databases": ["instances/i/databases/b"]}),
        );
        ProjectResource
            .after_apply(&ctx, &input, "projects/acme")
            .await
            .unwrap();

        let a = fake.object("databases", "instances/i/databases/a").unwrap();
        let b = fake.object("databases", "instances/i/databases/b").unwrap();
        assert_eq!(a["project"], "projects/default");
        assert_eq!(b["project"], "projects/acme");
    }
}
