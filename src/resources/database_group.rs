//! `bytebase_database_group`.

use async_trait::async_trait;

use super::{name_attribute, parent_attribute, required_str, resource_id_attribute, Reconcile};
use crate::api::database_group::DatabaseGroup;
use crate::api::Expr;
use crate::client::Result;
use crate::data::ResourceData;
use crate::names::{self, DATABASE_GROUP_PREFIX, PROJECT_PREFIX};
use crate::schema::{Attribute, AttributeFlags, DiffSuppress, Schema, Validator};

/// Reconciles database groups of a project.
#[derive(Debug, Default, Clone, Copy)]
pub struct DatabaseGroupResource;

#[async_trait]
impl Reconcile for DatabaseGroupResource {
    type Message = DatabaseGroup;

    const TYPE: &'static str = "database_group";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A group of databases in a project selected by a condition.")
            .with_attribute(
                "project",
                parent_attribute(PROJECT_PREFIX, "The project, `projects/{id}`."),
            )
            .with_attribute("resource_id", resource_id_attribute("database group"))
            .with_attribute("name", name_attribute())
            .with_attribute(
                "title",
                Attribute::required_string()
                    .with_validator(Validator::NonEmpty)
                    .with_update_path("title"),
            )
            .with_attribute(
                "condition",
                Attribute::required_string()
                    .with_validator(Validator::NonEmpty)
                    .with_diff_suppress(DiffSuppress::ConditionExpression)
                    .with_update_path("database_expr")
                    .with_description(
                        "CEL expression over database attributes, e.g. `resource.environment_name == \"prod\"`.",
                    ),
            )
            .with_attribute(
                "matched_databases",
                Attribute::string_list(AttributeFlags::computed()),
            )
            .importable()
    }

    fn lookup_keys(&self) -> &'static [&'static str] {
        &["project", "resource_id"]
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        let project = names::parse_one(required_str(data, "project")?, PROJECT_PREFIX)?;
        let id = required_str(data, "resource_id")?;
        names::validate_resource_id(id)?;
        Ok(Some(names::format(&[
            (PROJECT_PREFIX, project),
            (DATABASE_GROUP_PREFIX, id),
        ])))
    }

    fn parent(&self, data: &ResourceData) -> Result<String> {
        Ok(required_str(data, "project")?.to_string())
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<DatabaseGroup> {
        Ok(DatabaseGroup {
            name: name.to_string(),
            title: data.get_string("title"),
            database_expr: Some(Expr::new(data.get_string("condition"))),
            ..Default::default()
        })
    }

    fn flatten(&self, group: &DatabaseGroup, data: &mut ResourceData) -> Result<()> {
        let ids = names::parse(&group.name, &[PROJECT_PREFIX, DATABASE_GROUP_PREFIX])?;
        data.set("project", names::format_one(PROJECT_PREFIX, ids[0]));
        data.set("resource_id", ids[1]);
        data.set("name", group.name.as_str());
        data.set("title", group.title.as_str());
        let condition = group
            .database_expr
            .as_ref()
            .map(|e| e.expression.as_str())
            .unwrap_or_default();
        data.set("condition", condition);
        let matched: Vec<String> = group
            .matched_databases
            .iter()
            .map(|db| db.name.clone())
            .collect();
        data.set("matched_databases", matched);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::database_group::MatchedDatabase;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_condition_maps_to_database_expr() {
        let schema = Arc::new(DatabaseGroupResource.schema());
        let data = ResourceData::new(
            Arc::clone(&schema),
            None,
            json!({
                "project": "projects/p",
                "resource_id": "prod-dbs",
                "title": "Prod",
                "condition": "resource.environment_name == \"prod\""
            }),
        );
        let name = DatabaseGroupResource.canonical_name(&data).unwrap().unwrap();
        assert_eq!(name, "projects/p/databaseGroups/prod-dbs");
        let group = DatabaseGroupResource.expand(&data, &name).unwrap();
        assert_eq!(
            group.database_expr.as_ref().map(|e| e.expression.as_str()),
            Some("resource.environment_name == \"prod\"")
        );

        let mut out = data.scratch();
        let served = DatabaseGroup {
            matched_databases: vec![MatchedDatabase {
                name: "instances/i/databases/d".to_string(),
            }],
            ..group
        };
        DatabaseGroupResource.flatten(&served, &mut out).unwrap();
        assert_eq!(out.attributes()["matched_databases"], json!(["instances/i/databases/d"]));
        assert_eq!(out.attributes()["project"], "projects/p");
    }

    #[test]
    fn test_condition_whitespace_is_not_a_change() {
        let data = ResourceData::new(
            Arc::new(DatabaseGroupResource.schema()),
            Some(json!({"condition": "resource.environment_name == \"prod\" && resource.labels.tier == \"1\""})),
            json!({"condition": "resource.environment_name == \"prod\"   &&  resource.labels.tier == \"1\""}),
        );
        assert!(!data.has_change("condition"));
    }
}
