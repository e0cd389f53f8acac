//! `bytebase_database_catalog`.
//!
//! Every database has exactly one catalog, so the resource adopts it.
//! Updates replace the whole catalog in one call and destroy resets it to
//! empty.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::database::DATABASE_NAME_PATTERN;
use super::{required_str, CreateMode, Reconcile};
use crate::api::catalog::{ColumnCatalog, ColumnCatalogs, DatabaseCatalog, SchemaCatalog, TableCatalog};
use crate::client::Result;
use crate::context::Context;
use crate::data::ResourceData;
use crate::mapper::{blocks_of, map_value, str_map_of, str_of};
use crate::names;
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};

/// Reconciles database catalogs.
#[derive(Debug, Default, Clone, Copy)]
pub struct CatalogResource;

fn column_block() -> Block {
    Block::new()
        .with_attribute("name", Attribute::required_string())
        .with_attribute("semantic_type", Attribute::optional_string())
        .with_attribute("classification", Attribute::optional_string())
        .with_attribute("labels", Attribute::string_map(AttributeFlags::optional()))
}

fn table_block() -> Block {
    Block::new()
        .with_attribute("name", Attribute::required_string())
        .with_attribute("classification", Attribute::optional_string())
        .with_block("columns", NestedBlock::list(column_block()))
}

fn schema_block() -> Block {
    Block::new()
        .with_attribute(
            "name",
            Attribute::optional_string().with_description("Schema name; empty for engines without schemas."),
        )
        .with_block("tables", NestedBlock::list(table_block()).with_min_items(1))
}

fn expand_schema(element: &Value) -> SchemaCatalog {
    SchemaCatalog {
        name: str_of(element, "name"),
        tables: blocks_of(element, "tables")
            .into_iter()
            .map(|table| TableCatalog {
                name: str_of(table, "name"),
                classification: str_of(table, "classification"),
                columns: ColumnCatalogs {
                    columns: blocks_of(table, "columns")
                        .into_iter()
                        .map(|column| ColumnCatalog {
                            name: str_of(column, "name"),
                            semantic_type: str_of(column, "semantic_type"),
                            classification: str_of(column, "classification"),
                            labels: str_map_of(column, "labels"),
                        })
                        .collect(),
                },
            })
            .collect(),
    }
}

fn flatten_schema(schema: &SchemaCatalog) -> Value {
    let tables: Vec<Value> = schema
        .tables
        .iter()
        .map(|table| {
            let columns: Vec<Value> = table
                .columns
                .columns
                .iter()
                .map(|column| {
                    json!({
                        "name": column.name,
                        "semantic_type": column.semantic_type,
                        "classification": column.classification,
                        "labels": map_value(&column.labels),
                    })
                })
                .collect();
            json!({
                "name": table.name,
                "classification": table.classification,
                "columns": columns,
            })
        })
        .collect();
    json!({"name": schema.name, "tables": tables})
}

#[async_trait]
impl Reconcile for CatalogResource {
    type Message = DatabaseCatalog;

    const TYPE: &'static str = "database_catalog";
    const CREATE_MODE: CreateMode = CreateMode::Adopt;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Classification and semantic types of the columns of a database.")
            .with_attribute(
                "database",
                Attribute::required_string()
                    .immutable()
                    .with_validator(Validator::name_pattern(&[DATABASE_NAME_PATTERN])),
            )
            .with_block(
                "schemas",
                NestedBlock::list(schema_block()).with_update_path("schemas"),
            )
            .importable()
    }

    fn lookup_keys(&self) -> &'static [&'static str] {
        &["database"]
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        let database = required_str(data, "database")?;
        Ok(Some(names::catalog_name(database)))
    }

    fn resource_id(&self, _data: &ResourceData) -> Option<String> {
        None
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<DatabaseCatalog> {
        names::database_of_catalog(name)?;
        Ok(DatabaseCatalog {
            name: name.to_string(),
            schemas: data.get_blocks("schemas").into_iter().map(expand_schema).collect(),
        })
    }

    fn flatten(&self, catalog: &DatabaseCatalog, data: &mut ResourceData) -> Result<()> {
        let database = names::database_of_catalog(&catalog.name)?;
        data.set("database", database);
        let schemas: Vec<Value> = catalog.schemas.iter().map(flatten_schema).collect();
        data.set("schemas", schemas);
        Ok(())
    }

    async fn remove(&self, ctx: &Context, name: &str) -> Result<()> {
        let empty = DatabaseCatalog {
            name: name.to_string(),
            schemas: Vec::new(),
        };
        ctx.client()
            .update(&empty, &["schemas".to_string()])
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{handler, Resource};
    use crate::testing::FakeBytebase;
    use std::sync::Arc;

    fn declared() -> Value {
        json!({
            "database": "instances/i/databases/hr",
            "schemas": [{
                "name": "public",
                "tables": [{
                    "name": "salary",
                    "classification": "1-1",
                    "columns": [{"name": "amount", "semantic_type": "bb.default", "labels": {"pii": "yes"}}]
                }]
            }]
        })
    }

    #[test]
    fn test_expand_and_flatten() {
        let data = ResourceData::new(Arc::new(CatalogResource.schema()), None, declared());
        let name = CatalogResource.canonical_name(&data).unwrap().unwrap();
        assert_eq!(name, "instances/i/databases/hr/catalog");
        let catalog = CatalogResource.expand(&data, &name).unwrap();
        let column = &catalog.schemas[0].tables[0].columns.columns[0];
        assert_eq!(column.semantic_type, "bb.default");

        let mut out = data.scratch();
        CatalogResource.flatten(&catalog, &mut out).unwrap();
        let state = out.attributes();
        assert_eq!(state["database"], "instances/i/databases/hr");
        assert_eq!(state["schemas"][0]["tables"][0]["columns"][0]["labels"], json!({"pii": "yes"}));
    }

    #[tokio::test]
    async fn test_catalog_must_exist() {
        let fake = FakeBytebase::new();
        let ctx = Context::new(fake.client());
        let resource = handler(CatalogResource);
        let mut data = ResourceData::new(Arc::new(resource.schema()), None, declared());
        let err = resource.create(&ctx, &mut data).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.message().contains("instances/i/databases/hr/catalog"));
    }
}
