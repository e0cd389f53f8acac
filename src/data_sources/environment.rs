//! `bytebase_environment` and `bytebase_environments`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{assign, computed_block, project, refresh_id, DataSource};
use crate::client::Result;
use crate::context::Context;
use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::names::{self, ENVIRONMENT_PREFIX};
use crate::resources::environment::{flatten, list_environments, EnvironmentResource};
use crate::resources::resource_id_attribute;
use crate::schema::{NestedBlock, Schema};
use crate::types::type_name;

const PLURAL: &str = "environments";

/// One environment by id.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvironmentDataSource;

/// Every environment in promotion order.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvironmentsDataSource;

#[async_trait]
impl DataSource for EnvironmentDataSource {
    fn type_name(&self) -> String {
        type_name("environment")
    }

    fn schema(&self) -> Schema {
        let block = computed_block(&EnvironmentResource::environment_schema().block)
            .with_attribute("resource_id", resource_id_attribute("environment"));
        Schema {
            version: 0,
            block,
            importable: false,
        }
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = data.get_string("resource_id");
        names::validate_resource_id(&id)?;
        let name = names::format_one(ENVIRONMENT_PREFIX, &id);
        let environments = list_environments(ctx).await?;
        let order = environments
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| ProviderError::NotFound(format!("{} does not exist", name)))?;
        let mut scratch = ResourceData::new(
            Arc::new(EnvironmentResource::environment_schema()),
            None,
            Value::Object(Default::default()),
        );
        flatten(&environments[order], order, &mut scratch);
        assign(data, &scratch.attributes());
        data.set_id(name);
        Ok(())
    }
}

#[async_trait]
impl DataSource for EnvironmentsDataSource {
    fn type_name(&self) -> String {
        type_name(PLURAL)
    }

    fn schema(&self) -> Schema {
        let element = computed_block(&EnvironmentResource::environment_schema().block);
        Schema::v0()
            .with_description("Every environment, in promotion order.")
            .with_block(PLURAL, NestedBlock::list(element))
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let schema = Arc::new(EnvironmentResource::environment_schema());
        let element = computed_block(&schema.block);
        let items: Vec<Value> = list_environments(ctx)
            .await?
            .iter()
            .enumerate()
            .map(|(order, environment)| {
                let mut scratch = ResourceData::new(
                    Arc::clone(&schema),
                    None,
                    Value::Object(Default::default()),
                );
                flatten(environment, order, &mut scratch);
                project(&element, &scratch.attributes())
            })
            .collect();
        data.set(PLURAL, items);
        data.set_id(refresh_id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBytebase;
    use serde_json::json;

    fn fake() -> FakeBytebase {
        let fake = FakeBytebase::new();
        fake.insert(
            "settings",
            json!({
                "name": "settings/ENVIRONMENT",
                "value": {"environmentSetting": {"environments": [
                    {"name": "environments/test", "id": "test", "title": "Test"},
                    {"name": "environments/prod", "id": "prod", "title": "Prod", "tags": {"protected": "protected"}}
                ]}}
            }),
        );
        fake
    }

    #[tokio::test]
    async fn test_environment_by_id() {
        let fake = fake();
        let ctx = Context::new(fake.client());
        let source = EnvironmentDataSource;
        let mut data = ResourceData::new(Arc::new(source.schema()), None, json!({"resource_id": "prod"}));
        source.read(&ctx, &mut data).await.unwrap();
        let state = data.state().unwrap();
        assert_eq!(state["id"], "environments/prod");
        assert_eq!(state["order"], 1);
        assert_eq!(state["title"], "Prod");
        assert_eq!(state["protected"], true);
        assert_eq!(state["color"], "");

        let mut missing = ResourceData::new(Arc::new(source.schema()), None, json!({"resource_id": "dev"}));
        assert!(source.read(&ctx, &mut missing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_environments_in_order() {
        let fake = fake();
        let ctx = Context::new(fake.client());
        let source = EnvironmentsDataSource;
        let mut data = ResourceData::new(Arc::new(source.schema()), None, json!({}));
        source.read(&ctx, &mut data).await.unwrap();
        let state = data.state().unwrap();
        let ids: Vec<&str> = state[PLURAL]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["resource_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["test", "prod"]);
    }
}
