//! `bytebase_environment`.
//!
//! Environments are entries of the `ENVIRONMENT` setting rather than a
//! collection of their own. Every write reads the setting, edits the one
//! entry and writes the whole list back. `order` is the entry's position.

use async_trait::async_trait;

use super::setting::{environment, flatten_environment};
use super::{name_attribute, required_str, resource_id_attribute, Resource};
use crate::api::setting::{Environment, EnvironmentSetting, Setting, SettingName, SettingPayload};
use crate::client::Result;
use crate::context::Context;
use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::mapper::mask;
use crate::names::{self, ENVIRONMENT_PREFIX};
use crate::schema::{Attribute, Schema, Validator};
use crate::types::type_name;

const TYPE: &str = "environment";

/// Field-mask path of the environment list.
pub const ENVIRONMENTS_PATH: &str = "value.environment_setting";

/// Manages one entry of the environment setting.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvironmentResource;

/// Every environment in promotion order.
pub async fn list_environments(ctx: &Context) -> Result<Vec<Environment>> {
    let name = SettingName::Environment.resource_name();
    match ctx.client().get::<Setting>(&name).await {
        Ok(setting) => Ok(setting.environments().to_vec()),
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        Err(err) => Err(err.for_resource(&name)),
    }
}

async fn store(ctx: &Context, environments: Vec<Environment>) -> Result<()> {
    let setting = Setting::new(
        SettingName::Environment,
        SettingPayload::EnvironmentSetting(EnvironmentSetting { environments }),
    );
    ctx.client()
        .update_with(&setting, &[ENVIRONMENTS_PATH.to_string()], true)
        .await
        .map_err(|e| e.for_resource(&setting.name))?;
    Ok(())
}

/// Move `entry` to `order`, or keep `current` when no order is declared.
fn place(environments: &mut Vec<Environment>, entry: Environment, current: Option<usize>, order: Option<i64>) {
    let position = match (order, current) {
        (Some(order), _) => usize::try_from(order).unwrap_or_default(),
        (None, Some(current)) => current,
        (None, None) => environments.len(),
    };
    if let Some(current) = current {
        environments.remove(current);
    }
    let position = position.min(environments.len());
    environments.insert(position, entry);
}

/// Write one environment and its position into the output state.
pub fn flatten(environment: &Environment, order: usize, data: &mut ResourceData) {
    let tree = flatten_environment(environment);
    data.set("resource_id", environment.id.as_str());
    data.set("name", environment.name.as_str());
    data.set("title", tree["title"].clone());
    data.set("color", tree["color"].clone());
    data.set("protected", tree["protected"].clone());
    data.set("order", order as i64);
}

impl EnvironmentResource {
    /// Schema shared with the environment data sources.
    pub fn environment_schema() -> Schema {
        Schema::v0()
            .with_description("An environment, stored in the workspace environment setting.")
            .with_attribute("resource_id", resource_id_attribute("environment"))
            .with_attribute("name", name_attribute())
            .with_attribute(
                "title",
                Attribute::required_string().with_validator(Validator::NonEmpty),
            )
            .with_attribute(
                "order",
                Attribute::optional_computed_int64()
                    .with_validator(Validator::IntRange(0, i64::from(i32::MAX)))
                    .with_description("Position in the promotion order, starting at 0."),
            )
            .with_attribute("color", Attribute::optional_string())
            .with_attribute("protected", Attribute::optional_bool())
            .importable()
    }

    async fn write(&self, ctx: &Context, data: &mut ResourceData, id: &str) -> Result<()> {
        let mut environments = list_environments(ctx).await?;
        let current = environments.iter().position(|e| e.id == id);
        if current.is_some() && data.is_new() {
            ctx.warn(
                "Resource already exists",
                format!(
                    "{} already exists and will be updated in place to match the configuration",
                    names::format_one(ENVIRONMENT_PREFIX, id)
                ),
            );
        }
        let entry = environment(id, data.desired());
        let order = data.get_i64("order");
        let moved = order.is_some() && data.has_change("order");
        let unchanged = current.is_some_and(|i| environments[i] == entry) && !moved;
        if unchanged {
            tracing::debug!(resource = TYPE, id, "environment unchanged");
        } else {
            place(&mut environments, entry, current, order.filter(|_| moved || current.is_none()));
            store(ctx, environments).await?;
        }
        data.set_id(names::format_one(ENVIRONMENT_PREFIX, id));
        Ok(())
    }
}

fn id_of(data: &ResourceData) -> Result<Option<String>> {
    match data.id() {
        Some(name) => Ok(Some(names::parse_one(name, ENVIRONMENT_PREFIX)?.to_string())),
        None => Ok(None),
    }
}

#[async_trait]
impl Resource for EnvironmentResource {
    fn type_name(&self) -> String {
        type_name(TYPE)
    }

    fn schema(&self) -> Schema {
        Self::environment_schema()
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = required_str(data, "resource_id")?.to_string();
        names::validate_resource_id(&id)?;
        let environment_name = names::format_one(ENVIRONMENT_PREFIX, &id);
        self.write(ctx, data, &id)
            .await
            .map_err(|e| e.for_resource(&environment_name))?;
        tracing::info!(resource = TYPE, name = %environment_name, "created");
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let Some(id) = id_of(data)? else {
            return Ok(());
        };
        let environments = list_environments(ctx).await?;
        match environments.iter().position(|e| e.id == id) {
            Some(order) => flatten(&environments[order], order, data),
            None => {
                tracing::warn!(resource = TYPE, %id, "not found, removing from state");
                data.clear_id();
            },
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let id = id_of(data)?
            .ok_or_else(|| ProviderError::invalid(format!("{} has no id", type_name(TYPE))))?;
        let environment_name = names::format_one(ENVIRONMENT_PREFIX, &id);
        mask::check_immutable(data).map_err(|e| e.for_resource(&environment_name))?;
        self.write(ctx, data, &id)
            .await
            .map_err(|e| e.for_resource(&environment_name))?;
        tracing::info!(resource = TYPE, name = %environment_name, "updated");
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let Some(id) = id_of(data)? else {
            return Ok(());
        };
        let mut environments = list_environments(ctx).await?;
        let before = environments.len();
        environments.retain(|e| e.id != id);
        if environments.len() == before {
            tracing::debug!(resource = TYPE, %id, "already gone");
        } else {
            store(ctx, environments).await?;
            tracing::info!(resource = TYPE, %id, "deleted");
        }
        data.clear_id();
        Ok(())
    }
}
