//! `bytebase_instance`.
//!
//! Data sources form a set keyed by their connection identity. The server
//! never returns secrets, so passwords and TLS material are carried over
//! from the configuration by data source id.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{name_attribute, resource_id_attribute, top_level_name, Reconcile};
use crate::api::instance::{DataSource, Instance};
use crate::client::Result;
use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::mapper::{bool_of, duration_seconds, duration_string, str_of};
use crate::names::{self, ENVIRONMENT_PREFIX, INSTANCE_PREFIX};
use crate::schema::{Attribute, Block, DiffSuppress, NestedBlock, Schema, SetIdentity, Validator};

/// Data source type every instance needs exactly one of.
pub const ADMIN: &str = "ADMIN";

const SECRETS: [&str; 4] = ["password", "ssl_ca", "ssl_cert", "ssl_key"];

/// Reconciles instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstanceResource;

fn data_source_block() -> Block {
    let mut block = Block::new()
        .with_attribute("id", Attribute::required_string().with_validator(Validator::NonEmpty))
        .with_attribute(
            "type",
            Attribute::required_string().with_validator(Validator::one_of(&[ADMIN, "READ_ONLY"])),
        )
        .with_attribute("username", Attribute::optional_string())
        .with_attribute("host", Attribute::optional_string())
        .with_attribute("port", Attribute::optional_string())
        .with_attribute("database", Attribute::optional_string())
        .with_attribute("use_ssl", Attribute::optional_bool());
    for secret in SECRETS {
        block = block.with_attribute(secret, Attribute::optional_string().sensitive());
    }
    block
}

impl InstanceResource {
    fn expand_data_sources(&self, data: &ResourceData) -> Result<Vec<DataSource>> {
        let sources: Vec<DataSource> = data
            .get_blocks("data_sources")
            .into_iter()
            .map(|element| DataSource {
                id: str_of(element, "id"),
                kind: str_of(element, "type"),
                username: str_of(element, "username"),
                password: str_of(element, "password"),
                host: str_of(element, "host"),
                port: str_of(element, "port"),
                database: str_of(element, "database"),
                use_ssl: bool_of(element, "use_ssl"),
                ssl_ca: str_of(element, "ssl_ca"),
                ssl_cert: str_of(element, "ssl_cert"),
                ssl_key: str_of(element, "ssl_key"),
            })
            .collect();
        let admins = sources.iter().filter(|ds| ds.kind == ADMIN).count();
        if admins != 1 {
            return Err(ProviderError::invalid(format!(
                "an instance needs exactly one {} data source, got {}",
                ADMIN, admins
            )));
        }
        Ok(sources)
    }

    /// Configured secret of the data source `id`, from the desired tree or
    /// else from prior state.
    fn secret(&self, data: &ResourceData, id: &str, key: &str) -> String {
        let find = |elements: Vec<&Value>| {
            elements
                .into_iter()
                .find(|element| str_of(element, "id") == id)
                .map(|element| str_of(element, key))
                .filter(|s| !s.is_empty())
        };
        find(data.get_blocks("data_sources"))
            .or_else(|| find(data.get_prior_blocks("data_sources")))
            .unwrap_or_default()
    }
}

#[async_trait]
impl Reconcile for InstanceResource {
    type Message = Instance;

    const TYPE: &'static str = "instance";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A database instance registered with Bytebase.")
            .with_attribute("resource_id", resource_id_attribute("instance"))
            .with_attribute("name", name_attribute())
            .with_attribute(
                "title",
                Attribute::required_string()
                    .with_validator(Validator::NonEmpty)
                    .with_update_path("title"),
            )
            .with_attribute(
                "engine",
                Attribute::required_string()
                    .immutable()
                    .with_validator(Validator::NonEmpty)
                    .with_diff_suppress(DiffSuppress::CaseInsensitive)
                    .with_description("The engine, e.g. `POSTGRES` or `MYSQL`."),
            )
            .with_attribute("engine_version", Attribute::computed_string())
            .with_attribute(
                "external_link",
                Attribute::optional_string().with_update_path("external_link"),
            )
            .with_attribute(
                "environment",
                Attribute::optional_computed_string()
                    .with_validator(Validator::Prefix(format!("{}/", ENVIRONMENT_PREFIX)))
                    .with_update_path("environment"),
            )
            .with_attribute(
                "activation",
                Attribute::optional_computed_bool().with_update_path("activation"),
            )
            .with_attribute(
                "sync_interval",
                Attribute::optional_computed_int64()
                    .with_validator(Validator::IntRange(0, i64::from(i32::MAX)))
                    .with_update_path("sync_interval")
                    .with_description("Seconds between schema syncs; 0 disables periodic sync."),
            )
            .with_attribute(
                "maximum_connections",
                Attribute::optional_computed_int64()
                    .with_validator(Validator::IntRange(0, i64::from(i32::MAX)))
                    .with_update_path("maximum_connections"),
            )
            .with_block(
                "data_sources",
                NestedBlock::set(data_source_block())
                    .with_min_items(1)
                    .with_identity(SetIdentity::fields(&[
                        "id", "type", "username", "host", "port", "database",
                    ]))
                    .with_update_path("data_sources"),
            )
            .importable()
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        top_level_name(data, INSTANCE_PREFIX)
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<Instance> {
        let maximum_connections = data.get_i64("maximum_connections").unwrap_or_default();
        Ok(Instance {
            name: name.to_string(),
            title: data.get_string("title"),
            engine: data.get_string("engine").to_uppercase(),
            external_link: data.get_string("external_link"),
            environment: data.get_string("environment"),
            activation: data.get_bool("activation"),
            sync_interval: duration_string(data.get_i64("sync_interval").unwrap_or_default()),
            maximum_connections: i32::try_from(maximum_connections).map_err(|_| {
                ProviderError::invalid(format!(
                    "maximum_connections {} is out of range",
                    maximum_connections
                ))
            })?,
            data_sources: self.expand_data_sources(data)?,
            ..Default::default()
        })
    }

    fn flatten(&self, instance: &Instance, data: &mut ResourceData) -> Result<()> {
        data.set("resource_id", names::parse_one(&instance.name, INSTANCE_PREFIX)?);
        let sources: Vec<Value> = instance
            .data_sources
            .iter()
            .map(|ds| {
                let mut element = json!({
                    "id": ds.id,
                    "type": ds.kind,
                    "username": ds.username,
                    "host": ds.host,
                    "port": ds.port,
                    "database": ds.database,
                    "use_ssl": ds.use_ssl,
                });
                for key in SECRETS {
                    element[key] = Value::String(self.secret(data, &ds.id, key));
                }
                element
            })
            .collect();
        data.set("name", instance.name.as_str());
        data.set("title", instance.title.as_str());
        data.set("engine", instance.engine.as_str());
        data.set("engine_version", instance.engine_version.as_str());
        data.set("external_link", instance.external_link.as_str());
        data.set("environment", instance.environment.as_str());
        data.set("activation", instance.activation);
        data.set("sync_interval", duration_seconds(&instance.sync_interval));
        data.set("maximum_connections", i64::from(instance.maximum_connections));
        data.set("data_sources", sources);
        Ok(())
    }
}
