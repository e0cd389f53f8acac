//! Data-source handlers.
//!
//! Data sources come in two shapes:
//!
//! * [`Single`] resolves the canonical name from the lookup attributes of a
//!   [`Reconcile`] implementation, gets the object and flattens it through
//!   the resource's own mapping. The id is the canonical name.
//! * [`List`] compiles the declared filter, reads every page and flattens
//!   each message into one element of a computed list. The id is the
//!   current epoch seconds, so the host reads it again on every refresh.
//!
//! Both project the flattened tree onto the declared shape: undeclared
//! keys are dropped and every declared attribute gets a defined value.
//! Environments and IAM policies are not plain collections and have
//! hand-written data sources.

pub mod environment;
pub mod iam_policy;
pub mod listings;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::client::{ApiMessage, ListOptions, Result};
use crate::context::Context;
use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::filter::{Filter, Label, QueryFields, StateFilter};
use crate::mapper::zero_fill;
use crate::names::{ENVIRONMENT_PREFIX, INSTANCE_PREFIX, PROJECT_PREFIX};
use crate::resources::{
    catalog, database, database_group, group, instance, policy, project, review_config, risk,
    role, setting, user, vcs_connector, vcs_provider, Reconcile,
};
use crate::schema::{Attribute, AttributeFlags, Block, BlockNestingMode, NestedBlock, Schema, Validator};
use crate::types::type_name;

/// A read-only data source type.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Full type name, e.g. `bytebase_projects`.
    fn type_name(&self) -> String;

    /// Schema of the data source.
    fn schema(&self) -> Schema;

    /// Fill the computed attributes of `data` and set its id.
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;
}

// =============================================================================
// Projection
// =============================================================================

/// Read-only copy of an attribute.
fn computed(attr: &Attribute) -> Attribute {
    let mut view = Attribute::new(attr.attr_type.clone(), AttributeFlags::computed());
    view.description = attr.description.clone();
    view
}

/// Read-only copy of a block, without its sensitive attributes.
pub fn computed_block(block: &Block) -> Block {
    let mut view = Block::new();
    view.description = block.description.clone();
    for (name, attr) in &block.attributes {
        if attr.flags.sensitive {
            continue;
        }
        view.attributes.insert(name.clone(), computed(attr));
    }
    for (name, nested) in &block.blocks {
        let mut copy = match nested.nesting_mode {
            BlockNestingMode::Single => NestedBlock::single(computed_block(&nested.block)),
            BlockNestingMode::List => NestedBlock::list(computed_block(&nested.block)),
            BlockNestingMode::Set => NestedBlock::set(computed_block(&nested.block)),
        };
        copy.identity = nested.identity.clone();
        view.blocks.insert(name.clone(), copy);
    }
    view
}

/// Lookup attribute of a single-item data source. Optional resource
/// attributes stay optional; everything else must be given.
fn lookup_attribute(attr: &Attribute) -> Attribute {
    let flags = if attr.flags.optional && !attr.flags.computed {
        AttributeFlags::optional()
    } else {
        AttributeFlags::required()
    };
    let mut lookup = Attribute::new(attr.attr_type.clone(), flags);
    lookup.description = attr.description.clone();
    lookup.validators = attr.validators.clone();
    lookup
}

/// Keep the keys `block` declares, recursing into nested blocks, and give
/// every declared attribute a defined value.
pub fn project(block: &Block, value: &Value) -> Value {
    let mut out = Map::new();
    for name in block.attributes.keys() {
        if let Some(v) = value.get(name).filter(|v| !v.is_null()) {
            out.insert(name.clone(), v.clone());
        }
    }
    for (name, nested) in &block.blocks {
        let items: Vec<Value> = match value.get(name) {
            Some(Value::Array(items)) => items.iter().map(|item| project(&nested.block, item)).collect(),
            Some(item @ Value::Object(_)) => vec![project(&nested.block, item)],
            _ => Vec::new(),
        };
        out.insert(name.clone(), Value::Array(items));
    }
    zero_fill(block, &mut out);
    Value::Object(out)
}

/// Copy the projection of `tree` onto the declared root block of `data`.
pub fn assign(data: &mut ResourceData, tree: &Value) {
    let projected = project(&data.schema().block, tree);
    if let Value::Object(map) = projected {
        for (key, value) in map {
            data.set(&key, value);
        }
    }
}

/// Id of a list data source: the current epoch seconds.
pub fn refresh_id() -> String {
    chrono::Utc::now().timestamp().to_string()
}

// =============================================================================
// Single
// =============================================================================

/// Single-item data source over a reconciler.
#[derive(Debug, Default)]
pub struct Single<R> {
    inner: R,
}

impl<R: Reconcile> Single<R> {
    /// Wrap a reconciler.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: Reconcile> DataSource for Single<R> {
    fn type_name(&self) -> String {
        type_name(R::TYPE)
    }

    fn schema(&self) -> Schema {
        let resource = self.inner.schema();
        let mut block = computed_block(&resource.block);
        for key in self.inner.lookup_keys() {
            if let Some(attr) = resource.block.attributes.get(*key) {
                block.attributes.insert(key.to_string(), lookup_attribute(attr));
            }
        }
        Schema {
            version: 0,
            block,
            importable: false,
        }
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let resource = Arc::new(self.inner.schema());
        let mut scratch = ResourceData::new(resource, None, data.desired().clone());
        let name = self.inner.canonical_name(&scratch)?.ok_or_else(|| {
            ProviderError::invalid(format!(
                "{} needs {}",
                type_name(R::TYPE),
                self.inner.lookup_keys().join(", ")
            ))
        })?;
        let message: R::Message = ctx
            .client()
            .get(&name)
            .await
            .map_err(|e| e.for_resource(&name))?;
        if message.state().is_deleted() {
            return Err(ProviderError::NotFound(format!("{} is deleted", name)));
        }
        self.inner
            .flatten(&message, &mut scratch)
            .map_err(|e| e.for_resource(&name))?;
        assign(data, &scratch.attributes());
        data.set_id(name);
        Ok(())
    }
}

// =============================================================================
// List
// =============================================================================

/// A filter attribute of a list data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    /// Free-text `query`.
    Query,
    /// `project` name.
    Project,
    /// `environment` name.
    Environment,
    /// `instance` name.
    Instance,
    /// `engines` set.
    Engines,
    /// `labels` map; a value may list several alternatives separated by commas.
    Labels,
    /// `exclude_unassigned` flag.
    ExcludeUnassigned,
    /// Lifecycle `state`.
    State,
    /// `user_types` set.
    UserTypes,
}

impl FilterField {
    /// Attribute name.
    pub fn key(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Project => "project",
            Self::Environment => "environment",
            Self::Instance => "instance",
            Self::Engines => "engines",
            Self::Labels => "labels",
            Self::ExcludeUnassigned => "exclude_unassigned",
            Self::State => "state",
            Self::UserTypes => "user_types",
        }
    }

    /// Attribute declaration.
    pub fn attribute(self) -> Attribute {
        let prefixed = |prefix: &str, what: &str| {
            Attribute::optional_string()
                .with_validator(Validator::Prefix(format!("{}/", prefix)))
                .with_description(format!("Only objects in this {}.", what))
        };
        match self {
            Self::Query => Attribute::optional_string()
                .with_description("Case-insensitive text matched against the name."),
            Self::Project => prefixed(PROJECT_PREFIX, "project"),
            Self::Environment => prefixed(ENVIRONMENT_PREFIX, "environment"),
            Self::Instance => prefixed(INSTANCE_PREFIX, "instance"),
            Self::Engines => Attribute::string_set(AttributeFlags::optional())
                .with_description("Only these engines."),
            Self::Labels => Attribute::string_map(AttributeFlags::optional())
                .with_description("Label constraints, `key = \"v1,v2\"` matches either value."),
            Self::ExcludeUnassigned => Attribute::optional_bool()
                .with_description("Skip databases that belong to no project."),
            Self::State => Attribute::optional_string()
                .with_validator(Validator::one_of(&["ACTIVE", "DELETED"]))
                .with_description("`ACTIVE` (default) or `DELETED`."),
            Self::UserTypes => Attribute::string_set(AttributeFlags::optional())
                .with_description("Only these user types."),
        }
    }

    /// Copy the declared value into `filter`.
    pub fn apply(self, data: &ResourceData, filter: &mut Filter) -> Result<()> {
        let text = |key| data.get_str(key).filter(|s| !s.is_empty()).map(str::to_string);
        match self {
            Self::Query => filter.query = text("query"),
            Self::Project => filter.project = text("project"),
            Self::Environment => filter.environment = text("environment"),
            Self::Instance => filter.instance = text("instance"),
            Self::Engines => {
                filter.engines = data
                    .get_str_list("engines")
                    .into_iter()
                    .map(|e| e.to_uppercase())
                    .collect();
            },
            Self::Labels => {
                for (key, values) in data.get_str_map("labels") {
                    for value in values.split(',').map(str::trim).filter(|v| !v.is_empty()) {
                        filter.labels.push(Label::new(key.as_str(), value));
                    }
                }
            },
            Self::ExcludeUnassigned => filter.exclude_unassigned = data.get_bool("exclude_unassigned"),
            Self::State => {
                let state = data.get_str("state").unwrap_or_default();
                filter.state = StateFilter::parse(state).ok_or_else(|| {
                    ProviderError::invalid(format!("state must be ACTIVE or DELETED, got {:?}", state))
                })?;
            },
            Self::UserTypes => filter.user_types = data.get_str_list("user_types"),
        }
        Ok(())
    }
}

/// A reconciler whose collection can be listed.
pub trait Listing: Reconcile {
    /// Plural short type name, also the name of the result list.
    const PLURAL: &'static str;

    /// Filter attributes the list accepts.
    const FILTERS: &'static [FilterField] = &[];

    /// Fields matched by `query`.
    const QUERY_FIELDS: QueryFields = QueryFields::Name;

    /// Attribute naming the parent of a nested collection.
    fn parent_attribute(&self) -> Option<(&'static str, Attribute)> {
        None
    }

    /// Parent the list is read from.
    fn list_parent(&self, data: &ResourceData) -> Result<String> {
        Ok(match self.parent_attribute() {
            Some((key, _)) => data.get_string(key),
            None => String::new(),
        })
    }
}

/// List data source over a reconciler.
#[derive(Debug, Default)]
pub struct List<R> {
    inner: R,
}

impl<R: Listing> List<R> {
    /// Wrap a reconciler.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    fn filter(&self, data: &ResourceData) -> Result<Filter> {
        let mut filter = Filter {
            query_fields: R::QUERY_FIELDS,
            ..Default::default()
        };
        for field in R::FILTERS {
            field.apply(data, &mut filter)?;
        }
        Ok(filter)
    }
}

#[async_trait]
impl<R: Listing> DataSource for List<R> {
    fn type_name(&self) -> String {
        type_name(R::PLURAL)
    }

    fn schema(&self) -> Schema {
        let element = computed_block(&self.inner.schema().block);
        let mut schema = Schema::v0()
            .with_description(format!("Every {} matching the filter.", type_name(R::TYPE)))
            .with_block(R::PLURAL, NestedBlock::list(element));
        if let Some((key, attr)) = self.inner.parent_attribute() {
            schema = schema.with_attribute(key, attr);
        }
        for field in R::FILTERS {
            schema = schema.with_attribute(field.key(), field.attribute());
        }
        schema
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let filter = self.filter(data)?;
        let parent = self.inner.list_parent(data)?;
        let options = ListOptions {
            filter: filter.compile(),
            show_deleted: filter.show_deleted(),
            ..Default::default()
        };
        let messages: Vec<R::Message> = ctx
            .client()
            .list(&parent, &options)
            .await
            .map_err(|e| e.for_resource(&type_name(R::PLURAL)))?;

        let resource = Arc::new(self.inner.schema());
        let element = computed_block(&resource.block);
        let mut seed = Map::new();
        if let Some((key, _)) = self.inner.parent_attribute() {
            seed.insert(key.to_string(), Value::String(parent.clone()));
        }
        let mut items = Vec::with_capacity(messages.len());
        for message in &messages {
            let mut scratch = ResourceData::new(Arc::clone(&resource), None, Value::Object(seed.clone()));
            self.inner
                .flatten(message, &mut scratch)
                .map_err(|e| e.for_resource(message.name()))?;
            items.push(project(&element, &scratch.attributes()));
        }
        tracing::debug!(data_source = R::PLURAL, count = items.len(), "listed");
        data.set(R::PLURAL, items);
        data.set_id(refresh_id());
        Ok(())
    }
}

// =============================================================================
// Registry
// =============================================================================

fn single<R: Reconcile>(inner: R) -> Arc<dyn DataSource> {
    Arc::new(Single::new(inner))
}

fn list<R: Listing>(inner: R) -> Arc<dyn DataSource> {
    Arc::new(List::new(inner))
}

/// Every data source type.
pub fn all() -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(environment::EnvironmentDataSource) as Arc<dyn DataSource>,
        Arc::new(environment::EnvironmentsDataSource) as Arc<dyn DataSource>,
        single(instance::InstanceResource),
        list(instance::InstanceResource),
        single(project::ProjectResource),
        list(project::ProjectResource),
        single(database::DatabaseResource),
        list(database::DatabaseResource),
        single(catalog::CatalogResource),
        single(database_group::DatabaseGroupResource),
        list(database_group::DatabaseGroupResource),
        single(vcs_provider::VcsProviderResource),
        list(vcs_provider::VcsProviderResource),
        single(vcs_connector::VcsConnectorResource),
        list(vcs_connector::VcsConnectorResource),
        single(user::UserResource),
        list(user::UserResource),
        single(group::GroupResource),
        list(group::GroupResource),
        single(role::RoleResource),
        list(role::RoleResource),
        single(risk::RiskResource),
        list(risk::RiskResource),
        single(review_config::ReviewConfigResource),
        list(review_config::ReviewConfigResource),
        single(policy::PolicyResource),
        list(policy::PolicyResource),
        single(setting::SettingResource),
        Arc::new(iam_policy::IamPolicyDataSource) as Arc<dyn DataSource>,
    ]
}
