//! Reconciliation handlers.
//!
//! Every managed resource implements [`Resource`]. Most do it through
//! [`Handler`], which runs the shared create/read/update/delete state
//! machine over a [`Reconcile`] implementation that only knows how to
//! name, expand and flatten its own message:
//!
//! * **create** derives the canonical name, validates by expanding, then
//!   looks the object up. A missing object is created (or upserted, or
//!   reported, depending on [`CreateMode`]). An existing object is taken
//!   over with a warning: the prior state is rebased onto what the server
//!   holds, immutable attributes are checked, soft-deleted objects are
//!   undeleted, and only the changed fields are sent.
//! * **read** clears the handle when the object is gone or soft-deleted.
//! * **update** rejects immutable changes before any call and sends the
//!   field mask of what changed.
//! * **delete** treats `NotFound` as success. Non-deletable resources only
//!   warn and forget the handle.
//!
//! The environment and IAM policy resources do not fit that shape and
//! implement [`Resource`] directly.

pub mod catalog;
pub mod database;
pub mod database_group;
pub mod environment;
pub mod group;
pub mod iam_policy;
pub mod instance;
pub mod policy;
pub mod project;
pub mod review_config;
pub mod risk;
pub mod role;
pub mod setting;
pub mod user;
pub mod vcs_connector;
pub mod vcs_provider;

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::{ApiMessage, Result};
use crate::context::Context;
use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::mapper::mask;
use crate::schema::{Attribute, Schema, Validator};
use crate::types::type_name;

/// A managed resource type.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Full type name, e.g. `bytebase_project`.
    fn type_name(&self) -> String;

    /// Schema of the resource.
    fn schema(&self) -> Schema;

    /// Create (or take over) the object declared by `data`.
    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    /// Refresh state from the server; clears the handle when gone.
    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    /// Apply the difference between prior and desired state.
    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    /// Delete the object and clear the handle.
    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()>;

    /// Adopt an existing object by canonical name.
    async fn import(&self, ctx: &Context, id: &str, data: &mut ResourceData) -> Result<()> {
        data.set_id(id);
        self.read(ctx, data).await?;
        if data.id().is_none() {
            return Err(ProviderError::NotFound(format!("{} does not exist", id)));
        }
        Ok(())
    }
}

/// What create does when the object does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Call create with the parent and id.
    Create,
    /// Call update with `allow_missing` and the full mask.
    AllowMissing,
    /// The object must already exist; a missing object is an error.
    Adopt,
}

/// Name, expand and flatten one message type.
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    /// The protocol message.
    type Message: ApiMessage;

    /// Short type name, e.g. `project`.
    const TYPE: &'static str;

    /// Behavior of create for missing objects.
    const CREATE_MODE: CreateMode = CreateMode::Create;

    /// Whether delete calls the server.
    const DELETABLE: bool = true;

    /// Schema of the resource.
    fn schema(&self) -> Schema;

    /// Attributes identifying the object in the single-item data source.
    fn lookup_keys(&self) -> &'static [&'static str] {
        &["resource_id"]
    }

    /// Canonical name derived from the declared attributes. `None` when the
    /// server assigns the name.
    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>>;

    /// Parent passed to create.
    fn parent(&self, data: &ResourceData) -> Result<String> {
        let _ = data;
        Ok(String::new())
    }

    /// Id passed to create, for collections that take one.
    fn resource_id(&self, data: &ResourceData) -> Option<String> {
        data.get_str("resource_id").map(str::to_string)
    }

    /// Build the message from the desired attributes. Every mapping-time
    /// check happens here, before any call.
    fn expand(&self, data: &ResourceData, name: &str) -> Result<Self::Message>;

    /// Write the message into the output state, including the attributes
    /// derived from its name.
    fn flatten(&self, message: &Self::Message, data: &mut ResourceData) -> Result<()>;

    /// Paths to send besides the schema-derived mask.
    fn extra_mask(&self, data: &ResourceData) -> Vec<String> {
        let _ = data;
        Vec::new()
    }

    /// Fill attributes that need more than the message itself.
    async fn after_read(&self, ctx: &Context, data: &mut ResourceData, name: &str) -> Result<()> {
        let _ = (ctx, data, name);
        Ok(())
    }

    /// Side effects after a successful create or update.
    async fn after_apply(&self, ctx: &Context, data: &ResourceData, name: &str) -> Result<()> {
        let _ = (ctx, data, name);
        Ok(())
    }

    /// Side effects before delete.
    async fn before_delete(&self, ctx: &Context, data: &ResourceData, name: &str) -> Result<()> {
        let _ = (ctx, data, name);
        Ok(())
    }

    /// Remove the object on the server.
    async fn remove(&self, ctx: &Context, name: &str) -> Result<()> {
        ctx.client().delete::<Self::Message>(name).await
    }
}

/// Runs the shared state machine for a [`Reconcile`] implementation.
#[derive(Debug, Default)]
pub struct Handler<R> {
    inner: R,
}

impl<R: Reconcile> Handler<R> {
    /// Wrap a reconciler.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// The wrapped reconciler.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Attribute tree of `message` alone, used as prior state when taking
    /// over an existing object.
    fn snapshot(&self, message: &R::Message, data: &ResourceData) -> Result<serde_json::Value> {
        let mut scratch = data.scratch();
        self.inner.flatten(message, &mut scratch)?;
        Ok(scratch.attributes())
    }

    fn mask(&self, data: &ResourceData) -> Vec<String> {
        let mut paths = mask::field_mask(data);
        for path in self.inner.extra_mask(data) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    async fn create_missing(
        &self,
        ctx: &Context,
        data: &mut ResourceData,
        name: &str,
        message: &R::Message,
    ) -> Result<()> {
        let client = ctx.client();
        match R::CREATE_MODE {
            CreateMode::Create => {
                let parent = self.inner.parent(data)?;
                let id = self.inner.resource_id(data);
                let created = client.create(&parent, id.as_deref(), message).await?;
                // Some fields, such as service keys, are only returned here.
                self.inner.flatten(&created, data)?;
                data.set_id(created.name());
            },
            CreateMode::AllowMissing => {
                let paths = self.mask(data);
                client.update_with(message, &paths, true).await?;
                data.set_id(name);
            },
            CreateMode::Adopt => {
                return Err(ProviderError::NotFound(format!(
                    "{} does not exist; {} can only manage existing objects",
                    name,
                    type_name(R::TYPE)
                )));
            },
        }
        Ok(())
    }

    async fn take_over(
        &self,
        ctx: &Context,
        data: &mut ResourceData,
        existing: R::Message,
        message: &R::Message,
    ) -> Result<()> {
        let name = existing.name().to_string();
        if R::CREATE_MODE != CreateMode::Adopt {
            ctx.warn(
                "Resource already exists",
                format!(
                    "{} already exists and will be updated in place to match the configuration",
                    name
                ),
            );
        }
        let snapshot = self.snapshot(&existing, data)?;
        data.rebase(snapshot);
        mask::check_immutable(data)?;

        let client = ctx.client();
        if existing.state().is_deleted() {
            ctx.warn(
                "Resource was deleted",
                format!("{} is soft-deleted and will be restored before updating", name),
            );
            client.undelete::<R::Message>(&name).await?;
        }
        let paths = self.mask(data);
        client.update(message, &paths).await?;
        data.set_id(name);
        Ok(())
    }

    async fn create_named(&self, ctx: &Context, data: &mut ResourceData, name: &str) -> Result<()> {
        let message = self.inner.expand(data, name)?;
        match ctx.client().get::<R::Message>(name).await {
            Err(err) if err.is_not_found() => self.create_missing(ctx, data, name, &message).await?,
            Err(err) => return Err(err),
            Ok(existing) => self.take_over(ctx, data, existing, &message).await?,
        }
        self.inner.after_apply(ctx, data, name).await
    }

    async fn create_unnamed(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let message = self.inner.expand(data, "")?;
        let parent = self.inner.parent(data)?;
        let created = ctx.client().create(&parent, None, &message).await?;
        self.inner.flatten(&created, data)?;
        data.set_id(created.name());
        self.inner.after_apply(ctx, data, created.name()).await
    }
}

#[async_trait]
impl<R: Reconcile> Resource for Handler<R> {
    fn type_name(&self) -> String {
        type_name(R::TYPE)
    }

    fn schema(&self) -> Schema {
        self.inner.schema()
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        match self.inner.canonical_name(data)? {
            Some(name) => self
                .create_named(ctx, data, &name)
                .await
                .map_err(|e| e.for_resource(&name))?,
            None => self.create_unnamed(ctx, data).await?,
        }
        tracing::info!(resource = R::TYPE, name = data.id().unwrap_or_default(), "created");
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let Some(name) = data.id().map(str::to_string) else {
            return Ok(());
        };
        match ctx.client().get::<R::Message>(&name).await {
            Err(err) if err.is_not_found() => {
                tracing::warn!(resource = R::TYPE, %name, "not found, removing from state");
                data.clear_id();
                Ok(())
            },
            Err(err) => Err(err.for_resource(&name)),
            Ok(message) if message.state().is_deleted() => {
                tracing::warn!(resource = R::TYPE, %name, "soft-deleted, removing from state");
                data.clear_id();
                Ok(())
            },
            Ok(message) => {
                let refresh = async {
                    self.inner.flatten(&message, data)?;
                    self.inner.after_read(ctx, data, &name).await
                };
                refresh.await.map_err(|e| e.for_resource(&name))
            },
        }
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let name = data
            .id()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::invalid(format!("{} has no id", type_name(R::TYPE))))?;
        let apply = async {
            mask::check_immutable(data)?;
            let message = self.inner.expand(data, &name)?;
            let paths = self.mask(data);
            let updated = ctx.client().update(&message, &paths).await?;
            self.inner.after_apply(ctx, data, &name).await?;
            Ok::<_, ProviderError>(updated.map(|m| m.name().to_string()))
        };
        let renamed = apply.await.map_err(|e| e.for_resource(&name))?;
        if let Some(new_name) = renamed.filter(|n| !n.is_empty() && *n != name) {
            tracing::info!(resource = R::TYPE, from = %name, to = %new_name, "renamed");
            data.set_id(new_name);
        }
        tracing::info!(resource = R::TYPE, %name, "updated");
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let Some(name) = data.id().map(str::to_string) else {
            return Ok(());
        };
        if !R::DELETABLE {
            ctx.warn(
                "Delete is not supported",
                format!("{} is only removed from state; the object is kept on the server", name),
            );
            data.clear_id();
            return Ok(());
        }
        let remove = async {
            self.inner.before_delete(ctx, data, &name).await?;
            match self.inner.remove(ctx, &name).await {
                Err(err) if err.is_not_found() => {
                    tracing::debug!(resource = R::TYPE, %name, "already gone");
                    Ok(())
                },
                other => other,
            }
        };
        remove.await.map_err(|e| e.for_resource(&name))?;
        tracing::info!(resource = R::TYPE, %name, "deleted");
        data.clear_id();
        Ok(())
    }
}

/// Handler of a reconciler as a shared trait object.
pub fn handler<R: Reconcile>(inner: R) -> Arc<dyn Resource> {
    Arc::new(Handler::new(inner))
}

/// Every managed resource type.
pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(environment::EnvironmentResource) as Arc<dyn Resource>,
        handler(instance::InstanceResource),
        handler(project::ProjectResource),
        handler(database::DatabaseResource),
        handler(catalog::CatalogResource),
        handler(database_group::DatabaseGroupResource),
        handler(vcs_provider::VcsProviderResource),
        handler(vcs_connector::VcsConnectorResource),
        handler(user::UserResource),
        handler(group::GroupResource),
        handler(role::RoleResource),
        handler(risk::RiskResource),
        handler(review_config::ReviewConfigResource),
        handler(policy::PolicyResource),
        handler(setting::SettingResource),
        Arc::new(iam_policy::IamPolicyResource) as Arc<dyn Resource>,
    ]
}

// =============================================================================
// Shared attributes
// =============================================================================

/// The user-chosen id of a top-level object.
pub fn resource_id_attribute(what: &str) -> Attribute {
    Attribute::required_string()
        .immutable()
        .with_validator(Validator::ResourceId)
        .with_description(format!("The {} unique resource id.", what))
}

/// A required reference to a parent, immutable after creation.
pub fn parent_attribute(prefix: &str, description: &str) -> Attribute {
    Attribute::required_string()
        .immutable()
        .with_validator(Validator::Prefix(format!("{}/", prefix)))
        .with_description(description)
}

/// The server-assigned canonical name.
pub fn name_attribute() -> Attribute {
    Attribute::computed_string().with_description("The canonical resource name.")
}

/// Canonical name of a single-level object from its `resource_id`.
pub fn top_level_name(data: &ResourceData, prefix: &str) -> Result<Option<String>> {
    let id = required_str(data, "resource_id")?;
    crate::names::validate_resource_id(id)?;
    Ok(Some(crate::names::format_one(prefix, id)))
}

/// A required string of the desired tree.
pub fn required_str<'a>(data: &'a ResourceData, key: &str) -> Result<&'a str> {
    data.get_str(key)
        .ok_or_else(|| ProviderError::invalid(format!("{} is required", key)))
}
