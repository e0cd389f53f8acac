//! The Bytebase provider.
//!
//! [`BytebaseProvider`] registers every resource and data source, logs in
//! once at configure time and then routes each host call to its handler
//! with a [`Context`] scoped to the call's cancellation token.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::client::{auth, Client, Transport};
use crate::config::ProviderConfig;
use crate::context::Context;
use crate::data::ResourceData;
use crate::data_sources::{self, DataSource};
use crate::error::ProviderError;
use crate::resources::{self, Resource};
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::service::{failed, reject_invalid, ProviderService};
use crate::types::HandlerOutcome;

struct Registered<T: ?Sized> {
    handler: Arc<T>,
    schema: Arc<Schema>,
}

fn register<T, F>(handlers: Vec<Arc<T>>, name: F) -> BTreeMap<String, Registered<T>>
where
    T: ?Sized,
    F: Fn(&T) -> (String, Schema),
{
    handlers
        .into_iter()
        .map(|handler| {
            let (type_name, schema) = name(handler.as_ref());
            let entry = Registered {
                handler,
                schema: Arc::new(schema),
            };
            (type_name, entry)
        })
        .collect()
}

/// Provider exposing Bytebase as resources and data sources.
pub struct BytebaseProvider {
    resources: BTreeMap<String, Registered<dyn Resource>>,
    data_sources: BTreeMap<String, Registered<dyn DataSource>>,
    client: OnceLock<Client>,
}

impl std::fmt::Debug for BytebaseProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BytebaseProvider")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("data_sources", &self.data_sources.keys().collect::<Vec<_>>())
            .field("configured", &self.client.get().is_some())
            .finish()
    }
}

impl Default for BytebaseProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BytebaseProvider {
    /// An unconfigured provider with every type registered.
    pub fn new() -> Self {
        Self {
            resources: register(resources::all(), |r| (r.type_name(), r.schema())),
            data_sources: register(data_sources::all(), |d| (d.type_name(), d.schema())),
            client: OnceLock::new(),
        }
    }

    /// A provider already bound to `transport`. `configure` becomes a no-op.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        let provider = Self::new();
        let _ = provider.client.set(Client::new(transport));
        provider
    }

    /// Whether a client is available.
    pub fn is_configured(&self) -> bool {
        self.client.get().is_some()
    }

    fn context(&self, cancel: CancellationToken) -> Result<Context, ProviderError> {
        let client = self.client.get().ok_or_else(|| {
            ProviderError::Configuration("the provider must be configured before use".to_string())
        })?;
        Ok(Context::new(client.scoped(cancel)))
    }

    fn resource(&self, resource_type: &str) -> Result<&Registered<dyn Resource>, ProviderError> {
        self.resources.get(resource_type).ok_or_else(|| {
            ProviderError::Unimplemented(format!("unknown resource type {}", resource_type))
        })
    }

    fn data_source(&self, data_source_type: &str) -> Result<&Registered<dyn DataSource>, ProviderError> {
        self.data_sources.get(data_source_type).ok_or_else(|| {
            ProviderError::Unimplemented(format!("unknown data source type {}", data_source_type))
        })
    }

    fn finish(ctx: &Context, data: &ResourceData) -> HandlerOutcome {
        HandlerOutcome {
            state: data.state(),
            diagnostics: ctx.take_diagnostics(),
        }
    }
}

/// Shorthand for [`BytebaseProvider::new`].
pub fn new_provider() -> BytebaseProvider {
    BytebaseProvider::new()
}

#[async_trait::async_trait]
impl ProviderService for BytebaseProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        for (name, entry) in &self.resources {
            schema = schema.with_resource(name.clone(), entry.schema.as_ref().clone());
        }
        for (name, entry) in &self.data_sources {
            schema = schema.with_data_source(name.clone(), entry.schema.as_ref().clone());
        }
        schema
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        if self.is_configured() {
            debug!("provider already has a client");
            return Ok(vec![]);
        }
        let config = match ProviderConfig::from_config(&config) {
            Ok(config) => config,
            Err(diagnostics) => {
                warn!(diagnostics = diagnostics.len(), "provider configuration rejected");
                return Ok(diagnostics);
            },
        };
        let transport =
            auth::connect(config.url.clone(), &config.service_account, &config.service_key).await?;
        if self.client.set(Client::new(Arc::new(transport))).is_err() {
            warn!("provider configured concurrently, keeping the first client");
        }
        info!(url = %config.url, service_account = %config.service_account, "provider configured");
        Ok(vec![])
    }

    #[instrument(skip(self, planned, cancel), name = "provider.create")]
    async fn create(&self, resource_type: &str, planned: Value, cancel: CancellationToken) -> HandlerOutcome {
        let entry = match self.resource(resource_type) {
            Ok(entry) => entry,
            Err(e) => return failed(None, &e, vec![]),
        };
        if let Some(rejected) = reject_invalid(&entry.schema, &planned, None) {
            return rejected;
        }
        let ctx = match self.context(cancel) {
            Ok(ctx) => ctx,
            Err(e) => return failed(None, &e, vec![]),
        };
        let mut data = ResourceData::new(Arc::clone(&entry.schema), None, planned);
        match entry.handler.create(&ctx, &mut data).await {
            Ok(()) => {
                info!(id = data.id().unwrap_or_default(), "created");
                Self::finish(&ctx, &data)
            },
            Err(e) => {
                warn!(error = %e, "create failed");
                failed(None, &e, ctx.take_diagnostics())
            },
        }
    }

    #[instrument(skip(self, state, cancel), name = "provider.read")]
    async fn read(&self, resource_type: &str, state: Value, cancel: CancellationToken) -> HandlerOutcome {
        let entry = match self.resource(resource_type) {
            Ok(entry) => entry,
            Err(e) => return failed(Some(state), &e, vec![]),
        };
        let ctx = match self.context(cancel) {
            Ok(ctx) => ctx,
            Err(e) => return failed(Some(state), &e, vec![]),
        };
        let mut data = ResourceData::from_state(Arc::clone(&entry.schema), state.clone());
        match entry.handler.read(&ctx, &mut data).await {
            Ok(()) => {
                if data.id().is_none() {
                    info!("object is gone, clearing the handle");
                }
                Self::finish(&ctx, &data)
            },
            Err(e) => {
                warn!(error = %e, "read failed");
                failed(Some(state), &e, ctx.take_diagnostics())
            },
        }
    }

    #[instrument(skip(self, prior, planned, cancel), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior: Value,
        planned: Value,
        cancel: CancellationToken,
    ) -> HandlerOutcome {
        let entry = match self.resource(resource_type) {
            Ok(entry) => entry,
            Err(e) => return failed(Some(prior), &e, vec![]),
        };
        if let Some(rejected) = reject_invalid(&entry.schema, &planned, Some(prior.clone())) {
            return rejected;
        }
        let ctx = match self.context(cancel) {
            Ok(ctx) => ctx,
            Err(e) => return failed(Some(prior), &e, vec![]),
        };
        let mut data = ResourceData::new(Arc::clone(&entry.schema), Some(prior.clone()), planned);
        match entry.handler.update(&ctx, &mut data).await {
            Ok(()) => {
                info!(id = data.id().unwrap_or_default(), "updated");
                Self::finish(&ctx, &data)
            },
            Err(e) => {
                warn!(error = %e, "update failed");
                failed(Some(prior), &e, ctx.take_diagnostics())
            },
        }
    }

    #[instrument(skip(self, state, cancel), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, state: Value, cancel: CancellationToken) -> HandlerOutcome {
        let entry = match self.resource(resource_type) {
            Ok(entry) => entry,
            Err(e) => return failed(Some(state), &e, vec![]),
        };
        let ctx = match self.context(cancel) {
            Ok(ctx) => ctx,
            Err(e) => return failed(Some(state), &e, vec![]),
        };
        let mut data = ResourceData::from_state(Arc::clone(&entry.schema), state.clone());
        match entry.handler.delete(&ctx, &mut data).await {
            Ok(()) => {
                info!("deleted");
                HandlerOutcome::cleared(ctx.take_diagnostics())
            },
            Err(e) => {
                warn!(error = %e, "delete failed");
                failed(Some(state), &e, ctx.take_diagnostics())
            },
        }
    }

    #[instrument(skip(self, cancel), name = "provider.import")]
    async fn import_resource(&self, resource_type: &str, id: &str, cancel: CancellationToken) -> HandlerOutcome {
        let entry = match self.resource(resource_type) {
            Ok(entry) => entry,
            Err(e) => return failed(None, &e, vec![]),
        };
        let ctx = match self.context(cancel) {
            Ok(ctx) => ctx,
            Err(e) => return failed(None, &e, vec![]),
        };
        let mut data = ResourceData::new(Arc::clone(&entry.schema), None, Value::Object(Map::new()));
        match entry.handler.import(&ctx, id, &mut data).await {
            Ok(()) => {
                info!(id = data.id().unwrap_or_default(), "imported");
                Self::finish(&ctx, &data)
            },
            Err(e) => {
                warn!(error = %e, "import failed");
                failed(None, &e, ctx.take_diagnostics())
            },
        }
    }

    #[instrument(skip(self, config, cancel), name = "provider.read_data_source")]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
        cancel: CancellationToken,
    ) -> HandlerOutcome {
        let entry = match self.data_source(data_source_type) {
            Ok(entry) => entry,
            Err(e) => return failed(None, &e, vec![]),
        };
        if let Some(rejected) = reject_invalid(&entry.schema, &config, None) {
            return rejected;
        }
        let ctx = match self.context(cancel) {
            Ok(ctx) => ctx,
            Err(e) => return failed(None, &e, vec![]),
        };
        let mut data = ResourceData::new(Arc::clone(&entry.schema), None, config);
        match entry.handler.read(&ctx, &mut data).await {
            Ok(()) => {
                debug!(id = data.id().unwrap_or_default(), "data source read");
                Self::finish(&ctx, &data)
            },
            Err(e) => {
                warn!(error = %e, "data source read failed");
                failed(None, &e, ctx.take_diagnostics())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBytebase;
    use serde_json::json;

    #[test]
    fn test_registers_every_type() {
        let provider = BytebaseProvider::new();
        let metadata = provider.metadata();
        assert_eq!(metadata.resources.len(), 16);
        assert!(metadata.resources.contains(&"bytebase_project".to_string()));
        assert!(metadata.data_sources.contains(&"bytebase_iam_policy".to_string()));
        assert!(provider.schema().resources["bytebase_project"].importable);
        assert!(!provider.is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_provider_reports_error() {
        let provider = BytebaseProvider::new();
        let outcome = provider
            .create("bytebase_project", json!({"resource_id": "acme", "title": "Acme"}), CancellationToken::new())
            .await;
        assert!(outcome.state.is_none());
        assert!(outcome.diagnostics[0].detail.as_deref().unwrap().contains("configured"));
    }

    #[tokio::test]
    async fn test_configure_rejects_bad_url() {
        let provider = BytebaseProvider::new();
        let diagnostics = provider
            .configure(json!({
                "url": "ftp://bb.example.com",
                "service_account": "tf@service.bytebase.com",
                "service_key": "bbs_key"
            }))
            .await
            .unwrap();
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("url"));
        assert!(!provider.is_configured());
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let provider = BytebaseProvider::with_transport(Arc::new(FakeBytebase::new()));
        let outcome = provider.read("bytebase_nothing", json!({"id": "x"}), CancellationToken::new()).await;
        assert_eq!(outcome.state, Some(json!({"id": "x"})));
        assert!(outcome.diagnostics[0].is_error());
    }

    #[tokio::test]
    async fn test_invalid_plan_makes_no_calls() {
        let fake = FakeBytebase::new();
        let provider = BytebaseProvider::with_transport(Arc::new(fake.clone()));
        let outcome = provider
            .create("bytebase_project", json!({"resource_id": "Not Valid", "title": "x"}), CancellationToken::new())
            .await;
        assert!(outcome.state.is_none());
        assert_eq!(outcome.diagnostics[0].attribute.as_deref(), Some("resource_id"));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_update_keeps_prior() {
        let fake = FakeBytebase::new();
        fake.insert("projects", json!({"name": "projects/acme", "title": "Acme", "state": "ACTIVE"}));
        let provider = BytebaseProvider::with_transport(Arc::new(fake.clone()));
        let prior = json!({"id": "projects/acme", "resource_id": "acme", "title": "Acme"});
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = provider
            .update(
                "bytebase_project",
                prior.clone(),
                json!({"resource_id": "acme", "title": "Renamed"}),
                cancel,
            )
            .await;
        assert_eq!(outcome.state, Some(prior));
        assert!(outcome.diagnostics.iter().any(Diagnostic::is_error));
        assert_eq!(fake.object("projects", "projects/acme").unwrap()["title"], "Acme");
    }
}
