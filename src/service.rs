//! The interface the host drives.
//!
//! [`ProviderService`] is what a plugin host calls for each step of a
//! plan/apply cycle. Handler calls take the host's [`CancellationToken`]
//! and return a [`HandlerOutcome`]: the new state (or `None` when the
//! handle is gone) plus diagnostics. Failures are reported as error
//! diagnostics; on failure the outcome carries the state the host already
//! had, so a cancelled or rejected call never changes the handle.
//!
//! # Example
//!
//! ```ignore
//! use terraform_provider_bytebase::{BytebaseProvider, ProviderService};
//! use tokio_util::sync::CancellationToken;
//! use serde_json::json;
//!
//! let provider = BytebaseProvider::new();
//! provider.configure(json!({"url": "https://bytebase.example.com"})).await?;
//! let outcome = provider
//!     .create("bytebase_project", json!({"resource_id": "acme", "title": "Acme"}), CancellationToken::new())
//!     .await;
//! assert_eq!(outcome.id(), Some("projects/acme"));
//! ```

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::types::{HandlerOutcome, ProviderMetadata};
use crate::validation;

/// Operations a provider exposes to its host.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Schema of the provider configuration and of every type.
    fn schema(&self) -> ProviderSchema;

    /// Names of every registered type, derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Check the provider configuration without acting on it.
    async fn validate_provider_config(&self, config: Value) -> Vec<Diagnostic> {
        validation::validate(&self.schema().provider, &config)
    }

    /// Configure the provider. Error diagnostics mean the provider is unusable.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Check a resource configuration against its schema.
    async fn validate_resource_config(&self, resource_type: &str, config: Value) -> Vec<Diagnostic> {
        match self.schema().resources.get(resource_type) {
            Some(schema) => validation::validate(schema, &config),
            None => vec![unknown_type("resource", resource_type)],
        }
    }

    /// Create, or take over, the object declared by `planned`.
    async fn create(&self, resource_type: &str, planned: Value, cancel: CancellationToken) -> HandlerOutcome;

    /// Refresh `state` from the server.
    async fn read(&self, resource_type: &str, state: Value, cancel: CancellationToken) -> HandlerOutcome;

    /// Move the object from `prior` to `planned`.
    async fn update(
        &self,
        resource_type: &str,
        prior: Value,
        planned: Value,
        cancel: CancellationToken,
    ) -> HandlerOutcome;

    /// Delete the object held in `state`.
    async fn delete(&self, resource_type: &str, state: Value, cancel: CancellationToken) -> HandlerOutcome;

    /// Adopt an existing object by id.
    async fn import_resource(&self, resource_type: &str, id: &str, cancel: CancellationToken) -> HandlerOutcome;

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Check a data source configuration against its schema.
    async fn validate_data_source_config(&self, data_source_type: &str, config: Value) -> Vec<Diagnostic> {
        match self.schema().data_sources.get(data_source_type) {
            Some(schema) => validation::validate(schema, &config),
            None => vec![unknown_type("data source", data_source_type)],
        }
    }

    /// Read a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
        cancel: CancellationToken,
    ) -> HandlerOutcome;
}

fn unknown_type(kind: &str, name: &str) -> Diagnostic {
    Diagnostic::error(format!("Unknown {} type", kind)).with_detail(format!("{} is not registered", name))
}

/// Error diagnostic for a failed handler call.
pub fn error_diagnostic(err: &ProviderError) -> Diagnostic {
    let summary = match err.kind() {
        tonic::Code::NotFound => "Not found",
        tonic::Code::AlreadyExists => "Already exists",
        tonic::Code::InvalidArgument => "Invalid configuration",
        tonic::Code::PermissionDenied | tonic::Code::Unauthenticated => "Access denied",
        tonic::Code::Cancelled => "Cancelled",
        tonic::Code::DeadlineExceeded | tonic::Code::Unavailable => "Bytebase unavailable",
        _ => "Bytebase request failed",
    };
    Diagnostic::error(summary).with_detail(err.to_string())
}

/// Outcome of a call that failed before or during the handler: `state`
/// is what the host already had.
pub fn failed(state: Option<Value>, err: &ProviderError, mut diagnostics: Vec<Diagnostic>) -> HandlerOutcome {
    diagnostics.push(error_diagnostic(err));
    HandlerOutcome { state, diagnostics }
}

/// Validation errors of `value`, if any, as a failed outcome.
pub fn reject_invalid(schema: &Schema, value: &Value, state: Option<Value>) -> Option<HandlerOutcome> {
    let diagnostics = validation::validate(schema, value);
    if diagnostics.iter().any(Diagnostic::is_error) {
        Some(HandlerOutcome { state, diagnostics })
    } else {
        None
    }
}
