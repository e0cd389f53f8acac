//! Testing utilities.
//!
//! [`ProviderTester`] drives a [`ProviderService`] the way a host would,
//! without a plugin process. [`FakeBytebase`] stands in for the server.
//!
//! # Example
//!
//! ```ignore
//! use terraform_provider_bytebase::testing::{FakeBytebase, ProviderTester};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_project() {
//!     let fake = FakeBytebase::new();
//!     let tester = ProviderTester::bytebase(&fake);
//!
//!     let outcome = tester
//!         .create("bytebase_project", json!({"resource_id": "acme", "title": "Acme"}))
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(outcome.id(), Some("projects/acme"));
//! }
//! ```

pub mod fake;

pub use fake::FakeBytebase;

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::provider::BytebaseProvider;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{AttributeChange, HandlerOutcome};

/// A test harness for provider implementations.
///
/// Every call runs under a child of the tester's cancellation token, so
/// [`ProviderTester::cancel`] aborts everything that follows.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
    cancel: CancellationToken,
}

impl ProviderTester<BytebaseProvider> {
    /// A Bytebase provider bound to `fake`.
    pub fn bytebase(fake: &FakeBytebase) -> Self {
        Self::new(BytebaseProvider::with_transport(Arc::new(fake.clone())))
    }
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            cancel: CancellationToken::new(),
        }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Cancel every call made from now on.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Attribute changes the host would plan between `prior` and `planned`.
    pub fn changes(&self, resource_type: &str, prior: Value, planned: Value) -> Vec<AttributeChange> {
        match self.schema().resources.remove(resource_type) {
            Some(schema) => ResourceData::new(Arc::new(schema), Some(prior), planned).changes(),
            None => vec![],
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(&self, resource_type: &str, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_resource_config(resource_type, config).await;
        check_diagnostics(diagnostics)
    }

    /// Create a resource.
    pub async fn create(&self, resource_type: &str, planned: Value) -> Result<HandlerOutcome, TestError> {
        check_outcome(self.provider.create(resource_type, planned, self.token()).await)
    }

    /// Read a resource. A cleared handle is a successful outcome with no state.
    pub async fn read(&self, resource_type: &str, state: Value) -> Result<HandlerOutcome, TestError> {
        check_outcome(self.provider.read(resource_type, state, self.token()).await)
    }

    /// Update a resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior: Value,
        planned: Value,
    ) -> Result<HandlerOutcome, TestError> {
        check_outcome(self.provider.update(resource_type, prior, planned, self.token()).await)
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, state: Value) -> Result<HandlerOutcome, TestError> {
        check_outcome(self.provider.delete(resource_type, state, self.token()).await)
    }

    /// Import an existing resource.
    pub async fn import_resource(&self, resource_type: &str, id: &str) -> Result<HandlerOutcome, TestError> {
        check_outcome(self.provider.import_resource(resource_type, id, self.token()).await)
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await;
        check_diagnostics(diagnostics)
    }

    /// Read a data source and return its state.
    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, TestError> {
        let outcome = check_outcome(
            self.provider
                .read_data_source(data_source_type, config, self.token())
                .await,
        )?;
        expect_state(outcome, data_source_type)
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Create, then read back. Returns the state after read.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, TestError> {
        let created = expect_state(self.create(resource_type, config).await?, resource_type)?;
        expect_state(self.read(resource_type, created).await?, resource_type)
    }

    /// Update, then read back. Returns the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior: Value,
        planned: Value,
    ) -> Result<Value, TestError> {
        let updated = expect_state(self.update(resource_type, prior, planned).await?, resource_type)?;
        expect_state(self.read(resource_type, updated).await?, resource_type)
    }

    /// Delete, then read. The read must clear the handle.
    pub async fn lifecycle_delete(&self, resource_type: &str, state: Value) -> Result<(), TestError> {
        self.delete(resource_type, state.clone()).await?;
        match self.read(resource_type, state).await?.state {
            None => Ok(()),
            Some(state) => Err(TestError::Lingering(state)),
        }
    }

    /// Create → read → update → read → delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial: Value,
        updated: Value,
    ) -> Result<Value, TestError> {
        let created = self.lifecycle_create(resource_type, initial).await?;
        let updated = self.lifecycle_update(resource_type, created, updated).await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Error type for test operations.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
    /// The handle was cleared where a state was expected.
    Cleared(String),
    /// The object was still readable after delete.
    Lingering(Value),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
            TestError::Cleared(what) => write!(f, "{} returned no state", what),
            TestError::Lingering(state) => write!(f, "Still present after delete: {}", state),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

impl TestError {
    /// Diagnostics carried by this error, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            TestError::Diagnostics(diags) => diags,
            _ => &[],
        }
    }
}

fn errors_of(diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    diagnostics
        .into_iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect()
}

/// Check diagnostics and return an error if there are any errors.
fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors = errors_of(diagnostics);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn check_outcome(outcome: HandlerOutcome) -> Result<HandlerOutcome, TestError> {
    if outcome.diagnostics.iter().any(Diagnostic::is_error) {
        Err(TestError::Diagnostics(errors_of(outcome.diagnostics)))
    } else {
        Ok(outcome)
    }
}

fn expect_state(outcome: HandlerOutcome, what: &str) -> Result<Value, TestError> {
    outcome.state.ok_or_else(|| TestError::Cleared(what.to_string()))
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that the planned changes include `path`.
///
/// # Panics
///
/// Panics if no change has the given path.
pub fn assert_changes_attribute(changes: &[AttributeChange], path: &str) {
    assert!(
        changes.iter().any(|c| c.path == path),
        "Expected a change to '{}', but the changed attributes are {:?}",
        path,
        changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that no change is planned.
///
/// # Panics
///
/// Panics if there is any change.
pub fn assert_no_changes(changes: &[AttributeChange]) {
    assert!(
        changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        changes.len(),
        changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that an error diagnostic mentions `substring` in its summary or detail.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let matches = |d: &&Diagnostic| {
        d.is_error()
            && (d.summary.contains(substring)
                || d.detail.as_deref().is_some_and(|detail| detail.contains(substring)))
    };
    assert!(
        diagnostics.iter().any(|d| matches(&d)),
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics.iter().filter(|d| d.is_error()).collect::<Vec<_>>()
    );
}

/// Assert that a warning mentions `substring` in its summary or detail.
///
/// # Panics
///
/// Panics if no warning matches.
pub fn assert_warning_contains(diagnostics: &[Diagnostic], substring: &str) {
    let found = diagnostics.iter().any(|d| {
        !d.is_error()
            && (d.summary.contains(substring)
                || d.detail.as_deref().is_some_and(|detail| detail.contains(substring)))
    });
    assert!(
        found,
        "Expected a warning containing '{}', got {:?}",
        substring,
        diagnostics
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_tester_types() {
        let tester = ProviderTester::bytebase(&FakeBytebase::new());
        assert!(tester.resource_types().contains(&"bytebase_setting".to_string()));
        assert!(tester.data_source_types().contains(&"bytebase_projects".to_string()));
        assert!(tester.configure(json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_project_crud() {
        let fake = FakeBytebase::new();
        let tester = ProviderTester::bytebase(&fake);
        let updated = tester
            .lifecycle_crud(
                "bytebase_project",
                json!({"resource_id": "acme", "title": "Acme"}),
                json!({"resource_id": "acme", "title": "Acme Corp"}),
            )
            .await
            .unwrap();
        assert_eq!(updated["title"], "Acme Corp");
        assert_eq!(fake.object("projects", "projects/acme").unwrap()["state"], "DELETED");
    }

    #[tokio::test]
    async fn test_validation_errors_surface() {
        let tester = ProviderTester::bytebase(&FakeBytebase::new());
        let err = tester
            .validate_resource_config("bytebase_project", json!({"title": "no id"}))
            .await
            .unwrap_err();
        assert_eq!(err.diagnostics()[0].attribute.as_deref(), Some("resource_id"));
    }

    #[tokio::test]
    async fn test_cancelled_tester() {
        let tester = ProviderTester::bytebase(&FakeBytebase::new());
        tester.cancel();
        let err = tester
            .create("bytebase_project", json!({"resource_id": "acme", "title": "Acme"}))
            .await
            .unwrap_err();
        assert_error_contains(err.diagnostics(), "Cancelled");
    }

    #[test]
    fn test_changes() {
        let tester = ProviderTester::bytebase(&FakeBytebase::new());
        let prior = json!({"id": "projects/acme", "resource_id": "acme", "title": "Acme"});
        let changes = tester.changes(
            "bytebase_project",
            prior.clone(),
            json!({"resource_id": "acme", "title": "Acme Corp"}),
        );
        assert_changes_attribute(&changes, "title");
        assert_no_changes(&tester.changes("bytebase_project", prior.clone(), prior));
    }
}
