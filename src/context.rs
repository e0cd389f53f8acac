//! Per-invocation handler context.

use std::sync::Mutex;

use crate::client::Client;
use crate::schema::Diagnostic;

/// What a handler gets besides its resource data: a client scoped to the
/// host's cancellation token and a channel for warnings.
#[derive(Debug)]
pub struct Context {
    client: Client,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl Context {
    /// Create a context around a scoped client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    /// The scoped client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Whether the host cancelled this invocation.
    pub fn is_cancelled(&self) -> bool {
        self.client.is_cancelled()
    }

    /// Report a non-fatal warning to the host and the log.
    pub fn warn(&self, summary: impl Into<String>, detail: impl Into<String>) {
        let summary = summary.into();
        let detail = detail.into();
        tracing::warn!(%detail, "{}", summary);
        self.push(Diagnostic::warning(summary).with_detail(detail));
    }

    /// Record a diagnostic as is.
    pub fn push(&self, diagnostic: Diagnostic) {
        match self.diagnostics.lock() {
            Ok(mut diagnostics) => diagnostics.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }

    /// Drain collected diagnostics.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        match self.diagnostics.lock() {
            Ok(mut diagnostics) => std::mem::take(&mut *diagnostics),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBytebase;

    #[test]
    fn test_warnings_are_collected_once() {
        let ctx = Context::new(FakeBytebase::new().client());
        ctx.warn("Resource already exists", "projects/acme will be updated in place");
        let diagnostics = ctx.take_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some("projects/acme will be updated in place")
        );
        assert!(ctx.take_diagnostics().is_empty());
    }
}
