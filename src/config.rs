//! Provider configuration.
//!
//! Every attribute may be left out of the configuration and supplied by
//! its environment variable instead:
//!
//! | Attribute         | Environment variable        |
//! |-------------------|-----------------------------|
//! | `url`             | `BYTEBASE_URL`              |
//! | `service_account` | `BYTEBASE_SERVICE_ACCOUNT`  |
//! | `service_key`     | `BYTEBASE_SERVICE_KEY`      |

use serde_json::Value;
use url::Url;

use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::{ENV_SERVICE_ACCOUNT, ENV_SERVICE_KEY, ENV_URL};

/// Resolved provider configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Server endpoint, without a trailing slash.
    pub url: Url,
    /// Service account email.
    pub service_account: String,
    /// Service account key.
    pub service_key: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("url", &self.url.as_str())
            .field("service_account", &self.service_account)
            .field("service_key", &"<redacted>")
            .finish()
    }
}

impl ProviderConfig {
    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Connection to a Bytebase server.")
            .with_attribute(
                "url",
                Attribute::optional_string().with_description(format!(
                    "External URL of the Bytebase server. Falls back to `{}`.",
                    ENV_URL
                )),
            )
            .with_attribute(
                "service_account",
                Attribute::optional_string().with_description(format!(
                    "Service account email. Falls back to `{}`.",
                    ENV_SERVICE_ACCOUNT
                )),
            )
            .with_attribute(
                "service_key",
                Attribute::optional_string().sensitive().with_description(format!(
                    "Service account key. Falls back to `{}`.",
                    ENV_SERVICE_KEY
                )),
            )
    }

    /// Resolve the configuration, falling back to the process environment.
    pub fn from_config(config: &Value) -> Result<Self, Vec<Diagnostic>> {
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    /// Resolve the configuration with an explicit environment lookup.
    pub fn resolve<F>(config: &Value, env: F) -> Result<Self, Vec<Diagnostic>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut diagnostics = Vec::new();
        let mut lookup = |attribute: &str, variable: &str| -> String {
            let value = config
                .get(attribute)
                .and_then(Value::as_str)
                .map(str::to_string)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| env(variable).filter(|v| !v.trim().is_empty()))
                .unwrap_or_default();
            if value.is_empty() {
                diagnostics.push(
                    Diagnostic::error(format!("Missing {}", attribute))
                        .with_detail(format!(
                            "Set `{}` in the provider block or the {} environment variable",
                            attribute, variable
                        ))
                        .with_attribute(attribute),
                );
            }
            value.trim().to_string()
        };

        let url = lookup("url", ENV_URL);
        let service_account = lookup("service_account", ENV_SERVICE_ACCOUNT);
        let service_key = lookup("service_key", ENV_SERVICE_KEY);

        let parsed = if url.is_empty() {
            None
        } else {
            match normalize_url(&url) {
                Ok(parsed) => Some(parsed),
                Err(detail) => {
                    diagnostics.push(
                        Diagnostic::error("Invalid url")
                            .with_detail(detail)
                            .with_attribute("url"),
                    );
                    None
                },
            }
        };

        match parsed {
            Some(url) if diagnostics.is_empty() => Ok(Self {
                url,
                service_account,
                service_key,
            }),
            _ => Err(diagnostics),
        }
    }
}

/// Parse an http(s) URL and drop any trailing slash from its path.
pub fn normalize_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw).map_err(|e| format!("{} is not a valid URL: {}", raw, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("{} must use http or https", raw));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(format!("{} has no host", raw));
    }
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
