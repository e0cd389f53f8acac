//! `bytebase_vcs_provider`.

use async_trait::async_trait;
use serde_json::Value;

use super::{name_attribute, resource_id_attribute, top_level_name, Reconcile};
use crate::api::vcs::VcsProvider;
use crate::client::Result;
use crate::data::ResourceData;
use crate::names::{self, VCS_PROVIDER_PREFIX};
use crate::schema::{Attribute, Schema, Validator};

/// Supported VCS types.
pub const VCS_TYPES: [&str; 4] = ["GITHUB", "GITLAB", "BITBUCKET", "AZURE_DEVOPS"];

/// Reconciles VCS providers.
#[derive(Debug, Default, Clone, Copy)]
pub struct VcsProviderResource;

#[async_trait]
impl Reconcile for VcsProviderResource {
    type Message = VcsProvider;

    const TYPE: &'static str = "vcs_provider";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A VCS provider used by project connectors.")
            .with_attribute("resource_id", resource_id_attribute("VCS provider"))
            .with_attribute("name", name_attribute())
            .with_attribute(
                "title",
                Attribute::required_string().with_update_path("title"),
            )
            .with_attribute(
                "type",
                Attribute::required_string()
                    .immutable()
                    .with_validator(Validator::one_of(&VCS_TYPES)),
            )
            .with_attribute(
                "url",
                Attribute::required_string()
                    .immutable()
                    .with_validator(Validator::NonEmpty)
                    .with_description("The VCS instance URL, e.g. `https://gitlab.example.com`."),
            )
            .with_attribute(
                "access_token",
                Attribute::required_string()
                    .sensitive()
                    .with_update_path("access_token"),
            )
            .importable()
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        top_level_name(data, VCS_PROVIDER_PREFIX)
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<VcsProvider> {
        Ok(VcsProvider {
            name: name.to_string(),
            title: data.get_string("title"),
            kind: data.get_string("type"),
            url: data.get_string("url"),
            access_token: data.get_string("access_token"),
        })
    }

    fn flatten(&self, provider: &VcsProvider, data: &mut ResourceData) -> Result<()> {
        data.set(
            "resource_id",
            names::parse_one(&provider.name, VCS_PROVIDER_PREFIX)?,
        );
        // The server never returns the token.
        let token = data
            .get("access_token")
            .or_else(|| data.get_prior("access_token"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        data.set("name", provider.name.as_str());
        data.set("title", provider.title.as_str());
        data.set("type", provider.kind.as_str());
        data.set("url", provider.url.as_str());
        data.set("access_token", token);
        Ok(())
    }
}
