//! `bytebase_vcs_connector`.
//!
//! The repository a connector points at is fixed once created; branch,
//! directory and title can change.

use async_trait::async_trait;

use super::{name_attribute, parent_attribute, required_str, resource_id_attribute, Reconcile};
use crate::api::vcs::VcsConnector;
use crate::client::Result;
use crate::data::ResourceData;
use crate::names::{self, PROJECT_PREFIX, VCS_CONNECTOR_PREFIX, VCS_PROVIDER_PREFIX};
use crate::schema::{Attribute, Schema, Validator};

/// Reconciles project VCS connectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct VcsConnectorResource;

#[async_trait]
impl Reconcile for VcsConnectorResource {
    type Message = VcsConnector;

    const TYPE: &'static str = "vcs_connector";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Connects a project to a repository of a VCS provider.")
            .with_attribute(
                "project",
                parent_attribute(PROJECT_PREFIX, "The project, `projects/{id}`."),
            )
            .with_attribute("resource_id", resource_id_attribute("VCS connector"))
            .with_attribute("name", name_attribute())
            .with_attribute(
                "title",
                Attribute::required_string().with_update_path("title"),
            )
            .with_attribute(
                "vcs_provider",
                Attribute::required_string()
                    .immutable()
                    .with_validator(Validator::Prefix(format!("{}/", VCS_PROVIDER_PREFIX))),
            )
            .with_attribute(
                "repository_id",
                Attribute::required_string().immutable(),
            )
            .with_attribute(
                "repository_path",
                Attribute::required_string().immutable(),
            )
            .with_attribute(
                "repository_url",
                Attribute::required_string().immutable(),
            )
            .with_attribute(
                "repository_directory",
                Attribute::optional_computed_string().with_update_path("base_directory"),
            )
            .with_attribute(
                "repository_branch",
                Attribute::required_string().with_update_path("branch"),
            )
            .with_attribute(
                "database_group",
                Attribute::optional_string().with_update_path("database_group"),
            )
            .importable()
    }

    fn lookup_keys(&self) -> &'static [&'static str] {
        &["project", "resource_id"]
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        let project = required_str(data, "project")?;
        let project_id = names::parse_one(project, PROJECT_PREFIX)?;
        let id = required_str(data, "resource_id")?;
        names::validate_resource_id(id)?;
        Ok(Some(names::format(&[
            (PROJECT_PREFIX, project_id),
            (VCS_CONNECTOR_PREFIX, id),
        ])))
    }

    fn parent(&self, data: &ResourceData) -> Result<String> {
        Ok(required_str(data, "project")?.to_string())
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<VcsConnector> {
        Ok(VcsConnector {
            name: name.to_string(),
            title: data.get_string("title"),
            vcs_provider: data.get_string("vcs_provider"),
            external_id: data.get_string("repository_id"),
            full_path: data.get_string("repository_path"),
            web_url: data.get_string("repository_url"),
            base_directory: data.get_string("repository_directory"),
            branch: data.get_string("repository_branch"),
            database_group: data.get_string("database_group"),
            ..Default::default()
        })
    }

    fn flatten(&self, connector: &VcsConnector, data: &mut ResourceData) -> Result<()> {
        let ids = names::parse(&connector.name, &[PROJECT_PREFIX, VCS_CONNECTOR_PREFIX])?;
        data.set("project", names::format_one(PROJECT_PREFIX, ids[0]));
        data.set("resource_id", ids[1]);
        data.set("name", connector.name.as_str());
        data.set("title", connector.title.as_str());
        data.set("vcs_provider", connector.vcs_provider.as_str());
        data.set("repository_id", connector.external_id.as_str());
        data.set("repository_path", connector.full_path.as_str());
        data.set("repository_url", connector.web_url.as_str());
        data.set("repository_directory", connector.base_directory.as_str());
        data.set("repository_branch", connector.branch.as_str());
        data.set("database_group", connector.database_group.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::mask::{check_immutable, field_mask};
    use serde_json::json;
    use std::sync::Arc;

    fn declared(branch: &str, path: &str) -> serde_json::Value {
        json!({
            "project": "projects/p",
            "resource_id": "main",
            "title": "Main",
            "vcs_provider": "vcsProviders/gh",
            "repository_id": "42",
            "repository_path": path,
            "repository_url": format!("https://github.com/{}", path),
            "repository_branch": branch
        })
    }

    #[test]
    fn test_name() {
        let data = ResourceData::new(
            Arc::new(VcsConnectorResource.schema()),
            None,
            declared("main", "acme/db"),
        );
        assert_eq!(
            VcsConnectorResource.canonical_name(&data).unwrap().as_deref(),
            Some("projects/p/vcsConnectors/main")
        );
    }

    #[test]
    fn test_repository_is_immutable() {
        let schema = Arc::new(VcsConnectorResource.schema());
        let branch = ResourceData::new(
            Arc::clone(&schema),
            Some(declared("main", "acme/db")),
            declared("release", "acme/db"),
        );
        assert!(check_immutable(&branch).is_ok());
        assert_eq!(field_mask(&branch), vec!["branch"]);

        let moved = ResourceData::new(
            schema,
            Some(declared("main", "acme/db")),
            declared("main", "acme/other"),
        );
        let err = check_immutable(&moved).unwrap_err();
        assert!(err.message().contains("repository_path"));
    }
}
