//! VCS providers and project connectors.

use serde::{Deserialize, Serialize};

use crate::client::{ApiMessage, Collection};

/// `vcsProviders/{id}`.
pub static VCS_PROVIDERS: Collection = Collection {
    id_param: Some("vcs_provider_id"),
    list_field: "vcsProviders",
    ..Collection::rest("vcsProviders", "VCSProvider", "VCSProviderService", "vcs_provider")
};

/// `projects/{p}/vcsConnectors/{id}`.
pub static VCS_CONNECTORS: Collection = Collection {
    id_param: Some("vcs_connector_id"),
    list_field: "vcsConnectors",
    ..Collection::rest(
        "vcsConnectors",
        "VCSConnector",
        "VCSConnectorService",
        "vcs_connector",
    )
};

/// A GitHub, GitLab, Bitbucket or Azure DevOps endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VcsProvider {
    pub name: String,
    pub title: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_token: String,
}

/// A repository branch linked to a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VcsConnector {
    pub name: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub creator: String,
    pub vcs_provider: String,
    pub external_id: String,
    pub base_directory: String,
    pub branch: String,
    pub full_path: String,
    pub web_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub database_group: String,
}

impl ApiMessage for VcsProvider {
    fn collection() -> &'static Collection {
        &VCS_PROVIDERS
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl ApiMessage for VcsConnector {
    fn collection() -> &'static Collection {
        &VCS_CONNECTORS
    }

    fn name(&self) -> &str {
        &self.name
    }
}
