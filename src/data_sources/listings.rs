//! Which collections can be listed, and how.

use super::{FilterField, Listing};
use crate::api::database::ALL_DATABASES_PARENT;
use crate::client::Result;
use crate::data::ResourceData;
use crate::filter::QueryFields;
use crate::names::PROJECT_PREFIX;
use crate::resources::database::DatabaseResource;
use crate::resources::database_group::DatabaseGroupResource;
use crate::resources::group::GroupResource;
use crate::resources::instance::InstanceResource;
use crate::resources::policy::{PolicyResource, PARENT_PATTERNS};
use crate::resources::project::ProjectResource;
use crate::resources::review_config::ReviewConfigResource;
use crate::resources::risk::RiskResource;
use crate::resources::role::RoleResource;
use crate::resources::user::UserResource;
use crate::resources::vcs_connector::VcsConnectorResource;
use crate::resources::vcs_provider::VcsProviderResource;
use crate::resources::parent_attribute;
use crate::schema::{Attribute, Validator};

fn project_parent() -> Option<(&'static str, Attribute)> {
    Some(("project", parent_attribute(PROJECT_PREFIX, "The project to list from.")))
}

impl Listing for InstanceResource {
    const PLURAL: &'static str = "instances";
    const FILTERS: &'static [FilterField] = &[
        FilterField::Query,
        FilterField::Environment,
        FilterField::Engines,
        FilterField::State,
    ];
}

impl Listing for ProjectResource {
    const PLURAL: &'static str = "projects";
    const FILTERS: &'static [FilterField] = &[FilterField::Query, FilterField::State];
}

impl Listing for DatabaseResource {
    const PLURAL: &'static str = "databases";
    const FILTERS: &'static [FilterField] = &[
        FilterField::Query,
        FilterField::Project,
        FilterField::Environment,
        FilterField::Instance,
        FilterField::Engines,
        FilterField::Labels,
        FilterField::ExcludeUnassigned,
    ];

    fn list_parent(&self, _data: &ResourceData) -> Result<String> {
        Ok(ALL_DATABASES_PARENT.to_string())
    }
}

impl Listing for DatabaseGroupResource {
    const PLURAL: &'static str = "database_groups";

    fn parent_attribute(&self) -> Option<(&'static str, Attribute)> {
        project_parent()
    }
}

impl Listing for VcsProviderResource {
    const PLURAL: &'static str = "vcs_providers";
}

impl Listing for VcsConnectorResource {
    const PLURAL: &'static str = "vcs_connectors";

    fn parent_attribute(&self) -> Option<(&'static str, Attribute)> {
        project_parent()
    }
}

impl Listing for UserResource {
    const PLURAL: &'static str = "users";
    const FILTERS: &'static [FilterField] =
        &[FilterField::Query, FilterField::UserTypes, FilterField::State];
    const QUERY_FIELDS: QueryFields = QueryFields::NameOrEmail;
}

impl Listing for GroupResource {
    const PLURAL: &'static str = "groups";
    const FILTERS: &'static [FilterField] = &[FilterField::Query];
    const QUERY_FIELDS: QueryFields = QueryFields::TitleOrEmail;
}

impl Listing for RoleResource {
    const PLURAL: &'static str = "roles";
}

impl Listing for RiskResource {
    const PLURAL: &'static str = "risks";
}

impl Listing for ReviewConfigResource {
    const PLURAL: &'static str = "review_configs";
}

impl Listing for PolicyResource {
    const PLURAL: &'static str = "policies";

    fn parent_attribute(&self) -> Option<(&'static str, Attribute)> {
        Some((
            "parent",
            Attribute::optional_string()
                .with_validator(Validator::name_pattern(&PARENT_PATTERNS))
                .with_description("Parent of the policies; empty lists workspace policies."),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::data_sources::{DataSource, List};
    use crate::testing::FakeBytebase;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_databases_list_across_instances() {
        let fake = FakeBytebase::new();
        fake.insert(
            "databases",
            json!({"name": "instances/a/databases/x", "project": "projects/p", "state": "ACTIVE"}),
        );
        fake.insert(
            "databases",
            json!({"name": "instances/b/databases/y", "project": "projects/q", "state": "ACTIVE"}),
        );
        let ctx = Context::new(fake.client());
        let source = List::new(DatabaseResource);
        let mut data = ResourceData::new(
            Arc::new(source.schema()),
            None,
            json!({"project": "projects/p"}),
        );
        source.read(&ctx, &mut data).await.unwrap();

        let call = &fake.calls()[0];
        assert_eq!(call.target, ALL_DATABASES_PARENT);
        let paging = call.paging.as_ref().unwrap();
        assert_eq!(paging.filter, r#"project == "projects/p""#);
        assert_eq!(data.state().unwrap()["databases"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_nested_list_uses_project_parent() {
        let fake = FakeBytebase::new();
        fake.insert(
            "vcsConnectors",
            json!({"name": "projects/p/vcsConnectors/c", "title": "c", "vcsProvider": "vcsProviders/gh"}),
        );
        fake.insert(
            "vcsConnectors",
            json!({"name": "projects/other/vcsConnectors/d", "title": "d", "vcsProvider": "vcsProviders/gh"}),
        );
        let ctx = Context::new(fake.client());
        let source = List::new(VcsConnectorResource);
        let mut data = ResourceData::new(
            Arc::new(source.schema()),
            None,
            json!({"project": "projects/p"}),
        );
        source.read(&ctx, &mut data).await.unwrap();
        let state = data.state().unwrap();
        let connectors = state["vcs_connectors"].as_array().unwrap();
        assert_eq!(connectors.len(), 1);
        assert_eq!(connectors[0]["project"], "projects/p");
        assert_eq!(connectors[0]["resource_id"], "c");
    }

    #[test]
    fn test_user_query_matches_email() {
        let source = List::new(UserResource);
        let data = ResourceData::new(
            Arc::new(source.schema()),
            None,
            json!({"query": "Ada", "user_types": ["SERVICE_ACCOUNT"], "state": "DELETED"}),
        );
        let filter = source.filter(&data).unwrap();
        assert!(filter.show_deleted());
        assert_eq!(
            filter.compile(),
            r#"(name.matches("ada") || email.matches("ada")) && state == "DELETED" && user_type in ["SERVICE_ACCOUNT"]"#
        );
    }
}
