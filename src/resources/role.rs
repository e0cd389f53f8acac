//! `bytebase_role`.

use async_trait::async_trait;

use super::{resource_id_attribute, top_level_name, Reconcile};
use crate::api::role::{Role, PERMISSION_PREFIX};
use crate::client::Result;
use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::names::{self, ROLE_PREFIX};
use crate::schema::{Attribute, AttributeFlags, Schema, Validator};

/// Reconciles custom roles. Creation upserts.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleResource;

#[async_trait]
impl Reconcile for RoleResource {
    type Message = Role;

    const TYPE: &'static str = "role";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A custom role.")
            .with_attribute("resource_id", resource_id_attribute("role"))
            .with_attribute("name", super::name_attribute())
            .with_attribute(
                "title",
                Attribute::required_string()
                    .with_validator(Validator::NonEmpty)
                    .with_update_path("title"),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_update_path("description"),
            )
            .with_attribute(
                "permissions",
                Attribute::string_set(AttributeFlags::required())
                    .with_update_path("permissions")
                    .with_description("Permissions granted by the role, each starting with `bb.`."),
            )
            .with_attribute("type", Attribute::computed_string())
            .importable()
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        top_level_name(data, ROLE_PREFIX)
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<Role> {
        let mut permissions = data.get_str_list("permissions");
        if let Some(bad) = permissions.iter().find(|p| !p.starts_with(PERMISSION_PREFIX)) {
            return Err(ProviderError::invalid(format!(
                "invalid permission {:?}: permissions must start with the {:?} prefix",
                bad, PERMISSION_PREFIX
            )));
        }
        permissions.sort();
        permissions.dedup();
        Ok(Role {
            name: name.to_string(),
            title: data.get_string("title"),
            description: data.get_string("description"),
            permissions,
            ..Default::default()
        })
    }

    fn flatten(&self, role: &Role, data: &mut ResourceData) -> Result<()> {
        data.set("resource_id", names::parse_one(&role.name, ROLE_PREFIX)?);
        data.set("name", role.name.as_str());
        data.set("title", role.title.as_str());
        data.set("description", role.description.as_str());
        data.set("permissions", role.permissions.clone());
        data.set("type", role.kind.as_str());
        Ok(())
    }
}
