//! Custom roles.

use serde::{Deserialize, Serialize};

use crate::client::{ApiMessage, Collection};

/// `roles/{id}`. Updates upsert.
pub static ROLES: Collection = Collection {
    id_param: Some("role_id"),
    allow_missing: true,
    ..Collection::rest("roles", "Role", "RoleService", "role")
};

/// Prefix every permission carries.
pub const PERMISSION_PREFIX: &str = "bb.";

/// A role: a named set of permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Role {
    pub name: String,
    pub title: String,
    pub description: String,
    pub permissions: Vec<String>,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl ApiMessage for Role {
    fn collection() -> &'static Collection {
        &ROLES
    }

    fn name(&self) -> &str {
        &self.name
    }
}
