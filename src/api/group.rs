//! User groups.

use serde::{Deserialize, Serialize};

use crate::client::{ApiMessage, Collection};

/// `groups/{email}`.
pub static GROUPS: Collection = Collection {
    id_param: Some("group_email"),
    ..Collection::rest("groups", "Group", "GroupService", "group")
};

/// A group of users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Group {
    pub name: String,
    pub title: String,
    pub description: String,
    pub members: Vec<GroupMember>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
}

/// One member and their role within the group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupMember {
    pub member: String,
    pub role: String,
}

impl ApiMessage for Group {
    fn collection() -> &'static Collection {
        &GROUPS
    }

    fn name(&self) -> &str {
        &self.name
    }
}
