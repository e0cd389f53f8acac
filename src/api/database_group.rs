//! Database groups, served over Connect.

use serde::{Deserialize, Serialize};

use super::Expr;
use crate::client::{ApiMessage, Collection, Protocol};

/// `projects/{p}/databaseGroups/{g}`.
pub static DATABASE_GROUPS: Collection = Collection {
    id_param: Some("database_group_id"),
    protocol: Protocol::Connect,
    ..Collection::rest(
        "databaseGroups",
        "DatabaseGroup",
        "DatabaseGroupService",
        "database_group",
    )
};

/// A set of databases selected by an expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseGroup {
    pub name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_expr: Option<Expr>,
    #[serde(skip_serializing)]
    pub matched_databases: Vec<MatchedDatabase>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchedDatabase {
    pub name: String,
}

impl ApiMessage for DatabaseGroup {
    fn collection() -> &'static Collection {
        &DATABASE_GROUPS
    }

    fn name(&self) -> &str {
        &self.name
    }
}
