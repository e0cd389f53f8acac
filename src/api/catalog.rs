//! Database catalogs: per-column classification and semantic types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::client::{ApiMessage, Collection};

/// `instances/{i}/databases/{d}/catalog`. Updates replace the whole
/// catalog; the request carries no field mask.
pub static CATALOGS: Collection = Collection {
    field_mask: false,
    ..Collection::rest("catalog", "DatabaseCatalog", "DatabaseCatalogService", "catalog")
};

/// Catalog of one database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseCatalog {
    pub name: String,
    pub schemas: Vec<SchemaCatalog>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaCatalog {
    pub name: String,
    pub tables: Vec<TableCatalog>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableCatalog {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub classification: String,
    pub columns: ColumnCatalogs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnCatalogs {
    pub columns: Vec<ColumnCatalog>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnCatalog {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub semantic_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub classification: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ApiMessage for DatabaseCatalog {
    fn collection() -> &'static Collection {
        &CATALOGS
    }

    fn name(&self) -> &str {
        &self.name
    }
}
