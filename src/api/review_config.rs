//! SQL review configurations.

use serde::{Deserialize, Serialize};

use crate::client::{ApiMessage, Collection};

/// `reviewConfigs/{id}`. Updates upsert.
pub static REVIEW_CONFIGS: Collection = Collection {
    allow_missing: true,
    list_field: "reviewConfigs",
    ..Collection::rest(
        "reviewConfigs",
        "ReviewConfig",
        "ReviewConfigService",
        "review_config",
    )
};

/// A named set of SQL review rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewConfig {
    pub name: String,
    pub title: String,
    pub enabled: bool,
    pub rules: Vec<ReviewRule>,
    /// Environments and projects the config is attached to.
    #[serde(skip_serializing)]
    pub resources: Vec<String>,
}

/// One SQL review rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewRule {
    #[serde(rename = "type")]
    pub kind: String,
    pub level: String,
    pub engine: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub payload: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl ApiMessage for ReviewConfig {
    fn collection() -> &'static Collection {
        &REVIEW_CONFIGS
    }

    fn name(&self) -> &str {
        &self.name
    }
}
