//! Risks.

use serde::{Deserialize, Serialize};

use super::Expr;
use crate::client::{ApiMessage, Collection};

/// `risks/{uid}`; the server assigns the uid.
pub static RISKS: Collection = Collection::rest("risks", "Risk", "RiskService", "risk");

/// A risk rule: a condition over changes of one source and the level it raises.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Risk {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    pub title: String,
    pub level: i64,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expr>,
}

impl ApiMessage for Risk {
    fn collection() -> &'static Collection {
        &RISKS
    }

    fn name(&self) -> &str {
        &self.name
    }
}
