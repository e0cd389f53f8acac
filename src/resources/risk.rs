//! `bytebase_risk`. The server assigns the name on creation.

use async_trait::async_trait;

use super::Reconcile;
use crate::api::risk::Risk;
use crate::api::Expr;
use crate::client::Result;
use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::names::{self, RISK_PREFIX};
use crate::schema::{Attribute, DiffSuppress, Schema, Validator};

/// Risk sources.
pub const SOURCES: [&str; 6] = [
    "DDL",
    "DML",
    "CREATE_DATABASE",
    "REQUEST_QUERY",
    "REQUEST_EXPORT",
    "DATA_EXPORT",
];

/// Accepted levels: low, moderate, high.
pub const LEVELS: [i64; 3] = [100, 200, 300];

/// Reconciles risk rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct RiskResource;

#[async_trait]
impl Reconcile for RiskResource {
    type Message = Risk;

    const TYPE: &'static str = "risk";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A risk rule raising the risk level of matching changes.")
            .with_attribute(
                "name",
                Attribute::computed_string()
                    .with_description("The risk name, `risks/{uid}`, assigned by the server."),
            )
            .with_attribute(
                "source",
                Attribute::required_string()
                    .with_validator(Validator::one_of(&SOURCES))
                    .with_update_path("source"),
            )
            .with_attribute(
                "title",
                Attribute::required_string().with_update_path("title"),
            )
            .with_attribute(
                "level",
                Attribute::required_int64()
                    .with_validator(Validator::IntRange(100, 300))
                    .with_update_path("level")
                    .with_description("100 (low), 200 (moderate) or 300 (high)."),
            )
            .with_attribute(
                "active",
                Attribute::optional_computed_bool().with_update_path("active"),
            )
            .with_attribute(
                "condition",
                Attribute::required_string()
                    .with_diff_suppress(DiffSuppress::ConditionExpression)
                    .with_update_path("condition"),
            )
            .importable()
    }

    fn lookup_keys(&self) -> &'static [&'static str] {
        &["name"]
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        match data.get_str("name") {
            Some(name) => {
                names::parse_one(name, RISK_PREFIX)?;
                Ok(Some(name.to_string()))
            },
            None => Ok(None),
        }
    }

    fn resource_id(&self, _data: &ResourceData) -> Option<String> {
        None
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<Risk> {
        let level = data.get_i64("level").unwrap_or_default();
        if !LEVELS.contains(&level) {
            return Err(ProviderError::invalid(format!(
                "risk level must be one of {:?}, got {}",
                LEVELS, level
            )));
        }
        Ok(Risk {
            name: name.to_string(),
            source: data.get_string("source"),
            title: data.get_string("title"),
            level,
            active: data.get_bool_opt("active").unwrap_or(true),
            condition: Expr::non_empty(data.get_string("condition")),
        })
    }

    fn flatten(&self, risk: &Risk, data: &mut ResourceData) -> Result<()> {
        names::parse_one(&risk.name, RISK_PREFIX)?;
        data.set("name", risk.name.as_str());
        data.set("source", risk.source.as_str());
        data.set("title", risk.title.as_str());
        data.set("level", risk.level);
        data.set("active", risk.active);
        let expression = risk
            .condition
            .as_ref()
            .map(|c| c.expression.as_str())
            .unwrap_or_default();
        data.set("condition", expression);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn data(desired: serde_json::Value) -> ResourceData {
        ResourceData::new(Arc::new(RiskResource.schema()), None, desired)
    }

    #[test]
    fn test_name_is_server_assigned() {
        let input = data(json!({"source": "DDL", "title": "t", "level": 300, "condition": "true"}));
        assert_eq!(RiskResource.canonical_name(&input).unwrap(), None);

        let lookup = data(json!({"name": "risks/101"}));
        assert_eq!(
            RiskResource.canonical_name(&lookup).unwrap().as_deref(),
            Some("risks/101")
        );
    }

    #[test]
    fn test_level_must_be_known() {
        let input = data(json!({"source": "DDL", "title": "t", "level": 250, "condition": "true"}));
        assert!(RiskResource.expand(&input, "").is_err());

        let input = data(json!({
            "source": "DML",
            "title": "Prod writes",
            "level": 300,
            "condition": "environment_id == \"prod\""
        }));
        let risk = RiskResource.expand(&input, "").unwrap();
        assert!(risk.active);
        assert_eq!(risk.condition.unwrap().expression, "environment_id == \"prod\"");
    }
}
