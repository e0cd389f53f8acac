//! Policies attached to the workspace, environments, projects or databases.
//!
//! A policy is keyed by its parent and type; its name is
//! `{parent}/policies/{type}` with the type lowercased. The payload is a
//! oneof flattened into the policy object.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Expr;
use crate::client::{ApiMessage, Collection};
use crate::error::ProviderError;
use crate::names::POLICY_PREFIX;

/// `{parent}/policies/{type}`. Updates upsert.
pub static POLICIES: Collection = Collection {
    allow_missing: true,
    ..Collection::rest("policies", "Policy", "OrgPolicyService", "policy")
};

/// Tag key binding a review config to an environment or project.
pub const REVIEW_CONFIG_TAG: &str = "bb.tag.review_config";

/// Policy types managed by this provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyType {
    MaskingException,
    MaskingRule,
    DisableCopyData,
    DataSourceQuery,
    RolloutPolicy,
    Tag,
}

impl PolicyType {
    /// Every managed type.
    pub const ALL: [PolicyType; 6] = [
        Self::MaskingException,
        Self::MaskingRule,
        Self::DisableCopyData,
        Self::DataSourceQuery,
        Self::RolloutPolicy,
        Self::Tag,
    ];

    /// Wire enum value, e.g. `MASKING_EXCEPTION`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaskingException => "MASKING_EXCEPTION",
            Self::MaskingRule => "MASKING_RULE",
            Self::DisableCopyData => "DISABLE_COPY_DATA",
            Self::DataSourceQuery => "DATA_SOURCE_QUERY",
            Self::RolloutPolicy => "ROLLOUT_POLICY",
            Self::Tag => "TAG",
        }
    }

    /// Parse the wire enum value.
    pub fn parse(value: &str) -> Result<Self, ProviderError> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == value)
            .ok_or_else(|| ProviderError::invalid(format!("unsupported policy type {:?}", value)))
    }

    /// Name segment, e.g. `masking_exception`.
    pub fn segment(self) -> String {
        self.as_str().to_lowercase()
    }

    /// Parse a name segment.
    pub fn from_segment(segment: &str) -> Result<Self, ProviderError> {
        Self::parse(&segment.to_uppercase())
    }

    /// Policy name under `parent`; an empty parent is the workspace.
    pub fn name(self, parent: &str) -> String {
        if parent.is_empty() {
            format!("{}/{}", POLICY_PREFIX, self.segment())
        } else {
            format!("{}/{}/{}", parent, POLICY_PREFIX, self.segment())
        }
    }
}

/// A policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Policy {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    pub inherit_from_parent: bool,
    pub enforce: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
    #[serde(flatten)]
    pub payload: Option<PolicyPayload>,
}

/// The oneof payload of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyPayload {
    MaskingExceptionPolicy(MaskingExceptionPolicy),
    MaskingRulePolicy(MaskingRulePolicy),
    DisableCopyDataPolicy(DisableCopyDataPolicy),
    DataSourceQueryPolicy(DataSourceQueryPolicy),
    RolloutPolicy(RolloutPolicy),
    TagPolicy(TagPolicy),
}

impl PolicyPayload {
    /// The policy type carrying this payload.
    pub fn policy_type(&self) -> PolicyType {
        match self {
            Self::MaskingExceptionPolicy(_) => PolicyType::MaskingException,
            Self::MaskingRulePolicy(_) => PolicyType::MaskingRule,
            Self::DisableCopyDataPolicy(_) => PolicyType::DisableCopyData,
            Self::DataSourceQueryPolicy(_) => PolicyType::DataSourceQuery,
            Self::RolloutPolicy(_) => PolicyType::RolloutPolicy,
            Self::TagPolicy(_) => PolicyType::Tag,
        }
    }

    /// Field-mask path of the payload.
    pub fn update_path(&self) -> &'static str {
        match self {
            Self::MaskingExceptionPolicy(_) => "masking_exception_policy",
            Self::MaskingRulePolicy(_) => "masking_rule_policy",
            Self::DisableCopyDataPolicy(_) => "disable_copy_data_policy",
            Self::DataSourceQueryPolicy(_) => "data_source_query_policy",
            Self::RolloutPolicy(_) => "rollout_policy",
            Self::TagPolicy(_) => "tag_policy",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaskingExceptionPolicy {
    pub masking_exceptions: Vec<MaskingException>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaskingException {
    pub member: String,
    pub action: String,
    pub condition: Expr,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaskingRulePolicy {
    pub rules: Vec<MaskingRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaskingRule {
    pub id: String,
    pub condition: Expr,
    pub semantic_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisableCopyDataPolicy {
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataSourceQueryPolicy {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub admin_data_source_restriction: String,
    pub disallow_ddl: bool,
    pub disallow_dml: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RolloutPolicy {
    pub automatic: bool,
    pub roles: Vec<String>,
    pub issue_roles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TagPolicy {
    pub tags: BTreeMap<String, String>,
}

impl Policy {
    /// A policy named after its parent and payload type.
    pub fn new(parent: &str, payload: PolicyPayload) -> Self {
        let kind = payload.policy_type();
        Self {
            name: kind.name(parent),
            kind: kind.as_str().to_string(),
            enforce: true,
            payload: Some(payload),
            ..Default::default()
        }
    }

    /// Tag policy attaching `review_config` to `parent`.
    pub fn review_config_tag(parent: &str, review_config: &str) -> Self {
        let tags = BTreeMap::from([(REVIEW_CONFIG_TAG.to_string(), review_config.to_string())]);
        Self::new(parent, PolicyPayload::TagPolicy(TagPolicy { tags }))
    }
}

impl ApiMessage for Policy {
    fn collection() -> &'static Collection {
        &POLICIES
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_is_flattened() {
        let policy = Policy::review_config_tag("environments/test", "reviewConfigs/basic");
        let value = serde_json::to_value(&policy).unwrap();
        assert_eq!(value["name"], "environments/test/policies/tag");
        assert_eq!(value["type"], "TAG");
        assert_eq!(
            value["tagPolicy"],
            json!({"tags": {"bb.tag.review_config": "reviewConfigs/basic"}})
        );
    }

    #[test]
    fn test_parse_payload_among_other_fields() {
        let policy: Policy = serde_json::from_value(json!({
            "name": "projects/p/policies/disable_copy_data",
            "type": "DISABLE_COPY_DATA",
            "updateTime": "2024-01-01T00:00:00Z",
            "disableCopyDataPolicy": {"active": true}
        }))
        .unwrap();
        assert_eq!(
            policy.payload,
            Some(PolicyPayload::DisableCopyDataPolicy(DisableCopyDataPolicy { active: true }))
        );

        let empty: Policy = serde_json::from_value(json!({"name": "projects/p/policies/tag"})).unwrap();
        assert!(empty.payload.is_none());
    }

    #[test]
    fn test_policy_type_segments() {
        assert_eq!(PolicyType::MaskingException.segment(), "masking_exception");
        assert_eq!(
            PolicyType::from_segment("rollout_policy").unwrap(),
            PolicyType::RolloutPolicy
        );
        assert!(PolicyType::parse("BACKUP_PLAN").is_err());
        assert_eq!(PolicyType::Tag.name("projects/p"), "projects/p/policies/tag");
        assert_eq!(PolicyType::MaskingRule.name(""), "policies/masking_rule");
    }
}
