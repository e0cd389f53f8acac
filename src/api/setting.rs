//! Workspace settings.
//!
//! A setting holds one of several payload shapes. The payload is a oneof
//! flattened into `value`, so field-mask paths read
//! `value.workspace_profile_setting_value.external_url`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Expr;
use crate::client::{ApiMessage, Collection};
use crate::error::ProviderError;
use crate::names::SETTING_PREFIX;

/// `settings/{NAME}`. Updates upsert.
pub static SETTINGS: Collection = Collection {
    allow_missing: true,
    ..Collection::rest("settings", "Setting", "SettingService", "setting")
};

/// The settings this provider manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettingName {
    WorkspaceApproval,
    WorkspaceProfile,
    DataClassification,
    SemanticTypes,
    Environment,
}

impl SettingName {
    /// Every accepted name.
    pub const ALL: [SettingName; 5] = [
        Self::WorkspaceApproval,
        Self::WorkspaceProfile,
        Self::DataClassification,
        Self::SemanticTypes,
        Self::Environment,
    ];

    /// Enum spelling, e.g. `WORKSPACE_PROFILE`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WorkspaceApproval => "WORKSPACE_APPROVAL",
            Self::WorkspaceProfile => "WORKSPACE_PROFILE",
            Self::DataClassification => "DATA_CLASSIFICATION",
            Self::SemanticTypes => "SEMANTIC_TYPES",
            Self::Environment => "ENVIRONMENT",
        }
    }

    /// Parse a setting name; anything outside the enumeration is rejected.
    pub fn parse(value: &str) -> Result<Self, ProviderError> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str() == value)
            .ok_or_else(|| {
                ProviderError::invalid(format!(
                    "unsupported setting {:?}, must be one of {:?}",
                    value,
                    Self::ALL.map(Self::as_str)
                ))
            })
    }

    /// Canonical resource name.
    pub fn resource_name(self) -> String {
        format!("{}/{}", SETTING_PREFIX, self.as_str())
    }
}

/// A setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Setting {
    pub name: String,
    pub value: SettingValue,
}

/// Wrapper of the value oneof.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingValue {
    #[serde(flatten)]
    pub value: Option<SettingPayload>,
}

/// The value oneof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingPayload {
    WorkspaceApprovalSettingValue(WorkspaceApprovalSetting),
    WorkspaceProfileSettingValue(WorkspaceProfileSetting),
    DataClassificationSettingValue(DataClassificationSetting),
    SemanticTypeSettingValue(SemanticTypeSetting),
    EnvironmentSetting(EnvironmentSetting),
}

impl SettingPayload {
    /// Field-mask path of the payload as a whole.
    pub fn update_path(&self) -> &'static str {
        match self {
            Self::WorkspaceApprovalSettingValue(_) => "value.workspace_approval_setting_value",
            Self::WorkspaceProfileSettingValue(_) => "value.workspace_profile_setting_value",
            Self::DataClassificationSettingValue(_) => "value.data_classification_setting_value",
            Self::SemanticTypeSettingValue(_) => "value.semantic_type_setting_value",
            Self::EnvironmentSetting(_) => "value.environment_setting",
        }
    }
}

// =============================================================================
// Approval flow
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceApprovalSetting {
    pub rules: Vec<ApprovalRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalRule {
    pub template: ApprovalTemplate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalTemplate {
    pub title: String,
    pub description: String,
    pub flow: ApprovalFlow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalFlow {
    pub steps: Vec<ApprovalStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalStep {
    #[serde(rename = "type")]
    pub kind: String,
    pub nodes: Vec<ApprovalNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
}

// =============================================================================
// Workspace profile
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceProfileSetting {
    pub external_url: String,
    pub disallow_signup: bool,
    pub disallow_password_signin: bool,
    pub require_2fa: bool,
    /// Duration in protobuf JSON form, e.g. `"3600s"`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token_duration: String,
    pub domains: Vec<String>,
    pub enforce_identity_domain: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub database_change_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announcement: Option<Announcement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Announcement {
    pub level: String,
    pub text: String,
    pub link: String,
}

// =============================================================================
// Data classification
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataClassificationSetting {
    pub configs: Vec<ClassificationConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassificationConfig {
    pub id: String,
    pub title: String,
    pub levels: Vec<ClassificationLevel>,
    pub classification: BTreeMap<String, Classification>,
    pub classification_from_config: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassificationLevel {
    pub id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Classification {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub level_id: String,
}

// =============================================================================
// Semantic types
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemanticTypeSetting {
    pub types: Vec<SemanticType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemanticType {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<Algorithm>,
}

/// Wrapper of the masking algorithm oneof.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Algorithm {
    #[serde(flatten)]
    pub mask: Option<MaskAlgorithm>,
}

/// The masking algorithm oneof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MaskAlgorithm {
    FullMask(FullMask),
    RangeMask(RangeMask),
    Md5Mask(Md5Mask),
    InnerOuterMask(InnerOuterMask),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FullMask {
    pub substitution: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RangeMask {
    pub slices: Vec<RangeSlice>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RangeSlice {
    pub start: i64,
    pub end: i64,
    pub substitution: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Md5Mask {
    pub salt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InnerOuterMask {
    pub prefix_len: i64,
    pub suffix_len: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub substitution: String,
}

// =============================================================================
// Environments
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentSetting {
    pub environments: Vec<Environment>,
}

/// One environment. Order within the setting is the promotion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Environment {
    pub name: String,
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Tag marking an environment as protected.
pub const PROTECTED_TAG: &str = "protected";

impl Environment {
    /// Whether the environment carries the protected tag.
    pub fn is_protected(&self) -> bool {
        self.tags.get(PROTECTED_TAG).map(String::as_str) == Some(PROTECTED_TAG)
    }
}

impl Setting {
    /// A setting carrying `payload`.
    pub fn new(name: SettingName, payload: SettingPayload) -> Self {
        Self {
            name: name.resource_name(),
            value: SettingValue {
                value: Some(payload),
            },
        }
    }

    /// Environments of an `ENVIRONMENT` setting, empty for any other payload.
    pub fn environments(&self) -> &[Environment] {
        match &self.value.value {
            Some(SettingPayload::EnvironmentSetting(setting)) => &setting.environments,
            _ => &[],
        }
    }
}

impl ApiMessage for Setting {
    fn collection() -> &'static Collection {
        &SETTINGS
    }

    fn name(&self) -> &str {
        &self.name
    }
}
