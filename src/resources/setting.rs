//! `bytebase_setting`.
//!
//! Settings always exist, so creation upserts and destroy only forgets
//! the handle. The declared block must match the setting name. The
//! workspace profile is patched field by field; every other payload is
//! replaced as a whole.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, CreateMode, Reconcile};
use crate::api::setting::{
    Algorithm, Announcement, ApprovalFlow, ApprovalNode, ApprovalRule, ApprovalStep,
    ApprovalTemplate, Classification, ClassificationConfig, ClassificationLevel,
    DataClassificationSetting, Environment, EnvironmentSetting, SemanticType, SemanticTypeSetting,
    Setting, SettingName, SettingPayload, WorkspaceApprovalSetting, WorkspaceProfileSetting,
    PROTECTED_TAG,
};
use crate::api::Expr;
use crate::client::Result;
use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::mapper::{
    algorithm_from_block, algorithm_to_block, block_of, blocks_of, bool_of, duration_seconds,
    duration_string, one_of, single_block, str_list_of, str_of, ALGORITHM_BRANCHES,
};
use crate::names::{self, SETTING_PREFIX};
use crate::schema::{
    Attribute, AttributeFlags, Block, DiffSuppress, NestedBlock, Schema, Validator,
};

/// Payload blocks, one per setting name.
pub const SETTING_BLOCKS: [&str; 5] = [
    "approval_flow",
    "workspace_profile",
    "classification",
    "semantic_types",
    "environment_setting",
];

const PROFILE_PATH: &str = "value.workspace_profile_setting_value";

/// Node type of approval flow nodes.
const NODE_TYPE: &str = "ANY_IN_GROUP";

/// Reconciles workspace settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct SettingResource;

fn setting_block(name: SettingName) -> &'static str {
    match name {
        SettingName::WorkspaceApproval => "approval_flow",
        SettingName::WorkspaceProfile => "workspace_profile",
        SettingName::DataClassification => "classification",
        SettingName::SemanticTypes => "semantic_types",
        SettingName::Environment => "environment_setting",
    }
}

fn payload_name(payload: &SettingPayload) -> SettingName {
    match payload {
        SettingPayload::WorkspaceApprovalSettingValue(_) => SettingName::WorkspaceApproval,
        SettingPayload::WorkspaceProfileSettingValue(_) => SettingName::WorkspaceProfile,
        SettingPayload::DataClassificationSettingValue(_) => SettingName::DataClassification,
        SettingPayload::SemanticTypeSettingValue(_) => SettingName::SemanticTypes,
        SettingPayload::EnvironmentSetting(_) => SettingName::Environment,
    }
}

// =============================================================================
// Schema
// =============================================================================

fn approval_block() -> NestedBlock {
    let node = Block::new()
        .with_attribute("type", Attribute::optional_computed_string())
        .with_attribute(
            "role",
            Attribute::required_string()
                .with_validator(Validator::Prefix("roles/".to_string()))
                .with_description("The approver role, e.g. `roles/projectOwner`."),
        );
    let step = Block::new()
        .with_attribute(
            "type",
            Attribute::optional_computed_string().with_validator(Validator::one_of(&["AND", "OR"])),
        )
        .with_block("nodes", NestedBlock::list(node).with_min_items(1));
    let rule = Block::new()
        .with_attribute("title", Attribute::required_string().with_validator(Validator::NonEmpty))
        .with_attribute("description", Attribute::optional_string())
        .with_attribute(
            "condition",
            Attribute::optional_string().with_diff_suppress(DiffSuppress::ConditionExpression),
        )
        .with_block("steps", NestedBlock::list(step).with_min_items(1));
    NestedBlock::single(Block::new().with_block("rules", NestedBlock::list(rule)))
        .with_update_path("value.workspace_approval_setting_value")
}

fn profile_field(field: &str, attr: Attribute) -> Attribute {
    attr.with_update_path(format!("{}.{}", PROFILE_PATH, field))
}

fn profile_block() -> NestedBlock {
    let announcement = Block::new()
        .with_attribute(
            "level",
            Attribute::optional_string().with_validator(Validator::one_of(&["INFO", "WARNING", "CRITICAL"])),
        )
        .with_attribute("text", Attribute::optional_string())
        .with_attribute("link", Attribute::optional_string());
    let block = Block::new()
        .with_attribute(
            "external_url",
            profile_field("external_url", Attribute::optional_computed_string()),
        )
        .with_attribute(
            "disallow_signup",
            profile_field("disallow_signup", Attribute::optional_computed_bool()),
        )
        .with_attribute(
            "disallow_password_signin",
            profile_field("disallow_password_signin", Attribute::optional_computed_bool()),
        )
        .with_attribute(
            "require_2fa",
            profile_field("require_2fa", Attribute::optional_computed_bool()),
        )
        .with_attribute(
            "token_duration_in_seconds",
            profile_field(
                "token_duration",
                Attribute::optional_computed_int64().with_validator(Validator::IntRange(0, i64::MAX)),
            ),
        )
        .with_attribute(
            "domains",
            profile_field(
                "domains",
                Attribute::string_list(AttributeFlags::optional_computed()),
            ),
        )
        .with_attribute(
            "enforce_identity_domain",
            profile_field("enforce_identity_domain", Attribute::optional_computed_bool()),
        )
        .with_attribute(
            "database_change_mode",
            profile_field(
                "database_change_mode",
                Attribute::optional_computed_string()
                    .with_validator(Validator::one_of(&["PIPELINE", "EDITOR"])),
            ),
        )
        .with_block(
            "announcement",
            NestedBlock::single(announcement)
                .with_max_items(1)
                .with_update_path(format!("{}.announcement", PROFILE_PATH)),
        );
    NestedBlock::single(block)
}

fn classification_block() -> NestedBlock {
    let level = Block::new()
        .with_attribute("id", Attribute::required_string().with_validator(Validator::NonEmpty))
        .with_attribute("title", Attribute::required_string())
        .with_attribute("description", Attribute::optional_string());
    let classification = Block::new()
        .with_attribute(
            "id",
            Attribute::required_string()
                .with_validator(Validator::NonEmpty)
                .with_description("Dotted id such as `1-1`."),
        )
        .with_attribute("title", Attribute::required_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("level", Attribute::optional_string());
    NestedBlock::single(
        Block::new()
            .with_attribute("id", Attribute::required_string().with_validator(Validator::NonEmpty))
            .with_attribute("title", Attribute::optional_string())
            .with_attribute("classification_from_config", Attribute::optional_bool())
            .with_block("levels", NestedBlock::list(level))
            .with_block("classifications", NestedBlock::set(classification)),
    )
    .with_update_path("value.data_classification_setting_value")
}

fn algorithm_block() -> Block {
    let slice = Block::new()
        .with_attribute("start", Attribute::required_int64())
        .with_attribute("end", Attribute::required_int64())
        .with_attribute("substitution", Attribute::optional_string());
    let branches = [
        Block::new().with_attribute("substitution", Attribute::optional_string()),
        Block::new().with_block("slices", NestedBlock::list(slice).with_min_items(1)),
        Block::new().with_attribute("salt", Attribute::optional_string()),
        Block::new()
            .with_attribute("prefix_len", Attribute::optional_int64())
            .with_attribute("suffix_len", Attribute::optional_int64())
            .with_attribute(
                "type",
                Attribute::optional_string().with_validator(Validator::one_of(&["INNER", "OUTER"])),
            )
            .with_attribute("substitution", Attribute::optional_string()),
    ];
    ALGORITHM_BRANCHES
        .into_iter()
        .zip(branches)
        .fold(Block::new(), |block, (name, branch)| {
            block.with_block(name, NestedBlock::single(branch).with_max_items(1))
        })
}

fn semantic_types_block() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute("id", Attribute::required_string().with_validator(Validator::NonEmpty))
            .with_attribute("title", Attribute::optional_string())
            .with_attribute("description", Attribute::optional_string())
            .with_block("algorithm", NestedBlock::single(algorithm_block()).with_max_items(1)),
    )
    .with_update_path("value.semantic_type_setting_value")
}

fn environment_setting_block() -> NestedBlock {
    let environment = Block::new()
        .with_attribute("id", Attribute::required_string().with_validator(Validator::ResourceId))
        .with_attribute("title", Attribute::required_string())
        .with_attribute("color", Attribute::optional_string())
        .with_attribute("protected", Attribute::optional_bool());
    NestedBlock::single(
        Block::new().with_block("environment", NestedBlock::list(environment).with_min_items(1)),
    )
    .with_update_path("value.environment_setting")
}

// =============================================================================
// Expand
// =============================================================================

fn expand_approval(block: &Value) -> WorkspaceApprovalSetting {
    let rules = blocks_of(block, "rules")
        .into_iter()
        .map(|rule| {
            let steps = blocks_of(rule, "steps")
                .into_iter()
                .map(|step| ApprovalStep {
                    kind: Some(str_of(step, "type"))
                        .filter(|s| !s.is_empty())
                        .unwrap_or_else(|| "AND".to_string()),
                    nodes: blocks_of(step, "nodes")
                        .into_iter()
                        .map(|node| ApprovalNode {
                            kind: Some(str_of(node, "type"))
                                .filter(|s| !s.is_empty())
                                .unwrap_or_else(|| NODE_TYPE.to_string()),
                            role: str_of(node, "role"),
                        })
                        .collect(),
                })
                .collect();
            ApprovalRule {
                template: ApprovalTemplate {
                    title: str_of(rule, "title"),
                    description: str_of(rule, "description"),
                    flow: ApprovalFlow { steps },
                },
                condition: Expr::non_empty(str_of(rule, "condition")),
            }
        })
        .collect();
    WorkspaceApprovalSetting { rules }
}

fn expand_profile(block: &Value) -> WorkspaceProfileSetting {
    let seconds = crate::mapper::i64_of(block, "token_duration_in_seconds").unwrap_or_default();
    WorkspaceProfileSetting {
        external_url: str_of(block, "external_url"),
        disallow_signup: bool_of(block, "disallow_signup"),
        disallow_password_signin: bool_of(block, "disallow_password_signin"),
        require_2fa: bool_of(block, "require_2fa"),
        token_duration: duration_string(seconds),
        domains: str_list_of(block, "domains"),
        enforce_identity_domain: bool_of(block, "enforce_identity_domain"),
        database_change_mode: str_of(block, "database_change_mode"),
        announcement: block_of(block, "announcement").map(|a| Announcement {
            level: str_of(a, "level"),
            text: str_of(a, "text"),
            link: str_of(a, "link"),
        }),
    }
}

fn expand_classification(block: &Value) -> Result<DataClassificationSetting> {
    let levels: Vec<ClassificationLevel> = blocks_of(block, "levels")
        .into_iter()
        .map(|level| ClassificationLevel {
            id: str_of(level, "id"),
            title: str_of(level, "title"),
            description: str_of(level, "description"),
        })
        .collect();
    let mut classification = BTreeMap::new();
    for element in blocks_of(block, "classifications") {
        let id = str_of(element, "id");
        let level_id = str_of(element, "level");
        if !level_id.is_empty() && !levels.iter().any(|l| l.id == level_id) {
            return Err(ProviderError::invalid(format!(
                "classification {} references unknown level {:?}",
                id, level_id
            )));
        }
        let entry = Classification {
            id: id.clone(),
            title: str_of(element, "title"),
            description: str_of(element, "description"),
            level_id,
        };
        if classification.insert(id.clone(), entry).is_some() {
            return Err(ProviderError::invalid(format!("duplicate classification id {:?}", id)));
        }
    }
    Ok(DataClassificationSetting {
        configs: vec![ClassificationConfig {
            id: str_of(block, "id"),
            title: str_of(block, "title"),
            levels,
            classification,
            classification_from_config: bool_of(block, "classification_from_config"),
        }],
    })
}

fn expand_semantic_types(elements: Vec<&Value>) -> Result<SemanticTypeSetting> {
    let types = elements
        .into_iter()
        .map(|element| {
            let algorithm = block_of(element, "algorithm")
                .map(algorithm_from_block)
                .transpose()?
                .map(|mask| Algorithm { mask: Some(mask) });
            Ok(SemanticType {
                id: str_of(element, "id"),
                title: str_of(element, "title"),
                description: str_of(element, "description"),
                algorithm,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SemanticTypeSetting { types })
}

fn expand_environments(block: &Value) -> Result<EnvironmentSetting> {
    let mut environments: Vec<Environment> = Vec::new();
    for element in blocks_of(block, "environment") {
        let id = str_of(element, "id");
        names::validate_resource_id(&id)?;
        if environments.iter().any(|e| e.id == id) {
            return Err(ProviderError::invalid(format!("duplicate environment id {:?}", id)));
        }
        environments.push(environment(&id, element));
    }
    Ok(EnvironmentSetting { environments })
}

/// An environment from a block element carrying title, color and the
/// protected flag.
pub(crate) fn environment(id: &str, element: &Value) -> Environment {
    let mut tags = BTreeMap::new();
    if bool_of(element, "protected") {
        tags.insert(PROTECTED_TAG.to_string(), PROTECTED_TAG.to_string());
    }
    Environment {
        name: names::format_one(names::ENVIRONMENT_PREFIX, id),
        id: id.to_string(),
        title: str_of(element, "title"),
        color: str_of(element, "color"),
        tags,
    }
}

// =============================================================================
// Flatten
// =============================================================================

fn flatten_approval(setting: &WorkspaceApprovalSetting) -> Value {
    let rules: Vec<Value> = setting
        .rules
        .iter()
        .map(|rule| {
            let steps: Vec<Value> = rule
                .template
                .flow
                .steps
                .iter()
                .map(|step| {
                    let nodes: Vec<Value> = step
                        .nodes
                        .iter()
                        .map(|node| json!({"type": node.kind, "role": node.role}))
                        .collect();
                    json!({"type": step.kind, "nodes": nodes})
                })
                .collect();
            json!({
                "title": rule.template.title,
                "description": rule.template.description,
                "condition": rule.condition.as_ref().map(|c| c.expression.as_str()).unwrap_or_default(),
                "steps": steps,
            })
        })
        .collect();
    json!({ "rules": rules })
}

fn flatten_profile(profile: &WorkspaceProfileSetting) -> Value {
    let announcement: Vec<Value> = profile
        .announcement
        .iter()
        .map(|a| json!({"level": a.level, "text": a.text, "link": a.link}))
        .collect();
    json!({
        "external_url": profile.external_url,
        "disallow_signup": profile.disallow_signup,
        "disallow_password_signin": profile.disallow_password_signin,
        "require_2fa": profile.require_2fa,
        "token_duration_in_seconds": duration_seconds(&profile.token_duration),
        "domains": profile.domains,
        "enforce_identity_domain": profile.enforce_identity_domain,
        "database_change_mode": profile.database_change_mode,
        "announcement": announcement,
    })
}

fn flatten_classification(setting: &DataClassificationSetting) -> Option<Value> {
    let config = setting.configs.first()?;
    let levels: Vec<Value> = config
        .levels
        .iter()
        .map(|l| json!({"id": l.id, "title": l.title, "description": l.description}))
        .collect();
    let classifications: Vec<Value> = config
        .classification
        .values()
        .map(|c| {
            json!({
                "id": c.id,
                "title": c.title,
                "description": c.description,
                "level": c.level_id,
            })
        })
        .collect();
    Some(json!({
        "id": config.id,
        "title": config.title,
        "classification_from_config": config.classification_from_config,
        "levels": levels,
        "classifications": classifications,
    }))
}

fn flatten_semantic_types(setting: &SemanticTypeSetting) -> Value {
    let types: Vec<Value> = setting
        .types
        .iter()
        .map(|t| {
            let algorithm: Vec<Value> = t
                .algorithm
                .as_ref()
                .and_then(|a| a.mask.as_ref())
                .map(algorithm_to_block)
                .into_iter()
                .collect();
            json!({
                "id": t.id,
                "title": t.title,
                "description": t.description,
                "algorithm": algorithm,
            })
        })
        .collect();
    Value::Array(types)
}

/// Attribute tree of one environment.
pub(crate) fn flatten_environment(environment: &Environment) -> Value {
    json!({
        "id": environment.id,
        "title": environment.title,
        "color": environment.color,
        "protected": environment.is_protected(),
    })
}

fn setting_name(data: &ResourceData) -> Result<SettingName> {
    SettingName::parse(required_str(data, "name")?)
}

#[async_trait]
impl Reconcile for SettingResource {
    type Message = Setting;

    const TYPE: &'static str = "setting";
    const CREATE_MODE: CreateMode = CreateMode::AllowMissing;
    const DELETABLE: bool = false;

    fn schema(&self) -> Schema {
        let names: Vec<&str> = SettingName::ALL.iter().map(|n| n.as_str()).collect();
        Schema::v0()
            .with_description("A workspace setting. Destroy leaves the setting unchanged.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .immutable()
                    .with_validator(Validator::one_of(&names))
                    .with_description("The setting name, e.g. `WORKSPACE_PROFILE`."),
            )
            .with_block("approval_flow", approval_block().with_max_items(1))
            .with_block("workspace_profile", profile_block().with_max_items(1))
            .with_block("classification", classification_block().with_max_items(1))
            .with_block("semantic_types", semantic_types_block())
            .with_block("environment_setting", environment_setting_block().with_max_items(1))
            .importable()
    }

    fn lookup_keys(&self) -> &'static [&'static str] {
        &["name"]
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        Ok(Some(setting_name(data)?.resource_name()))
    }

    fn resource_id(&self, _data: &ResourceData) -> Option<String> {
        None
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<Setting> {
        let setting = SettingName::parse(&names::parse_one(name, SETTING_PREFIX)?)?;
        let (branch, block) = one_of("setting", data.desired(), &SETTING_BLOCKS)?;
        if branch != setting_block(setting) {
            return Err(ProviderError::invalid(format!(
                "setting {} requires the {} block, got {}",
                setting.as_str(),
                setting_block(setting),
                branch
            )));
        }
        let payload = match setting {
            SettingName::WorkspaceApproval => {
                SettingPayload::WorkspaceApprovalSettingValue(expand_approval(block))
            },
            SettingName::WorkspaceProfile => {
                SettingPayload::WorkspaceProfileSettingValue(expand_profile(block))
            },
            SettingName::DataClassification => {
                SettingPayload::DataClassificationSettingValue(expand_classification(block)?)
            },
            SettingName::SemanticTypes => SettingPayload::SemanticTypeSettingValue(
                expand_semantic_types(data.get_blocks("semantic_types"))?,
            ),
            SettingName::Environment => {
                SettingPayload::EnvironmentSetting(expand_environments(block)?)
            },
        };
        Ok(Setting::new(setting, payload))
    }

    fn flatten(&self, setting: &Setting, data: &mut ResourceData) -> Result<()> {
        let name = SettingName::parse(&names::parse_one(&setting.name, SETTING_PREFIX)?)?;
        data.set("name", name.as_str());
        for block in SETTING_BLOCKS {
            data.set(block, Value::Array(Vec::new()));
        }
        let Some(payload) = &setting.value.value else {
            return Ok(());
        };
        if payload_name(payload) != name {
            return Err(ProviderError::Unknown(format!(
                "setting {} carries a {} payload",
                name.as_str(),
                payload_name(payload).as_str()
            )));
        }
        let value = match payload {
            SettingPayload::WorkspaceApprovalSettingValue(s) => single_block(flatten_approval(s)),
            SettingPayload::WorkspaceProfileSettingValue(s) => single_block(flatten_profile(s)),
            SettingPayload::DataClassificationSettingValue(s) => flatten_classification(s)
                .map(single_block)
                .unwrap_or_else(|| Value::Array(Vec::new())),
            SettingPayload::SemanticTypeSettingValue(s) => flatten_semantic_types(s),
            SettingPayload::EnvironmentSetting(s) => single_block(json!({
                "environment": s.environments.iter().map(flatten_environment).collect::<Vec<_>>(),
            })),
        };
        data.set(setting_block(name), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::setting::MaskAlgorithm;
    use crate::mapper::mask::field_mask;
    use std::sync::Arc;

    fn data(prior: Option<Value>, desired: Value) -> ResourceData {
        ResourceData::new(Arc::new(SettingResource.schema()), prior, desired)
    }

    #[test]
    fn test_block_must_match_name() {
        let input = data(
            None,
            json!({"name": "WORKSPACE_PROFILE", "classification": [{"id": "c"}]}),
        );
        let name = SettingResource.canonical_name(&input).unwrap().unwrap();
        assert_eq!(name, "settings/WORKSPACE_PROFILE");
        let err = SettingResource.expand(&input, &name).unwrap_err();
        assert!(err.message().contains("workspace_profile"));

        let unknown = data(None, json!({"name": "BRANDING_LOGO"}));
        assert!(SettingResource.canonical_name(&unknown).is_err());
    }

    #[test]
    fn test_profile_mask_is_per_field() {
        let prior = json!({
            "name": "WORKSPACE_PROFILE",
            "workspace_profile": [{
                "external_url": "https://old.example.com",
                "disallow_signup": false,
                "token_duration_in_seconds": 3600
            }]
        });
        let input = data(
            Some(prior),
            json!({
                "name": "WORKSPACE_PROFILE",
                "workspace_profile": [{
                    "external_url": "https://bb.example.com",
                    "token_duration_in_seconds": 3600
                }]
            }),
        );
        assert_eq!(
            field_mask(&input),
            vec!["value.workspace_profile_setting_value.external_url"]
        );
        let setting = SettingResource.expand(&input, "settings/WORKSPACE_PROFILE").unwrap();
        let value = serde_json::to_value(&setting).unwrap();
        assert_eq!(
            value["value"]["workspaceProfileSettingValue"]["tokenDuration"],
            "3600s"
        );
    }

    #[test]
    fn test_semantic_types() {
        let input = data(
            None,
            json!({
                "name": "SEMANTIC_TYPES",
                "semantic_types": [
                    {"id": "email", "title": "Email", "algorithm": [{"md5_mask": [{"salt": "pepper"}]}]},
                    {"id": "plain", "title": "Plain"}
                ]
            }),
        );
        let setting = SettingResource.expand(&input, "settings/SEMANTIC_TYPES").unwrap();
        let Some(SettingPayload::SemanticTypeSettingValue(types)) = &setting.value.value else {
            panic!("unexpected payload {:?}", setting.value.value);
        };
        assert_eq!(types.types.len(), 2);
        assert!(matches!(
            types.types[0].algorithm.as_ref().and_then(|a| a.mask.as_ref()),
            Some(MaskAlgorithm::Md5Mask(_))
        ));
        assert!(types.types[1].algorithm.is_none());

        let mut out = input.scratch();
        SettingResource.flatten(&setting, &mut out).unwrap();
        let state = out.attributes();
        assert_eq!(state["semantic_types"][0]["algorithm"][0]["md5_mask"][0]["salt"], "pepper");
        assert_eq!(state["semantic_types"][1]["algorithm"], json!([]));
        assert_eq!(state["workspace_profile"], json!([]));
    }

    #[test]
    fn test_classification_levels_are_checked() {
        let input = data(
            None,
            json!({
                "name": "DATA_CLASSIFICATION",
                "classification": [{
                    "id": "cfg",
                    "levels": [{"id": "1", "title": "Low"}],
                    "classifications": [{"id": "1-1", "title": "Basic", "level": "9"}]
                }]
            }),
        );
        let err = SettingResource
            .expand(&input, "settings/DATA_CLASSIFICATION")
            .unwrap_err();
        assert!(err.message().contains("unknown level"));
    }

    #[test]
    fn test_approval_flow_defaults() {
        let input = data(
            None,
            json!({
                "name": "WORKSPACE_APPROVAL",
                "approval_flow": [{
                    "rules": [{
                        "title": "DBA review",
                        "condition": "source == \"DDL\"",
                        "steps": [{"nodes": [{"role": "roles/workspaceDBA"}]}]
                    }]
                }]
            }),
        );
        let setting = SettingResource.expand(&input, "settings/WORKSPACE_APPROVAL").unwrap();
        let Some(SettingPayload::WorkspaceApprovalSettingValue(approval)) = &setting.value.value else {
            panic!("unexpected payload {:?}", setting.value.value);
        };
        let step = &approval.rules[0].template.flow.steps[0];
        assert_eq!(step.kind, "AND");
        assert_eq!(step.nodes[0].kind, NODE_TYPE);
        assert_eq!(
            approval.rules[0].condition.as_ref().map(|c| c.expression.as_str()),
            Some("source == \"DDL\"")
        );
    }
}
