//! `bytebase_policy`.
//!
//! A policy is keyed by its parent and type, so creation upserts. Exactly
//! one payload block is declared and it must match the type.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{name_attribute, required_str, CreateMode, Reconcile};
use crate::api::policy::{
    DataSourceQueryPolicy, DisableCopyDataPolicy, MaskingException, MaskingExceptionPolicy,
    MaskingRule, MaskingRulePolicy, Policy, PolicyPayload, PolicyType, RolloutPolicy, TagPolicy,
};
use crate::api::Expr;
use crate::client::Result;
use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::filter::masking::ExceptionCondition;
use crate::mapper::{
    blocks_of, bool_of, map_value, one_of, single_block, str_list_of, str_map_of, str_of,
};
use crate::names::{self, DATABASE_PREFIX, INSTANCE_PREFIX};
use crate::schema::{
    Attribute, AttributeFlags, Block, DiffSuppress, NestedBlock, Schema, SetIdentity, Validator,
};

/// Payload blocks, one per policy type.
pub const PAYLOAD_BLOCKS: [&str; 6] = [
    "masking_exception_policy",
    "global_masking_policy",
    "disable_copy_data_policy",
    "data_source_query_policy",
    "rollout_policy",
    "tag_policy",
];

/// Parents a policy can be attached to; empty means the workspace.
pub const PARENT_PATTERNS: [&str; 4] = [
    "^environments/[^/]+$",
    "^projects/[^/]+$",
    "^instances/[^/]+$",
    "^instances/[^/]+/databases/[^/]+$",
];

/// Reconciles policies.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyResource;

fn payload_block(kind: PolicyType) -> &'static str {
    match kind {
        PolicyType::MaskingException => "masking_exception_policy",
        PolicyType::MaskingRule => "global_masking_policy",
        PolicyType::DisableCopyData => "disable_copy_data_policy",
        PolicyType::DataSourceQuery => "data_source_query_policy",
        PolicyType::RolloutPolicy => "rollout_policy",
        PolicyType::Tag => "tag_policy",
    }
}

fn exception_block() -> Block {
    Block::new()
        .with_attribute(
            "member",
            Attribute::required_string()
                .with_validator(Validator::NonEmpty)
                .with_description("The member, e.g. `user:alice@example.com`."),
        )
        .with_attribute(
            "action",
            Attribute::required_string().with_validator(Validator::one_of(&["QUERY", "EXPORT"])),
        )
        .with_attribute(
            "database",
            Attribute::required_string()
                .with_validator(Validator::name_pattern(&["^instances/[^/]+/databases/[^/]+$"])),
        )
        .with_attribute("schema", Attribute::optional_string())
        .with_attribute("table", Attribute::optional_string())
        .with_attribute("column", Attribute::optional_string())
        .with_attribute(
            "expire_timestamp",
            Attribute::optional_string().with_validator(Validator::Rfc3339),
        )
}

fn payload_blocks() -> Vec<(&'static str, NestedBlock)> {
    vec![
        (
            "masking_exception_policy",
            NestedBlock::single(Block::new().with_block(
                "exceptions",
                NestedBlock::set(exception_block()).with_identity(SetIdentity::fields(&[
                    "member",
                    "action",
                    "database",
                    "schema",
                    "table",
                    "column",
                    "expire_timestamp",
                ])),
            ))
            .with_update_path("masking_exception_policy"),
        ),
        (
            "global_masking_policy",
            NestedBlock::single(
                Block::new().with_block(
                    "rules",
                    NestedBlock::list(
                        Block::new()
                            .with_attribute("id", Attribute::required_string())
                            .with_attribute(
                                "condition",
                                Attribute::required_string()
                                    .with_diff_suppress(DiffSuppress::ConditionExpression),
                            )
                            .with_attribute("semantic_type", Attribute::required_string()),
                    ),
                ),
            )
            .with_update_path("masking_rule_policy"),
        ),
        (
            "disable_copy_data_policy",
            NestedBlock::single(Block::new().with_attribute("enable", Attribute::optional_bool()))
                .with_update_path("disable_copy_data_policy"),
        ),
        (
            "data_source_query_policy",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "restriction",
                        Attribute::optional_string().with_validator(Validator::one_of(&[
                            "RESTRICTION_UNSPECIFIED",
                            "FALLBACK",
                            "DISALLOW",
                        ])),
                    )
                    .with_attribute("disallow_ddl", Attribute::optional_bool())
                    .with_attribute("disallow_dml", Attribute::optional_bool()),
            )
            .with_update_path("data_source_query_policy"),
        ),
        (
            "rollout_policy",
            NestedBlock::single(
                Block::new()
                    .with_attribute("automatic", Attribute::optional_bool())
                    .with_attribute("roles", Attribute::string_set(AttributeFlags::optional()))
                    .with_attribute("issue_roles", Attribute::string_set(AttributeFlags::optional())),
            )
            .with_update_path("rollout_policy"),
        ),
        (
            "tag_policy",
            NestedBlock::single(
                Block::new().with_attribute("tags", Attribute::string_map(AttributeFlags::optional())),
            )
            .with_update_path("tag_policy"),
        ),
    ]
}

fn expand_exception(element: &Value) -> Result<MaskingException> {
    let database = str_of(element, "database");
    let ids = names::parse(&database, &[INSTANCE_PREFIX, DATABASE_PREFIX])?;
    let optional = |key: &str| Some(str_of(element, key)).filter(|s| !s.is_empty());
    let condition = ExceptionCondition {
        instance_id: Some(ids[0].to_string()),
        database_name: Some(ids[1].to_string()),
        schema_name: optional("schema"),
        table_name: optional("table"),
        column_name: optional("column"),
        expire_timestamp: optional("expire_timestamp"),
    };
    Ok(MaskingException {
        member: str_of(element, "member"),
        action: str_of(element, "action"),
        condition: Expr::new(condition.compile()),
    })
}

fn flatten_exception(exception: &MaskingException) -> Value {
    let condition = ExceptionCondition::parse(&exception.condition.expression);
    let database = match (&condition.instance_id, &condition.database_name) {
        (Some(instance), Some(database)) => {
            names::format(&[(INSTANCE_PREFIX, instance), (DATABASE_PREFIX, database)])
        },
        _ => String::new(),
    };
    json!({
        "member": exception.member,
        "action": exception.action,
        "database": database,
        "schema": condition.schema_name.unwrap_or_default(),
        "table": condition.table_name.unwrap_or_default(),
        "column": condition.column_name.unwrap_or_default(),
        "expire_timestamp": condition.expire_timestamp.unwrap_or_default(),
    })
}

fn expand_payload(branch: &str, block: &Value) -> Result<PolicyPayload> {
    Ok(match branch {
        "masking_exception_policy" => PolicyPayload::MaskingExceptionPolicy(MaskingExceptionPolicy {
            masking_exceptions: blocks_of(block, "exceptions")
                .into_iter()
                .map(expand_exception)
                .collect::<Result<_>>()?,
        }),
        "global_masking_policy" => PolicyPayload::MaskingRulePolicy(MaskingRulePolicy {
            rules: blocks_of(block, "rules")
                .into_iter()
                .map(|rule| MaskingRule {
                    id: str_of(rule, "id"),
                    condition: Expr::new(str_of(rule, "condition")),
                    semantic_type: str_of(rule, "semantic_type"),
                })
                .collect(),
        }),
        "disable_copy_data_policy" => PolicyPayload::DisableCopyDataPolicy(DisableCopyDataPolicy {
            active: bool_of(block, "enable"),
        }),
        "data_source_query_policy" => PolicyPayload::DataSourceQueryPolicy(DataSourceQueryPolicy {
            admin_data_source_restriction: str_of(block, "restriction"),
            disallow_ddl: bool_of(block, "disallow_ddl"),
            disallow_dml: bool_of(block, "disallow_dml"),
        }),
        "rollout_policy" => PolicyPayload::RolloutPolicy(RolloutPolicy {
            automatic: bool_of(block, "automatic"),
            roles: str_list_of(block, "roles"),
            issue_roles: str_list_of(block, "issue_roles"),
        }),
        _ => PolicyPayload::TagPolicy(TagPolicy {
            tags: str_map_of(block, "tags"),
        }),
    })
}

fn flatten_payload(payload: &PolicyPayload) -> Value {
    match payload {
        PolicyPayload::MaskingExceptionPolicy(policy) => json!({
            "exceptions": policy.masking_exceptions.iter().map(flatten_exception).collect::<Vec<_>>(),
        }),
        PolicyPayload::MaskingRulePolicy(policy) => json!({
            "rules": policy.rules.iter().map(|rule| json!({
                "id": rule.id,
                "condition": rule.condition.expression,
                "semantic_type": rule.semantic_type,
            })).collect::<Vec<_>>(),
        }),
        PolicyPayload::DisableCopyDataPolicy(policy) => json!({"enable": policy.active}),
        PolicyPayload::DataSourceQueryPolicy(policy) => json!({
            "restriction": policy.admin_data_source_restriction,
            "disallow_ddl": policy.disallow_ddl,
            "disallow_dml": policy.disallow_dml,
        }),
        PolicyPayload::RolloutPolicy(policy) => json!({
            "automatic": policy.automatic,
            "roles": policy.roles,
            "issue_roles": policy.issue_roles,
        }),
        PolicyPayload::TagPolicy(policy) => json!({"tags": map_value(&policy.tags)}),
    }
}

fn parent_of(data: &ResourceData) -> Result<&str> {
    let parent = data.get_str("parent").unwrap_or_default();
    if !parent.is_empty() {
        let patterns: Vec<String> = PARENT_PATTERNS.iter().map(|p| p.to_string()).collect();
        names::validate_name_patterns(parent, &patterns)?;
    }
    Ok(parent)
}

#[async_trait]
impl Reconcile for PolicyResource {
    type Message = Policy;

    const TYPE: &'static str = "policy";
    const CREATE_MODE: CreateMode = CreateMode::AllowMissing;

    fn schema(&self) -> Schema {
        let types: Vec<&str> = PolicyType::ALL.iter().map(|t| t.as_str()).collect();
        let mut schema = Schema::v0()
            .with_description("A policy of the workspace, an environment, a project or a database.")
            .with_attribute(
                "parent",
                Attribute::optional_string()
                    .immutable()
                    .with_validator(Validator::name_pattern(&PARENT_PATTERNS))
                    .with_description("The policy parent; empty for the workspace."),
            )
            .with_attribute(
                "type",
                Attribute::required_string()
                    .immutable()
                    .with_validator(Validator::one_of(&types)),
            )
            .with_attribute("name", name_attribute())
            .with_attribute(
                "enforce",
                Attribute::optional_computed_bool().with_update_path("enforce"),
            )
            .with_attribute(
                "inherit_from_parent",
                Attribute::optional_computed_bool().with_update_path("inherit_from_parent"),
            )
            .importable();
        for (name, block) in payload_blocks() {
            schema = schema.with_block(name, block.with_max_items(1));
        }
        schema
    }

    fn lookup_keys(&self) -> &'static [&'static str] {
        &["parent", "type"]
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        let kind = PolicyType::parse(required_str(data, "type")?)?;
        Ok(Some(kind.name(parent_of(data)?)))
    }

    fn resource_id(&self, _data: &ResourceData) -> Option<String> {
        None
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<Policy> {
        let (parent, segment) = names::split_policy_name(name)?;
        let kind = PolicyType::from_segment(segment)?;
        let (branch, block) = one_of("policy", data.desired(), &PAYLOAD_BLOCKS)?;
        if branch != payload_block(kind) {
            return Err(ProviderError::invalid(format!(
                "policy type {} requires the {} block, got {}",
                kind.as_str(),
                payload_block(kind),
                branch
            )));
        }
        let mut policy = Policy::new(parent, expand_payload(branch, block)?);
        policy.name = name.to_string();
        policy.enforce = data.get_bool_opt("enforce").unwrap_or(true);
        policy.inherit_from_parent = data.get_bool("inherit_from_parent");
        Ok(policy)
    }

    fn flatten(&self, policy: &Policy, data: &mut ResourceData) -> Result<()> {
        let (parent, segment) = names::split_policy_name(&policy.name)?;
        let kind = PolicyType::from_segment(segment)?;
        data.set("parent", parent);
        data.set("type", kind.as_str());
        data.set("name", policy.name.as_str());
        data.set("enforce", policy.enforce);
        data.set("inherit_from_parent", policy.inherit_from_parent);
        for name in PAYLOAD_BLOCKS {
            data.set(name, Value::Array(Vec::new()));
        }
        if let Some(payload) = &policy.payload {
            data.set(payload_block(payload.policy_type()), single_block(flatten_payload(payload)));
        }
        Ok(())
    }
}
