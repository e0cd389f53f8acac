//! `bytebase_iam_policy`.
//!
//! The IAM policy of the workspace or of a project. Bindings are a set
//! keyed by role, sorted members and the canonical condition. There is no
//! partial update: create and update both overwrite the whole policy with
//! `SetIamPolicy`, carrying the etag of the policy just read.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, Resource};
use crate::api::iam::{Binding, IamPolicy};
use crate::api::Expr;
use crate::client::Result;
use crate::context::Context;
use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::filter::condition;
use crate::mapper::hash::element_hash;
use crate::mapper::{binding_expression, condition_to_block, mask, str_list_of, str_of};
use crate::names::{self, PROJECT_PREFIX, ROLE_PREFIX, WORKSPACE_NAME};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, SetIdentity, Validator};
use crate::types::type_name;

const TYPE: &str = "iam_policy";

/// Parents that carry an IAM policy.
pub const IAM_PARENT_PATTERNS: [&str; 2] = ["^workspaces/-$", "^projects/[^/]+$"];

/// Member forms accepted in bindings.
const MEMBER_PREFIXES: [&str; 2] = ["user:", "group:"];
const ALL_USERS: &str = "allUsers";

/// Overwrites the IAM policy of a workspace or project.
#[derive(Debug, Default, Clone, Copy)]
pub struct IamPolicyResource;

fn condition_block() -> Block {
    Block::new()
        .with_attribute(
            "database",
            Attribute::optional_string()
                .with_validator(Validator::name_pattern(&["^instances/[^/]+/databases/[^/]+$"])),
        )
        .with_attribute("schema", Attribute::optional_string())
        .with_attribute("tables", Attribute::string_list(AttributeFlags::optional()))
        .with_attribute(
            "row_limit",
            Attribute::optional_int64().with_validator(Validator::IntRange(0, i64::MAX)),
        )
        .with_attribute(
            "expire_timestamp",
            Attribute::optional_string().with_validator(Validator::Rfc3339),
        )
}

/// Schema of one binding element.
pub fn binding_block() -> NestedBlock {
    NestedBlock::set(
        Block::new()
            .with_attribute(
                "role",
                Attribute::required_string()
                    .with_validator(Validator::Prefix(format!("{}/", ROLE_PREFIX))),
            )
            .with_attribute(
                "members",
                Attribute::string_set(AttributeFlags::required())
                    .with_description("Members as `user:{email}`, `group:{email}` or `allUsers`."),
            )
            .with_block(
                "condition",
                NestedBlock::single(condition_block()).with_max_items(1),
            )
            .with_attribute(
                "raw_expression",
                Attribute::computed_string()
                    .with_description("The condition as the server holds it, including clauses the condition block cannot express."),
            ),
    )
    .with_identity(SetIdentity::IamBinding)
}

/// Check that `parent` can hold an IAM policy.
pub fn validate_parent(parent: &str) -> Result<()> {
    let patterns: Vec<String> = IAM_PARENT_PATTERNS.iter().map(|p| p.to_string()).collect();
    names::validate_name_patterns(parent, &patterns)
}

fn validate_member(member: &str) -> Result<()> {
    let valid = member == ALL_USERS
        || MEMBER_PREFIXES
            .iter()
            .any(|prefix| member.strip_prefix(prefix).is_some_and(|rest| !rest.is_empty()));
    if valid {
        Ok(())
    } else {
        Err(ProviderError::invalid(format!(
            "invalid member {:?}: members are `user:{{email}}`, `group:{{email}}` or `{}`",
            member, ALL_USERS
        )))
    }
}

/// Bindings declared by `data`, keeping the server expression of bindings
/// whose identity did not change.
fn expand_bindings(data: &ResourceData) -> Result<Vec<Binding>> {
    let nested = data
        .schema()
        .block
        .blocks
        .get("binding")
        .ok_or_else(|| ProviderError::invalid("binding is not declared"))?;
    let hash = |element: &Value| element_hash(nested.identity.as_ref(), &nested.block, element);
    let prior = data.get_prior_blocks("binding");
    data.get_blocks("binding")
        .into_iter()
        .map(|element| {
            let mut members = str_list_of(element, "members");
            for member in &members {
                validate_member(member)?;
            }
            members.sort();
            members.dedup();
            let mut element = element.clone();
            if str_of(&element, "raw_expression").is_empty() {
                let identity = hash(&element);
                if let Some(raw) = prior
                    .iter()
                    .find(|p| hash(p) == identity)
                    .map(|p| str_of(p, "raw_expression"))
                {
                    element["raw_expression"] = Value::String(raw);
                }
            }
            Ok(Binding {
                role: str_of(&element, "role"),
                members,
                condition: Expr::non_empty(binding_expression(&element)),
            })
        })
        .collect()
}

/// Attribute tree of one binding.
pub fn flatten_binding(binding: &Binding) -> Value {
    let expression = binding.expression();
    let parsed = condition::parse(expression);
    let condition: Vec<Value> = condition_to_block(&parsed.condition)
        .into_iter()
        .collect();
    let mut members = binding.members.clone();
    members.sort();
    json!({
        "role": binding.role,
        "members": members,
        "condition": condition,
        "raw_expression": expression,
    })
}

/// Write a policy into the output state.
pub fn flatten_policy(parent: &str, policy: &IamPolicy, data: &mut ResourceData) {
    let bindings: Vec<Value> = policy.bindings.iter().map(flatten_binding).collect();
    data.set("parent", parent);
    data.set("binding", bindings);
}

impl IamPolicyResource {
    /// Schema shared with the IAM policy data source.
    pub fn iam_schema() -> Schema {
        Schema::v0()
            .with_description("The IAM policy of the workspace or a project. Every apply overwrites the whole policy.")
            .with_attribute(
                "parent",
                Attribute::required_string()
                    .immutable()
                    .with_validator(Validator::name_pattern(&IAM_PARENT_PATTERNS))
                    .with_description("`workspaces/-` or `projects/{id}`."),
            )
            .with_block("binding", binding_block())
            .importable()
    }

    async fn overwrite(&self, ctx: &Context, data: &ResourceData, parent: &str) -> Result<()> {
        let bindings = expand_bindings(data)?;
        let current = ctx.client().get_iam_policy(parent).await?;
        if data.is_new() && !current.bindings.is_empty() {
            ctx.warn(
                "IAM policy will be overwritten",
                format!(
                    "{} already has {} binding(s); they are replaced by the configuration",
                    parent,
                    current.bindings.len()
                ),
            );
        }
        let policy = IamPolicy {
            bindings,
            etag: current.etag,
        };
        ctx.client().set_iam_policy(parent, &policy).await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for IamPolicyResource {
    fn type_name(&self) -> String {
        type_name(TYPE)
    }

    fn schema(&self) -> Schema {
        Self::iam_schema()
    }

    async fn create(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let parent = required_str(data, "parent")?.to_string();
        validate_parent(&parent)?;
        self.overwrite(ctx, data, &parent)
            .await
            .map_err(|e| e.for_resource(&parent))?;
        tracing::info!(resource = TYPE, %parent, "created");
        data.set_id(parent);
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let Some(parent) = data.id().map(str::to_string) else {
            return Ok(());
        };
        match ctx.client().get_iam_policy(&parent).await {
            Err(err) if err.is_not_found() => {
                tracing::warn!(resource = TYPE, %parent, "not found, removing from state");
                data.clear_id();
                Ok(())
            },
            Err(err) => Err(err.for_resource(&parent)),
            Ok(policy) => {
                flatten_policy(&parent, &policy, data);
                Ok(())
            },
        }
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let parent = data
            .id()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::invalid(format!("{} has no id", type_name(TYPE))))?;
        let apply = async {
            mask::check_immutable(data)?;
            if !data.has_change("binding") {
                tracing::debug!(resource = TYPE, %parent, "bindings unchanged");
                return Ok(());
            }
            self.overwrite(ctx, data, &parent).await
        };
        apply.await.map_err(|e| e.for_resource(&parent))?;
        tracing::info!(resource = TYPE, %parent, "updated");
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        if let Some(parent) = data.id() {
            ctx.warn(
                "Delete is not supported",
                format!("the IAM policy of {} is only removed from state; its bindings are kept", parent),
            );
        }
        data.clear_id();
        Ok(())
    }

    async fn import(&self, ctx: &Context, id: &str, data: &mut ResourceData) -> Result<()> {
        let parent = if id == "workspaces" { WORKSPACE_NAME } else { id };
        validate_parent(parent)?;
        if parent.starts_with(PROJECT_PREFIX) {
            names::parse_one(parent, PROJECT_PREFIX)?;
        }
        data.set_id(parent);
        self.read(ctx, data).await?;
        if data.id().is_none() {
            return Err(ProviderError::NotFound(format!("{} does not exist", parent)));
        }
        Ok(())
    }
}
