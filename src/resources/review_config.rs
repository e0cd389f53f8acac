//! `bytebase_review_config`.
//!
//! A config is attached to environments and projects by a TAG policy on
//! each of them. The attached set the server reports is diffed against
//! the declared set after every apply: new targets get a TAG policy,
//! dropped targets lose theirs, unchanged targets see no call.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{name_attribute, resource_id_attribute, top_level_name, CreateMode, Reconcile};
use crate::api::policy::{Policy, PolicyType};
use crate::api::review_config::{ReviewConfig, ReviewRule};
use crate::client::Result;
use crate::context::Context;
use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::mapper::str_of;
use crate::names::{self, REVIEW_CONFIG_PREFIX};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};

/// Reconciles SQL review configs and their attachments.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReviewConfigResource;

fn rule_block() -> Block {
    Block::new()
        .with_attribute("type", Attribute::required_string().with_validator(Validator::NonEmpty))
        .with_attribute(
            "level",
            Attribute::required_string()
                .with_validator(Validator::one_of(&["ERROR", "WARNING", "DISABLED"])),
        )
        .with_attribute("engine", Attribute::required_string())
        .with_attribute(
            "payload",
            Attribute::optional_string().with_description("Rule payload as JSON."),
        )
        .with_attribute("comment", Attribute::optional_string())
}

impl ReviewConfigResource {
    async fn attached(&self, ctx: &Context, name: &str) -> Result<BTreeSet<String>> {
        match ctx.client().get::<ReviewConfig>(name).await {
            Ok(config) => Ok(config.resources.into_iter().collect()),
            Err(err) if err.is_not_found() => Ok(BTreeSet::new()),
            Err(err) => Err(err),
        }
    }

    async fn attach(&self, ctx: &Context, target: &str, name: &str) -> Result<()> {
        let policy = Policy::review_config_tag(target, name);
        ctx.client()
            .update_with(&policy, &["tag_policy".to_string()], true)
            .await
            .map_err(|e| e.for_resource(target))?;
        tracing::info!(review_config = name, target, "attached review config");
        Ok(())
    }

    async fn detach(&self, ctx: &Context, target: &str) -> Result<()> {
        let policy = PolicyType::Tag.name(target);
        match ctx.client().delete::<Policy>(&policy).await {
            Err(err) if !err.is_not_found() => return Err(err.for_resource(&policy)),
            _ => {},
        }
        tracing::info!(target, "detached review config");
        Ok(())
    }
}

#[async_trait]
impl Reconcile for ReviewConfigResource {
    type Message = ReviewConfig;

    const TYPE: &'static str = "review_config";
    const CREATE_MODE: CreateMode = CreateMode::AllowMissing;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A SQL review config and the environments and projects it applies to.")
            .with_attribute("resource_id", resource_id_attribute("review config"))
            .with_attribute("name", name_attribute())
            .with_attribute(
                "title",
                Attribute::required_string().with_update_path("title"),
            )
            .with_attribute(
                "enabled",
                Attribute::optional_computed_bool().with_update_path("enabled"),
            )
            .with_attribute(
                "resources",
                Attribute::string_set(AttributeFlags::optional_computed())
                    .with_validator(Validator::name_pattern(&[
                        "^environments/[^/]+$",
                        "^projects/[^/]+$",
                    ]))
                    .with_description("Environments and projects the config is attached to."),
            )
            .with_block(
                "rules",
                NestedBlock::list(rule_block())
                    .with_min_items(1)
                    .with_update_path("rules"),
            )
            .importable()
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        top_level_name(data, REVIEW_CONFIG_PREFIX)
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<ReviewConfig> {
        if let Some(bad) = data
            .get_str_list("resources")
            .iter()
            .find(|r| !names::is_review_target(r))
        {
            return Err(ProviderError::invalid(format!(
                "review configs attach to environments or projects, got {:?}",
                bad
            )));
        }
        let rules = data
            .get_blocks("rules")
            .into_iter()
            .map(|element| ReviewRule {
                kind: str_of(element, "type"),
                level: str_of(element, "level"),
                engine: str_of(element, "engine"),
                payload: str_of(element, "payload"),
                comment: str_of(element, "comment"),
            })
            .collect();
        Ok(ReviewConfig {
            name: name.to_string(),
            title: data.get_string("title"),
            enabled: data.get_bool_opt("enabled").unwrap_or(true),
            rules,
            resources: Vec::new(),
        })
    }

    fn flatten(&self, config: &ReviewConfig, data: &mut ResourceData) -> Result<()> {
        data.set(
            "resource_id",
            names::parse_one(&config.name, REVIEW_CONFIG_PREFIX)?,
        );
        let rules: Vec<Value> = config
            .rules
            .iter()
            .map(|rule| {
                json!({
                    "type": rule.kind,
                    "level": rule.level,
                    "engine": rule.engine,
                    "payload": rule.payload,
                    "comment": rule.comment,
                })
            })
            .collect();
        let mut resources = config.resources.clone();
        resources.sort();
        data.set("name", config.name.as_str());
        data.set("title", config.title.as_str());
        data.set("enabled", config.enabled);
        data.set("rules", rules);
        data.set("resources", resources);
        Ok(())
    }

    async fn after_apply(&self, ctx: &Context, data: &ResourceData, name: &str) -> Result<()> {
        if data.get("resources").is_none() {
            return Ok(());
        }
        let desired: BTreeSet<String> = data.get_str_list("resources").into_iter().collect();
        let attached = self.attached(ctx, name).await?;
        for target in attached.difference(&desired) {
            self.detach(ctx, target).await?;
        }
        for target in desired.difference(&attached) {
            self.attach(ctx, target, name).await?;
        }
        Ok(())
    }

    async fn before_delete(&self, ctx: &Context, data: &ResourceData, name: &str) -> Result<()> {
        let mut targets = self.attached(ctx, name).await?;
        targets.extend(data.get_prior_str_list("resources"));
        for target in &targets {
            self.detach(ctx, target).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Method;
    use crate::testing::FakeBytebase;
    use std::sync::Arc;

    fn fake_with_attachments() -> FakeBytebase {
        let fake = FakeBytebase::new();
        fake.insert(
            "reviewConfigs",
            json!({"name": "reviewConfigs/basic", "title": "Basic", "enabled": true}),
        );
        for target in ["environments/test", "projects/p1"] {
            fake.insert(
                "policies",
                serde_json::to_value(Policy::review_config_tag(target, "reviewConfigs/basic")).unwrap(),
            );
        }
        fake
    }

    #[tokio::test]
    async fn test_attachment_diff() {
        let fake = fake_with_attachments();
        let ctx = Context::new(fake.client());
        let data = ResourceData::new(
            Arc::new(ReviewConfigResource.schema()),
            Some(json!({"resource_id": "basic", "resources": ["environments/test", "projects/p1"]})),
            json!({"resource_id": "basic", "resources": ["projects/p1", "projects/p2"]}),
        );
        ReviewConfigResource
            .after_apply(&ctx, &data, "reviewConfigs/basic")
            .await
            .unwrap();

        let deletes = fake.calls_of(Method::Delete);
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].target, "environments/test/policies/tag");
        let updates = fake.calls_of(Method::Update);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].target, "projects/p2/policies/tag");
        assert!(updates[0].allow_missing);
        assert!(!fake
            .calls()
            .iter()
            .any(|call| call.target.starts_with("projects/p1/")));
    }

    #[tokio::test]
    async fn test_delete_detaches_everything() {
        let fake = fake_with_attachments();
        let ctx = Context::new(fake.client());
        let data = ResourceData::from_state(
            Arc::new(ReviewConfigResource.schema()),
            json!({"id": "reviewConfigs/basic", "resource_id": "basic"}),
        );
        ReviewConfigResource
            .before_delete(&ctx, &data, "reviewConfigs/basic")
            .await
            .unwrap();
        let mut deleted: Vec<String> = fake
            .calls_of(Method::Delete)
            .into_iter()
            .map(|call| call.target)
            .collect();
        deleted.sort();
        assert_eq!(
            deleted,
            vec!["environments/test/policies/tag", "projects/p1/policies/tag"]
        );
    }

    #[test]
    fn test_resources_must_be_targets() {
        let data = ResourceData::new(
            Arc::new(ReviewConfigResource.schema()),
            None,
            json!({"resource_id": "basic", "title": "t", "resources": ["instances/i"]}),
        );
        assert!(ReviewConfigResource.expand(&data, "reviewConfigs/basic").is_err());
    }
}
