//! `bytebase_group`.

use async_trait::async_trait;
use serde_json::json;

use super::{name_attribute, required_str, Reconcile};
use crate::api::group::{Group, GroupMember};
use crate::client::Result;
use crate::data::ResourceData;
use crate::mapper::str_of;
use crate::names::{self, GROUP_PREFIX, USER_PREFIX};
use crate::schema::{Attribute, Block, NestedBlock, Schema, SetIdentity, Validator};

/// Reconciles user groups, keyed by email.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupResource;

fn member_block() -> Block {
    Block::new()
        .with_attribute(
            "member",
            Attribute::required_string()
                .with_validator(Validator::Prefix(format!("{}/", USER_PREFIX)))
                .with_description("The member, `users/{email}`."),
        )
        .with_attribute(
            "role",
            Attribute::required_string()
                .with_validator(Validator::one_of(&["OWNER", "MEMBER"])),
        )
}

#[async_trait]
impl Reconcile for GroupResource {
    type Message = Group;

    const TYPE: &'static str = "group";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A group of users.")
            .with_attribute(
                "email",
                Attribute::required_string()
                    .immutable()
                    .with_validator(Validator::NonEmpty),
            )
            .with_attribute("name", name_attribute())
            .with_attribute(
                "title",
                Attribute::required_string().with_update_path("title"),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_update_path("description"),
            )
            .with_attribute("source", Attribute::computed_string())
            .with_block(
                "members",
                NestedBlock::set(member_block())
                    .with_min_items(1)
                    .with_identity(SetIdentity::fields(&["member", "role"]))
                    .with_update_path("members"),
            )
            .importable()
    }

    fn lookup_keys(&self) -> &'static [&'static str] {
        &["email"]
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        let email = required_str(data, "email")?;
        Ok(Some(names::format_one(GROUP_PREFIX, email)))
    }

    fn resource_id(&self, data: &ResourceData) -> Option<String> {
        data.get_str("email").map(str::to_string)
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<Group> {
        let members = data
            .get_blocks("members")
            .into_iter()
            .map(|element| GroupMember {
                member: str_of(element, "member"),
                role: str_of(element, "role"),
            })
            .collect();
        Ok(Group {
            name: name.to_string(),
            title: data.get_string("title"),
            description: data.get_string("description"),
            members,
            ..Default::default()
        })
    }

    fn flatten(&self, group: &Group, data: &mut ResourceData) -> Result<()> {
        let email = names::parse_one(&group.name, GROUP_PREFIX)?;
        data.set("email", email);
        data.set("name", group.name.as_str());
        data.set("title", group.title.as_str());
        data.set("description", group.description.as_str());
        data.set("source", group.source.as_str());
        let members: Vec<_> = group
            .members
            .iter()
            .map(|m| json!({"member": m.member, "role": m.role}))
            .collect();
        data.set("members", members);
        Ok(())
    }
}
