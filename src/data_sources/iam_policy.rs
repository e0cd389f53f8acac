//! `bytebase_iam_policy`.

use async_trait::async_trait;

use super::{computed_block, DataSource};
use crate::client::Result;
use crate::context::Context;
use crate::data::ResourceData;
use crate::resources::iam_policy::{
    flatten_policy, validate_parent, IamPolicyResource, IAM_PARENT_PATTERNS,
};
use crate::resources::required_str;
use crate::schema::{Attribute, Schema, Validator};
use crate::types::type_name;

/// The IAM policy of the workspace or a project.
#[derive(Debug, Default, Clone, Copy)]
pub struct IamPolicyDataSource;

#[async_trait]
impl DataSource for IamPolicyDataSource {
    fn type_name(&self) -> String {
        type_name("iam_policy")
    }

    fn schema(&self) -> Schema {
        let block = computed_block(&IamPolicyResource::iam_schema().block).with_attribute(
            "parent",
            Attribute::required_string()
                .with_validator(Validator::name_pattern(&IAM_PARENT_PATTERNS))
                .with_description("`workspaces/-` or `projects/{id}`."),
        );
        Schema {
            version: 0,
            block,
            importable: false,
        }
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData) -> Result<()> {
        let parent = required_str(data, "parent")?.to_string();
        validate_parent(&parent)?;
        let policy = ctx
            .client()
            .get_iam_policy(&parent)
            .await
            .map_err(|e| e.for_resource(&parent))?;
        flatten_policy(&parent, &policy, data);
        data.set_id(parent);
        Ok(())
    }
}
