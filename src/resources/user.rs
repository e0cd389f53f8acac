//! `bytebase_user`.
//!
//! State keeps a SHA-256 digest of the password, never the password. A
//! declared password is sent whenever its digest differs from state; an
//! undeclared password is never sent.

use async_trait::async_trait;
use serde_json::Value;

use super::{name_attribute, required_str, Reconcile};
use crate::api::user::{User, SERVICE_ACCOUNT};
use crate::client::Result;
use crate::data::ResourceData;
use crate::mapper::hash::sha256_hex;
use crate::names::{self, USER_PREFIX};
use crate::schema::{Attribute, DiffSuppress, Schema, Validator};

/// Reconciles users and service accounts.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserResource;

impl UserResource {
    /// Digest of the declared password. On refresh the desired tree is the
    /// prior state, whose value is already the digest.
    fn password_state(&self, data: &ResourceData) -> String {
        match data.get_str("password") {
            Some(declared) => {
                let prior = data.get_prior("password").and_then(Value::as_str);
                match prior {
                    Some(hash) if hash == declared || hash == sha256_hex(declared) => hash.to_string(),
                    _ => sha256_hex(declared),
                }
            },
            None => String::new(),
        }
    }

    fn service_key_state(&self, user: &User, data: &ResourceData) -> String {
        if !user.service_key.is_empty() {
            return user.service_key.clone();
        }
        data.state_value("service_key")
            .or_else(|| data.get_prior("service_key"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl Reconcile for UserResource {
    type Message = User;

    const TYPE: &'static str = "user";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A Bytebase user or service account.")
            .with_attribute(
                "email",
                Attribute::required_string()
                    .with_validator(Validator::NonEmpty)
                    .with_update_path("email"),
            )
            .with_attribute("name", name_attribute())
            .with_attribute(
                "title",
                Attribute::required_string().with_update_path("title"),
            )
            .with_attribute(
                "type",
                Attribute::optional_computed_string()
                    .immutable()
                    .with_validator(Validator::one_of(&["USER", SERVICE_ACCOUNT, "SYSTEM_BOT"])),
            )
            .with_attribute(
                "password",
                Attribute::optional_string()
                    .sensitive()
                    .with_diff_suppress(DiffSuppress::Hashed)
                    .with_update_path("password"),
            )
            .with_attribute(
                "phone",
                Attribute::optional_string().with_update_path("phone"),
            )
            .with_attribute(
                "service_key",
                Attribute::computed_string()
                    .sensitive()
                    .with_description("Key of a service account; only returned on creation."),
            )
            .with_attribute("mfa_enabled", Attribute::computed_bool())
            .with_attribute("state", Attribute::computed_string())
            .with_attribute("create_time", Attribute::computed_string())
            .with_attribute("last_login_time", Attribute::computed_string())
            .importable()
    }

    fn lookup_keys(&self) -> &'static [&'static str] {
        &["email"]
    }

    fn canonical_name(&self, data: &ResourceData) -> Result<Option<String>> {
        let email = required_str(data, "email")?;
        Ok(Some(names::format_one(USER_PREFIX, email)))
    }

    fn resource_id(&self, _data: &ResourceData) -> Option<String> {
        None
    }

    fn expand(&self, data: &ResourceData, name: &str) -> Result<User> {
        Ok(User {
            name: name.to_string(),
            email: data.get_string("email"),
            title: data.get_string("title"),
            user_type: data.get_string("type"),
            password: data.get_string("password"),
            phone: data.get_string("phone"),
            ..Default::default()
        })
    }

    fn flatten(&self, user: &User, data: &mut ResourceData) -> Result<()> {
        names::parse_one(&user.name, USER_PREFIX)?;
        let password = self.password_state(data);
        let service_key = self.service_key_state(user, data);
        data.set("name", user.name.as_str());
        data.set("email", user.email.as_str());
        data.set("title", user.title.as_str());
        data.set("type", user.user_type.as_str());
        data.set("password", password);
        data.set("phone", user.phone.as_str());
        data.set("service_key", service_key);
        data.set("mfa_enabled", user.mfa_enabled);
        data.set("state", if user.state.is_deleted() { "DELETED" } else { "ACTIVE" });
        data.set("create_time", user.create_time.as_str());
        data.set("last_login_time", user.last_login_time.as_str());
        Ok(())
    }
}
