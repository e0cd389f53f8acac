//! Users and service accounts.

use serde::{Deserialize, Serialize};

use super::State;
use crate::client::{ApiMessage, Collection};

/// `users/{email}`, soft-deletable. The server derives the name from the
/// email, so create takes no id.
pub static USERS: Collection = Collection {
    soft_delete: true,
    ..Collection::rest("users", "User", "UserService", "user")
};

/// User type of service accounts.
pub const SERVICE_ACCOUNT: &str = "SERVICE_ACCOUNT";

/// A user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub name: String,
    pub state: State,
    pub email: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub phone: String,
    #[serde(skip_serializing)]
    pub service_key: String,
    #[serde(skip_serializing)]
    pub mfa_enabled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub create_time: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_login_time: String,
}

impl ApiMessage for User {
    fn collection() -> &'static Collection {
        &USERS
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> State {
        self.state
    }
}
