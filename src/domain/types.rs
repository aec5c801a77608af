//! Shared domain enumerations aligned with the API's string values.

use pal_api_types::GroupRoleValue;
use serde::{Deserialize, Serialize};

/// Platform-wide role of a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

/// Role of a member inside one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Owner,
    Member,
}

impl GroupRole {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupRole::Owner => "owner",
            GroupRole::Member => "member",
        }
    }
}

impl From<GroupRole> for GroupRoleValue {
    fn from(value: GroupRole) -> Self {
        match value {
            GroupRole::Owner => GroupRoleValue::Owner,
            GroupRole::Member => GroupRoleValue::Member,
        }
    }
}

impl From<GroupRoleValue> for GroupRole {
    fn from(value: GroupRoleValue) -> Self {
        match value {
            GroupRoleValue::Owner => GroupRole::Owner,
            GroupRoleValue::Member => GroupRole::Member,
        }
    }
}
