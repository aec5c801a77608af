//! The signed-in user as seen by the sync layer.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::domain::entities::CommentRecord;
use crate::domain::types::Role;

/// Read-only identity supplied by the auth context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
    pub first_name: String,
    /// Storage path of the avatar image, relative to the avatar base URL.
    pub avatar: Option<String>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may delete any comment; other users only their own.
    pub fn can_delete_comment(&self, comment: &CommentRecord) -> bool {
        self.is_admin() || self.id == comment.user_id
    }

    /// Absolute avatar URL, when both a base URL and an avatar are known.
    pub fn avatar_url(&self, base: Option<&Url>) -> Option<String> {
        let (base, avatar) = (base?, self.avatar.as_deref()?);
        Some(format!("{}{}", base.as_str(), avatar))
    }
}
