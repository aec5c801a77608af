//! Domain entities mirrored from API responses.

use pal_api_types::{
    AuthorResponse, CategoryResponse, CommentResponse, GroupResponse, PostResponse,
};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::relative_time;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub first_name: String,
    pub avatar: Option<String>,
}

impl From<AuthorResponse> for Author {
    fn from(value: AuthorResponse) -> Self {
        Self {
            first_name: value.first_name,
            avatar: value.avatar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub group_id: i64,
    pub user_id: Uuid,
    pub content: String,
    pub media: Vec<String>,
    /// Aggregated by the API; zero when the aggregate is missing.
    pub comment_count: u64,
    pub author: Option<Author>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PostRecord {
    /// Feed projection with the age rendered relative to `now`.
    pub fn summarize(&self, now: OffsetDateTime) -> PostSummary {
        PostSummary {
            id: self.id,
            group_id: self.group_id,
            user_id: self.user_id,
            author_name: self.author.as_ref().map(|author| author.first_name.clone()),
            content: self.content.clone(),
            media: self.media.clone(),
            comment_count: self.comment_count,
            time: relative_time::distance_between(self.created_at, now),
        }
    }
}

impl From<PostResponse> for PostRecord {
    fn from(value: PostResponse) -> Self {
        Self {
            comment_count: value.comments.first().map_or(0, |count| count.count),
            id: value.id,
            group_id: value.group_id,
            user_id: value.user_id,
            content: value.content,
            media: value.media,
            author: value.author.map(Author::from),
            created_at: value.created_at,
        }
    }
}

/// Post as listed in a group feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    pub id: i64,
    pub group_id: i64,
    pub user_id: Uuid,
    pub author_name: Option<String>,
    pub content: String,
    pub media: Vec<String>,
    pub comment_count: u64,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub user_id: Uuid,
    pub parent_comment_id: Option<i64>,
    pub content: String,
    pub author: Option<Author>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl CommentRecord {
    pub fn is_reply(&self) -> bool {
        self.parent_comment_id.is_some()
    }
}

impl From<CommentResponse> for CommentRecord {
    fn from(value: CommentResponse) -> Self {
        Self {
            id: value.id,
            post_id: value.post_id,
            user_id: value.user_id,
            parent_comment_id: value.parent_comment_id,
            content: value.content,
            author: value.author.map(Author::from),
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_by: Uuid,
    pub allow_invitation: bool,
    pub category_id: Option<i64>,
}

impl From<GroupResponse> for GroupRecord {
    fn from(value: GroupResponse) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            created_by: value.created_by,
            allow_invitation: value.allow_invitation,
            category_id: value.category_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
}

impl From<CategoryResponse> for CategoryRecord {
    fn from(value: CategoryResponse) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}
