//! Collaborator traits describing the REST API and other client surfaces.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use pal_api_types::{
    CategoryResponse, CommentCreateRequest, CommentResponse, GroupCreateRequest,
    GroupMemberRequest, GroupResponse, PageResponse, PostCreateRequest, PostResponse,
    UploadResponse,
};
use thiserror::Error;
use uuid::Uuid;

use crate::cache::{FetchError, MutationError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("api responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn from_transport(err: impl fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn from_decode(err: impl fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<ApiError> for FetchError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Transport(message) => FetchError::Network(message),
            ApiError::Status { status, message } => FetchError::Status { status, message },
            ApiError::Decode(message) => FetchError::Decode(message),
        }
    }
}

impl From<ApiError> for MutationError {
    fn from(error: ApiError) -> Self {
        MutationError::Fetch(error.into())
    }
}

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
pub trait PostsApi: Send + Sync {
    async fn list_posts(
        &self,
        group_id: i64,
        cursor: Option<&str>,
    ) -> Result<PageResponse<PostResponse>, ApiError>;

    async fn create_post(&self, request: &PostCreateRequest) -> Result<(), ApiError>;
}

#[async_trait]
pub trait CommentsApi: Send + Sync {
    async fn list_comments(
        &self,
        post_id: i64,
        cursor: Option<&str>,
    ) -> Result<PageResponse<CommentResponse>, ApiError>;

    async fn create_comment(&self, request: &CommentCreateRequest) -> Result<(), ApiError>;

    async fn delete_comment(&self, comment_id: i64) -> Result<(), ApiError>;
}

#[async_trait]
pub trait GroupsApi: Send + Sync {
    async fn create_group(&self, request: &GroupCreateRequest) -> Result<GroupResponse, ApiError>;

    async fn add_members(&self, members: &[GroupMemberRequest]) -> Result<(), ApiError>;

    async fn list_categories(&self) -> Result<Vec<CategoryResponse>, ApiError>;
}

#[async_trait]
pub trait FilesApi: Send + Sync {
    async fn upload_post_image(
        &self,
        owner_id: Uuid,
        file: UploadFile,
    ) -> Result<UploadResponse, ApiError>;
}

/// Route changes requested after successful mutations.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}
