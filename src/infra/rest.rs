//! REST client for the Tinnitus pal API.

use async_trait::async_trait;
use bytes::Bytes;
use pal_api_types::{
    CategoryResponse, CommentCreateRequest, CommentResponse, ErrorResponse, GroupCreateRequest,
    GroupMemberRequest, GroupResponse, PageResponse, PostCreateRequest, PostResponse,
    UploadResponse,
};
use reqwest::{Client, Method, RequestBuilder, Url, multipart};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{
    ApiError, CommentsApi, FilesApi, GroupsApi, PostsApi, UploadFile,
};
use crate::config::ApiSettings;

use super::error::InfraError;

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Clone, Debug)]
pub struct RestClient {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl RestClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base: settings.base_url.clone(),
            token: settings.token.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("palsync/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|err| ApiError::Transport(format!("invalid request path `{path}`: {err}")))?;
        if !query.is_empty() {
            url.set_query(None);
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn builder(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(method = %method, url = %url, "Sending API request");
        let request = self.client.request(method, url);
        match self.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Issue a request and decode the JSON response body.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let bytes = self.request_raw(method, path, query, body).await?;
        serde_json::from_slice(&bytes).map_err(ApiError::from_decode)
    }

    /// Issue a request whose response body is ignored.
    pub async fn request_unit<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.request_raw(method, path, &[], body).await.map(|_| ())
    }

    async fn request_raw<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Bytes, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path, query)?;
        let mut request = self.builder(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        Self::send(request).await
    }

    async fn send(request: RequestBuilder) -> Result<Bytes, ApiError> {
        let response = request.send().await.map_err(ApiError::from_transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(ApiError::from_transport)?;
        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&bytes)
                .map(|error| error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(bytes)
    }
}

fn cursor_query(key: &'static str, id: i64, cursor: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = vec![(key, id.to_string())];
    if let Some(cursor) = cursor {
        query.push(("cursor", cursor.to_string()));
    }
    query
}

#[async_trait]
impl PostsApi for RestClient {
    async fn list_posts(
        &self,
        group_id: i64,
        cursor: Option<&str>,
    ) -> Result<PageResponse<PostResponse>, ApiError> {
        let query = cursor_query("groupId", group_id, cursor);
        self.request::<_, ()>(Method::GET, "posts", &query, None)
            .await
    }

    async fn create_post(&self, request: &PostCreateRequest) -> Result<(), ApiError> {
        self.request_unit(Method::POST, "posts", Some(request)).await
    }
}

#[async_trait]
impl CommentsApi for RestClient {
    async fn list_comments(
        &self,
        post_id: i64,
        cursor: Option<&str>,
    ) -> Result<PageResponse<CommentResponse>, ApiError> {
        let query = cursor_query("postId", post_id, cursor);
        self.request::<_, ()>(Method::GET, "comments", &query, None)
            .await
    }

    async fn create_comment(&self, request: &CommentCreateRequest) -> Result<(), ApiError> {
        self.request_unit(Method::POST, "comments", Some(request))
            .await
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), ApiError> {
        self.request_unit::<()>(Method::DELETE, &format!("comments/{comment_id}"), None)
            .await
    }
}

#[async_trait]
impl GroupsApi for RestClient {
    async fn create_group(&self, request: &GroupCreateRequest) -> Result<GroupResponse, ApiError> {
        self.request(Method::POST, "groups", &[], Some(request))
            .await
    }

    async fn add_members(&self, members: &[GroupMemberRequest]) -> Result<(), ApiError> {
        self.request_unit(Method::POST, "group-members", Some(members))
            .await
    }

    async fn list_categories(&self) -> Result<Vec<CategoryResponse>, ApiError> {
        self.request::<_, ()>(Method::GET, "categories", &[], None)
            .await
    }
}

#[async_trait]
impl FilesApi for RestClient {
    async fn upload_post_image(
        &self,
        owner_id: Uuid,
        file: UploadFile,
    ) -> Result<UploadResponse, ApiError> {
        let mime = mime_guess::from_path(&file.file_name)
            .first_raw()
            .unwrap_or(FALLBACK_MIME);
        let part = multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(mime)
            .map_err(ApiError::from_transport)?;
        let form = multipart::Form::new()
            .text("ownerId", owner_id.to_string())
            .part("file", part);

        let url = self.url("uploads/post-images", &[])?;
        let bytes = Self::send(self.builder(Method::POST, url).multipart(form)).await?;
        serde_json::from_slice(&bytes).map_err(ApiError::from_decode)
    }
}
