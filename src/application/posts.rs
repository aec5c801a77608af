//! Group post feeds and post creation.

use std::sync::Arc;

use async_trait::async_trait;
use pal_api_types::PostCreateRequest;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::application::repos::{FilesApi, PostsApi, UploadFile};
use crate::cache::{
    CacheStore, Cursor, FetchError, KeyPrefix, MutationError, MutationHandle, MutationKey,
    MutationOptions, MutationOrchestrator, NextPage, Page, PageFetcher, QueryEngine, QueryKey,
    QueryState, Resource, StepProgress,
};
use crate::domain::entities::{PostRecord, PostSummary};
use crate::domain::error::DomainError;
use crate::domain::users::CurrentUser;

/// Cache key of a group's post feed.
pub fn feed_key(group_id: i64) -> QueryKey {
    QueryKey::new(Resource::Posts).with(group_id)
}

/// Single-flight key of post creation.
pub fn create_post_key() -> MutationKey {
    MutationKey::new("createPost")
}

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub group_id: i64,
    pub content: String,
    pub files: Vec<UploadFile>,
}

/// Fetches feed pages of one group.
pub struct PostFeedFetcher {
    api: Arc<dyn PostsApi>,
    group_id: i64,
}

#[async_trait]
impl PageFetcher<PostRecord> for PostFeedFetcher {
    async fn fetch_page(&self, cursor: Option<Cursor>) -> Result<Page<PostRecord>, FetchError> {
        let response = self
            .api
            .list_posts(self.group_id, cursor.as_ref().map(Cursor::as_str))
            .await?;
        Ok(Page::new(
            response.data.into_iter().map(PostRecord::from).collect(),
            response.next_cursor.map(Cursor::new),
        ))
    }
}

pub struct PostService {
    api: Arc<dyn PostsApi>,
    files: Arc<dyn FilesApi>,
    engine: QueryEngine<PostRecord>,
    mutations: Arc<MutationOrchestrator>,
}

impl PostService {
    pub fn new(
        api: Arc<dyn PostsApi>,
        files: Arc<dyn FilesApi>,
        store: Arc<CacheStore<PostRecord>>,
        mutations: Arc<MutationOrchestrator>,
    ) -> Self {
        let engine = QueryEngine::new(store, Arc::clone(mutations.registry().events()));
        Self {
            api,
            files,
            engine,
            mutations,
        }
    }

    pub fn engine(&self) -> &QueryEngine<PostRecord> {
        &self.engine
    }

    fn fetcher(&self, group_id: i64) -> PostFeedFetcher {
        PostFeedFetcher {
            api: Arc::clone(&self.api),
            group_id,
        }
    }

    /// First page of the feed, or the cached pages when fresh.
    pub async fn feed(&self, group_id: i64) -> QueryState<PostRecord> {
        self.engine
            .query(&feed_key(group_id), &self.fetcher(group_id))
            .await
    }

    pub async fn feed_next_page(&self, group_id: i64) -> NextPage<PostRecord> {
        self.engine
            .fetch_next_page(&feed_key(group_id), &self.fetcher(group_id))
            .await
    }

    /// Upload the attached files in order, then create the post with their
    /// storage paths.
    ///
    /// An upload failure stops the sequence; files already uploaded stay on
    /// the server. On success the group's feed is invalidated. Progress is
    /// reported on `handle`, usually built from [`create_post_key`].
    #[instrument(skip_all, fields(group_id = command.group_id, files = command.files.len()))]
    pub async fn create_post(
        &self,
        handle: &MutationHandle,
        user: &CurrentUser,
        command: CreatePostCommand,
        options: MutationOptions<()>,
    ) -> Result<(), MutationError> {
        let options = options.invalidate(KeyPrefix::from(feed_key(command.group_id)));
        let api = Arc::clone(&self.api);
        let files = Arc::clone(&self.files);
        let user_id = user.id;

        self.mutations
            .run(
                handle,
                command,
                move |command| async move {
                    let mut progress = StepProgress::new(command.files.len() + 1);
                    let mut media = Vec::with_capacity(command.files.len());
                    for file in command.files {
                        let uploaded = progress
                            .step(files.upload_post_image(user_id, file))
                            .await?;
                        debug!(path = %uploaded.path, "Uploaded post image");
                        media.push(uploaded.path);
                    }

                    let request = PostCreateRequest {
                        group_id: command.group_id,
                        user_id,
                        content: command.content,
                        media,
                    };
                    progress.step(api.create_post(&request)).await
                },
                options,
            )
            .await
    }
}

/// Feed items projected for display, aged relative to `now`.
pub fn summarize_feed(state: &QueryState<PostRecord>, now: OffsetDateTime) -> Vec<PostSummary> {
    state.items().map(|post| post.summarize(now)).collect()
}

pub(crate) fn domain_to_mutation(error: DomainError) -> MutationError {
    match error {
        DomainError::Validation { message } => MutationError::Validation(message),
        forbidden @ DomainError::Forbidden { .. } => MutationError::validation(forbidden.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_key_is_scoped_by_group() {
        assert_eq!(feed_key(3).to_string(), "posts/3");
        assert_ne!(feed_key(3), feed_key(30));
        assert_eq!(create_post_key().as_str(), "createPost");
    }
}
