//! Comment threads: reading, replying and deleting.

use std::sync::Arc;

use async_trait::async_trait;
use pal_api_types::CommentCreateRequest;
use tracing::instrument;

use crate::application::posts::domain_to_mutation;
use crate::application::repos::CommentsApi;
use crate::cache::{
    CacheStore, Cursor, FetchError, KeyPrefix, MutationError, MutationHandle, MutationKey,
    MutationOptions, MutationOrchestrator, NextPage, Page, PageFetcher, QueryEngine, QueryKey,
    QueryState, Resource,
};
use crate::domain::entities::CommentRecord;
use crate::domain::error::DomainError;
use crate::domain::users::CurrentUser;

/// Cache key of a post's comment thread.
pub fn thread_key(post_id: i64) -> QueryKey {
    QueryKey::new(Resource::Comments).with(post_id)
}

/// Single-flight key of a comment posted on `post_id`.
pub fn add_comment_key(post_id: i64) -> MutationKey {
    MutationKey::scoped("addComment", post_id)
}

/// Single-flight key of a comment deletion.
pub fn delete_key(comment_id: i64) -> MutationKey {
    MutationKey::scoped("deleteComment", comment_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub post_id: i64,
    /// Set when replying to another comment.
    pub parent_comment_id: Option<i64>,
    /// Serialized editor state.
    pub content: String,
}

pub struct CommentThreadFetcher {
    api: Arc<dyn CommentsApi>,
    post_id: i64,
}

#[async_trait]
impl PageFetcher<CommentRecord> for CommentThreadFetcher {
    async fn fetch_page(&self, cursor: Option<Cursor>) -> Result<Page<CommentRecord>, FetchError> {
        let response = self
            .api
            .list_comments(self.post_id, cursor.as_ref().map(Cursor::as_str))
            .await?;
        Ok(Page::new(
            response.data.into_iter().map(CommentRecord::from).collect(),
            response.next_cursor.map(Cursor::new),
        ))
    }
}

pub struct CommentService {
    api: Arc<dyn CommentsApi>,
    engine: QueryEngine<CommentRecord>,
    mutations: Arc<MutationOrchestrator>,
}

impl CommentService {
    pub fn new(
        api: Arc<dyn CommentsApi>,
        store: Arc<CacheStore<CommentRecord>>,
        mutations: Arc<MutationOrchestrator>,
    ) -> Self {
        let engine = QueryEngine::new(store, Arc::clone(mutations.registry().events()));
        Self {
            api,
            engine,
            mutations,
        }
    }

    pub fn engine(&self) -> &QueryEngine<CommentRecord> {
        &self.engine
    }

    fn fetcher(&self, post_id: i64) -> CommentThreadFetcher {
        CommentThreadFetcher {
            api: Arc::clone(&self.api),
            post_id,
        }
    }

    pub async fn thread(&self, post_id: i64) -> QueryState<CommentRecord> {
        self.engine
            .query(&thread_key(post_id), &self.fetcher(post_id))
            .await
    }

    pub async fn thread_next_page(&self, post_id: i64) -> NextPage<CommentRecord> {
        self.engine
            .fetch_next_page(&thread_key(post_id), &self.fetcher(post_id))
            .await
    }

    /// Post a comment or reply.
    ///
    /// Invalidates the thread and every post feed, since feeds carry comment
    /// counts. Progress is reported on `handle`, usually built from
    /// [`add_comment_key`].
    #[instrument(skip_all, fields(post_id = comment.post_id))]
    pub async fn add_comment(
        &self,
        handle: &MutationHandle,
        comment: NewComment,
        options: MutationOptions<()>,
    ) -> Result<(), MutationError> {
        let options = options
            .invalidate(KeyPrefix::from(thread_key(comment.post_id)))
            .invalidate(KeyPrefix::resource(Resource::Posts));
        let api = Arc::clone(&self.api);

        self.mutations
            .run(
                handle,
                comment,
                move |comment| async move {
                    if comment.content.trim().is_empty() {
                        return Err(domain_to_mutation(DomainError::validation(
                            "comment is empty",
                        )));
                    }
                    let request = CommentCreateRequest {
                        post_id: comment.post_id,
                        parent_comment_id: comment.parent_comment_id,
                        content: comment.content,
                    };
                    api.create_comment(&request).await.map_err(Into::into)
                },
                options,
            )
            .await
    }

    /// Delete `comment` on behalf of `user`.
    ///
    /// Only admins and the comment's author may delete; anyone else gets a
    /// validation error without a request being sent. `handle`, usually
    /// built from [`delete_key`], carries the per-call status a confirm
    /// control can watch.
    #[instrument(skip_all, fields(comment_id = comment.id))]
    pub async fn delete_comment(
        &self,
        handle: &MutationHandle,
        user: &CurrentUser,
        comment: &CommentRecord,
        options: MutationOptions<()>,
    ) -> Result<(), MutationError> {
        let options = options.invalidate(KeyPrefix::from(thread_key(comment.post_id)));
        let api = Arc::clone(&self.api);
        let allowed = user.can_delete_comment(comment);

        self.mutations
            .run(
                handle,
                comment.id,
                move |comment_id| async move {
                    if !allowed {
                        return Err(domain_to_mutation(DomainError::forbidden(
                            "delete comment",
                        )));
                    }
                    api.delete_comment(comment_id).await.map_err(Into::into)
                },
                options,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_render_like_the_api_paths() {
        assert_eq!(thread_key(9).to_string(), "comments/9");
        assert_eq!(delete_key(42).as_str(), "deleteComment:42");
        assert_eq!(add_comment_key(9).as_str(), "addComment:9");
    }
}
