//! Application services driven through `AppContext` against an in-memory API.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pal_api_types::{
    CategoryResponse, CommentCreateRequest, CommentResponse, CountResponse, GroupCreateRequest,
    GroupMemberRequest, GroupResponse, GroupRoleValue, PageResponse, PostCreateRequest,
    PostResponse, UploadResponse,
};
use palsync::application::comments::{NewComment, add_comment_key, delete_key, thread_key};
use palsync::application::context::AppContext;
use palsync::application::groups::{GROUPS_ROUTE, NewGroup, categories_key, create_group_key};
use palsync::application::posts::{
    CreatePostCommand, create_post_key, feed_key, summarize_feed,
};
use palsync::application::repos::{
    ApiError, CommentsApi, FilesApi, GroupsApi, Navigator, PostsApi, UploadFile,
};
use palsync::cache::{
    CacheConfig, FetchError, MutationError, MutationHandle, MutationOptions, MutationStatus,
    QueryStatus,
};
use palsync::domain::entities::CommentRecord;
use palsync::domain::types::Role;
use palsync::domain::users::CurrentUser;
use palsync::infra::navigation::LoggingNavigator;
use time::macros::datetime;
use tokio::sync::Notify;
use uuid::Uuid;

const AUTHOR: Uuid = Uuid::from_u128(7);

#[derive(Default)]
struct FakeApi {
    calls: Mutex<Vec<String>>,
    created_posts: Mutex<Vec<PostCreateRequest>>,
    added_members: Mutex<Vec<GroupMemberRequest>>,
    fail_upload: Mutex<Option<String>>,
    fail_members: Mutex<bool>,
    hold_deletes: Mutex<Option<Arc<Notify>>>,
}

impl FakeApi {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("calls lock").push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

fn post(id: i64, group_id: i64) -> PostResponse {
    PostResponse {
        id,
        group_id,
        user_id: AUTHOR,
        content: format!("post {id}"),
        media: Vec::new(),
        created_at: datetime!(2024-06-01 12:00 UTC),
        comments: vec![CountResponse { count: 2 }],
        author: None,
    }
}

fn comment(id: i64, post_id: i64) -> CommentResponse {
    CommentResponse {
        id,
        post_id,
        user_id: AUTHOR,
        parent_comment_id: None,
        content: "{}".to_string(),
        created_at: datetime!(2024-06-01 12:30 UTC),
        author: None,
    }
}

#[async_trait]
impl PostsApi for FakeApi {
    async fn list_posts(
        &self,
        group_id: i64,
        cursor: Option<&str>,
    ) -> Result<PageResponse<PostResponse>, ApiError> {
        self.record(format!("list_posts:{group_id}:{}", cursor.unwrap_or("-")));
        Ok(match cursor {
            None => PageResponse {
                data: vec![post(2, group_id), post(1, group_id)],
                next_cursor: Some("after-1".to_string()),
            },
            Some(_) => PageResponse {
                data: vec![post(0, group_id)],
                next_cursor: None,
            },
        })
    }

    async fn create_post(&self, request: &PostCreateRequest) -> Result<(), ApiError> {
        self.record("create_post");
        self.created_posts
            .lock()
            .expect("posts lock")
            .push(request.clone());
        Ok(())
    }
}

#[async_trait]
impl CommentsApi for FakeApi {
    async fn list_comments(
        &self,
        post_id: i64,
        cursor: Option<&str>,
    ) -> Result<PageResponse<CommentResponse>, ApiError> {
        self.record(format!("list_comments:{post_id}:{}", cursor.unwrap_or("-")));
        Ok(PageResponse {
            data: vec![comment(42, post_id)],
            next_cursor: None,
        })
    }

    async fn create_comment(&self, request: &CommentCreateRequest) -> Result<(), ApiError> {
        self.record(format!("create_comment:{}", request.post_id));
        Ok(())
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), ApiError> {
        self.record(format!("delete_comment:{comment_id}"));
        let gate = self.hold_deletes.lock().expect("gate lock").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(())
    }
}

#[async_trait]
impl GroupsApi for FakeApi {
    async fn create_group(&self, request: &GroupCreateRequest) -> Result<GroupResponse, ApiError> {
        self.record("create_group");
        Ok(GroupResponse {
            id: 11,
            name: request.name.clone(),
            description: request.description.clone(),
            created_by: request.created_by,
            allow_invitation: request.allow_invitation,
            category_id: Some(request.category_id),
        })
    }

    async fn add_members(&self, members: &[GroupMemberRequest]) -> Result<(), ApiError> {
        self.record("add_members");
        if *self.fail_members.lock().expect("members lock") {
            return Err(ApiError::Status {
                status: 500,
                message: "insert failed".to_string(),
            });
        }
        self.added_members
            .lock()
            .expect("members lock")
            .extend_from_slice(members);
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<CategoryResponse>, ApiError> {
        self.record("list_categories");
        Ok(vec![CategoryResponse {
            id: 4,
            name: "Support".to_string(),
        }])
    }
}

#[async_trait]
impl FilesApi for FakeApi {
    async fn upload_post_image(
        &self,
        owner_id: Uuid,
        file: UploadFile,
    ) -> Result<UploadResponse, ApiError> {
        self.record(format!("upload:{}", file.file_name));
        let fail = self.fail_upload.lock().expect("upload lock").clone();
        if fail.as_deref() == Some(file.file_name.as_str()) {
            return Err(ApiError::from_transport("connection reset"));
        }
        Ok(UploadResponse {
            path: format!("{owner_id}/{}", file.file_name),
        })
    }
}

fn context(api: &Arc<FakeApi>) -> (AppContext, Arc<LoggingNavigator>) {
    let navigator = Arc::new(LoggingNavigator::new());
    let as_navigator: Arc<dyn Navigator> = navigator.clone();
    let app = AppContext::with_api(Arc::clone(api), as_navigator, &CacheConfig::default());
    (app, navigator)
}

fn user(role: Role) -> CurrentUser {
    CurrentUser {
        id: AUTHOR,
        role,
        first_name: "Ada".to_string(),
        avatar: None,
    }
}

#[tokio::test]
async fn feed_pages_are_merged_and_summarized() {
    let api = Arc::new(FakeApi::default());
    let (app, _) = context(&api);

    let first = app.posts.feed(3).await;
    assert_eq!(first.status, QueryStatus::Success);
    let next = app.posts.feed_next_page(3).await;
    let state = next.state().expect("second page");

    let summaries = summarize_feed(state, datetime!(2024-06-01 12:10 UTC));
    let ids: Vec<i64> = summaries.iter().map(|summary| summary.id).collect();
    assert_eq!(ids, vec![2, 1, 0]);
    assert!(summaries.iter().all(|summary| summary.comment_count == 2));
    assert_eq!(summaries[0].time, "10 minutes");
    assert_eq!(
        api.calls(),
        vec!["list_posts:3:-".to_string(), "list_posts:3:after-1".to_string()]
    );
}

#[tokio::test]
async fn create_post_uploads_in_order_then_invalidates_feed() {
    let api = Arc::new(FakeApi::default());
    let (app, _) = context(&api);
    app.posts.feed(3).await;
    app.posts.feed(4).await;

    let command = CreatePostCommand {
        group_id: 3,
        content: "Hello".to_string(),
        files: vec![
            UploadFile::new("a.png", vec![1_u8]),
            UploadFile::new("b.png", vec![2_u8]),
        ],
    };
    app.posts
        .create_post(
            &MutationHandle::new(create_post_key()),
            &user(Role::User),
            command,
            MutationOptions::new(),
        )
        .await
        .expect("post created");

    let calls = api.calls();
    assert_eq!(
        calls[2..].to_vec(),
        vec![
            "upload:a.png".to_string(),
            "upload:b.png".to_string(),
            "create_post".to_string()
        ]
    );
    let created = api.created_posts.lock().expect("posts lock").clone();
    assert_eq!(
        created[0].media,
        vec![format!("{AUTHOR}/a.png"), format!("{AUTHOR}/b.png")]
    );
    assert!(app.stores.posts.get(&feed_key(3)).expect("feed 3").stale);
    assert!(!app.stores.posts.get(&feed_key(4)).expect("feed 4").stale);

    app.posts.feed(3).await;
    assert_eq!(api.count("list_posts:3"), 2);
}

#[tokio::test]
async fn failed_upload_stops_the_sequence_as_partial_failure() {
    let api = Arc::new(FakeApi::default());
    *api.fail_upload.lock().expect("upload lock") = Some("b.png".to_string());
    let (app, _) = context(&api);
    app.posts.feed(3).await;

    let errors = Arc::new(Mutex::new(Vec::new()));
    let hook_errors = Arc::clone(&errors);
    let command = CreatePostCommand {
        group_id: 3,
        content: String::new(),
        files: vec![
            UploadFile::new("a.png", vec![1_u8]),
            UploadFile::new("b.png", vec![2_u8]),
            UploadFile::new("c.png", vec![3_u8]),
        ],
    };
    let result = app
        .posts
        .create_post(
            &MutationHandle::new(create_post_key()),
            &user(Role::User),
            command,
            MutationOptions::new().on_error(move |error| {
                hook_errors
                    .lock()
                    .expect("errors lock")
                    .push(error.clone());
            }),
        )
        .await;

    let error = result.expect_err("upload fails");
    assert!(matches!(
        error,
        MutationError::PartialFailure {
            completed: 1,
            total: 4,
            ..
        }
    ));
    assert_eq!(
        error.root_cause(),
        &MutationError::Fetch(FetchError::network("connection reset"))
    );
    assert_eq!(errors.lock().expect("errors lock").len(), 1);
    assert_eq!(api.count("upload:c.png"), 0);
    assert_eq!(api.count("create_post"), 0);
    assert!(!app.stores.posts.get(&feed_key(3)).expect("feed").stale);
}

#[tokio::test]
async fn post_without_text_or_media_is_sent() {
    let api = Arc::new(FakeApi::default());
    let (app, _) = context(&api);

    app.posts
        .create_post(
            &MutationHandle::new(create_post_key()),
            &user(Role::User),
            CreatePostCommand {
                group_id: 3,
                content: String::new(),
                files: Vec::new(),
            },
            MutationOptions::new(),
        )
        .await
        .expect("post created");

    let created = api.created_posts.lock().expect("posts lock").clone();
    assert_eq!(created.len(), 1);
    assert!(created[0].content.is_empty());
    assert!(created[0].media.is_empty());
}

#[tokio::test]
async fn create_group_adds_members_and_navigates() {
    let api = Arc::new(FakeApi::default());
    let (app, navigator) = context(&api);
    let invitee = Uuid::from_u128(99);
    app.groups.categories().await;
    app.posts.feed(3).await;
    let handle = MutationHandle::new(create_group_key());

    let created = app
        .groups
        .create_group(
            &handle,
            &user(Role::User),
            NewGroup {
                name: "Night owls".to_string(),
                description: "Late sleepers".to_string(),
                allow_invitation: true,
                category_id: Some(4),
                invitees: vec![invitee],
            },
            MutationOptions::new(),
        )
        .await
        .expect("group created");

    assert_eq!(created.id, 11);
    let members = api.added_members.lock().expect("members lock").clone();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].user_id, invitee);
    assert_eq!(members[0].role, GroupRoleValue::Member);
    assert_eq!(members[1].user_id, AUTHOR);
    assert_eq!(members[1].role, GroupRoleValue::Owner);
    assert!(members.iter().all(|member| member.post_group_id == 11));
    assert_eq!(navigator.visited(), vec![GROUPS_ROUTE.to_string()]);
    assert_eq!(handle.status(), MutationStatus::Success);
    assert!(!app.stores.categories.get(&categories_key()).expect("categories").stale);
    assert!(!app.stores.posts.get(&feed_key(3)).expect("feed").stale);
}

#[tokio::test]
async fn member_failure_still_navigates_after_group_exists() {
    let api = Arc::new(FakeApi::default());
    *api.fail_members.lock().expect("members lock") = true;
    let (app, navigator) = context(&api);

    let result = app
        .groups
        .create_group(
            &MutationHandle::new(create_group_key()),
            &user(Role::User),
            NewGroup {
                name: "Night owls".to_string(),
                description: String::new(),
                allow_invitation: false,
                category_id: Some(4),
                invitees: Vec::new(),
            },
            MutationOptions::new(),
        )
        .await;

    assert!(matches!(
        result,
        Err(MutationError::PartialFailure {
            completed: 1,
            total: 2,
            ..
        })
    ));
    assert_eq!(navigator.visited(), vec![GROUPS_ROUTE.to_string()]);
}

#[tokio::test]
async fn group_without_category_is_rejected() {
    let api = Arc::new(FakeApi::default());
    let (app, navigator) = context(&api);

    let result = app
        .groups
        .create_group(
            &MutationHandle::new(create_group_key()),
            &user(Role::User),
            NewGroup {
                name: "Night owls".to_string(),
                description: String::new(),
                allow_invitation: false,
                category_id: None,
                invitees: Vec::new(),
            },
            MutationOptions::new(),
        )
        .await;

    assert!(matches!(result, Err(MutationError::Validation(_))));
    assert!(api.calls().is_empty());
    assert!(navigator.visited().is_empty());
}

#[tokio::test]
async fn categories_are_fetched_once() {
    let api = Arc::new(FakeApi::default());
    let (app, _) = context(&api);

    let first = app.groups.categories().await;
    let second = app.groups.categories().await;

    assert_eq!(first.item_count(), 1);
    assert_eq!(second.item_count(), 1);
    assert!(!second.has_next_page());
    assert_eq!(api.count("list_categories"), 1);
}

#[tokio::test]
async fn adding_a_comment_refreshes_thread_and_feeds() {
    let api = Arc::new(FakeApi::default());
    let (app, _) = context(&api);
    app.comments.thread(5).await;
    app.posts.feed(3).await;

    app.comments
        .add_comment(
            &MutationHandle::new(add_comment_key(5)),
            NewComment {
                post_id: 5,
                parent_comment_id: Some(42),
                content: "{\"root\":{}}".to_string(),
            },
            MutationOptions::new(),
        )
        .await
        .expect("comment posted");

    assert!(app.stores.comments.get(&thread_key(5)).expect("thread").stale);
    assert!(app.stores.posts.get(&feed_key(3)).expect("feed").stale);
}

fn cached_comment(app: &AppContext, post_id: i64) -> CommentRecord {
    app.stores
        .comments
        .get(&thread_key(post_id))
        .and_then(|state| state.items().next().cloned())
        .expect("comment cached")
}

#[tokio::test]
async fn only_author_or_admin_may_delete_a_comment() {
    let api = Arc::new(FakeApi::default());
    let (app, _) = context(&api);
    app.comments.thread(5).await;
    let target = cached_comment(&app, 5);

    let stranger = CurrentUser {
        id: Uuid::from_u128(1234),
        ..user(Role::User)
    };
    let denied = app
        .comments
        .delete_comment(
            &MutationHandle::new(delete_key(target.id)),
            &stranger,
            &target,
            MutationOptions::new(),
        )
        .await;
    assert!(matches!(denied, Err(MutationError::Validation(_))));
    assert_eq!(api.count("delete_comment"), 0);
    assert!(!app.stores.comments.get(&thread_key(5)).expect("thread").stale);

    let admin = CurrentUser {
        id: Uuid::from_u128(1234),
        ..user(Role::Admin)
    };
    app.comments
        .delete_comment(
            &MutationHandle::new(delete_key(target.id)),
            &admin,
            &target,
            MutationOptions::new(),
        )
        .await
        .expect("admin deletes");
    assert_eq!(api.calls().last().map(String::as_str), Some("delete_comment:42"));
    assert!(app.stores.comments.get(&thread_key(5)).expect("thread").stale);
}

#[tokio::test]
async fn delete_status_moves_through_loading_to_success() {
    let api = Arc::new(FakeApi::default());
    let gate = Arc::new(Notify::new());
    *api.hold_deletes.lock().expect("gate lock") = Some(Arc::clone(&gate));
    let (app, _) = context(&api);
    app.comments.thread(5).await;
    let target = cached_comment(&app, 5);

    let handle = MutationHandle::new(delete_key(target.id));
    let mut watcher = handle.watch();
    let observe = async {
        watcher.changed().await.expect("handle alive");
        let during = watcher.borrow_and_update().clone();
        gate.notify_one();
        watcher.changed().await.expect("handle alive");
        let after = watcher.borrow_and_update().clone();
        (during, after)
    };
    let author = user(Role::User);
    let (result, (during, after)) = tokio::join!(
        app.comments
            .delete_comment(&handle, &author, &target, MutationOptions::new()),
        observe
    );

    result.expect("author deletes");
    assert_eq!(during, MutationStatus::Loading);
    assert_eq!(after, MutationStatus::Success);
    assert!(!handle.is_loading());
    assert_eq!(api.count("delete_comment"), 1);
}

#[tokio::test]
async fn shutdown_drops_cached_queries() {
    let api = Arc::new(FakeApi::default());
    let (app, _) = context(&api);
    app.posts.feed(3).await;
    let posts = Arc::clone(&app.stores.posts);
    assert_eq!(posts.len(), 1);

    app.shutdown();

    assert!(posts.is_empty());
}
