//! Process-wide wiring of the sync layer.
//!
//! The context owns the event bus, the registry and one store per item type.
//! It is created at startup, passed by reference to every reader and writer,
//! and torn down with [`AppContext::shutdown`].

use std::sync::Arc;

use tracing::info;

use crate::application::comments::CommentService;
use crate::application::error::AppError;
use crate::application::groups::GroupService;
use crate::application::posts::PostService;
use crate::application::repos::{CommentsApi, FilesApi, GroupsApi, Navigator, PostsApi};
use crate::cache::{CacheConfig, CacheRegistry, CacheStore, EventBus, MutationOrchestrator};
use crate::config::Settings;
use crate::domain::entities::{CategoryRecord, CommentRecord, PostRecord};
use crate::infra::rest::RestClient;

pub struct Stores {
    pub posts: Arc<CacheStore<PostRecord>>,
    pub comments: Arc<CacheStore<CommentRecord>>,
    pub categories: Arc<CacheStore<CategoryRecord>>,
}

impl Stores {
    fn new(config: &CacheConfig) -> Self {
        Self {
            posts: Arc::new(CacheStore::new("posts", config)),
            comments: Arc::new(CacheStore::new("comments", config)),
            categories: Arc::new(CacheStore::new("categories", config)),
        }
    }

    fn register(&self, registry: &CacheRegistry) {
        registry.register(self.posts.clone());
        registry.register(self.comments.clone());
        registry.register(self.categories.clone());
    }

    fn clear(&self) {
        self.posts.clear();
        self.comments.clear();
        self.categories.clear();
    }
}

pub struct AppContext {
    pub events: Arc<EventBus>,
    pub registry: Arc<CacheRegistry>,
    pub mutations: Arc<MutationOrchestrator>,
    pub stores: Stores,
    pub posts: PostService,
    pub comments: CommentService,
    pub groups: GroupService,
}

impl AppContext {
    /// Wire the services against the configured REST API.
    pub fn from_settings(
        settings: &Settings,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, AppError> {
        let client = Arc::new(RestClient::new(&settings.api)?);
        info!(base_url = %client.base(), "API client ready");
        Ok(Self::with_api(
            client,
            navigator,
            &CacheConfig::from(&settings.cache),
        ))
    }

    /// Wire the services against any implementation of the API traits.
    pub fn with_api<A>(api: Arc<A>, navigator: Arc<dyn Navigator>, config: &CacheConfig) -> Self
    where
        A: PostsApi + CommentsApi + GroupsApi + FilesApi + 'static,
    {
        let events = Arc::new(EventBus::new(config.event_capacity_clamped()));
        let registry = Arc::new(CacheRegistry::new(Arc::clone(&events)));
        let stores = Stores::new(config);
        stores.register(&registry);
        let mutations = Arc::new(MutationOrchestrator::new(Arc::clone(&registry)));

        let posts_api: Arc<dyn PostsApi> = api.clone();
        let comments_api: Arc<dyn CommentsApi> = api.clone();
        let groups_api: Arc<dyn GroupsApi> = api.clone();
        let files_api: Arc<dyn FilesApi> = api;

        let posts = PostService::new(
            posts_api,
            files_api,
            Arc::clone(&stores.posts),
            Arc::clone(&mutations),
        );
        let comments = CommentService::new(
            comments_api,
            Arc::clone(&stores.comments),
            Arc::clone(&mutations),
        );
        let groups = GroupService::new(
            groups_api,
            navigator,
            Arc::clone(&stores.categories),
            Arc::clone(&mutations),
        );

        Self {
            events,
            registry,
            mutations,
            stores,
            posts,
            comments,
            groups,
        }
    }

    /// Drop every cached query. Subscriptions stay valid but see no data
    /// until their next read.
    pub fn shutdown(self) {
        self.stores.clear();
        info!(
            subscribers = self.events.subscriber_count(),
            "Sync layer shut down"
        );
    }
}
