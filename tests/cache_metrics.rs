use std::collections::HashSet;
use std::sync::Arc;

use metrics_util::debugging::DebuggingRecorder;
use palsync::cache::{
    CacheConfig, CacheRegistry, CacheStore, Cursor, EventBus, FetchError, KeyPrefix, MutationKey,
    MutationOptions, MutationOrchestrator, Page, QueryEngine, QueryKey, QueryState, Resource,
    fetcher_fn,
};
use palsync::infra::telemetry;

#[tokio::test]
async fn sync_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let config = CacheConfig {
        idle_entry_limit: 1,
        ..Default::default()
    };
    let events = Arc::new(EventBus::new(config.event_capacity));
    let registry = Arc::new(CacheRegistry::new(Arc::clone(&events)));
    let store: Arc<CacheStore<u32>> = Arc::new(CacheStore::new("numbers", &config));
    registry.register(store.clone());
    let engine = QueryEngine::new(Arc::clone(&store), Arc::clone(&events));
    let mutations = MutationOrchestrator::new(registry);

    // Miss, hit and a failed fetch
    let ok = fetcher_fn(|_cursor: Option<Cursor>| async { Ok(Page::last(vec![1_u32])) });
    let failing = fetcher_fn(|_cursor: Option<Cursor>| async {
        Err::<Page<u32>, _>(FetchError::network("offline"))
    });
    let first = QueryKey::new(Resource::Posts).with(1);
    engine.query(&first, &ok).await;
    engine.query(&first, &ok).await;
    engine
        .query(&QueryKey::new(Resource::Posts).with(2), &failing)
        .await;

    // Idle eviction
    store.set(&QueryKey::new(Resource::Posts).with(3), QueryState::success(Vec::new()));

    // Mutations: success with invalidation, failure
    mutations
        .mutate(
            &MutationKey::new("touch"),
            (),
            |()| async { Ok(()) },
            MutationOptions::new().invalidate(KeyPrefix::resource(Resource::Posts)),
        )
        .await
        .expect("mutation succeeds");
    let _ = mutations
        .mutate(
            &MutationKey::new("break"),
            (),
            |()| async { Err::<(), _>(FetchError::network("offline").into()) },
            MutationOptions::new(),
        )
        .await;

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "palsync_query_hit_total",
        "palsync_query_miss_total",
        "palsync_page_fetch_total",
        "palsync_page_fetch_failed_total",
        "palsync_page_fetch_ms",
        "palsync_cache_evict_total",
        "palsync_invalidated_keys_total",
        "palsync_mutation_total",
        "palsync_mutation_failed_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
