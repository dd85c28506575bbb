//! Integration tests for the cache/load engine over a scripted source:
//! warming diffs, preloading, deadline partials and cancellation.

use std::{collections::HashSet, sync::Arc, time::Duration};

use cull_core::AssetId;
use cull_engine::{AssetCacheEngine, DeadlineConfig, EngineOptions, RenditionQuality};
use cull_test_utils::ScriptedSource;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

fn fast_deadlines() -> DeadlineConfig {
    DeadlineConfig {
        thumbnail: Duration::from_millis(50),
        preview: Duration::from_millis(100),
        full: Duration::from_millis(150),
        motion: Duration::from_millis(200),
    }
}

fn engine_over(
    source: Arc<ScriptedSource>,
    window_size: usize,
    preload_depth: usize,
) -> AssetCacheEngine<ScriptedSource> {
    let options = EngineOptions::default()
        .with_window_size(window_size)
        .with_preload_depth(preload_depth)
        .with_deadlines(fast_deadlines());
    AssetCacheEngine::new(source, options, CancellationToken::new())
}

async fn order_of(source: &ScriptedSource) -> Vec<AssetId> {
    use cull_engine::AssetSource;
    source
        .fetch_all()
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.id)
        .collect()
}

/// Wait (bounded) until `predicate` holds; preloads run as free tasks.
async fn eventually(mut predicate: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn load_fetches_and_caches_a_rendition() {
    let source = Arc::new(ScriptedSource::with_photos(4));
    let engine = engine_over(source.clone(), 3, 0);
    let a = ScriptedSource::id(0);

    let rendition = engine.load(&a, RenditionQuality::Full).await.unwrap();
    assert_eq!(rendition.asset, a);
    assert_eq!(rendition.quality, RenditionQuality::Full);

    // Second load is a cache hit: the source sees exactly one fetch.
    let again = engine.load(&a, RenditionQuality::Full).await.unwrap();
    assert_eq!(again, rendition);
    assert_eq!(source.load_log().len(), 1);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn window_moves_emit_exact_warming_diffs() {
    let source = Arc::new(ScriptedSource::with_photos(20));
    let engine = engine_over(source.clone(), 5, 0);
    let order = order_of(&source).await;

    engine.update_window(0, &order);
    assert_eq!(
        source.currently_warm(),
        order[0..5].iter().cloned().collect::<HashSet<_>>()
    );

    engine.update_window(1, &order);
    assert_eq!(
        source.currently_warm(),
        order[1..6].iter().cloned().collect::<HashSet<_>>()
    );
    // One item left, one entered.
    assert_eq!(source.stopped_log().last().unwrap(), &vec![order[0].clone()]);
    assert_eq!(source.started_log().last().unwrap(), &vec![order[5].clone()]);

    // A far jump replaces the whole window.
    engine.update_window(12, &order);
    assert_eq!(
        source.currently_warm(),
        order[12..17].iter().cloned().collect::<HashSet<_>>()
    );
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn window_clips_at_the_end_of_the_list() {
    let source = Arc::new(ScriptedSource::with_photos(6));
    let engine = engine_over(source.clone(), 5, 0);
    let order = order_of(&source).await;

    engine.update_window(4, &order);
    assert_eq!(
        source.currently_warm(),
        order[4..6].iter().cloned().collect::<HashSet<_>>()
    );
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn preload_makes_the_next_item_a_cache_hit() {
    let source = Arc::new(ScriptedSource::with_photos(10));
    let engine = engine_over(source.clone(), 5, 2);
    let order = order_of(&source).await;

    engine.update_window(0, &order);
    let next = ScriptedSource::id(1);
    assert!(
        eventually(|| engine.is_cached(&next, RenditionQuality::Preview)).await,
        "preview for the next item should be preloaded"
    );

    let loads_before = source.load_log().len();
    let rendition = engine.load(&next, RenditionQuality::Preview).await.unwrap();
    assert_eq!(rendition.asset, next);
    assert_eq!(
        source.load_log().len(),
        loads_before,
        "advancing must be served from cache"
    );
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn leaving_the_window_evicts_and_cancels() {
    let source = Arc::new(ScriptedSource::with_photos(30));
    // Stall the preload two ahead so it is still in flight when we jump.
    source.stall(ScriptedSource::id(2));
    let engine = engine_over(source.clone(), 3, 2);
    let order = order_of(&source).await;

    engine.update_window(0, &order);
    let near = ScriptedSource::id(1);
    assert!(eventually(|| engine.is_cached(&near, RenditionQuality::Preview)).await);

    // Jump far away: everything around position 0 leaves the window.
    engine.update_window(20, &order);
    assert!(
        !engine.is_cached(&near, RenditionQuality::Preview),
        "renditions outside the window must be evicted"
    );
    let warm = source.currently_warm();
    assert!(warm.contains(&ScriptedSource::id(20)));
    assert!(!warm.contains(&ScriptedSource::id(1)));

    // The stalled preload for id(2) was cancelled, not leaked: its slot
    // frees up and the engine keeps working.
    let current = ScriptedSource::id(20);
    assert!(engine.load(&current, RenditionQuality::Preview).await.is_some());
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn stalled_load_times_out_with_a_placeholder() {
    let source = Arc::new(ScriptedSource::with_photos(3));
    source.stall(ScriptedSource::id(0));
    let engine = engine_over(source.clone(), 3, 0);

    let outcome = engine
        .load(&ScriptedSource::id(0), RenditionQuality::Full)
        .await;
    assert!(outcome.is_none(), "a stalled fetch must resolve to None");
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn partial_rendition_survives_the_deadline() {
    let source = Arc::new(ScriptedSource::with_photos(3));
    source.partial_then_stall(ScriptedSource::id(0));
    let engine = engine_over(source.clone(), 3, 0);
    let a = ScriptedSource::id(0);

    let rendition = engine.load(&a, RenditionQuality::Full).await.unwrap();
    // The degraded thumbnail published before the stall is what we get.
    assert_eq!(rendition.quality, RenditionQuality::Thumbnail);

    // Partials are not cached under the requested quality; the next view
    // retries the fetch.
    assert!(!engine.is_cached(&a, RenditionQuality::Full));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn failing_load_resolves_promptly_to_none() {
    let source = Arc::new(ScriptedSource::with_photos(3));
    source.fail_loads(ScriptedSource::id(1));
    let engine = engine_over(source.clone(), 3, 0);

    let started = std::time::Instant::now();
    let outcome = engine
        .load(&ScriptedSource::id(1), RenditionQuality::Motion)
        .await;
    assert!(outcome.is_none());
    // Resolves on failure, well before the motion deadline.
    assert!(started.elapsed() < Duration::from_millis(150));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_releases_inflight_loads() {
    let source = Arc::new(ScriptedSource::with_photos(3));
    source.stall(ScriptedSource::id(0));
    let options = EngineOptions::default().with_deadlines(DeadlineConfig {
        full: Duration::from_secs(30),
        ..fast_deadlines()
    });
    let engine = Arc::new(AssetCacheEngine::new(
        source.clone(),
        options,
        CancellationToken::new(),
    ));

    let loader = tokio::spawn({
        let engine = engine.clone();
        async move {
            engine
                .load(&ScriptedSource::id(0), RenditionQuality::Full)
                .await
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.shutdown();

    let outcome = loader.await.unwrap();
    assert!(outcome.is_none(), "shutdown must release waiting callers");
}
