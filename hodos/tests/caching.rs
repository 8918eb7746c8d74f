//! Cache behaviour across execute calls
//!
//! This test verifies that:
//! 1. Redefined options keep serving stale values until reset
//! 2. Reset modes recompute exactly the affected keys
//! 3. File, routed and cache-only setups read back what was stored
//! 4. With locking, concurrent paths compute a shared key once

use hodos::prelude::*;
use hodos::{Codec, Squeezed};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn suffix(tag: &'static str) -> impl Fn(&[String]) -> Result<String, String> + Send + Sync {
    move |inputs: &[String]| Ok(format!("{}-{tag}", inputs[0]))
}

/// a (a1) -> b (b1, b2)
fn chain() -> Graph<String> {
    let mut graph = Graph::new();
    graph.add_option("a", "a1", suffix("a1")).unwrap();
    graph.add_step("b", ["a"]).unwrap();
    graph.add_option("b", "b1", suffix("b1")).unwrap();
    graph.add_option("b", "b2", suffix("b2")).unwrap();
    graph
}

fn input() -> Inputs<String> {
    Inputs::from("x".to_string())
}

fn every_path() -> ExecuteOptions {
    ExecuteOptions::new().all().any_option()
}

async fn single(executor: &Executor, graph: &Graph<String>, options: ExecuteOptions) -> String {
    match executor
        .execute(graph, &input(), &options)
        .await
        .unwrap()
        .squeeze()
        .unwrap()
    {
        Squeezed::Value(value) => value,
        other => panic!("expected one value, got {other:?}"),
    }
}

#[tokio::test]
async fn test_redefined_option_is_stale_until_reset() {
    let mut graph: Graph<String> = Graph::new();
    graph.add_option("s", "o", suffix("v1")).unwrap();
    let executor = Executor::in_memory();

    assert_eq!(single(&executor, &graph, ExecuteOptions::new()).await, "x-v1");

    graph.set_allow_overwrite(true);
    graph.redefine_option("s", "o", suffix("v2")).unwrap();
    assert_eq!(single(&executor, &graph, ExecuteOptions::new()).await, "x-v1");

    let reset = ExecuteOptions::new().cache_reset(CacheReset::LastStep);
    assert_eq!(single(&executor, &graph, reset).await, "x-v2");
    assert_eq!(single(&executor, &graph, ExecuteOptions::new()).await, "x-v2");
}

#[tokio::test]
async fn test_reset_modes() {
    let graph = chain();
    let executor = Executor::in_memory();
    let base = ExecuteOptions::new()
        .step("b")
        .option(Matcher::exact("b1"))
        .cache_include(CacheRule::step("a"));

    let first = executor.execute(&graph, &input(), &base).await.unwrap();
    assert_eq!(first.stats().computed, 2);

    let cached = executor.execute(&graph, &input(), &base).await.unwrap();
    assert_eq!(cached.stats().computed, 0);

    let last = base.clone().cache_reset(CacheReset::LastStep);
    let results = executor.execute(&graph, &input(), &last).await.unwrap();
    assert_eq!(results.stats().computed, 1);

    let all = base.cache_reset(CacheReset::All);
    let results = executor.execute(&graph, &input(), &all).await.unwrap();
    assert_eq!(results.stats().computed, 2);
    assert_eq!(results.records()[0].value().map(String::as_str), Some("x-a1-b1"));
}

#[tokio::test]
async fn test_reset_refreshes_shared_key_once() {
    let graph = chain();
    let config = ExecutorConfig::default().with_strategy(Strategy::BreadthFirst);
    let executor = Executor::with_cache(Arc::new(InMemoryCache::new()), config);
    let options = every_path().cache_include(CacheRule::step("a"));
    executor.execute(&graph, &input(), &options).await.unwrap();

    let reset = options.cache_reset(CacheReset::All);
    let results = executor.execute(&graph, &input(), &reset).await.unwrap();
    // `a` is shared by both paths and recomputed once
    assert_eq!(results.stats().computed, 3);
}

#[tokio::test]
async fn test_file_cache_persists_between_executors() {
    let dir = tempfile::tempdir().unwrap();
    let graph = chain();
    let config = ExecutorConfig::default().with_codec(Codec::Bincode);

    let writer = Executor::with_cache(Arc::new(FileCache::new(dir.path())), config.clone());
    let written = writer.execute(&graph, &input(), &every_path()).await.unwrap();
    assert_eq!(written.stats().cache_stores, 2);

    let reader = Executor::with_cache(Arc::new(FileCache::new(dir.path())), config);
    let read = reader.execute(&graph, &input(), &every_path()).await.unwrap();
    assert_eq!(read.stats().computed, 0);
    assert_eq!(read.stats().cache_hits, 2);

    let values: Vec<_> = read.iter().filter_map(|record| record.value().cloned()).collect();
    assert_eq!(values, vec!["x-a1-b1", "x-a1-b2"]);
}

#[tokio::test]
async fn test_step_cache_routes_by_step() {
    let graph = chain();
    let for_b = Arc::new(InMemoryCache::new());
    let routed = StepCache::new().route("b", for_b.clone());
    let executor = Executor::with_cache(Arc::new(routed), ExecutorConfig::default());

    let options = every_path().cache_include(CacheRule::step("a"));
    executor.execute(&graph, &input(), &options).await.unwrap();
    // `a` has no route, so only the two `b` values were kept
    assert_eq!(for_b.len(), 2);

    let second = executor.execute(&graph, &input(), &options).await.unwrap();
    assert_eq!(second.stats().computed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_step_cache_locks_unrouted_steps() {
    let graph = chain();
    let for_b = Arc::new(InMemoryCache::new());
    let routed = StepCache::new().route("b", for_b.clone());
    let config = ExecutorConfig::default()
        .with_locking(true)
        .with_max_concurrency(2);
    let executor = Executor::with_cache(Arc::new(routed), config.clone());

    let options = every_path().cache_include(CacheRule::step("a"));
    let results = executor.execute(&graph, &input(), &options).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(for_b.len(), 2);
    assert_eq!(for_b.held_locks(), 0);

    // Nothing routed at all
    let bare = Executor::with_cache(Arc::new(StepCache::new()), config);
    let results = bare.execute(&graph, &input(), &ExecuteOptions::new()).await.unwrap();
    assert_eq!(results.records()[0].value().map(String::as_str), Some("x-a1-b2"));
}

#[tokio::test]
async fn test_cache_exclude_overrides_include_and_targets() {
    let graph = chain();
    let executor = Executor::in_memory();
    let options = every_path()
        .cache_include(CacheRule::step("a"))
        .cache_exclude(CacheRule::new("b", "b2"));

    let first = executor.execute(&graph, &input(), &options).await.unwrap();
    assert_eq!(first.stats().cache_stores, 2);
    let mut keys: Vec<String> = executor
        .cached_keys()
        .await
        .unwrap()
        .iter()
        .map(|key| format!("{}={}", key.step(), key.option()))
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["a=a1", "b=b1"]);

    // Only the excluded target is recomputed, from the cached `a`
    let second = executor.execute(&graph, &input(), &options).await.unwrap();
    assert_eq!(second.stats().computed, 1);
    assert_eq!(values_of(&second), values_of(&first));
}

#[tokio::test]
async fn test_session_cache_exclude() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    let mut graph: Graph<String> = Graph::new();
    graph
        .add_option("s", "o", |inputs: &[String]| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(inputs[0].clone())
        })
        .unwrap();

    let mut session = Session::new(graph)
        .process("in".to_string())
        .with_cache_exclude(CacheRule::step("s"));
    session.execute(ExecuteOptions::new()).await.unwrap();
    let second = session.execute(ExecuteOptions::new()).await.unwrap();

    assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    assert_eq!(second.stats().cache_hits, 0);
}

fn values_of(results: &ResultSet<String>) -> Vec<String> {
    results.iter().filter_map(|record| record.value().cloned()).collect()
}

#[tokio::test]
async fn test_cache_only_reads_back() {
    let graph = chain();
    let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
    let computing = Executor::with_cache(Arc::clone(&cache), ExecutorConfig::default());
    let only_b1 = ExecuteOptions::new().option(Matcher::exact("b1"));
    computing.execute(&graph, &input(), &only_b1).await.unwrap();

    let reading = Executor::with_cache(
        cache,
        ExecutorConfig::default().with_strategy(Strategy::CacheOnly),
    );
    let hit = reading.execute(&graph, &input(), &only_b1).await.unwrap();
    assert_eq!(hit.stats().computed, 0);
    assert_eq!(hit.records()[0].value().map(String::as_str), Some("x-a1-b1"));

    let err = reading
        .execute(&graph, &input(), &every_path())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::NotCached { .. }));

    let uncached = Executor::new(ExecutorConfig::default().with_strategy(Strategy::CacheOnly));
    let err = uncached
        .execute(&graph, &input(), &only_b1)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::NotConfigured(_)));
}

#[tokio::test]
async fn test_cache_maintenance() {
    let graph = chain();
    let executor = Executor::in_memory();
    let options = every_path().cache_include(CacheRule::step("a"));
    executor.execute(&graph, &input(), &options).await.unwrap();
    assert_eq!(executor.cached_keys().await.unwrap().len(), 3);

    let removed = executor
        .cache_delete_step(&"b".into(), Some(&"b1".into()))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(executor.cached_keys().await.unwrap().len(), 2);

    executor.cache_clear().await.unwrap();
    assert!(executor.cached_keys().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_locking_computes_shared_prefix_once() {
    static SHARED: AtomicUsize = AtomicUsize::new(0);

    let mut graph: Graph<String> = Graph::new();
    graph
        .add_option("load", "slow", |inputs: &[String]| {
            SHARED.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(30));
            Ok::<_, String>(format!("{}-loaded", inputs[0]))
        })
        .unwrap();
    graph.add_step("fit", ["load"]).unwrap();
    for option in ["f1", "f2", "f3", "f4"] {
        graph.add_option("fit", option, suffix(option)).unwrap();
    }

    let config = ExecutorConfig::default()
        .with_max_concurrency(4)
        .with_locking(true);
    let executor = Executor::with_cache(Arc::new(InMemoryCache::new()), config);
    let options = every_path().cache_include(CacheRule::step("load"));

    let results = executor.execute(&graph, &input(), &options).await.unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(SHARED.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|record| record
        .value()
        .is_some_and(|value| value.starts_with("x-loaded-"))));
}
