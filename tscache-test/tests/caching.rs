//! End-to-end behavior of the caching executor against scriptable
//! collaborators: hit/miss/error flows in both scheduling modes,
//! cancellation, and cache population policy.

use std::sync::Arc;
use std::time::Duration;

use tscache::{CacheConfig, CacheError, JsonSerdes, PluginError, QueryContext, Serdes};
use tscache_test::{
    FailingSerdes, Harness, eventually, sample_query, sample_result, sequential_config, settle,
};

fn simultaneous_config() -> CacheConfig {
    CacheConfig::builder()
        .expiration(60_000)
        .max_expiration(120_000)
        .simultaneous(true)
        .executor_id("LocalCache")
        .executor_type("CachingQueryExecutor")
        .build()
}

#[tokio::test]
async fn cache_miss_runs_downstream_and_populates() {
    let harness = Harness::new(sequential_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();
    let id = exec.id();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    assert_eq!(harness.downstream.call_count(), 0);
    assert_eq!(harness.plugin.write_count(), 0);
    assert!(harness.executor.outstanding_requests().contains(&id));

    harness.plugin.resolve_fetch(Ok(None));
    eventually(|| harness.downstream.call_count() == 1).await;
    assert!(harness.downstream.override_configs()[0].is_none());

    let result = sample_result();
    harness.downstream.respond(Ok(result.clone()));
    assert_eq!(exec.await.unwrap(), result);

    eventually(|| harness.plugin.write_count() == 1).await;
    let write = harness.plugin.writes().remove(0);
    assert_eq!(write.ttl, Duration::from_millis(60_000));
    assert_eq!(JsonSerdes.deserialize(&write.value).unwrap(), result);
    assert!(!harness.executor.outstanding_requests().contains(&id));
    assert!(!harness.plugin.fetch_cancelled());
    assert!(!harness.downstream.cancelled());
}

#[tokio::test]
async fn cache_hit_skips_downstream_and_population() {
    let harness = Harness::new(sequential_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();
    let id = exec.id();

    eventually(|| harness.plugin.fetch_count() == 1).await;

    let payload = JsonSerdes.serialize(&sample_result()).unwrap();
    harness.plugin.resolve_fetch(Ok(Some(payload)));
    assert_eq!(exec.await.unwrap(), sample_result());

    settle().await;
    assert_eq!(harness.downstream.call_count(), 0);
    assert_eq!(harness.plugin.write_count(), 0);
    assert!(!harness.executor.outstanding_requests().contains(&id));
    assert!(!harness.plugin.fetch_cancelled());
    assert!(!harness.downstream.cancelled());
}

#[tokio::test]
async fn zero_expiration_disables_population_not_lookup() {
    let config = CacheConfig::builder()
        .expiration(0)
        .max_expiration(120_000)
        .executor_id("LocalCache")
        .executor_type("CachingQueryExecutor")
        .build();
    let harness = Harness::new(config);
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    harness.plugin.resolve_fetch(Ok(None));
    eventually(|| harness.downstream.call_count() == 1).await;

    let result = sample_result();
    harness.downstream.respond(Ok(result.clone()));
    assert_eq!(exec.await.unwrap(), result);

    settle().await;
    assert_eq!(harness.plugin.write_count(), 0);
}

#[tokio::test]
async fn simultaneous_cache_win_cancels_downstream() {
    let harness = Harness::new(simultaneous_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();
    let id = exec.id();

    // Both subrequests launch up front.
    eventually(|| harness.plugin.fetch_count() == 1).await;
    eventually(|| harness.downstream.call_count() == 1).await;
    assert_eq!(harness.plugin.write_count(), 0);
    assert!(harness.executor.outstanding_requests().contains(&id));

    let payload = JsonSerdes.serialize(&sample_result()).unwrap();
    harness.plugin.resolve_fetch(Ok(Some(payload)));
    assert_eq!(exec.await.unwrap(), sample_result());

    settle().await;
    assert_eq!(harness.plugin.write_count(), 0);
    assert!(harness.downstream.cancelled());
    assert!(!harness.plugin.fetch_cancelled());
    assert!(!harness.executor.outstanding_requests().contains(&id));
}

#[tokio::test]
async fn simultaneous_downstream_win_cancels_cache_and_populates() {
    let harness = Harness::new(simultaneous_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    eventually(|| harness.downstream.call_count() == 1).await;

    let result = sample_result();
    harness.downstream.respond(Ok(result.clone()));
    assert_eq!(exec.await.unwrap(), result);

    eventually(|| harness.plugin.write_count() == 1).await;
    assert!(harness.plugin.fetch_cancelled());
    assert!(!harness.downstream.cancelled());
}

#[tokio::test]
async fn cache_error_falls_through_to_downstream() {
    let harness = Harness::new(sequential_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    harness
        .plugin
        .resolve_fetch(Err(PluginError::internal(std::io::Error::other("boo"))));
    eventually(|| harness.downstream.call_count() == 1).await;

    let result = sample_result();
    harness.downstream.respond(Ok(result.clone()));
    assert_eq!(exec.await.unwrap(), result);

    // A fresh result is populated even though the fetch failed.
    eventually(|| harness.plugin.write_count() == 1).await;
    assert!(!harness.plugin.fetch_cancelled());
    assert!(!harness.downstream.cancelled());
}

#[tokio::test]
async fn downstream_error_surfaces_without_population() {
    let harness = Harness::new(sequential_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    harness.plugin.resolve_fetch(Ok(None));
    eventually(|| harness.downstream.call_count() == 1).await;

    harness
        .downstream
        .respond(Err(CacheError::Downstream("boo".into())));
    match exec.await {
        Err(CacheError::Downstream(message)) => assert_eq!(message, "boo"),
        other => panic!("expected a downstream error, got {other:?}"),
    }

    settle().await;
    assert_eq!(harness.plugin.write_count(), 0);
    assert!(!harness.plugin.fetch_cancelled());
    assert!(!harness.downstream.cancelled());
}

#[tokio::test]
async fn simultaneous_cache_error_is_absorbed() {
    let harness = Harness::new(simultaneous_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    eventually(|| harness.downstream.call_count() == 1).await;

    harness
        .plugin
        .resolve_fetch(Err(PluginError::internal(std::io::Error::other("boo"))));
    settle().await;

    let result = sample_result();
    harness.downstream.respond(Ok(result.clone()));
    assert_eq!(exec.await.unwrap(), result);

    eventually(|| harness.plugin.write_count() == 1).await;
    assert!(!harness.plugin.fetch_cancelled());
    assert!(!harness.downstream.cancelled());
}

#[tokio::test]
async fn simultaneous_downstream_error_cancels_cache() {
    let harness = Harness::new(simultaneous_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    eventually(|| harness.downstream.call_count() == 1).await;

    harness
        .downstream
        .respond(Err(CacheError::Downstream("boo".into())));
    assert!(matches!(exec.await, Err(CacheError::Downstream(_))));

    settle().await;
    assert_eq!(harness.plugin.write_count(), 0);
    assert!(harness.plugin.fetch_cancelled());
    assert!(!harness.downstream.cancelled());
}

#[tokio::test]
async fn undecodable_hit_falls_through_to_downstream() {
    let harness = Harness::new(sequential_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    harness
        .plugin
        .resolve_fetch(Ok(Some(tscache::Raw::from_static(b"not json"))));
    eventually(|| harness.downstream.call_count() == 1).await;

    let result = sample_result();
    harness.downstream.respond(Ok(result.clone()));
    assert_eq!(exec.await.unwrap(), result);
    eventually(|| harness.plugin.write_count() == 1).await;
}

#[tokio::test]
async fn simultaneous_undecodable_hit_waits_for_downstream() {
    let harness = Harness::new(simultaneous_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    eventually(|| harness.downstream.call_count() == 1).await;

    harness
        .plugin
        .resolve_fetch(Ok(Some(tscache::Raw::from_static(b"not json"))));
    settle().await;
    // Still exactly one downstream call; the decode failure did not restart it.
    assert_eq!(harness.downstream.call_count(), 1);

    let result = sample_result();
    harness.downstream.respond(Ok(result.clone()));
    assert_eq!(exec.await.unwrap(), result);
}

#[tokio::test]
async fn cancel_while_awaiting_cache() {
    let harness = Harness::new(sequential_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();
    let id = exec.id();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    exec.cancel();
    assert!(matches!(exec.await, Err(CacheError::Cancelled)));

    settle().await;
    assert!(harness.plugin.fetch_cancelled());
    assert_eq!(harness.downstream.call_count(), 0);
    assert_eq!(harness.plugin.write_count(), 0);
    assert!(!harness.executor.outstanding_requests().contains(&id));
}

#[tokio::test]
async fn cancel_while_awaiting_downstream() {
    let harness = Harness::new(sequential_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    harness.plugin.resolve_fetch(Ok(None));
    eventually(|| harness.downstream.call_count() == 1).await;

    exec.cancel();
    assert!(matches!(exec.await, Err(CacheError::Cancelled)));

    settle().await;
    assert!(harness.downstream.cancelled());
    assert!(!harness.plugin.fetch_cancelled());
    assert_eq!(harness.plugin.write_count(), 0);
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let harness = Harness::new(sequential_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    exec.cancel();
    exec.cancel();
    exec.cancel();
    assert!(matches!(exec.await, Err(CacheError::Cancelled)));
    assert!(harness.executor.outstanding_requests().is_empty());
}

#[tokio::test]
async fn late_callbacks_are_discarded() {
    let harness = Harness::new(sequential_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    exec.cancel();
    assert!(matches!(exec.await, Err(CacheError::Cancelled)));
    settle().await;

    // The fetch delivers after cancel; nobody should act on it.
    harness.plugin.resolve_fetch(Ok(Some(
        JsonSerdes.serialize(&sample_result()).unwrap(),
    )));
    settle().await;
    assert_eq!(harness.downstream.call_count(), 0);
    assert_eq!(harness.plugin.write_count(), 0);
}

#[tokio::test]
async fn populate_serialization_failure_is_swallowed() {
    let serdes = Arc::new(FailingSerdes::new());
    let harness = Harness::with_serdes(sequential_config(), serdes.clone());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    harness.plugin.resolve_fetch(Ok(None));
    eventually(|| harness.downstream.call_count() == 1).await;

    serdes.fail_serialize();
    let result = sample_result();
    harness.downstream.respond(Ok(result.clone()));
    assert_eq!(exec.await.unwrap(), result);

    settle().await;
    assert_eq!(harness.plugin.write_count(), 0);
}

#[tokio::test]
async fn populate_write_failure_never_reaches_the_caller() {
    let harness = Harness::new(sequential_config());
    harness.plugin.fail_writes();
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    harness.plugin.resolve_fetch(Ok(None));
    eventually(|| harness.downstream.call_count() == 1).await;

    let result = sample_result();
    harness.downstream.respond(Ok(result.clone()));
    assert_eq!(exec.await.unwrap(), result);
    eventually(|| harness.plugin.write_count() == 1).await;
}

#[tokio::test]
async fn population_happens_at_most_once_per_execution() {
    let harness = Harness::new(sequential_config());
    let exec = harness
        .executor
        .execute_query(Arc::new(QueryContext::new()), &sample_query())
        .unwrap();

    eventually(|| harness.plugin.fetch_count() == 1).await;
    harness.plugin.resolve_fetch(Ok(None));
    eventually(|| harness.downstream.call_count() == 1).await;

    harness.downstream.respond(Ok(sample_result()));
    assert!(exec.await.is_ok());

    eventually(|| harness.plugin.write_count() == 1).await;
    settle().await;
    assert_eq!(harness.plugin.write_count(), 1);
}
