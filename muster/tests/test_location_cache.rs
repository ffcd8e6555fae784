//! Latest-location cache tests: cache-first reads, TTL bound to the event end
//! and durable-history fallback

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use muster::base::keys;
use muster::config::LocationConfig;
use muster::kv::{KvStore, MemoryKv};
use muster::location::{LocationCache, NewLocation};
use muster::store::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

fn cache(store: &MemoryStore, kv: &MemoryKv) -> LocationCache {
  LocationCache::new(
    Arc::new(kv.clone()),
    Arc::new(store.clone()),
    Arc::new(store.clone()),
    LocationConfig::default(),
  )
}

#[tokio::test]
async fn test_write_then_read_returns_same_coordinates() {
  let store = common::seeded_store(Utc::now(), Some(Utc::now() + ChronoDuration::hours(2))).await;
  let kv = MemoryKv::new();
  let cache = cache(&store, &kv);

  let written = cache
    .create_location(NewLocation::new("p-confirmed", "e1", -33.437_812_5, -70.650_483_9).speed(4.2))
    .await
    .unwrap();
  let read = cache.get_latest("e1", "p-confirmed").await.unwrap().unwrap();
  assert_eq!(read.latitude, -33.437_812_5);
  assert_eq!(read.longitude, -70.650_483_9);
  assert_eq!(read, written);
  assert!(kv
    .get(&keys::location_latest_key("e1", "p-confirmed"))
    .await
    .unwrap()
    .is_some());
}

#[tokio::test]
async fn test_latest_pointer_is_overwritten() {
  let store = common::seeded_store(Utc::now(), Some(Utc::now() + ChronoDuration::hours(2))).await;
  let kv = MemoryKv::new();
  let cache = cache(&store, &kv);

  let t0 = Utc::now();
  cache
    .create_location(NewLocation::new("p1", "e1", 1.0, 1.0).timestamp(t0))
    .await
    .unwrap();
  cache
    .create_location(NewLocation::new("p1", "e1", 2.0, 2.0).timestamp(t0 + ChronoDuration::seconds(5)))
    .await
    .unwrap();

  let latest = cache.get_latest("e1", "p1").await.unwrap().unwrap();
  assert_eq!((latest.latitude, latest.longitude), (2.0, 2.0));
  let history = cache
    .get_history("p1", t0 - ChronoDuration::minutes(1), t0 + ChronoDuration::minutes(1))
    .await
    .unwrap();
  assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_late_older_sample_keeps_newer_latest() {
  let store = common::seeded_store(Utc::now(), Some(Utc::now() + ChronoDuration::hours(2))).await;
  let kv = MemoryKv::new();
  let cache = cache(&store, &kv);

  let t0 = Utc::now();
  cache
    .create_location(NewLocation::new("p1", "e1", 2.0, 2.0).timestamp(t0 + ChronoDuration::seconds(30)))
    .await
    .unwrap();
  cache
    .create_location(NewLocation::new("p1", "e1", 1.0, 1.0).timestamp(t0))
    .await
    .unwrap();

  let latest = cache.get_latest("e1", "p1").await.unwrap().unwrap();
  assert_eq!((latest.latitude, latest.longitude), (2.0, 2.0));
  assert_eq!(latest.timestamp, t0 + ChronoDuration::seconds(30));

  // The late sample still lands in durable history.
  let history = cache
    .get_history("p1", t0 - ChronoDuration::minutes(1), t0 + ChronoDuration::minutes(1))
    .await
    .unwrap();
  assert_eq!(history.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cache_entry_expires_at_event_end() {
  // The event ends three hours after the sample is written.
  let now = Utc::now();
  let store = common::seeded_store(now - ChronoDuration::hours(1), Some(now + ChronoDuration::hours(3))).await;
  let kv = MemoryKv::new();
  let cache = cache(&store, &kv);
  let key = keys::location_latest_key("e1", "p-confirmed");

  cache
    .create_location(NewLocation::new("p-confirmed", "e1", -33.45, -70.66))
    .await
    .unwrap();

  tokio::time::advance(Duration::from_secs(3 * 3600 - 60)).await;
  assert!(kv.get(&key).await.unwrap().is_some());

  tokio::time::advance(Duration::from_secs(120)).await;
  assert!(kv.get(&key).await.unwrap().is_none());

  // History still answers after the cache entry is gone.
  let latest = cache.get_latest("e1", "p-confirmed").await.unwrap().unwrap();
  assert_eq!((latest.latitude, latest.longitude), (-33.45, -70.66));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_event_uses_default_window() {
  let store = MemoryStore::new();
  let kv = MemoryKv::new();
  let cache = cache(&store, &kv);
  let key = keys::location_latest_key("no-such-event", "p1");

  cache
    .create_location(NewLocation::new("p1", "no-such-event", 10.0, 10.0))
    .await
    .unwrap();

  tokio::time::advance(Duration::from_secs(23 * 3600)).await;
  assert!(kv.get(&key).await.unwrap().is_some());
  tokio::time::advance(Duration::from_secs(2 * 3600)).await;
  assert!(kv.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_ended_event_skips_cache_write() {
  let now = Utc::now();
  let store = common::seeded_store(now - ChronoDuration::hours(5), Some(now - ChronoDuration::hours(1))).await;
  let kv = MemoryKv::new();
  let cache = cache(&store, &kv);

  cache
    .create_location(NewLocation::new("p1", "e1", 5.0, 5.0))
    .await
    .unwrap();
  assert!(kv.is_empty().await);
  assert!(cache.get_latest("e1", "p1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_corrupt_entry_falls_back_to_history() {
  let store = common::seeded_store(Utc::now(), Some(Utc::now() + ChronoDuration::hours(2))).await;
  let kv = MemoryKv::new();
  let cache = cache(&store, &kv);

  cache
    .create_location(NewLocation::new("p1", "e1", 7.5, 7.5))
    .await
    .unwrap();
  kv.set(&keys::location_latest_key("e1", "p1"), b"\x00garbage", None)
    .await
    .unwrap();

  let latest = cache.get_latest("e1", "p1").await.unwrap().unwrap();
  assert_eq!((latest.latitude, latest.longitude), (7.5, 7.5));
}

#[tokio::test]
async fn test_latest_for_event_omits_participants_without_location() {
  let store = common::seeded_store(Utc::now(), Some(Utc::now() + ChronoDuration::hours(2))).await;
  let kv = MemoryKv::new();
  let cache = cache(&store, &kv);

  for (p, lat) in [("p1", 1.0), ("p2", 2.0)] {
    cache
      .create_location(NewLocation::new(p, "e1", lat, 0.0))
      .await
      .unwrap();
  }
  // p2 is only in history now.
  kv.delete(&keys::location_latest_key("e1", "p2")).await.unwrap();

  let ids = vec!["p1".to_string(), "p2".to_string(), "p3".to_string()];
  let samples = cache.get_latest_for_event("e1", &ids).await.unwrap();
  let found: Vec<_> = samples
    .iter()
    .map(|s| (s.participant_id.as_str(), s.latitude))
    .collect();
  assert_eq!(found, vec![("p1", 1.0), ("p2", 2.0)]);
}

#[tokio::test]
async fn test_invalid_location_is_rejected() {
  let store = MemoryStore::new();
  let kv = MemoryKv::new();
  let cache = cache(&store, &kv);

  let err = cache
    .create_location(NewLocation::new("p1", "e1", 95.0, 0.0))
    .await
    .unwrap_err();
  assert!(err.is_invalid_input());
  assert!(cache.get_latest_for_participant("p1").await.unwrap().is_none());
  assert!(kv.is_empty().await);
}

#[tokio::test]
async fn test_latest_for_participant_spans_events() {
  let store = MemoryStore::new();
  let kv = MemoryKv::new();
  let cache = cache(&store, &kv);
  let t0 = Utc::now();

  cache
    .create_location(NewLocation::new("p1", "e1", 1.0, 1.0).timestamp(t0))
    .await
    .unwrap();
  cache
    .create_location(NewLocation::new("p1", "e2", 3.0, 3.0).timestamp(t0 + ChronoDuration::minutes(1)))
    .await
    .unwrap();

  let latest = cache.get_latest_for_participant("p1").await.unwrap().unwrap();
  assert_eq!(latest.event_id, "e2");
}
