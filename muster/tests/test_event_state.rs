//! Event state cache and RSVP recording tests

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use muster::base::keys;
use muster::config::{EventCacheConfig, LocationConfig};
use muster::event::ParticipantStatus;
use muster::event_cache::EventStateCache;
use muster::kv::{KvStore, MemoryKv};
use muster::location::{LocationCache, NewLocation};
use muster::rsvp::RsvpRecorder;
use muster::store::{EventStore, MemoryStore};
use std::sync::Arc;

struct Fixture {
  store: MemoryStore,
  kv: MemoryKv,
  locations: LocationCache,
  state: EventStateCache,
  rsvp: RsvpRecorder,
}

async fn fixture() -> Fixture {
  let now = Utc::now();
  let store = common::seeded_store(now, Some(now + ChronoDuration::hours(3))).await;
  let kv = MemoryKv::new();
  let locations = LocationCache::new(
    Arc::new(kv.clone()),
    Arc::new(store.clone()),
    Arc::new(store.clone()),
    LocationConfig::default(),
  );
  let state = EventStateCache::new(Arc::new(kv.clone()), EventCacheConfig::default().scan_count(2));
  let rsvp = RsvpRecorder::new(Arc::new(store.clone()), state.clone());
  Fixture {
    store,
    kv,
    locations,
    state,
    rsvp,
  }
}

#[tokio::test]
async fn test_snapshot_counts_rsvps_and_locations() {
  let f = fixture().await;
  for (p, status) in [
    ("p-pending", ParticipantStatus::Pending),
    ("p-confirmed", ParticipantStatus::Confirmed),
    ("p-denied", ParticipantStatus::Denied),
    ("p-checked-in", ParticipantStatus::CheckedIn),
  ] {
    f.rsvp.record("org-1", "e1", p, status).await.unwrap();
  }
  for p in ["p-confirmed", "p-checked-in"] {
    f.locations
      .create_location(NewLocation::new(p, "e1", -33.45, -70.66))
      .await
      .unwrap();
  }

  let snapshot = f.state.get_snapshot("org-1", "e1").await.unwrap();
  assert_eq!(snapshot.event_id, "e1");
  assert_eq!(snapshot.org_id, "org-1");
  assert_eq!(snapshot.totals.confirmed, 2);
  assert_eq!(snapshot.totals.pending, 1);
  assert_eq!(snapshot.totals.denied, 1);
  assert_eq!(snapshot.totals.total, 4);
  assert_eq!(snapshot.locations.len(), 2);
  assert_eq!(snapshot.skipped_entries, 0);
}

#[tokio::test]
async fn test_malformed_entries_are_skipped() {
  let f = fixture().await;
  f.rsvp
    .record("org-1", "e1", "p-confirmed", ParticipantStatus::Confirmed)
    .await
    .unwrap();
  f.kv
    .set(&keys::confirmation_key("org-1", "e1", "ghost"), b"not-json", None)
    .await
    .unwrap();
  f.kv
    .set(&keys::location_latest_key("e1", "ghost"), b"{\"latitude\":1}", None)
    .await
    .unwrap();

  let snapshot = f.state.get_snapshot("org-1", "e1").await.unwrap();
  assert_eq!(snapshot.totals.total, 1);
  assert_eq!(snapshot.totals.confirmed, 1);
  assert!(snapshot.locations.is_empty());
  assert_eq!(snapshot.skipped_entries, 2);
}

#[tokio::test]
async fn test_snapshot_is_scoped_to_org_and_event() {
  let f = fixture().await;
  f.rsvp
    .record("org-1", "e1", "p-pending", ParticipantStatus::Confirmed)
    .await
    .unwrap();

  let other_org = f.state.get_snapshot("org-2", "e1").await.unwrap();
  assert_eq!(other_org.totals.total, 0);
  let other_event = f.state.get_snapshot("org-1", "e10").await.unwrap();
  assert_eq!(other_event.totals.total, 0);
}

#[tokio::test]
async fn test_record_updates_store_and_cache() {
  let f = fixture().await;
  let entry = f
    .rsvp
    .record("org-1", "e1", "p-pending", ParticipantStatus::Confirmed)
    .await
    .unwrap();
  assert_eq!(entry.status, ParticipantStatus::Confirmed);

  let participant = f.store.get_participant("p-pending").await.unwrap().unwrap();
  assert_eq!(participant.status, ParticipantStatus::Confirmed);
  assert!(f
    .kv
    .get(&keys::confirmation_key("org-1", "e1", "p-pending"))
    .await
    .unwrap()
    .is_some());
}

#[tokio::test]
async fn test_record_unknown_participant_is_not_found() {
  let f = fixture().await;
  let err = f
    .rsvp
    .record("org-1", "e1", "nobody", ParticipantStatus::Confirmed)
    .await
    .unwrap_err();
  assert!(err.is_not_found());

  // Participant of e1 recorded against another org.
  let err = f
    .rsvp
    .record("org-2", "e1", "p-pending", ParticipantStatus::Confirmed)
    .await
    .unwrap_err();
  assert!(err.is_not_found());
  assert!(f.kv.is_empty().await);
}

#[tokio::test]
async fn test_remove_deletes_cache_entry() {
  let f = fixture().await;
  f.rsvp
    .record("org-1", "e1", "p-denied", ParticipantStatus::Denied)
    .await
    .unwrap();
  assert!(f.rsvp.remove("org-1", "e1", "p-denied").await.unwrap());
  assert!(!f.rsvp.remove("org-1", "e1", "p-denied").await.unwrap());

  let snapshot = f.state.get_snapshot("org-1", "e1").await.unwrap();
  assert_eq!(snapshot.totals.total, 0);
}
