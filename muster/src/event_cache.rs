//! 活动状态缓存
//! Event state cache
//!
//! 通过前缀扫描缓存键空间，把某个活动的最新位置和确认状态汇总成只读快照。
//! 快照是尽力而为的：无法解析的条目被计数并跳过，缓存不可用时返回空快照。
//!
//! Scans the cache key-space by prefix and folds an event's latest locations
//! and RSVP states into a read-only snapshot. Snapshots are best effort:
//! entries that fail to decode are counted and skipped, and an unavailable
//! cache yields an empty snapshot.

use crate::base::{add_duration, keys, ttl_remaining};
use crate::config::EventCacheConfig;
use crate::error::Result;
use crate::event::ParticipantStatus;
use crate::kv::KvStore;
use crate::location::LocationSample;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 缓存中的确认状态条目
/// RSVP entry stored in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationEntry {
  pub org_id: String,
  pub event_id: String,
  pub participant_id: String,
  pub status: ParticipantStatus,
  pub updated_at: DateTime<Utc>,
}

impl ConfirmationEntry {
  pub fn new<O, E, P>(org_id: O, event_id: E, participant_id: P, status: ParticipantStatus) -> Self
  where
    O: Into<String>,
    E: Into<String>,
    P: Into<String>,
  {
    Self {
      org_id: org_id.into(),
      event_id: event_id.into(),
      participant_id: participant_id.into(),
      status,
      updated_at: Utc::now(),
    }
  }
}

/// 快照计数，已签到计入已确认
/// Snapshot totals; checked-in counts as confirmed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTotals {
  pub confirmed: usize,
  pub pending: usize,
  pub denied: usize,
  pub total: usize,
}

impl SnapshotTotals {
  fn count(&mut self, status: ParticipantStatus) {
    match status {
      ParticipantStatus::Confirmed | ParticipantStatus::CheckedIn => self.confirmed += 1,
      ParticipantStatus::Pending => self.pending += 1,
      ParticipantStatus::Denied => self.denied += 1,
    }
    self.total += 1;
  }
}

/// 活动快照
/// Event snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCacheSnapshot {
  pub event_id: String,
  pub org_id: String,
  pub locations: Vec<LocationSample>,
  pub confirmations: Vec<ConfirmationEntry>,
  pub totals: SnapshotTotals,
  /// 因无法解析而跳过的条目数
  /// Entries skipped because they failed to decode
  pub skipped_entries: usize,
  pub fetched_at: DateTime<Utc>,
}

/// 活动状态缓存
/// Event state cache
#[derive(Clone)]
pub struct EventStateCache {
  kv: Arc<dyn KvStore>,
  config: EventCacheConfig,
}

impl EventStateCache {
  pub fn new(kv: Arc<dyn KvStore>, config: EventCacheConfig) -> Self {
    Self { kv, config }
  }

  /// 组装活动快照
  /// Assemble the snapshot of an event
  pub async fn get_snapshot(&self, org_id: &str, event_id: &str) -> Result<EventCacheSnapshot> {
    let mut skipped = 0;
    let locations: Vec<LocationSample> = self
      .load_prefix(&keys::location_latest_prefix(event_id), &mut skipped)
      .await;
    let confirmations: Vec<ConfirmationEntry> = self
      .load_prefix(&keys::confirmation_prefix(org_id, event_id), &mut skipped)
      .await;

    let mut totals = SnapshotTotals::default();
    for entry in &confirmations {
      totals.count(entry.status);
    }

    tracing::debug!(
      org_id = %org_id,
      event_id = %event_id,
      locations = locations.len(),
      confirmations = totals.total,
      skipped,
      "event snapshot assembled"
    );

    Ok(EventCacheSnapshot {
      event_id: event_id.to_string(),
      org_id: org_id.to_string(),
      locations,
      confirmations,
      totals,
      skipped_entries: skipped,
      fetched_at: Utc::now(),
    })
  }

  /// 写入确认状态；`ttl_until` 缺省时使用默认存活期，已过去时不写入
  /// Write an RSVP entry; without `ttl_until` the default lifetime applies,
  /// and nothing is written when it has already passed
  pub async fn set_confirmation(
    &self,
    entry: &ConfirmationEntry,
    ttl_until: Option<DateTime<Utc>>,
  ) -> Result<()> {
    let now = Utc::now();
    let until = ttl_until.unwrap_or_else(|| add_duration(now, self.config.default_ttl));
    let Some(ttl) = ttl_remaining(until, now) else {
      tracing::debug!(
        event_id = %entry.event_id,
        participant_id = %entry.participant_id,
        "confirmation ttl already elapsed, skipping cache write"
      );
      return Ok(());
    };
    let key = keys::confirmation_key(&entry.org_id, &entry.event_id, &entry.participant_id);
    let value = serde_json::to_vec(entry)?;
    self.kv.set(&key, &value, Some(ttl)).await
  }

  /// 删除确认状态，返回条目是否存在
  /// Delete an RSVP entry, returning whether it existed
  pub async fn delete_confirmation(
    &self,
    org_id: &str,
    event_id: &str,
    participant_id: &str,
  ) -> Result<bool> {
    self
      .kv
      .delete(&keys::confirmation_key(org_id, event_id, participant_id))
      .await
  }

  /// 扫描前缀并解码所有值；失败只记录日志
  /// Scan a prefix and decode every value; failures are only logged
  async fn load_prefix<T: DeserializeOwned>(&self, prefix: &str, skipped: &mut usize) -> Vec<T> {
    let found = match self.kv.scan_prefix(prefix, self.config.scan_count).await {
      Ok(found) => found,
      Err(e) => {
        tracing::warn!(prefix = %prefix, error = %e, "cache scan failed");
        return Vec::new();
      }
    };
    if found.is_empty() {
      return Vec::new();
    }
    let values = match self.kv.mget(&found).await {
      Ok(values) => values,
      Err(e) => {
        tracing::warn!(prefix = %prefix, error = %e, "cache batch read failed");
        return Vec::new();
      }
    };

    let mut items = Vec::with_capacity(values.len());
    for (key, raw) in found.iter().zip(values) {
      // 扫描与读取之间过期的键
      // Keys that expired between the scan and the read
      let Some(raw) = raw else { continue };
      match serde_json::from_slice::<T>(&raw) {
        Ok(item) => items.push(item),
        Err(e) => {
          *skipped += 1;
          tracing::warn!(key = %key, error = %e, "skipping malformed cache entry");
        }
      }
    }
    items
  }
}
