//! 最新位置缓存
//! Latest-location cache
//!
//! 每次写入都会追加到持久历史，缓存只是加速层：读取先查缓存，未命中、条目损坏
//! 或缓存不可用时回退到持久存储。缓存条目的存活期绑定到活动结束时间，
//! 过期的追踪数据无需清理任务即可自行消失。
//!
//! Every write is appended to durable history; the cache is an optimization
//! only. Reads try the cache first and fall back to the durable store on a
//! miss, a corrupt entry or an unavailable cache. Entries live until the event
//! ends, so stale trackers expire without a cleanup job.

use crate::base::{add_duration, keys, ttl_remaining};
use crate::config::LocationConfig;
use crate::error::Result;
use crate::kv::KvStore;
use crate::location::{LocationSample, NewLocation};
use crate::store::{EventStore, LocationStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// 位置缓存
/// Location cache
#[derive(Clone)]
pub struct LocationCache {
  kv: Arc<dyn KvStore>,
  history: Arc<dyn LocationStore>,
  events: Arc<dyn EventStore>,
  config: LocationConfig,
}

impl LocationCache {
  pub fn new(
    kv: Arc<dyn KvStore>,
    history: Arc<dyn LocationStore>,
    events: Arc<dyn EventStore>,
    config: LocationConfig,
  ) -> Self {
    Self {
      kv,
      history,
      events,
      config,
    }
  }

  /// 接收一次位置上报：校验、追加历史、刷新最新位置
  /// Ingest one location report: validate, append to history, refresh the latest pointer
  pub async fn create_location(&self, input: NewLocation) -> Result<LocationSample> {
    let now = Utc::now();
    let sample = input.into_sample(now)?;
    self.history.append(&sample).await?;

    let ttl_until = self.ttl_until(&sample.event_id, now).await;
    // 历史已写入，缓存失败不影响上报结果
    // History is already durable; a cache failure does not fail ingestion
    if let Err(e) = self.set_latest(&sample, ttl_until).await {
      tracing::warn!(
        event_id = %sample.event_id,
        participant_id = %sample.participant_id,
        error = %e,
        "failed to refresh latest location in cache"
      );
    }
    Ok(sample)
  }

  /// 刷新最新位置指针。`ttl_until` 已过去，或缓存中已有更新的样本时不写缓存
  /// Refresh the latest pointer. Nothing is written when `ttl_until` has passed
  /// or the cache already holds a newer sample
  pub async fn set_latest(&self, sample: &LocationSample, ttl_until: DateTime<Utc>) -> Result<()> {
    let Some(ttl) = ttl_remaining(ttl_until, Utc::now()) else {
      tracing::debug!(
        event_id = %sample.event_id,
        participant_id = %sample.participant_id,
        "location ttl already elapsed, skipping cache write"
      );
      return Ok(());
    };
    let key = keys::location_latest_key(&sample.event_id, &sample.participant_id);
    if let Ok(Some(raw)) = self.kv.get(&key).await {
      if let Ok(cached) = serde_json::from_slice::<LocationSample>(&raw) {
        if cached.timestamp > sample.timestamp {
          tracing::debug!(
            event_id = %sample.event_id,
            participant_id = %sample.participant_id,
            cached_at = %cached.timestamp,
            sample_at = %sample.timestamp,
            "older sample arrived late, keeping cached latest"
          );
          return Ok(());
        }
      }
    }
    let value = serde_json::to_vec(sample)?;
    self.kv.set(&key, &value, Some(ttl)).await
  }

  /// 读取最新位置，缓存优先
  /// Read the latest location, cache first
  pub async fn get_latest(
    &self,
    event_id: &str,
    participant_id: &str,
  ) -> Result<Option<LocationSample>> {
    let key = keys::location_latest_key(event_id, participant_id);
    match self.kv.get(&key).await {
      Ok(Some(raw)) => match serde_json::from_slice::<LocationSample>(&raw) {
        Ok(sample) => return Ok(Some(sample)),
        Err(e) => tracing::warn!(key = %key, error = %e, "corrupt location entry in cache"),
      },
      Ok(None) => {}
      Err(e) => tracing::warn!(key = %key, error = %e, "location cache unavailable"),
    }
    self.history.latest(event_id, participant_id).await
  }

  /// 批量读取活动内多个参与者的最新位置，没有位置的参与者不出现在结果中
  /// Batch read the latest locations of several participants; participants
  /// without a location are left out
  pub async fn get_latest_for_event(
    &self,
    event_id: &str,
    participant_ids: &[String],
  ) -> Result<Vec<LocationSample>> {
    let cache_keys: Vec<String> = participant_ids
      .iter()
      .map(|p| keys::location_latest_key(event_id, p))
      .collect();
    let cached = match self.kv.mget(&cache_keys).await {
      Ok(values) => values,
      Err(e) => {
        tracing::warn!(event_id = %event_id, error = %e, "location cache unavailable");
        vec![None; participant_ids.len()]
      }
    };

    let mut samples = Vec::with_capacity(participant_ids.len());
    for (participant_id, raw) in participant_ids.iter().zip(cached) {
      let hit = raw.and_then(|raw| serde_json::from_slice::<LocationSample>(&raw).ok());
      let sample = match hit {
        Some(sample) => Some(sample),
        None => self.history.latest(event_id, participant_id).await?,
      };
      samples.extend(sample);
    }
    Ok(samples)
  }

  /// 参与者的位置历史，不受缓存过期影响
  /// Location history of a participant, unaffected by cache expiry
  pub async fn get_history(
    &self,
    participant_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> Result<Vec<LocationSample>> {
    self.history.history(participant_id, from, to).await
  }

  /// 参与者跨活动的最新位置（缓存无法按参与者索引，直接读存储）
  /// Latest location of a participant across events (read from the store,
  /// the cache is not indexed by participant)
  pub async fn get_latest_for_participant(
    &self,
    participant_id: &str,
  ) -> Result<Option<LocationSample>> {
    self.history.latest_for_participant(participant_id).await
  }

  /// 缓存条目的过期时刻：活动结束时间，否则为默认窗口
  /// Expiry instant of a cache entry: the event end, else the default window
  pub async fn ttl_until(&self, event_id: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let fallback = add_duration(now, self.config.default_ttl);
    match self.events.get_event(event_id).await {
      Ok(Some(event)) => event.ends_at.unwrap_or(fallback),
      Ok(None) => fallback,
      Err(e) => {
        tracing::warn!(event_id = %event_id, error = %e, "event lookup failed, using default ttl");
        fallback
      }
    }
  }
}
