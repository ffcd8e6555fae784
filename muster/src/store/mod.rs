//! 持久化存储接口
//! Persistent store interfaces
//!
//! 关系型存储是外部协作方，这里只定义调度器、位置缓存与到达时间估算所依赖的窄接口。
//! The relational store is an external collaborator; this module only defines
//! the narrow interfaces the scheduler, the location cache and the ETA engine
//! depend on.

use crate::error::Result;
use crate::event::{Event, EventStatus, Participant, ParticipantStatus};
use crate::location::LocationSample;
use crate::task::ScheduledTask;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

mod memory;

pub use memory::MemoryStore;

/// 定时任务存储
/// Scheduled task store
///
/// 所有终态转换都以 `status = pending` 为前提，返回值表示转换是否发生，
/// 因此每个任务至多发生一次终态转换。
/// Every terminal transition is conditional on `status = pending` and reports
/// whether it happened, so a task goes through at most one terminal transition.
#[async_trait]
pub trait TaskStore: Send + Sync {
  async fn insert(&self, task: &ScheduledTask) -> Result<()>;

  async fn get(&self, id: &str) -> Result<Option<ScheduledTask>>;

  async fn list_by_event(&self, event_id: &str) -> Result<Vec<ScheduledTask>>;

  /// 到期的待执行任务，按计划时间升序
  /// Due pending tasks ordered by scheduled time
  async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledTask>>;

  /// 原子认领：仅当任务待执行且无有效租约时成功，返回认领后的最新任务
  /// Atomic claim: succeeds only while the task is pending and unleased, and
  /// returns the task as stored after the claim
  async fn claim(
    &self,
    id: &str,
    owner: &str,
    lease_until: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> Result<Option<ScheduledTask>>;

  /// 延长 `owner` 持有的租约；租约已被他人持有或任务不再待执行时返回 false
  /// Extend the lease held by `owner`; false once another sweeper holds it or
  /// the task is no longer pending
  async fn extend_lease(&self, id: &str, owner: &str, lease_until: DateTime<Utc>) -> Result<bool>;

  /// 结算转换（processed / 重试 / failed）只对 `owner` 持有或未被认领的待执行任务生效
  /// Settling transitions (processed, retry, failed) only apply to pending
  /// tasks held by `owner` or not claimed at all
  async fn mark_as_processed(&self, id: &str, owner: &str, at: DateTime<Utc>) -> Result<bool>;

  /// 增加重试计数、记录错误并释放租约，返回新的重试次数；未发生时返回 None
  /// Bump the retry counter, record the error and release the lease; returns
  /// the new count, or None when the transition did not happen
  async fn increment_retries(&self, id: &str, owner: &str, error: &str) -> Result<Option<u32>>;

  async fn mark_as_failed(
    &self,
    id: &str,
    owner: &str,
    error: &str,
    at: DateTime<Utc>,
  ) -> Result<bool>;

  /// 取消：不论租约归属，只要任务待执行即生效
  /// Cancellation: applies to any pending task regardless of lease holder
  async fn mark_as_skipped(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;
}

/// 活动与参与者存储
/// Event and participant store
#[async_trait]
pub trait EventStore: Send + Sync {
  async fn get_event(&self, event_id: &str) -> Result<Option<Event>>;

  async fn list_participants(&self, event_id: &str) -> Result<Vec<Participant>>;

  async fn get_participant(&self, participant_id: &str) -> Result<Option<Participant>>;

  async fn update_event_status(&self, event_id: &str, status: EventStatus) -> Result<()>;

  async fn update_participant_status(
    &self,
    participant_id: &str,
    status: ParticipantStatus,
  ) -> Result<()>;
}

/// 位置历史存储（只追加）
/// Location history store (append-only)
#[async_trait]
pub trait LocationStore: Send + Sync {
  async fn append(&self, sample: &LocationSample) -> Result<()>;

  /// 某活动中参与者的最新样本
  /// Latest sample of a participant within an event
  async fn latest(&self, event_id: &str, participant_id: &str) -> Result<Option<LocationSample>>;

  /// 参与者跨活动的最新样本
  /// Latest sample of a participant across events
  async fn latest_for_participant(&self, participant_id: &str) -> Result<Option<LocationSample>>;

  /// `[from, to]` 区间内的历史，按时间升序
  /// History within `[from, to]`, oldest first
  async fn history(
    &self,
    participant_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> Result<Vec<LocationSample>>;
}
