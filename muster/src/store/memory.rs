//! 内存存储实现
//! In-memory store implementation
//!
//! 使用内存数据结构实现任务、活动与位置历史存储，不依赖任何外部服务
//! Implements the task, event and location history stores with in-memory data
//! structures, without any external service dependency

use crate::error::{Error, Result};
use crate::event::{Event, EventStatus, Participant, ParticipantStatus};
use crate::location::LocationSample;
use crate::store::{EventStore, LocationStore, TaskStore};
use crate::task::{ScheduledTask, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 内存存储中的数据
/// Data held by the memory store
#[derive(Default)]
struct MemoryState {
  tasks: HashMap<String, ScheduledTask>,
  events: HashMap<String, Event>,
  /// 参与者，按插入顺序保存
  /// Participants, kept in insertion order
  participants: Vec<Participant>,
  /// 位置历史（只追加）
  /// Location history (append-only)
  locations: Vec<LocationSample>,
}

/// 内存存储
/// Memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
  state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn insert_event(&self, event: Event) {
    let mut state = self.state.write().await;
    state.events.insert(event.id.clone(), event);
  }

  pub async fn insert_participant(&self, participant: Participant) {
    let mut state = self.state.write().await;
    state.participants.retain(|p| p.id != participant.id);
    state.participants.push(participant);
  }

  /// 对待执行任务做条件转换；`owner` 为 None 时忽略租约归属
  /// Conditional transition of a pending task; a `None` owner ignores the lease holder
  async fn finish(
    &self,
    id: &str,
    owner: Option<&str>,
    status: TaskStatus,
    error: Option<&str>,
    at: DateTime<Utc>,
  ) -> Result<bool> {
    let mut state = self.state.write().await;
    let task = state
      .tasks
      .get_mut(id)
      .ok_or_else(|| Error::not_found("task", id))?;
    if !settleable(task, owner) {
      return Ok(false);
    }
    task.status = status;
    task.processed_at = Some(at);
    task.updated_at = at;
    task.claimed_by = None;
    task.claimed_until = None;
    if let Some(error) = error {
      task.error_message = Some(error.to_string());
    }
    Ok(true)
  }
}

fn settleable(task: &ScheduledTask, owner: Option<&str>) -> bool {
  if task.status != TaskStatus::Pending {
    return false;
  }
  match (owner, task.claimed_by.as_deref()) {
    (Some(owner), Some(holder)) => owner == holder,
    _ => true,
  }
}

#[async_trait]
impl TaskStore for MemoryStore {
  async fn insert(&self, task: &ScheduledTask) -> Result<()> {
    let mut state = self.state.write().await;
    if state.tasks.contains_key(&task.id) {
      return Err(Error::invalid_input(format!("task {} already exists", task.id)));
    }
    state.tasks.insert(task.id.clone(), task.clone());
    Ok(())
  }

  async fn get(&self, id: &str) -> Result<Option<ScheduledTask>> {
    let state = self.state.read().await;
    Ok(state.tasks.get(id).cloned())
  }

  async fn list_by_event(&self, event_id: &str) -> Result<Vec<ScheduledTask>> {
    let state = self.state.read().await;
    let mut tasks: Vec<_> = state
      .tasks
      .values()
      .filter(|t| t.event_id == event_id)
      .cloned()
      .collect();
    tasks.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));
    Ok(tasks)
  }

  async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledTask>> {
    let state = self.state.read().await;
    let mut due: Vec<_> = state
      .tasks
      .values()
      .filter(|t| t.is_due(now))
      .cloned()
      .collect();
    due.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));
    due.truncate(limit);
    Ok(due)
  }

  async fn claim(
    &self,
    id: &str,
    owner: &str,
    lease_until: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> Result<Option<ScheduledTask>> {
    let mut state = self.state.write().await;
    let task = state
      .tasks
      .get_mut(id)
      .ok_or_else(|| Error::not_found("task", id))?;
    if !task.is_claimable(now) {
      return Ok(None);
    }
    task.claimed_by = Some(owner.to_string());
    task.claimed_until = Some(lease_until);
    task.updated_at = now;
    Ok(Some(task.clone()))
  }

  async fn extend_lease(&self, id: &str, owner: &str, lease_until: DateTime<Utc>) -> Result<bool> {
    let mut state = self.state.write().await;
    let task = state
      .tasks
      .get_mut(id)
      .ok_or_else(|| Error::not_found("task", id))?;
    if task.status != TaskStatus::Pending || task.claimed_by.as_deref() != Some(owner) {
      return Ok(false);
    }
    if task.claimed_until.map_or(true, |until| until < lease_until) {
      task.claimed_until = Some(lease_until);
    }
    Ok(true)
  }

  async fn mark_as_processed(&self, id: &str, owner: &str, at: DateTime<Utc>) -> Result<bool> {
    self
      .finish(id, Some(owner), TaskStatus::Processed, None, at)
      .await
  }

  async fn increment_retries(&self, id: &str, owner: &str, error: &str) -> Result<Option<u32>> {
    let mut state = self.state.write().await;
    let task = state
      .tasks
      .get_mut(id)
      .ok_or_else(|| Error::not_found("task", id))?;
    if !settleable(task, Some(owner)) {
      return Ok(None);
    }
    task.retries += 1;
    task.error_message = Some(error.to_string());
    task.claimed_by = None;
    task.claimed_until = None;
    task.updated_at = Utc::now();
    Ok(Some(task.retries))
  }

  async fn mark_as_failed(
    &self,
    id: &str,
    owner: &str,
    error: &str,
    at: DateTime<Utc>,
  ) -> Result<bool> {
    self
      .finish(id, Some(owner), TaskStatus::Failed, Some(error), at)
      .await
  }

  async fn mark_as_skipped(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
    self.finish(id, None, TaskStatus::Skipped, None, at).await
  }
}

#[async_trait]
impl EventStore for MemoryStore {
  async fn get_event(&self, event_id: &str) -> Result<Option<Event>> {
    let state = self.state.read().await;
    Ok(state.events.get(event_id).cloned())
  }

  async fn list_participants(&self, event_id: &str) -> Result<Vec<Participant>> {
    let state = self.state.read().await;
    Ok(
      state
        .participants
        .iter()
        .filter(|p| p.event_id == event_id)
        .cloned()
        .collect(),
    )
  }

  async fn get_participant(&self, participant_id: &str) -> Result<Option<Participant>> {
    let state = self.state.read().await;
    Ok(
      state
        .participants
        .iter()
        .find(|p| p.id == participant_id)
        .cloned(),
    )
  }

  async fn update_event_status(&self, event_id: &str, status: EventStatus) -> Result<()> {
    let mut state = self.state.write().await;
    let event = state
      .events
      .get_mut(event_id)
      .ok_or_else(|| Error::not_found("event", event_id))?;
    event.status = status;
    Ok(())
  }

  async fn update_participant_status(
    &self,
    participant_id: &str,
    status: ParticipantStatus,
  ) -> Result<()> {
    let mut state = self.state.write().await;
    let participant = state
      .participants
      .iter_mut()
      .find(|p| p.id == participant_id)
      .ok_or_else(|| Error::not_found("participant", participant_id))?;
    participant.status = status;
    Ok(())
  }
}

#[async_trait]
impl LocationStore for MemoryStore {
  async fn append(&self, sample: &LocationSample) -> Result<()> {
    let mut state = self.state.write().await;
    state.locations.push(sample.clone());
    Ok(())
  }

  async fn latest(&self, event_id: &str, participant_id: &str) -> Result<Option<LocationSample>> {
    let state = self.state.read().await;
    Ok(
      state
        .locations
        .iter()
        .filter(|s| s.event_id == event_id && s.participant_id == participant_id)
        .max_by_key(|s| s.timestamp)
        .cloned(),
    )
  }

  async fn latest_for_participant(&self, participant_id: &str) -> Result<Option<LocationSample>> {
    let state = self.state.read().await;
    Ok(
      state
        .locations
        .iter()
        .filter(|s| s.participant_id == participant_id)
        .max_by_key(|s| s.timestamp)
        .cloned(),
    )
  }

  async fn history(
    &self,
    participant_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> Result<Vec<LocationSample>> {
    let state = self.state.read().await;
    let mut samples: Vec<_> = state
      .locations
      .iter()
      .filter(|s| s.participant_id == participant_id && s.timestamp >= from && s.timestamp <= to)
      .cloned()
      .collect();
    samples.sort_by_key(|s| s.timestamp);
    Ok(samples)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::task::NewScheduledTask;
  use chrono::Duration;

  fn pending_task(offset_minutes: i64) -> ScheduledTask {
    let now = Utc::now();
    NewScheduledTask::new("e1")
      .action("reminder")
      .scheduled_at(now + Duration::minutes(offset_minutes))
      .into_task(3, now)
      .unwrap()
  }

  #[tokio::test]
  async fn test_list_due_orders_and_limits() {
    let store = MemoryStore::new();
    let late = pending_task(-1);
    let early = pending_task(-10);
    let future = pending_task(10);
    for t in [&late, &early, &future] {
      store.insert(t).await.unwrap();
    }
    let due = store.list_due(Utc::now(), 10).await.unwrap();
    assert_eq!(
      due.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
      vec![early.id.as_str(), late.id.as_str()]
    );
    assert_eq!(store.list_due(Utc::now(), 1).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_terminal_transition_happens_once() {
    let store = MemoryStore::new();
    let task = pending_task(-1);
    store.insert(&task).await.unwrap();

    assert!(store.mark_as_processed(&task.id, "a", Utc::now()).await.unwrap());
    assert!(!store
      .mark_as_failed(&task.id, "a", "boom", Utc::now())
      .await
      .unwrap());
    assert!(!store.mark_as_skipped(&task.id, Utc::now()).await.unwrap());

    let stored = store.get(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Processed);
    assert!(stored.error_message.is_none());
    assert_eq!(store.increment_retries(&task.id, "a", "late").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_claim_is_exclusive_until_lease_expires() {
    let store = MemoryStore::new();
    let task = pending_task(-1);
    store.insert(&task).await.unwrap();
    let now = Utc::now();
    let lease = now + Duration::minutes(5);

    let claimed = store.claim(&task.id, "a", lease, now).await.unwrap().unwrap();
    assert_eq!(claimed.claimed_by.as_deref(), Some("a"));
    assert!(store.claim(&task.id, "b", lease, now).await.unwrap().is_none());
    assert!(store
      .claim(&task.id, "b", lease + Duration::minutes(5), lease + Duration::seconds(1))
      .await
      .unwrap()
      .is_some());

    assert_eq!(
      store.increment_retries(&task.id, "b", "oops").await.unwrap(),
      Some(1)
    );
    let stored = store.get(&task.id).await.unwrap().unwrap();
    assert!(stored.claimed_by.is_none());
    assert!(store.claim(&task.id, "c", lease, now).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn test_stale_owner_cannot_settle() {
    let store = MemoryStore::new();
    let task = pending_task(-1);
    store.insert(&task).await.unwrap();
    let now = Utc::now();
    let lease = now + Duration::minutes(5);

    store.claim(&task.id, "a", lease, now).await.unwrap();
    // "a" overran its lease and "b" took the task over.
    let later = lease + Duration::seconds(1);
    store
      .claim(&task.id, "b", later + Duration::minutes(5), later)
      .await
      .unwrap();

    assert!(!store.mark_as_processed(&task.id, "a", later).await.unwrap());
    assert!(!store.mark_as_failed(&task.id, "a", "boom", later).await.unwrap());
    assert_eq!(store.increment_retries(&task.id, "a", "boom").await.unwrap(), None);
    assert!(!store.extend_lease(&task.id, "a", later + Duration::hours(1)).await.unwrap());

    let stored = store.get(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Pending);
    assert_eq!(stored.retries, 0);
    assert!(store.mark_as_processed(&task.id, "b", later).await.unwrap());
  }

  #[tokio::test]
  async fn test_extend_lease_only_moves_forward() {
    let store = MemoryStore::new();
    let task = pending_task(-1);
    store.insert(&task).await.unwrap();
    let now = Utc::now();
    let lease = now + Duration::minutes(5);

    store.claim(&task.id, "a", lease, now).await.unwrap();
    assert!(store.extend_lease(&task.id, "a", lease + Duration::minutes(10)).await.unwrap());
    assert!(store.extend_lease(&task.id, "a", now).await.unwrap());
    let stored = store.get(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.claimed_until, Some(lease + Duration::minutes(10)));
  }

  #[tokio::test]
  async fn test_missing_task_is_not_found() {
    let store = MemoryStore::new();
    let err = store
      .mark_as_processed("nope", "a", Utc::now())
      .await
      .unwrap_err();
    assert!(err.is_not_found());
  }
}
