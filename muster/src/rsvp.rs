//! 回复状态记录
//! RSVP recording
//!
//! 参与者回复状态的写入路径：先更新持久存储，再镜像到活动状态缓存。
//! Write path of participant RSVP changes: the durable store is updated first,
//! then the status is mirrored into the event state cache.

use crate::error::{Error, Result};
use crate::event::ParticipantStatus;
use crate::event_cache::{ConfirmationEntry, EventStateCache};
use crate::store::EventStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct RsvpRecorder {
  events: Arc<dyn EventStore>,
  cache: EventStateCache,
}

impl RsvpRecorder {
  pub fn new(events: Arc<dyn EventStore>, cache: EventStateCache) -> Self {
    Self { events, cache }
  }

  /// 记录参与者的回复状态
  /// Record a participant's RSVP status
  pub async fn record(
    &self,
    org_id: &str,
    event_id: &str,
    participant_id: &str,
    status: ParticipantStatus,
  ) -> Result<ConfirmationEntry> {
    let participant = self
      .events
      .get_participant(participant_id)
      .await?
      .filter(|p| p.event_id == event_id && p.org_id == org_id)
      .ok_or_else(|| Error::not_found("participant", participant_id))?;
    let event = self.events.get_event(event_id).await?;

    self
      .events
      .update_participant_status(&participant.id, status)
      .await?;
    tracing::info!(
      event_id = %event_id,
      participant_id = %participant_id,
      from = %participant.status,
      to = %status,
      "participant status updated"
    );

    let entry = ConfirmationEntry::new(org_id, event_id, participant_id, status);
    let ttl_until = event.and_then(|e| e.ends_at);
    if let Err(e) = self.cache.set_confirmation(&entry, ttl_until).await {
      tracing::warn!(
        event_id = %event_id,
        participant_id = %participant_id,
        error = %e,
        "failed to mirror rsvp into cache"
      );
    }
    Ok(entry)
  }

  /// 从缓存中移除参与者的回复状态
  /// Remove a participant's RSVP status from the cache
  pub async fn remove(&self, org_id: &str, event_id: &str, participant_id: &str) -> Result<bool> {
    self
      .cache
      .delete_confirmation(org_id, event_id, participant_id)
      .await
  }
}
