//! 外联动作的参与者扇出
//! Participant fan-out of outreach actions
//!
//! 同一任务内的发送互不影响：某个参与者发送失败不会中止其余参与者，
//! 任务结果在全部发送尝试完成后才确定。
//! Sends within one task are independent: a failure for one participant does
//! not abort the others, and the task outcome is decided only after every
//! send has been attempted.

use super::Scheduler;
use crate::base::add_duration;
use crate::error::{Error, Result};
use crate::event::{Event, Participant, ParticipantStatus};
use crate::task::ScheduledTask;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

/// 面向参与者的外联动作
/// Participant-facing outreach action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outreach {
  Confirmation,
  Reminder,
  Location,
}

impl Outreach {
  /// 接收该动作的参与者状态
  /// Participant status this outreach is addressed to
  pub fn audience(&self) -> ParticipantStatus {
    match self {
      Self::Confirmation => ParticipantStatus::Pending,
      Self::Reminder | Self::Location => ParticipantStatus::Confirmed,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Confirmation => "confirmation",
      Self::Reminder => "reminder",
      Self::Location => "location",
    }
  }
}

impl Scheduler {
  /// 向活动中符合条件的参与者发送外联消息；发送前按发送轮数续约任务租约
  /// Send an outreach message to every eligible participant of the event.
  /// Before sending, the task lease is extended to cover every send wave
  pub(super) async fn fan_out(
    &self,
    task: &ScheduledTask,
    outreach: Outreach,
    token: &CancellationToken,
  ) -> Result<()> {
    let event_id = task.event_id.as_str();
    let event = self
      .events
      .get_event(event_id)
      .await?
      .ok_or_else(|| Error::not_found("event", event_id))?;
    let audience = outreach.audience();
    let targets: Vec<Participant> = self
      .events
      .list_participants(event_id)
      .await?
      .into_iter()
      .filter(|p| p.status == audience)
      .collect();
    if targets.is_empty() {
      tracing::debug!(event_id = %event_id, outreach = outreach.as_str(), "no eligible participants");
      return Ok(());
    }

    let concurrency = self.config.fanout_concurrency.max(1);
    self.renew_lease(task, targets.len(), concurrency).await?;

    // 扫描器在 tokio::spawn 中运行，每个发送 future 都必须是 Send
    // The sweeper runs under tokio::spawn, so every send future must be Send
    let event = &event;
    let sends: Vec<BoxFuture<'_, (&Participant, Result<()>)>> = targets
      .iter()
      .map(|participant| {
        self
          .send_bounded(outreach, event, participant, token)
          .map(move |result| (participant, result))
          .boxed()
      })
      .collect();
    let results: Vec<(&Participant, Result<()>)> = stream::iter(sends)
      .buffer_unordered(concurrency)
      .collect()
      .await;

    let mut failed = 0;
    let mut first_error = None;
    for (participant, result) in results {
      if let Err(e) = result {
        tracing::warn!(
          event_id = %event_id,
          participant_id = %participant.id,
          outreach = outreach.as_str(),
          error = %e,
          "send failed"
        );
        failed += 1;
        first_error.get_or_insert(e);
      }
    }

    match first_error {
      None => Ok(()),
      Some(e) => Err(Error::gateway(format!(
        "{failed} of {} {} sends failed, first error: {e}",
        targets.len(),
        outreach.as_str()
      ))),
    }
  }

  /// 把租约延长到最坏情况下全部发送完成之后；租约已被他人接管时返回 Store 错误
  /// Push the lease past the worst-case end of every send; a lease taken over
  /// by another sweeper is a Store error
  async fn renew_lease(&self, task: &ScheduledTask, targets: usize, concurrency: usize) -> Result<()> {
    let waves = u32::try_from(targets.div_ceil(concurrency)).unwrap_or(u32::MAX);
    let budget = self
      .config
      .send_timeout
      .saturating_mul(waves)
      .saturating_add(self.config.claim_lease);
    let until = add_duration(Utc::now(), budget);
    if !self.tasks.extend_lease(&task.id, &self.id, until).await? {
      return Err(Error::store(format!("lease on task {} was lost", task.id)));
    }
    tracing::debug!(task_id = %task.id, lease_until = %until, waves, "task lease extended");
    Ok(())
  }

  /// 单次发送，受超时与取消令牌约束
  /// One send, bounded by the send timeout and the cancellation token
  async fn send_bounded(
    &self,
    outreach: Outreach,
    event: &Event,
    participant: &Participant,
    token: &CancellationToken,
  ) -> Result<()> {
    let send = async {
      match outreach {
        Outreach::Confirmation => {
          self
            .gateway
            .send_confirmation_request(event, participant)
            .await
        }
        Outreach::Reminder => self.gateway.send_reminder(event, participant).await,
        Outreach::Location => self.gateway.send_location_request(event, participant).await,
      }
    };

    tokio::select! {
      _ = token.cancelled() => Err(Error::Cancelled),
      result = tokio::time::timeout(self.config.send_timeout, send) => match result {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout),
      },
    }
  }
}
