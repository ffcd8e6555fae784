//! 通知网关
//! Notification gateway
//!
//! 外发模板消息的外部协作方；模板与传输由网关自行负责，这里只关心成功或失败。
//! External collaborator that sends templated outbound messages. Templating
//! and transport are the gateway's concern; callers only see success or failure.

use crate::error::Result;
use crate::event::{Event, Participant};
use async_trait::async_trait;

#[async_trait]
pub trait NotificationGateway: Send + Sync {
  /// 请求参与者确认是否出席
  /// Ask a participant to confirm attendance
  async fn send_confirmation_request(&self, event: &Event, participant: &Participant) -> Result<()>;

  async fn send_reminder(&self, event: &Event, participant: &Participant) -> Result<()>;

  /// 请求参与者共享实时位置
  /// Ask a participant to share their live location
  async fn send_location_request(&self, event: &Event, participant: &Participant) -> Result<()>;

  async fn send_eta_update(
    &self,
    event: &Event,
    participant: &Participant,
    eta_minutes: i64,
  ) -> Result<()>;

  /// 自由文本消息
  /// Free-text message
  async fn send_message(&self, contact: &str, text: &str) -> Result<()>;
}

/// 只记录日志的网关，用于本地运行
/// Gateway that only logs, for local runs
#[derive(Debug, Clone, Default)]
pub struct LogGateway;

#[async_trait]
impl NotificationGateway for LogGateway {
  async fn send_confirmation_request(&self, event: &Event, participant: &Participant) -> Result<()> {
    tracing::info!(
      event_id = %event.id,
      participant_id = %participant.id,
      "confirmation request"
    );
    Ok(())
  }

  async fn send_reminder(&self, event: &Event, participant: &Participant) -> Result<()> {
    tracing::info!(event_id = %event.id, participant_id = %participant.id, "reminder");
    Ok(())
  }

  async fn send_location_request(&self, event: &Event, participant: &Participant) -> Result<()> {
    tracing::info!(
      event_id = %event.id,
      participant_id = %participant.id,
      "location request"
    );
    Ok(())
  }

  async fn send_eta_update(
    &self,
    event: &Event,
    participant: &Participant,
    eta_minutes: i64,
  ) -> Result<()> {
    tracing::info!(
      event_id = %event.id,
      participant_id = %participant.id,
      eta_minutes,
      "eta update"
    );
    Ok(())
  }

  async fn send_message(&self, contact: &str, text: &str) -> Result<()> {
    tracing::info!(contact = %contact, len = text.len(), "message");
    Ok(())
  }
}
