//! 任务模块
//! Task module
//!
//! 定义了定时外联任务的数据结构
//! Defines the data structures of time-triggered outreach tasks

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 任务动作
/// Task action
///
/// 未知动作保留原始名称，扫描时按无操作成功处理。
/// Unknown actions keep their raw name and complete as a no-op when swept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TaskAction {
  /// 向待定参与者请求确认
  /// Ask pending participants to confirm
  Confirmation,
  /// 提醒已确认参与者
  /// Remind confirmed participants
  Reminder,
  /// 请求已确认参与者共享位置
  /// Ask confirmed participants to share their location
  Location,
  /// 结束活动
  /// Close the event
  Closure,
  /// 当前版本不认识的动作
  /// An action this build does not know about
  Unknown(String),
}

impl TaskAction {
  pub fn as_str(&self) -> &str {
    match self {
      Self::Confirmation => "confirmation",
      Self::Reminder => "reminder",
      Self::Location => "location",
      Self::Closure => "closure",
      Self::Unknown(name) => name.as_str(),
    }
  }
}

impl FromStr for TaskAction {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let name = s.trim();
    if name.is_empty() {
      return Err(Error::invalid_input("action is required"));
    }
    Ok(match name.to_ascii_lowercase().as_str() {
      "confirmation" => Self::Confirmation,
      "reminder" => Self::Reminder,
      "location" => Self::Location,
      "closure" => Self::Closure,
      _ => Self::Unknown(name.to_string()),
    })
  }
}

impl TryFrom<String> for TaskAction {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> {
    value.parse()
  }
}

impl From<TaskAction> for String {
  fn from(action: TaskAction) -> Self {
    action.as_str().to_string()
  }
}

impl fmt::Display for TaskAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 任务状态
/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
  /// 等待执行
  /// Waiting to run
  Pending,
  /// 执行成功
  /// Executed successfully
  Processed,
  /// 重试耗尽，永久失败
  /// Retries exhausted, permanently failed
  Failed,
  /// 已取消
  /// Cancelled before running
  Skipped,
}

impl TaskStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Processed => "processed",
      Self::Failed => "failed",
      Self::Skipped => "skipped",
    }
  }

  /// 终态任务永远不会再次执行
  /// Terminal tasks are never executed again
  pub fn is_terminal(&self) -> bool {
    !matches!(self, Self::Pending)
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 定时任务
/// Scheduled task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
  pub id: String,
  pub event_id: String,
  /// 周期性活动的具体场次
  /// Concrete occurrence of a recurring event
  pub instance_id: Option<String>,
  pub action: TaskAction,
  pub status: TaskStatus,
  pub scheduled_at: DateTime<Utc>,
  pub processed_at: Option<DateTime<Utc>>,
  pub retries: u32,
  pub max_retries: u32,
  pub error_message: Option<String>,
  pub metadata: serde_json::Value,
  /// 当前持有租约的扫描者
  /// Sweeper currently holding the lease
  pub claimed_by: Option<String>,
  pub claimed_until: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl ScheduledTask {
  /// 任务是否到期
  /// Whether the task is due at `now`
  pub fn is_due(&self, now: DateTime<Utc>) -> bool {
    self.status == TaskStatus::Pending && self.scheduled_at <= now
  }

  /// 任务是否可被认领
  /// Whether a sweeper may claim the task at `now`
  pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
    self.status == TaskStatus::Pending && !matches!(self.claimed_until, Some(until) if until > now)
  }

  /// 再失败一次是否会耗尽重试
  /// Whether one more failure exhausts the retry budget
  pub fn is_last_attempt(&self) -> bool {
    self.retries + 1 >= self.max_retries
  }
}

/// 创建任务的输入
/// Input for creating a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewScheduledTask {
  pub event_id: String,
  pub instance_id: Option<String>,
  pub action: Option<String>,
  pub scheduled_at: Option<DateTime<Utc>>,
  pub max_retries: Option<u32>,
  pub metadata: Option<serde_json::Value>,
}

impl NewScheduledTask {
  pub fn new<S: Into<String>>(event_id: S) -> Self {
    Self {
      event_id: event_id.into(),
      ..Default::default()
    }
  }

  pub fn action<S: Into<String>>(mut self, action: S) -> Self {
    self.action = Some(action.into());
    self
  }

  pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
    self.scheduled_at = Some(at);
    self
  }

  pub fn instance_id<S: Into<String>>(mut self, instance_id: S) -> Self {
    self.instance_id = Some(instance_id.into());
    self
  }

  pub fn max_retries(mut self, max_retries: u32) -> Self {
    self.max_retries = Some(max_retries);
    self
  }

  pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
    self.metadata = Some(metadata);
    self
  }

  /// 校验输入并生成待执行任务
  /// Validate the input and build a pending task
  pub fn into_task(self, default_max_retries: u32, now: DateTime<Utc>) -> Result<ScheduledTask> {
    if self.event_id.trim().is_empty() {
      return Err(Error::invalid_input("event_id is required"));
    }
    let action: TaskAction = self
      .action
      .as_deref()
      .ok_or_else(|| Error::invalid_input("action is required"))?
      .parse()?;
    let scheduled_at = self
      .scheduled_at
      .ok_or_else(|| Error::invalid_input("scheduled_at is required"))?;
    let max_retries = self.max_retries.unwrap_or(default_max_retries);
    if max_retries == 0 {
      return Err(Error::invalid_input("max_retries must be at least 1"));
    }

    Ok(ScheduledTask {
      id: Uuid::new_v4().to_string(),
      event_id: self.event_id,
      instance_id: self.instance_id,
      action,
      status: TaskStatus::Pending,
      scheduled_at,
      processed_at: None,
      retries: 0,
      max_retries,
      error_message: None,
      metadata: self.metadata.unwrap_or(serde_json::Value::Null),
      claimed_by: None,
      claimed_until: None,
      created_at: now,
      updated_at: now,
    })
  }
}
