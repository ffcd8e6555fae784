//! 调度器模块
//! Scheduler module
//!
//! 按活动持有定时动作（确认请求、提醒、位置请求、关闭活动），在到期扫描中执行它们并
//! 记录结果。失败的任务在重试预算内保持待执行状态，由下一次扫描重试；预算耗尽后
//! 标记为永久失败。
//!
//! Owns the timed actions of each event (confirmation requests, reminders,
//! location requests, closure), runs them during due-task sweeps and records
//! the outcome. A failed task stays pending within its retry budget and is
//! retried by the next sweep; once the budget is spent it is marked failed.
//!
//! 每个任务在执行前先被认领（带租约），并发扫描不会重复执行同一任务。
//! Each task is claimed with a lease before it runs, so concurrent sweeps do
//! not execute the same task twice.

use crate::base::{add_duration, sub_duration};
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::event::{Event, EventStatus};
use crate::notify::NotificationGateway;
use crate::store::{EventStore, TaskStore};
use crate::task::{NewScheduledTask, ScheduledTask, TaskAction, TaskStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

mod actions;

pub use actions::Outreach;

/// 单次扫描的统计
/// Statistics of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  /// 到期的任务数
  /// Tasks found due
  pub due: usize,
  /// 被其他扫描者持有而跳过的任务数
  /// Tasks skipped because another sweeper holds them
  pub contended: usize,
  pub processed: usize,
  /// 失败但仍在重试预算内的任务数
  /// Tasks that failed but are still within their retry budget
  pub retried: usize,
  pub failed: usize,
}

/// 调度器
/// Scheduler
pub struct Scheduler {
  /// 扫描者标识: hostname:pid:uuid
  /// Sweeper identity: hostname:pid:uuid
  id: String,
  tasks: Arc<dyn TaskStore>,
  events: Arc<dyn EventStore>,
  gateway: Arc<dyn NotificationGateway>,
  config: SchedulerConfig,
}

impl Scheduler {
  pub fn new(
    tasks: Arc<dyn TaskStore>,
    events: Arc<dyn EventStore>,
    gateway: Arc<dyn NotificationGateway>,
    config: SchedulerConfig,
  ) -> Self {
    let id = format!(
      "{}:{}:{}",
      hostname::get().unwrap_or_default().to_string_lossy(),
      std::process::id(),
      Uuid::new_v4()
    );
    Self {
      id,
      tasks,
      events,
      gateway,
      config,
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn config(&self) -> &SchedulerConfig {
    &self.config
  }

  /// 创建任务；缺少动作或时间时返回 InvalidInput
  /// Create a task; a missing action or time is InvalidInput
  pub async fn create(&self, input: NewScheduledTask) -> Result<ScheduledTask> {
    let task = input.into_task(self.config.max_retries, Utc::now())?;
    self.tasks.insert(&task).await?;
    tracing::info!(
      task_id = %task.id,
      event_id = %task.event_id,
      action = %task.action,
      scheduled_at = %task.scheduled_at,
      "task created"
    );
    Ok(task)
  }

  pub async fn get_by_id(&self, id: &str) -> Result<ScheduledTask> {
    self
      .tasks
      .get(id)
      .await?
      .ok_or_else(|| Error::not_found("task", id))
  }

  pub async fn list_by_event(&self, event_id: &str) -> Result<Vec<ScheduledTask>> {
    self.tasks.list_by_event(event_id).await
  }

  /// 取消待执行任务（pending → skipped）
  /// Cancel a pending task (pending → skipped)
  pub async fn cancel(&self, id: &str) -> Result<()> {
    let task = self.get_by_id(id).await?;
    if task.status != TaskStatus::Pending {
      return Err(Error::invalid_input(format!(
        "task {id} is {}, only pending tasks can be cancelled",
        task.status
      )));
    }
    // 读取与转换之间任务可能已被扫描完成
    // A sweep may finish the task between the read and the transition
    if !self.tasks.mark_as_skipped(id, Utc::now()).await? {
      return Err(Error::invalid_input(format!(
        "task {id} is no longer pending"
      )));
    }
    tracing::info!(task_id = %id, event_id = %task.event_id, "task cancelled");
    Ok(())
  }

  /// 取消活动的所有待执行任务，返回取消的数量
  /// Cancel every pending task of an event, returning how many were cancelled
  pub async fn cancel_event(&self, event_id: &str) -> Result<usize> {
    let now = Utc::now();
    let mut cancelled = 0;
    for task in self.tasks.list_by_event(event_id).await? {
      if task.status == TaskStatus::Pending && self.tasks.mark_as_skipped(&task.id, now).await? {
        cancelled += 1;
      }
    }
    tracing::info!(event_id = %event_id, cancelled, "event tasks cancelled");
    Ok(cancelled)
  }

  /// 按动作计划为活动创建任务；已过期的外联动作不再创建，关闭动作总会创建
  /// Create the tasks of an event from the action plan; outreach whose time has
  /// already passed is left out, closure is always created
  pub async fn schedule_event(&self, event: &Event) -> Result<Vec<ScheduledTask>> {
    if matches!(event.status, EventStatus::Completed | EventStatus::Cancelled) {
      return Err(Error::invalid_input(format!(
        "event {} is {}, nothing to schedule",
        event.id, event.status
      )));
    }
    let now = Utc::now();
    let mut created = Vec::new();
    for (action, at) in self.planned_actions(event) {
      if action != TaskAction::Closure && at < now {
        tracing::debug!(event_id = %event.id, action = %action, "planned time already passed");
        continue;
      }
      let input = NewScheduledTask::new(event.id.as_str())
        .action(action.as_str())
        .scheduled_at(at);
      created.push(self.create(input).await?);
    }
    Ok(created)
  }

  fn planned_actions(&self, event: &Event) -> Vec<(TaskAction, DateTime<Utc>)> {
    let plan = &self.config.action_plan;
    let mut planned = Vec::with_capacity(4);
    for (action, lead) in [
      (TaskAction::Confirmation, plan.confirmation_lead),
      (TaskAction::Reminder, plan.reminder_lead),
      (TaskAction::Location, plan.location_lead),
    ] {
      if let Some(lead) = lead {
        planned.push((action, sub_duration(event.starts_at, lead)));
      }
    }
    if plan.closure {
      let end = event
        .ends_at
        .unwrap_or_else(|| add_duration(event.starts_at, plan.default_event_length));
      planned.push((TaskAction::Closure, end));
    }
    planned
  }

  /// 执行一次到期扫描，返回成功处理的任务数
  /// Run one due-task sweep, returning the number of tasks processed
  pub async fn process_pending_tasks(&self, limit: usize) -> Result<usize> {
    let report = self
      .process_pending_tasks_with(limit, &CancellationToken::new())
      .await?;
    Ok(report.processed)
  }

  /// 执行一次到期扫描；令牌取消后不再认领新任务，进行中的网关调用被中止并走失败路径
  /// Run one due-task sweep. Once the token is cancelled no further task is
  /// claimed, and in-flight gateway calls are aborted and take the failure path
  pub async fn process_pending_tasks_with(
    &self,
    limit: usize,
    token: &CancellationToken,
  ) -> Result<SweepReport> {
    let now = Utc::now();
    let due = self.tasks.list_due(now, limit).await?;
    let mut report = SweepReport {
      due: due.len(),
      ..Default::default()
    };

    for task in &due {
      if token.is_cancelled() {
        tracing::debug!(scheduler_id = %self.id, "sweep cancelled");
        break;
      }
      let now = Utc::now();
      let lease_until = add_duration(now, self.config.claim_lease);
      // 结算基于认领后的任务，而不是可能已过期的到期列表
      // Settle against the claimed row, not the possibly stale due listing
      let claimed = match self.tasks.claim(&task.id, &self.id, lease_until, now).await {
        Ok(Some(claimed)) => claimed,
        Ok(None) => {
          tracing::debug!(task_id = %task.id, "task held by another sweeper");
          report.contended += 1;
          continue;
        }
        Err(e) => {
          tracing::error!(task_id = %task.id, error = %e, "failed to claim task");
          continue;
        }
      };

      let outcome = self.execute(&claimed, token).await;
      if let Err(e) = self.settle(&claimed, outcome, &mut report).await {
        tracing::error!(task_id = %task.id, error = %e, "failed to record task outcome");
      }
    }

    if report.due > 0 {
      tracing::info!(
        due = report.due,
        processed = report.processed,
        retried = report.retried,
        failed = report.failed,
        contended = report.contended,
        "sweep finished"
      );
    }
    Ok(report)
  }

  /// 执行任务动作
  /// Execute the task's action
  async fn execute(&self, task: &ScheduledTask, token: &CancellationToken) -> Result<()> {
    match &task.action {
      TaskAction::Confirmation => {
        self.fan_out(task, Outreach::Confirmation, token).await
      }
      TaskAction::Reminder => self.fan_out(task, Outreach::Reminder, token).await,
      TaskAction::Location => self.fan_out(task, Outreach::Location, token).await,
      TaskAction::Closure => {
        self
          .events
          .update_event_status(&task.event_id, EventStatus::Completed)
          .await?;
        tracing::info!(event_id = %task.event_id, "event completed");
        Ok(())
      }
      TaskAction::Unknown(name) => {
        tracing::warn!(task_id = %task.id, action = %name, "unknown action, treating as no-op");
        Ok(())
      }
    }
  }

  /// 记录执行结果；每个任务至多一次终态转换。NotFound、InvalidInput 等非瞬时错误
  /// 直接失败，只有瞬时错误消耗重试预算
  /// Record the outcome; each task reaches a terminal state at most once.
  /// Non-transient errors such as NotFound or InvalidInput fail the task at
  /// once; only transient errors spend the retry budget
  async fn settle(
    &self,
    task: &ScheduledTask,
    outcome: Result<()>,
    report: &mut SweepReport,
  ) -> Result<()> {
    let now = Utc::now();
    match outcome {
      Ok(()) => {
        if self.tasks.mark_as_processed(&task.id, &self.id, now).await? {
          tracing::debug!(task_id = %task.id, action = %task.action, "task processed");
          report.processed += 1;
        } else {
          tracing::warn!(task_id = %task.id, "lease lost before the task was settled");
        }
      }
      Err(e) if e.is_terminal() || task.is_last_attempt() => {
        let message = e.to_string();
        if self
          .tasks
          .mark_as_failed(&task.id, &self.id, &message, now)
          .await?
        {
          tracing::warn!(
            task_id = %task.id,
            action = %task.action,
            retries = task.retries,
            transient = e.is_transient(),
            error = %message,
            "task failed permanently"
          );
          report.failed += 1;
        } else {
          tracing::warn!(task_id = %task.id, "lease lost before the task was settled");
        }
      }
      Err(e) => {
        let message = e.to_string();
        match self
          .tasks
          .increment_retries(&task.id, &self.id, &message)
          .await?
        {
          Some(retries) => {
            tracing::warn!(
              task_id = %task.id,
              action = %task.action,
              retries,
              max_retries = task.max_retries,
              error = %message,
              "task failed, will retry"
            );
            report.retried += 1;
          }
          None => {
            tracing::warn!(task_id = %task.id, "lease lost before the task was settled");
          }
        }
      }
    }
    Ok(())
  }
}
