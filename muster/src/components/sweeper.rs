//! 到期扫描器
//! Due-task sweeper
//!
//! 按固定间隔调用调度器的到期扫描。扫描间隔本身就是失败任务的退避。
//! Calls the scheduler's due-task sweep at a fixed interval. The interval
//! itself is the backoff of failed tasks.

use crate::components::ComponentLifecycle;
use crate::config::SweeperConfig;
use crate::scheduler::Scheduler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// 扫描器
/// Sweeper
pub struct Sweeper {
  scheduler: Arc<Scheduler>,
  config: SweeperConfig,
  token: CancellationToken,
  done: Arc<AtomicBool>,
}

impl Sweeper {
  pub fn new(scheduler: Arc<Scheduler>, config: SweeperConfig) -> Self {
    Self {
      scheduler,
      config,
      token: CancellationToken::new(),
      done: Arc::new(AtomicBool::new(false)),
    }
  }

  /// 启动扫描循环
  /// Start the sweep loop
  pub fn start(self: Arc<Self>) -> JoinHandle<()> {
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(self.config.interval);
      interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
      tracing::info!(
        scheduler_id = %self.scheduler.id(),
        interval_ms = self.config.interval.as_millis() as u64,
        batch_size = self.config.batch_size,
        "sweeper started"
      );

      loop {
        tokio::select! {
          _ = self.token.cancelled() => break,
          _ = interval.tick() => {}
        }

        if let Err(e) = self
          .scheduler
          .process_pending_tasks_with(self.config.batch_size, &self.token)
          .await
        {
          tracing::error!(error = %e, "sweep failed");
        }
      }

      self.done.store(true, Ordering::Relaxed);
      tracing::debug!("sweeper: shutting down");
    })
  }

  /// 停止扫描；进行中的网关调用被中止
  /// Stop sweeping; in-flight gateway calls are aborted
  pub fn shutdown(&self) {
    self.token.cancel();
    self.done.store(true, Ordering::Relaxed);
  }

  pub fn is_done(&self) -> bool {
    self.done.load(Ordering::Relaxed)
  }
}

impl ComponentLifecycle for Sweeper {
  fn start(self: Arc<Self>) -> JoinHandle<()> {
    Sweeper::start(self)
  }

  fn shutdown(&self) {
    Sweeper::shutdown(self)
  }

  fn is_done(&self) -> bool {
    Sweeper::is_done(self)
  }
}
