//! 组件生命周期模块
//! Component lifecycle module
//!
//! 后台组件（目前是到期扫描器）的统一生命周期接口
//! Unified lifecycle interface for background components (currently the
//! due-task sweeper)

use std::sync::Arc;
use tokio::task::JoinHandle;

pub mod sweeper;

/// 组件生命周期管理接口
/// Component lifecycle interface
///
/// # 实现者 / Implementors
///
/// - [`Sweeper`](sweeper::Sweeper) - 周期性执行调度器的到期扫描 / periodically runs the scheduler's due-task sweep
pub trait ComponentLifecycle {
  /// 启动组件的后台任务，返回的 JoinHandle 在组件停止后完成
  /// Start the component's background task; the returned JoinHandle
  /// completes once the component stops
  fn start(self: Arc<Self>) -> JoinHandle<()>;

  /// 发送关闭信号，组件在当前操作结束后停止
  /// Signal shutdown; the component stops after the current operation
  fn shutdown(&self);

  fn is_done(&self) -> bool;
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, Ordering};

  struct TestComponent {
    done: Arc<AtomicBool>,
  }

  impl ComponentLifecycle for TestComponent {
    fn start(self: Arc<Self>) -> JoinHandle<()> {
      tokio::spawn(async move {
        while !self.done.load(Ordering::Relaxed) {
          tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
      })
    }

    fn shutdown(&self) {
      self.done.store(true, Ordering::Relaxed);
    }

    fn is_done(&self) -> bool {
      self.done.load(Ordering::Relaxed)
    }
  }

  #[tokio::test]
  async fn test_lifecycle_trait() {
    let component = Arc::new(TestComponent {
      done: Arc::new(AtomicBool::new(false)),
    });
    assert!(!component.is_done());

    let handle = component.clone().start();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    component.shutdown();

    assert!(component.is_done());
    handle.await.unwrap();
  }
}
