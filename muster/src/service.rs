//! 服务模块
//! Service module
//!
//! 把配置、共享缓存、持久存储与通知网关装配成全部组件，并统一管理后台组件的
//! 启动与关闭。
//! Wires the configuration, the shared cache, the durable stores and the
//! notification gateway into every component, and manages the start and
//! shutdown of the background components.

use crate::base::constants::COMPONENT_SHUTDOWN_TIMEOUT;
use crate::components::sweeper::Sweeper;
use crate::components::ComponentLifecycle;
use crate::config::{MusterConfig, SweeperConfig};
use crate::error::Result;
use crate::eta::EtaEngine;
use crate::event_cache::EventStateCache;
use crate::kv::KvStore;
use crate::location::LocationCache;
use crate::notify::NotificationGateway;
use crate::rsvp::RsvpRecorder;
use crate::scheduler::Scheduler;
use crate::store::{EventStore, LocationStore, TaskStore};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// 服务状态
/// Service state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
  New,
  Running,
  Closed,
}

/// 装配完成的服务
/// Assembled service
pub struct MusterService {
  kv: Arc<dyn KvStore>,
  scheduler: Arc<Scheduler>,
  locations: LocationCache,
  eta: EtaEngine,
  event_cache: EventStateCache,
  rsvp: RsvpRecorder,
  sweeper_config: SweeperConfig,
  state: ServiceState,
  components: Vec<(Arc<dyn ComponentLifecycle + Send + Sync>, JoinHandle<()>)>,
}

impl MusterService {
  /// 由同一个持久存储提供任务、活动与位置历史
  /// One durable store backs tasks, events and location history
  pub fn new<S>(
    config: MusterConfig,
    kv: Arc<dyn KvStore>,
    store: Arc<S>,
    gateway: Arc<dyn NotificationGateway>,
  ) -> Self
  where
    S: TaskStore + EventStore + LocationStore + 'static,
  {
    let tasks: Arc<dyn TaskStore> = store.clone();
    let events: Arc<dyn EventStore> = store.clone();
    let history: Arc<dyn LocationStore> = store;

    let scheduler = Arc::new(Scheduler::new(
      tasks,
      events.clone(),
      gateway.clone(),
      config.scheduler,
    ));
    let locations = LocationCache::new(kv.clone(), history, events.clone(), config.location);
    let eta = EtaEngine::new(locations.clone(), events.clone(), gateway, config.eta);
    let event_cache = EventStateCache::new(kv.clone(), config.event_cache);
    let rsvp = RsvpRecorder::new(events, event_cache.clone());

    Self {
      kv,
      scheduler,
      locations,
      eta,
      event_cache,
      rsvp,
      sweeper_config: config.sweeper,
      state: ServiceState::New,
      components: Vec::new(),
    }
  }

  pub fn scheduler(&self) -> &Arc<Scheduler> {
    &self.scheduler
  }

  pub fn locations(&self) -> &LocationCache {
    &self.locations
  }

  pub fn eta(&self) -> &EtaEngine {
    &self.eta
  }

  pub fn event_cache(&self) -> &EventStateCache {
    &self.event_cache
  }

  pub fn rsvp(&self) -> &RsvpRecorder {
    &self.rsvp
  }

  pub fn state(&self) -> ServiceState {
    self.state
  }

  /// 确认共享缓存可达后启动后台组件；重复调用无效果
  /// Start the background components once the shared cache answers; calling
  /// it again has no effect
  pub async fn start(&mut self) -> Result<()> {
    if self.state != ServiceState::New {
      return Ok(());
    }
    self.kv.ping().await?;

    let sweeper = Arc::new(Sweeper::new(
      self.scheduler.clone(),
      self.sweeper_config.clone(),
    ));
    let handle = sweeper.clone().start();
    self.components.push((sweeper, handle));

    self.state = ServiceState::Running;
    tracing::info!(
      scheduler_id = %self.scheduler.id(),
      components = self.components.len(),
      "service started"
    );
    Ok(())
  }

  /// 关闭全部后台组件，每个组件最多等待固定时长
  /// Shut every background component down, waiting a bounded time for each
  pub async fn shutdown(&mut self) {
    if self.state == ServiceState::Closed {
      return;
    }
    self.state = ServiceState::Closed;

    for (component, handle) in self.components.drain(..) {
      component.shutdown();
      if tokio::time::timeout(COMPONENT_SHUTDOWN_TIMEOUT, handle)
        .await
        .is_err()
      {
        tracing::warn!("component did not stop within the shutdown timeout");
      }
    }
    tracing::info!(scheduler_id = %self.scheduler.id(), "service stopped");
  }
}
