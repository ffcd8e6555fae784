//! # Muster
//!
//! 面向线下活动的定时外联与实时出席追踪
//! Timed outreach and live attendance tracking for real-world gatherings
//!
//! ## 特性
//! ## Features
//!
//! - 按活动时间排期的确认请求、提醒、位置请求与活动关闭
//!   - Confirmation requests, reminders, location requests and closure scheduled from event times
//! - 有界重试，预算耗尽后任务永久失败并保留错误信息
//!   - Bounded retries; an exhausted task fails permanently and keeps its error message
//! - 任务认领租约，多个扫描者不会重复执行同一任务
//!   - Claim leases, so several sweepers never run the same task twice
//! - 每个参与者的最新位置缓存，存活期绑定活动结束时间
//!   - Per-participant latest-location cache whose lifetime follows the event end
//! - 基于设备速度或平均速度的到达时间估算
//!   - Arrival estimates from device speed or an assumed average speed
//! - 由缓存扫描组装的活动状态快照
//!   - Event state snapshots assembled from cache scans
//! - [`service::MusterService`] 装配全部组件并管理后台扫描
//!   - [`service::MusterService`] wires every component and runs the background sweep
//!
//! ## 快速开始
//! ## Quick Start
//!
//! ```rust,no_run
//! use muster::config::SchedulerConfig;
//! use muster::notify::LogGateway;
//! use muster::scheduler::Scheduler;
//! use muster::store::MemoryStore;
//! use muster::task::NewScheduledTask;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> muster::error::Result<()> {
//!   let store = MemoryStore::new();
//!   let scheduler = Scheduler::new(
//!     Arc::new(store.clone()),
//!     Arc::new(store),
//!     Arc::new(LogGateway),
//!     SchedulerConfig::default(),
//!   );
//!
//!   scheduler
//!     .create(
//!       NewScheduledTask::new("event-1")
//!         .action("reminder")
//!         .scheduled_at(chrono::Utc::now()),
//!     )
//!     .await?;
//!
//!   let processed = scheduler.process_pending_tasks(100).await?;
//!   println!("processed {processed} tasks");
//!   Ok(())
//! }
//! ```

pub mod base;
pub mod components;
pub mod config;
pub mod error;
pub mod eta;
pub mod event;
pub mod event_cache;
pub mod kv;
pub mod location;
pub mod notify;
pub mod rsvp;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod task;

pub use error::{Error, Result};
