//! Muster worker binary
//!
//! 装配全部组件并周期性执行到期扫描的独立进程，Ctrl-C 时优雅退出。
//! Standalone process that wires every component and runs the due-task sweep
//! periodically; exits gracefully on Ctrl-C.

use muster::config::MusterConfig;
use muster::kv::RedisKv;
use muster::notify::LogGateway;
use muster::service::MusterService;
use muster::store::MemoryStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::registry()
    .with(fmt::layer())
    .with(EnvFilter::from_default_env().add_directive("muster=info".parse()?))
    .init();

  let config = MusterConfig::from_env()?;
  info!(
    version = muster::base::constants::VERSION,
    redis_url = %config.redis_url,
    interval_ms = config.sweeper.interval.as_millis() as u64,
    batch_size = config.sweeper.batch_size,
    "starting muster-worker"
  );

  let kv = RedisKv::new(config.redis_url.as_str()).await?;
  let mut service = MusterService::new(
    config,
    Arc::new(kv),
    Arc::new(MemoryStore::new()),
    Arc::new(LogGateway),
  );
  service.start().await?;

  tokio::signal::ctrl_c().await?;
  info!("shutdown signal received");
  service.shutdown().await;

  info!("muster-worker stopped");
  Ok(())
}
