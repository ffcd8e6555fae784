//! 配置模块
//! Configuration module
//!
//! 每个组件在构造时接收自己的配置，默认值集中在 `base::constants`
//! Every component receives its own configuration at construction; defaults
//! live in `base::constants`

use crate::base::constants::*;
use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

/// 活动排期计划：每个动作相对活动时间的偏移
/// Action plan: offset of each action relative to the event times
#[derive(Debug, Clone, PartialEq)]
pub struct ActionPlan {
  /// 活动开始前多久请求确认（None 表示不排期）
  /// Lead time before the start for confirmation requests (None disables it)
  pub confirmation_lead: Option<Duration>,
  /// 活动开始前多久发送提醒
  /// Lead time before the start for reminders
  pub reminder_lead: Option<Duration>,
  /// 活动开始前多久请求位置
  /// Lead time before the start for location requests
  pub location_lead: Option<Duration>,
  /// 是否在活动结束时关闭活动
  /// Whether to close the event at its end
  pub closure: bool,
  /// 活动没有结束时间时假定的时长
  /// Assumed event length when no end time is known
  pub default_event_length: Duration,
}

impl Default for ActionPlan {
  fn default() -> Self {
    Self {
      confirmation_lead: Some(CONFIRMATION_LEAD),
      reminder_lead: Some(REMINDER_LEAD),
      location_lead: Some(LOCATION_LEAD),
      closure: true,
      default_event_length: DEFAULT_EVENT_LENGTH,
    }
  }
}

/// 调度器配置
/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
  /// 新任务默认的最大重试次数
  /// Default retry budget of new tasks
  pub max_retries: u32,
  /// 认领租约时长
  /// Claim lease duration
  pub claim_lease: Duration,
  /// 单次网关调用超时
  /// Timeout of a single gateway call
  pub send_timeout: Duration,
  /// 单个任务内并发发送数
  /// Concurrent sends within one task
  pub fanout_concurrency: usize,
  pub action_plan: ActionPlan,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      max_retries: DEFAULT_MAX_RETRIES,
      claim_lease: DEFAULT_CLAIM_LEASE,
      send_timeout: DEFAULT_SEND_TIMEOUT,
      fanout_concurrency: DEFAULT_FANOUT_CONCURRENCY,
      action_plan: ActionPlan::default(),
    }
  }
}

impl SchedulerConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// 设置最大重试次数
  /// Set the retry budget
  pub fn max_retries(mut self, max_retries: u32) -> Result<Self> {
    if max_retries == 0 {
      return Err(Error::config("max_retries must be at least 1"));
    }
    self.max_retries = max_retries;
    Ok(self)
  }

  pub fn claim_lease(mut self, lease: Duration) -> Self {
    self.claim_lease = lease;
    self
  }

  pub fn send_timeout(mut self, timeout: Duration) -> Self {
    self.send_timeout = timeout;
    self
  }

  pub fn fanout_concurrency(mut self, concurrency: usize) -> Self {
    self.fanout_concurrency = concurrency.max(1);
    self
  }

  pub fn action_plan(mut self, plan: ActionPlan) -> Self {
    self.action_plan = plan;
    self
  }
}

/// 位置缓存配置
/// Location cache configuration
#[derive(Debug, Clone)]
pub struct LocationConfig {
  /// 活动结束时间未知时的缓存存活期
  /// Cache lifetime when the event end is unknown
  pub default_ttl: Duration,
}

impl Default for LocationConfig {
  fn default() -> Self {
    Self {
      default_ttl: DEFAULT_CACHE_TTL,
    }
  }
}

impl LocationConfig {
  pub fn default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = ttl;
    self
  }
}

/// 到达时间估算配置
/// ETA configuration
#[derive(Debug, Clone)]
pub struct EtaConfig {
  /// 设备未上报速度时假定的平均速度（km/h）
  /// Assumed average speed when the device reports none (km/h)
  pub average_speed_kmh: f64,
}

impl Default for EtaConfig {
  fn default() -> Self {
    Self {
      average_speed_kmh: DEFAULT_AVERAGE_SPEED_KMH,
    }
  }
}

impl EtaConfig {
  pub fn average_speed_kmh(mut self, speed: f64) -> Result<Self> {
    if !speed.is_finite() || speed <= 0.0 {
      return Err(Error::config("average speed must be positive"));
    }
    self.average_speed_kmh = speed;
    Ok(self)
  }
}

/// 事件状态缓存配置
/// Event state cache configuration
#[derive(Debug, Clone)]
pub struct EventCacheConfig {
  /// 每页 SCAN 数量
  /// Keys requested per SCAN page
  pub scan_count: usize,
  /// 确认状态条目的默认存活期
  /// Default lifetime of confirmation entries
  pub default_ttl: Duration,
}

impl Default for EventCacheConfig {
  fn default() -> Self {
    Self {
      scan_count: DEFAULT_SCAN_COUNT,
      default_ttl: DEFAULT_CACHE_TTL,
    }
  }
}

impl EventCacheConfig {
  pub fn scan_count(mut self, count: usize) -> Self {
    self.scan_count = count.max(1);
    self
  }

  pub fn default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = ttl;
    self
  }
}

/// 扫描器配置
/// Sweeper configuration
#[derive(Debug, Clone)]
pub struct SweeperConfig {
  pub interval: Duration,
  /// 单次扫描处理的任务上限
  /// Upper bound of tasks handled by one sweep
  pub batch_size: usize,
}

impl Default for SweeperConfig {
  fn default() -> Self {
    Self {
      interval: DEFAULT_SWEEP_INTERVAL,
      batch_size: DEFAULT_SWEEP_BATCH,
    }
  }
}

impl SweeperConfig {
  pub fn interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  pub fn batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size.max(1);
    self
  }
}

/// 全部组件的配置
/// Configuration of every component
#[derive(Debug, Clone)]
pub struct MusterConfig {
  pub redis_url: String,
  pub scheduler: SchedulerConfig,
  pub location: LocationConfig,
  pub eta: EtaConfig,
  pub event_cache: EventCacheConfig,
  pub sweeper: SweeperConfig,
}

impl Default for MusterConfig {
  fn default() -> Self {
    Self {
      redis_url: "redis://127.0.0.1:6379".to_string(),
      scheduler: SchedulerConfig::default(),
      location: LocationConfig::default(),
      eta: EtaConfig::default(),
      event_cache: EventCacheConfig::default(),
      sweeper: SweeperConfig::default(),
    }
  }
}

impl MusterConfig {
  /// 从环境变量读取配置，缺省项使用默认值
  /// Read the configuration from environment variables, falling back to defaults
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut config = Self::default();
    if let Some(url) = lookup("MUSTER_REDIS_URL") {
      config.redis_url = url;
    }
    if let Some(secs) = parse_var::<u64>(&lookup, "MUSTER_SWEEP_INTERVAL_SECS")? {
      if secs == 0 {
        return Err(Error::config("MUSTER_SWEEP_INTERVAL_SECS must be positive"));
      }
      config.sweeper = config.sweeper.interval(Duration::from_secs(secs));
    }
    if let Some(batch) = parse_var::<usize>(&lookup, "MUSTER_SWEEP_BATCH")? {
      config.sweeper = config.sweeper.batch_size(batch);
    }
    if let Some(max_retries) = parse_var::<u32>(&lookup, "MUSTER_MAX_RETRIES")? {
      config.scheduler = config.scheduler.max_retries(max_retries)?;
    }
    if let Some(secs) = parse_var::<u64>(&lookup, "MUSTER_LOCATION_TTL_SECS")? {
      config.location = config.location.default_ttl(Duration::from_secs(secs));
      config.event_cache = config.event_cache.default_ttl(Duration::from_secs(secs));
    }
    if let Some(speed) = parse_var::<f64>(&lookup, "MUSTER_AVERAGE_SPEED_KMH")? {
      config.eta = config.eta.average_speed_kmh(speed)?;
    }
    Ok(config)
  }
}

fn parse_var<T: FromStr>(
  lookup: &impl Fn(&str) -> Option<String>,
  name: &str,
) -> Result<Option<T>> {
  match lookup(name) {
    None => Ok(None),
    Some(raw) => raw
      .trim()
      .parse::<T>()
      .map(Some)
      .map_err(|_| Error::config(format!("invalid value for {name}: {raw}"))),
  }
}
