use std::time::Duration;

/// 默认最大重试次数
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// 每次扫描最多处理的任务数
pub const DEFAULT_SWEEP_BATCH: usize = 100;

/// 任务认领租约时长
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(5 * 60);

/// 单次网关调用超时
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// 单个任务内并发发送数
pub const DEFAULT_FANOUT_CONCURRENCY: usize = 8;

/// 关闭时等待每个后台组件退出的时长
pub const COMPONENT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// 扫描间隔
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// 事件结束时间未知时的缓存窗口
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// SCAN 单页大小
pub const DEFAULT_SCAN_COUNT: usize = 100;

/// 估算到达时间所用的平均速度（km/h）
pub const DEFAULT_AVERAGE_SPEED_KMH: f64 = 30.0;

/// 结束时间未知时假定的活动时长
pub const DEFAULT_EVENT_LENGTH: Duration = Duration::from_secs(3 * 60 * 60);

pub const CONFIRMATION_LEAD: Duration = Duration::from_secs(24 * 60 * 60);
pub const REMINDER_LEAD: Duration = Duration::from_secs(2 * 60 * 60);
pub const LOCATION_LEAD: Duration = Duration::from_secs(30 * 60);

/// 地球平均半径（米）
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// 版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_constants() {
    assert_eq!(DEFAULT_MAX_RETRIES, 3);
    assert_eq!(DEFAULT_CACHE_TTL, Duration::from_secs(86_400));
    assert!(REMINDER_LEAD < CONFIRMATION_LEAD);
    assert!(LOCATION_LEAD < REMINDER_LEAD);
  }
}
