//! 基础模块
//! Base module
//!
//! 常量、缓存键布局与时间换算
//! Constants, cache key layout and time conversions

use chrono::{DateTime, Utc};
use std::time::Duration;

pub mod constants;
pub mod keys;

/// 距离 `until` 还剩多久，已过去时返回 None
/// Time left until `until`, or None once it has passed
pub fn ttl_remaining(until: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
  (until - now).to_std().ok().filter(|d| !d.is_zero())
}

/// `at + d`，溢出时饱和到最大时间
/// `at + d`, saturating at the maximum representable time
pub fn add_duration(at: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
  chrono::Duration::from_std(d)
    .ok()
    .and_then(|d| at.checked_add_signed(d))
    .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `at - d`，溢出时饱和到最小时间
/// `at - d`, saturating at the minimum representable time
pub fn sub_duration(at: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
  chrono::Duration::from_std(d)
    .ok()
    .and_then(|d| at.checked_sub_signed(d))
    .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_ttl_remaining() {
    let now = Utc::now();
    assert_eq!(
      ttl_remaining(now + chrono::Duration::seconds(90), now),
      Some(Duration::from_secs(90))
    );
    assert_eq!(ttl_remaining(now, now), None);
    assert_eq!(ttl_remaining(now - chrono::Duration::seconds(1), now), None);
  }

  #[test]
  fn test_add_sub_duration() {
    let now = Utc::now();
    let later = add_duration(now, Duration::from_secs(60));
    assert_eq!(later - now, chrono::Duration::seconds(60));
    assert_eq!(sub_duration(later, Duration::from_secs(60)), now);
    assert_eq!(add_duration(now, Duration::MAX), DateTime::<Utc>::MAX_UTC);
  }
}
