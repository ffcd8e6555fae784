//! 缓存键名
//! Cache key names
//!
//! 位置缓存与事件状态缓存共享同一键空间，读写两侧都必须经由这里生成键。
//! The location cache and the event state cache share one key-space; both the
//! write and the read side build their keys here.

pub const LOCATION_LATEST_PREFIX: &str = "location:latest:";
pub const CONFIRMATION_PREFIX: &str = "confirmation:";

/// 某个活动的最新位置键前缀: location:latest:{event}:
/// Latest-location key prefix of one event: location:latest:{event}:
pub fn location_latest_prefix(event_id: &str) -> String {
  format!("{LOCATION_LATEST_PREFIX}{event_id}:")
}

/// 参与者最新位置键: location:latest:{event}:{participant}
/// Latest-location key of one participant: location:latest:{event}:{participant}
pub fn location_latest_key(event_id: &str, participant_id: &str) -> String {
  format!("{}{participant_id}", location_latest_prefix(event_id))
}

/// 某个活动的确认状态键前缀: confirmation:{org}:{event}:
/// Confirmation key prefix of one event: confirmation:{org}:{event}:
pub fn confirmation_prefix(org_id: &str, event_id: &str) -> String {
  format!("{CONFIRMATION_PREFIX}{org_id}:{event_id}:")
}

/// 参与者确认状态键: confirmation:{org}:{event}:{participant}
/// Confirmation key of one participant: confirmation:{org}:{event}:{participant}
pub fn confirmation_key(org_id: &str, event_id: &str, participant_id: &str) -> String {
  format!("{}{participant_id}", confirmation_prefix(org_id, event_id))
}
