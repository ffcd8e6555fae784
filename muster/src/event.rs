//! 活动与参与者模型
//! Event and participant model
//!
//! 这些记录由外部关系型存储拥有，这里只描述调度器与定位管线需要读取的字段。
//! These records are owned by the external relational store; only the fields
//! the scheduler and the location pipeline read are described here.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 经纬度坐标
/// Latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
  pub latitude: f64,
  pub longitude: f64,
}

impl Coordinate {
  pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
    let coordinate = Self {
      latitude,
      longitude,
    };
    coordinate.validate()?;
    Ok(coordinate)
  }

  pub fn validate(&self) -> Result<()> {
    if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
      return Err(Error::invalid_input(format!(
        "latitude out of range: {}",
        self.latitude
      )));
    }
    if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
      return Err(Error::invalid_input(format!(
        "longitude out of range: {}",
        self.longitude
      )));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
  Scheduled,
  Active,
  Completed,
  Cancelled,
}

impl EventStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Scheduled => "scheduled",
      Self::Active => "active",
      Self::Completed => "completed",
      Self::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for EventStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 活动
/// Event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  pub id: String,
  pub org_id: String,
  pub name: String,
  pub status: EventStatus,
  pub starts_at: DateTime<Utc>,
  /// 结束时间决定位置缓存的存活期
  /// The end time bounds the lifetime of cached locations
  pub ends_at: Option<DateTime<Utc>>,
  /// 集合地点，也是到达时间估算的目标
  /// Meeting point, also the ETA target
  pub location: Option<Coordinate>,
}

/// 参与者回复状态
/// Participant RSVP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
  Pending,
  Confirmed,
  Denied,
  CheckedIn,
}

impl ParticipantStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Confirmed => "confirmed",
      Self::Denied => "denied",
      Self::CheckedIn => "checked_in",
    }
  }
}

impl fmt::Display for ParticipantStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 参与者
/// Participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
  pub id: String,
  pub event_id: String,
  pub org_id: String,
  pub name: String,
  /// 消息通道地址（例如手机号）
  /// Contact channel address (a phone number for instance)
  pub contact: String,
  pub status: ParticipantStatus,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_coordinate_validation() {
    assert!(Coordinate::new(-33.45, -70.66).is_ok());
    assert!(Coordinate::new(90.0, 180.0).is_ok());
    assert!(Coordinate::new(90.1, 0.0).unwrap_err().is_invalid_input());
    assert!(Coordinate::new(0.0, -180.5).unwrap_err().is_invalid_input());
    assert!(Coordinate::new(f64::NAN, 0.0).is_err());
  }

  #[test]
  fn test_participant_status_serde() {
    let json = serde_json::to_string(&ParticipantStatus::CheckedIn).unwrap();
    assert_eq!(json, "\"checked_in\"");
    assert_eq!(ParticipantStatus::CheckedIn.to_string(), "checked_in");
  }
}
