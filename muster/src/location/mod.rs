//! 位置模块
//! Location module
//!
//! 参与者位置样本以及“最新位置”缓存
//! Participant location samples and the latest-location cache

use crate::error::{Error, Result};
use crate::event::Coordinate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod cache;

pub use cache::LocationCache;

/// 位置样本，写入后不可变
/// Location sample, immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
  pub participant_id: String,
  pub event_id: String,
  pub latitude: f64,
  pub longitude: f64,
  /// 精度（米）
  /// Accuracy in meters
  pub accuracy: Option<f64>,
  pub altitude: Option<f64>,
  /// 瞬时速度（米/秒）
  /// Instantaneous speed in m/s
  pub speed: Option<f64>,
  /// 航向（度）
  /// Heading in degrees
  pub heading: Option<f64>,
  pub timestamp: DateTime<Utc>,
}

impl LocationSample {
  pub fn coordinate(&self) -> Coordinate {
    Coordinate {
      latitude: self.latitude,
      longitude: self.longitude,
    }
  }
}

/// 位置上报输入
/// Location ingestion input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewLocation {
  pub participant_id: String,
  pub event_id: String,
  pub latitude: f64,
  pub longitude: f64,
  pub accuracy: Option<f64>,
  pub altitude: Option<f64>,
  pub speed: Option<f64>,
  pub heading: Option<f64>,
  /// 设备时间，缺省为接收时间
  /// Device time, defaults to the receive time
  pub timestamp: Option<DateTime<Utc>>,
}

impl NewLocation {
  pub fn new<P, E>(participant_id: P, event_id: E, latitude: f64, longitude: f64) -> Self
  where
    P: Into<String>,
    E: Into<String>,
  {
    Self {
      participant_id: participant_id.into(),
      event_id: event_id.into(),
      latitude,
      longitude,
      ..Default::default()
    }
  }

  pub fn speed(mut self, speed: f64) -> Self {
    self.speed = Some(speed);
    self
  }

  pub fn accuracy(mut self, accuracy: f64) -> Self {
    self.accuracy = Some(accuracy);
    self
  }

  pub fn heading(mut self, heading: f64) -> Self {
    self.heading = Some(heading);
    self
  }

  pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
    self.timestamp = Some(timestamp);
    self
  }

  /// 校验并转换为样本
  /// Validate and turn into a sample
  pub fn into_sample(self, received_at: DateTime<Utc>) -> Result<LocationSample> {
    if self.participant_id.trim().is_empty() {
      return Err(Error::invalid_input("participant_id is required"));
    }
    if self.event_id.trim().is_empty() {
      return Err(Error::invalid_input("event_id is required"));
    }
    Coordinate {
      latitude: self.latitude,
      longitude: self.longitude,
    }
    .validate()?;
    for (name, value) in [("accuracy", self.accuracy), ("speed", self.speed)] {
      if let Some(v) = value {
        if !v.is_finite() || v < 0.0 {
          return Err(Error::invalid_input(format!("{name} must be non-negative: {v}")));
        }
      }
    }
    if let Some(heading) = self.heading {
      if !(0.0..=360.0).contains(&heading) {
        return Err(Error::invalid_input(format!(
          "heading out of range: {heading}"
        )));
      }
    }

    Ok(LocationSample {
      participant_id: self.participant_id,
      event_id: self.event_id,
      latitude: self.latitude,
      longitude: self.longitude,
      accuracy: self.accuracy,
      altitude: self.altitude,
      speed: self.speed,
      heading: self.heading,
      timestamp: self.timestamp.unwrap_or(received_at),
    })
  }
}
