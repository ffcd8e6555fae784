//! 到达时间估算
//! ETA estimation
//!
//! 由参与者最新位置计算到目标点的大圆距离与预计到达时间。设备上报的瞬时速度
//! 可用时按速度估算，否则退化为按平均速度估算，而不是直接失败。
//!
//! Computes the great-circle distance and estimated arrival time from a
//! participant's latest location to a target. When the device reports an
//! instantaneous speed the estimate uses it; otherwise it degrades to an
//! assumed average speed instead of failing.

use crate::base::constants::EARTH_RADIUS_METERS;
use crate::config::EtaConfig;
use crate::error::{Error, Result};
use crate::event::{Coordinate, ParticipantStatus};
use crate::location::{LocationCache, LocationSample};
use crate::notify::NotificationGateway;
use crate::store::EventStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 估算方法
/// Estimation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EtaMethod {
  /// 距离 / 设备瞬时速度
  /// Distance over the device's instantaneous speed
  Velocity,
  /// 距离 / 假定平均速度
  /// Distance over an assumed average speed
  Haversine,
}

/// 估算结果，每次查询重新计算，从不持久化
/// Estimation result, recomputed on every query and never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtaResult {
  pub participant_id: String,
  pub distance_meters: f64,
  /// 向上取整的分钟数
  /// Whole minutes, rounded up
  pub eta_minutes: i64,
  pub method: EtaMethod,
  /// 所用位置样本的时间
  /// Timestamp of the sample used
  pub last_update: DateTime<Utc>,
}

/// 两点间的大圆距离（米）
/// Great-circle distance between two points, in meters
pub fn haversine_distance(from: Coordinate, to: Coordinate) -> f64 {
  let lat1 = from.latitude.to_radians();
  let lat2 = to.latitude.to_radians();
  let d_lat = (to.latitude - from.latitude).to_radians();
  let d_lng = (to.longitude - from.longitude).to_radians();

  let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
  let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
  EARTH_RADIUS_METERS * c
}

/// 由单个样本估算到达时间
/// Estimate the arrival time from one sample
pub fn estimate(sample: &LocationSample, target: Coordinate, average_speed_kmh: f64) -> EtaResult {
  let distance_meters = haversine_distance(sample.coordinate(), target);
  let (speed_mps, method) = match sample.speed {
    Some(speed) if speed.is_finite() && speed > 0.0 => (speed, EtaMethod::Velocity),
    _ => (average_speed_kmh * 1000.0 / 3600.0, EtaMethod::Haversine),
  };
  let seconds = distance_meters / speed_mps;

  EtaResult {
    participant_id: sample.participant_id.clone(),
    distance_meters,
    eta_minutes: (seconds / 60.0).ceil() as i64,
    method,
    last_update: sample.timestamp,
  }
}

/// 到达时间估算引擎
/// ETA engine
#[derive(Clone)]
pub struct EtaEngine {
  locations: LocationCache,
  events: Arc<dyn EventStore>,
  gateway: Arc<dyn NotificationGateway>,
  config: EtaConfig,
}

impl EtaEngine {
  pub fn new(
    locations: LocationCache,
    events: Arc<dyn EventStore>,
    gateway: Arc<dyn NotificationGateway>,
    config: EtaConfig,
  ) -> Self {
    Self {
      locations,
      events,
      gateway,
      config,
    }
  }

  /// 计算单个参与者到目标的到达时间；没有位置时返回 NotFound
  /// Compute one participant's ETA to the target; NotFound without a location
  pub async fn calculate_eta(
    &self,
    event_id: &str,
    participant_id: &str,
    target: Coordinate,
  ) -> Result<EtaResult> {
    target.validate()?;
    let sample = self
      .locations
      .get_latest(event_id, participant_id)
      .await?
      .ok_or_else(|| Error::not_found("location", participant_id))?;
    Ok(estimate(&sample, target, self.config.average_speed_kmh))
  }

  /// 批量计算，没有位置的参与者被跳过
  /// Batch computation; participants without a location are skipped
  pub async fn calculate_multiple_etas(
    &self,
    event_id: &str,
    participant_ids: &[String],
    target: Coordinate,
  ) -> Result<Vec<EtaResult>> {
    target.validate()?;
    let samples = self
      .locations
      .get_latest_for_event(event_id, participant_ids)
      .await?;
    if samples.len() < participant_ids.len() {
      tracing::debug!(
        event_id = %event_id,
        missing = participant_ids.len() - samples.len(),
        "participants without location skipped"
      );
    }
    Ok(
      samples
        .iter()
        .map(|s| estimate(s, target, self.config.average_speed_kmh))
        .collect(),
    )
  }

  /// 所有已确认参与者到活动集合点的到达时间
  /// ETAs of every confirmed participant toward the event's meeting point
  pub async fn calculate_event_etas(&self, event_id: &str) -> Result<Vec<EtaResult>> {
    let target = self.event_target(event_id).await?;
    let participant_ids: Vec<String> = self
      .events
      .list_participants(event_id)
      .await?
      .into_iter()
      .filter(|p| p.status == ParticipantStatus::Confirmed)
      .map(|p| p.id)
      .collect();
    self
      .calculate_multiple_etas(event_id, &participant_ids, target)
      .await
  }

  /// 计算到活动集合点的到达时间并通过网关发送给参与者
  /// Compute the ETA toward the event's meeting point and send it to the participant
  pub async fn send_eta_update(&self, event_id: &str, participant_id: &str) -> Result<EtaResult> {
    let event = self
      .events
      .get_event(event_id)
      .await?
      .ok_or_else(|| Error::not_found("event", event_id))?;
    let target = event
      .location
      .ok_or_else(|| Error::invalid_input(format!("event {event_id} has no location")))?;
    let participant = self
      .events
      .get_participant(participant_id)
      .await?
      .filter(|p| p.event_id == event_id)
      .ok_or_else(|| Error::not_found("participant", participant_id))?;

    let eta = self.calculate_eta(event_id, participant_id, target).await?;
    self
      .gateway
      .send_eta_update(&event, &participant, eta.eta_minutes)
      .await?;
    Ok(eta)
  }

  async fn event_target(&self, event_id: &str) -> Result<Coordinate> {
    self
      .events
      .get_event(event_id)
      .await?
      .ok_or_else(|| Error::not_found("event", event_id))?
      .location
      .ok_or_else(|| Error::invalid_input(format!("event {event_id} has no location")))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample(lat: f64, lng: f64, speed: Option<f64>) -> LocationSample {
    LocationSample {
      participant_id: "p1".to_string(),
      event_id: "e1".to_string(),
      latitude: lat,
      longitude: lng,
      accuracy: None,
      altitude: None,
      speed,
      heading: None,
      timestamp: Utc::now(),
    }
  }

  #[test]
  fn test_haversine_known_distance() {
    // 一度经线约 111.19 km
    // One degree of latitude is about 111.19 km
    let d = haversine_distance(
      Coordinate {
        latitude: 0.0,
        longitude: 0.0,
      },
      Coordinate {
        latitude: 1.0,
        longitude: 0.0,
      },
    );
    assert!((d - 111_195.0).abs() < 10.0, "distance was {d}");
  }

  #[test]
  fn test_haversine_zero() {
    let p = Coordinate {
      latitude: -33.45,
      longitude: -70.66,
    };
    assert_eq!(haversine_distance(p, p), 0.0);
  }

  #[test]
  fn test_estimate_velocity() {
    let target = Coordinate {
      latitude: 1.0,
      longitude: 0.0,
    };
    // ~111 km at 10 m/s is ~11 120 s, about 186 minutes
    let eta = estimate(&sample(0.0, 0.0, Some(10.0)), target, 30.0);
    assert_eq!(eta.method, EtaMethod::Velocity);
    assert_eq!(eta.eta_minutes, 186);
  }

  #[test]
  fn test_estimate_falls_back_to_average_speed() {
    let target = Coordinate {
      latitude: 1.0,
      longitude: 0.0,
    };
    for speed in [None, Some(0.0), Some(f64::NAN)] {
      let eta = estimate(&sample(0.0, 0.0, speed), target, 30.0);
      assert_eq!(eta.method, EtaMethod::Haversine);
      // ~111.2 km at 30 km/h is ~222.4 minutes
      assert_eq!(eta.eta_minutes, 223);
    }
  }

  #[test]
  fn test_estimate_at_target_is_zero() {
    let eta = estimate(
      &sample(5.0, 5.0, Some(3.0)),
      Coordinate {
        latitude: 5.0,
        longitude: 5.0,
      },
      30.0,
    );
    assert_eq!(eta.eta_minutes, 0);
    assert_eq!(eta.distance_meters, 0.0);
  }
}
