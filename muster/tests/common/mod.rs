//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use muster::error::{Error, Result};
use muster::event::{Coordinate, Event, EventStatus, Participant, ParticipantStatus};
use muster::notify::NotificationGateway;
use muster::store::MemoryStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One call observed by the recording gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
  pub kind: &'static str,
  pub event_id: String,
  pub participant_id: String,
}

/// Gateway that records every call and fails for selected participants
#[derive(Clone, Default)]
pub struct RecordingGateway {
  sent: Arc<Mutex<Vec<Sent>>>,
  failing: Arc<Mutex<HashSet<String>>>,
  delay: Arc<Mutex<Option<Duration>>>,
}

impl RecordingGateway {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail_for(&self, participant_id: &str) {
    self.failing.lock().unwrap().insert(participant_id.to_string());
  }

  pub fn recover(&self) {
    self.failing.lock().unwrap().clear();
  }

  pub fn set_delay(&self, delay: Duration) {
    *self.delay.lock().unwrap() = Some(delay);
  }

  pub fn sent(&self) -> Vec<Sent> {
    self.sent.lock().unwrap().clone()
  }

  pub fn recipients(&self, kind: &str) -> Vec<String> {
    let mut ids: Vec<String> = self
      .sent()
      .into_iter()
      .filter(|s| s.kind == kind)
      .map(|s| s.participant_id)
      .collect();
    ids.sort();
    ids
  }

  async fn record(&self, kind: &'static str, event: &Event, participant: &Participant) -> Result<()> {
    let delay = *self.delay.lock().unwrap();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    self.sent.lock().unwrap().push(Sent {
      kind,
      event_id: event.id.clone(),
      participant_id: participant.id.clone(),
    });
    if self.failing.lock().unwrap().contains(&participant.id) {
      return Err(Error::gateway(format!("delivery to {} failed", participant.id)));
    }
    Ok(())
  }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
  async fn send_confirmation_request(&self, event: &Event, participant: &Participant) -> Result<()> {
    self.record("confirmation", event, participant).await
  }

  async fn send_reminder(&self, event: &Event, participant: &Participant) -> Result<()> {
    self.record("reminder", event, participant).await
  }

  async fn send_location_request(&self, event: &Event, participant: &Participant) -> Result<()> {
    self.record("location", event, participant).await
  }

  async fn send_eta_update(
    &self,
    event: &Event,
    participant: &Participant,
    _eta_minutes: i64,
  ) -> Result<()> {
    self.record("eta", event, participant).await
  }

  async fn send_message(&self, _contact: &str, _text: &str) -> Result<()> {
    Ok(())
  }
}

pub fn event(id: &str, starts_at: DateTime<Utc>, ends_at: Option<DateTime<Utc>>) -> Event {
  Event {
    id: id.to_string(),
    org_id: "org-1".to_string(),
    name: format!("event {id}"),
    status: EventStatus::Scheduled,
    starts_at,
    ends_at,
    location: Some(Coordinate {
      latitude: -33.4489,
      longitude: -70.6693,
    }),
  }
}

pub fn participant(id: &str, event_id: &str, status: ParticipantStatus) -> Participant {
  Participant {
    id: id.to_string(),
    event_id: event_id.to_string(),
    org_id: "org-1".to_string(),
    name: format!("participant {id}"),
    contact: format!("+5690000{id}"),
    status,
  }
}

/// Store seeded with event `e1` and one participant per RSVP status
pub async fn seeded_store(starts_at: DateTime<Utc>, ends_at: Option<DateTime<Utc>>) -> MemoryStore {
  let store = MemoryStore::new();
  store.insert_event(event("e1", starts_at, ends_at)).await;
  for (id, status) in [
    ("p-pending", ParticipantStatus::Pending),
    ("p-confirmed", ParticipantStatus::Confirmed),
    ("p-denied", ParticipantStatus::Denied),
    ("p-checked-in", ParticipantStatus::CheckedIn),
  ] {
    store.insert_participant(participant(id, "e1", status)).await;
  }
  store
}
