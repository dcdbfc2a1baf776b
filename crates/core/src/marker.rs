use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::attribute::Attribute;
use crate::event::{Event, EventId, Gauge};
use crate::period::{iso, Granularity, Period};

pub const UPDATE_MONTH: &str = "UPDATE_MONTH";
pub const UPDATE_YEAR: &str = "UPDATE_YEAR";
const STATUS: &str = "status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerStatus {
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "UPDATED")]
    Updated,
}

impl MarkerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkerStatus::Update => "UPDATE",
            MarkerStatus::Updated => "UPDATED",
        }
    }
}

impl fmt::Display for MarkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarkerStatus {
    type Err = MarkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPDATE" => Ok(MarkerStatus::Update),
            "UPDATED" => Ok(MarkerStatus::Updated),
            other => Err(MarkerError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerError {
    #[error("Unknown marker status: '{0}'")]
    UnknownStatus(String),
    #[error("Event {0} is not an update marker")]
    NotAMarker(EventId),
    #[error("Marker {0} has no status")]
    MissingStatus(EventId),
    #[error("Marker {id} does not span one calendar {granularity}")]
    Misaligned { id: EventId, granularity: Granularity },
}

/// Signals that the aggregates of one period are stale (`UPDATE`) or have
/// been recomputed (`UPDATED`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpdateMarker {
    pub period: Period,
    pub status: MarkerStatus,
}

impl UpdateMarker {
    pub fn new(period: Period, status: MarkerStatus) -> Self {
        UpdateMarker { period, status }
    }

    pub fn gauge_name(granularity: Granularity) -> &'static str {
        match granularity {
            Granularity::Month => UPDATE_MONTH,
            Granularity::Year => UPDATE_YEAR,
        }
    }

    pub fn to_event(&self, system: &str) -> Event {
        let gauge = Self::gauge_name(self.period.granularity);
        Event {
            id: EventId::derive(&format!("{gauge}:{system}:{}", iso(self.period.start))),
            gauge: Gauge::new(gauge, system),
            start: self.period.start,
            stop: self.period.stop,
            values: vec![Attribute::text(STATUS, self.status.as_str())],
            links: Vec::new(),
        }
    }

    pub fn from_event(event: &Event) -> Result<Self, MarkerError> {
        let granularity = match event.gauge.name.as_str() {
            UPDATE_MONTH => Granularity::Month,
            UPDATE_YEAR => Granularity::Year,
            _ => return Err(MarkerError::NotAMarker(event.id)),
        };
        let status = event
            .text(STATUS)
            .ok_or(MarkerError::MissingStatus(event.id))?
            .parse()?;
        let period = Period::containing(granularity, event.start)
            .filter(|p| p.start == event.start && p.stop == event.stop)
            .ok_or(MarkerError::Misaligned { id: event.id, granularity })?;
        Ok(UpdateMarker { period, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn march() -> Period {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        Period::starting_at(Granularity::Month, start).unwrap()
    }

    #[test]
    fn event_round_trip() {
        let marker = UpdateMarker::new(march(), MarkerStatus::Update);
        let event = marker.to_event("BANK");
        assert_eq!(event.gauge.name, UPDATE_MONTH);
        assert_eq!(event.text("status"), Some("UPDATE"));
        assert_eq!(UpdateMarker::from_event(&event).unwrap(), marker);
    }

    #[test]
    fn updated_marker_shares_the_id_of_its_request() {
        let update = UpdateMarker::new(march(), MarkerStatus::Update).to_event("BANK");
        let updated = UpdateMarker::new(march(), MarkerStatus::Updated).to_event("BANK");
        assert_eq!(update.id, updated.id);
        assert_ne!(update.id, UpdateMarker::new(march(), MarkerStatus::Update).to_event("OTHER").id);
    }

    #[test]
    fn misaligned_marker_is_rejected() {
        let mut event = UpdateMarker::new(march(), MarkerStatus::Update).to_event("BANK");
        event.start = event.start + chrono::Duration::days(2);
        assert!(matches!(
            UpdateMarker::from_event(&event),
            Err(MarkerError::Misaligned { .. })
        ));
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("DONE".parse::<MarkerStatus>().is_err());
    }
}
