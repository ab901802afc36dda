//! Event Log
//!
//! Append-only record of condition state changes (in-memory, bounded).
//! The capture loop emits a [`ConditionEvent`] whenever the classified
//! state differs from the previous tick; the binary drains those into
//! this log for dashboards and offline inspection.

use chrono::{DateTime, Utc};
use condition_engine::{ConditionEvent, ConditionState};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

/// Event log errors
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("Log access failed: {0}")]
    Access(String),

    #[error("Timestamp out of range: {0}")]
    Timestamp(u64),
}

/// One logged state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    /// State-change time (ISO-8601 in serialized form)
    pub ts: DateTime<Utc>,
    pub state: ConditionState,
    pub blink_per_min: f32,
    pub closed_ratio_10s: f32,
    pub head_motion_std: f32,
}

/// Bounded in-memory event repository.
///
/// Retention evicts the oldest record once `max_records` is reached, so
/// a long-running sentinel's memory stays flat.
pub struct EventLog {
    records: Mutex<VecDeque<EventRecord>>,
    next_id: Mutex<i64>,
    max_records: usize,
}

pub const DEFAULT_MAX_RECORDS: usize = 10_000;

impl EventLog {
    pub fn new(max_records: usize) -> Self {
        info!("Creating in-memory event log (max {} records)", max_records);
        Self {
            records: Mutex::new(VecDeque::with_capacity(256)),
            next_id: Mutex::new(1),
            max_records,
        }
    }

    /// Append a state-change event, returning its assigned id
    pub fn append(&self, event: &ConditionEvent) -> Result<i64, EventLogError> {
        let ts = DateTime::<Utc>::from_timestamp_millis(event.timestamp_ms as i64)
            .ok_or(EventLogError::Timestamp(event.timestamp_ms))?;

        let mut next_id = self
            .next_id
            .lock()
            .map_err(|e| EventLogError::Access(e.to_string()))?;
        let id = *next_id;
        *next_id += 1;
        drop(next_id);

        let record = EventRecord {
            id,
            ts,
            state: event.state,
            blink_per_min: event.blink_per_min,
            closed_ratio_10s: event.closed_ratio_10s,
            head_motion_std: event.head_motion_std,
        };

        let mut records = self
            .records
            .lock()
            .map_err(|e| EventLogError::Access(e.to_string()))?;
        while records.len() >= self.max_records {
            records.pop_front();
        }
        records.push_back(record);
        debug!("Logged condition event {} ({})", id, event.state);
        Ok(id)
    }

    /// Most recent records, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<EventRecord>, EventLogError> {
        let records = self
            .records
            .lock()
            .map_err(|e| EventLogError::Access(e.to_string()))?;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    /// All records for a given state, newest first
    pub fn by_state(
        &self,
        state: ConditionState,
        limit: usize,
    ) -> Result<Vec<EventRecord>, EventLogError> {
        let records = self
            .records
            .lock()
            .map_err(|e| EventLogError::Access(e.to_string()))?;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.state == state)
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(timestamp_ms: u64, state: ConditionState) -> ConditionEvent {
        ConditionEvent {
            timestamp_ms,
            state,
            blink_per_min: 6.0,
            closed_ratio_10s: 0.3,
            head_motion_std: 4.5,
        }
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let log = EventLog::default();
        let first = log.append(&event(1_000, ConditionState::Neutral)).unwrap();
        let second = log.append(&event(2_000, ConditionState::Tired)).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_recent_newest_first() {
        let log = EventLog::default();
        log.append(&event(1_000, ConditionState::Neutral)).unwrap();
        log.append(&event(2_000, ConditionState::Tired)).unwrap();
        log.append(&event(3_000, ConditionState::Neutral)).unwrap();

        let recent = log.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, 3);
        assert_eq!(recent[1].state, ConditionState::Tired);
    }

    #[test]
    fn test_retention_evicts_oldest() {
        let log = EventLog::new(3);
        for i in 0..5u64 {
            log.append(&event(i * 1_000, ConditionState::Neutral)).unwrap();
        }
        assert_eq!(log.len(), 3);
        let recent = log.recent(10).unwrap();
        assert_eq!(recent.first().unwrap().id, 5);
        assert_eq!(recent.last().unwrap().id, 3);
    }

    #[test]
    fn test_by_state_filter() {
        let log = EventLog::default();
        log.append(&event(1_000, ConditionState::Tired)).unwrap();
        log.append(&event(2_000, ConditionState::Neutral)).unwrap();
        log.append(&event(3_000, ConditionState::Tired)).unwrap();

        let tired = log.by_state(ConditionState::Tired, 10).unwrap();
        assert_eq!(tired.len(), 2);
        assert!(tired.iter().all(|r| r.state == ConditionState::Tired));
    }

    #[test]
    fn test_record_serializes_iso_timestamp() {
        let log = EventLog::default();
        log.append(&event(1_700_000_000_000, ConditionState::NoFace)).unwrap();
        let json = serde_json::to_string(&log.recent(1).unwrap()[0]).unwrap();
        assert!(json.contains("\"state\":\"noface\""));
        assert!(json.contains("2023-11-14T"));
    }
}
