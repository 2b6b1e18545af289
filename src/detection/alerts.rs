// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Append-only alert log with monotonic cursors

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use super::ViolationCategory;

/// An emitted violation alert.
///
/// On the wire `timestamp` is UTC wall-clock time as `YYYY-MM-DD HH:MM:SS`,
/// without a zone marker and truncated to whole seconds. Viewers that show
/// local time convert it themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub category: ViolationCategory,
    #[serde(with = "alert_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Per-category alert count at emission
    pub count: u64,
    pub message: String,
}

impl Alert {
    pub fn new(category: ViolationCategory, timestamp: DateTime<Utc>, count: u64) -> Self {
        Self {
            category,
            timestamp,
            count,
            message: category.message().to_string(),
        }
    }
}

mod alert_timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Always UTC; sub-second precision is not carried
    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        let naive =
            NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)?;
        Ok(Utc.from_utc_datetime(&naive))
    }
}

/// Alerts read from a cursor onward
#[derive(Debug, Clone, Default)]
pub struct AlertBatch {
    /// Cursor of the first alert in `alerts`
    pub start: u64,
    pub alerts: Vec<Alert>,
    /// Cursor to pass on the next read
    pub next_cursor: u64,
}

struct LogInner {
    entries: VecDeque<Alert>,
    /// Cursor of `entries[0]`; keeps counting across clears and evictions
    first_seq: u64,
}

/// Ordered log of emitted alerts
pub struct AlertLog {
    inner: Mutex<LogInner>,
    retention: Option<usize>,
}

impl AlertLog {
    /// `retention` caps the number of kept alerts; `None` keeps everything
    pub fn new(retention: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(LogInner {
                entries: VecDeque::new(),
                first_seq: 0,
            }),
            retention,
        }
    }

    /// Append an alert, returning its cursor
    pub fn append(&self, alert: Alert) -> u64 {
        let mut inner = self.inner.lock();
        let seq = inner.first_seq + inner.entries.len() as u64;
        inner.entries.push_back(alert);

        if let Some(limit) = self.retention {
            while inner.entries.len() > limit {
                inner.entries.pop_front();
                inner.first_seq += 1;
            }
        }
        seq
    }

    /// Non-destructive read of every kept alert at or after `cursor`
    pub fn snapshot_since(&self, cursor: u64) -> AlertBatch {
        let inner = self.inner.lock();
        let start = cursor.max(inner.first_seq);
        let skip = (start - inner.first_seq) as usize;
        let alerts: Vec<Alert> = inner.entries.iter().skip(skip).cloned().collect();
        let next_cursor = inner.first_seq + inner.entries.len() as u64;

        AlertBatch {
            start: start.min(next_cursor),
            alerts,
            next_cursor,
        }
    }

    pub fn get_all(&self) -> Vec<Alert> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    /// Drop every alert. Cursors keep counting so drainers stay consistent.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.entries.len();
        inner.first_seq += dropped as u64;
        inner.entries.clear();
        debug!("Cleared {} alerts", dropped);
    }

    /// Cursor that the next appended alert will get
    pub fn end_cursor(&self) -> u64 {
        let inner = self.inner.lock();
        inner.first_seq + inner.entries.len() as u64
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn alert(category: ViolationCategory, secs: i64, count: u64) -> Alert {
        let base = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
        Alert::new(category, base + Duration::seconds(secs), count)
    }

    #[test]
    fn test_append_keeps_emission_order() {
        let log = AlertLog::default();
        log.append(alert(ViolationCategory::FaceAway, 3, 1));
        log.append(alert(ViolationCategory::NoPerson, 4, 1));
        log.append(alert(ViolationCategory::FaceAway, 6, 2));

        let all = log.get_all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].category, ViolationCategory::FaceAway);
        assert_eq!(all[1].category, ViolationCategory::NoPerson);
        assert_eq!(all[2].count, 2);
        assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_snapshot_since_cursor() {
        let log = AlertLog::default();
        log.append(alert(ViolationCategory::FaceAway, 0, 1));
        log.append(alert(ViolationCategory::PhoneUsage, 1, 1));

        let first = log.snapshot_since(0);
        assert_eq!(first.alerts.len(), 2);
        assert_eq!(first.next_cursor, 2);

        let empty = log.snapshot_since(first.next_cursor);
        assert!(empty.alerts.is_empty());

        log.append(alert(ViolationCategory::LookingDown, 2, 1));
        let next = log.snapshot_since(first.next_cursor);
        assert_eq!(next.start, 2);
        assert_eq!(next.alerts.len(), 1);
        assert_eq!(next.alerts[0].category, ViolationCategory::LookingDown);

        // reading does not consume
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_clear_keeps_cursors_monotonic() {
        let log = AlertLog::default();
        log.append(alert(ViolationCategory::FaceAway, 0, 1));
        log.append(alert(ViolationCategory::FaceAway, 3, 2));
        let cursor = log.end_cursor();

        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.end_cursor(), cursor);

        let seq = log.append(alert(ViolationCategory::NoPerson, 5, 1));
        assert_eq!(seq, cursor);
        let batch = log.snapshot_since(cursor);
        assert_eq!(batch.alerts.len(), 1);
        assert_eq!(batch.alerts[0].category, ViolationCategory::NoPerson);
    }

    #[test]
    fn test_retention_evicts_oldest() {
        let log = AlertLog::new(Some(2));
        for i in 0..5 {
            log.append(alert(ViolationCategory::MultipleFaces, i, i as u64 + 1));
        }
        let all = log.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].count, 4);
        assert_eq!(all[1].count, 5);

        // a stale cursor starts at the oldest kept alert
        let batch = log.snapshot_since(0);
        assert_eq!(batch.start, 3);
        assert_eq!(batch.alerts.len(), 2);
        assert_eq!(batch.next_cursor, 5);
    }

    #[test]
    fn test_alert_wire_format() {
        let a = alert(ViolationCategory::PhoneUsage, 0, 3);
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "phone_usage");
        assert_eq!(json["timestamp"], "2026-05-04 09:00:00");
        assert_eq!(json["count"], 3);
        assert_eq!(json["message"], "Potential phone usage detected");

        let back: Alert = serde_json::from_value(json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_wire_timestamp_is_utc_whole_seconds() {
        let base = Utc.with_ymd_and_hms(2026, 5, 4, 23, 59, 58).unwrap();
        let a = Alert::new(ViolationCategory::FaceAway, base + Duration::milliseconds(1750), 1);

        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["timestamp"], "2026-05-04 23:59:59");

        let back: Alert = serde_json::from_value(json).unwrap();
        assert_eq!(back.timestamp, base + Duration::seconds(1));
        assert_eq!(back.timestamp.timezone(), Utc);
    }
}
