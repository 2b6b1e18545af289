// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Violation tracker - turns noisy per-frame signals into debounced alerts
//!
//! A category becomes *active* on the first frame its signal is true. While the
//! signal stays true, one alert fires each time more than the category threshold
//! has elapsed since activation (or since the previous alert). A single false
//! frame deactivates the category and discards any partial dwell.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Alert, AlertLog, FrameSignals, ViolationCategory};
use crate::error::MonitorError;

/// Per-category dwell thresholds in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    pub face_away: f64,
    pub multiple_faces: f64,
    pub phone_usage: f64,
    pub no_person: f64,
    /// Follows `face_away` until set explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub looking_down: Option<f64>,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            face_away: 2.0,
            multiple_faces: 3.0,
            phone_usage: 2.0,
            no_person: 3.0,
            looking_down: None,
        }
    }
}

impl ThresholdTable {
    pub fn get(&self, category: ViolationCategory) -> f64 {
        match category {
            ViolationCategory::FaceAway => self.face_away,
            ViolationCategory::MultipleFaces => self.multiple_faces,
            ViolationCategory::PhoneUsage => self.phone_usage,
            ViolationCategory::NoPerson => self.no_person,
            ViolationCategory::LookingDown => self.looking_down.unwrap_or(self.face_away),
        }
    }

    /// Set one threshold. Rejected values leave the table untouched.
    pub fn set(&mut self, category: ViolationCategory, seconds: f64) -> Result<(), MonitorError> {
        let seconds = validate_seconds(seconds)?;
        match category {
            ViolationCategory::FaceAway => self.face_away = seconds,
            ViolationCategory::MultipleFaces => self.multiple_faces = seconds,
            ViolationCategory::PhoneUsage => self.phone_usage = seconds,
            ViolationCategory::NoPerson => self.no_person = seconds,
            ViolationCategory::LookingDown => self.looking_down = Some(seconds),
        }
        Ok(())
    }

    /// Check every configured value
    pub fn validate(&self) -> Result<(), MonitorError> {
        for value in [self.face_away, self.multiple_faces, self.phone_usage, self.no_person] {
            validate_seconds(value)?;
        }
        if let Some(value) = self.looking_down {
            validate_seconds(value)?;
        }
        Ok(())
    }
}

fn validate_seconds(value: f64) -> Result<f64, MonitorError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(MonitorError::InvalidValue { value })
    }
}

/// Debounce state of one category
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ViolationState {
    pub active: bool,
    /// Last activation or last alert
    pub last_event_time: Option<DateTime<Utc>>,
    pub count: u64,
}

/// Stats entry exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: u64,
    pub active: bool,
}

/// Snapshot of every category
pub type ViolationStats = BTreeMap<ViolationCategory, CategoryStats>;

struct TrackerInner {
    states: [ViolationState; ViolationCategory::COUNT],
    thresholds: ThresholdTable,
}

/// Debouncing violation tracker.
///
/// All state sits behind one lock so readers never see a half-updated
/// `{active, last_event_time, count}` tuple. Alerts are appended to the log
/// while that lock is held, keeping log order equal to emission order.
pub struct ViolationTracker {
    inner: Mutex<TrackerInner>,
    alerts: Arc<AlertLog>,
}

impl ViolationTracker {
    pub fn new(thresholds: ThresholdTable, alerts: Arc<AlertLog>) -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                states: [ViolationState::default(); ViolationCategory::COUNT],
                thresholds,
            }),
            alerts,
        }
    }

    pub fn alert_log(&self) -> &Arc<AlertLog> {
        &self.alerts
    }

    /// Feed one signal. Returns the alert if one fired.
    pub fn update(
        &self,
        category: ViolationCategory,
        signal: bool,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let mut inner = self.inner.lock();
        self.step(&mut inner, category, signal, now)
    }

    /// Feed all five signals of a frame under a single lock
    pub fn apply(&self, signals: &FrameSignals, now: DateTime<Utc>) -> Vec<Alert> {
        let mut inner = self.inner.lock();
        signals
            .iter()
            .filter_map(|(category, signal)| self.step(&mut inner, category, signal, now))
            .collect()
    }

    fn step(
        &self,
        inner: &mut TrackerInner,
        category: ViolationCategory,
        signal: bool,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let threshold = inner.thresholds.get(category);
        let state = &mut inner.states[category.index()];

        if !signal {
            state.active = false;
            return None;
        }

        let since = match (state.active, state.last_event_time) {
            (true, Some(since)) => since,
            _ => {
                state.active = true;
                state.last_event_time = Some(now);
                debug!(category = %category, "Violation started");
                return None;
            }
        };

        if elapsed_secs(since, now) <= threshold {
            return None;
        }

        state.count += 1;
        state.last_event_time = Some(now);

        let alert = Alert::new(category, now, state.count);
        warn!(category = %category, count = alert.count, "ALERT: {}", alert.message);
        self.alerts.append(alert.clone());
        Some(alert)
    }

    /// Clear the active flag of one category
    pub fn reset(&self, category: ViolationCategory) {
        self.inner.lock().states[category.index()].active = false;
    }

    /// Clear every active flag, keeping counts
    pub fn deactivate_all(&self) {
        let mut inner = self.inner.lock();
        for state in inner.states.iter_mut() {
            state.active = false;
        }
    }

    /// Zero all counts and activity. The alert log is left alone.
    pub fn reset_counts(&self) {
        let mut inner = self.inner.lock();
        inner.states = [ViolationState::default(); ViolationCategory::COUNT];
        info!("Violation counts reset");
    }

    pub fn state(&self, category: ViolationCategory) -> ViolationState {
        self.inner.lock().states[category.index()]
    }

    pub fn stats(&self) -> ViolationStats {
        let inner = self.inner.lock();
        ViolationCategory::ALL
            .into_iter()
            .map(|category| {
                let state = inner.states[category.index()];
                (
                    category,
                    CategoryStats {
                        count: state.count,
                        active: state.active,
                    },
                )
            })
            .collect()
    }

    pub fn thresholds(&self) -> ThresholdTable {
        self.inner.lock().thresholds
    }

    /// Takes effect on the next `update`
    pub fn set_threshold(
        &self,
        category: ViolationCategory,
        seconds: f64,
    ) -> Result<(), MonitorError> {
        self.inner.lock().thresholds.set(category, seconds)?;
        info!(category = %category, seconds, "Threshold updated");
        Ok(())
    }
}

/// Seconds from `from` to `to`; negative if the clock went backwards
fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}
