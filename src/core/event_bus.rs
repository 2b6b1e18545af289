// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Event bus for in-process subscribers

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::{AnnotatedFrame, ConnectionEvent, Transport};
use crate::detection::{Alert, AlertBatch, AlertLog};

/// An alert with its position in the bus history
pub type SequencedAlert = (u64, Alert);

/// Bus counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub frames_published: u64,
    pub alerts_published: u64,
    pub events_published: u64,
}

/// Broadcast fan-out of frames, alerts and connection events.
///
/// Frames go through a small channel and lagging subscribers skip them.
/// Alerts get a deeper channel of their own, and every published alert is
/// also kept in a history that subscribers replay from after lagging.
pub struct EventBus {
    frame_tx: broadcast::Sender<Arc<AnnotatedFrame>>,
    alert_tx: broadcast::Sender<SequencedAlert>,
    alert_history: AlertLog,
    event_tx: broadcast::Sender<ConnectionEvent>,
    frames_published: AtomicU64,
    alerts_published: AtomicU64,
    events_published: AtomicU64,
}

impl EventBus {
    pub fn new(frame_capacity: usize, alert_capacity: usize) -> Self {
        Self::with_history(frame_capacity, alert_capacity, None)
    }

    /// `history` caps the replayable alert history; `None` keeps everything
    pub fn with_history(
        frame_capacity: usize,
        alert_capacity: usize,
        history: Option<usize>,
    ) -> Self {
        let (frame_tx, _) = broadcast::channel(frame_capacity.max(1));
        let (alert_tx, _) = broadcast::channel(alert_capacity.max(1));
        let (event_tx, _) = broadcast::channel(64);

        Self {
            frame_tx,
            alert_tx,
            alert_history: AlertLog::new(history),
            event_tx,
            frames_published: AtomicU64::new(0),
            alerts_published: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
        }
    }

    pub fn send_frame(&self, frame: AnnotatedFrame) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        // no subscribers is fine
        let _ = self.frame_tx.send(Arc::new(frame));
    }

    pub fn send_alert(&self, alert: Alert) {
        self.alerts_published.fetch_add(1, Ordering::Relaxed);
        let seq = self.alert_history.append(alert.clone());
        let _ = self.alert_tx.send((seq, alert));
    }

    pub fn send_event(&self, event: ConnectionEvent) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_frames(&self) -> broadcast::Receiver<Arc<AnnotatedFrame>> {
        self.frame_tx.subscribe()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<SequencedAlert> {
        self.alert_tx.subscribe()
    }

    /// Published alerts from `cursor` onward
    pub fn alerts_since(&self, cursor: u64) -> AlertBatch {
        self.alert_history.snapshot_since(cursor)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.event_tx.subscribe()
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            frames_published: self.frames_published.load(Ordering::Relaxed),
            alerts_published: self.alerts_published.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4, 1024)
    }
}

#[async_trait]
impl Transport for EventBus {
    async fn publish_frame(&self, frame: &AnnotatedFrame) -> Result<()> {
        self.send_frame(frame.clone());
        Ok(())
    }

    async fn publish_alert(&self, alert: &Alert) -> Result<()> {
        self.send_alert(alert.clone());
        Ok(())
    }

    async fn notify_connection_event(&self, event: ConnectionEvent) -> Result<()> {
        self.send_event(event);
        Ok(())
    }
}
