//! Core module - processing loop coordinator and its collaborators

mod annotate;
mod event_bus;
mod monitor;
mod scheduler;

pub use annotate::{AnnotatedFrame, StatusLine};
pub use event_bus::{BusStats, EventBus, SequencedAlert};
pub use monitor::{Monitor, MonitorStatus};
pub use scheduler::{FrameScheduler, PacingStats};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::detection::Alert;

/// Connection/status notifications sent to viewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionEvent {
    /// A viewer connected
    Connected,
    MonitoringStarted,
    MonitoringStopped,
    /// The frame source ended or failed; the run stopped itself
    StreamEnded { reason: String },
}

/// Outbound transport for frames, alerts and status events
#[async_trait]
pub trait Transport: Send + Sync {
    /// May drop frames under backpressure
    async fn publish_frame(&self, frame: &AnnotatedFrame) -> Result<()>;

    async fn publish_alert(&self, alert: &Alert) -> Result<()>;

    async fn notify_connection_event(&self, event: ConnectionEvent) -> Result<()>;
}
