// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Monitor - drives the frame cycle and the alert drain cycle
//!
//! ```text
//!  FrameSource ──► LandmarkDetector ──► FrameSignals ──► ViolationTracker ──► AlertLog
//!       │                                                      │                 │
//!       └───────────────► AnnotatedFrame ──────────────────────┘                 │
//!                              │                                                 │
//!                              ▼                                                 ▼
//!                          Transport ◄──────────── drain cycle (≈1s) ────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{AnnotatedFrame, ConnectionEvent, FrameScheduler, Transport};
use crate::config::{CaptureConfig, Config};
use crate::detection::{
    Alert, AlertLog, FrameSignals, ThresholdTable, ViolationCategory, ViolationStats,
    ViolationTracker,
};
use crate::error::MonitorError;
use crate::vision::{Frame, FrameRead, FrameSource, FrameStream, LandmarkDetector};

/// Floor for the drain period; a zero interval would spin
const MIN_DRAIN_PERIOD: Duration = Duration::from_millis(1);

/// Externally visible monitor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub frames_processed: u64,
    pub alerts_logged: usize,
}

/// Per-frame work shared with the frame cycle task
struct FramePipeline {
    tracker: Arc<ViolationTracker>,
    detector: Arc<dyn LandmarkDetector>,
    transport: Arc<dyn Transport>,
    frames_processed: AtomicU64,
}

impl FramePipeline {
    fn process(&self, frame: &Frame, now: DateTime<Utc>) -> AnnotatedFrame {
        let faces = self.detector.detect_faces(frame);
        let hands = self.detector.detect_hands(frame);
        let pose = self.detector.detect_pose(frame);

        let signals = FrameSignals::evaluate(frame.dimensions(), &faces, &hands);
        let fired = self.tracker.apply(&signals, now);
        if !fired.is_empty() {
            debug!("Frame {} raised {} alert(s)", frame.sequence, fired.len());
        }
        self.frames_processed.fetch_add(1, Ordering::Relaxed);

        AnnotatedFrame::new(frame.clone(), faces, hands, pose, &self.tracker.stats())
    }
}

enum RunState {
    Stopped,
    Running(ActiveRun),
}

struct ActiveRun {
    shutdown: broadcast::Sender<()>,
    drain_stop: broadcast::Sender<()>,
    frame_task: JoinHandle<()>,
    drain_task: JoinHandle<()>,
}

impl ActiveRun {
    /// True once the frame cycle has exited, e.g. at end of stream
    fn is_finished(&self) -> bool {
        self.frame_task.is_finished()
    }

    /// The drain cycle stops only after the frame cycle, so its final
    /// pass sees every alert the last frame raised.
    async fn join(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.frame_task.await {
            error!("Frame cycle task failed: {}", e);
        }
        let _ = self.drain_stop.send(());
        if let Err(e) = self.drain_task.await {
            error!("Alert drain task failed: {}", e);
        }
    }
}

/// Processing loop coordinator.
///
/// Owns the tracker, the alert log and the lifecycle of the two cycles.
/// Share it behind an `Arc`; every method takes `&self`.
pub struct Monitor {
    capture: CaptureConfig,
    alerts: Arc<AlertLog>,
    /// Cursor of the next alert to forward, kept across runs
    forwarded: Arc<AtomicU64>,
    pipeline: Arc<FramePipeline>,
    source: Arc<dyn FrameSource>,
    run: Mutex<RunState>,
}

impl Monitor {
    pub fn new(
        config: &Config,
        source: Arc<dyn FrameSource>,
        detector: Arc<dyn LandmarkDetector>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let alerts = Arc::new(AlertLog::new(config.alerts.retention));
        let tracker = Arc::new(ViolationTracker::new(config.thresholds, alerts.clone()));

        Self {
            capture: config.capture.clone(),
            alerts,
            forwarded: Arc::new(AtomicU64::new(0)),
            pipeline: Arc::new(FramePipeline {
                tracker,
                detector,
                transport,
                frames_processed: AtomicU64::new(0),
            }),
            source,
            run: Mutex::new(RunState::Stopped),
        }
    }

    pub fn tracker(&self) -> &Arc<ViolationTracker> {
        &self.pipeline.tracker
    }

    pub fn alert_log(&self) -> &Arc<AlertLog> {
        &self.alerts
    }

    /// Alerts logged but not yet handed to the transport
    pub fn pending_alerts(&self) -> usize {
        self.alerts
            .snapshot_since(self.forwarded.load(Ordering::SeqCst))
            .alerts
            .len()
    }

    /// Open the source and start both cycles
    pub async fn start(&self) -> Result<(), MonitorError> {
        let mut run = self.run.lock().await;

        if let RunState::Running(active) = &*run {
            if !active.is_finished() {
                return Err(MonitorError::AlreadyRunning);
            }
        }
        // reap a run that ended on its own
        if let RunState::Running(finished) = std::mem::replace(&mut *run, RunState::Stopped) {
            finished.join().await;
        }

        let index = self.capture.camera_index;
        let stream = self.source.open(index).await?;
        info!("Monitoring started on {} source {}", self.source.name(), index);

        // partial dwell from an earlier run must not count
        self.pipeline.tracker.deactivate_all();

        let (shutdown, _) = broadcast::channel(1);
        let (drain_stop, _) = broadcast::channel(1);

        let frame_task = tokio::spawn(frame_cycle(
            self.pipeline.clone(),
            stream,
            self.capture.clone(),
            shutdown.subscribe(),
            drain_stop.clone(),
        ));
        let drain_task = tokio::spawn(drain_cycle(
            self.alerts.clone(),
            self.pipeline.transport.clone(),
            self.capture.alert_poll_interval(),
            self.forwarded.clone(),
            drain_stop.subscribe(),
        ));

        *run = RunState::Running(ActiveRun {
            shutdown,
            drain_stop,
            frame_task,
            drain_task,
        });
        drop(run);

        self.notify(ConnectionEvent::MonitoringStarted).await;
        Ok(())
    }

    /// Stop both cycles and wait for the source to be released. Idempotent.
    pub async fn stop(&self) {
        let mut run = self.run.lock().await;

        match std::mem::replace(&mut *run, RunState::Stopped) {
            RunState::Running(active) => {
                active.join().await;
                drop(run);
                info!("Monitoring stopped");
                self.notify(ConnectionEvent::MonitoringStopped).await;
            }
            RunState::Stopped => debug!("Stop requested while already stopped"),
        }
    }

    pub async fn is_running(&self) -> bool {
        match &*self.run.lock().await {
            RunState::Running(active) => !active.is_finished(),
            RunState::Stopped => false,
        }
    }

    pub async fn status(&self) -> MonitorStatus {
        MonitorStatus {
            running: self.is_running().await,
            frames_processed: self.pipeline.frames_processed.load(Ordering::Relaxed),
            alerts_logged: self.alerts.len(),
        }
    }

    /// Run one frame through detection and tracking without the loop
    pub fn process_frame(&self, frame: &Frame) -> AnnotatedFrame {
        self.pipeline.process(frame, Utc::now())
    }

    pub fn get_alerts(&self) -> Vec<Alert> {
        self.alerts.get_all()
    }

    /// Empty the alert log. Violation counts are kept.
    pub fn clear_alerts(&self) {
        self.alerts.clear();
        info!("Alerts cleared");
    }

    pub fn get_stats(&self) -> ViolationStats {
        self.pipeline.tracker.stats()
    }

    /// Zero violation counts and activity
    pub fn reset_stats(&self) {
        self.pipeline.tracker.reset_counts();
    }

    pub fn thresholds(&self) -> ThresholdTable {
        self.pipeline.tracker.thresholds()
    }

    /// Update a threshold by wire name, e.g. `"phone_usage"`
    pub fn update_threshold(&self, category: &str, seconds: f64) -> Result<(), MonitorError> {
        let category: ViolationCategory = category.parse()?;
        self.set_threshold(category, seconds)
    }

    pub fn set_threshold(
        &self,
        category: ViolationCategory,
        seconds: f64,
    ) -> Result<(), MonitorError> {
        self.pipeline.tracker.set_threshold(category, seconds)
    }

    async fn notify(&self, event: ConnectionEvent) {
        if let Err(e) = self.pipeline.transport.notify_connection_event(event).await {
            warn!("Failed to publish status event: {}", e);
        }
    }
}

async fn frame_cycle(
    pipeline: Arc<FramePipeline>,
    mut stream: Box<dyn FrameStream>,
    capture: CaptureConfig,
    mut shutdown: broadcast::Receiver<()>,
    drain_stop: broadcast::Sender<()>,
) {
    let mut scheduler = FrameScheduler::new(capture.frame_interval());
    let mut ended: Option<MonitorError> = None;

    debug!("Frame cycle started");

    loop {
        let started = Instant::now();

        let pause = match stream.read_frame().await {
            Ok(FrameRead::Frame(frame)) => {
                let annotated = pipeline.process(&frame, Utc::now());
                if let Err(e) = pipeline.transport.publish_frame(&annotated).await {
                    debug!("Dropped frame {}: {}", frame.sequence, e);
                }
                scheduler.finish_frame(started)
            }
            Ok(FrameRead::NotReady) => capture.idle_backoff(),
            Ok(FrameRead::Skipped) => {
                debug!("Skipped undecodable frame");
                scheduler.remaining(started.elapsed())
            }
            Ok(FrameRead::EndOfStream) => {
                ended = Some(MonitorError::EndOfStream);
                break;
            }
            Err(e) => {
                ended = Some(e);
                break;
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = shutdown.recv() => break,
        }
    }

    stream.release();
    // the source may have ended on its own
    let _ = drain_stop.send(());

    let pacing = scheduler.stats();
    info!(
        frames = pacing.total_frames,
        deadline_misses = pacing.deadline_misses,
        "Frame cycle finished (worst frame {:?})",
        pacing.worst_case
    );

    if let Some(reason) = ended {
        warn!("Capture ended: {}", reason);
        let event = ConnectionEvent::StreamEnded {
            reason: reason.to_string(),
        };
        if let Err(e) = pipeline.transport.notify_connection_event(event).await {
            warn!("Failed to publish status event: {}", e);
        }
    }
}

async fn drain_cycle(
    alerts: Arc<AlertLog>,
    transport: Arc<dyn Transport>,
    period: Duration,
    forwarded: Arc<AtomicU64>,
    mut stop: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period.max(MIN_DRAIN_PERIOD));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // resume where the previous run left off
    let mut cursor = forwarded.load(Ordering::SeqCst);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                cursor = forward_alerts(&alerts, transport.as_ref(), cursor).await;
                forwarded.store(cursor, Ordering::SeqCst);
            }
            _ = stop.recv() => break,
        }
    }

    // alerts raised since the last tick
    cursor = forward_alerts(&alerts, transport.as_ref(), cursor).await;
    forwarded.store(cursor, Ordering::SeqCst);
    debug!("Alert drain cycle finished at cursor {}", cursor);
}

/// Forward everything after `cursor` in order. On a failed publish the
/// cursor stays at that alert so it is retried on the next tick.
async fn forward_alerts(alerts: &AlertLog, transport: &dyn Transport, cursor: u64) -> u64 {
    let batch = alerts.snapshot_since(cursor);

    for (offset, alert) in batch.alerts.iter().enumerate() {
        if let Err(e) = transport.publish_alert(alert).await {
            warn!("Failed to forward alert, will retry: {}", e);
            return batch.start + offset as u64;
        }
    }
    batch.next_cursor
}
