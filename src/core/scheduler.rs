// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Frame pacing for the capture loop

use serde::Serialize;
use std::time::{Duration, Instant};

/// Pacing metrics for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PacingStats {
    pub total_frames: u64,
    pub deadline_misses: u64,
    pub worst_case: Duration,
}

/// Keeps the frame cycle near a fixed cadence
pub struct FrameScheduler {
    frame_budget: Duration,
    stats: PacingStats,
}

impl FrameScheduler {
    pub fn new(frame_budget: Duration) -> Self {
        Self {
            frame_budget,
            stats: PacingStats::default(),
        }
    }

    pub fn from_fps(fps: u32) -> Self {
        Self::new(Duration::from_millis(1000 / fps.max(1) as u64))
    }

    pub fn frame_budget(&self) -> Duration {
        self.frame_budget
    }

    /// Record a processed frame and return how long to wait before the next one
    pub fn finish_frame(&mut self, started: Instant) -> Duration {
        let elapsed = started.elapsed();

        if elapsed > self.frame_budget {
            self.stats.deadline_misses += 1;
        }
        if elapsed > self.stats.worst_case {
            self.stats.worst_case = elapsed;
        }
        self.stats.total_frames += 1;

        self.remaining(elapsed)
    }

    /// Time left in the budget after `elapsed`
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.frame_budget.saturating_sub(elapsed)
    }

    pub fn stats(&self) -> PacingStats {
        self.stats
    }
}
