// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! ExamWatch - live exam proctoring monitor
//!
//! Turns per-frame face and hand landmarks from a camera into debounced,
//! counted violation alerts:
//! - Five frame-local geometry checks (face away, multiple faces, phone
//!   usage, looking down, no person)
//! - Per-category dwell thresholds, adjustable while running
//! - Ordered alert log drained to viewers over WebSocket
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          Monitor                              │
//! ├───────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌──────────┐  ┌───────────┐  ┌───────────┐  │
//! │  │ FrameSource │→ │ Landmark │→ │ Geometry  │→ │ Violation │  │
//! │  │             │  │ Detector │  │ Signals   │  │ Tracker   │  │
//! │  └─────────────┘  └──────────┘  └───────────┘  └───────────┘  │
//! │         ↓                                           ↓         │
//! │  ┌─────────────────────┐                     ┌─────────────┐  │
//! │  │   Annotated frames  │                     │  Alert Log  │  │
//! │  └─────────────────────┘                     └─────────────┘  │
//! │         ↓                                           ↓         │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │          Transport (event bus, WebSocket, export)       │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod api;
pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod streaming;
pub mod vision;

// Re-exports for convenience
pub use config::Config;
pub use core::{EventBus, Monitor, MonitorStatus, Transport};
pub use detection::{Alert, AlertLog, ThresholdTable, ViolationCategory, ViolationTracker};
pub use error::MonitorError;
pub use streaming::StreamingManager;

/// ExamWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ExamWatch name
pub const NAME: &str = "ExamWatch";
