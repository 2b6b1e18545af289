// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Capture and landmark traits and common types

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::MonitorError;

/// Face mesh landmark indices
pub const FACE_NOSE_TIP: usize = 1;
pub const FACE_LEFT_EYE: usize = 33;
pub const FACE_RIGHT_EYE: usize = 263;

/// Hand landmark indices
pub const HAND_WRIST: usize = 0;
pub const HAND_THUMB_TIP: usize = 4;
pub const HAND_INDEX_TIP: usize = 8;

/// A captured frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,

    /// Encoded image bytes as delivered by the source
    pub data: Arc<[u8]>,
}

impl Frame {
    pub fn new(width: u32, height: u32, sequence: u64, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            sequence,
            captured_at: Utc::now(),
            data: data.into(),
        }
    }

    pub fn dimensions(&self) -> FrameDimensions {
        FrameDimensions {
            width: self.width,
            height: self.height,
        }
    }
}

/// Frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

/// Normalized (0-1) landmark coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Face reference points used by the violation detectors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub nose_tip: Landmark,
    pub left_eye: Landmark,
    pub right_eye: Landmark,
}

impl Face {
    /// Pick the reference points out of a full face mesh.
    /// Returns `None` when the mesh is too short.
    pub fn from_mesh(mesh: &[Landmark]) -> Option<Self> {
        Some(Self {
            nose_tip: *mesh.get(FACE_NOSE_TIP)?,
            left_eye: *mesh.get(FACE_LEFT_EYE)?,
            right_eye: *mesh.get(FACE_RIGHT_EYE)?,
        })
    }
}

/// Hand reference points used by the phone detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hand {
    pub wrist: Landmark,
    pub thumb_tip: Landmark,
    pub index_tip: Landmark,
}

impl Hand {
    /// Pick the reference points out of a 21-point hand skeleton
    pub fn from_landmarks(points: &[Landmark]) -> Option<Self> {
        Some(Self {
            wrist: *points.get(HAND_WRIST)?,
            thumb_tip: *points.get(HAND_THUMB_TIP)?,
            index_tip: *points.get(HAND_INDEX_TIP)?,
        })
    }
}

/// Body pose landmarks, carried for annotation only
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub points: Vec<Landmark>,
}

/// Result of a single frame read
#[derive(Debug, Clone)]
pub enum FrameRead {
    /// A frame is ready
    Frame(Frame),
    /// The device is open but has no frame yet
    NotReady,
    /// A single frame could not be decoded; try again next cycle
    Skipped,
    /// The source is exhausted
    EndOfStream,
}

/// Opens capture streams
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Open the device at `index`
    async fn open(&self, index: u32) -> Result<Box<dyn FrameStream>, MonitorError>;
}

/// An open capture handle.
///
/// `release` consumes the handle so a stream can only be released once.
#[async_trait]
pub trait FrameStream: Send {
    /// Read the next frame. `Err` is a hard failure that ends the run.
    async fn read_frame(&mut self) -> Result<FrameRead, MonitorError>;

    /// Give the device back
    fn release(self: Box<Self>);
}

/// Landmark inference capability.
///
/// Implementations must not fail: an empty result means nothing was found.
pub trait LandmarkDetector: Send + Sync {
    fn detect_faces(&self, frame: &Frame) -> Vec<Face>;

    fn detect_hands(&self, frame: &Frame) -> Vec<Hand>;

    fn detect_pose(&self, _frame: &Frame) -> Option<Pose> {
        None
    }
}
