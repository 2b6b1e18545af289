// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Simulated camera and scripted landmark detector for demo/testing

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::prelude::*;
use tracing::{debug, info};

use super::{
    Face, Frame, FrameRead, FrameSource, FrameStream, Hand, Landmark, LandmarkDetector, Pose,
};
use crate::error::MonitorError;

/// Simulated camera producing synthetic frames
pub struct SimulatedCamera {
    width: u32,
    height: u32,
    /// Number of openable device indices
    devices: u32,
    /// Stop after this many frames
    frame_limit: Option<u64>,
    /// One in N reads is reported as undecodable
    skip_every: Option<u64>,
}

impl SimulatedCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            devices: 1,
            frame_limit: None,
            skip_every: Some(500),
        }
    }

    pub fn with_devices(mut self, devices: u32) -> Self {
        self.devices = devices;
        self
    }

    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

#[async_trait]
impl FrameSource for SimulatedCamera {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn open(&self, index: u32) -> Result<Box<dyn FrameStream>, MonitorError> {
        if index >= self.devices {
            return Err(MonitorError::cannot_open(index, "no such simulated device"));
        }

        info!("Opened simulated camera {} ({}x{})", index, self.width, self.height);
        Ok(Box::new(SimulatedStream {
            index,
            width: self.width,
            height: self.height,
            sequence: 0,
            frame_limit: self.frame_limit,
            skip_every: self.skip_every,
            rng: StdRng::from_entropy(),
        }))
    }
}

struct SimulatedStream {
    index: u32,
    width: u32,
    height: u32,
    sequence: u64,
    frame_limit: Option<u64>,
    skip_every: Option<u64>,
    rng: StdRng,
}

#[async_trait]
impl FrameStream for SimulatedStream {
    async fn read_frame(&mut self) -> Result<FrameRead, MonitorError> {
        if self.frame_limit.map(|limit| self.sequence >= limit).unwrap_or(false) {
            return Ok(FrameRead::EndOfStream);
        }
        self.sequence += 1;

        if let Some(n) = self.skip_every {
            if self.rng.gen_ratio(1, n.max(1) as u32) {
                return Ok(FrameRead::Skipped);
            }
        }

        // Small noise payload standing in for an encoded image
        let mut data = vec![0u8; 256];
        self.rng.fill_bytes(&mut data);

        Ok(FrameRead::Frame(Frame::new(self.width, self.height, self.sequence, data)))
    }

    fn release(self: Box<Self>) {
        info!("Released simulated camera {} after {} frames", self.index, self.sequence);
    }
}

/// What the scripted detector is currently showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Attentive,
    LookingAway,
    SecondPerson,
    PhoneInLap,
    HeadDown,
    Absent,
}

impl Scenario {
    fn faces(self, rng: &mut StdRng) -> Vec<Face> {
        let mut jitter = || rng.gen_range(-0.01f32..0.01);
        let face_at = |x: f32, nose_y: f32, j: f32| Face {
            nose_tip: Landmark::new(x + j, nose_y + j),
            left_eye: Landmark::new(x - 0.06, 0.45),
            right_eye: Landmark::new(x + 0.06, 0.45),
        };

        match self {
            Scenario::Attentive | Scenario::PhoneInLap => vec![face_at(0.5, 0.55, jitter())],
            Scenario::LookingAway => vec![face_at(0.86, 0.55, jitter())],
            Scenario::SecondPerson => {
                vec![face_at(0.4, 0.55, jitter()), face_at(0.62, 0.55, jitter())]
            }
            Scenario::HeadDown => vec![face_at(0.5, 0.33, jitter())],
            Scenario::Absent => vec![],
        }
    }

    fn hands(self) -> Vec<Hand> {
        match self {
            Scenario::PhoneInLap => vec![Hand {
                wrist: Landmark::new(0.45, 0.88),
                thumb_tip: Landmark::new(0.48, 0.8),
                index_tip: Landmark::new(0.5, 0.78),
            }],
            _ => vec![],
        }
    }
}

struct Script {
    rng: StdRng,
    scenario: Scenario,
    remaining: u32,
    last_sequence: Option<u64>,
}

impl Script {
    /// Advance at most once per frame sequence
    fn scenario_for(&mut self, sequence: u64) -> Scenario {
        if self.last_sequence == Some(sequence) {
            return self.scenario;
        }
        self.last_sequence = Some(sequence);

        if self.remaining == 0 {
            self.scenario = if self.scenario != Scenario::Attentive {
                Scenario::Attentive
            } else {
                *[
                    Scenario::Attentive,
                    Scenario::LookingAway,
                    Scenario::SecondPerson,
                    Scenario::PhoneInLap,
                    Scenario::HeadDown,
                    Scenario::Absent,
                ]
                .choose(&mut self.rng)
                .unwrap_or(&Scenario::Attentive)
            };
            // 2 to 8 seconds at ~30 fps
            self.remaining = self.rng.gen_range(60..240);
            debug!("Simulated scenario: {:?} for {} frames", self.scenario, self.remaining);
        }
        self.remaining -= 1;
        self.scenario
    }
}

/// Landmark detector that plays back random violation episodes
pub struct SimulatedDetector {
    script: Mutex<Script>,
}

impl SimulatedDetector {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic episodes
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            script: Mutex::new(Script {
                rng,
                scenario: Scenario::Attentive,
                remaining: 0,
                last_sequence: None,
            }),
        }
    }
}

impl Default for SimulatedDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LandmarkDetector for SimulatedDetector {
    fn detect_faces(&self, frame: &Frame) -> Vec<Face> {
        let mut script = self.script.lock();
        let scenario = script.scenario_for(frame.sequence);
        scenario.faces(&mut script.rng)
    }

    fn detect_hands(&self, frame: &Frame) -> Vec<Hand> {
        self.script.lock().scenario_for(frame.sequence).hands()
    }

    fn detect_pose(&self, frame: &Frame) -> Option<Pose> {
        let faces = self.detect_faces(frame);
        let face = faces.first()?;
        // head plus shoulders
        Some(Pose {
            points: vec![
                face.nose_tip,
                Landmark::new(face.nose_tip.x - 0.15, 0.8),
                Landmark::new(face.nose_tip.x + 0.15, 0.8),
            ],
        })
    }
}
