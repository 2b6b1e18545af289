// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Detection module - per-frame violation signals, debounced tracking and the alert log

mod alerts;
mod geometry;
mod tracker;

pub use alerts::*;
pub use geometry::*;
pub use tracker::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MonitorError;

/// Proctoring violation category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    FaceAway,
    MultipleFaces,
    PhoneUsage,
    LookingDown,
    NoPerson,
}

impl ViolationCategory {
    /// Number of categories
    pub const COUNT: usize = 5;

    /// Every category, in table order
    pub const ALL: [ViolationCategory; Self::COUNT] = [
        ViolationCategory::FaceAway,
        ViolationCategory::MultipleFaces,
        ViolationCategory::PhoneUsage,
        ViolationCategory::LookingDown,
        ViolationCategory::NoPerson,
    ];

    /// Position in per-category tables
    pub fn index(self) -> usize {
        match self {
            ViolationCategory::FaceAway => 0,
            ViolationCategory::MultipleFaces => 1,
            ViolationCategory::PhoneUsage => 2,
            ViolationCategory::LookingDown => 3,
            ViolationCategory::NoPerson => 4,
        }
    }

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationCategory::FaceAway => "face_away",
            ViolationCategory::MultipleFaces => "multiple_faces",
            ViolationCategory::PhoneUsage => "phone_usage",
            ViolationCategory::LookingDown => "looking_down",
            ViolationCategory::NoPerson => "no_person",
        }
    }

    /// Overlay label
    pub fn label(self) -> &'static str {
        match self {
            ViolationCategory::FaceAway => "FACE_AWAY",
            ViolationCategory::MultipleFaces => "MULTIPLE_FACES",
            ViolationCategory::PhoneUsage => "PHONE_USAGE",
            ViolationCategory::LookingDown => "LOOKING_DOWN",
            ViolationCategory::NoPerson => "NO_PERSON",
        }
    }

    /// Alert message shown to the proctor
    pub fn message(self) -> &'static str {
        match self {
            ViolationCategory::FaceAway => "Student is looking away from screen",
            ViolationCategory::MultipleFaces => "Multiple people detected in frame",
            ViolationCategory::PhoneUsage => "Potential phone usage detected",
            ViolationCategory::LookingDown => "Student appears to be looking down",
            ViolationCategory::NoPerson => "No person detected in frame",
        }
    }
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationCategory {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViolationCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| MonitorError::UnknownCategory(s.to_string()))
    }
}
