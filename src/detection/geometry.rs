//! Frame-local geometry checks over detected landmarks

use serde::Serialize;

use super::ViolationCategory;
use crate::vision::{Face, FrameDimensions, Hand};

/// Nose offset from frame center, as a fraction of width, beyond which the
/// face counts as turned away
pub const FACE_AWAY_OFFSET_RATIO: f64 = 0.3;

/// Hands below this fraction of frame height are in the phone zone
pub const PHONE_ZONE_RATIO: f64 = 0.7;

/// How far above the eye line (fraction of height) the nose must sit to count as looking down
pub const LOOKING_DOWN_MARGIN_RATIO: f64 = 0.05;

/// No face at all, or any face whose nose is too far off center
pub fn face_away(dims: FrameDimensions, faces: &[Face]) -> bool {
    if faces.is_empty() {
        return true;
    }

    let width = dims.width as f64;
    let center_x = width / 2.0;

    faces.iter().any(|face| {
        let nose_x = face.nose_tip.x as f64 * width;
        (nose_x - center_x).abs() > width * FACE_AWAY_OFFSET_RATIO
    })
}

pub fn multiple_faces(faces: &[Face]) -> bool {
    faces.len() > 1
}

/// Any hand with wrist, thumb tip and index tip all in the lower part of the frame
pub fn phone_usage(dims: FrameDimensions, hands: &[Hand]) -> bool {
    let height = dims.height as f64;
    let zone = height * PHONE_ZONE_RATIO;

    hands.iter().any(|hand| {
        [hand.wrist, hand.thumb_tip, hand.index_tip]
            .iter()
            .all(|point| point.y as f64 * height > zone)
    })
}

/// Any face whose nose sits above the eye line by more than the margin
pub fn looking_down(dims: FrameDimensions, faces: &[Face]) -> bool {
    let height = dims.height as f64;

    faces.iter().any(|face| {
        let eye_center_y = (face.left_eye.y as f64 + face.right_eye.y as f64) / 2.0 * height;
        let nose_y = face.nose_tip.y as f64 * height;
        nose_y < eye_center_y - height * LOOKING_DOWN_MARGIN_RATIO
    })
}

pub fn no_person(faces: &[Face]) -> bool {
    faces.is_empty()
}

/// The five signals computed for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FrameSignals {
    pub face_away: bool,
    pub multiple_faces: bool,
    pub phone_usage: bool,
    pub looking_down: bool,
    pub no_person: bool,
}

impl FrameSignals {
    /// Run every detector. None of them short-circuits another.
    pub fn evaluate(dims: FrameDimensions, faces: &[Face], hands: &[Hand]) -> Self {
        Self {
            face_away: face_away(dims, faces),
            multiple_faces: multiple_faces(faces),
            phone_usage: phone_usage(dims, hands),
            looking_down: looking_down(dims, faces),
            no_person: no_person(faces),
        }
    }

    pub fn get(&self, category: ViolationCategory) -> bool {
        match category {
            ViolationCategory::FaceAway => self.face_away,
            ViolationCategory::MultipleFaces => self.multiple_faces,
            ViolationCategory::PhoneUsage => self.phone_usage,
            ViolationCategory::LookingDown => self.looking_down,
            ViolationCategory::NoPerson => self.no_person,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ViolationCategory, bool)> + '_ {
        ViolationCategory::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    pub fn any(&self) -> bool {
        self.iter().any(|(_, signal)| signal)
    }
}
