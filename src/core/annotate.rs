//! Frame annotation - detected landmarks plus the per-category status overlay

use serde::Serialize;

use crate::detection::{ViolationCategory, ViolationStats};
use crate::vision::{Face, Frame, Hand, Pose};

/// One overlay status line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub category: ViolationCategory,
    pub active: bool,
    pub text: String,
}

impl StatusLine {
    pub fn new(category: ViolationCategory, active: bool) -> Self {
        let text = format!("{}: {}", category.label(), if active { "ACTIVE" } else { "OK" });
        Self {
            category,
            active,
            text,
        }
    }
}

/// A frame ready for publishing. Drawing is left to the viewer.
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub frame: Frame,
    pub faces: Vec<Face>,
    pub hands: Vec<Hand>,
    pub pose: Option<Pose>,
    pub status: Vec<StatusLine>,
}

impl AnnotatedFrame {
    pub fn new(
        frame: Frame,
        faces: Vec<Face>,
        hands: Vec<Hand>,
        pose: Option<Pose>,
        stats: &ViolationStats,
    ) -> Self {
        let status = stats
            .iter()
            .map(|(category, entry)| StatusLine::new(*category, entry.active))
            .collect();

        Self {
            frame,
            faces,
            hands,
            pose,
            status,
        }
    }

    pub fn active_categories(&self) -> impl Iterator<Item = ViolationCategory> + '_ {
        self.status.iter().filter(|s| s.active).map(|s| s.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::CategoryStats;

    #[test]
    fn test_status_lines() {
        let mut stats = ViolationStats::new();
        for category in ViolationCategory::ALL {
            stats.insert(category, CategoryStats { count: 0, active: false });
        }
        stats.insert(ViolationCategory::NoPerson, CategoryStats { count: 2, active: true });

        let frame = Frame::new(640, 480, 9, vec![1, 2, 3]);
        let annotated = AnnotatedFrame::new(frame, vec![], vec![], None, &stats);

        assert_eq!(annotated.status.len(), ViolationCategory::COUNT);
        assert_eq!(annotated.status[0].text, "FACE_AWAY: OK");
        let active: Vec<_> = annotated.active_categories().collect();
        assert_eq!(active, vec![ViolationCategory::NoPerson]);
        assert!(annotated.status.iter().any(|s| s.text == "NO_PERSON: ACTIVE"));
    }
}
