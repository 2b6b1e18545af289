//! Vision module - capture and landmark interfaces, plus demo simulators

mod simulator;
mod traits;

pub use simulator::{Scenario, SimulatedCamera, SimulatedDetector};
pub use traits::*;
