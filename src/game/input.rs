//! Directional input translation

use super::state::Velocity;

/// Maps browser key codes to unit velocities
pub struct InputTranslator;

impl InputTranslator {
    /// Unrecognised codes map to a standstill
    pub fn translate(code: &str) -> Velocity {
        match code {
            "ArrowUp" => Velocity::new(0, 1),
            "ArrowDown" => Velocity::new(0, -1),
            "ArrowLeft" => Velocity::new(-1, 0),
            "ArrowRight" => Velocity::new(1, 0),
            _ => Velocity::ZERO,
        }
    }
}
