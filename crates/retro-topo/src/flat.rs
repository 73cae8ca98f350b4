use retro_core::{RetroError, Vec3};

use crate::frame::LocalFrame;
use crate::topography::Topography;

/// Horizontal ground at a constant altitude.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatTopography {
    frame: LocalFrame,
    altitude: f64,
}

impl FlatTopography {
    /// Creates a flat ground at `altitude` (m) in the given frame.
    pub fn new(frame: LocalFrame, altitude: f64) -> Self {
        Self { frame, altitude }
    }

    /// Ground altitude, in m.
    pub fn altitude(&self) -> f64 {
        self.altitude
    }
}

impl Topography for FlatTopography {
    fn frame(&self) -> &LocalFrame {
        &self.frame
    }

    fn ground_altitude(&self, _x: f64, _y: f64) -> Result<f64, RetroError> {
        Ok(self.altitude)
    }

    fn distance(
        &self,
        position: &Vec3,
        direction: &Vec3,
        limit: f64,
    ) -> Result<Option<f64>, RetroError> {
        let height = position[2] - self.altitude;
        if height < 0.0 {
            return Ok(Some(0.0));
        }
        if direction[2] >= 0.0 {
            return Ok(None);
        }
        let d = height / -direction[2];
        Ok((d <= limit).then_some(d))
    }
}
