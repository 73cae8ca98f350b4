use retro_core::vector::advance;
use retro_core::{RetroError, Vec3};

use crate::frame::{angular_to_direction, direction_to_angular, Geodetic, LocalFrame};

/// Default step of the generic ray march used by [`Topography::distance`], in m.
pub const DEFAULT_RAY_STEP: f64 = 25.0;

const BISECTION_ITERATIONS: usize = 40;

/// Terrain service queried by the generator.
///
/// Only [`ground_altitude`](Topography::ground_altitude) and
/// [`frame`](Topography::frame) are required. The remaining queries have
/// generic implementations that models override when they can answer
/// analytically.
pub trait Topography {
    /// Local frame in which positions and directions are expressed.
    fn frame(&self) -> &LocalFrame;

    /// Ground altitude below the local horizontal coordinates `(x, y)`, in m.
    fn ground_altitude(&self, x: f64, y: f64) -> Result<f64, RetroError>;

    /// Step used when marching along rays, in m.
    fn ray_step(&self) -> f64 {
        DEFAULT_RAY_STEP
    }

    /// Highest ground altitude of the model, in m, when it is bounded. The
    /// generic ray march skips the stretches of a ray lying above it.
    fn max_altitude(&self) -> Option<f64> {
        None
    }

    /// Returns `true` when the position lies on or above the ground.
    fn is_above(&self, position: &Vec3) -> Result<bool, RetroError> {
        Ok(position[2] >= self.ground_altitude(position[0], position[1])?)
    }

    /// Distance travelled along `direction` from `position` before hitting
    /// the ground, or `None` if no intersection occurs within `limit`.
    ///
    /// A start point already below ground yields `Some(0.0)`.
    fn distance(
        &self,
        position: &Vec3,
        direction: &Vec3,
        limit: f64,
    ) -> Result<Option<f64>, RetroError> {
        if !self.is_above(position)? {
            return Ok(Some(0.0));
        }
        let step = self.ray_step();
        let ceiling = self.max_altitude();
        let mut previous = 0.0;
        while previous < limit {
            if let Some(ceiling) = ceiling {
                let z = position[2] + previous * direction[2];
                if z > ceiling {
                    if direction[2] >= 0.0 {
                        return Ok(None);
                    }
                    // Nothing can be hit before the ray is back under the ceiling.
                    previous = (previous + (z - ceiling) / -direction[2]).min(limit);
                    if previous >= limit {
                        break;
                    }
                }
            }
            let s = (previous + step).min(limit);
            if !self.is_above(&advance(position, direction, s))? {
                // Refine the crossing between the last two samples.
                let (mut low, mut high) = (previous, s);
                for _ in 0..BISECTION_ITERATIONS {
                    let mid = 0.5 * (low + high);
                    if self.is_above(&advance(position, direction, mid))? {
                        low = mid;
                    } else {
                        high = mid;
                    }
                }
                return Ok(Some(high));
            }
            previous = s;
        }
        Ok(None)
    }

    /// Converts local coordinates to geodetic ones.
    fn local_to_lla(&self, position: &Vec3) -> Result<Geodetic, RetroError> {
        Ok(self.frame().to_geodetic(position))
    }

    /// Converts geodetic coordinates to local ones.
    fn lla_to_local(&self, geodetic: &Geodetic) -> Result<Vec3, RetroError> {
        Ok(self.frame().from_geodetic(geodetic))
    }

    /// Converts a local zenith / azimuth pair (deg), observed at `position`,
    /// into a unit direction of the local frame.
    fn angular_to_local(
        &self,
        _position: &Vec3,
        zenith: f64,
        azimuth: f64,
    ) -> Result<Vec3, RetroError> {
        Ok(angular_to_direction(zenith, azimuth))
    }

    /// Converts a local direction into a `(zenith, azimuth)` pair, in deg.
    fn local_to_angular(
        &self,
        _position: &Vec3,
        direction: &Vec3,
    ) -> Result<(f64, f64), RetroError> {
        Ok(direction_to_angular(direction))
    }
}

/// Marches from `origin` along the unit vector `direction` in steps of
/// `step`, sampling every `s` in `[0, length)`. Returns `true` as soon as a
/// sampled point lies strictly below the ground.
pub fn march_below_ground<T: Topography + ?Sized>(
    topography: &T,
    origin: &Vec3,
    direction: &Vec3,
    length: f64,
    step: f64,
) -> Result<bool, RetroError> {
    let mut s = 0.0;
    while s < length {
        let r = advance(origin, direction, s);
        if r[2] < topography.ground_altitude(r[0], r[1])? {
            return Ok(true);
        }
        s += step;
    }
    Ok(false)
}
