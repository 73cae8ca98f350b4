use retro_core::constants::tau_decay_length;
use retro_core::vector::reversed;
use retro_core::{RetroError, RngHandle, Vec3};
use retro_topo::Topography;

/// Probabilistic rejection of vertices that a tau emerging from the ground
/// is unlikely to reach before decaying.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexSelector {
    limit: Option<f64>,
}

impl VertexSelector {
    /// Selector bounding the backward ground search to `limit` decay
    /// lengths. A non positive limit disables the selection.
    pub fn new(limit: f64) -> Self {
        Self {
            limit: (limit > 0.0).then_some(limit),
        }
    }

    /// Selector accepting every vertex.
    pub fn disabled() -> Self {
        Self { limit: None }
    }

    /// Builds the selector from the optional run card limit.
    pub fn from_limit(limit: Option<f64>) -> Self {
        limit.map_or_else(Self::disabled, Self::new)
    }

    /// Returns `true` when vertices are weighted.
    pub fn is_enabled(&self) -> bool {
        self.limit.is_some()
    }

    /// Survival probability of a tau of the given energy emerging from the
    /// ground upstream of `position`: `exp(-d / dl)` where `d` is the
    /// distance to the ground along `-direction`, or `exp(-limit)` when no
    /// ground is found within `limit` decay lengths.
    ///
    /// Returns 1 when disabled and 0 when the decay length is not positive.
    pub fn vertex_weight(
        &self,
        topography: &dyn Topography,
        energy: f64,
        position: &Vec3,
        direction: &Vec3,
    ) -> Result<f64, RetroError> {
        let Some(limit) = self.limit else {
            return Ok(1.0);
        };
        let decay_length = tau_decay_length(energy);
        if !(decay_length > 0.0) {
            return Ok(0.0);
        }
        let upstream = reversed(direction);
        let weight = match topography.distance(position, &upstream, limit * decay_length)? {
            None => (-limit).exp(),
            Some(distance) => (-distance / decay_length).exp(),
        };
        Ok(weight)
    }

    /// Draws the acceptance of a vertex with probability `weight`.
    pub fn accept(&self, weight: f64, rng: &mut RngHandle) -> bool {
        if !self.is_enabled() {
            return weight > 0.0;
        }
        weight > 0.0 && rng.uniform01() <= weight
    }
}
