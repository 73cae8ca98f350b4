use retro_core::Vec3;
use retro_topo::Geodetic;
use serde::{Deserialize, Serialize};

use crate::decay::DecayProduct;
use crate::preselector::Antenna;
use crate::primary::Primary;

/// Tau state at its decay vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TauAtDecay {
    /// Combined importance weight of the trial.
    pub weight: f64,
    /// Tau energy, in GeV.
    pub energy: f64,
    /// Decay vertex, local frame.
    pub position: Vec3,
    /// Unit direction, local frame.
    pub direction: Vec3,
    /// Decay vertex as `[latitude, longitude, altitude]`.
    pub lla: [f64; 3],
    /// Direction as local `[zenith, azimuth]`, in deg.
    pub angles: [f64; 2],
}

/// Trial counters attached to an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialStatistics {
    /// Trials since the previous accepted event, this one included.
    pub trials: u64,
    /// Backward Monte Carlo events run for the primaries.
    pub primary_trials: u64,
}

/// Accepted event, as stored in the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Human readable identifier, see [`event_tag`].
    pub tag: String,
    /// Tau state at decay.
    pub tau_at_decay: TauAtDecay,
    /// Decay products.
    pub decay: Vec<DecayProduct>,
    /// Primaries, empty when primary sampling is disabled.
    pub primaries: Vec<Primary>,
    /// Trial counters.
    pub statistics: TrialStatistics,
    /// Preselected antennas, `None` when the preselection is disabled.
    pub antennas: Option<Vec<Antenna>>,
    /// Local frame origin as `[latitude, longitude]`.
    pub origin: [f64; 2],
}

/// Builds the tag of an event,
/// `E.{E}_Z.{zenith}_A.{azimuth}_La.{lat}_Lo.{lon}_H.{alt}_D.{state}`, with
/// the energy in eV, the azimuth folded into `[0, 360)` and every angle and
/// height rounded to integers.
pub fn event_tag(
    energy: f64,
    zenith: f64,
    azimuth: f64,
    geodetic: &Geodetic,
    state: u64,
) -> String {
    let azimuth = if azimuth < 0.0 { azimuth + 360.0 } else { azimuth };
    format!(
        "E.{:.0e}_Z.{:.0}_A.{:.0}_La.{:.0}_Lo.{:.0}_H.{:.0}_D.{}",
        energy * 1e9,
        zenith,
        azimuth,
        geodetic.latitude,
        geodetic.longitude,
        geodetic.altitude,
        state
    )
}
