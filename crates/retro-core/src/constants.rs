//! Physical properties of the tau lepton used by the generator.

/// Tau mass, in GeV.
pub const TAU_MASS: f64 = 1.77682;

/// Tau proper decay length, in m.
pub const TAU_CTAU: f64 = 8.718e-5;

/// Branching ratio of the tau to a muon and neutrinos.
pub const TAU_BR_MU: f64 = 0.1736;

/// PDG identifier of the tau lepton.
pub const TAU_PID: i32 = 15;

/// Decay length of a tau of the given energy (GeV), in m, neglecting energy losses.
pub fn tau_decay_length(energy: f64) -> f64 {
    energy * TAU_CTAU / TAU_MASS
}

/// Momentum norm of a tau of the given total energy (GeV).
pub fn tau_momentum(energy: f64) -> f64 {
    ((energy - TAU_MASS) * (energy + TAU_MASS)).max(0.0).sqrt()
}

/// Returns `true` for PDG identifiers that do not feed a radio shower
/// (neutrinos and muons).
pub fn is_invisible(pid: i32) -> bool {
    matches!(pid.abs(), 12 | 13 | 14 | 16)
}
