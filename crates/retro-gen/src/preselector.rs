use std::fs;
use std::path::Path;

use retro_core::vector::{advance, dot, norm, sub};
use retro_core::{ErrorInfo, RetroError, Vec3};
use retro_topo::{march_below_ground, Topography};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AntennaConfig, ConeModel};

/// Distance from the vertex to the start of the radio cone, in m.
pub const CONE_DEPTH_MIN: f64 = 14e3;

/// Step of the terrain marches, in m.
pub const RAY_STEP: f64 = 200.0;

/// Fewest antennas a shower must reach to be kept.
pub const MIN_ANTENNAS: usize = 4;

/// Detector unit: local position followed by optional extra columns that are
/// carried through to the event log untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Antenna {
    values: Vec<f64>,
}

impl Antenna {
    /// Builds an antenna from a layout row, which must hold at least
    /// `[x, y, z]`.
    pub fn new(values: Vec<f64>) -> Result<Self, RetroError> {
        if values.len() < 3 || values[..3].iter().any(|v| !v.is_finite()) {
            return Err(RetroError::Config(
                ErrorInfo::new("invalid-antenna", "antenna rows need finite [x, y, z]")
                    .with_context("row", format!("{values:?}")),
            ));
        }
        Ok(Self { values })
    }

    /// Antenna at `position` without extra columns.
    pub fn at(position: Vec3) -> Self {
        Self {
            values: position.to_vec(),
        }
    }

    /// Local position, in m.
    pub fn position(&self) -> Vec3 {
        [self.values[0], self.values[1], self.values[2]]
    }

    /// Full layout row.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Reads a JSON array of `[x, y, z, extra...]` rows.
pub fn load_layout(path: &Path) -> Result<Vec<Antenna>, RetroError> {
    let contents =
        fs::read_to_string(path).map_err(|err| RetroError::io("layout-read", &err, path))?;
    let rows: Vec<Vec<f64>> = serde_json::from_str(&contents).map_err(|err| {
        RetroError::Serde(
            ErrorInfo::new("layout-parse", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    if rows.is_empty() {
        return Err(RetroError::Config(
            ErrorInfo::new("empty-layout", "the antenna layout is empty")
                .with_context("path", path.display().to_string()),
        ));
    }
    let antennas = rows
        .into_iter()
        .map(Antenna::new)
        .collect::<Result<Vec<_>, _>>()?;
    debug!(path = %path.display(), antennas = antennas.len(), "loaded antenna layout");
    Ok(antennas)
}

/// Geometric visibility test of a shower by the antennas.
#[derive(Debug, Clone, PartialEq)]
pub struct AntennaPreselector {
    antennas: Vec<Antenna>,
    cone: ConeModel,
    xmax: bool,
    shadowing: bool,
}

impl AntennaPreselector {
    /// Builds a preselector over a layout.
    pub fn new(antennas: Vec<Antenna>, cone: ConeModel, xmax: bool, shadowing: bool) -> Self {
        Self {
            antennas,
            cone,
            xmax,
            shadowing,
        }
    }

    /// Builds the preselector of a run card, or `None` when disabled.
    pub fn from_config(
        config: &AntennaConfig,
        layout: Option<&Path>,
    ) -> Result<Option<Self>, RetroError> {
        if !config.enabled {
            return Ok(None);
        }
        let layout = layout.ok_or_else(|| {
            RetroError::config(
                "missing-antenna-layout",
                "antenna preselection requires setup.path",
            )
        })?;
        let antennas = load_layout(layout)?;
        Ok(Some(Self::new(
            antennas,
            config.cone,
            config.xmax,
            config.shadowing,
        )))
    }

    /// Antennas of the layout.
    pub fn antennas(&self) -> &[Antenna] {
        &self.antennas
    }

    /// Cone half angle for a shower energy, in deg.
    pub fn cone_angle(&self, shower_energy: f64) -> f64 {
        match self.cone {
            ConeModel::ThreeDegrees => 3.0,
            ConeModel::Aggressive => (0.47 * (shower_energy / 1e8).ln() + 0.9).max(0.0),
        }
    }

    /// Antennas that may detect a shower of the given energy (GeV) starting
    /// at `position` along the unit vector `direction`.
    pub fn select(
        &self,
        topography: &dyn Topography,
        shower_energy: f64,
        position: &Vec3,
        direction: &Vec3,
    ) -> Result<Vec<Antenna>, RetroError> {
        let zmin = CONE_DEPTH_MIN;
        if self.xmax
            && march_below_ground(topography, position, direction, zmin + RAY_STEP, RAY_STEP)?
        {
            return Ok(Vec::new());
        }
        let zmax = 165e3 * shower_energy / 1e9 + 55e3;
        let tan_gamma = self.cone_angle(shower_energy).to_radians().tan();
        let apex = advance(position, direction, zmin);

        let mut selected = Vec::new();
        for antenna in &self.antennas {
            let ra = antenna.position();
            let dr = sub(&ra, position);
            let zp = dot(&dr, direction);
            if zp < zmin || zp > zmax {
                continue;
            }
            let rp2 = dot(&dr, &dr) - zp * zp;
            let rho = (zp - zmin) * tan_gamma;
            if rp2 > rho * rho {
                continue;
            }
            if self.shadowing && self.is_shadowed(topography, &apex, &ra)? {
                continue;
            }
            selected.push(antenna.clone());
        }
        Ok(selected)
    }

    fn is_shadowed(
        &self,
        topography: &dyn Topography,
        apex: &Vec3,
        antenna: &Vec3,
    ) -> Result<bool, RetroError> {
        let n = sub(antenna, apex);
        let smax = norm(&n);
        if smax <= RAY_STEP {
            return Ok(true);
        }
        let u = [n[0] / smax, n[1] / smax, n[2] / smax];
        march_below_ground(topography, apex, &u, smax - RAY_STEP, RAY_STEP)
    }
}
