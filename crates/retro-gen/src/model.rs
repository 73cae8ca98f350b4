//! Importance samplers for the tau vertex.
//!
//! Every sampler returns a [`Sample`] whose weight is the inverse of the
//! sampling density at the drawn value, so that the product of the weights
//! of one trial normalises the event to a unit flux.

use std::f64::consts::PI;

use retro_core::constants::TAU_MASS;
use retro_core::{ErrorInfo, RetroError, RngHandle, Vec3};
use retro_topo::{Geodetic, Topography};
use serde::{Deserialize, Serialize};

use crate::config::{
    DirectionConfig, DirectionModel, EnergyConfig, EnergyModel, ModelConfig, PositionConfig,
    PositionModel,
};

/// Value drawn by a sampler together with its importance weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample<T> {
    /// Drawn value.
    pub value: T,
    /// Inverse of the sampling density at `value`.
    pub weight: f64,
}

impl<T> Sample<T> {
    fn new(value: T, weight: f64) -> Self {
        Self { value, weight }
    }
}

/// Sampled tau direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction {
    /// Unit vector in the local frame.
    pub vector: Vec3,
    /// Local zenith angle, in deg.
    pub zenith: f64,
    /// Local azimuth angle, in deg, in `[-180, 180)`.
    pub azimuth: f64,
}

/// Uniform draw of the vertex position in a box above the ground.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionSampler {
    /// Box in local coordinates.
    Local {
        /// `[[x0, x1], [y0, y1], [h0, h1]]`.
        bounds: [[f64; 2]; 3],
    },
    /// Latitude / longitude box, sampled through its enclosing local box.
    Geodetic {
        /// Enclosing local box, `[[x0, x1], [y0, y1], [h0, h1]]`.
        bounds: [[f64; 2]; 3],
        /// Absolute latitude range, in deg.
        latitude: [f64; 2],
        /// Absolute longitude range, in deg.
        longitude: [f64; 2],
    },
}

impl PositionSampler {
    /// Builds the sampler. Geodetic boxes are converted to local
    /// coordinates with the topography, which anchors the frame.
    pub fn from_config(
        config: &PositionConfig,
        topography: &dyn Topography,
    ) -> Result<Self, RetroError> {
        config.validate()?;
        match config.model {
            PositionModel::Local => Ok(PositionSampler::Local {
                bounds: config.range,
            }),
            PositionModel::Geodetic => {
                let frame = topography.frame();
                let latitude = [
                    frame.latitude + config.range[0][0],
                    frame.latitude + config.range[0][1],
                ];
                let longitude = [
                    frame.longitude + config.range[1][0],
                    frame.longitude + config.range[1][1],
                ];
                let lat_mid = 0.5 * (latitude[0] + latitude[1]);
                let lon_mid = 0.5 * (longitude[0] + longitude[1]);
                let mut low = [f64::INFINITY; 2];
                let mut high = [f64::NEG_INFINITY; 2];
                for lat in [latitude[0], lat_mid, latitude[1]] {
                    for lon in [longitude[0], lon_mid, longitude[1]] {
                        if lat == lat_mid && lon == lon_mid {
                            continue;
                        }
                        let r = topography.lla_to_local(&Geodetic {
                            latitude: lat,
                            longitude: lon,
                            altitude: 0.0,
                        })?;
                        for k in 0..2 {
                            low[k] = low[k].min(r[k]);
                            high[k] = high[k].max(r[k]);
                        }
                    }
                }
                Ok(PositionSampler::Geodetic {
                    bounds: [[low[0], high[0]], [low[1], high[1]], config.range[2]],
                    latitude,
                    longitude,
                })
            }
        }
    }

    fn bounds(&self) -> &[[f64; 2]; 3] {
        match self {
            PositionSampler::Local { bounds } | PositionSampler::Geodetic { bounds, .. } => bounds,
        }
    }

    /// Volume of the sampled box, in m^3.
    pub fn volume(&self) -> f64 {
        self.bounds()
            .iter()
            .map(|[low, high]| high - low)
            .product()
    }

    /// Draws a position. Returns `None` when a geodetic draw falls outside
    /// the latitude / longitude box.
    pub fn sample(
        &self,
        rng: &mut RngHandle,
        topography: &dyn Topography,
    ) -> Result<Option<Sample<Vec3>>, RetroError> {
        let bounds = self.bounds();
        let mut r = [
            rng.uniform(bounds[0][0], bounds[0][1]),
            rng.uniform(bounds[1][0], bounds[1][1]),
            rng.uniform(bounds[2][0], bounds[2][1]),
        ];
        if let PositionSampler::Geodetic {
            latitude,
            longitude,
            ..
        } = self
        {
            let geodetic = topography.local_to_lla(&r)?;
            if geodetic.latitude < latitude[0]
                || geodetic.latitude > latitude[1]
                || geodetic.longitude < longitude[0]
                || geodetic.longitude > longitude[1]
            {
                return Ok(None);
            }
        }
        r[2] += topography.ground_altitude(r[0], r[1])?;
        Ok(Some(Sample::new(r, self.volume())))
    }
}

/// Draw of the tau direction over a zenith range and the full azimuth.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectionSampler {
    /// Uniform over the solid angle.
    Uniform {
        /// `cos(zenith_max)`.
        c0: f64,
        /// `cos(zenith_min) - cos(zenith_max)`.
        dc: f64,
    },
    /// Density proportional to `|cos(zenith)|` over the solid angle.
    Linear {
        /// `cos(zenith_max)^2`.
        c0sq: f64,
        /// `cos(zenith_min)^2 - cos(zenith_max)^2`.
        dc2: f64,
        /// Sign of `cos(zenith)` over the range.
        sign: f64,
    },
}

/// Cosine of an angle in deg, snapped to 0 next to the horizon.
fn snapped_cos(angle: f64) -> f64 {
    let c = angle.to_radians().cos();
    if c.abs() < f64::from(f32::EPSILON) {
        0.0
    } else {
        c
    }
}

impl DirectionSampler {
    /// Builds the sampler, checking the zenith range.
    pub fn from_config(config: &DirectionConfig) -> Result<Self, RetroError> {
        let [zenith_min, zenith_max] = config.range.zenith_bounds();
        if !(0.0..=180.0).contains(&zenith_min)
            || !(0.0..=180.0).contains(&zenith_max)
            || zenith_max <= zenith_min
        {
            return Err(RetroError::Config(
                ErrorInfo::new("invalid-zenith-range", "zenith range must lie in [0, 180] deg")
                    .with_context("zenith", format!("[{zenith_min}, {zenith_max}]")),
            ));
        }
        let c0 = snapped_cos(zenith_max);
        let c1 = snapped_cos(zenith_min);
        if c1 <= c0 {
            return Err(RetroError::Config(
                ErrorInfo::new("degenerate-zenith-range", "zenith range has no solid angle")
                    .with_context("zenith", format!("[{zenith_min}, {zenith_max}]")),
            ));
        }
        match config.model {
            DirectionModel::Uniform => Ok(DirectionSampler::Uniform { c0, dc: c1 - c0 }),
            DirectionModel::Linear => {
                if c0 * c1 < 0.0 {
                    return Err(RetroError::Config(
                        ErrorInfo::new(
                            "linear-direction-crosses-horizon",
                            "a linear direction model cannot span the horizon",
                        )
                        .with_context("zenith", format!("[{zenith_min}, {zenith_max}]"))
                        .with_hint("split the range at 90 deg into two generator entries"),
                    ));
                }
                let sign = if c0 + c1 < 0.0 { -1.0 } else { 1.0 };
                Ok(DirectionSampler::Linear {
                    c0sq: c0 * c0,
                    dc2: c1 * c1 - c0 * c0,
                    sign,
                })
            }
        }
    }

    /// Draws a direction. The local angles are converted to a frame vector
    /// by the topography, at the vertex position.
    pub fn sample(
        &self,
        rng: &mut RngHandle,
        topography: &dyn Topography,
        position: &Vec3,
    ) -> Result<Sample<Direction>, RetroError> {
        let (cos_theta, weight) = match *self {
            DirectionSampler::Uniform { c0, dc } => (c0 + dc * rng.uniform01(), 2.0 * PI * dc),
            DirectionSampler::Linear { c0sq, dc2, sign } => {
                let mut c2 = 0.0;
                while c2 <= 0.0 {
                    c2 = c0sq + dc2 * rng.uniform01();
                }
                let c = c2.sqrt();
                (sign * c, PI * dc2.abs() / c)
            }
        };
        let zenith = cos_theta.clamp(-1.0, 1.0).acos().to_degrees();
        let azimuth = rng.uniform(-180.0, 180.0);
        let vector = topography.angular_to_local(position, zenith, azimuth)?;
        Ok(Sample::new(
            Direction {
                vector,
                zenith,
                azimuth,
            },
            weight,
        ))
    }
}

/// Draw of the tau energy over `[E0, E1]`.
#[derive(Debug, Clone, PartialEq)]
pub enum EnergySampler {
    /// Flat in energy.
    Uniform {
        /// `[E0, E1]`, in GeV.
        range: [f64; 2],
    },
    /// `1/E` spectrum.
    InverseLinear {
        /// `[E0, E1]`, in GeV.
        range: [f64; 2],
        /// `ln(E1 / E0)`.
        log_ratio: f64,
    },
    /// `1/E^2` spectrum.
    InverseSquare {
        /// `[E0, E1]`, in GeV.
        range: [f64; 2],
        /// `1 - E0 / E1`.
        ratio: f64,
    },
}

impl EnergySampler {
    /// Builds the sampler, checking the energy range.
    pub fn from_config(config: &EnergyConfig) -> Result<Self, RetroError> {
        let [e0, e1] = config.range;
        if !(e0 > 0.0 && e1 > e0 && e1.is_finite()) {
            return Err(RetroError::Config(
                ErrorInfo::new("invalid-energy-range", "energy range must satisfy 0 < E0 < E1")
                    .with_context("energy", format!("[{e0}, {e1}]")),
            ));
        }
        if e0 <= TAU_MASS {
            return Err(RetroError::Config(
                ErrorInfo::new(
                    "invalid-energy-range",
                    "the tau energy must exceed its mass over the whole range",
                )
                .with_context("energy", format!("[{e0}, {e1}]"))
                .with_context("tau_mass", TAU_MASS.to_string()),
            ));
        }
        let range = config.range;
        Ok(match config.model {
            EnergyModel::Uniform => EnergySampler::Uniform { range },
            EnergyModel::InverseLinear => EnergySampler::InverseLinear {
                range,
                log_ratio: (e1 / e0).ln(),
            },
            EnergyModel::InverseSquare => EnergySampler::InverseSquare {
                range,
                ratio: 1.0 - e0 / e1,
            },
        })
    }

    /// `[E0, E1]`, in GeV.
    pub fn range(&self) -> [f64; 2] {
        match self {
            EnergySampler::Uniform { range }
            | EnergySampler::InverseLinear { range, .. }
            | EnergySampler::InverseSquare { range, .. } => *range,
        }
    }

    /// Draws an energy, in GeV.
    pub fn sample(&self, rng: &mut RngHandle) -> Sample<f64> {
        let u = rng.uniform01();
        match *self {
            EnergySampler::Uniform { range: [e0, e1] } => Sample::new(e0 + u * (e1 - e0), e1 - e0),
            EnergySampler::InverseLinear {
                range: [e0, _],
                log_ratio,
            } => {
                let energy = e0 * (u * log_ratio).exp();
                Sample::new(energy, energy * log_ratio)
            }
            EnergySampler::InverseSquare {
                range: [e0, _],
                ratio,
            } => {
                let energy = e0 / (1.0 - ratio * u);
                Sample::new(energy, ratio * energy * energy / e0)
            }
        }
    }
}

/// One sampling strategy of the mixture.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationModel {
    /// Vertex position sampler.
    pub position: PositionSampler,
    /// Tau direction sampler.
    pub direction: DirectionSampler,
    /// Tau energy sampler.
    pub energy: EnergySampler,
}

impl GenerationModel {
    /// Builds the samplers of a resolved model.
    pub fn from_config(
        config: &ModelConfig,
        topography: &dyn Topography,
    ) -> Result<Self, RetroError> {
        Ok(Self {
            position: PositionSampler::from_config(&config.position, topography)?,
            direction: DirectionSampler::from_config(&config.direction)?,
            energy: EnergySampler::from_config(&config.energy)?,
        })
    }

    /// See [`PositionSampler::sample`].
    pub fn sample_position(
        &self,
        rng: &mut RngHandle,
        topography: &dyn Topography,
    ) -> Result<Option<Sample<Vec3>>, RetroError> {
        self.position.sample(rng, topography)
    }

    /// See [`DirectionSampler::sample`].
    pub fn sample_direction(
        &self,
        rng: &mut RngHandle,
        topography: &dyn Topography,
        position: &Vec3,
    ) -> Result<Sample<Direction>, RetroError> {
        self.direction.sample(rng, topography, position)
    }

    /// See [`EnergySampler::sample`].
    pub fn sample_energy(&self, rng: &mut RngHandle) -> Sample<f64> {
        self.energy.sample(rng)
    }
}
