use std::fs;
use std::path::{Path, PathBuf};

use retro_core::{ErrorInfo, RetroError};
use retro_topo::TopographyConfig;
use serde::{Deserialize, Serialize};

use crate::model::{DirectionSampler, EnergySampler};

/// YAML run card describing a generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunCard {
    /// Mixture of generation models. Entries may omit parts that are then
    /// inherited from the previous entry.
    pub generator: Vec<GeneratorEntry>,
    /// Termination bounds of the sampling loop.
    #[serde(default)]
    pub processor: ProcessorConfig,
    /// Vertex and antenna selection.
    #[serde(default)]
    pub selector: SelectorConfig,
    /// Detector layout, required by the antenna preselection.
    #[serde(default)]
    pub setup: Option<SetupConfig>,
    /// Event log destination.
    pub logger: LoggerConfig,
    /// Terrain model and local frame origin.
    pub topography: TopographyConfig,
    /// Backward primary sampling. Disabled when absent.
    #[serde(default)]
    pub primary: Option<PrimaryConfig>,
    /// Tau decay engine.
    pub decay: DecayConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
}

/// One entry of the `generator` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorEntry {
    /// Prior weight of the entry, normalised over the mixture.
    #[serde(default = "default_prior")]
    pub weight: f64,
    /// Vertex position model.
    #[serde(default)]
    pub position: Option<PositionConfig>,
    /// Tau direction model.
    #[serde(default)]
    pub direction: Option<DirectionConfig>,
    /// Tau energy model.
    #[serde(default)]
    pub energy: Option<EnergyConfig>,
}

fn default_prior() -> f64 {
    1.0
}

/// Fully specified generation model, after inheritance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Prior weight (not normalised).
    pub weight: f64,
    /// Vertex position model.
    pub position: PositionConfig,
    /// Tau direction model.
    pub direction: DirectionConfig,
    /// Tau energy model.
    pub energy: EnergyConfig,
}

/// Vertex position model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionConfig {
    /// Interpretation of `range`.
    #[serde(default)]
    pub model: PositionModel,
    /// `[[x0, x1], [y0, y1], [z0, z1]]` in m for `local`, or
    /// `[[dlat0, dlat1], [dlon0, dlon1], [h0, h1]]` (deg, deg, m) around the
    /// topography origin for `geodetic`. Heights are above ground.
    pub range: [[f64; 2]; 3],
}

/// Box flavour of the position model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionModel {
    /// Box in local coordinates.
    #[default]
    Local,
    /// Latitude / longitude offsets around the frame origin.
    Geodetic,
}

impl PositionConfig {
    /// Checks that every range is finite and non-empty.
    pub fn validate(&self) -> Result<(), RetroError> {
        for (axis, [low, high]) in ["x", "y", "z"].iter().zip(self.range.iter()) {
            if !(low.is_finite() && high.is_finite() && high > low) {
                return Err(RetroError::Config(
                    ErrorInfo::new("invalid-position-range", "position range must be non-empty")
                        .with_context("axis", *axis)
                        .with_context("range", format!("[{low}, {high}]")),
                ));
            }
        }
        Ok(())
    }
}

/// Tau direction model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectionConfig {
    /// Angular distribution.
    #[serde(default)]
    pub model: DirectionModel,
    /// Zenith or elevation range, in deg, as `{ zenith: [a, b] }` or
    /// `{ elevation: [a, b] }`.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub range: AngularRange,
}

impl Default for DirectionConfig {
    fn default() -> Self {
        Self {
            model: DirectionModel::Uniform,
            range: AngularRange::Zenith([80.0, 100.0]),
        }
    }
}

/// Angular distribution of the direction model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionModel {
    /// Uniform over the solid angle.
    #[default]
    Uniform,
    /// Density proportional to `|cos(zenith)|` over the solid angle.
    Linear,
}

/// Angular range, given either as zenith or as elevation angles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngularRange {
    /// `[zenith_min, zenith_max]`, in deg.
    Zenith([f64; 2]),
    /// `[elevation_min, elevation_max]`, in deg.
    Elevation([f64; 2]),
}

impl AngularRange {
    /// Returns `[zenith_min, zenith_max]`, in deg.
    pub fn zenith_bounds(&self) -> [f64; 2] {
        match *self {
            AngularRange::Zenith([a, b]) => [a, b],
            AngularRange::Elevation([a, b]) => [90.0 - b, 90.0 - a],
        }
    }
}

/// Tau energy model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnergyConfig {
    /// Energy spectrum.
    #[serde(default)]
    pub model: EnergyModel,
    /// `[E0, E1]`, in GeV.
    pub range: [f64; 2],
}

/// Energy spectrum of the energy model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyModel {
    /// Flat in energy.
    #[serde(rename = "uniform")]
    Uniform,
    /// `1/E` spectrum.
    #[default]
    #[serde(rename = "1/E")]
    InverseLinear,
    /// `1/E^2` spectrum.
    #[serde(rename = "1/E**2")]
    InverseSquare,
}

/// Termination bounds. At least one of them must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Number of accepted events to produce.
    #[serde(default)]
    pub requested: Option<u64>,
    /// Maximum number of trials.
    #[serde(default)]
    pub trials: Option<u64>,
}

/// Selection stages applied to tentative vertices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorConfig {
    /// Probabilistic rejection of vertices far from the ground.
    #[serde(default)]
    pub vertex: VertexConfig,
    /// Geometric visibility of the shower by the detector.
    #[serde(default)]
    pub antenna: AntennaConfig,
}

/// Vertex selection settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VertexConfig {
    /// Distance limit in decay lengths. Absent or non positive disables the
    /// selection.
    #[serde(default)]
    pub limit: Option<f64>,
}

/// Antenna preselection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AntennaConfig {
    /// Whether the preselection runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Opening of the radio cone.
    #[serde(default)]
    pub cone: ConeModel,
    /// Reject showers whose maximum would develop under ground.
    #[serde(default = "default_true")]
    pub xmax: bool,
    /// Reject antennas hidden by the terrain.
    #[serde(default = "default_true")]
    pub shadowing: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AntennaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cone: ConeModel::default(),
            xmax: true,
            shadowing: true,
        }
    }
}

/// Half-angle model of the radio cone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConeModel {
    /// Fixed 3 deg half angle.
    #[default]
    #[serde(rename = "3deg")]
    ThreeDegrees,
    /// Energy dependent half angle, `0.47 ln(E / 1e8 GeV) + 0.9` deg.
    #[serde(rename = "aggressive", alias = "agressive")]
    Aggressive,
}

/// Detector layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupConfig {
    /// JSON array of `[x, y, z, extra...]` rows, in local coordinates.
    pub path: PathBuf,
}

/// Event log destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    /// Path of the JSON lines event log.
    pub path: PathBuf,
}

/// Backward primary sampling with an external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrimaryConfig {
    /// Number of backward Monte Carlo events per accepted vertex.
    pub events: u64,
    /// Stop once this many primaries were found. All events are run when
    /// absent.
    #[serde(default)]
    pub requested: Option<u64>,
    /// Sample longitudinal tau transport only.
    #[serde(default = "default_true")]
    pub longitudinal: bool,
    /// Executable receiving the steering card path as last argument.
    pub command: String,
    /// Extra arguments placed before the card path.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Tau decay engine process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecayConfig {
    /// Executable speaking the line delimited JSON decay protocol.
    pub command: String,
    /// Extra arguments placed before `--seed`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Maximum number of decays drawn while waiting for a visible shower.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    1000
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in the run manifest.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x7A0D_EC47_5EED_0015_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

impl RunCard {
    /// Reads and validates a YAML run card.
    pub fn load(path: &Path) -> Result<Self, RetroError> {
        let contents =
            fs::read_to_string(path).map_err(|err| RetroError::io("card-read", &err, path))?;
        let card = Self::from_yaml_str(&contents).map_err(|err| match err {
            RetroError::Config(info) => {
                RetroError::Config(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })?;
        Ok(card)
    }

    /// Parses and validates a YAML run card held in memory.
    pub fn from_yaml_str(contents: &str) -> Result<Self, RetroError> {
        let card: RunCard = serde_yaml::from_str(contents)
            .map_err(|err| RetroError::config("card-parse", err.to_string()))?;
        card.validate()?;
        Ok(card)
    }

    /// Checks the card without touching the file system.
    pub fn validate(&self) -> Result<(), RetroError> {
        let models = self.models()?;
        for model in &models {
            model.position.validate()?;
            DirectionSampler::from_config(&model.direction)?;
            EnergySampler::from_config(&model.energy)?;
        }
        if self.processor.requested.is_none() && self.processor.trials.is_none() {
            return Err(RetroError::Config(
                ErrorInfo::new(
                    "missing-termination",
                    "neither processor.requested nor processor.trials is set",
                )
                .with_hint("set at least one termination bound"),
            ));
        }
        if let Some(limit) = self.selector.vertex.limit {
            if limit.is_nan() {
                return Err(RetroError::config("invalid-vertex-limit", "vertex limit is NaN"));
            }
        }
        if self.selector.antenna.enabled && self.setup.is_none() {
            return Err(RetroError::Config(
                ErrorInfo::new(
                    "missing-antenna-layout",
                    "antenna preselection requires setup.path",
                )
                .with_hint("set selector.antenna.enabled to false to skip the preselection"),
            ));
        }
        if let Some(primary) = &self.primary {
            if primary.events == 0 {
                return Err(RetroError::config(
                    "invalid-primary-events",
                    "primary.events must be positive",
                ));
            }
            if primary.command.trim().is_empty() {
                return Err(RetroError::config(
                    "missing-primary-command",
                    "primary.command is empty",
                ));
            }
        }
        if self.decay.command.trim().is_empty() {
            return Err(RetroError::config("missing-decay-command", "decay.command is empty"));
        }
        if self.decay.max_attempts == 0 {
            return Err(RetroError::config(
                "invalid-max-attempts",
                "decay.max_attempts must be positive",
            ));
        }
        if self.logger.path.as_os_str().is_empty() {
            return Err(RetroError::config("missing-log-path", "logger.path is empty"));
        }
        Ok(())
    }

    /// Resolves the generator list into complete models, applying
    /// inheritance from the previous entry.
    pub fn models(&self) -> Result<Vec<ModelConfig>, RetroError> {
        resolve_generator(&self.generator)
    }
}

/// Resolves mixture entries into complete models. An entry inherits every
/// part it omits from the previous entry. The first entry falls back to the
/// default direction model but must define its position and energy.
pub fn resolve_generator(entries: &[GeneratorEntry]) -> Result<Vec<ModelConfig>, RetroError> {
    if entries.is_empty() {
        return Err(RetroError::config("empty-generator", "the generator list is empty"));
    }
    let mut models: Vec<ModelConfig> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        if !(entry.weight.is_finite() && entry.weight > 0.0) {
            return Err(RetroError::Config(
                ErrorInfo::new("invalid-prior", "generator weights must be positive")
                    .with_context("entry", index.to_string())
                    .with_context("weight", entry.weight.to_string()),
            ));
        }
        let previous = models.last();
        let missing = |part: &str| {
            RetroError::Config(
                ErrorInfo::new(
                    "incomplete-generator",
                    format!("first generator entry has no {part}"),
                )
                .with_context("entry", index.to_string()),
            )
        };
        let position = match (&entry.position, previous) {
            (Some(position), _) => position.clone(),
            (None, Some(previous)) => previous.position.clone(),
            (None, None) => return Err(missing("position")),
        };
        let direction = match (&entry.direction, previous) {
            (Some(direction), _) => direction.clone(),
            (None, Some(previous)) => previous.direction.clone(),
            (None, None) => DirectionConfig::default(),
        };
        let energy = match (&entry.energy, previous) {
            (Some(energy), _) => energy.clone(),
            (None, Some(previous)) => previous.energy.clone(),
            (None, None) => return Err(missing("energy")),
        };
        models.push(ModelConfig {
            weight: entry.weight,
            position,
            direction,
            energy,
        });
    }
    Ok(models)
}
