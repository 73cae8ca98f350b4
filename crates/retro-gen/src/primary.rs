//! Backward sampling of the primary neutrinos of an accepted vertex.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::Command;

use retro_core::constants::{tau_momentum, TAU_CTAU, TAU_MASS};
use retro_core::{ErrorInfo, RetroError, Vec3};
use retro_topo::Geodetic;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tempfile::TempDir;
use tracing::debug;

use crate::config::PrimaryConfig;

/// Tau state handed to the primary sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimaryRequest {
    /// PDG identifier of the tau.
    pub pid: i32,
    /// Tau energy at decay, in GeV.
    pub energy: f64,
    /// Decay vertex, local frame.
    pub position: Vec3,
    /// Decay vertex, geodetic.
    pub geodetic: Geodetic,
    /// Local zenith of the tau direction, in deg.
    pub zenith: f64,
    /// Local azimuth of the tau direction, in deg.
    pub azimuth: f64,
}

/// Primary neutrino consistent with a tau vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Primary {
    /// Monte Carlo weight.
    pub weight: f64,
    /// Neutrino energy, in GeV.
    pub energy: f64,
    /// Number of neutrino / tau regeneration steps.
    pub generation: i32,
    /// Production point of the tau, local frame.
    pub position: Vec3,
}

/// Primaries found for one vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimaryBatch {
    /// Primaries, in sampling order.
    pub primaries: Vec<Primary>,
    /// Number of backward Monte Carlo events run.
    pub trials: u64,
}

/// Backward primary sampler.
pub trait PrimarySampler {
    /// Samples primaries for the tau described by `request`.
    fn sample(&mut self, request: &PrimaryRequest) -> Result<PrimaryBatch, RetroError>;
}

/// Conversion of a backward Monte Carlo weight to a flux weight, given the
/// energy span of the generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimaryWeighting {
    factor: f64,
}

impl PrimaryWeighting {
    /// Weighting for taus generated over `[emin, emax]` (GeV), with
    /// primaries sampled up to `1e3 * emax`.
    pub fn new(energy_span: [f64; 2]) -> Self {
        let [emin, emax] = energy_span;
        Self {
            factor: TAU_MASS / TAU_CTAU * (1.0 / emin - 1.0 / (1e3 * emax)),
        }
    }

    /// Decay weight of a tau of the given energy, in GeV.
    pub fn decay_weight(&self, tau_energy: f64) -> f64 {
        self.factor / tau_momentum(tau_energy)
    }
}

#[derive(Deserialize)]
struct PrimaryRecord {
    id: u64,
    weight: f64,
    energy: f64,
    generation: i32,
    position: Vec3,
}

/// Primary sampler running an external backward Monte Carlo command.
///
/// A JSON steering card is written to a private temporary directory and its
/// path passed as the last argument. The command writes one JSON record per
/// primary, `{id, weight, energy, generation, position}`, to the card's
/// `output-file`. Anything written to stderr aborts the run.
#[derive(Debug)]
pub struct CommandPrimarySampler {
    command: String,
    args: Vec<String>,
    events: u64,
    requested: Option<u64>,
    longitudinal: bool,
    energy_span: [f64; 2],
    weighting: PrimaryWeighting,
    workdir: TempDir,
}

impl CommandPrimarySampler {
    /// Creates the sampler for taus generated over `energy_span` (GeV).
    pub fn new(config: &PrimaryConfig, energy_span: [f64; 2]) -> Result<Self, RetroError> {
        let workdir = tempfile::Builder::new()
            .prefix("retro.")
            .tempdir()
            .map_err(|err| RetroError::io("primary-workdir", &err, std::env::temp_dir()))?;
        Ok(Self {
            command: config.command.clone(),
            args: config.args.clone(),
            events: config.events,
            requested: config.requested,
            longitudinal: config.longitudinal,
            energy_span,
            weighting: PrimaryWeighting::new(energy_span),
            workdir,
        })
    }

    fn card_path(&self) -> PathBuf {
        self.workdir.path().join("card.json")
    }

    fn output_path(&self) -> PathBuf {
        self.workdir.path().join("primaries.json")
    }

    fn steering_card(&self, request: &PrimaryRequest) -> serde_json::Value {
        let (tau, anti_tau) = if request.pid > 0 { (1.0, 0.0) } else { (0.0, 1.0) };
        let flux = json!(["power-law", {
            "energy": [self.energy_span[0], 1e3 * self.energy_span[1]],
            "exponent": -2.0,
            "weight": 1.0,
        }]);
        json!({
            "events": self.events,
            "requested": self.requested.map_or(-1, |r| r as i64),
            "output-file": self.output_path().display().to_string(),
            "mode": "backward",
            "longitudinal": self.longitudinal,
            "decay": false,
            "earth-model": { "sea": false },
            "particle-sampler": {
                "altitude": request.geodetic.altitude,
                "elevation": request.zenith - 90.0,
                "azimuth": request.azimuth,
                "energy": request.energy,
                "weight": { "tau": tau, "tau~": anti_tau },
            },
            "primary-flux": { "nu_tau": flux, "nu_tau~": flux },
        })
    }

    fn read_output(&self, request: &PrimaryRequest) -> Result<PrimaryBatch, RetroError> {
        let path = self.output_path();
        if !path.exists() {
            return Ok(PrimaryBatch {
                primaries: Vec::new(),
                trials: self.events,
            });
        }
        let file =
            fs::File::open(&path).map_err(|err| RetroError::io("primary-open", &err, &path))?;
        let wd = self.weighting.decay_weight(request.energy);
        let mut batch = PrimaryBatch::default();
        let mut last_id = None;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|err| RetroError::io("primary-read", &err, &path))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: PrimaryRecord = serde_json::from_str(&line).map_err(|err| {
                RetroError::Primary(
                    ErrorInfo::new("primary-parse", err.to_string())
                        .with_context("path", path.display().to_string()),
                )
            })?;
            last_id = Some(record.id);
            batch.primaries.push(Primary {
                weight: record.weight * wd,
                energy: record.energy,
                generation: record.generation,
                position: record.position,
            });
        }
        fs::remove_file(&path).map_err(|err| RetroError::io("primary-cleanup", &err, &path))?;
        // The command stops early only once `requested` primaries are found.
        let found = batch.primaries.len() as u64;
        batch.trials = match (self.requested, last_id) {
            (Some(requested), Some(id)) if found >= requested => id + 1,
            _ => self.events,
        };
        Ok(batch)
    }
}

impl PrimarySampler for CommandPrimarySampler {
    fn sample(&mut self, request: &PrimaryRequest) -> Result<PrimaryBatch, RetroError> {
        let card_path = self.card_path();
        let output_path = self.output_path();
        if output_path.exists() {
            fs::remove_file(&output_path)
                .map_err(|err| RetroError::io("primary-cleanup", &err, &output_path))?;
        }
        let card = serde_json::to_vec(&self.steering_card(request))
            .map_err(|err| RetroError::Serde(ErrorInfo::new("primary-card", err.to_string())))?;
        fs::write(&card_path, card)
            .map_err(|err| RetroError::io("primary-card", &err, &card_path))?;

        debug!(command = %self.command, energy = request.energy, "sampling primaries");
        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(&card_path)
            .output()
            .map_err(|err| {
                RetroError::Primary(
                    ErrorInfo::new("primary-spawn", err.to_string())
                        .with_context("command", self.command.clone()),
                )
            })?;
        if !output.stderr.is_empty() {
            return Err(RetroError::Primary(
                ErrorInfo::new(
                    "primary-stderr",
                    String::from_utf8_lossy(&output.stderr).trim().to_string(),
                )
                .with_context("command", self.command.clone()),
            ));
        }
        if !output.status.success() {
            return Err(RetroError::Primary(
                ErrorInfo::new("primary-exit", format!("command exited with {}", output.status))
                    .with_context("command", self.command.clone()),
            ));
        }
        self.read_output(request)
    }
}
