#![allow(dead_code)]

use std::path::Path;

use retro_core::constants::TAU_MASS;
use retro_core::{ErrorInfo, RetroError, Vec3};
use retro_gen::config::{
    AngularRange, DirectionConfig, DirectionModel, EnergyConfig, EnergyModel, ModelConfig,
    PositionConfig, PositionModel,
};
use retro_gen::{
    DecayEngine, DecayOutcome, DecayProduct, PrimaryBatch, PrimaryRequest, PrimarySampler,
};
use retro_topo::{FlatTopography, LocalFrame};

/// Decay engine returning a charged pion along the tau and a photon
/// carrying the tau mass, so that the shower energy always exceeds the tau
/// energy. The first `invisible` calls only return a neutrino.
#[derive(Debug, Default)]
pub struct FakeDecayEngine {
    pub calls: u32,
    pub invisible: u32,
    pub fail_code: Option<i32>,
    pub shutdowns: u32,
}

impl FakeDecayEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecayEngine for FakeDecayEngine {
    fn decay(
        &mut self,
        _pid: i32,
        momentum: &Vec3,
        _polarisation: &Vec3,
    ) -> Result<DecayOutcome, RetroError> {
        self.calls += 1;
        if let Some(code) = self.fail_code {
            return Err(RetroError::Decay(
                ErrorInfo::new("engine-failure", "fake failure")
                    .with_context("engine_code", code.to_string()),
            ));
        }
        let products = if self.calls <= self.invisible {
            vec![DecayProduct {
                pid: 16,
                momentum: *momentum,
            }]
        } else {
            vec![
                DecayProduct {
                    pid: -211,
                    momentum: *momentum,
                },
                DecayProduct {
                    pid: 22,
                    momentum: [0.0, 0.0, TAU_MASS],
                },
            ]
        };
        Ok(DecayOutcome {
            products,
            state: u64::from(self.calls),
        })
    }

    fn shutdown(&mut self) -> Result<(), RetroError> {
        self.shutdowns += 1;
        Ok(())
    }
}

/// Primary sampler replaying a fixed batch.
#[derive(Debug, Default)]
pub struct FakePrimarySampler {
    pub batch: PrimaryBatch,
    pub requests: Vec<PrimaryRequest>,
}

impl PrimarySampler for FakePrimarySampler {
    fn sample(&mut self, request: &PrimaryRequest) -> Result<PrimaryBatch, RetroError> {
        self.requests.push(*request);
        Ok(self.batch.clone())
    }
}

pub fn flat_ground() -> FlatTopography {
    FlatTopography::new(LocalFrame::new(42.1, 86.3), 0.0)
}

/// Box `[0,10]x[0,10]x[0,5]`, elevation `[60, 90]` deg, `1/E` over
/// `[1e8, 1e10]` GeV.
pub fn small_box_model() -> ModelConfig {
    ModelConfig {
        weight: 1.0,
        position: PositionConfig {
            model: PositionModel::Local,
            range: [[0.0, 10.0], [0.0, 10.0], [0.0, 5.0]],
        },
        direction: DirectionConfig {
            model: DirectionModel::Uniform,
            range: AngularRange::Elevation([60.0, 90.0]),
        },
        energy: EnergyConfig {
            model: EnergyModel::InverseLinear,
            range: [1e8, 1e10],
        },
    }
}

/// Minimal run card without antenna preselection.
pub fn minimal_card(log: &Path) -> String {
    format!(
        r#"
generator:
  - position: {{ range: [[0, 10], [0, 10], [0, 5]] }}
    direction: {{ model: uniform, range: {{ elevation: [60, 90] }} }}
    energy: {{ model: "1/E", range: [1.0e8, 1.0e10] }}
processor: {{ requested: 5 }}
selector:
  antenna: {{ enabled: false }}
logger: {{ path: "{}" }}
topography: {{ latitude: 42.1, longitude: 86.3 }}
decay: {{ command: alouette-server }}
"#,
        log.display()
    )
}
