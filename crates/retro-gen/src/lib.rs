#![deny(missing_docs)]

//! Tau decay event generation: mixture of importance samplers for the decay
//! vertex, terrain aware rejection stages, adapters for the external decay
//! and primary engines, and the append only event log.

/// YAML run card schema and validation.
pub mod config;
/// External tau decay engine and the visible decay loop.
pub mod decay;
/// Seeds and log paths of sharded runs.
pub mod determinism;
/// Accepted event records.
pub mod event;
/// Self linking JSON lines event log.
pub mod log;
/// Run manifest written next to the event log.
pub mod manifest;
/// Prior weighted mixture of generation models.
pub mod mixture;
pub mod model;
/// Detector visibility preselection.
pub mod preselector;
/// Backward primary neutrino sampling.
pub mod primary;
/// The rejection sampling loop.
pub mod processor;
/// Vertex selection from the terrain geometry.
pub mod selector;

pub use config::{ModelConfig, RunCard, SeedPolicy};
pub use decay::{decay_tau, DecayEngine, DecayOutcome, DecayProduct, ProcessDecayEngine};
pub use event::{event_tag, Event, TauAtDecay, TrialStatistics};
pub use log::{EventIterator, EventLog, LogRecord};
pub use manifest::RunManifest;
pub use mixture::{ModelMixture, Selection};
pub use model::{
    Direction, DirectionSampler, EnergySampler, GenerationModel, PositionSampler, Sample,
};
pub use preselector::{Antenna, AntennaPreselector};
pub use primary::{
    CommandPrimarySampler, Primary, PrimaryBatch, PrimaryRequest, PrimarySampler,
    PrimaryWeighting,
};
pub use processor::{
    Engines, Rejection, RunSummary, SamplingLoop, Termination, TrialOutcome,
};
pub use selector::VertexSelector;
