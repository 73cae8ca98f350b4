use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use retro_core::constants::{TAU_BR_MU, TAU_PID};
use retro_core::{ErrorInfo, RetroError, RngHandle};
use retro_topo::Topography;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RunCard;
use crate::decay::{decay_tau, DecayEngine};
use crate::event::{event_tag, Event, TauAtDecay, TrialStatistics};
use crate::log::EventLog;
use crate::mixture::ModelMixture;
use crate::preselector::{AntennaPreselector, MIN_ANTENNAS};
use crate::primary::{Primary, PrimaryRequest, PrimarySampler};
use crate::selector::VertexSelector;

const DEFAULT_MAX_DECAY_ATTEMPTS: u32 = 1000;
const PROGRESS_INTERVAL: u64 = 10_000;

/// Reason for discarding a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rejection {
    /// Geodetic draw outside the latitude / longitude box.
    PositionOutside,
    /// Vertex under the ground.
    BelowGround,
    /// Vertex selection failed.
    Vertex,
    /// Shower energy below the generation threshold.
    ShowerEnergy,
    /// Too few antennas see the shower.
    Antennas,
    /// No primary was found.
    Primaries,
}

impl Rejection {
    /// Stable label of the reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::PositionOutside => "position-outside",
            Rejection::BelowGround => "below-ground",
            Rejection::Vertex => "vertex",
            Rejection::ShowerEnergy => "shower-energy",
            Rejection::Antennas => "antennas",
            Rejection::Primaries => "primaries",
        }
    }
}

/// Result of a single trial.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    /// The trial produced an event.
    Accepted(Box<Event>),
    /// The trial was discarded.
    Rejected(Rejection),
}

/// Termination bounds of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Termination {
    requested: Option<u64>,
    max_trials: Option<u64>,
}

impl Termination {
    /// Stops after `requested` events or `max_trials` trials, whichever
    /// comes first. At least one bound is required.
    pub fn new(requested: Option<u64>, max_trials: Option<u64>) -> Result<Self, RetroError> {
        if requested.is_none() && max_trials.is_none() {
            return Err(RetroError::Config(
                ErrorInfo::new("missing-termination", "the sampling loop has no bound")
                    .with_hint("set processor.requested or processor.trials"),
            ));
        }
        Ok(Self {
            requested,
            max_trials,
        })
    }

    /// Number of events to produce.
    pub fn requested(&self) -> Option<u64> {
        self.requested
    }

    /// Trial budget.
    pub fn max_trials(&self) -> Option<u64> {
        self.max_trials
    }

    fn is_reached(&self, done: u64, total_trials: u64) -> bool {
        self.requested.is_some_and(|requested| done >= requested)
            || self.max_trials.is_some_and(|max| total_trials >= max)
    }
}

/// External engines driven by the loop.
pub struct Engines<'e> {
    /// Tau decay engine.
    pub decay: &'e mut dyn DecayEngine,
    /// Primary sampler, when backward sampling is enabled.
    pub primary: Option<&'e mut dyn PrimarySampler>,
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Requested number of events.
    pub requested: Option<u64>,
    /// Trial budget.
    pub max_trials: Option<u64>,
    /// Accepted events.
    pub events: u64,
    /// Trials run.
    pub trials: u64,
    /// Discarded trials per reason.
    pub rejections: BTreeMap<String, u64>,
    /// Fraction of accepted trials.
    pub acceptance_rate: f64,
    /// Mean importance weight of the accepted events.
    pub mean_weight: f64,
    /// Wall clock time of the run, in s.
    pub elapsed_seconds: f64,
}

/// Rejection sampling loop producing weighted tau decay events.
pub struct SamplingLoop<'t> {
    topography: &'t dyn Topography,
    mixture: ModelMixture,
    vertex: VertexSelector,
    preselector: Option<AntennaPreselector>,
    termination: Termination,
    max_decay_attempts: u32,
    threshold: f64,
    trials: u64,
    total_trials: u64,
    done: u64,
    weight_sum: f64,
    rejections: BTreeMap<Rejection, u64>,
}

impl<'t> SamplingLoop<'t> {
    /// Loop over a mixture, without vertex nor antenna selection.
    pub fn new(
        topography: &'t dyn Topography,
        mixture: ModelMixture,
        termination: Termination,
    ) -> Self {
        let threshold = mixture.energy_threshold();
        Self {
            topography,
            mixture,
            vertex: VertexSelector::disabled(),
            preselector: None,
            termination,
            max_decay_attempts: DEFAULT_MAX_DECAY_ATTEMPTS,
            threshold,
            trials: 0,
            total_trials: 0,
            done: 0,
            weight_sum: 0.0,
            rejections: BTreeMap::new(),
        }
    }

    /// Builds the loop described by a run card. Relative paths of the card
    /// are resolved from `base_dir`.
    pub fn from_card(
        card: &RunCard,
        base_dir: &Path,
        topography: &'t dyn Topography,
    ) -> Result<Self, RetroError> {
        let mixture = ModelMixture::from_config(&card.models()?, topography)?;
        let termination = Termination::new(card.processor.requested, card.processor.trials)?;
        let layout = card.setup.as_ref().map(|setup| base_dir.join(&setup.path));
        let preselector =
            AntennaPreselector::from_config(&card.selector.antenna, layout.as_deref())?;
        Ok(Self::new(topography, mixture, termination)
            .with_vertex_selector(VertexSelector::from_limit(card.selector.vertex.limit))
            .with_preselector(preselector)
            .with_max_decay_attempts(card.decay.max_attempts))
    }

    /// Replaces the vertex selector.
    pub fn with_vertex_selector(mut self, vertex: VertexSelector) -> Self {
        self.vertex = vertex;
        self
    }

    /// Replaces the antenna preselector.
    pub fn with_preselector(mut self, preselector: Option<AntennaPreselector>) -> Self {
        self.preselector = preselector;
        self
    }

    /// Caps the number of decays drawn per trial.
    pub fn with_max_decay_attempts(mut self, max_attempts: u32) -> Self {
        self.max_decay_attempts = max_attempts;
        self
    }

    /// Mixture of generation models.
    pub fn mixture(&self) -> &ModelMixture {
        &self.mixture
    }

    /// Antenna preselector, when enabled.
    pub fn preselector(&self) -> Option<&AntennaPreselector> {
        self.preselector.as_ref()
    }

    /// Accepted events so far.
    pub fn done(&self) -> u64 {
        self.done
    }

    /// Trials run so far.
    pub fn total_trials(&self) -> u64 {
        self.total_trials
    }

    /// Discarded trials per reason.
    pub fn rejections(&self) -> &BTreeMap<Rejection, u64> {
        &self.rejections
    }

    /// Returns `true` once a termination bound is reached.
    pub fn is_done(&self) -> bool {
        self.termination.is_reached(self.done, self.total_trials)
    }

    fn reject(&mut self, reason: Rejection) -> Result<TrialOutcome, RetroError> {
        *self.rejections.entry(reason).or_insert(0) += 1;
        Ok(TrialOutcome::Rejected(reason))
    }

    /// Runs one trial. Termination is not checked.
    pub fn step(
        &mut self,
        rng: &mut RngHandle,
        engines: &mut Engines<'_>,
    ) -> Result<TrialOutcome, RetroError> {
        self.trials += 1;
        self.total_trials += 1;
        let topography = self.topography;

        let selection = self.mixture.select(rng);
        let model = selection.model;
        let Some(position) = model.sample_position(rng, topography)? else {
            return self.reject(Rejection::PositionOutside);
        };
        if !topography.is_above(&position.value)? {
            return self.reject(Rejection::BelowGround);
        }
        let direction = model.sample_direction(rng, topography, &position.value)?;
        let energy = model.sample_energy(rng);
        let (r, u, e) = (position.value, direction.value, energy.value);

        let p = self.vertex.vertex_weight(topography, e, &r, &u.vector)?;
        if !self.vertex.accept(p, rng) {
            return self.reject(Rejection::Vertex);
        }
        let mut weight =
            selection.weight * position.weight * direction.weight * energy.weight / p;

        let decay = decay_tau(&mut *engines.decay, e, &u.vector, self.max_decay_attempts)?;
        if decay.shower_energy < self.threshold {
            return self.reject(Rejection::ShowerEnergy);
        }
        weight *= 1.0 - TAU_BR_MU;

        let antennas = match &self.preselector {
            Some(preselector) => {
                let selected =
                    preselector.select(topography, decay.shower_energy, &r, &u.vector)?;
                if selected.len() < MIN_ANTENNAS {
                    return self.reject(Rejection::Antennas);
                }
                Some(selected)
            }
            None => None,
        };

        let geodetic = topography.local_to_lla(&r)?;
        let (primaries, primary_trials) = match engines.primary.as_mut() {
            Some(sampler) => {
                let batch = sampler.sample(&PrimaryRequest {
                    pid: TAU_PID,
                    energy: e,
                    position: r,
                    geodetic,
                    zenith: u.zenith,
                    azimuth: u.azimuth,
                })?;
                if batch.primaries.is_empty() {
                    return self.reject(Rejection::Primaries);
                }
                let primaries = batch
                    .primaries
                    .into_iter()
                    .map(|primary| Primary {
                        weight: weight * primary.weight * primary.energy * primary.energy,
                        ..primary
                    })
                    .collect();
                (primaries, batch.trials)
            }
            None => (Vec::new(), 0),
        };

        let frame = topography.frame();
        let event = Event {
            tag: event_tag(e, u.zenith, u.azimuth, &geodetic, decay.state),
            tau_at_decay: TauAtDecay {
                weight,
                energy: e,
                position: r,
                direction: u.vector,
                lla: geodetic.to_array(),
                angles: [u.zenith, u.azimuth],
            },
            decay: decay.products,
            primaries,
            statistics: TrialStatistics {
                trials: self.trials,
                primary_trials,
            },
            antennas,
            origin: [frame.latitude, frame.longitude],
        };
        self.trials = 0;
        self.done += 1;
        self.weight_sum += weight;
        Ok(TrialOutcome::Accepted(Box::new(event)))
    }

    /// Runs trials until termination, appending accepted events to `log`.
    pub fn run(
        &mut self,
        rng: &mut RngHandle,
        engines: &mut Engines<'_>,
        log: &mut EventLog,
    ) -> Result<RunSummary, RetroError> {
        info!(
            requested = ?self.termination.requested(),
            max_trials = ?self.termination.max_trials(),
            models = self.mixture.len(),
            log = %log.path().display(),
            "starting sampling loop"
        );
        let start = Instant::now();
        while !self.is_done() {
            if let TrialOutcome::Accepted(event) = self.step(rng, engines)? {
                let offset = log.append(&*event)?;
                debug!(
                    tag = %event.tag,
                    offset,
                    trials = event.statistics.trials,
                    "accepted event"
                );
            }
            if self.total_trials % PROGRESS_INTERVAL == 0 {
                debug!(trials = self.total_trials, events = self.done, "progress");
            }
        }
        let summary = self.summary(start.elapsed().as_secs_f64());
        info!(
            events = summary.events,
            trials = summary.trials,
            acceptance = summary.acceptance_rate,
            elapsed = summary.elapsed_seconds,
            "sampling loop done"
        );
        Ok(summary)
    }

    /// Snapshot of the counters.
    pub fn summary(&self, elapsed_seconds: f64) -> RunSummary {
        let ratio = |num: f64, den: u64| if den > 0 { num / den as f64 } else { 0.0 };
        RunSummary {
            requested: self.termination.requested(),
            max_trials: self.termination.max_trials(),
            events: self.done,
            trials: self.total_trials,
            rejections: self
                .rejections
                .iter()
                .map(|(reason, count)| (reason.as_str().to_string(), *count))
                .collect(),
            acceptance_rate: ratio(self.done as f64, self.total_trials),
            mean_weight: ratio(self.weight_sum, self.done),
            elapsed_seconds,
        }
    }
}
