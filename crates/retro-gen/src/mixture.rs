use retro_core::{ErrorInfo, RetroError, RngHandle};
use retro_topo::Topography;

use crate::config::ModelConfig;
use crate::model::GenerationModel;

/// Model picked for one trial.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    /// Index of the model in the mixture.
    pub index: usize,
    /// Selected model.
    pub model: &'a GenerationModel,
    /// Importance weight of the choice, `1 / prior`.
    pub weight: f64,
}

/// Ordered, prior weighted list of generation models.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMixture {
    models: Vec<GenerationModel>,
    priors: Vec<f64>,
    cumulative: Vec<f64>,
}

impl ModelMixture {
    /// Builds a mixture from `(prior, model)` pairs. Priors are normalised.
    pub fn new(entries: Vec<(f64, GenerationModel)>) -> Result<Self, RetroError> {
        if entries.is_empty() {
            return Err(RetroError::config("empty-generator", "the mixture has no model"));
        }
        let total: f64 = entries.iter().map(|(prior, _)| *prior).sum();
        for (index, (prior, _)) in entries.iter().enumerate() {
            if !(prior.is_finite() && *prior > 0.0) {
                return Err(RetroError::Config(
                    ErrorInfo::new("invalid-prior", "mixture priors must be positive")
                        .with_context("entry", index.to_string())
                        .with_context("weight", prior.to_string()),
                ));
            }
        }
        let mut models = Vec::with_capacity(entries.len());
        let mut priors = Vec::with_capacity(entries.len());
        let mut cumulative = Vec::with_capacity(entries.len());
        let mut acc = 0.0;
        for (prior, model) in entries {
            let prior = prior / total;
            acc += prior;
            models.push(model);
            priors.push(prior);
            cumulative.push(acc);
        }
        Ok(Self {
            models,
            priors,
            cumulative,
        })
    }

    /// Builds the samplers of resolved run card models.
    pub fn from_config(
        configs: &[ModelConfig],
        topography: &dyn Topography,
    ) -> Result<Self, RetroError> {
        let entries = configs
            .iter()
            .map(|config| Ok((config.weight, GenerationModel::from_config(config, topography)?)))
            .collect::<Result<Vec<_>, RetroError>>()?;
        Self::new(entries)
    }

    /// Picks a model with probability equal to its prior.
    pub fn select(&self, rng: &mut RngHandle) -> Selection<'_> {
        let u = rng.uniform01();
        let index = self
            .cumulative
            .iter()
            .position(|&c| u < c)
            .unwrap_or(self.models.len() - 1);
        Selection {
            index,
            model: &self.models[index],
            weight: 1.0 / self.priors[index],
        }
    }

    /// Normalised priors, in mixture order.
    pub fn priors(&self) -> &[f64] {
        &self.priors
    }

    /// Models, in mixture order.
    pub fn models(&self) -> &[GenerationModel] {
        &self.models
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Always `false`: a mixture holds at least one model.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Lowest energy any model can draw. Showers below it are rejected.
    pub fn energy_threshold(&self) -> f64 {
        self.energy_span()[0]
    }

    /// `[min E0, max E1]` over all models, in GeV.
    pub fn energy_span(&self) -> [f64; 2] {
        self.models
            .iter()
            .map(|model| model.energy.range())
            .fold([f64::INFINITY, f64::NEG_INFINITY], |[low, high], [e0, e1]| {
                [low.min(e0), high.max(e1)]
            })
    }
}
