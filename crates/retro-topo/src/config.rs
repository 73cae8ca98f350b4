use std::path::{Path, PathBuf};

use retro_core::RetroError;
use serde::{Deserialize, Serialize};

use crate::flat::FlatTopography;
use crate::frame::LocalFrame;
use crate::grid::GridTopography;
use crate::topography::Topography;

/// `topography` section of a run card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopographyConfig {
    /// Latitude of the local frame origin, in deg.
    pub latitude: f64,
    /// Longitude of the local frame origin, in deg.
    pub longitude: f64,
    /// Terrain model, written as a single key map such as
    /// `{ flat: { altitude: 0 } }`.
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub model: TopographyModel,
}

/// Supported terrain models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", deny_unknown_fields)]
pub enum TopographyModel {
    /// Constant ground altitude.
    Flat {
        /// Ground altitude, in m.
        #[serde(default)]
        altitude: f64,
    },
    /// Height map read from a headerless CSV file.
    Grid {
        /// CSV file, one row of altitudes per `y` node. Relative paths are
        /// resolved from the run card directory.
        path: PathBuf,
        /// Local `(x, y)` of the first node, in m.
        origin: [f64; 2],
        /// Node spacing `(dx, dy)`, in m.
        spacing: [f64; 2],
        /// Ground altitude outside the map, in m.
        #[serde(default)]
        outside: f64,
    },
}

impl Default for TopographyModel {
    fn default() -> Self {
        TopographyModel::Flat { altitude: 0.0 }
    }
}

impl TopographyConfig {
    /// Local frame anchored at the configured origin.
    pub fn frame(&self) -> LocalFrame {
        LocalFrame::new(self.latitude, self.longitude)
    }

    /// Instantiates the configured terrain model.
    pub fn build(&self, base_dir: &Path) -> Result<Box<dyn Topography>, RetroError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(RetroError::config(
                "invalid-latitude",
                format!("latitude {} is outside [-90, 90]", self.latitude),
            ));
        }
        match &self.model {
            TopographyModel::Flat { altitude } => {
                Ok(Box::new(FlatTopography::new(self.frame(), *altitude)))
            }
            TopographyModel::Grid {
                path,
                origin,
                spacing,
                outside,
            } => {
                let path = base_dir.join(path);
                let grid =
                    GridTopography::from_csv(&path, self.frame(), *origin, *spacing, *outside)?;
                Ok(Box::new(grid))
            }
        }
    }
}
