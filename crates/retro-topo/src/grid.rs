use std::path::Path;

use retro_core::{ErrorInfo, RetroError};
use tracing::debug;

use crate::frame::LocalFrame;
use crate::topography::Topography;

/// Regular height map with bilinear interpolation.
///
/// Node `(i, j)` sits at local `(x0 + i * dx, y0 + j * dy)`; row `j` of the
/// table holds the altitudes along `x` for that `y`. Outside the map the
/// ground is at the configured `outside` altitude.
#[derive(Debug, Clone, PartialEq)]
pub struct GridTopography {
    frame: LocalFrame,
    origin: [f64; 2],
    spacing: [f64; 2],
    nx: usize,
    ny: usize,
    altitudes: Vec<f64>,
    outside: f64,
    ceiling: f64,
}

impl GridTopography {
    /// Builds a height map from rows of altitudes (one row per `y` node).
    pub fn new(
        frame: LocalFrame,
        origin: [f64; 2],
        spacing: [f64; 2],
        rows: Vec<Vec<f64>>,
        outside: f64,
    ) -> Result<Self, RetroError> {
        if !(spacing[0] > 0.0 && spacing[1] > 0.0) {
            return Err(RetroError::Config(
                ErrorInfo::new("invalid-grid-spacing", "grid spacing must be positive")
                    .with_context("dx", spacing[0].to_string())
                    .with_context("dy", spacing[1].to_string()),
            ));
        }
        let ny = rows.len();
        let nx = rows.first().map(Vec::len).unwrap_or(0);
        if nx < 2 || ny < 2 {
            return Err(RetroError::config(
                "invalid-grid-shape",
                "a height map needs at least 2x2 nodes",
            ));
        }
        let mut altitudes = Vec::with_capacity(nx * ny);
        for (j, row) in rows.into_iter().enumerate() {
            if row.len() != nx {
                return Err(RetroError::Config(
                    ErrorInfo::new("ragged-grid", "height map rows differ in length")
                        .with_context("row", j.to_string())
                        .with_context("expected", nx.to_string())
                        .with_context("found", row.len().to_string()),
                ));
            }
            altitudes.extend(row);
        }
        let ceiling = altitudes.iter().copied().fold(outside, f64::max);
        Ok(Self {
            frame,
            origin,
            spacing,
            nx,
            ny,
            altitudes,
            outside,
            ceiling,
        })
    }

    /// Loads a height map from a headerless CSV file.
    pub fn from_csv(
        path: &Path,
        frame: LocalFrame,
        origin: [f64; 2],
        spacing: [f64; 2],
        outside: f64,
    ) -> Result<Self, RetroError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|err| csv_error("grid-open", err, path))?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| csv_error("grid-read", err, path))?;
            let row = record
                .iter()
                .map(|field| {
                    field.parse::<f64>().map_err(|err| {
                        RetroError::Serde(
                            ErrorInfo::new("grid-parse", err.to_string())
                                .with_context("path", path.display().to_string())
                                .with_context("field", field.to_string()),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
        let grid = Self::new(frame, origin, spacing, rows, outside)?;
        debug!(path = %path.display(), nx = grid.nx, ny = grid.ny, "loaded height map");
        Ok(grid)
    }

    fn node(&self, i: usize, j: usize) -> f64 {
        self.altitudes[j * self.nx + i]
    }
}

impl Topography for GridTopography {
    fn frame(&self) -> &LocalFrame {
        &self.frame
    }

    fn ground_altitude(&self, x: f64, y: f64) -> Result<f64, RetroError> {
        let u = (x - self.origin[0]) / self.spacing[0];
        let v = (y - self.origin[1]) / self.spacing[1];
        let (umax, vmax) = ((self.nx - 1) as f64, (self.ny - 1) as f64);
        if !(0.0..=umax).contains(&u) || !(0.0..=vmax).contains(&v) {
            return Ok(self.outside);
        }
        let i = (u.floor() as usize).min(self.nx - 2);
        let j = (v.floor() as usize).min(self.ny - 2);
        let (fu, fv) = (u - i as f64, v - j as f64);
        let z00 = self.node(i, j);
        let z10 = self.node(i + 1, j);
        let z01 = self.node(i, j + 1);
        let z11 = self.node(i + 1, j + 1);
        Ok(z00 * (1.0 - fu) * (1.0 - fv)
            + z10 * fu * (1.0 - fv)
            + z01 * (1.0 - fu) * fv
            + z11 * fu * fv)
    }

    fn ray_step(&self) -> f64 {
        0.5 * self.spacing[0].min(self.spacing[1])
    }

    fn max_altitude(&self) -> Option<f64> {
        Some(self.ceiling)
    }
}

fn csv_error(code: &str, err: csv::Error, path: &Path) -> RetroError {
    RetroError::Io(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}
