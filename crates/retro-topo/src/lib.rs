//! Terrain models queried by the RETRO generator.
//!
//! The generator only talks to terrain through the [`Topography`] trait. Two
//! models are provided: a [`FlatTopography`] at constant altitude and a
//! [`GridTopography`] interpolating a regular height map.

mod config;
mod flat;
mod frame;
mod grid;
mod topography;

pub use config::{TopographyConfig, TopographyModel};
pub use flat::FlatTopography;
pub use frame::{Geodetic, LocalFrame, EARTH_RADIUS};
pub use grid::GridTopography;
pub use topography::{march_below_ground, Topography, DEFAULT_RAY_STEP};
