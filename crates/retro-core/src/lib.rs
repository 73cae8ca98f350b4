#![deny(missing_docs)]

//! Core primitives shared by the RETRO crates: the structured error type,
//! the deterministic random number handle, physical constants of the tau
//! lepton and a handful of 3-vector helpers.

pub mod constants;
pub mod errors;
pub mod rng;
pub mod vector;

pub use errors::{ErrorInfo, RetroError};
pub use rng::{derive_substream_seed, RngHandle};
pub use vector::Vec3;
