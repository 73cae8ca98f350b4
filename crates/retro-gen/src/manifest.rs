use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use retro_core::{ErrorInfo, RetroError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::RunCard;
use crate::processor::RunSummary;

/// Record of a completed run, written next to its event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Run card used for the run.
    pub card: RunCard,
    /// SHA-256 of the canonical JSON form of the card.
    pub card_hash: String,
    /// Master seed of the card.
    pub master_seed: u64,
    /// Seed label captured from the card.
    pub seed_label: Option<String>,
    /// Shard index, if any.
    pub shard: Option<u64>,
    /// Seed of the generator stream.
    pub run_seed: u64,
    /// Event log written by the run.
    pub log_path: PathBuf,
    /// Loop counters.
    pub summary: RunSummary,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl RunManifest {
    /// Assembles the manifest of a run.
    pub fn new(
        card: &RunCard,
        shard: Option<u64>,
        run_seed: u64,
        log_path: &Path,
        summary: RunSummary,
    ) -> Result<Self, RetroError> {
        Ok(Self {
            card_hash: card_hash(card)?,
            card: card.clone(),
            master_seed: card.seed_policy.master_seed,
            seed_label: card.seed_policy.label.clone(),
            shard,
            run_seed,
            log_path: log_path.to_path_buf(),
            summary,
            created_at: Utc::now().to_rfc3339(),
        })
    }

    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), RetroError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| RetroError::io("manifest-mkdir", &err, parent))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            RetroError::Serde(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| RetroError::io("manifest-write", &err, path))
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, RetroError> {
        let contents =
            fs::read_to_string(path).map_err(|err| RetroError::io("manifest-read", &err, path))?;
        serde_json::from_str(&contents).map_err(|err| {
            RetroError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// Hex encoded SHA-256 of the canonical JSON form of a run card.
pub fn card_hash(card: &RunCard) -> Result<String, RetroError> {
    let bytes = serde_json::to_vec(card)
        .map_err(|err| RetroError::Serde(ErrorInfo::new("card-serialize", err.to_string())))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
