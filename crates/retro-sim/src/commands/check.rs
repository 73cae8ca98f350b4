use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use retro_gen::determinism::{run_seed, shard_log_path};
use retro_gen::manifest::card_hash;
use retro_gen::{RunCard, SamplingLoop};
use serde::Serialize;

use crate::{card_dir, write_json};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// YAML run card to validate.
    #[arg(long)]
    pub card: PathBuf,
    /// Shard index the report should describe.
    #[arg(long)]
    pub shard: Option<u64>,
    /// Also write the report to this JSON file.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    card_hash: String,
    models: usize,
    priors: Vec<f64>,
    energy_span: [f64; 2],
    antennas: Option<usize>,
    vertex_limit: Option<f64>,
    primaries: bool,
    run_seed: u64,
    log_path: PathBuf,
}

pub fn run(args: &CheckArgs) -> Result<(), Box<dyn Error>> {
    let card = RunCard::load(&args.card)?;
    let base_dir = card_dir(&args.card);
    let topography = card.topography.build(&base_dir)?;
    let sampler = SamplingLoop::from_card(&card, &base_dir, topography.as_ref())?;

    let report = CheckReport {
        card_hash: card_hash(&card)?,
        models: sampler.mixture().len(),
        priors: sampler.mixture().priors().to_vec(),
        energy_span: sampler.mixture().energy_span(),
        antennas: sampler.preselector().map(|p| p.antennas().len()),
        vertex_limit: card.selector.vertex.limit.filter(|limit| *limit > 0.0),
        primaries: card.primary.is_some(),
        run_seed: run_seed(card.seed_policy.master_seed, args.shard),
        log_path: shard_log_path(&base_dir.join(&card.logger.path), args.shard),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    if let Some(out) = &args.out {
        write_json(out, &report)?;
    }
    Ok(())
}
