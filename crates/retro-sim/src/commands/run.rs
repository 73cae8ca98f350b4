use std::error::Error;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::Args;
use retro_core::RngHandle;
use retro_gen::determinism::{decay_seed, resume_seed, run_seed, shard_log_path};
use retro_gen::{
    CommandPrimarySampler, DecayEngine, Engines, EventLog, PrimarySampler, ProcessDecayEngine,
    RunCard, RunManifest, SamplingLoop,
};
use tracing::{info, warn};

use crate::card_dir;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML run card describing the generation.
    #[arg(long)]
    pub card: PathBuf,
    /// Master seed overriding the one of the card.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Shard index. Shards draw from disjoint random streams and write to
    /// `<log>.K`.
    #[arg(long)]
    pub shard: Option<u64>,
    /// Extend an existing event log instead of truncating it.
    #[arg(long)]
    pub append: bool,
    /// Manifest destination, `<log>.manifest.json` by default.
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let mut card = RunCard::load(&args.card)?;
    if let Some(seed) = args.seed {
        card.seed_policy.master_seed = seed;
    }
    let base_dir = card_dir(&args.card);
    let topography = card.topography.build(&base_dir)?;
    let mut sampler = SamplingLoop::from_card(&card, &base_dir, topography.as_ref())?;

    let log_path = shard_log_path(&base_dir.join(&card.logger.path), args.shard);
    let mut log = if args.append {
        EventLog::open_append(&log_path)?
    } else {
        EventLog::create(&log_path)?
    };
    let seed = resume_seed(
        run_seed(card.seed_policy.master_seed, args.shard),
        log.records(),
    );

    let mut primary = match &card.primary {
        Some(config) => Some(CommandPrimarySampler::new(
            config,
            sampler.mixture().energy_span(),
        )?),
        None => None,
    };
    let mut decay =
        ProcessDecayEngine::initialise(&card.decay.command, &card.decay.args, decay_seed(seed))?;
    info!(
        card = %args.card.display(),
        shard = ?args.shard,
        seed,
        resumed = log.records(),
        log = %log_path.display(),
        "run configured"
    );

    let mut rng = RngHandle::from_seed(seed);
    let outcome = {
        let mut engines = Engines {
            decay: &mut decay,
            primary: primary.as_mut().map(|p| p as &mut dyn PrimarySampler),
        };
        sampler.run(&mut rng, &mut engines, &mut log)
    };
    // The engine is released even when the loop failed.
    let shutdown = decay.shutdown();
    let summary = outcome?;
    if let Err(err) = shutdown {
        warn!(error = %err, "decay engine did not exit cleanly");
        return Err(err.into());
    }

    let manifest_path = args
        .manifest
        .clone()
        .unwrap_or_else(|| default_manifest_path(&log_path));
    RunManifest::new(&card, args.shard, seed, &log_path, summary)?.write(&manifest_path)?;
    info!(manifest = %manifest_path.display(), "wrote run manifest");
    Ok(())
}

fn default_manifest_path(log: &Path) -> PathBuf {
    let mut name = OsString::from(log.as_os_str());
    name.push(".manifest.json");
    PathBuf::from(name)
}
