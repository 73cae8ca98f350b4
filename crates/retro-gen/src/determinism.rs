use std::ffi::OsString;
use std::path::{Path, PathBuf};

use retro_core::derive_substream_seed;

const DECAY_STREAM: u64 = 0xDECA_1000;
const RESUME_STREAM: u64 = 0x5E5_0000;

/// Seed of the generator stream of a run. Shards of the same run draw from
/// disjoint streams; an unsharded run uses the master seed directly.
pub fn run_seed(master_seed: u64, shard: Option<u64>) -> u64 {
    match shard {
        Some(shard) => derive_substream_seed(master_seed, shard),
        None => master_seed,
    }
}

/// Seed handed to the decay engine of a run.
pub fn decay_seed(run_seed: u64) -> u64 {
    derive_substream_seed(run_seed, DECAY_STREAM)
}

/// Seed of a run that resumes a log already holding `logged` records.
///
/// A fresh log keeps the run seed. A resumed one moves to a stream keyed by
/// the record count, so appending never replays the events already written.
pub fn resume_seed(run_seed: u64, logged: u64) -> u64 {
    if logged == 0 {
        return run_seed;
    }
    derive_substream_seed(derive_substream_seed(run_seed, RESUME_STREAM), logged)
}

/// Log path of a shard: `events.json` becomes `events.json.K`.
pub fn shard_log_path(path: &Path, shard: Option<u64>) -> PathBuf {
    match shard {
        Some(shard) => {
            let mut name = OsString::from(path.as_os_str());
            name.push(format!(".{shard}"));
            PathBuf::from(name)
        }
        None => path.to_path_buf(),
    }
}
