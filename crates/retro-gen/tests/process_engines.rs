#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use retro_core::constants::TAU_PID;
use retro_gen::config::PrimaryConfig;
use retro_gen::{
    decay_tau, CommandPrimarySampler, DecayEngine, PrimaryRequest, PrimarySampler,
    PrimaryWeighting, ProcessDecayEngine,
};
use retro_topo::Geodetic;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn command(path: &Path) -> String {
    path.display().to_string()
}

fn request() -> PrimaryRequest {
    PrimaryRequest {
        pid: TAU_PID,
        energy: 1e9,
        position: [0.0, 0.0, 1500.0],
        geodetic: Geodetic {
            latitude: 42.1,
            longitude: 86.3,
            altitude: 1500.0,
        },
        zenith: 92.0,
        azimuth: 45.0,
    }
}

fn primary_config(command: String, requested: Option<u64>) -> PrimaryConfig {
    PrimaryConfig {
        events: 100,
        requested,
        longitudinal: true,
        command,
        args: Vec::new(),
    }
}

const WRITE_OUTPUT: &str = r#"out=$(sed -n 's/.*"output-file":"\([^"]*\)".*/\1/p' "$1")"#;

#[test]
fn decay_engine_answers_line_by_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(
        dir.path(),
        "engine.sh",
        r#"while read line; do echo '{"code":0,"products":[[211,[0,0,1]],[16,[0,0,2]]],"state":7}'; done"#,
    );
    let mut engine = ProcessDecayEngine::initialise(&command(&path), &[], 42).unwrap();
    for _ in 0..3 {
        let outcome = engine.decay(TAU_PID, &[0.0, 0.0, 3.0], &[0.0, 0.0, 1.0]).unwrap();
        assert_eq!(outcome.state, 7);
        assert_eq!(outcome.products.len(), 2);
        assert_eq!(outcome.products[0].pid, 211);
        assert_eq!(outcome.products[1].momentum, [0.0, 0.0, 2.0]);
    }
    let decay = decay_tau(&mut engine, 10.0, &[0.0, 0.0, 1.0], 5).unwrap();
    assert_eq!(decay.attempts, 1);
    assert!((decay.shower_energy - 1.0).abs() < 1e-12);

    engine.shutdown().unwrap();
    let err = engine.decay(TAU_PID, &[0.0, 0.0, 3.0], &[0.0, 0.0, 1.0]).unwrap_err();
    assert_eq!(err.info().code, "engine-closed");
    engine.shutdown().unwrap();
}

#[test]
fn decay_engine_receives_the_seed() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(
        dir.path(),
        "engine.sh",
        r#"[ "$1" = "--verbose" ] && [ "$2" = "--seed" ] || exit 3
while read line; do echo "{\"code\":0,\"products\":[],\"state\":$3}"; done"#,
    );
    let args = vec!["--verbose".to_string()];
    let mut engine = ProcessDecayEngine::initialise(&command(&path), &args, 1234).unwrap();
    let outcome = engine.decay(TAU_PID, &[0.0, 0.0, 3.0], &[0.0, 0.0, 1.0]).unwrap();
    assert_eq!(outcome.state, 1234);
    assert!(outcome.products.is_empty());
    engine.shutdown().unwrap();
}

#[test]
fn decay_engine_failures_carry_the_engine_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(
        dir.path(),
        "engine.sh",
        r#"read line; echo '{"code":5,"message":"bad polarisation"}'; exit 2"#,
    );
    let mut engine = ProcessDecayEngine::initialise(&command(&path), &[], 1).unwrap();
    let err = engine.decay(TAU_PID, &[0.0, 0.0, 3.0], &[0.0, 0.0, 1.0]).unwrap_err();
    assert_eq!(err.info().code, "engine-failure");
    assert_eq!(err.info().message, "bad polarisation");
    assert_eq!(err.info().context["engine_code"], "5");

    let err = engine.shutdown().unwrap_err();
    assert_eq!(err.info().code, "engine-exit");
}

#[test]
fn decay_engine_reports_garbage_and_missing_commands() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(dir.path(), "engine.sh", "read line; echo 'not json'");
    let mut engine = ProcessDecayEngine::initialise(&command(&path), &[], 1).unwrap();
    let err = engine.decay(TAU_PID, &[0.0, 0.0, 3.0], &[0.0, 0.0, 1.0]).unwrap_err();
    assert_eq!(err.info().code, "engine-response");
    drop(engine);

    let missing = dir.path().join("no-such-engine");
    let err = ProcessDecayEngine::initialise(&command(&missing), &[], 1).unwrap_err();
    assert_eq!(err.info().code, "engine-spawn");
}

#[test]
fn primaries_are_read_and_reweighted() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!(
        r#"{WRITE_OUTPUT}
echo '{{"id":3,"weight":2.0,"energy":5e9,"generation":1,"position":[1,2,3]}}' > "$out"
echo '{{"id":9,"weight":4.0,"energy":8e9,"generation":2,"position":[4,5,6]}}' >> "$out""#
    );
    let path = script(dir.path(), "backward.sh", &body);
    let span = [1e8, 1e10];
    let mut sampler =
        CommandPrimarySampler::new(&primary_config(command(&path), Some(2)), span).unwrap();
    let batch = sampler.sample(&request()).unwrap();

    let wd = PrimaryWeighting::new(span).decay_weight(1e9);
    assert_eq!(batch.primaries.len(), 2);
    assert!((batch.primaries[0].weight - 2.0 * wd).abs() <= 1e-12 * wd);
    assert!((batch.primaries[1].weight - 4.0 * wd).abs() <= 1e-12 * wd);
    assert_eq!(batch.primaries[1].generation, 2);
    assert_eq!(batch.primaries[1].position, [4.0, 5.0, 6.0]);
    // Early stop after the requested primaries: trials end at the last id.
    assert_eq!(batch.trials, 10);

    // The output of a previous vertex is never replayed.
    let batch = sampler.sample(&request()).unwrap();
    assert_eq!(batch.primaries.len(), 2);
}

#[test]
fn partial_primary_batches_count_every_event() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!(
        r#"{WRITE_OUTPUT}
echo '{{"id":41,"weight":1.0,"energy":5e9,"generation":1,"position":[0,0,0]}}' > "$out""#
    );
    let path = script(dir.path(), "backward.sh", &body);
    let mut sampler =
        CommandPrimarySampler::new(&primary_config(command(&path), Some(5)), [1e8, 1e10])
            .unwrap();
    let batch = sampler.sample(&request()).unwrap();
    assert_eq!(batch.primaries.len(), 1);
    assert_eq!(batch.trials, 100);
}

#[test]
fn missing_primary_output_is_an_empty_batch() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(dir.path(), "backward.sh", "exit 0");
    let mut sampler =
        CommandPrimarySampler::new(&primary_config(command(&path), None), [1e8, 1e10]).unwrap();
    let batch = sampler.sample(&request()).unwrap();
    assert!(batch.primaries.is_empty());
    assert_eq!(batch.trials, 100);
}

#[test]
fn primary_command_errors_abort() {
    let dir = tempfile::tempdir().unwrap();
    let noisy = script(dir.path(), "noisy.sh", "echo 'geometry error' >&2");
    let mut sampler =
        CommandPrimarySampler::new(&primary_config(command(&noisy), None), [1e8, 1e10]).unwrap();
    let err = sampler.sample(&request()).unwrap_err();
    assert_eq!(err.info().code, "primary-stderr");
    assert_eq!(err.info().message, "geometry error");

    let failing = script(dir.path(), "failing.sh", "exit 4");
    let mut sampler =
        CommandPrimarySampler::new(&primary_config(command(&failing), None), [1e8, 1e10])
            .unwrap();
    let err = sampler.sample(&request()).unwrap_err();
    assert_eq!(err.info().code, "primary-exit");
}
