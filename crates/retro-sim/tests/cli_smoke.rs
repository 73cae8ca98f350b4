#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Output};

const ENGINE: &str = r#"#!/bin/sh
while read line; do
  echo '{"code":0,"products":[[-211,[0,0,1e12]],[16,[0,0,1]]],"state":7}'
done
"#;

fn write_fixture(dir: &Path, requested: u64) -> std::path::PathBuf {
    let engine = dir.join("engine.sh");
    fs::write(&engine, ENGINE).unwrap();
    fs::set_permissions(&engine, fs::Permissions::from_mode(0o755)).unwrap();
    let card = dir.join("card.yaml");
    fs::write(
        &card,
        format!(
            r#"
generator:
  - position: {{ range: [[0, 100], [0, 100], [0, 50]] }}
    direction: {{ model: linear, range: {{ zenith: [91, 100] }} }}
    energy: {{ model: "1/E", range: [1.0e8, 1.0e10] }}
processor: {{ requested: {requested}, trials: 10000 }}
selector:
  antenna: {{ enabled: false }}
logger: {{ path: out/events.json }}
topography: {{ latitude: 42.1, longitude: 86.3 }}
decay: {{ command: "{}" }}
seed_policy: {{ master_seed: 77 }}
"#,
            engine.display()
        ),
    )
    .unwrap();
    card
}

fn retro_sim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_retro-sim"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run retro-sim")
}

fn lines(output: &Output) -> Vec<String> {
    String::from_utf8(output.stdout.clone())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn run_writes_a_sharded_log_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let card = write_fixture(dir.path(), 3);
    let card = card.to_str().unwrap();

    let output = retro_sim(&["run", "--card", card, "--shard", "1"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let log = dir.path().join("out/events.json.1");
    assert_eq!(fs::read_to_string(&log).unwrap().lines().count(), 3);
    let manifest: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("out/events.json.1.manifest.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest["summary"]["events"], 3);
    assert_eq!(manifest["shard"], 1);
    assert_eq!(manifest["master_seed"], 77);

    let log = log.to_str().unwrap();
    let forward = lines(&retro_sim(&["events", "--log", log, "--tags"]));
    let mut backward = lines(&retro_sim(&["events", "--log", log, "--tags", "--reverse"]));
    assert_eq!(forward.len(), 3);
    assert!(forward.iter().all(|tag| tag.starts_with("E.") && tag.ends_with("_D.7")));
    backward.reverse();
    assert_eq!(forward, backward);

    let limited = lines(&retro_sim(&["events", "--log", log, "--limit", "1"]));
    assert_eq!(limited.len(), 1);
    let record: serde_json::Value = serde_json::from_str(&limited[0]).unwrap();
    assert_eq!(record["previous"], -1);
}

#[test]
fn append_extends_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let card = write_fixture(dir.path(), 2);
    let card = card.to_str().unwrap();

    assert!(retro_sim(&["run", "--card", card]).status.success());
    assert!(retro_sim(&["run", "--card", card, "--append"]).status.success());

    let log = dir.path().join("out/events.json");
    let records = lines(&retro_sim(&["events", "--log", log.to_str().unwrap(), "--reverse"]));
    assert_eq!(records.len(), 4);
    let last: serde_json::Value = serde_json::from_str(&records[0]).unwrap();
    assert!(last["previous"].as_i64().unwrap() > 0);
}

#[test]
fn appending_with_the_same_seed_draws_new_events() {
    let dir = tempfile::tempdir().unwrap();
    let card = write_fixture(dir.path(), 2);
    let card = card.to_str().unwrap();

    assert!(retro_sim(&["run", "--card", card]).status.success());
    assert!(retro_sim(&["run", "--card", card, "--append"]).status.success());

    let log = dir.path().join("out/events.json");
    let records: Vec<serde_json::Value> = lines(&retro_sim(&[
        "events",
        "--log",
        log.to_str().unwrap(),
    ]))
    .iter()
    .map(|line| serde_json::from_str(line).unwrap())
    .collect();
    assert_eq!(records.len(), 4);
    for old in &records[..2] {
        for new in &records[2..] {
            assert_ne!(old["tau_at_decay"]["position"], new["tau_at_decay"]["position"]);
        }
    }
    let manifest: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("out/events.json.manifest.json")).unwrap(),
    )
    .unwrap();
    assert_ne!(manifest["run_seed"], 77);
}

#[test]
fn check_reports_the_card() {
    let dir = tempfile::tempdir().unwrap();
    let card = write_fixture(dir.path(), 3);
    let out = dir.path().join("check.json");

    let output = retro_sim(&[
        "check",
        "--card",
        card.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(report["models"], 1);
    assert_eq!(report["run_seed"], 77);
    assert!(report["antennas"].is_null());
    assert!(!dir.path().join("out").exists());
}

#[test]
fn invalid_cards_fail() {
    let dir = tempfile::tempdir().unwrap();
    let card = dir.path().join("card.yaml");
    fs::write(&card, "generator: []\nlogger: { path: e.json }\n").unwrap();
    let output = retro_sim(&["check", "--card", card.to_str().unwrap()]);
    assert!(!output.status.success());
}
