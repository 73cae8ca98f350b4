mod common;

use std::fs;

use proptest::prelude::*;
use retro_gen::config::{AntennaConfig, ConeModel};
use retro_gen::preselector::load_layout;
use retro_gen::{Antenna, AntennaPreselector};
use retro_topo::{GridTopography, LocalFrame};

use common::flat_ground;

const HORIZONTAL: [f64; 3] = [1.0, 0.0, 0.0];

fn preselector(antennas: Vec<Antenna>, shadowing: bool) -> AntennaPreselector {
    AntennaPreselector::new(antennas, ConeModel::ThreeDegrees, true, shadowing)
}

/// Flat ground with a 2 km high ridge between x = 20 km and x = 22 km.
fn ridge() -> GridTopography {
    let row: Vec<f64> = (0..=40)
        .map(|i| if (20..=22).contains(&i) { 2000.0 } else { 0.0 })
        .collect();
    GridTopography::new(
        LocalFrame::new(45.0, 3.0),
        [0.0, -50e3],
        [1000.0, 100e3],
        vec![row.clone(), row],
        0.0,
    )
    .unwrap()
}

#[test]
fn on_axis_antenna_is_selected() {
    let antenna = Antenna::at([30e3, 0.0, 1000.0]);
    let selected = preselector(vec![antenna.clone()], true)
        .select(&flat_ground(), 1e9, &[0.0, 0.0, 1000.0], &HORIZONTAL)
        .unwrap();
    assert_eq!(selected, vec![antenna]);
}

#[test]
fn antennas_outside_the_cone_are_dropped() {
    let antennas = vec![
        // Before the cone start.
        Antenna::at([10e3, 0.0, 1000.0]),
        // Beyond the cone end (220 km at 1 EeV).
        Antenna::at([230e3, 0.0, 1000.0]),
        // Off axis: the cone radius is about 840 m at 30 km.
        Antenna::at([30e3, 3000.0, 1000.0]),
        // Behind the vertex.
        Antenna::at([-30e3, 0.0, 1000.0]),
    ];
    let selected = preselector(antennas, false)
        .select(&flat_ground(), 1e9, &[0.0, 0.0, 1000.0], &HORIZONTAL)
        .unwrap();
    assert!(selected.is_empty());
}

#[test]
fn antenna_behind_a_ridge_is_shadowed() {
    let topography = ridge();
    let antenna = Antenna::at([30e3, 0.0, 1000.0]);
    let vertex = [0.0, 0.0, 1000.0];
    let shadowed = preselector(vec![antenna.clone()], true)
        .select(&topography, 1e9, &vertex, &HORIZONTAL)
        .unwrap();
    assert!(shadowed.is_empty());
    let unchecked = preselector(vec![antenna.clone()], false)
        .select(&topography, 1e9, &vertex, &HORIZONTAL)
        .unwrap();
    assert_eq!(unchecked, vec![antenna]);
}

#[test]
fn shower_developing_underground_selects_nothing() {
    let elevation = -10f64.to_radians();
    let direction = [elevation.cos(), 0.0, elevation.sin()];
    let antenna = Antenna::at([30e3 * direction[0], 0.0, 10.0 + 30e3 * direction[2]]);
    let with_xmax =
        AntennaPreselector::new(vec![antenna.clone()], ConeModel::ThreeDegrees, true, false);
    let selected = with_xmax
        .select(&flat_ground(), 1e9, &[0.0, 0.0, 10.0], &direction)
        .unwrap();
    assert!(selected.is_empty());
    let without_xmax =
        AntennaPreselector::new(vec![antenna.clone()], ConeModel::ThreeDegrees, false, false);
    let selected = without_xmax
        .select(&flat_ground(), 1e9, &[0.0, 0.0, 10.0], &direction)
        .unwrap();
    assert_eq!(selected, vec![antenna]);
}

#[test]
fn aggressive_cone_opens_with_energy() {
    let aggressive = AntennaPreselector::new(Vec::new(), ConeModel::Aggressive, true, true);
    assert!((aggressive.cone_angle(1e8) - 0.9).abs() < 1e-12);
    assert!(aggressive.cone_angle(1e11) > aggressive.cone_angle(1e9));
    assert_eq!(aggressive.cone_angle(1.0), 0.0);
    assert_eq!(preselector(Vec::new(), true).cone_angle(1e11), 3.0);
}

#[test]
fn layout_keeps_extra_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("antennas.json");
    fs::write(&path, "[[0, 0, 1000, 0.5, 12], [100, 200, 1500]]").unwrap();
    let antennas = load_layout(&path).unwrap();
    assert_eq!(antennas.len(), 2);
    assert_eq!(antennas[0].position(), [0.0, 0.0, 1000.0]);
    assert_eq!(antennas[0].values(), &[0.0, 0.0, 1000.0, 0.5, 12.0]);
    assert_eq!(serde_json::to_string(&antennas[1]).unwrap(), "[100.0,200.0,1500.0]");
}

#[test]
fn malformed_layouts_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty.json");
    fs::write(&empty, "[]").unwrap();
    assert_eq!(load_layout(&empty).unwrap_err().info().code, "empty-layout");
    let short = dir.path().join("short.json");
    fs::write(&short, "[[0, 0]]").unwrap();
    assert_eq!(load_layout(&short).unwrap_err().info().code, "invalid-antenna");
}

#[test]
fn disabled_preselection_builds_nothing() {
    let config = AntennaConfig {
        enabled: false,
        ..AntennaConfig::default()
    };
    assert!(AntennaPreselector::from_config(&config, None).unwrap().is_none());
    let err = AntennaPreselector::from_config(&AntennaConfig::default(), None).unwrap_err();
    assert_eq!(err.info().code, "missing-antenna-layout");
}

proptest! {
    #[test]
    fn on_axis_antennas_inside_the_cone_are_always_selected(distance in 14_500.0f64..200e3) {
        let antenna = Antenna::at([distance, 0.0, 1000.0]);
        let selected = preselector(vec![antenna], true)
            .select(&flat_ground(), 1e9, &[0.0, 0.0, 1000.0], &HORIZONTAL)
            .unwrap();
        prop_assert_eq!(selected.len(), 1);
    }
}
