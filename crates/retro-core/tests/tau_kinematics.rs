use retro_core::constants::{is_invisible, tau_decay_length, tau_momentum, TAU_CTAU, TAU_MASS};
use retro_core::vector::{advance, dot, norm, normalized, reversed, sub};

#[test]
fn decay_length_scales_with_energy() {
    let dl = tau_decay_length(1.0e9);
    assert!((dl - 1.0e9 * TAU_CTAU / TAU_MASS).abs() < 1e-6);
    assert!((dl / 49_064.0 - 1.0).abs() < 1e-3);
}

#[test]
fn momentum_vanishes_at_rest() {
    assert_eq!(tau_momentum(TAU_MASS), 0.0);
    assert_eq!(tau_momentum(0.5), 0.0);
    let p = tau_momentum(10.0);
    assert!((p * p - (100.0 - TAU_MASS * TAU_MASS)).abs() < 1e-9);
}

#[test]
fn neutrinos_and_muons_are_invisible() {
    for pid in [12, -12, 13, -13, 14, -14, 16, -16] {
        assert!(is_invisible(pid));
    }
    for pid in [11, -11, 111, 211, -211, 22, 15] {
        assert!(!is_invisible(pid));
    }
}

#[test]
fn vector_helpers() {
    let a = [3.0, 4.0, 0.0];
    assert_eq!(norm(&a), 5.0);
    assert_eq!(dot(&a, &[1.0, 1.0, 1.0]), 7.0);
    assert_eq!(sub(&a, &[1.0, 1.0, 1.0]), [2.0, 3.0, -1.0]);
    assert_eq!(advance(&[0.0; 3], &[0.0, 0.0, 1.0], 2.5), [0.0, 0.0, 2.5]);
    assert_eq!(reversed(&a), [-3.0, -4.0, -0.0]);
    let u = normalized(&a).unwrap();
    assert!((norm(&u) - 1.0).abs() < 1e-12);
    assert!(normalized(&[0.0; 3]).is_none());
}
