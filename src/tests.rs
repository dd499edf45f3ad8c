//! Analytic derivatives against finite differences for every deterministic
//! model, alone and composed, at randomly drawn parameters and coordinates.

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::correlation::{FlatU2, InversePowerU2, PadeU2, PairPotential, PolynomialU2, TwoBodyJastrow};
use crate::wavefunction::{
    Capabilities, ConstNormGaussian1D1POrbital, Gaussian1D1POrbital, IsotropicGaussian,
    MultiComponentWaveFunction, QuadrExponential1D1POrbital, QuadrExponential1DNPOrbital,
    SymmetrizerWaveFunction, WaveFunction,
};

const HX: f64 = 1e-4;
const HP: f64 = 1e-6;
const N_TRIALS: usize = 20;
/// Points where any `|d1|` or `|d2|` exceeds this sit next to a node and are redrawn
const MAX_LOCAL_DERIVATIVE: f64 = 20.0;

const WIDTH_B: (f64, f64) = (0.3, 1.2);
const PADE_F: (f64, f64) = (0.5, 1.5);
const POLY_A: (f64, f64) = (-0.5, 0.5);
const POLY_B: (f64, f64) = (-0.1, 0.1);

/// Where and how far apart particles are drawn.
struct Region {
    n_space_dim: usize,
    half_width: f64,
    min_pair_distance: f64,
}

const LINE: Region = Region { n_space_dim: 1, half_width: 1.5, min_pair_distance: 0.3 };
const LINE_APART: Region = Region { n_space_dim: 1, half_width: 1.5, min_pair_distance: 0.8 };
const PLANE_APART: Region = Region { n_space_dim: 2, half_width: 1.5, min_pair_distance: 0.8 };

fn min_pair_distance(x: &[f64], n_space_dim: usize) -> f64 {
    let n_part = x.len() / n_space_dim;
    let mut min = f64::INFINITY;
    for i in 0..n_part {
        for j in i + 1..n_part {
            let r = (0..n_space_dim)
                .map(|c| (x[i * n_space_dim + c] - x[j * n_space_dim + c]).powi(2))
                .sum::<f64>()
                .sqrt();
            min = min.min(r);
        }
    }
    min
}

fn draw_point(rng: &mut StdRng, wf: &mut dyn WaveFunction, region: &Region) -> Vec<f64> {
    loop {
        let x: Vec<f64> =
            (0..wf.total_dim()).map(|_| rng.gen_range(-region.half_width..region.half_width)).collect();
        if min_pair_distance(&x, region.n_space_dim) < region.min_pair_distance {
            continue;
        }
        let d = wf.derivatives(&x);
        if d.d1.iter().chain(d.d2.iter()).all(|v| v.abs() <= MAX_LOCAL_DERIVATIVE) {
            return x;
        }
    }
}

fn assert_matches_finite_differences(wf: &mut dyn WaveFunction, x: &[f64]) {
    let vp0 = wf.vp();
    let analytic = wf.derivatives(x);
    let numeric = wf.numerical_derivatives(x, HX, HP).unwrap();
    assert_eq!(wf.vp(), vp0);
    assert!(analytic.is_finite());

    let caps = wf.capabilities();
    let ndim = wf.total_dim();
    let nvp = wf.n_vp();
    for i in 0..ndim {
        assert_relative_eq!(analytic.d1[i], numeric.d1[i], epsilon = 1e-5, max_relative = 1e-5);
        assert_relative_eq!(analytic.d2[i], numeric.d2[i], epsilon = 1e-4, max_relative = 1e-4);
    }
    if caps.vd1 {
        for p in 0..nvp {
            assert_relative_eq!(analytic.vd1[p], numeric.vd1[p], epsilon = 1e-5, max_relative = 1e-5);
        }
    }
    for i in 0..ndim {
        for p in 0..nvp {
            if caps.d1vd1 {
                assert_relative_eq!(analytic.d1vd1[(i, p)], numeric.d1vd1[(i, p)], epsilon = 1e-4, max_relative = 1e-4);
            }
            if caps.d2vd1 {
                assert_relative_eq!(analytic.d2vd1[(i, p)], numeric.d2vd1[(i, p)], epsilon = 1e-4, max_relative = 1e-4);
            }
        }
    }
}

/// Compare analytic and numerical derivatives at `N_TRIALS` random
/// parameter vectors (one range per parameter) and coordinates.
fn assert_matches_at_random_points(
    wf: &mut dyn WaveFunction,
    ranges: &[(f64, f64)],
    region: &Region,
    seed: u64,
) {
    assert_eq!(ranges.len(), wf.n_vp());
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..N_TRIALS {
        let vp: Vec<f64> = ranges.iter().map(|&(lo, hi)| rng.gen_range(lo..hi)).collect();
        wf.set_vp(&vp).unwrap();
        let x = draw_point(&mut rng, wf, region);
        assert_matches_finite_differences(wf, &x);
    }
}

fn assert_vp_round_trip(wf: &mut dyn WaveFunction) {
    let vp0 = wf.vp();
    let shifted: Vec<f64> = vp0.iter().map(|p| p + 0.125).collect();
    wf.set_vp(&shifted).unwrap();
    assert_eq!(wf.vp(), shifted);
    wf.set_vp(&vp0).unwrap();
    assert_eq!(wf.vp(), vp0);
}

fn child_1d3p() -> Box<dyn WaveFunction> {
    Box::new(QuadrExponential1DNPOrbital::new(vec![0.5, -0.25, 0.0], 0.9).unwrap())
}

/// Every pair potential with the ranges its parameters are drawn from.
fn potentials() -> Vec<(Box<dyn PairPotential>, Vec<(f64, f64)>)> {
    vec![
        (Box::new(PolynomialU2 { a: -0.3, b: 0.05 }), vec![POLY_A, POLY_B]),
        (Box::new(InversePowerU2 { b: 0.1 }), vec![(0.05, 0.2)]),
        (Box::new(FlatU2 { k: 0.4 }), vec![(-1.0, 1.0)]),
        (Box::new(PadeU2 { cusp_param: 0.8 }), vec![PADE_F]),
    ]
}

#[test]
fn test_quadr_exponential_1d1p_derivatives() {
    let mut wf = QuadrExponential1D1POrbital::new(0.2, 0.8);
    assert_matches_at_random_points(&mut wf, &[(-0.5, 0.5), WIDTH_B], &LINE, 1);
    assert_vp_round_trip(&mut wf);
}

#[test]
fn test_quadr_exponential_1dnp_derivatives() {
    let mut wf = QuadrExponential1DNPOrbital::new(vec![0.5, -0.25, 0.0], 0.9).unwrap();
    assert_matches_at_random_points(&mut wf, &[WIDTH_B], &LINE, 2);
    assert_vp_round_trip(&mut wf);
}

#[test]
fn test_gaussian_derivatives() {
    let mut wf = Gaussian1D1POrbital::new(0.6);
    assert_matches_at_random_points(&mut wf, &[WIDTH_B], &LINE, 3);
    assert_vp_round_trip(&mut wf);
}

#[test]
fn test_const_norm_gaussian_derivatives() {
    let mut wf = ConstNormGaussian1D1POrbital::new(1.3, true);
    assert_matches_at_random_points(&mut wf, &[(0.5, 1.5)], &LINE, 4);
    let mut wf = ConstNormGaussian1D1POrbital::new(1.3, false);
    assert_matches_at_random_points(&mut wf, &[(0.5, 1.5)], &LINE, 5);
}

#[test]
fn test_isotropic_gaussian_derivatives() {
    let mut wf = IsotropicGaussian::new(3, vec![0.1, -0.2], 0.7).unwrap();
    assert_matches_at_random_points(&mut wf, &[WIDTH_B], &PLANE_APART, 6);
    assert_vp_round_trip(&mut wf);
}

#[test]
fn test_jastrow_derivatives_for_every_potential() {
    for (seed, (u2, ranges)) in potentials().into_iter().enumerate() {
        let mut wf = TwoBodyJastrow::new(2, 3, u2).unwrap();
        assert_matches_at_random_points(&mut wf, &ranges, &PLANE_APART, 10 + seed as u64);
        assert_vp_round_trip(&mut wf);
    }
    for (seed, (u2, ranges)) in potentials().into_iter().enumerate() {
        let mut wf = TwoBodyJastrow::new(1, 3, u2).unwrap();
        assert_matches_at_random_points(&mut wf, &ranges, &LINE_APART, 20 + seed as u64);
    }
}

#[test]
fn test_symmetrizer_derivatives() {
    for antisymmetric in [false, true] {
        let mut wf = SymmetrizerWaveFunction::new(child_1d3p(), antisymmetric).unwrap();
        assert_matches_at_random_points(&mut wf, &[WIDTH_B], &LINE, 30);
        assert_vp_round_trip(&mut wf);

        let mut wf = SymmetrizerWaveFunction::pairwise(child_1d3p(), antisymmetric).unwrap();
        assert_matches_at_random_points(&mut wf, &[WIDTH_B], &LINE, 31);
    }
}

#[test]
fn test_multi_component_derivatives() {
    let mut wf = MultiComponentWaveFunction::new(2, 3, Capabilities::ALL).unwrap();
    wf.add_wave_function(Box::new(IsotropicGaussian::new(3, vec![0.1, -0.2], 0.7).unwrap())).unwrap();
    wf.add_wave_function(Box::new(TwoBodyJastrow::new(2, 3, Box::new(PadeU2 { cusp_param: 0.8 })).unwrap()))
        .unwrap();
    wf.add_wave_function(Box::new(
        TwoBodyJastrow::new(2, 3, Box::new(PolynomialU2 { a: -0.3, b: 0.05 })).unwrap(),
    ))
    .unwrap();
    assert_eq!(wf.n_vp(), 4);
    assert_matches_at_random_points(&mut wf, &[WIDTH_B, PADE_F, POLY_A, POLY_B], &PLANE_APART, 40);
    assert_vp_round_trip(&mut wf);
}

#[test]
fn test_antisymmetrized_orbital_times_jastrow() {
    let sym = SymmetrizerWaveFunction::new(child_1d3p(), true).unwrap();
    let jastrow = TwoBodyJastrow::new(1, 3, Box::new(PadeU2 { cusp_param: 0.8 })).unwrap();
    let mut wf = MultiComponentWaveFunction::new(1, 3, Capabilities::ALL).unwrap();
    wf.add_wave_function(Box::new(sym)).unwrap();
    wf.add_wave_function(Box::new(jastrow)).unwrap();
    assert_eq!(wf.n_vp(), 2);
    assert_eq!(wf.n_proto(), 3);
    assert_matches_at_random_points(&mut wf, &[WIDTH_B, PADE_F], &LINE, 50);
    assert_vp_round_trip(&mut wf);
}

#[test]
fn test_nested_multi_component() {
    let mut inner = MultiComponentWaveFunction::new(1, 3, Capabilities::ALL).unwrap();
    inner.add_wave_function(child_1d3p()).unwrap();
    inner.add_wave_function(Box::new(TwoBodyJastrow::new(1, 3, Box::new(FlatU2 { k: 0.4 })).unwrap())).unwrap();

    let mut outer = MultiComponentWaveFunction::new(1, 3, Capabilities::ALL).unwrap();
    outer.add_wave_function(Box::new(inner)).unwrap();
    outer
        .add_wave_function(Box::new(SymmetrizerWaveFunction::pairwise(child_1d3p(), false).unwrap()))
        .unwrap();
    assert_eq!(outer.n_vp(), 3);
    assert_matches_at_random_points(&mut outer, &[WIDTH_B, (-1.0, 1.0), WIDTH_B], &LINE, 60);
    assert_vp_round_trip(&mut outer);
}

#[test]
fn test_symmetrizer_of_product() {
    // permutations act on the whole product, Jastrow included
    let mut product = MultiComponentWaveFunction::new(1, 3, Capabilities::ALL).unwrap();
    product.add_wave_function(child_1d3p()).unwrap();
    product
        .add_wave_function(Box::new(
            TwoBodyJastrow::new(1, 3, Box::new(PolynomialU2 { a: -0.3, b: 0.05 })).unwrap(),
        ))
        .unwrap();
    let mut wf = SymmetrizerWaveFunction::new(Box::new(product), true).unwrap();
    assert_matches_at_random_points(&mut wf, &[WIDTH_B, POLY_A, POLY_B], &LINE, 70);
}

#[test]
fn test_reduced_capabilities_are_respected() {
    let mut wf = MultiComponentWaveFunction::new(1, 1, Capabilities::VD1).unwrap();
    wf.add_wave_function(Box::new(ConstNormGaussian1D1POrbital::new(1.1, true))).unwrap();
    wf.add_wave_function(Box::new(Gaussian1D1POrbital::new(0.4))).unwrap();
    let d = wf.derivatives(&[0.35]);
    assert_eq!(d.capabilities(), Capabilities::VD1);
    assert_eq!(d.d1vd1.ncols(), 0);
    assert_matches_at_random_points(&mut wf, &[(0.5, 1.5), WIDTH_B], &LINE, 80);
}
