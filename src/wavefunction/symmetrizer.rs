//! Permutation (anti)symmetrization of an arbitrary wave function.
//!
//! `Psi(x) = 1/|S| sum_{p in S} sign(p) psi(P x)` over a permutation set `S`.
//! The full set holds all `N!` particle permutations, so evaluation costs at
//! least `N!` child evaluations; this is only usable for a handful of
//! particles. The pairwise set keeps the identity plus the `N - 1` adjacent
//! transpositions and is a cheap, approximate symmetrization.
//!
//! Every "divided by value" derivative of a linear combination is the
//! weighted sum of the child's, with weights `sign(p) psi(P x) / Psi(x)`.

use super::derivatives::{Capabilities, Derivatives};
use super::traits::WaveFunction;
use crate::error::{Result, VmcError};

/// Default relative threshold below which `|Psi|` counts as a node.
pub const NODE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymmetrizerKind {
    /// All N! permutations.
    Full,
    /// Identity plus adjacent-pair swaps.
    Pairwise,
}

/// Particle permutation: particle `k` of the permuted configuration is
/// particle `map[k]` of the original one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    pub map: Vec<usize>,
    pub inverse: Vec<usize>,
    pub odd: bool,
}

impl Permutation {
    fn new(map: Vec<usize>, odd: bool) -> Self {
        let mut inverse = vec![0; map.len()];
        for (k, &a) in map.iter().enumerate() {
            inverse[a] = k;
        }
        Self { map, inverse, odd }
    }

    fn identity(n: usize) -> Self {
        Self::new((0..n).collect(), false)
    }

    /// Write `P x` into `out`.
    pub fn apply(&self, x: &[f64], n_space_dim: usize, out: &mut [f64]) {
        for (k, &a) in self.map.iter().enumerate() {
            out[k * n_space_dim..(k + 1) * n_space_dim]
                .copy_from_slice(&x[a * n_space_dim..(a + 1) * n_space_dim]);
        }
    }
}

/// All permutations of `n` particles with their parity (Heap's algorithm:
/// consecutive permutations differ by one transposition).
pub fn all_permutations(n: usize) -> Vec<Permutation> {
    let mut perm: Vec<usize> = (0..n).collect();
    let mut odd = false;
    let mut out = vec![Permutation::new(perm.clone(), odd)];
    let mut c = vec![0usize; n];
    let mut i = 1;
    while i < n {
        if c[i] < i {
            if i % 2 == 0 {
                perm.swap(0, i);
            } else {
                perm.swap(c[i], i);
            }
            odd = !odd;
            out.push(Permutation::new(perm.clone(), odd));
            c[i] += 1;
            i = 1;
        } else {
            c[i] = 0;
            i += 1;
        }
    }
    out
}

/// Identity plus the `n - 1` adjacent transpositions.
pub fn adjacent_pair_permutations(n: usize) -> Vec<Permutation> {
    let mut out = vec![Permutation::identity(n)];
    for k in 0..n.saturating_sub(1) {
        let mut map: Vec<usize> = (0..n).collect();
        map.swap(k, k + 1);
        out.push(Permutation::new(map, true));
    }
    out
}

/// Symmetrizer or antisymmetrizer wrapped around a child wave function.
///
/// Proto-values are `[Psi, scale]` where `scale` is the mean absolute
/// contribution, used to recognise nodes relative to the terms that cancel.
pub struct SymmetrizerWaveFunction {
    wf: Box<dyn WaveFunction>,
    antisymmetric: bool,
    kind: SymmetrizerKind,
    perms: Vec<Permutation>,
    node_tolerance: f64,
    xperm: Vec<f64>,
    child_proto: Vec<f64>,
    child_values: Vec<f64>,
    child_derivs: Derivatives,
}

impl SymmetrizerWaveFunction {
    /// Full (anti)symmetrizer over all `N!` permutations.
    pub fn new(wf: Box<dyn WaveFunction>, antisymmetric: bool) -> Result<Self> {
        let perms = all_permutations(wf.n_part());
        Self::with_permutations(wf, antisymmetric, SymmetrizerKind::Full, perms)
    }

    /// Pair (anti)symmetrizer over adjacent-pair swaps.
    pub fn pairwise(wf: Box<dyn WaveFunction>, antisymmetric: bool) -> Result<Self> {
        let perms = adjacent_pair_permutations(wf.n_part());
        Self::with_permutations(wf, antisymmetric, SymmetrizerKind::Pairwise, perms)
    }

    fn with_permutations(
        wf: Box<dyn WaveFunction>,
        antisymmetric: bool,
        kind: SymmetrizerKind,
        perms: Vec<Permutation>,
    ) -> Result<Self> {
        wf.capabilities().validate()?;
        if wf.n_part() == 0 {
            return Err(VmcError::Construction("cannot symmetrize zero particles".into()));
        }
        let child_derivs = wf.new_derivatives();
        Ok(Self {
            xperm: vec![0.0; wf.total_dim()],
            child_proto: vec![0.0; wf.n_proto()],
            child_values: vec![0.0; perms.len()],
            wf,
            antisymmetric,
            kind,
            perms,
            node_tolerance: NODE_TOLERANCE,
            child_derivs,
        })
    }

    pub fn with_node_tolerance(mut self, tol: f64) -> Self {
        self.node_tolerance = tol;
        self
    }

    pub fn is_antisymmetric(&self) -> bool {
        self.antisymmetric
    }

    pub fn kind(&self) -> SymmetrizerKind {
        self.kind
    }

    pub fn n_permutations(&self) -> usize {
        self.perms.len()
    }

    fn sign(&self, perm: &Permutation) -> f64 {
        if self.antisymmetric && perm.odd { -1.0 } else { 1.0 }
    }

    fn is_node(&self, proto: &[f64]) -> bool {
        proto[0].abs() <= self.node_tolerance * proto[1]
    }

    /// Child values at every permuted configuration, returns `(Psi, scale)`.
    fn evaluate_permutations(&mut self, x: &[f64]) -> (f64, f64) {
        let d = self.wf.n_space_dim();
        let mut sum = 0.0;
        let mut scale = 0.0;
        for (ip, perm) in self.perms.iter().enumerate() {
            perm.apply(x, d, &mut self.xperm);
            self.wf.proto_function(&self.xperm, &mut self.child_proto);
            let v = self.wf.wf_value(&self.child_proto);
            self.child_values[ip] = v;
            let s = if self.antisymmetric && perm.odd { -1.0 } else { 1.0 };
            sum += s * v;
            scale += v.abs();
        }
        let norm = self.perms.len() as f64;
        (sum / norm, scale / norm)
    }
}

impl WaveFunction for SymmetrizerWaveFunction {
    fn n_space_dim(&self) -> usize {
        self.wf.n_space_dim()
    }

    fn n_part(&self) -> usize {
        self.wf.n_part()
    }

    fn n_vp(&self) -> usize {
        self.wf.n_vp()
    }

    fn n_proto(&self) -> usize {
        2
    }

    fn capabilities(&self) -> Capabilities {
        self.wf.capabilities()
    }

    fn set_vp(&mut self, vp: &[f64]) -> Result<()> {
        self.wf.set_vp(vp)
    }

    fn get_vp(&self, vp: &mut [f64]) {
        self.wf.get_vp(vp)
    }

    fn proto_function(&mut self, x: &[f64], proto: &mut [f64]) {
        let (psi, scale) = self.evaluate_permutations(x);
        proto[0] = psi;
        proto[1] = scale;
    }

    fn acceptance(&self, proto_old: &[f64], proto_new: &[f64]) -> Result<f64> {
        if self.is_node(proto_old) {
            if self.is_node(proto_new) {
                return Ok(1.0);
            }
            return Err(VmcError::Numerical(format!(
                "acceptance ratio from a node: old = {:e}, new = {:e}",
                proto_old[0], proto_new[0]
            )));
        }
        let ratio = proto_new[0] / proto_old[0];
        Ok(ratio * ratio)
    }

    fn wf_value(&self, proto: &[f64]) -> f64 {
        proto[0]
    }

    fn compute_all_derivatives(&mut self, x: &[f64], out: &mut Derivatives) {
        let d = self.wf.n_space_dim();
        let npart = self.wf.n_part();
        let nvp = self.wf.n_vp();
        let caps = self.wf.capabilities();
        out.reset(d * npart, nvp, caps);

        let (psi, _) = self.evaluate_permutations(x);
        let norm = self.perms.len() as f64;

        for ip in 0..self.perms.len() {
            let perm = &self.perms[ip];
            let w = self.sign(perm) * self.child_values[ip] / (norm * psi);
            perm.apply(x, d, &mut self.xperm);
            self.wf.compute_all_derivatives(&self.xperm, &mut self.child_derivs);
            let cd = &self.child_derivs;

            for a in 0..npart {
                let k = perm.inverse[a];
                for c in 0..d {
                    let i = a * d + c;
                    let j = k * d + c;
                    out.d1[i] += w * cd.d1[j];
                    out.d2[i] += w * cd.d2[j];
                    for p in 0..out.d1vd1.ncols() {
                        out.d1vd1[(i, p)] += w * cd.d1vd1[(j, p)];
                    }
                    for p in 0..out.d2vd1.ncols() {
                        out.d2vd1[(i, p)] += w * cd.d2vd1[(j, p)];
                    }
                }
            }
            for p in 0..out.vd1.len() {
                out.vd1[p] += w * cd.vd1[p];
            }
        }
    }

    fn new_to_old(&mut self) {
        self.wf.new_to_old();
    }

    fn old_to_new(&mut self) {
        self.wf.old_to_new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavefunction::orbitals::QuadrExponential1DNPOrbital;

    fn child() -> Box<dyn WaveFunction> {
        Box::new(QuadrExponential1DNPOrbital::new(vec![0.5, -0.25, 0.0], 0.9).unwrap())
    }

    #[test]
    fn test_permutation_count_and_parity() {
        let perms = all_permutations(4);
        assert_eq!(perms.len(), 24);
        assert_eq!(perms.iter().filter(|p| p.odd).count(), 12);
        let mut maps: Vec<_> = perms.iter().map(|p| p.map.clone()).collect();
        maps.sort();
        maps.dedup();
        assert_eq!(maps.len(), 24);

        let pairs = adjacent_pair_permutations(3);
        assert_eq!(pairs.len(), 3);
        assert!(pairs[1].odd && pairs[2].odd && !pairs[0].odd);
    }

    #[test]
    fn test_parity_matches_inversion_count() {
        for perm in all_permutations(4) {
            let inversions = (0..4)
                .flat_map(|i| ((i + 1)..4).map(move |j| (i, j)))
                .filter(|&(i, j)| perm.map[i] > perm.map[j])
                .count();
            assert_eq!(perm.odd, inversions % 2 == 1);
        }
    }

    #[test]
    fn test_swap_changes_sign_of_antisymmetric_proto() {
        let mut sym = SymmetrizerWaveFunction::new(child(), false).unwrap();
        let mut asym = SymmetrizerWaveFunction::new(child(), true).unwrap();
        let mut nosym = child();

        let x = [0.2, -0.5, 0.7];
        let x_swap = [-0.5, 0.2, 0.7];
        let mut p0 = [0.0; 2];
        let mut p1 = [0.0; 2];

        asym.proto_function(&x, &mut p0);
        asym.proto_function(&x_swap, &mut p1);
        assert!((p0[0] + p1[0]).abs() < 1e-7);
        assert!(p0[0].abs() > 1e-7);

        sym.proto_function(&x, &mut p0);
        sym.proto_function(&x_swap, &mut p1);
        assert!((p0[0] - p1[0]).abs() < 1e-7);

        assert!((nosym.value(&x) - nosym.value(&x_swap)).abs() > 1e-7);
    }

    #[test]
    fn test_every_permutation_respects_parity() {
        let mut asym = SymmetrizerWaveFunction::new(child(), true).unwrap();
        let x = [0.2, -0.5, 0.7];
        let mut p0 = [0.0; 2];
        asym.proto_function(&x, &mut p0);
        for perm in all_permutations(3) {
            let mut xp = [0.0; 3];
            perm.apply(&x, 1, &mut xp);
            let mut p1 = [0.0; 2];
            asym.proto_function(&xp, &mut p1);
            let expected = if perm.odd { -p0[0] } else { p0[0] };
            assert!((p1[0] - expected).abs() < 1e-7);
        }
    }

    #[test]
    fn test_node_acceptance() {
        let mut asym = SymmetrizerWaveFunction::new(child(), true).unwrap();
        let mut node = [0.0; 2];
        let mut off_node = [0.0; 2];
        // two particles at the same position: exact cancellation
        asym.proto_function(&[0.1, 0.1, 0.4], &mut node);
        asym.proto_function(&[0.2, -0.5, 0.7], &mut off_node);

        assert_eq!(asym.acceptance(&node, &node).unwrap(), 1.0);
        assert!(matches!(asym.acceptance(&node, &off_node), Err(VmcError::Numerical(_))));
        assert_eq!(asym.acceptance(&off_node, &node).unwrap(), 0.0);
    }

    #[test]
    fn test_node_tolerance_widens_the_node() {
        // |Psi| never exceeds the mean permutation magnitude, so every point is a node
        let mut asym = SymmetrizerWaveFunction::new(child(), true).unwrap().with_node_tolerance(1.0);
        let mut a = [0.0; 2];
        let mut b = [0.0; 2];
        asym.proto_function(&[0.2, -0.5, 0.7], &mut a);
        asym.proto_function(&[0.9, 0.1, -0.6], &mut b);
        assert!(a[0].abs() > 1e-7);

        assert_eq!(asym.acceptance(&a, &a).unwrap(), 1.0);
        assert_eq!(asym.acceptance(&a, &b).unwrap(), 1.0);

        let exact = SymmetrizerWaveFunction::new(child(), true).unwrap();
        assert!((exact.acceptance(&a, &b).unwrap() - (b[0] / a[0]).powi(2)).abs() < 1e-12);
    }
}
