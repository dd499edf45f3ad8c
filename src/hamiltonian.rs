//! Hamiltonians and local energy.
//!
//! The kinetic part is computed from the wave-function derivatives, so a
//! Hamiltonian only supplies the local potential energy.

use serde::{Deserialize, Serialize};

use crate::wavefunction::Derivatives;

/// Kinetic energy estimator used for the total local energy.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KineticEstimator {
    /// Pandharipande-Bethe: `-1/2 sum d2`
    #[default]
    PB,
    /// Jackson-Feenberg: `1/2 sum d1^2`
    JF,
}

pub trait Hamiltonian {
    fn n_space_dim(&self) -> usize;
    fn n_part(&self) -> usize;

    /// Potential energy at coordinates `x`.
    fn local_potential_energy(&self, x: &[f64]) -> f64;

    fn kinetic_estimator(&self) -> KineticEstimator {
        KineticEstimator::PB
    }

    fn total_dim(&self) -> usize {
        self.n_space_dim() * self.n_part()
    }
}

/// Number of local energy components: total, potential, kinetic PB, kinetic JF.
pub const N_ENERGY_COMPONENTS: usize = 4;

/// Local energy components `[total, potential, kinetic PB, kinetic JF]`.
pub fn local_energy(h: &dyn Hamiltonian, x: &[f64], derivs: &Derivatives) -> [f64; N_ENERGY_COMPONENTS] {
    let v = h.local_potential_energy(x);
    let t_pb = -0.5 * derivs.d2.sum();
    let t_jf = 0.5 * derivs.d1.norm_squared();
    let total = match h.kinetic_estimator() {
        KineticEstimator::PB => v + t_pb,
        KineticEstimator::JF => v + t_jf,
    };
    [total, v, t_pb, t_jf]
}

/// `V = 1/2 omega^2 |x|^2` for every particle.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HarmonicOscillator {
    pub omega: f64,
    pub n_space_dim: usize,
    pub n_part: usize,
    #[serde(default)]
    pub kinetic: KineticEstimator,
}

impl HarmonicOscillator {
    pub fn new(omega: f64, n_space_dim: usize, n_part: usize) -> Self {
        Self { omega, n_space_dim, n_part, kinetic: KineticEstimator::PB }
    }

    pub fn with_kinetic_estimator(mut self, kinetic: KineticEstimator) -> Self {
        self.kinetic = kinetic;
        self
    }
}

impl Hamiltonian for HarmonicOscillator {
    fn n_space_dim(&self) -> usize {
        self.n_space_dim
    }

    fn n_part(&self) -> usize {
        self.n_part
    }

    fn local_potential_energy(&self, x: &[f64]) -> f64 {
        0.5 * self.omega * self.omega * x.iter().map(|xi| xi * xi).sum::<f64>()
    }

    fn kinetic_estimator(&self) -> KineticEstimator {
        self.kinetic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavefunction::{Gaussian1D1POrbital, WaveFunction};
    use approx::assert_relative_eq;

    #[test]
    fn test_eigenstate_local_energy_is_constant() {
        let h = HarmonicOscillator::new(1.0, 1, 1);
        let mut wf = Gaussian1D1POrbital::new(0.5);
        for x in [-1.3, 0.0, 0.4, 2.2] {
            let d = wf.derivatives(&[x]);
            let e = local_energy(&h, &[x], &d);
            assert_relative_eq!(e[0], 0.5, epsilon = 1e-12);
            assert_relative_eq!(e[1], 0.5 * x * x, epsilon = 1e-12);
            assert_relative_eq!(e[3], 0.5 * x * x, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_jf_total() {
        let h = HarmonicOscillator::new(2.0, 1, 1).with_kinetic_estimator(KineticEstimator::JF);
        let mut wf = Gaussian1D1POrbital::new(0.3);
        let d = wf.derivatives(&[0.7]);
        let e = local_energy(&h, &[0.7], &d);
        assert_relative_eq!(e[0], e[1] + e[3], epsilon = 1e-12);
    }
}
