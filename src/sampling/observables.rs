//! Observables measured along the Markov chain.

use std::rc::Rc;

use crate::hamiltonian::{local_energy, Hamiltonian, N_ENERGY_COMPONENTS};
use crate::wavefunction::Derivatives;

/// Quantity accumulated by a sampler at every recorded step.
pub trait Observable {
    /// Number of values written by `observe`.
    fn n_obs(&self) -> usize;

    /// Write the observable at `x` into `out` (length `n_obs`).
    fn observe(&self, x: &[f64], derivs: &Derivatives, out: &mut [f64]);
}

/// Local energy components `[total, potential, kinetic PB, kinetic JF]`.
pub struct EnergyObservable {
    h: Rc<dyn Hamiltonian>,
}

impl EnergyObservable {
    pub fn new(h: Rc<dyn Hamiltonian>) -> Self {
        Self { h }
    }
}

impl Observable for EnergyObservable {
    fn n_obs(&self) -> usize {
        N_ENERGY_COMPONENTS
    }

    fn observe(&self, x: &[f64], derivs: &Derivatives, out: &mut [f64]) {
        out.copy_from_slice(&local_energy(self.h.as_ref(), x, derivs));
    }
}

/// `E_L^2`, for the energy variance.
pub struct SquaredEnergyObservable {
    h: Rc<dyn Hamiltonian>,
}

impl SquaredEnergyObservable {
    pub fn new(h: Rc<dyn Hamiltonian>) -> Self {
        Self { h }
    }
}

impl Observable for SquaredEnergyObservable {
    fn n_obs(&self) -> usize {
        1
    }

    fn observe(&self, x: &[f64], derivs: &Derivatives, out: &mut [f64]) {
        let e = local_energy(self.h.as_ref(), x, derivs)[0];
        out[0] = e * e;
    }
}

/// `[O_i, E_L O_i]` with `O_i = vd1_i`, `2 P` values.
pub struct EnergyGradientObservable {
    h: Rc<dyn Hamiltonian>,
    n_vp: usize,
}

impl EnergyGradientObservable {
    pub fn new(h: Rc<dyn Hamiltonian>, n_vp: usize) -> Self {
        Self { h, n_vp }
    }
}

impl Observable for EnergyGradientObservable {
    fn n_obs(&self) -> usize {
        2 * self.n_vp
    }

    fn observe(&self, x: &[f64], derivs: &Derivatives, out: &mut [f64]) {
        let e = local_energy(self.h.as_ref(), x, derivs)[0];
        for i in 0..self.n_vp {
            out[i] = derivs.vd1[i];
            out[self.n_vp + i] = e * derivs.vd1[i];
        }
    }
}

/// `[O_i, E_L O_i, O_i O_j (i <= j)]`: `2 P + P (P + 1) / 2` values.
pub struct StochasticReconfigurationObservable {
    h: Rc<dyn Hamiltonian>,
    n_vp: usize,
}

impl StochasticReconfigurationObservable {
    pub fn new(h: Rc<dyn Hamiltonian>, n_vp: usize) -> Self {
        Self { h, n_vp }
    }

    /// Position of `O_i O_j` (`i <= j`) inside the upper-triangle block.
    pub fn triangle_index(n_vp: usize, i: usize, j: usize) -> usize {
        i * n_vp - i * (i + 1) / 2 + j
    }
}

impl Observable for StochasticReconfigurationObservable {
    fn n_obs(&self) -> usize {
        2 * self.n_vp + self.n_vp * (self.n_vp + 1) / 2
    }

    fn observe(&self, x: &[f64], derivs: &Derivatives, out: &mut [f64]) {
        let n = self.n_vp;
        let e = local_energy(self.h.as_ref(), x, derivs)[0];
        for i in 0..n {
            out[i] = derivs.vd1[i];
            out[n + i] = e * derivs.vd1[i];
        }
        let block = &mut out[2 * n..];
        for i in 0..n {
            for j in i..n {
                block[Self::triangle_index(n, i, j)] = derivs.vd1[i] * derivs.vd1[j];
            }
        }
    }
}
