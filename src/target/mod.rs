//! Noisy target functions built on Monte Carlo integration.
//!
//! Every evaluation copies the parameters into the model, registers the
//! observables it needs on the sampler, integrates, and removes them again
//! before the estimates are reduced across processes.

mod noisy;
mod energy;
mod sr;

use std::rc::Rc;

use tracing::debug;

use crate::error::Result;
use crate::hamiltonian::Hamiltonian;
use crate::sampling::{BlockEstimates, Collective, Observable, Sampler};
use crate::wavefunction::WaveFunction;

pub use noisy::{NoisyFunction, NoisyFunctionWithGradient, NoisyGradient, NoisyValue, Regularization};
pub use energy::{EnergyGradientTargetFunction, EnergyTargetFunction, EnergyVarianceTargetFunction};
pub use sr::{solve_sr, StochasticReconfigurationTargetFunction};

/// Model, Hamiltonian and sampler borrowed for the lifetime of a target.
pub struct TargetContext<'a> {
    pub wf: &'a mut dyn WaveFunction,
    pub h: Rc<dyn Hamiltonian>,
    pub sampler: &'a mut dyn Sampler,
    pub collective: &'a dyn Collective,
    pub n_steps: usize,
}

impl<'a> TargetContext<'a> {
    pub fn new(
        wf: &'a mut dyn WaveFunction,
        h: Rc<dyn Hamiltonian>,
        sampler: &'a mut dyn Sampler,
        collective: &'a dyn Collective,
        n_steps: usize,
    ) -> Self {
        Self { wf, h, sampler, collective, n_steps }
    }

    pub fn n_vp(&self) -> usize {
        self.wf.n_vp()
    }

    pub fn evaluate(&mut self, vp: &[f64], observables: Vec<Box<dyn Observable>>) -> Result<BlockEstimates> {
        self.evaluate_steps(vp, observables, self.n_steps)
    }

    /// Set `vp`, integrate the given observables over `n_steps` samples and
    /// reduce the estimates. The sampler's observable list is restored on
    /// every exit path.
    pub fn evaluate_steps(
        &mut self,
        vp: &[f64],
        observables: Vec<Box<dyn Observable>>,
        n_steps: usize,
    ) -> Result<BlockEstimates> {
        self.wf.set_vp(vp)?;
        let n_added = observables.len();
        for obs in observables {
            self.sampler.add_observable(obs);
        }
        let result = self.sampler.integrate(&mut *self.wf, n_steps);
        for _ in 0..n_added {
            self.sampler.pop_observable();
        }
        let estimates = self.collective.reduce(result?)?;
        debug!("Evaluated {} estimates at vp = {:?}", estimates.len(), vp);
        Ok(estimates)
    }
}
