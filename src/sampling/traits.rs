//! Traits for Monte Carlo sampling.

use super::observables::Observable;
use crate::error::Result;
use crate::wavefunction::WaveFunction;

/// Means and error bars of every registered observable, concatenated in
/// registration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockEstimates {
    pub mean: Vec<f64>,
    pub error: Vec<f64>,
}

impl BlockEstimates {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// Monte Carlo integrator sampling `|Psi|^2`.
pub trait Sampler {
    /// Register an observable; its values are appended to the layout.
    fn add_observable(&mut self, obs: Box<dyn Observable>);

    /// Remove the most recently registered observable.
    fn pop_observable(&mut self) -> Option<Box<dyn Observable>>;

    fn n_observables(&self) -> usize;

    /// Sample `n_steps` configurations and estimate every observable.
    fn integrate(&mut self, wf: &mut dyn WaveFunction, n_steps: usize) -> Result<BlockEstimates>;
}

/// Combines estimates across processes.
pub trait Collective {
    fn reduce(&self, estimates: BlockEstimates) -> Result<BlockEstimates>;
}

/// Single process: estimates pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl Collective for SingleProcess {
    fn reduce(&self, estimates: BlockEstimates) -> Result<BlockEstimates> {
        Ok(estimates)
    }
}
