//! Rust VMC - variational Monte Carlo with noisy optimization
//!
//! This crate provides composable trial wave functions with analytic
//! coordinate and parameter derivatives, a Metropolis sampler, noisy target
//! functions built on it, and a family of optimizers that respect the
//! statistical error of every estimate.

pub mod error;
pub mod wavefunction;
pub mod correlation;
pub mod hamiltonian;
pub mod sampling;
pub mod target;
pub mod optimization;
pub mod vmc;
pub mod config;

// Re-export commonly used types at crate root
pub use error::{Result, VmcError};
pub use wavefunction::{
    Capabilities, Derivatives, MultiComponentWaveFunction, ShadowWaveFunction, SymmetrizerWaveFunction,
    WaveFunction,
};
pub use correlation::{PairPotential, TwoBodyJastrow};
pub use hamiltonian::{Hamiltonian, HarmonicOscillator, KineticEstimator};
pub use sampling::{BlockEstimates, Collective, MCMCParams, MetropolisSampler, Sampler, SingleProcess};
pub use target::{NoisyFunction, NoisyFunctionWithGradient, NoisyGradient, NoisyValue};
pub use optimization::{OptimizationResult, Optimizer, OptimizerState, Termination};
pub use vmc::Vmc;
pub use config::{read_run_config, RunConfig};

#[cfg(test)]
mod tests;
