//! Sampling module - Monte Carlo integration of observables for VMC.

mod traits;
mod observables;
mod metropolis;

pub use traits::{BlockEstimates, Collective, Sampler, SingleProcess};
pub use observables::{
    EnergyGradientObservable, EnergyObservable, Observable, SquaredEnergyObservable,
    StochasticReconfigurationObservable,
};
pub use metropolis::{compute_autocorrelation_time, compute_error, MCMCParams, MetropolisSampler};
