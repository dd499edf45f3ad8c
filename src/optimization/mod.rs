//! Minimizers for noisy objectives.
//!
//! Every optimizer borrows a target, starts from a parameter vector and
//! returns the best parameters it saw together with their last evaluated
//! value. Non-finite values or gradients abort the run with
//! [`VmcError::Numerical`]; running out of iterations is a normal result
//! tagged [`Termination::IterationCap`].

mod adam;
mod conjugate_gradient;
mod dynamic_descent;
mod simplex;
mod simulated_annealing;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VmcError};
use crate::target::{NoisyGradient, NoisyValue};

pub use adam::{Adam, AdamSettings};
pub use conjugate_gradient::{ConjugateGradient, ConjugateGradientSettings};
pub use dynamic_descent::{DynamicDescent, DynamicDescentSettings};
pub use simplex::{NelderMead, NelderMeadSettings};
pub use simulated_annealing::{SimulatedAnnealing, SimulatedAnnealingSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Initialized,
    Running,
    Converged,
    Failed,
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    Converged,
    IterationCap,
}

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best parameters found
    pub x: Vec<f64>,
    /// Objective at `x`, from its last evaluation
    pub value: NoisyValue,
    pub n_iterations: usize,
    pub termination: Termination,
}

pub trait Optimizer {
    /// Run the minimization to completion.
    fn find_min(&mut self) -> Result<OptimizationResult>;

    /// Current parameters. After `find_min` these are the best ones.
    fn x(&self) -> &[f64];

    fn state(&self) -> OptimizerState;
}

pub(crate) fn check_start(n_dim: usize, x0: &[f64]) -> Result<()> {
    if x0.len() != n_dim {
        return Err(VmcError::ParameterCount { expected: n_dim, got: x0.len() });
    }
    if x0.iter().any(|v| !v.is_finite()) {
        return Err(VmcError::Numerical(format!("non-finite start vector {:?}", x0)));
    }
    Ok(())
}

pub(crate) fn checked_value(value: NoisyValue, x: &[f64]) -> Result<NoisyValue> {
    if !value.is_finite() {
        return Err(VmcError::Numerical(format!("objective is {} at {:?}", value, x)));
    }
    Ok(value)
}

pub(crate) fn checked_gradient(grad: NoisyGradient, x: &[f64]) -> Result<NoisyGradient> {
    if !grad.is_finite() {
        return Err(VmcError::Numerical(format!("non-finite gradient {:?} at {:?}", grad.val, x)));
    }
    Ok(grad)
}

/// Map the outcome of a run onto the final optimizer state.
pub(crate) fn final_state(result: &Result<OptimizationResult>) -> OptimizerState {
    match result {
        Ok(_) => OptimizerState::Converged,
        Err(_) => OptimizerState::Failed,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_start() {
        assert!(check_start(2, &[0.0, 1.0]).is_ok());
        assert!(matches!(
            check_start(2, &[0.0]),
            Err(VmcError::ParameterCount { expected: 2, got: 1 })
        ));
        assert!(matches!(check_start(1, &[f64::INFINITY]), Err(VmcError::Numerical(_))));
    }

    #[test]
    fn test_non_finite_value_is_an_error() {
        assert!(checked_value(NoisyValue::new(1.0, 0.1), &[0.0]).is_ok());
        assert!(checked_value(NoisyValue::new(f64::NAN, 0.1), &[0.0]).is_err());
        let g = NoisyGradient { val: vec![f64::INFINITY], err: vec![0.0] };
        assert!(checked_gradient(g, &[0.0]).is_err());
    }
}
