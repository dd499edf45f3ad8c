//! Gradient descent whose step shrinks whenever an iteration fails to improve.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{
    check_start, checked_gradient, checked_value, final_state, OptimizationResult, Optimizer,
    OptimizerState, Termination,
};
use crate::error::Result;
use crate::target::{NoisyFunctionWithGradient, NoisyValue};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicDescentSettings {
    pub step_size: f64,
    /// Step multiplier after a non-improving iteration, 1 keeps it fixed
    pub shrink: f64,
    pub max_n_const_values: usize,
    pub max_iterations: usize,
}

impl Default for DynamicDescentSettings {
    fn default() -> Self {
        Self { step_size: 0.1, shrink: 0.5, max_n_const_values: 10, max_iterations: 200 }
    }
}

pub struct DynamicDescent<'t, F: NoisyFunctionWithGradient + ?Sized> {
    target: &'t mut F,
    x: Vec<f64>,
    settings: DynamicDescentSettings,
    state: OptimizerState,
}

impl<'t, F: NoisyFunctionWithGradient + ?Sized> DynamicDescent<'t, F> {
    pub fn new(target: &'t mut F, x0: &[f64], settings: DynamicDescentSettings) -> Result<Self> {
        check_start(target.n_dim(), x0)?;
        Ok(Self { target, x: x0.to_vec(), settings, state: OptimizerState::Initialized })
    }

    fn run(&mut self) -> Result<OptimizationResult> {
        let s = self.settings.clone();
        let mut step = s.step_size;
        let mut best: Option<(Vec<f64>, NoisyValue)> = None;
        let mut n_const = 0;
        let mut termination = Termination::IterationCap;
        let mut n_iterations = 0;

        for it in 1..=s.max_iterations {
            n_iterations = it;
            let (value, grad) = self.target.fgrad(&self.x)?;
            let value = checked_value(value, &self.x)?;
            let grad = checked_gradient(grad, &self.x)?;

            let improved = match &best {
                Some((_, best_value)) => value.is_significantly_lower_than(best_value),
                None => true,
            };
            if improved {
                best = Some((self.x.clone(), value));
                n_const = 0;
            } else {
                n_const += 1;
                step *= s.shrink;
            }
            info!("Descent iteration {}: f = {}, step = {:.3e}", it, value, step);
            if n_const >= s.max_n_const_values {
                termination = Termination::Converged;
                break;
            }

            for (x, g) in self.x.iter_mut().zip(grad.val.iter()) {
                *x -= step * g;
            }
        }

        if termination == Termination::IterationCap {
            warn!("Descent stopped after {} iterations without converging", n_iterations);
        }
        let (x, value) = match best {
            Some(best) => best,
            None => {
                let value = checked_value(self.target.f(&self.x)?, &self.x)?;
                (self.x.clone(), value)
            }
        };
        self.x = x.clone();
        Ok(OptimizationResult { x, value, n_iterations, termination })
    }
}

impl<F: NoisyFunctionWithGradient + ?Sized> Optimizer for DynamicDescent<'_, F> {
    fn find_min(&mut self) -> Result<OptimizationResult> {
        self.state = OptimizerState::Running;
        let result = self.run();
        self.state = final_state(&result);
        result
    }

    fn x(&self) -> &[f64] {
        &self.x
    }

    fn state(&self) -> OptimizerState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VmcError;
    use crate::optimization::testing::{Blowup, Quadratic};

    #[test]
    fn test_quadratic() {
        let mut f = Quadratic::new(&[1.0, 2.0], &[-0.4, 0.9]);
        let settings = DynamicDescentSettings { max_iterations: 1000, ..Default::default() };
        let mut opt = DynamicDescent::new(&mut f, &[1.0, 1.0], settings).unwrap();
        let res = opt.find_min().unwrap();
        assert!(f.distance(&res.x) < 1e-6);
    }

    #[test]
    fn test_overshoot_shrinks_step() {
        // step 1 maps x to -x on x^2 until it shrinks
        let mut f = Quadratic::new(&[1.0], &[0.0]);
        let settings = DynamicDescentSettings { step_size: 1.0, max_iterations: 500, ..Default::default() };
        let mut opt = DynamicDescent::new(&mut f, &[1.0], settings).unwrap();
        let res = opt.find_min().unwrap();
        assert!(res.x[0].abs() < 1e-6);
    }

    #[test]
    fn test_fixed_step_stops_without_improvement() {
        let mut f = Quadratic::new(&[1.0], &[0.0]);
        let settings = DynamicDescentSettings { step_size: 1.0, shrink: 1.0, max_iterations: 20, ..Default::default() };
        let mut opt = DynamicDescent::new(&mut f, &[1.0], settings).unwrap();
        let res = opt.find_min().unwrap();
        assert_eq!(res.termination, Termination::Converged);
        assert_eq!(res.x, vec![1.0]);
        assert_eq!(res.n_iterations, 11);
    }

    #[test]
    fn test_nan_fails() {
        let mut f = Blowup { limit: 1.0 };
        let mut opt = DynamicDescent::new(&mut f, &[0.0], DynamicDescentSettings::default()).unwrap();
        assert!(matches!(opt.find_min(), Err(VmcError::Numerical(_))));
        assert_eq!(opt.state(), OptimizerState::Failed);
    }
}
