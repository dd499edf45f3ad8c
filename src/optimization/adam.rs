//! Adam with a noise-aware stopping rule.

use std::collections::VecDeque;

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
pub struct AdamSettings {
    pub alpha: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    /// Stop after this many consecutive iterations without a significant improvement
    pub max_n_const_values: usize,
    pub max_iterations: usize,
    /// Return the mean of the last `max_n_const_values` iterates
    pub use_averaging: bool,
    /// Ignore gradient components that lie within their error bars
    pub use_gradient_error: bool,
}

impl Default for AdamSettings {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            max_n_const_values: 20,
            max_iterations: 1000,
            use_averaging: false,
            use_gradient_error: false,
        }
    }
}

pub struct Adam<'t, F: NoisyFunctionWithGradient + ?Sized> {
    target: &'t mut F,
    x: Vec<f64>,
    settings: AdamSettings,
    state: OptimizerState,
}

impl<'t, F: NoisyFunctionWithGradient + ?Sized> Adam<'t, F> {
    pub fn new(target: &'t mut F, x0: &[f64], settings: AdamSettings) -> Result<Self> {
        check_start(target.n_dim(), x0)?;
        Ok(Self { target, x: x0.to_vec(), settings, state: OptimizerState::Initialized })
    }

    fn run(&mut self) -> Result<OptimizationResult> {
        let s = self.settings.clone();
        let n = self.x.len();
        let mut m = vec![0.0; n];
        let mut v = vec![0.0; n];
        let mut best: Option<(Vec<f64>, NoisyValue)> = None;
        let mut window: VecDeque<Vec<f64>> = VecDeque::with_capacity(s.max_n_const_values + 1);
        let mut n_const = 0;
        let mut termination = Termination::IterationCap;
        let mut n_iterations = 0;

        for t in 1..=s.max_iterations {
            n_iterations = t;
            let (value, grad) = self.target.fgrad(&self.x)?;
            let value = checked_value(value, &self.x)?;
            let mut grad = checked_gradient(grad, &self.x)?;

            let improved = match &best {
                Some((_, best_value)) => value.is_significantly_lower_than(best_value),
                None => true,
            };
            if improved {
                best = Some((self.x.clone(), value));
                n_const = 0;
            } else {
                n_const += 1;
            }
            info!("Adam iteration {}: f = {}, n_const = {}", t, value, n_const);

            window.push_back(self.x.clone());
            if window.len() > s.max_n_const_values.max(1) {
                window.pop_front();
            }
            if n_const >= s.max_n_const_values {
                termination = Termination::Converged;
                break;
            }

            if s.use_gradient_error {
                for (g, e) in grad.val.iter_mut().zip(grad.err.iter()) {
                    if g.abs() <= *e {
                        *g = 0.0;
                    }
                }
            }

            let bias1 = 1.0 - s.beta1.powi(t as i32);
            let bias2 = 1.0 - s.beta2.powi(t as i32);
            for i in 0..n {
                let g = grad.val[i];
                m[i] = s.beta1 * m[i] + (1.0 - s.beta1) * g;
                v[i] = s.beta2 * v[i] + (1.0 - s.beta2) * g * g;
                let m_hat = m[i] / bias1;
                let v_hat = v[i] / bias2;
                self.x[i] -= s.alpha * m_hat / (v_hat.sqrt() + s.epsilon);
            }
        }

        if termination == Termination::IterationCap {
            warn!("Adam stopped after {} iterations without converging", n_iterations);
        }

        let (x, value) = if s.use_averaging && !window.is_empty() {
            let mut mean = vec![0.0; n];
            for p in window.iter() {
                for (m, v) in mean.iter_mut().zip(p.iter()) {
                    *m += v;
                }
            }
            for m in mean.iter_mut() {
                *m /= window.len() as f64;
            }
            let value = checked_value(self.target.f(&mean)?, &mean)?;
            (mean, value)
        } else {
            match best {
                Some(best) => best,
                None => {
                    let value = checked_value(self.target.f(&self.x)?, &self.x)?;
                    (self.x.clone(), value)
                }
            }
        };

        self.x = x.clone();
        Ok(OptimizationResult { x, value, n_iterations, termination })
    }
}

impl<F: NoisyFunctionWithGradient + ?Sized> Optimizer for Adam<'_, F> {
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
        let mut f = Quadratic::new(&[1.0, 1.0, 1.0], &[0.3, 0.7, -1.2]);
        let settings = AdamSettings { max_iterations: 10000, ..AdamSettings::default() };
        let mut adam = Adam::new(&mut f, &[1.0, -2.0, 0.5], settings).unwrap();
        assert_eq!(adam.state(), OptimizerState::Initialized);

        let res = adam.find_min().unwrap();
        assert_eq!(res.termination, Termination::Converged);
        assert_eq!(adam.state(), OptimizerState::Converged);
        assert_eq!(adam.x(), res.x.as_slice());
        assert!(f.distance(&res.x) < 1e-3);
        assert!(res.value.val < 1e-6);
    }

    #[test]
    fn test_iteration_cap() {
        let mut f = Quadratic::new(&[1.0], &[5.0]);
        let settings = AdamSettings { max_iterations: 10, ..AdamSettings::default() };
        let mut adam = Adam::new(&mut f, &[0.0], settings).unwrap();
        let res = adam.find_min().unwrap();
        assert_eq!(res.termination, Termination::IterationCap);
        assert_eq!(res.n_iterations, 10);
        assert!(res.x[0] > 0.0 && res.x[0] < 5.0);
    }

    #[test]
    fn test_nan_fails() {
        let mut f = Blowup { limit: 1.0 };
        let settings = AdamSettings { alpha: 0.1, ..AdamSettings::default() };
        let mut adam = Adam::new(&mut f, &[0.0], settings).unwrap();
        assert!(matches!(adam.find_min(), Err(VmcError::Numerical(_))));
        assert_eq!(adam.state(), OptimizerState::Failed);
    }

    #[test]
    fn test_wrong_start_length() {
        let mut f = Quadratic::new(&[1.0, 1.0], &[0.0, 0.0]);
        assert!(matches!(
            Adam::new(&mut f, &[0.0], AdamSettings::default()),
            Err(VmcError::ParameterCount { .. })
        ));
    }

    #[test]
    fn test_noisy_gradient_is_ignored() {
        // every gradient component sits inside its error bar
        let mut f = Quadratic::new(&[1.0], &[0.1]);
        f.err = 10.0;
        let settings = AdamSettings { use_gradient_error: true, ..AdamSettings::default() };
        let mut adam = Adam::new(&mut f, &[0.0], settings).unwrap();
        let res = adam.find_min().unwrap();
        assert_eq!(res.termination, Termination::Converged);
        assert_eq!(res.x, vec![0.0]);
        assert_eq!(res.n_iterations, 21);
    }
}
