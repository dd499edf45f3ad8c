//! Polak-Ribiere conjugate gradient with a significance-checked line search.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    check_start, checked_gradient, checked_value, final_state, OptimizationResult, Optimizer,
    OptimizerState, Termination,
};
use crate::error::Result;
use crate::target::{NoisyFunctionWithGradient, NoisyGradient, NoisyValue};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConjugateGradientSettings {
    /// Length of the first trial step along the search direction
    pub initial_step: f64,
    pub max_iterations: usize,
    /// Reset the direction to steepest descent every this many iterations
    pub restart_period: usize,
    /// Converge after this many consecutive line searches without a significant step
    pub max_n_bad_steps: usize,
    pub max_n_expansions: usize,
    pub max_n_contractions: usize,
    pub grad_tol: f64,
}

impl Default for ConjugateGradientSettings {
    fn default() -> Self {
        Self {
            initial_step: 0.1,
            max_iterations: 100,
            restart_period: 10,
            max_n_bad_steps: 3,
            max_n_expansions: 20,
            max_n_contractions: 20,
            grad_tol: 1e-8,
        }
    }
}

pub struct ConjugateGradient<'t, F: NoisyFunctionWithGradient + ?Sized> {
    target: &'t mut F,
    x: Vec<f64>,
    settings: ConjugateGradientSettings,
    state: OptimizerState,
}

fn along(x: &[f64], dir: &[f64], t: f64) -> Vec<f64> {
    x.iter().zip(dir.iter()).map(|(x, d)| x + t * d).collect()
}

fn steepest(grad: &NoisyGradient) -> Vec<f64> {
    grad.val.iter().map(|g| -g).collect()
}

impl<'t, F: NoisyFunctionWithGradient + ?Sized> ConjugateGradient<'t, F> {
    pub fn new(target: &'t mut F, x0: &[f64], settings: ConjugateGradientSettings) -> Result<Self> {
        check_start(target.n_dim(), x0)?;
        Ok(Self { target, x: x0.to_vec(), settings, state: OptimizerState::Initialized })
    }

    fn eval(&mut self, x: &[f64]) -> Result<NoisyValue> {
        let value = self.target.f(x)?;
        checked_value(value, x)
    }

    fn eval_grad(&mut self, x: &[f64]) -> Result<(NoisyValue, NoisyGradient)> {
        let (value, grad) = self.target.fgrad(x)?;
        Ok((checked_value(value, x)?, checked_gradient(grad, x)?))
    }

    /// Bracketing search along `dir`. Returns the new point only if its value
    /// is significantly lower than `f0`.
    fn line_search(&mut self, f0: &NoisyValue, dir: &[f64]) -> Result<Option<(Vec<f64>, NoisyValue)>> {
        let norm = dir.iter().map(|d| d * d).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Ok(None);
        }
        let x0 = self.x.clone();
        let mut t = self.settings.initial_step / norm;
        let mut x_best = along(&x0, dir, t);
        let mut f_best = self.eval(&x_best)?;

        if f_best.is_significantly_lower_than(f0) {
            for _ in 0..self.settings.max_n_expansions {
                let x_try = along(&x0, dir, 2.0 * t);
                let f_try = self.eval(&x_try)?;
                if !f_try.is_significantly_lower_than(&f_best) {
                    break;
                }
                t *= 2.0;
                x_best = x_try;
                f_best = f_try;
            }
            debug!("Line search expanded to t = {:.3e}", t);
            return Ok(Some((x_best, f_best)));
        }

        for _ in 0..self.settings.max_n_contractions {
            t *= 0.5;
            x_best = along(&x0, dir, t);
            f_best = self.eval(&x_best)?;
            if f_best.is_significantly_lower_than(f0) {
                debug!("Line search contracted to t = {:.3e}", t);
                return Ok(Some((x_best, f_best)));
            }
        }
        Ok(None)
    }

    fn run(&mut self) -> Result<OptimizationResult> {
        let s = self.settings.clone();
        let x0 = self.x.clone();
        let (mut value, mut grad) = self.eval_grad(&x0)?;
        let mut dir = steepest(&grad);
        let mut n_bad = 0;
        let mut termination = Termination::IterationCap;
        let mut n_iterations = 0;

        for it in 0..s.max_iterations {
            n_iterations = it + 1;
            if grad.is_within_errors() || grad.norm() < s.grad_tol {
                info!("CG iteration {}: gradient vanishes within errors", it);
                termination = Termination::Converged;
                break;
            }

            let (x_new, f_new) = match self.line_search(&value, &dir)? {
                Some(step) => step,
                None => {
                    n_bad += 1;
                    info!("CG iteration {}: no significant step ({} in a row)", it, n_bad);
                    if n_bad >= s.max_n_bad_steps {
                        termination = Termination::Converged;
                        break;
                    }
                    let x = self.x.clone();
                    let (v, g) = self.eval_grad(&x)?;
                    value = v;
                    grad = g;
                    dir = steepest(&grad);
                    continue;
                }
            };
            n_bad = 0;

            let (v, grad_new) = self.eval_grad(&x_new)?;
            info!("CG iteration {}: f = {} (line search {})", it, v, f_new);
            self.x = x_new;
            value = v;

            let g2: f64 = grad.val.iter().map(|g| g * g).sum();
            let mut beta = if g2 > 0.0 {
                grad_new
                    .val
                    .iter()
                    .zip(grad.val.iter())
                    .map(|(gn, go)| gn * (gn - go))
                    .sum::<f64>()
                    / g2
            } else {
                0.0
            };
            if beta <= 0.0 || (s.restart_period > 0 && (it + 1) % s.restart_period == 0) {
                beta = 0.0;
            }
            dir = grad_new.val.iter().zip(dir.iter()).map(|(g, d)| -g + beta * d).collect();
            let slope: f64 = dir.iter().zip(grad_new.val.iter()).map(|(d, g)| d * g).sum();
            if slope >= 0.0 {
                dir = steepest(&grad_new);
            }
            grad = grad_new;
        }

        if termination == Termination::IterationCap {
            warn!("CG stopped after {} iterations without converging", n_iterations);
        }
        Ok(OptimizationResult { x: self.x.clone(), value, n_iterations, termination })
    }
}

impl<F: NoisyFunctionWithGradient + ?Sized> Optimizer for ConjugateGradient<'_, F> {
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
