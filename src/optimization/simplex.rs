//! Nelder-Mead downhill simplex.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{check_start, checked_value, final_state, OptimizationResult, Optimizer, OptimizerState, Termination};
use crate::error::Result;
use crate::target::{NoisyFunction, NoisyValue};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMeadSettings {
    /// Offset of the initial vertices along each coordinate
    pub initial_step: f64,
    pub reflection: f64,
    pub expansion: f64,
    pub contraction: f64,
    pub shrink: f64,
    /// Converge once every vertex is this close to the best one
    pub size_tol: f64,
    pub max_iterations: usize,
}

impl Default for NelderMeadSettings {
    fn default() -> Self {
        Self {
            initial_step: 0.1,
            reflection: 1.0,
            expansion: 2.0,
            contraction: 0.5,
            shrink: 0.5,
            size_tol: 1e-6,
            max_iterations: 1000,
        }
    }
}

pub struct NelderMead<'t, F: NoisyFunction + ?Sized> {
    target: &'t mut F,
    x: Vec<f64>,
    settings: NelderMeadSettings,
    state: OptimizerState,
}

/// `from + t (to - from)`
fn lerp(from: &[f64], to: &[f64], t: f64) -> Vec<f64> {
    from.iter().zip(to.iter()).map(|(a, b)| a + t * (b - a)).collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(a, b)| (a - b).powi(2)).sum::<f64>().sqrt()
}

impl<'t, F: NoisyFunction + ?Sized> NelderMead<'t, F> {
    pub fn new(target: &'t mut F, x0: &[f64], settings: NelderMeadSettings) -> Result<Self> {
        check_start(target.n_dim(), x0)?;
        Ok(Self { target, x: x0.to_vec(), settings, state: OptimizerState::Initialized })
    }

    fn eval(&mut self, x: &[f64]) -> Result<NoisyValue> {
        let value = self.target.f(x)?;
        checked_value(value, x)
    }

    fn run(&mut self) -> Result<OptimizationResult> {
        let s = self.settings.clone();
        let n = self.x.len();

        let mut vertices = vec![self.x.clone()];
        for i in 0..n {
            let mut p = self.x.clone();
            p[i] += s.initial_step;
            vertices.push(p);
        }
        let mut values = Vec::with_capacity(n + 1);
        for p in vertices.iter() {
            let value = self.target.f(p)?;
            values.push(checked_value(value, p)?);
        }

        let mut termination = Termination::IterationCap;
        let mut n_iterations = 0;
        for it in 0..s.max_iterations {
            n_iterations = it + 1;
            let mut order: Vec<usize> = (0..=n).collect();
            order.sort_by(|&a, &b| values[a].val.total_cmp(&values[b].val));
            vertices = order.iter().map(|&k| vertices[k].clone()).collect();
            values = order.iter().map(|&k| values[k]).collect();

            let size = vertices[1..].iter().map(|p| distance(p, &vertices[0])).fold(0.0, f64::max);
            info!("Simplex iteration {}: best = {}, size = {:.3e}", it, values[0], size);
            if size < s.size_tol || !values[0].is_significantly_lower_than(&values[n]) {
                termination = Termination::Converged;
                break;
            }

            let mut centroid = vec![0.0; n];
            for p in vertices[..n].iter() {
                for (c, v) in centroid.iter_mut().zip(p.iter()) {
                    *c += v / n as f64;
                }
            }

            let reflected = lerp(&centroid, &vertices[n], -s.reflection);
            let f_reflected = self.eval(&reflected)?;

            if f_reflected.val < values[0].val {
                let expanded = lerp(&centroid, &vertices[n], -s.expansion);
                let f_expanded = self.eval(&expanded)?;
                if f_expanded.val < f_reflected.val {
                    debug!("expand");
                    vertices[n] = expanded;
                    values[n] = f_expanded;
                } else {
                    debug!("reflect");
                    vertices[n] = reflected;
                    values[n] = f_reflected;
                }
                continue;
            }
            if f_reflected.val < values[n - 1].val {
                debug!("reflect");
                vertices[n] = reflected;
                values[n] = f_reflected;
                continue;
            }

            let (contracted, f_contracted, accepted) = if f_reflected.val < values[n].val {
                let p = lerp(&centroid, &reflected, s.contraction);
                let f = self.eval(&p)?;
                let ok = f.val <= f_reflected.val;
                (p, f, ok)
            } else {
                let p = lerp(&centroid, &vertices[n], s.contraction);
                let f = self.eval(&p)?;
                let ok = f.val < values[n].val;
                (p, f, ok)
            };
            if accepted {
                debug!("contract");
                vertices[n] = contracted;
                values[n] = f_contracted;
                continue;
            }

            debug!("shrink");
            for k in 1..=n {
                vertices[k] = lerp(&vertices[0], &vertices[k], s.shrink);
                let value = self.target.f(&vertices[k])?;
                values[k] = checked_value(value, &vertices[k])?;
            }
        }

        if termination == Termination::IterationCap {
            warn!("Simplex stopped after {} iterations without converging", n_iterations);
        }
        let best = (0..=n).fold(0, |b, k| if values[k].val < values[b].val { k } else { b });
        self.x = vertices[best].clone();
        Ok(OptimizationResult { x: self.x.clone(), value: values[best], n_iterations, termination })
    }
}

impl<F: NoisyFunction + ?Sized> Optimizer for NelderMead<'_, F> {
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
