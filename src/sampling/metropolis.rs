//! Markov Chain Monte Carlo integrator for Variational Monte Carlo.
//!
//! Single-walker Metropolis sampling of `|Psi|^2` driven by the model's
//! proto-values and acceptance ratio. Derivatives are refreshed only when
//! a move is accepted and are shared by all registered observables.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::observables::Observable;
use super::traits::{BlockEstimates, Sampler};
use crate::error::{Result, VmcError};
use crate::wavefunction::WaveFunction;

/// Parameters for MCMC simulation.
#[derive(Serialize, Deserialize, Copy, Clone, Debug)]
#[serde(default)]
pub struct MCMCParams {
    pub initial_step_size: f64,
    pub max_step_size: f64,
    pub min_step_size: f64,
    pub target_acceptance: f64,
    /// Moves per step-size adaptation round
    pub adaptation_interval: usize,
    /// Adaptation rounds before equilibration
    pub n_find_step_iterations: usize,
    pub n_equilibration_steps: usize,
    /// Extra moves between two recorded samples
    pub n_decorrelation_steps: usize,
    pub seed: Option<u64>,
}

impl Default for MCMCParams {
    fn default() -> Self {
        Self {
            initial_step_size: 1.0,
            max_step_size: 5.0,
            min_step_size: 0.05,
            target_acceptance: 0.5,
            adaptation_interval: 100,
            n_find_step_iterations: 10,
            n_equilibration_steps: 1000,
            n_decorrelation_steps: 2,
            seed: None,
        }
    }
}

/// Current and trial configuration of the walker.
struct WalkerState {
    x: Vec<f64>,
    proto: Vec<f64>,
    x_new: Vec<f64>,
    proto_new: Vec<f64>,
}

/// Metropolis sampler with step-size tuning and blocking error bars.
pub struct MetropolisSampler {
    params: MCMCParams,
    rng: StdRng,
    step_size: f64,
    observables: Vec<Box<dyn Observable>>,
    walker: Vec<f64>,
    acceptance_rate: f64,
}

impl MetropolisSampler {
    pub fn new(params: MCMCParams) -> Self {
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            params,
            rng,
            step_size: params.initial_step_size,
            observables: Vec::new(),
            walker: Vec::new(),
            acceptance_rate: 0.0,
        }
    }

    pub fn params(&self) -> &MCMCParams {
        &self.params
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Acceptance rate of the last production run.
    pub fn acceptance_rate(&self) -> f64 {
        self.acceptance_rate
    }

    pub fn set_n_decorrelation_steps(&mut self, n: usize) {
        self.params.n_decorrelation_steps = n;
    }

    pub fn set_n_find_step_iterations(&mut self, n: usize) {
        self.params.n_find_step_iterations = n;
    }

    /// Start from the previous walker when the dimensions still match.
    fn initialize(&mut self, wf: &mut dyn WaveFunction) -> WalkerState {
        let ndim = wf.total_dim();
        if self.walker.len() != ndim {
            self.walker = (0..ndim).map(|_| self.rng.sample(StandardNormal)).collect();
        }
        let x = self.walker.clone();
        let mut proto = vec![0.0; wf.n_proto()];
        wf.proto_function(&x, &mut proto);
        wf.new_to_old();
        WalkerState {
            x_new: x.clone(),
            proto_new: proto.clone(),
            x,
            proto,
        }
    }

    /// Perform a single Metropolis step, returns whether it was accepted.
    fn metropolis_step(&mut self, wf: &mut dyn WaveFunction, state: &mut WalkerState) -> Result<bool> {
        for (xn, xo) in state.x_new.iter_mut().zip(state.x.iter()) {
            let z: f64 = self.rng.sample(StandardNormal);
            *xn = xo + self.step_size * z;
        }
        wf.proto_function(&state.x_new, &mut state.proto_new);
        let acceptance = wf.acceptance(&state.proto, &state.proto_new)?;

        if self.rng.gen::<f64>() < acceptance {
            std::mem::swap(&mut state.x, &mut state.x_new);
            std::mem::swap(&mut state.proto, &mut state.proto_new);
            wf.new_to_old();
            Ok(true)
        } else {
            wf.old_to_new();
            Ok(false)
        }
    }

    /// Adapt the step size to achieve target acceptance rate.
    fn adapt_step_size(&mut self, acceptance_count: usize) {
        let acceptance_rate = acceptance_count as f64 / self.params.adaptation_interval.max(1) as f64;
        let adjustment = (acceptance_rate / self.params.target_acceptance).sqrt();
        self.step_size = (self.step_size * adjustment)
            .clamp(self.params.min_step_size, self.params.max_step_size);
    }
}

impl Sampler for MetropolisSampler {
    fn add_observable(&mut self, obs: Box<dyn Observable>) {
        self.observables.push(obs);
    }

    fn pop_observable(&mut self) -> Option<Box<dyn Observable>> {
        self.observables.pop()
    }

    fn n_observables(&self) -> usize {
        self.observables.len()
    }

    fn integrate(&mut self, wf: &mut dyn WaveFunction, n_steps: usize) -> Result<BlockEstimates> {
        if n_steps < 2 {
            return Err(VmcError::Config(format!(
                "at least two sampling steps are required, got {}",
                n_steps
            )));
        }
        let mut state = self.initialize(wf);

        for _ in 0..self.params.n_find_step_iterations {
            let mut accepted = 0;
            for _ in 0..self.params.adaptation_interval {
                if self.metropolis_step(wf, &mut state)? {
                    accepted += 1;
                }
            }
            self.adapt_step_size(accepted);
        }
        for _ in 0..self.params.n_equilibration_steps {
            self.metropolis_step(wf, &mut state)?;
        }

        let n_obs: usize = self.observables.iter().map(|o| o.n_obs()).sum();
        let mut derivs = wf.new_derivatives();
        wf.compute_all_derivatives(&state.x, &mut derivs);
        if !derivs.is_finite() {
            return Err(VmcError::Numerical(format!("non-finite derivatives at {:?}", state.x)));
        }

        let mut samples = vec![0.0; n_steps * n_obs];
        let mut accepted = 0usize;
        for step in 0..n_steps {
            let mut moved = false;
            for _ in 0..=self.params.n_decorrelation_steps {
                if self.metropolis_step(wf, &mut state)? {
                    moved = true;
                    accepted += 1;
                }
            }
            if moved {
                wf.compute_all_derivatives(&state.x, &mut derivs);
                if !derivs.is_finite() {
                    return Err(VmcError::Numerical(format!(
                        "non-finite derivatives at {:?}",
                        state.x
                    )));
                }
            }

            let row = &mut samples[step * n_obs..(step + 1) * n_obs];
            let mut offset = 0;
            for obs in &self.observables {
                let n = obs.n_obs();
                obs.observe(&state.x, &derivs, &mut row[offset..offset + n]);
                offset += n;
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(VmcError::Numerical(format!("non-finite observable at {:?}", state.x)));
            }
        }

        self.acceptance_rate =
            accepted as f64 / (n_steps * (self.params.n_decorrelation_steps + 1)) as f64;
        self.walker = state.x;

        let mut estimates = BlockEstimates {
            mean: Vec::with_capacity(n_obs),
            error: Vec::with_capacity(n_obs),
        };
        for k in 0..n_obs {
            let column: Vec<f64> = samples.iter().skip(k).step_by(n_obs).copied().collect();
            let mean = column.iter().sum::<f64>() / n_steps as f64;
            let tau = compute_autocorrelation_time(&column);
            estimates.mean.push(mean);
            estimates.error.push(compute_error(&column, tau));
        }

        debug!(
            "Integrated {} steps, step size = {:.4}, acceptance = {:.3}",
            n_steps, self.step_size, self.acceptance_rate
        );
        Ok(estimates)
    }
}

/// Estimate autocorrelation time using initial positive sequence.
pub fn compute_autocorrelation_time(samples: &[f64]) -> f64 {
    let n = samples.len();
    let mean = samples.iter().sum::<f64>() / n as f64;
    let var = samples.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n as f64;

    if var == 0.0 {
        return 1.0;
    }

    let mut autocorr = 1.0;
    for t in 1..n / 2 {
        let auto_t: f64 = samples[..n - t].iter()
            .zip(samples[t..].iter())
            .map(|(&x, &y)| (x - mean) * (y - mean))
            .sum::<f64>() / ((n - t) as f64 * var);

        if auto_t < 0.0 {
            break;
        }
        autocorr += 2.0 * auto_t;
    }
    autocorr
}

/// Compute error using blocking method.
///
/// Falls back to the plain standard error when there are fewer than two
/// blocks.
pub fn compute_error(samples: &[f64], autocorrelation_time: f64) -> f64 {
    let n = samples.len();
    let block_size = ((2.0 * autocorrelation_time).ceil() as usize).max(1);
    let n_blocks = n / block_size;

    if n_blocks < 2 {
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = samples.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        return (variance / n as f64).sqrt();
    }

    let block_means: Vec<f64> = (0..n_blocks)
        .map(|i| {
            let start = i * block_size;
            let end = start + block_size;
            samples[start..end].iter().sum::<f64>() / block_size as f64
        })
        .collect();

    let mean = block_means.iter().sum::<f64>() / n_blocks as f64;
    let variance = block_means.iter()
        .map(|&x| (x - mean).powi(2))
        .sum::<f64>() / (n_blocks - 1) as f64;

    (variance / n_blocks as f64).sqrt()
}
