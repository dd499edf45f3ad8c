//! Simulated annealing with geometric cooling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{check_start, checked_value, final_state, OptimizationResult, Optimizer, OptimizerState, Termination};
use crate::error::{Result, VmcError};
use crate::target::{NoisyFunction, NoisyValue};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedAnnealingSettings {
    pub t_initial: f64,
    pub t_min: f64,
    /// Cooling factor, `T /= mu_t` after each temperature level
    pub mu_t: f64,
    /// Boltzmann constant
    pub k: f64,
    pub iters_fixed_t: usize,
    /// Half width of the uniform trial move per coordinate
    pub step_size: f64,
    pub seed: Option<u64>,
}

impl Default for SimulatedAnnealingSettings {
    fn default() -> Self {
        Self {
            t_initial: 1.0,
            t_min: 1e-4,
            mu_t: 1.1,
            k: 1.0,
            iters_fixed_t: 50,
            step_size: 0.2,
            seed: None,
        }
    }
}

pub struct SimulatedAnnealing<'t, F: NoisyFunction + ?Sized> {
    target: &'t mut F,
    x: Vec<f64>,
    settings: SimulatedAnnealingSettings,
    state: OptimizerState,
    rng: StdRng,
}

impl<'t, F: NoisyFunction + ?Sized> SimulatedAnnealing<'t, F> {
    pub fn new(target: &'t mut F, x0: &[f64], settings: SimulatedAnnealingSettings) -> Result<Self> {
        check_start(target.n_dim(), x0)?;
        if !(settings.step_size > 0.0) || !(settings.mu_t > 1.0) {
            return Err(VmcError::Config(format!(
                "annealing needs step_size > 0 and mu_t > 1, got {} and {}",
                settings.step_size, settings.mu_t
            )));
        }
        if !(settings.t_initial > 0.0) || !(settings.t_min > 0.0) || !(settings.k > 0.0) {
            return Err(VmcError::Config("annealing temperatures and k must be positive".into()));
        }
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { target, x: x0.to_vec(), settings, state: OptimizerState::Initialized, rng })
    }

    fn run(&mut self) -> Result<OptimizationResult> {
        let s = self.settings.clone();
        let mut energy = checked_value(self.target.f(&self.x)?, &self.x)?;
        let mut best: (Vec<f64>, NoisyValue) = (self.x.clone(), energy);
        let mut temperature = s.t_initial;
        let mut n_iterations = 0;

        while temperature >= s.t_min {
            n_iterations += 1;
            let mut n_accepted = 0;
            for _ in 0..s.iters_fixed_t {
                let trial: Vec<f64> = self
                    .x
                    .iter()
                    .map(|x| x + self.rng.gen_range(-s.step_size..s.step_size))
                    .collect();
                let trial_energy = checked_value(self.target.f(&trial)?, &trial)?;
                let delta = trial_energy.val - energy.val;
                let accept = delta <= 0.0 || self.rng.gen::<f64>() < (-delta / (s.k * temperature)).exp();
                if accept {
                    n_accepted += 1;
                    self.x = trial;
                    energy = trial_energy;
                    if energy.val < best.1.val {
                        best = (self.x.clone(), energy);
                    }
                }
            }
            debug!("T = {:.3e}: accepted {}/{}", temperature, n_accepted, s.iters_fixed_t);
            info!("Annealing level {}: T = {:.3e}, E = {}, best = {}", n_iterations, temperature, energy, best.1);
            temperature /= s.mu_t;
        }

        let (x, value) = best;
        self.x = x.clone();
        Ok(OptimizationResult { x, value, n_iterations, termination: Termination::Converged })
    }
}

impl<F: NoisyFunction + ?Sized> Optimizer for SimulatedAnnealing<'_, F> {
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
