//! YAML run configuration.
//!
//! ```yaml
//! hamiltonian:
//!   omega: 1.0
//!   n_space_dim: 1
//!   n_part: 2
//! model:
//!   type: JastrowGaussian
//!   b: 0.4
//!   potential:
//!     type: Polynomial
//!     a: 0.0
//!     b: 0.0
//! sampler:
//!   seed: 42
//! n_steps: 10000
//! optimizer:
//!   method: Adam
//!   settings:
//!     alpha: 0.01
//! ```

use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::correlation::{FlatU2, InversePowerU2, PadeU2, PairPotential, PolynomialU2, TwoBodyJastrow};
use crate::error::{Result, VmcError};
use crate::hamiltonian::HarmonicOscillator;
use crate::optimization::{
    AdamSettings, ConjugateGradientSettings, DynamicDescentSettings, NelderMeadSettings, OptimizationResult,
    SimulatedAnnealingSettings,
};
use crate::sampling::{MCMCParams, MetropolisSampler};
use crate::vmc::Vmc;
use crate::wavefunction::{
    Capabilities, ConstNormGaussian1D1POrbital, Gaussian1D1POrbital, IsotropicGaussian,
    MultiComponentWaveFunction, QuadrExponential1D1POrbital, QuadrExponential1DNPOrbital,
    SymmetrizerWaveFunction, WaveFunction,
};

/// Pair potential of a two-body Jastrow factor.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum PotentialConfig {
    Polynomial(PolynomialU2),
    InversePower(InversePowerU2),
    Flat(FlatU2),
    Pade(PadeU2),
}

impl PotentialConfig {
    fn build(&self) -> Box<dyn PairPotential> {
        match self {
            PotentialConfig::Polynomial(u) => Box::new(u.clone()),
            PotentialConfig::InversePower(u) => Box::new(u.clone()),
            PotentialConfig::Flat(u) => Box::new(u.clone()),
            PotentialConfig::Pade(u) => Box::new(u.clone()),
        }
    }
}

/// Trial wave function. Dimensions that are not listed come from the Hamiltonian.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ModelConfig {
    Gaussian { b: f64 },
    QuadrExponential { a: f64, b: f64 },
    ConstNormGaussian { a: f64, #[serde(default = "default_true")] vd1: bool },
    IsotropicGaussian { b: f64 },
    /// Isotropic gaussian times a two-body Jastrow factor
    JastrowGaussian { b: f64, potential: PotentialConfig },
    /// 1D gaussians on distinct centers, (anti)symmetrized over the particles
    Symmetrized {
        centers: Vec<f64>,
        b: f64,
        #[serde(default)]
        antisymmetric: bool,
        #[serde(default)]
        pairwise: bool,
    },
}

fn default_true() -> bool {
    true
}

impl ModelConfig {
    pub fn build(&self, h: &HarmonicOscillator) -> Result<Box<dyn WaveFunction>> {
        let d = h.n_space_dim;
        let n = h.n_part;
        let wf: Box<dyn WaveFunction> = match self {
            ModelConfig::Gaussian { b } => Box::new(Gaussian1D1POrbital::new(*b)),
            ModelConfig::QuadrExponential { a, b } => Box::new(QuadrExponential1D1POrbital::new(*a, *b)),
            ModelConfig::ConstNormGaussian { a, vd1 } => Box::new(ConstNormGaussian1D1POrbital::new(*a, *vd1)),
            ModelConfig::IsotropicGaussian { b } => Box::new(IsotropicGaussian::new(n, vec![0.0; d], *b)?),
            ModelConfig::JastrowGaussian { b, potential } => {
                let mut multi = MultiComponentWaveFunction::new(d, n, Capabilities::ALL)?;
                multi.add_wave_function(Box::new(IsotropicGaussian::new(n, vec![0.0; d], *b)?))?;
                multi.add_wave_function(Box::new(TwoBodyJastrow::new(d, n, potential.build())?))?;
                Box::new(multi)
            }
            ModelConfig::Symmetrized { centers, b, antisymmetric, pairwise } => {
                let child = Box::new(QuadrExponential1DNPOrbital::new(centers.clone(), *b)?);
                let sym = if *pairwise {
                    SymmetrizerWaveFunction::pairwise(child, *antisymmetric)?
                } else {
                    SymmetrizerWaveFunction::new(child, *antisymmetric)?
                };
                Box::new(sym)
            }
        };
        Ok(wf)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "method")]
pub enum OptimizerConfig {
    ConjugateGradient {
        #[serde(default)]
        grad_n_steps: Option<usize>,
        #[serde(default)]
        settings: ConjugateGradientSettings,
    },
    StochasticReconfiguration {
        #[serde(default = "default_sr_epsilon")]
        epsilon: f64,
        #[serde(default)]
        settings: DynamicDescentSettings,
    },
    Adam {
        #[serde(default)]
        sr_epsilon: Option<f64>,
        #[serde(default)]
        settings: AdamSettings,
    },
    DynamicDescent {
        #[serde(default)]
        settings: DynamicDescentSettings,
    },
    SimulatedAnnealing {
        #[serde(default = "default_iota")]
        iota: f64,
        #[serde(default)]
        kappa: f64,
        #[serde(default)]
        settings: SimulatedAnnealingSettings,
    },
    NelderMead {
        #[serde(default = "default_iota")]
        iota: f64,
        #[serde(default)]
        kappa: f64,
        #[serde(default)]
        settings: NelderMeadSettings,
    },
}

fn default_sr_epsilon() -> f64 {
    1e-3
}

fn default_iota() -> f64 {
    1.0
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunConfig {
    pub hamiltonian: HarmonicOscillator,
    pub model: ModelConfig,
    #[serde(default)]
    pub sampler: MCMCParams,
    /// Samples per energy evaluation
    pub n_steps: usize,
    #[serde(default)]
    pub regularization: f64,
    #[serde(default)]
    pub optimizer: Option<OptimizerConfig>,
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_steps < 2 {
            return Err(VmcError::Config(format!("n_steps must be at least 2, got {}", self.n_steps)));
        }
        if self.hamiltonian.n_space_dim == 0 || self.hamiltonian.n_part == 0 {
            return Err(VmcError::Config("the Hamiltonian needs at least one particle and dimension".into()));
        }
        if !(self.regularization >= 0.0) {
            return Err(VmcError::Config(format!("negative regularization {}", self.regularization)));
        }
        Ok(())
    }

    pub fn build(&self) -> Result<Vmc> {
        self.validate()?;
        let wf = self.model.build(&self.hamiltonian)?;
        let h = Rc::new(self.hamiltonian.clone());
        let sampler = Box::new(MetropolisSampler::new(self.sampler));
        Ok(Vmc::new(wf, h, sampler)?.with_regularization(self.regularization))
    }

    /// Run the configured optimizer, if any.
    pub fn optimize(&self, vmc: &mut Vmc) -> Result<Option<OptimizationResult>> {
        let n = self.n_steps;
        let result = match self.optimizer.clone() {
            None => return Ok(None),
            Some(OptimizerConfig::ConjugateGradient { grad_n_steps, settings }) => {
                vmc.conjugate_gradient_optimization(n, grad_n_steps.unwrap_or(n), settings)?
            }
            Some(OptimizerConfig::StochasticReconfiguration { epsilon, settings }) => {
                vmc.stochastic_reconfiguration_optimization(n, epsilon, settings)?
            }
            Some(OptimizerConfig::Adam { sr_epsilon, settings }) => vmc.adam_optimization(n, sr_epsilon, settings)?,
            Some(OptimizerConfig::DynamicDescent { settings }) => vmc.dynamic_descent_optimization(n, settings)?,
            Some(OptimizerConfig::SimulatedAnnealing { iota, kappa, settings }) => {
                vmc.simulated_annealing_optimization(n, iota, kappa, settings)?
            }
            Some(OptimizerConfig::NelderMead { iota, kappa, settings }) => {
                vmc.nelder_mead_optimization(n, iota, kappa, settings)?
            }
        };
        Ok(Some(result))
    }
}

pub fn parse_run_config(yaml: &str) -> Result<RunConfig> {
    let config: RunConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

/// Read a [`RunConfig`] from a YAML file.
pub fn read_run_config<P: AsRef<Path>>(filename: P) -> Result<RunConfig> {
    let file = std::fs::File::open(filename)?;
    let reader = std::io::BufReader::new(file);
    let config: RunConfig = serde_yaml::from_reader(reader)?;
    config.validate()?;
    Ok(config)
}
