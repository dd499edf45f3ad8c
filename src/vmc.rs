//! Variational Monte Carlo driver.
//!
//! Owns the model, the Hamiltonian and the sampler. Each optimization method
//! builds the target it needs, starts from the model's current parameters and
//! writes the best parameters back into the model.

use std::rc::Rc;

use tracing::info;

use crate::error::{check_n_coords, Result};
use crate::hamiltonian::Hamiltonian;
use crate::optimization::{
    Adam, AdamSettings, ConjugateGradient, ConjugateGradientSettings, DynamicDescent,
    DynamicDescentSettings, NelderMead, NelderMeadSettings, OptimizationResult, Optimizer,
    SimulatedAnnealing, SimulatedAnnealingSettings,
};
use crate::sampling::{BlockEstimates, Collective, Sampler, SingleProcess};
use crate::target::{
    EnergyGradientTargetFunction, EnergyTargetFunction, EnergyVarianceTargetFunction,
    StochasticReconfigurationTargetFunction, TargetContext,
};
use crate::wavefunction::WaveFunction;

pub struct Vmc {
    wf: Box<dyn WaveFunction>,
    h: Rc<dyn Hamiltonian>,
    sampler: Box<dyn Sampler>,
    collective: Box<dyn Collective>,
    /// L2 penalty applied by every optimization target
    lambda_reg: f64,
}

impl Vmc {
    pub fn new(wf: Box<dyn WaveFunction>, h: Rc<dyn Hamiltonian>, sampler: Box<dyn Sampler>) -> Result<Self> {
        check_n_coords(h.total_dim(), wf.total_dim())?;
        Ok(Self { wf, h, sampler, collective: Box::new(SingleProcess), lambda_reg: 0.0 })
    }

    pub fn with_collective(mut self, collective: Box<dyn Collective>) -> Self {
        self.collective = collective;
        self
    }

    pub fn with_regularization(mut self, lambda: f64) -> Self {
        self.lambda_reg = lambda;
        self
    }

    pub fn wave_function(&self) -> &dyn WaveFunction {
        &*self.wf
    }

    pub fn wave_function_mut(&mut self) -> &mut dyn WaveFunction {
        &mut *self.wf
    }

    pub fn hamiltonian(&self) -> &Rc<dyn Hamiltonian> {
        &self.h
    }

    pub fn sampler_mut(&mut self) -> &mut dyn Sampler {
        &mut *self.sampler
    }

    fn context(&mut self, n_steps: usize) -> TargetContext<'_> {
        TargetContext::new(&mut *self.wf, self.h.clone(), &mut *self.sampler, &*self.collective, n_steps)
    }

    /// Write the best parameters into the model, or restore `x0` if the run failed.
    fn finish(&mut self, name: &str, x0: &[f64], result: Result<OptimizationResult>) -> Result<OptimizationResult> {
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                self.wf.set_vp(x0)?;
                return Err(e);
            }
        };
        self.wf.set_vp(&result.x)?;
        info!(
            "{} finished after {} iterations ({:?}): E = {}, vp = {:?}",
            name, result.n_iterations, result.termination, result.value, result.x
        );
        Ok(result)
    }

    /// Energy components `[total, potential, kinetic PB, kinetic JF]` with errors.
    pub fn compute_variational_energy(&mut self, n_steps: usize) -> Result<BlockEstimates> {
        let vp = self.wf.vp();
        let estimates = EnergyTargetFunction::new(self.context(n_steps)).energy(&vp)?;
        info!("E = {:.6} ± {:.6}", estimates.mean[0], estimates.error[0]);
        Ok(estimates)
    }

    /// Conjugate gradient with `e_n_steps` samples per line-search point and
    /// `grad_n_steps` per gradient.
    pub fn conjugate_gradient_optimization(
        &mut self,
        e_n_steps: usize,
        grad_n_steps: usize,
        settings: ConjugateGradientSettings,
    ) -> Result<OptimizationResult> {
        let x0 = self.wf.vp();
        let lambda = self.lambda_reg;
        let result = EnergyGradientTargetFunction::new(self.context(e_n_steps)).and_then(|target| {
            let mut target = target.with_gradient_steps(grad_n_steps).with_regularization(lambda);
            ConjugateGradient::new(&mut target, &x0, settings)?.find_min()
        });
        self.finish("Conjugate gradient", &x0, result)
    }

    /// Stochastic reconfiguration: descent along the natural gradient.
    pub fn stochastic_reconfiguration_optimization(
        &mut self,
        n_steps: usize,
        epsilon: f64,
        settings: DynamicDescentSettings,
    ) -> Result<OptimizationResult> {
        let x0 = self.wf.vp();
        let lambda = self.lambda_reg;
        let result = StochasticReconfigurationTargetFunction::new(self.context(n_steps), epsilon).and_then(|target| {
            let mut target = target.with_regularization(lambda);
            DynamicDescent::new(&mut target, &x0, settings)?.find_min()
        });
        self.finish("Stochastic reconfiguration", &x0, result)
    }

    /// Adam on the plain energy gradient, or on the natural gradient when
    /// `sr_epsilon` is given.
    pub fn adam_optimization(
        &mut self,
        n_steps: usize,
        sr_epsilon: Option<f64>,
        settings: AdamSettings,
    ) -> Result<OptimizationResult> {
        let x0 = self.wf.vp();
        let lambda = self.lambda_reg;
        let ctx = self.context(n_steps);
        let result = match sr_epsilon {
            Some(epsilon) => StochasticReconfigurationTargetFunction::new(ctx, epsilon).and_then(|target| {
                let mut target = target.with_regularization(lambda);
                Adam::new(&mut target, &x0, settings)?.find_min()
            }),
            None => EnergyGradientTargetFunction::new(ctx).and_then(|target| {
                let mut target = target.with_regularization(lambda);
                Adam::new(&mut target, &x0, settings)?.find_min()
            }),
        };
        self.finish("Adam", &x0, result)
    }

    pub fn dynamic_descent_optimization(
        &mut self,
        n_steps: usize,
        settings: DynamicDescentSettings,
    ) -> Result<OptimizationResult> {
        let x0 = self.wf.vp();
        let lambda = self.lambda_reg;
        let result = EnergyGradientTargetFunction::new(self.context(n_steps)).and_then(|target| {
            let mut target = target.with_regularization(lambda);
            DynamicDescent::new(&mut target, &x0, settings)?.find_min()
        });
        self.finish("Dynamic descent", &x0, result)
    }

    /// Anneal `iota E + kappa sigma^2`.
    pub fn simulated_annealing_optimization(
        &mut self,
        n_steps: usize,
        iota: f64,
        kappa: f64,
        settings: SimulatedAnnealingSettings,
    ) -> Result<OptimizationResult> {
        let x0 = self.wf.vp();
        let lambda = self.lambda_reg;
        let mut target =
            EnergyVarianceTargetFunction::new(self.context(n_steps), iota, kappa).with_regularization(lambda);
        let result = SimulatedAnnealing::new(&mut target, &x0, settings).and_then(|mut opt| opt.find_min());
        drop(target);
        self.finish("Simulated annealing", &x0, result)
    }

    /// Nelder-Mead on `iota E + kappa sigma^2`.
    pub fn nelder_mead_optimization(
        &mut self,
        n_steps: usize,
        iota: f64,
        kappa: f64,
        settings: NelderMeadSettings,
    ) -> Result<OptimizationResult> {
        let x0 = self.wf.vp();
        let lambda = self.lambda_reg;
        let mut target =
            EnergyVarianceTargetFunction::new(self.context(n_steps), iota, kappa).with_regularization(lambda);
        let result = NelderMead::new(&mut target, &x0, settings).and_then(|mut opt| opt.find_min());
        drop(target);
        self.finish("Nelder-Mead", &x0, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VmcError;
    use crate::hamiltonian::HarmonicOscillator;
    use crate::optimization::Termination;
    use crate::sampling::{MCMCParams, MetropolisSampler, Observable};
    use crate::wavefunction::{ConstNormGaussian1D1POrbital, Gaussian1D1POrbital, IsotropicGaussian};

    fn vmc(b: f64, seed: u64) -> Vmc {
        let sampler = MetropolisSampler::new(MCMCParams { seed: Some(seed), ..MCMCParams::default() });
        Vmc::new(
            Box::new(Gaussian1D1POrbital::new(b)),
            Rc::new(HarmonicOscillator::new(1.0, 1, 1)),
            Box::new(sampler),
        )
        .unwrap()
    }

    /// Reports a fixed value for every observable slot.
    struct FixedSampler {
        value: f64,
        observables: Vec<Box<dyn Observable>>,
    }

    impl Sampler for FixedSampler {
        fn add_observable(&mut self, obs: Box<dyn Observable>) {
            self.observables.push(obs);
        }

        fn pop_observable(&mut self) -> Option<Box<dyn Observable>> {
            self.observables.pop()
        }

        fn n_observables(&self) -> usize {
            self.observables.len()
        }

        fn integrate(&mut self, _wf: &mut dyn WaveFunction, _n_steps: usize) -> Result<BlockEstimates> {
            let n: usize = self.observables.iter().map(|o| o.n_obs()).sum();
            Ok(BlockEstimates { mean: vec![self.value; n], error: vec![0.0; n] })
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let sampler = MetropolisSampler::new(MCMCParams::default());
        let wf = IsotropicGaussian::new(2, vec![0.0, 0.0, 0.0], 0.5).unwrap();
        let res = Vmc::new(Box::new(wf), Rc::new(HarmonicOscillator::new(1.0, 1, 1)), Box::new(sampler));
        assert!(matches!(res, Err(VmcError::DimensionMismatch { expected: 1, got: 6 })));
    }

    #[test]
    fn test_variational_energy() {
        let mut v = vmc(0.5, 21);
        let e = v.compute_variational_energy(1000).unwrap();
        assert_eq!(e.len(), 4);
        assert!((e.mean[0] - 0.5).abs() < 1e-10);
        assert!(e.error[0] < 1e-10);
        assert_eq!(v.sampler_mut().n_observables(), 0);
    }

    #[test]
    fn test_any_sampler_drives_the_energy() {
        let sampler = FixedSampler { value: 1.25, observables: Vec::new() };
        let mut v = Vmc::new(
            Box::new(Gaussian1D1POrbital::new(0.7)),
            Rc::new(HarmonicOscillator::new(1.0, 1, 1)),
            Box::new(sampler),
        )
        .unwrap();
        let e = v.compute_variational_energy(10).unwrap();
        assert_eq!(e.len(), 4);
        assert_eq!(e.mean[0], 1.25);
        assert_eq!(v.sampler_mut().n_observables(), 0);

        // a flat landscape leaves nothing to improve on
        let settings = NelderMeadSettings { initial_step: 0.05, max_iterations: 5, ..Default::default() };
        let res = v.nelder_mead_optimization(10, 1.0, 0.0, settings).unwrap();
        assert_eq!(res.value.val, 1.25);
        assert_eq!(res.termination, Termination::Converged);
        assert_eq!(res.x, vec![0.7]);
        assert_eq!(v.wave_function().vp(), res.x);

        let settings =
            SimulatedAnnealingSettings { t_min: 0.6, mu_t: 2.0, iters_fixed_t: 3, seed: Some(2), ..Default::default() };
        let res = v.simulated_annealing_optimization(10, 1.0, 0.0, settings).unwrap();
        assert_eq!(res.n_iterations, 1);
        assert_eq!(res.x, vec![0.7]);
        assert_eq!(v.sampler_mut().n_observables(), 0);
    }

    #[test]
    fn test_dynamic_descent_writes_back() {
        // E(b) = b/2 + 1/(8b), minimum at b = 0.5
        let mut v = vmc(0.3, 22);
        let settings = DynamicDescentSettings { step_size: 0.2, max_iterations: 30, ..Default::default() };
        let res = v.dynamic_descent_optimization(4000, settings).unwrap();
        assert!((res.x[0] - 0.5).abs() < 0.1);
        assert_eq!(v.wave_function().vp(), res.x);
    }

    #[test]
    fn test_adam_needs_gradient() {
        let sampler = MetropolisSampler::new(MCMCParams { seed: Some(1), ..MCMCParams::default() });
        let mut v = Vmc::new(
            Box::new(ConstNormGaussian1D1POrbital::new(1.0, false)),
            Rc::new(HarmonicOscillator::new(1.0, 1, 1)),
            Box::new(sampler),
        )
        .unwrap();
        assert!(matches!(
            v.adam_optimization(100, None, AdamSettings::default()),
            Err(VmcError::Construction(_))
        ));
        assert_eq!(v.wave_function().vp(), vec![1.0]);
    }

    #[test]
    fn test_nelder_mead_on_variance() {
        let mut v = vmc(0.4, 23);
        let settings = NelderMeadSettings { initial_step: 0.05, size_tol: 1e-3, max_iterations: 40, ..Default::default() };
        let res = v.nelder_mead_optimization(2000, 0.0, 1.0, settings).unwrap();
        assert!((res.x[0] - 0.5).abs() < 0.1);
        assert!(matches!(res.termination, Termination::Converged | Termination::IterationCap));
    }
}
