//! Energy-based target functions.

use tracing::debug;

use super::noisy::{NoisyFunction, NoisyFunctionWithGradient, NoisyGradient, NoisyValue, Regularization};
use super::TargetContext;
use crate::error::{Result, VmcError};
use crate::hamiltonian::N_ENERGY_COMPONENTS;
use crate::sampling::{
    BlockEstimates, EnergyGradientObservable, EnergyObservable, Observable, SquaredEnergyObservable,
};

fn energy_observable(ctx: &TargetContext<'_>) -> Box<dyn Observable> {
    Box::new(EnergyObservable::new(ctx.h.clone()))
}

/// Total energy from the first component of an energy block.
fn energy_of(est: &BlockEstimates) -> NoisyValue {
    NoisyValue::new(est.mean[0], est.error[0])
}

/// Energy gradient `2 (<H O_i> - <H><O_i>)` with linearly propagated errors,
/// from an estimate laid out as `[energy (4), O_i (P), H O_i (P), ...]`.
pub(crate) fn energy_gradient_of(est: &BlockEstimates, n_vp: usize) -> NoisyGradient {
    let e = est.mean[0];
    let de = est.error[0];
    let mut grad = NoisyGradient::zeros(n_vp);
    for i in 0..n_vp {
        let o = est.mean[N_ENERGY_COMPONENTS + i];
        let d_o = est.error[N_ENERGY_COMPONENTS + i];
        let ho = est.mean[N_ENERGY_COMPONENTS + n_vp + i];
        let d_ho = est.error[N_ENERGY_COMPONENTS + n_vp + i];
        grad.val[i] = 2.0 * (ho - e * o);
        grad.err[i] = 2.0 * (d_ho + o.abs() * de + e.abs() * d_o);
    }
    grad
}

pub(crate) fn require_vd1(ctx: &TargetContext<'_>) -> Result<()> {
    if !ctx.wf.capabilities().vd1 {
        return Err(VmcError::Construction(
            "gradient targets need a model with parameter derivatives".into(),
        ));
    }
    Ok(())
}

/// Variational energy, value only.
pub struct EnergyTargetFunction<'a> {
    ctx: TargetContext<'a>,
    reg: Regularization,
    last_energy: Option<BlockEstimates>,
}

impl<'a> EnergyTargetFunction<'a> {
    pub fn new(ctx: TargetContext<'a>) -> Self {
        Self { ctx, reg: Regularization::default(), last_energy: None }
    }

    pub fn with_regularization(mut self, lambda: f64) -> Self {
        self.reg = Regularization { lambda };
        self
    }

    /// All four energy components of the last evaluation.
    pub fn last_energy(&self) -> Option<&BlockEstimates> {
        self.last_energy.as_ref()
    }

    /// Unregularized energy components `[total, potential, kinetic PB, kinetic JF]` at `x`.
    pub fn energy(&mut self, x: &[f64]) -> Result<BlockEstimates> {
        let obs = vec![energy_observable(&self.ctx)];
        self.ctx.evaluate(x, obs)
    }
}

impl NoisyFunction for EnergyTargetFunction<'_> {
    fn n_dim(&self) -> usize {
        self.ctx.n_vp()
    }

    fn f(&mut self, x: &[f64]) -> Result<NoisyValue> {
        let est = self.energy(x)?;
        let mut value = energy_of(&est);
        value.val += self.reg.value(x);
        self.last_energy = Some(est);
        Ok(value)
    }
}

/// Variational energy and its parameter gradient.
pub struct EnergyGradientTargetFunction<'a> {
    ctx: TargetContext<'a>,
    reg: Regularization,
    grad_n_steps: usize,
}

impl<'a> EnergyGradientTargetFunction<'a> {
    pub fn new(ctx: TargetContext<'a>) -> Result<Self> {
        require_vd1(&ctx)?;
        let grad_n_steps = ctx.n_steps;
        Ok(Self { ctx, reg: Regularization::default(), grad_n_steps })
    }

    /// Use a different number of samples for gradient evaluations.
    pub fn with_gradient_steps(mut self, n_steps: usize) -> Self {
        self.grad_n_steps = n_steps;
        self
    }

    pub fn with_regularization(mut self, lambda: f64) -> Self {
        self.reg = Regularization { lambda };
        self
    }
}

impl NoisyFunction for EnergyGradientTargetFunction<'_> {
    fn n_dim(&self) -> usize {
        self.ctx.n_vp()
    }

    fn f(&mut self, x: &[f64]) -> Result<NoisyValue> {
        let obs = vec![energy_observable(&self.ctx)];
        let est = self.ctx.evaluate(x, obs)?;
        let mut value = energy_of(&est);
        value.val += self.reg.value(x);
        Ok(value)
    }
}

impl NoisyFunctionWithGradient for EnergyGradientTargetFunction<'_> {
    fn fgrad(&mut self, x: &[f64]) -> Result<(NoisyValue, NoisyGradient)> {
        let n_vp = self.ctx.n_vp();
        let obs = vec![
            energy_observable(&self.ctx),
            Box::new(EnergyGradientObservable::new(self.ctx.h.clone(), n_vp)) as Box<dyn Observable>,
        ];
        let est = self.ctx.evaluate_steps(x, obs, self.grad_n_steps)?;
        let mut value = energy_of(&est);
        value.val += self.reg.value(x);
        let mut grad = energy_gradient_of(&est, n_vp);
        self.reg.add_gradient(x, &mut grad);
        debug!("E = {}, |grad| = {:.6}", value, grad.norm());
        Ok((value, grad))
    }
}

/// `iota E + kappa sigma^2(E_L)`, for derivative-free minimizers.
pub struct EnergyVarianceTargetFunction<'a> {
    ctx: TargetContext<'a>,
    iota: f64,
    kappa: f64,
    reg: Regularization,
}

impl<'a> EnergyVarianceTargetFunction<'a> {
    pub fn new(ctx: TargetContext<'a>, iota: f64, kappa: f64) -> Self {
        Self { ctx, iota, kappa, reg: Regularization::default() }
    }

    pub fn with_regularization(mut self, lambda: f64) -> Self {
        self.reg = Regularization { lambda };
        self
    }
}

impl NoisyFunction for EnergyVarianceTargetFunction<'_> {
    fn n_dim(&self) -> usize {
        self.ctx.n_vp()
    }

    fn f(&mut self, x: &[f64]) -> Result<NoisyValue> {
        let obs = vec![
            energy_observable(&self.ctx),
            Box::new(SquaredEnergyObservable::new(self.ctx.h.clone())) as Box<dyn Observable>,
        ];
        let est = self.ctx.evaluate(x, obs)?;
        let e = energy_of(&est);
        let e2 = NoisyValue::new(est.mean[N_ENERGY_COMPONENTS], est.error[N_ENERGY_COMPONENTS]);
        let variance = e2.val - e.val * e.val;
        let d_variance = e2.err + 2.0 * e.val.abs() * e.err;

        let val = self.iota * e.val + self.kappa * variance + self.reg.value(x);
        let err = self.iota.abs() * e.err + self.kappa.abs() * d_variance;
        debug!("E = {}, sigma^2 = {:.6}", e, variance);
        Ok(NoisyValue::new(val, err))
    }
}
