//! Stochastic Reconfiguration (SR) target function.
//!
//! The reported gradient is the natural gradient `S^-1 g`, where
//!
//! - S_ij = <O_i O_j> - <O_i><O_j>   (overlap/covariance matrix)
//! - g_i  = 2 (<E_L O_i> - <E_L><O_i>)   (energy gradient)
//! - O_i  = d ln|Psi| / dp_i          (log-derivatives)
//!
//! so any gradient-based minimizer stepping against it performs SR.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use super::energy::{energy_gradient_of, require_vd1};
use super::noisy::{NoisyFunction, NoisyFunctionWithGradient, NoisyGradient, NoisyValue, Regularization};
use super::TargetContext;
use crate::error::Result;
use crate::hamiltonian::N_ENERGY_COMPONENTS;
use crate::sampling::{
    BlockEstimates, EnergyObservable, Observable, StochasticReconfigurationObservable,
};

/// Solve `S x = g` through LU. Errors map as `|S^-1| err`.
///
/// Returns `None` when `S` is singular.
pub fn solve_sr(s: &DMatrix<f64>, grad: &NoisyGradient) -> Option<NoisyGradient> {
    let lu = s.clone().lu();
    let g = DVector::from_column_slice(&grad.val);
    let sol = lu.solve(&g)?;
    let inv = lu.try_inverse()?;
    let err = DVector::from_column_slice(&grad.err);
    let sol_err = inv.map(|v| v.abs()) * err;
    Some(NoisyGradient {
        val: sol.iter().copied().collect(),
        err: sol_err.iter().copied().collect(),
    })
}

pub struct StochasticReconfigurationTargetFunction<'a> {
    ctx: TargetContext<'a>,
    /// Diagonal shift added to S
    epsilon: f64,
    reg: Regularization,
    last_s: Option<DMatrix<f64>>,
}

impl<'a> StochasticReconfigurationTargetFunction<'a> {
    pub fn new(ctx: TargetContext<'a>, epsilon: f64) -> Result<Self> {
        require_vd1(&ctx)?;
        Ok(Self { ctx, epsilon, reg: Regularization::default(), last_s: None })
    }

    pub fn with_regularization(mut self, lambda: f64) -> Self {
        self.reg = Regularization { lambda };
        self
    }

    /// Overlap matrix of the last gradient evaluation, shift included.
    pub fn last_s_matrix(&self) -> Option<&DMatrix<f64>> {
        self.last_s.as_ref()
    }

    fn build_s_matrix(&self, est: &BlockEstimates, n_vp: usize) -> DMatrix<f64> {
        let o = &est.mean[N_ENERGY_COMPONENTS..N_ENERGY_COMPONENTS + n_vp];
        let oo = &est.mean[N_ENERGY_COMPONENTS + 2 * n_vp..];
        let mut s = DMatrix::zeros(n_vp, n_vp);
        for i in 0..n_vp {
            for j in i..n_vp {
                let k = StochasticReconfigurationObservable::triangle_index(n_vp, i, j);
                let sij = oo[k] - o[i] * o[j];
                s[(i, j)] = sij;
                s[(j, i)] = sij;
            }
            s[(i, i)] += self.epsilon;
        }
        s
    }
}

impl NoisyFunction for StochasticReconfigurationTargetFunction<'_> {
    fn n_dim(&self) -> usize {
        self.ctx.n_vp()
    }

    fn f(&mut self, x: &[f64]) -> Result<NoisyValue> {
        let obs: Vec<Box<dyn Observable>> = vec![Box::new(EnergyObservable::new(self.ctx.h.clone()))];
        let est = self.ctx.evaluate(x, obs)?;
        Ok(NoisyValue::new(est.mean[0] + self.reg.value(x), est.error[0]))
    }
}

impl NoisyFunctionWithGradient for StochasticReconfigurationTargetFunction<'_> {
    fn fgrad(&mut self, x: &[f64]) -> Result<(NoisyValue, NoisyGradient)> {
        let n_vp = self.ctx.n_vp();
        let obs: Vec<Box<dyn Observable>> = vec![
            Box::new(EnergyObservable::new(self.ctx.h.clone())),
            Box::new(StochasticReconfigurationObservable::new(self.ctx.h.clone(), n_vp)),
        ];
        let est = self.ctx.evaluate(x, obs)?;
        let value = NoisyValue::new(est.mean[0] + self.reg.value(x), est.error[0]);

        let mut grad = energy_gradient_of(&est, n_vp);
        self.reg.add_gradient(x, &mut grad);

        let s = self.build_s_matrix(&est, n_vp);
        let natural = match solve_sr(&s, &grad) {
            Some(natural) => natural,
            None => {
                warn!("SR overlap matrix is singular, falling back to the plain gradient");
                grad
            }
        };
        debug!("E = {}, |S^-1 g| = {:.6}", value, natural.norm());
        self.last_s = Some(s);
        Ok((value, natural))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hamiltonian::{Hamiltonian, HarmonicOscillator};
    use crate::sampling::{MCMCParams, MetropolisSampler, SingleProcess};
    use crate::wavefunction::Gaussian1D1POrbital;
    use approx::assert_relative_eq;
    use std::rc::Rc;

    #[test]
    fn test_solve_known_s() {
        let s = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 4.0]);
        let g = NoisyGradient { val: vec![2.0, 4.0], err: vec![0.2, 0.4] };
        let sol = solve_sr(&s, &g).unwrap();
        assert_relative_eq!(sol.val[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(sol.val[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(sol.err[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(sol.err[1], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_s() {
        let s = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let g = NoisyGradient { val: vec![1.0, 1.0], err: vec![0.0, 0.0] };
        assert!(solve_sr(&s, &g).is_none());
    }

    #[test]
    fn test_natural_gradient_sign() {
        let h: Rc<dyn Hamiltonian> = Rc::new(HarmonicOscillator::new(1.0, 1, 1));
        let mut wf = Gaussian1D1POrbital::new(0.3);
        let mut sampler = MetropolisSampler::new(MCMCParams { seed: Some(12), ..MCMCParams::default() });
        let collective = SingleProcess;
        let ctx = TargetContext::new(&mut wf, h, &mut sampler, &collective, 20000);
        let mut target = StochasticReconfigurationTargetFunction::new(ctx, 1e-4).unwrap();

        let (_, g) = target.fgrad(&[0.3]).unwrap();
        // S is a positive variance, so the natural gradient keeps the sign
        assert!(g.val[0] < 0.0);
        let s = target.last_s_matrix().unwrap();
        assert!(s[(0, 0)] > 0.0);
    }
}
