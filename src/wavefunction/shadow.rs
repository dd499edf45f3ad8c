//! Shadow wave function.
//!
//! Each coordinate is coupled to shadow coordinates through a Gaussian
//! kernel `exp(-(x - s)^2 / tau)`, and the shadows are weighted by pure
//! shadow wave functions. The integral over the shadows is estimated by
//! drawing `M` pairs `s1, s2 ~ N(x, tau / 2)` each time a proto-value is
//! computed, so proto-values and derivatives are themselves stochastic.
//!
//! The draws of the latest proto-value evaluation are kept and reused by
//! [`WaveFunction::compute_all_derivatives`]. The sampler hooks
//! `new_to_old` / `old_to_new` keep them in sync with the walker.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use super::derivatives::{Capabilities, Derivatives};
use super::traits::WaveFunction;
use crate::error::{check_n_params, Result, VmcError};

pub struct ShadowWaveFunction {
    n_space_dim: usize,
    n_part: usize,
    tau: f64,
    n_sampling: usize,
    caps: Capabilities,
    pure: Vec<Box<dyn WaveFunction>>,
    pure_derivs: Vec<Derivatives>,
    n_vp: usize,
    rng: StdRng,
    s1: Vec<Vec<f64>>,
    s2: Vec<Vec<f64>>,
    s1_old: Vec<Vec<f64>>,
    s2_old: Vec<Vec<f64>>,
}

impl ShadowWaveFunction {
    /// Kernel width `tau` is the first variational parameter.
    pub fn new(
        n_space_dim: usize,
        n_part: usize,
        tau: f64,
        n_sampling: usize,
        caps: Capabilities,
    ) -> Result<Self> {
        caps.validate()?;
        check_tau(tau)?;
        if n_sampling == 0 {
            return Err(VmcError::Construction("at least one shadow sample is required".into()));
        }
        let ndim = n_space_dim * n_part;
        let shadows = vec![vec![0.0; ndim]; n_sampling];
        Ok(Self {
            n_space_dim,
            n_part,
            tau,
            n_sampling,
            caps,
            pure: Vec::new(),
            pure_derivs: Vec::new(),
            n_vp: 1,
            rng: StdRng::from_entropy(),
            s1: shadows.clone(),
            s2: shadows.clone(),
            s1_old: shadows.clone(),
            s2_old: shadows,
        })
    }

    /// Reseed the shadow generator for reproducible draws.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn add_pure_shadow(&mut self, wf: Box<dyn WaveFunction>) -> Result<()> {
        if wf.n_space_dim() != self.n_space_dim || wf.n_part() != self.n_part {
            return Err(VmcError::Construction(format!(
                "pure shadow has {} dims x {} particles, shadow has {} x {}",
                wf.n_space_dim(),
                wf.n_part(),
                self.n_space_dim,
                self.n_part
            )));
        }
        if self.caps.vd1 && !wf.capabilities().vd1 {
            return Err(VmcError::Construction(
                "pure shadow must provide parameter derivatives".into(),
            ));
        }
        self.n_vp += wf.n_vp();
        self.pure_derivs.push(wf.new_derivatives());
        self.pure.push(wf);
        Ok(())
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn n_sampling(&self) -> usize {
        self.n_sampling
    }

    /// Current shadow draws `(s1, s2)`.
    pub fn shadows(&self) -> (&[Vec<f64>], &[Vec<f64>]) {
        (&self.s1, &self.s2)
    }

    /// Draw `M` fresh shadow pairs around `x`.
    pub fn draw_shadows(&mut self, x: &[f64]) {
        let sigma = (0.5 * self.tau).sqrt();
        for m in 0..self.n_sampling {
            for (i, &xi) in x.iter().enumerate() {
                let z1: f64 = self.rng.sample(StandardNormal);
                let z2: f64 = self.rng.sample(StandardNormal);
                self.s1[m][i] = xi + sigma * z1;
                self.s2[m][i] = xi + sigma * z2;
            }
        }
    }

    /// Proto-value from the stored draws:
    /// `(sum_m sum_pure psi(s1_m)) * (sum_m sum_pure psi(s2_m))`.
    pub fn proto_from_shadows(&mut self) -> f64 {
        let mut sum1 = 0.0;
        let mut sum2 = 0.0;
        for m in 0..self.n_sampling {
            for wf in self.pure.iter_mut() {
                sum1 += wf.value(&self.s1[m]);
                sum2 += wf.value(&self.s2[m]);
            }
        }
        sum1 * sum2
    }
}

fn check_tau(tau: f64) -> Result<()> {
    if !(tau.is_finite() && tau > 0.0) {
        return Err(VmcError::Numerical(format!("shadow kernel width must be positive, got {}", tau)));
    }
    Ok(())
}

impl WaveFunction for ShadowWaveFunction {
    fn n_space_dim(&self) -> usize {
        self.n_space_dim
    }

    fn n_part(&self) -> usize {
        self.n_part
    }

    fn n_vp(&self) -> usize {
        self.n_vp
    }

    fn n_proto(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn set_vp(&mut self, vp: &[f64]) -> Result<()> {
        check_n_params(self.n_vp, vp.len())?;
        check_tau(vp[0])?;
        self.tau = vp[0];
        let mut offset = 1;
        for wf in self.pure.iter_mut() {
            let n = wf.n_vp();
            wf.set_vp(&vp[offset..offset + n])?;
            offset += n;
        }
        Ok(())
    }

    fn get_vp(&self, vp: &mut [f64]) {
        vp[0] = self.tau;
        let mut offset = 1;
        for wf in &self.pure {
            let n = wf.n_vp();
            wf.get_vp(&mut vp[offset..offset + n]);
            offset += n;
        }
    }

    fn proto_function(&mut self, x: &[f64], proto: &mut [f64]) {
        self.draw_shadows(x);
        proto[0] = self.proto_from_shadows();
    }

    fn acceptance(&self, proto_old: &[f64], proto_new: &[f64]) -> Result<f64> {
        if self.pure.is_empty() {
            return Ok(1.0);
        }
        if proto_old[0] == 0.0 {
            return Err(VmcError::Numerical("shadow acceptance from a zero-valued configuration".into()));
        }
        Ok(proto_new[0] / proto_old[0])
    }

    fn wf_value(&self, proto: &[f64]) -> f64 {
        proto[0].abs().sqrt()
    }

    fn compute_all_derivatives(&mut self, x: &[f64], out: &mut Derivatives) {
        let ndim = self.total_dim();
        out.reset(ndim, self.n_vp, self.caps);
        let norm = 1.0 / (2 * self.n_sampling) as f64;
        let two_div_tau = 2.0 / self.tau;
        let inv_tau = 1.0 / self.tau;

        // mean of the kernel log-derivative A = -2 (x - s) / tau and of A^2
        let mut mean_a_sq = vec![0.0; ndim];
        for i in 0..ndim {
            let mut a = 0.0;
            let mut a_sq = 0.0;
            for m in 0..self.n_sampling {
                for s in [self.s1[m][i], self.s2[m][i]] {
                    let ai = -two_div_tau * (x[i] - s);
                    a += ai;
                    a_sq += ai * ai;
                }
            }
            out.d1[i] = a * norm;
            mean_a_sq[i] = a_sq * norm;
            out.d2[i] = mean_a_sq[i] - two_div_tau;
        }

        if !self.caps.vd1 {
            return;
        }

        let mut dist_sq = 0.0;
        for m in 0..self.n_sampling {
            for i in 0..ndim {
                dist_sq += (x[i] - self.s1[m][i]).powi(2) + (x[i] - self.s2[m][i]).powi(2);
            }
        }
        out.vd1[0] = dist_sq * norm * inv_tau * inv_tau;

        let mut offset = 1;
        for (wf, pd) in self.pure.iter_mut().zip(self.pure_derivs.iter_mut()) {
            let n = wf.n_vp();
            for m in 0..self.n_sampling {
                for s in [&self.s1[m], &self.s2[m]] {
                    wf.compute_all_derivatives(s, pd);
                    for p in 0..n {
                        out.vd1[offset + p] += pd.vd1[p];
                    }
                }
            }
            for p in 0..n {
                out.vd1[offset + p] *= norm;
            }
            offset += n;
        }

        if self.caps.d1vd1 {
            for i in 0..ndim {
                for p in 0..self.n_vp {
                    out.d1vd1[(i, p)] = out.d1[i] * out.vd1[p];
                }
                out.d1vd1[(i, 0)] -= out.d1[i] * inv_tau;
            }
        }

        if self.caps.d2vd1 {
            for i in 0..ndim {
                for p in 0..self.n_vp {
                    out.d2vd1[(i, p)] = out.d2[i] * out.vd1[p];
                }
                out.d2vd1[(i, 0)] += 2.0 * inv_tau * inv_tau - two_div_tau * mean_a_sq[i];
            }
        }
    }

    fn new_to_old(&mut self) {
        self.s1_old.clone_from(&self.s1);
        self.s2_old.clone_from(&self.s2);
    }

    fn old_to_new(&mut self) {
        self.s1.clone_from(&self.s1_old);
        self.s2.clone_from(&self.s2_old);
    }
}
