//! Wave function trait for VMC calculations.
//!
//! Models are never evaluated through their raw value during sampling.
//! Instead each model produces one or more *proto-values* from the
//! coordinates; the sampler only needs the acceptance ratio between two
//! proto-value sets, and the true value can be rebuilt on request.
//!
//! Coordinates are a flat slice laid out particle-major:
//! `x[i * n_space_dim + j]` is coordinate `j` of particle `i`.

use super::derivatives::{Capabilities, Derivatives};
use crate::error::Result;

/// Trial wave function with analytic derivatives.
pub trait WaveFunction {
    /// Number of space dimensions per particle.
    fn n_space_dim(&self) -> usize;

    /// Number of particles.
    fn n_part(&self) -> usize;

    /// Number of variational parameters.
    fn n_vp(&self) -> usize;

    /// Number of proto-values produced by `proto_function`.
    fn n_proto(&self) -> usize;

    /// Parameter derivatives this model computes.
    fn capabilities(&self) -> Capabilities;

    /// Set the variational parameters.
    fn set_vp(&mut self, vp: &[f64]) -> Result<()>;

    /// Copy the variational parameters into `vp` (length `n_vp`).
    fn get_vp(&self, vp: &mut [f64]);

    /// Compute the proto-values at `x`.
    fn proto_function(&mut self, x: &[f64], proto: &mut [f64]);

    /// Metropolis acceptance ratio `|Psi(new)|^2 / |Psi(old)|^2`.
    fn acceptance(&self, proto_old: &[f64], proto_new: &[f64]) -> Result<f64>;

    /// Rebuild the wave-function value from proto-values.
    fn wf_value(&self, proto: &[f64]) -> f64;

    /// Fill `out` with every derivative at `x`, divided by the value.
    ///
    /// `out` is reshaped if needed and always overwritten completely.
    fn compute_all_derivatives(&mut self, x: &[f64], out: &mut Derivatives);

    /// Called by the sampler after a move was accepted.
    fn new_to_old(&mut self) {}

    /// Called by the sampler after a move was rejected.
    fn old_to_new(&mut self) {}

    /// Total number of coordinates.
    fn total_dim(&self) -> usize {
        self.n_space_dim() * self.n_part()
    }

    /// Variational parameters as a new vector.
    fn vp(&self) -> Vec<f64> {
        let mut vp = vec![0.0; self.n_vp()];
        self.get_vp(&mut vp);
        vp
    }

    /// Sampling density `Psi^2` from proto-values.
    fn sampling_function(&self, proto: &[f64]) -> f64 {
        let v = self.wf_value(proto);
        v * v
    }

    /// Evaluate `Psi(x)` through the proto-values.
    fn value(&mut self, x: &[f64]) -> f64 {
        let mut proto = vec![0.0; self.n_proto()];
        self.proto_function(x, &mut proto);
        self.wf_value(&proto)
    }

    /// An empty buffer shaped for this model.
    fn new_derivatives(&self) -> Derivatives {
        Derivatives::new(self.total_dim(), self.n_vp(), self.capabilities())
    }

    /// Compute all derivatives into a fresh buffer.
    fn derivatives(&mut self, x: &[f64]) -> Derivatives {
        let mut out = self.new_derivatives();
        self.compute_all_derivatives(x, &mut out);
        out
    }

    /// Central finite-difference estimate of every derivative the model
    /// exposes.
    ///
    /// `d1`, `d2` and `vd1` come from value evaluations with steps `hx` in
    /// the coordinates and `hp` in the parameters. The mixed terms difference
    /// the analytic `d1`/`d2` in each parameter and use
    /// `d1vd1 = ∂p d1 + d1 * vd1`, `d2vd1 = ∂p d2 + d2 * vd1`, so they are
    /// only as independent as `d1`/`d2` themselves, which are checked first.
    ///
    /// Only meaningful for deterministic models. Parameters are restored
    /// before returning.
    fn numerical_derivatives(&mut self, x: &[f64], hx: f64, hp: f64) -> Result<Derivatives> {
        let caps = self.capabilities();
        let ndim = self.total_dim();
        let nvp = self.n_vp();
        let vp0 = self.vp();
        let mut out = Derivatives::new(ndim, nvp, caps);
        let psi = self.value(x);

        let mut xs = x.to_vec();
        for i in 0..ndim {
            xs[i] = x[i] + hx;
            let f_fwd = self.value(&xs);
            xs[i] = x[i] - hx;
            let f_bwd = self.value(&xs);
            xs[i] = x[i];
            out.d1[i] = (f_fwd - f_bwd) / (2.0 * hx * psi);
            out.d2[i] = (f_fwd - 2.0 * psi + f_bwd) / (hx * hx * psi);
        }

        if caps.vd1 {
            let mut vp = vp0.clone();
            for p in 0..nvp {
                vp[p] = vp0[p] + hp;
                self.set_vp(&vp)?;
                let f_fwd = self.value(x);
                vp[p] = vp0[p] - hp;
                self.set_vp(&vp)?;
                let f_bwd = self.value(x);
                vp[p] = vp0[p];
                out.vd1[p] = (f_fwd - f_bwd) / (2.0 * hp * psi);
            }
            self.set_vp(&vp0)?;
        }

        if caps.d1vd1 || caps.d2vd1 {
            let base = self.derivatives(x);
            let mut vp = vp0.clone();
            for p in 0..nvp {
                vp[p] = vp0[p] + hp;
                self.set_vp(&vp)?;
                let fwd = self.derivatives(x);
                vp[p] = vp0[p] - hp;
                self.set_vp(&vp)?;
                let bwd = self.derivatives(x);
                vp[p] = vp0[p];
                self.set_vp(&vp)?;

                for i in 0..ndim {
                    if caps.d1vd1 {
                        out.d1vd1[(i, p)] = (fwd.d1[i] - bwd.d1[i]) / (2.0 * hp) + base.d1[i] * out.vd1[p];
                    }
                    if caps.d2vd1 {
                        out.d2vd1[(i, p)] = (fwd.d2[i] - bwd.d2[i]) / (2.0 * hp) + base.d2[i] * out.vd1[p];
                    }
                }
            }
        }

        Ok(out)
    }
}
