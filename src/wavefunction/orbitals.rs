//! Closed-form primitive orbitals.
//!
//! Exponential models sample through `proto = ln(Psi^2)`, so the acceptance
//! ratio is `exp(new - old)` and the value is `exp(proto / 2)`.
//! Cross derivatives follow from `d/dp (Q Psi) / Psi = dQ/dp + Q * vd1_p`.

use super::derivatives::{Capabilities, Derivatives};
use super::traits::WaveFunction;
use crate::error::{check_n_params, Result, VmcError};

/// `Psi = exp(-b (x - a)^2)`, one particle in 1D, parameters `[a, b]`.
#[derive(Debug, Clone)]
pub struct QuadrExponential1D1POrbital {
    pub a: f64,
    pub b: f64,
}

impl QuadrExponential1D1POrbital {
    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }
}

impl WaveFunction for QuadrExponential1D1POrbital {
    fn n_space_dim(&self) -> usize {
        1
    }

    fn n_part(&self) -> usize {
        1
    }

    fn n_vp(&self) -> usize {
        2
    }

    fn n_proto(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn set_vp(&mut self, vp: &[f64]) -> Result<()> {
        check_n_params(2, vp.len())?;
        self.a = vp[0];
        self.b = vp[1];
        Ok(())
    }

    fn get_vp(&self, vp: &mut [f64]) {
        vp[0] = self.a;
        vp[1] = self.b;
    }

    fn proto_function(&mut self, x: &[f64], proto: &mut [f64]) {
        let dx = x[0] - self.a;
        proto[0] = -2.0 * self.b * dx * dx;
    }

    fn acceptance(&self, proto_old: &[f64], proto_new: &[f64]) -> Result<f64> {
        Ok((proto_new[0] - proto_old[0]).exp())
    }

    fn wf_value(&self, proto: &[f64]) -> f64 {
        (0.5 * proto[0]).exp()
    }

    fn compute_all_derivatives(&mut self, x: &[f64], out: &mut Derivatives) {
        out.reset(1, 2, Capabilities::ALL);
        let dx = x[0] - self.a;
        let d1 = -2.0 * self.b * dx;
        let d2 = -2.0 * self.b + d1 * d1;
        out.d1[0] = d1;
        out.d2[0] = d2;

        let vd1 = [2.0 * self.b * dx, -dx * dx];
        // d(d1)/da, d(d1)/db and d(d2)/da, d(d2)/db
        let dd1 = [2.0 * self.b, -2.0 * dx];
        let dd2 = [2.0 * d1 * dd1[0], -2.0 + 2.0 * d1 * dd1[1]];
        out.vd1[0] = vd1[0];
        out.vd1[1] = vd1[1];
        for p in 0..2 {
            out.d1vd1[(0, p)] = dd1[p] + d1 * vd1[p];
            out.d2vd1[(0, p)] = dd2[p] + d2 * vd1[p];
        }
    }
}

/// `Psi = exp(-b sum_i (x_i - a_i)^2)`, N particles in 1D with fixed
/// centers `a_i` and variational `b`.
#[derive(Debug, Clone)]
pub struct QuadrExponential1DNPOrbital {
    centers: Vec<f64>,
    b: f64,
}

impl QuadrExponential1DNPOrbital {
    pub fn new(centers: Vec<f64>, b: f64) -> Result<Self> {
        if centers.is_empty() {
            return Err(VmcError::Construction("at least one particle required".into()));
        }
        Ok(Self { centers, b })
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers
    }
}

impl WaveFunction for QuadrExponential1DNPOrbital {
    fn n_space_dim(&self) -> usize {
        1
    }

    fn n_part(&self) -> usize {
        self.centers.len()
    }

    fn n_vp(&self) -> usize {
        1
    }

    fn n_proto(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn set_vp(&mut self, vp: &[f64]) -> Result<()> {
        check_n_params(1, vp.len())?;
        self.b = vp[0];
        Ok(())
    }

    fn get_vp(&self, vp: &mut [f64]) {
        vp[0] = self.b;
    }

    fn proto_function(&mut self, x: &[f64], proto: &mut [f64]) {
        let sum: f64 = x.iter()
            .zip(self.centers.iter())
            .map(|(xi, ai)| (xi - ai).powi(2))
            .sum();
        proto[0] = -2.0 * self.b * sum;
    }

    fn acceptance(&self, proto_old: &[f64], proto_new: &[f64]) -> Result<f64> {
        Ok((proto_new[0] - proto_old[0]).exp())
    }

    fn wf_value(&self, proto: &[f64]) -> f64 {
        (0.5 * proto[0]).exp()
    }

    fn compute_all_derivatives(&mut self, x: &[f64], out: &mut Derivatives) {
        let n = self.centers.len();
        out.reset(n, 1, Capabilities::ALL);
        let mut vd1 = 0.0;
        for i in 0..n {
            let dx = x[i] - self.centers[i];
            out.d1[i] = -2.0 * self.b * dx;
            out.d2[i] = -2.0 * self.b * (1.0 + dx * out.d1[i]);
            vd1 -= dx * dx;
        }
        out.vd1[0] = vd1;
        for i in 0..n {
            let dx = x[i] - self.centers[i];
            out.d1vd1[(i, 0)] = -2.0 * dx + out.d1[i] * vd1;
            out.d2vd1[(i, 0)] = -2.0 + 8.0 * self.b * dx * dx + out.d2[i] * vd1;
        }
    }
}

/// `Psi = exp(-b x^2)`, one particle in 1D, parameter `[b]`.
#[derive(Debug, Clone)]
pub struct Gaussian1D1POrbital {
    pub b: f64,
}

impl Gaussian1D1POrbital {
    pub fn new(b: f64) -> Self {
        Self { b }
    }
}

impl WaveFunction for Gaussian1D1POrbital {
    fn n_space_dim(&self) -> usize {
        1
    }

    fn n_part(&self) -> usize {
        1
    }

    fn n_vp(&self) -> usize {
        1
    }

    fn n_proto(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn set_vp(&mut self, vp: &[f64]) -> Result<()> {
        check_n_params(1, vp.len())?;
        self.b = vp[0];
        Ok(())
    }

    fn get_vp(&self, vp: &mut [f64]) {
        vp[0] = self.b;
    }

    fn proto_function(&mut self, x: &[f64], proto: &mut [f64]) {
        proto[0] = -2.0 * self.b * x[0] * x[0];
    }

    fn acceptance(&self, proto_old: &[f64], proto_new: &[f64]) -> Result<f64> {
        Ok((proto_new[0] - proto_old[0]).exp())
    }

    fn wf_value(&self, proto: &[f64]) -> f64 {
        (0.5 * proto[0]).exp()
    }

    fn compute_all_derivatives(&mut self, x: &[f64], out: &mut Derivatives) {
        out.reset(1, 1, Capabilities::ALL);
        let x2 = x[0] * x[0];
        let d1 = -2.0 * self.b * x[0];
        let d2 = -2.0 * self.b + 4.0 * self.b * self.b * x2;
        out.d1[0] = d1;
        out.d2[0] = d2;
        out.vd1[0] = -x2;
        out.d1vd1[(0, 0)] = -2.0 * x[0] - d1 * x2;
        out.d2vd1[(0, 0)] = -2.0 + 8.0 * self.b * x2 - d2 * x2;
    }
}

/// Gaussian with a parameter-independent norm:
/// `Psi = sqrt(a) exp(-a^2 x^2 / 2)`, sampled through `proto = a^2 x^2`.
#[derive(Debug, Clone)]
pub struct ConstNormGaussian1D1POrbital {
    a: f64,
    caps: Capabilities,
}

impl ConstNormGaussian1D1POrbital {
    pub fn new(a: f64, flag_vd1: bool) -> Self {
        let caps = if flag_vd1 { Capabilities::VD1 } else { Capabilities::NONE };
        Self { a, caps }
    }
}

impl WaveFunction for ConstNormGaussian1D1POrbital {
    fn n_space_dim(&self) -> usize {
        1
    }

    fn n_part(&self) -> usize {
        1
    }

    fn n_vp(&self) -> usize {
        1
    }

    fn n_proto(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn set_vp(&mut self, vp: &[f64]) -> Result<()> {
        check_n_params(1, vp.len())?;
        self.a = vp[0];
        Ok(())
    }

    fn get_vp(&self, vp: &mut [f64]) {
        vp[0] = self.a;
    }

    fn proto_function(&mut self, x: &[f64], proto: &mut [f64]) {
        proto[0] = self.a * self.a * x[0] * x[0];
    }

    fn acceptance(&self, proto_old: &[f64], proto_new: &[f64]) -> Result<f64> {
        Ok((proto_old[0] - proto_new[0]).exp())
    }

    fn wf_value(&self, proto: &[f64]) -> f64 {
        self.a.sqrt() * (-0.5 * proto[0]).exp()
    }

    fn compute_all_derivatives(&mut self, x: &[f64], out: &mut Derivatives) {
        out.reset(1, 1, self.caps);
        let asq = self.a * self.a;
        let xsq = x[0] * x[0];
        out.d1[0] = -asq * x[0];
        out.d2[0] = asq * asq * xsq - asq;
        if self.caps.vd1 {
            out.vd1[0] = 0.5 / self.a - self.a * xsq;
        }
    }
}

/// Isotropic Gaussian around a common center for N particles in d dimensions:
/// `Psi = exp(-b sum_i |r_i - c|^2)`, parameter `[b]`.
#[derive(Debug, Clone)]
pub struct IsotropicGaussian {
    n_part: usize,
    center: Vec<f64>,
    b: f64,
}

impl IsotropicGaussian {
    pub fn new(n_part: usize, center: Vec<f64>, b: f64) -> Result<Self> {
        if n_part == 0 || center.is_empty() {
            return Err(VmcError::Construction(
                "isotropic gaussian needs particles and a non-empty center".into(),
            ));
        }
        Ok(Self { n_part, center, b })
    }
}

impl WaveFunction for IsotropicGaussian {
    fn n_space_dim(&self) -> usize {
        self.center.len()
    }

    fn n_part(&self) -> usize {
        self.n_part
    }

    fn n_vp(&self) -> usize {
        1
    }

    fn n_proto(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn set_vp(&mut self, vp: &[f64]) -> Result<()> {
        check_n_params(1, vp.len())?;
        self.b = vp[0];
        Ok(())
    }

    fn get_vp(&self, vp: &mut [f64]) {
        vp[0] = self.b;
    }

    fn proto_function(&mut self, x: &[f64], proto: &mut [f64]) {
        let d = self.center.len();
        let sum: f64 = x.iter()
            .enumerate()
            .map(|(i, xi)| (xi - self.center[i % d]).powi(2))
            .sum();
        proto[0] = -2.0 * self.b * sum;
    }

    fn acceptance(&self, proto_old: &[f64], proto_new: &[f64]) -> Result<f64> {
        Ok((proto_new[0] - proto_old[0]).exp())
    }

    fn wf_value(&self, proto: &[f64]) -> f64 {
        (0.5 * proto[0]).exp()
    }

    fn compute_all_derivatives(&mut self, x: &[f64], out: &mut Derivatives) {
        let d = self.center.len();
        let ndim = d * self.n_part;
        out.reset(ndim, 1, Capabilities::ALL);
        let mut vd1 = 0.0;
        for i in 0..ndim {
            let dx = x[i] - self.center[i % d];
            out.d1[i] = -2.0 * self.b * dx;
            out.d2[i] = -2.0 * self.b + out.d1[i] * out.d1[i];
            vd1 -= dx * dx;
        }
        out.vd1[0] = vd1;
        for i in 0..ndim {
            let dx = x[i] - self.center[i % d];
            let d1 = out.d1[i];
            // d(d1)/db = -2 dx, d(d2)/db = -2 + 2 d1 d(d1)/db
            out.d1vd1[(i, 0)] = -2.0 * dx + d1 * vd1;
            out.d2vd1[(i, 0)] = -2.0 - 4.0 * d1 * dx + out.d2[i] * vd1;
        }
    }
}
