//! Two-body Jastrow correlation factors.
//!
//! `J(R) = exp(sum_{i<j} u(r_ij))` for any pair pseudo-potential `u`.
//! The Jastrow samples through `proto = sum u`, so the acceptance is
//! `exp(2 (new - old))` and the value is `exp(proto)`.

use serde::{Deserialize, Serialize};

use crate::error::{check_n_params, Result, VmcError};
use crate::wavefunction::{Capabilities, Derivatives, WaveFunction};

/// Radial pair pseudo-potential `u(r)`.
///
/// Parameter derivatives are only called when the matching capability
/// flag is set; `out` has length `n_vp`.
pub trait PairPotential {
    fn n_vp(&self) -> usize;
    fn capabilities(&self) -> Capabilities;
    fn set_vp(&mut self, vp: &[f64]) -> Result<()>;
    fn get_vp(&self, vp: &mut [f64]);

    fn u(&self, r: f64) -> f64;
    fn du(&self, r: f64) -> f64;
    fn d2u(&self, r: f64) -> f64;

    fn u_vd1(&self, _r: f64, _out: &mut [f64]) {}
    fn du_vd1(&self, _r: f64, _out: &mut [f64]) {}
    fn d2u_vd1(&self, _r: f64, _out: &mut [f64]) {}
}

/// `u(r) = a r^2 + b r^3`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PolynomialU2 {
    pub a: f64,
    pub b: f64,
}

impl PairPotential for PolynomialU2 {
    fn n_vp(&self) -> usize {
        2
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

    fn u(&self, r: f64) -> f64 {
        self.a * r * r + self.b * r * r * r
    }

    fn du(&self, r: f64) -> f64 {
        2.0 * self.a * r + 3.0 * self.b * r * r
    }

    fn d2u(&self, r: f64) -> f64 {
        2.0 * self.a + 6.0 * self.b * r
    }

    fn u_vd1(&self, r: f64, out: &mut [f64]) {
        out[0] = r * r;
        out[1] = r * r * r;
    }

    fn du_vd1(&self, r: f64, out: &mut [f64]) {
        out[0] = 2.0 * r;
        out[1] = 3.0 * r * r;
    }

    fn d2u_vd1(&self, r: f64, out: &mut [f64]) {
        out[0] = 2.0;
        out[1] = 6.0 * r;
    }
}

/// `u(r) = b / r^5`, the short-range repulsion used for helium.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InversePowerU2 {
    pub b: f64,
}

impl PairPotential for InversePowerU2 {
    fn n_vp(&self) -> usize {
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

    fn u(&self, r: f64) -> f64 {
        self.b / r.powi(5)
    }

    fn du(&self, r: f64) -> f64 {
        -5.0 * self.b / r.powi(6)
    }

    fn d2u(&self, r: f64) -> f64 {
        30.0 * self.b / r.powi(7)
    }

    fn u_vd1(&self, r: f64, out: &mut [f64]) {
        out[0] = 1.0 / r.powi(5);
    }

    fn du_vd1(&self, r: f64, out: &mut [f64]) {
        out[0] = -5.0 / r.powi(6);
    }

    fn d2u_vd1(&self, r: f64, out: &mut [f64]) {
        out[0] = 30.0 / r.powi(7);
    }
}

/// `u(r) = K`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FlatU2 {
    pub k: f64,
}

impl PairPotential for FlatU2 {
    fn n_vp(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn set_vp(&mut self, vp: &[f64]) -> Result<()> {
        check_n_params(1, vp.len())?;
        self.k = vp[0];
        Ok(())
    }

    fn get_vp(&self, vp: &mut [f64]) {
        vp[0] = self.k;
    }

    fn u(&self, _r: f64) -> f64 {
        self.k
    }

    fn du(&self, _r: f64) -> f64 {
        0.0
    }

    fn d2u(&self, _r: f64) -> f64 {
        0.0
    }

    fn u_vd1(&self, _r: f64, out: &mut [f64]) {
        out[0] = 1.0;
    }

    fn du_vd1(&self, _r: f64, out: &mut [f64]) {
        out[0] = 0.0;
    }

    fn d2u_vd1(&self, _r: f64, out: &mut [f64]) {
        out[0] = 0.0;
    }
}

/// Electron-electron cusp form: `u(r) = -F / (2 (1 + r / F))`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PadeU2 {
    /// Correlation parameter controlling electron-electron cusp
    pub cusp_param: f64,
}

impl PairPotential for PadeU2 {
    fn n_vp(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn set_vp(&mut self, vp: &[f64]) -> Result<()> {
        check_n_params(1, vp.len())?;
        self.cusp_param = vp[0];
        Ok(())
    }

    fn get_vp(&self, vp: &mut [f64]) {
        vp[0] = self.cusp_param;
    }

    fn u(&self, r: f64) -> f64 {
        let f = self.cusp_param;
        -f / (2.0 * (1.0 + r / f))
    }

    fn du(&self, r: f64) -> f64 {
        let f = self.cusp_param;
        f * f / (2.0 * (f + r).powi(2))
    }

    fn d2u(&self, r: f64) -> f64 {
        let f = self.cusp_param;
        -f * f / (f + r).powi(3)
    }

    fn u_vd1(&self, r: f64, out: &mut [f64]) {
        let f = self.cusp_param;
        out[0] = -(f * f + 2.0 * f * r) / (2.0 * (f + r).powi(2));
    }

    fn du_vd1(&self, r: f64, out: &mut [f64]) {
        let f = self.cusp_param;
        out[0] = f * r / (f + r).powi(3);
    }

    fn d2u_vd1(&self, r: f64, out: &mut [f64]) {
        let f = self.cusp_param;
        out[0] = (f * f - 2.0 * f * r) / (f + r).powi(4);
    }
}

/// `J(R) = exp(sum_{i<j} u(r_ij))` for `n_part` particles in `n_space_dim`
/// dimensions.
pub struct TwoBodyJastrow {
    n_space_dim: usize,
    n_part: usize,
    u2: Box<dyn PairPotential>,
}

impl TwoBodyJastrow {
    pub fn new(n_space_dim: usize, n_part: usize, u2: Box<dyn PairPotential>) -> Result<Self> {
        u2.capabilities().validate()?;
        if n_space_dim == 0 || n_part < 2 {
            return Err(VmcError::Construction(format!(
                "jastrow needs at least two particles in one or more dimensions, got {} x {}",
                n_part, n_space_dim
            )));
        }
        Ok(Self { n_space_dim, n_part, u2 })
    }

    pub fn potential(&self) -> &dyn PairPotential {
        self.u2.as_ref()
    }

    /// Generate all unique particle pairs (i, j) with i < j.
    fn unique_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.n_part).flat_map(move |i| ((i + 1)..self.n_part).map(move |j| (i, j)))
    }

    fn distance(&self, x: &[f64], i: usize, j: usize) -> f64 {
        let d = self.n_space_dim;
        (0..d).map(|c| (x[i * d + c] - x[j * d + c]).powi(2)).sum::<f64>().sqrt()
    }
}

impl WaveFunction for TwoBodyJastrow {
    fn n_space_dim(&self) -> usize {
        self.n_space_dim
    }

    fn n_part(&self) -> usize {
        self.n_part
    }

    fn n_vp(&self) -> usize {
        self.u2.n_vp()
    }

    fn n_proto(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        self.u2.capabilities()
    }

    fn set_vp(&mut self, vp: &[f64]) -> Result<()> {
        self.u2.set_vp(vp)
    }

    fn get_vp(&self, vp: &mut [f64]) {
        self.u2.get_vp(vp)
    }

    fn proto_function(&mut self, x: &[f64], proto: &mut [f64]) {
        proto[0] = self.unique_pairs().map(|(i, j)| self.u2.u(self.distance(x, i, j))).sum();
    }

    fn acceptance(&self, proto_old: &[f64], proto_new: &[f64]) -> Result<f64> {
        Ok((2.0 * (proto_new[0] - proto_old[0])).exp())
    }

    fn wf_value(&self, proto: &[f64]) -> f64 {
        proto[0].exp()
    }

    fn compute_all_derivatives(&mut self, x: &[f64], out: &mut Derivatives) {
        let d = self.n_space_dim;
        let ndim = d * self.n_part;
        let nvp = self.u2.n_vp();
        let caps = self.u2.capabilities();
        out.reset(ndim, nvp, caps);

        // gradient and laplacian of the exponent, and their parameter derivatives
        let mut g = vec![0.0; ndim];
        let mut h = vec![0.0; ndim];
        let mut dg = vec![0.0; ndim * nvp];
        let mut dh = vec![0.0; ndim * nvp];
        let mut u_vd1 = vec![0.0; nvp];
        let mut du_vd1 = vec![0.0; nvp];
        let mut d2u_vd1 = vec![0.0; nvp];

        let pairs: Vec<(usize, usize)> = self.unique_pairs().collect();
        for (i, j) in pairs {
            let r = self.distance(x, i, j);
            if caps.vd1 {
                self.u2.u_vd1(r, &mut u_vd1);
                for p in 0..nvp {
                    out.vd1[p] += u_vd1[p];
                }
            }
            // coinciding particles have no pair direction
            if r == 0.0 {
                continue;
            }
            let du = self.u2.du(r);
            let d2u = self.u2.d2u(r);
            if caps.d1vd1 {
                self.u2.du_vd1(r, &mut du_vd1);
            }
            if caps.d2vd1 {
                self.u2.d2u_vd1(r, &mut d2u_vd1);
            }
            for c in 0..d {
                let delta = x[i * d + c] - x[j * d + c];
                let dir = delta / r;
                // d(dir)/dx_i along the same axis
                let ddir = 1.0 / r - delta * delta / (r * r * r);
                g[i * d + c] += du * dir;
                g[j * d + c] -= du * dir;
                let lap = d2u * dir * dir + du * ddir;
                h[i * d + c] += lap;
                h[j * d + c] += lap;
                for p in 0..nvp {
                    if caps.d1vd1 {
                        dg[(i * d + c) * nvp + p] += du_vd1[p] * dir;
                        dg[(j * d + c) * nvp + p] -= du_vd1[p] * dir;
                    }
                    if caps.d2vd1 {
                        let dlap = d2u_vd1[p] * dir * dir + du_vd1[p] * ddir;
                        dh[(i * d + c) * nvp + p] += dlap;
                        dh[(j * d + c) * nvp + p] += dlap;
                    }
                }
            }
        }

        for k in 0..ndim {
            out.d1[k] = g[k];
            out.d2[k] = h[k] + g[k] * g[k];
            for p in 0..nvp {
                let dgk = dg[k * nvp + p];
                if caps.d1vd1 {
                    out.d1vd1[(k, p)] = dgk + g[k] * out.vd1[p];
                }
                if caps.d2vd1 {
                    out.d2vd1[(k, p)] = dh[k * nvp + p] + 2.0 * g[k] * dgk + out.d2[k] * out.vd1[p];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct BrokenU2;

    impl PairPotential for BrokenU2 {
        fn n_vp(&self) -> usize {
            1
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities { vd1: true, d1vd1: false, d2vd1: true }
        }

        fn set_vp(&mut self, _vp: &[f64]) -> Result<()> {
            Ok(())
        }

        fn get_vp(&self, vp: &mut [f64]) {
            vp[0] = 0.0;
        }

        fn u(&self, _r: f64) -> f64 {
            0.0
        }

        fn du(&self, _r: f64) -> f64 {
            0.0
        }

        fn d2u(&self, _r: f64) -> f64 {
            0.0
        }
    }

    #[test]
    fn test_rejects_unordered_capabilities() {
        let res = TwoBodyJastrow::new(3, 2, Box::new(BrokenU2));
        assert!(matches!(res, Err(VmcError::Construction(_))));
    }

    #[test]
    fn test_pade_value_matches_cusp_form() {
        let f = 0.8;
        let mut jastrow = TwoBodyJastrow::new(3, 2, Box::new(PadeU2 { cusp_param: f })).unwrap();
        let x = [0.1, 0.2, 0.3, -0.4, 0.5, 1.0];
        let r12 = ((0.5f64).powi(2) + (0.3f64).powi(2) + (0.7f64).powi(2)).sqrt();
        let expected = (-f / (2.0 * (1.0 + r12 / f))).exp();
        assert_relative_eq!(jastrow.value(&x), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_potential_is_constant() {
        let mut jastrow = TwoBodyJastrow::new(1, 3, Box::new(FlatU2 { k: 0.25 })).unwrap();
        let d = jastrow.derivatives(&[0.0, 1.0, 3.0]);
        assert!(d.d1.iter().all(|v| *v == 0.0));
        assert!(d.d2.iter().all(|v| *v == 0.0));
        // three pairs contribute dK = 1 each
        assert_relative_eq!(d.vd1[0], 3.0);
        assert_relative_eq!(jastrow.value(&[0.0, 1.0, 3.0]), (0.75f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_two_particle_gradient_1d() {
        let mut jastrow = TwoBodyJastrow::new(1, 2, Box::new(PolynomialU2 { a: 0.3, b: -0.1 })).unwrap();
        let x = [1.2, 0.2];
        let d = jastrow.derivatives(&x);
        let du = 2.0 * 0.3 * 1.0 + 3.0 * -0.1 * 1.0;
        assert_relative_eq!(d.d1[0], du, epsilon = 1e-12);
        assert_relative_eq!(d.d1[1], -du, epsilon = 1e-12);
        // in 1D the laplacian of u is just u''
        let d2u = 2.0 * 0.3 + 6.0 * -0.1 * 1.0;
        assert_relative_eq!(d.d2[0], d2u + du * du, epsilon = 1e-12);
    }

    #[test]
    fn test_coinciding_particles_stay_finite() {
        let mut jastrow = TwoBodyJastrow::new(2, 3, Box::new(PolynomialU2 { a: 0.3, b: -0.1 })).unwrap();
        let x = [0.5, 0.5, 0.5, 0.5, 1.5, 0.5];
        let d = jastrow.derivatives(&x);
        assert!(d.is_finite());
        // only the separated pairs (r = 1) push the shared site apart
        let du = 2.0 * 0.3 + 3.0 * -0.1;
        assert_relative_eq!(d.d1[0], -du, epsilon = 1e-12);
        assert_relative_eq!(d.d1[4], 2.0 * du, epsilon = 1e-12);
        assert_relative_eq!(d.vd1[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(d.vd1[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_acceptance() {
        let jastrow = TwoBodyJastrow::new(3, 2, Box::new(PadeU2 { cusp_param: 1.0 })).unwrap();
        assert_relative_eq!(jastrow.acceptance(&[0.1], &[0.3]).unwrap(), (0.4f64).exp(), epsilon = 1e-12);
    }
}
