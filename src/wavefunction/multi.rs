//! Product of wave functions sharing the same coordinates.

use super::derivatives::{Capabilities, Derivatives};
use super::traits::WaveFunction;
use crate::error::{check_n_params, Result, VmcError};

struct Component {
    wf: Box<dyn WaveFunction>,
    vp_offset: usize,
    proto_offset: usize,
    derivs: Derivatives,
}

/// `Psi = prod_k psi_k`, each child owning a contiguous parameter slice.
///
/// Proto-values are the concatenation of the children's proto-values.
pub struct MultiComponentWaveFunction {
    n_space_dim: usize,
    n_part: usize,
    caps: Capabilities,
    components: Vec<Component>,
    n_vp: usize,
    n_proto: usize,
    // scratch: sum of d1, sum of d1^2, sum of d2
    s1: Vec<f64>,
    s1_sq: Vec<f64>,
    s2: Vec<f64>,
}

impl MultiComponentWaveFunction {
    pub fn new(n_space_dim: usize, n_part: usize, caps: Capabilities) -> Result<Self> {
        caps.validate()?;
        let ndim = n_space_dim * n_part;
        Ok(Self {
            n_space_dim,
            n_part,
            caps,
            components: Vec::new(),
            n_vp: 0,
            n_proto: 0,
            s1: vec![0.0; ndim],
            s1_sq: vec![0.0; ndim],
            s2: vec![0.0; ndim],
        })
    }

    /// Append a factor. The child must match the dimensions and provide
    /// every derivative this product exposes.
    pub fn add_wave_function(&mut self, wf: Box<dyn WaveFunction>) -> Result<()> {
        if wf.n_space_dim() != self.n_space_dim || wf.n_part() != self.n_part {
            return Err(VmcError::Construction(format!(
                "component has {} dims x {} particles, product has {} x {}",
                wf.n_space_dim(),
                wf.n_part(),
                self.n_space_dim,
                self.n_part
            )));
        }
        if !wf.capabilities().covers(&self.caps) {
            return Err(VmcError::Construction(format!(
                "component capabilities {:?} do not cover {:?}",
                wf.capabilities(),
                self.caps
            )));
        }
        let derivs = wf.new_derivatives();
        self.components.push(Component { wf, vp_offset: 0, proto_offset: 0, derivs });
        self.recompute_offsets();
        Ok(())
    }

    fn recompute_offsets(&mut self) {
        let mut vp_offset = 0;
        let mut proto_offset = 0;
        for c in self.components.iter_mut() {
            c.vp_offset = vp_offset;
            c.proto_offset = proto_offset;
            vp_offset += c.wf.n_vp();
            proto_offset += c.wf.n_proto();
        }
        self.n_vp = vp_offset;
        self.n_proto = proto_offset;
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }
}

impl WaveFunction for MultiComponentWaveFunction {
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
        self.n_proto
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn set_vp(&mut self, vp: &[f64]) -> Result<()> {
        check_n_params(self.n_vp, vp.len())?;
        for c in self.components.iter_mut() {
            let n = c.wf.n_vp();
            c.wf.set_vp(&vp[c.vp_offset..c.vp_offset + n])?;
        }
        Ok(())
    }

    fn get_vp(&self, vp: &mut [f64]) {
        for c in &self.components {
            let n = c.wf.n_vp();
            c.wf.get_vp(&mut vp[c.vp_offset..c.vp_offset + n]);
        }
    }

    fn proto_function(&mut self, x: &[f64], proto: &mut [f64]) {
        for c in self.components.iter_mut() {
            let n = c.wf.n_proto();
            c.wf.proto_function(x, &mut proto[c.proto_offset..c.proto_offset + n]);
        }
    }

    fn acceptance(&self, proto_old: &[f64], proto_new: &[f64]) -> Result<f64> {
        let mut ratio = 1.0;
        for c in &self.components {
            let r = c.proto_offset..c.proto_offset + c.wf.n_proto();
            ratio *= c.wf.acceptance(&proto_old[r.clone()], &proto_new[r])?;
        }
        Ok(ratio)
    }

    fn wf_value(&self, proto: &[f64]) -> f64 {
        self.components
            .iter()
            .map(|c| c.wf.wf_value(&proto[c.proto_offset..c.proto_offset + c.wf.n_proto()]))
            .product()
    }

    fn compute_all_derivatives(&mut self, x: &[f64], out: &mut Derivatives) {
        let ndim = self.total_dim();
        out.reset(ndim, self.n_vp, self.caps);
        self.s1.iter_mut().for_each(|v| *v = 0.0);
        self.s1_sq.iter_mut().for_each(|v| *v = 0.0);
        self.s2.iter_mut().for_each(|v| *v = 0.0);

        for c in self.components.iter_mut() {
            c.wf.compute_all_derivatives(x, &mut c.derivs);
            for i in 0..ndim {
                let d1 = c.derivs.d1[i];
                self.s1[i] += d1;
                self.s1_sq[i] += d1 * d1;
                self.s2[i] += c.derivs.d2[i];
            }
        }

        for i in 0..ndim {
            out.d1[i] = self.s1[i];
            // sum d2 + 2 sum_{k<l} d1_k d1_l
            out.d2[i] = self.s2[i] + self.s1[i] * self.s1[i] - self.s1_sq[i];
        }

        for c in &self.components {
            let o = c.vp_offset;
            let cd = &c.derivs;
            for p in 0..c.wf.n_vp() {
                if self.caps.vd1 {
                    out.vd1[o + p] = cd.vd1[p];
                }
                for i in 0..ndim {
                    // first and second derivative of the other factors' product
                    let d1_k = cd.d1[i];
                    let r1 = self.s1[i] - d1_k;
                    let r2 = (self.s2[i] - cd.d2[i]) + r1 * r1 - (self.s1_sq[i] - d1_k * d1_k);
                    if self.caps.d1vd1 {
                        out.d1vd1[(i, o + p)] = cd.d1vd1[(i, p)] + r1 * cd.vd1[p];
                    }
                    if self.caps.d2vd1 {
                        out.d2vd1[(i, o + p)] = cd.d2vd1[(i, p)]
                            + 2.0 * cd.d1vd1[(i, p)] * r1
                            + cd.vd1[p] * r2;
                    }
                }
            }
        }
    }

    fn new_to_old(&mut self) {
        for c in self.components.iter_mut() {
            c.wf.new_to_old();
        }
    }

    fn old_to_new(&mut self) {
        for c in self.components.iter_mut() {
            c.wf.old_to_new();
        }
    }
}
