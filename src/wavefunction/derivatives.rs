//! Derivative buffer and capability flags.
//!
//! All quantities are stored divided by the wave-function value
//! (logarithmic-derivative form), so they stay well scaled even when the
//! raw value under- or overflows.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use crate::error::{Result, VmcError};

/// Which parameter derivatives a model computes.
///
/// Positional first and second derivatives are always available.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// First derivative w.r.t. each variational parameter
    pub vd1: bool,
    /// Cross derivative: first positional and first variational
    pub d1vd1: bool,
    /// Cross derivative: second positional and first variational
    pub d2vd1: bool,
}

impl Capabilities {
    pub const NONE: Self = Self { vd1: false, d1vd1: false, d2vd1: false };
    pub const VD1: Self = Self { vd1: true, d1vd1: false, d2vd1: false };
    pub const ALL: Self = Self { vd1: true, d1vd1: true, d2vd1: true };

    /// Build validated flags.
    pub fn new(vd1: bool, d1vd1: bool, d2vd1: bool) -> Result<Self> {
        let caps = Self { vd1, d1vd1, d2vd1 };
        caps.validate()?;
        Ok(caps)
    }

    /// Cross derivatives require their lower-order prerequisites.
    pub fn validate(&self) -> Result<()> {
        if self.d1vd1 && !self.vd1 {
            return Err(VmcError::Construction("d1vd1 requires vd1".into()));
        }
        if self.d2vd1 && !(self.vd1 && self.d1vd1) {
            return Err(VmcError::Construction("d2vd1 requires vd1 and d1vd1".into()));
        }
        Ok(())
    }

    /// True if every flag set in `required` is also set here.
    pub fn covers(&self, required: &Capabilities) -> bool {
        (self.vd1 || !required.vd1)
            && (self.d1vd1 || !required.d1vd1)
            && (self.d2vd1 || !required.d2vd1)
    }
}

/// Per-model derivative storage, sized `(D, P)`.
///
/// Arrays of a capability the owner lacks have zero length.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivatives {
    pub d1: DVector<f64>,
    pub d2: DVector<f64>,
    pub vd1: DVector<f64>,
    pub d1vd1: DMatrix<f64>,
    pub d2vd1: DMatrix<f64>,
    caps: Capabilities,
}

impl Derivatives {
    pub fn new(total_dim: usize, n_vp: usize, caps: Capabilities) -> Self {
        let nvd1 = if caps.vd1 { n_vp } else { 0 };
        let nd1vd1 = if caps.d1vd1 { n_vp } else { 0 };
        let nd2vd1 = if caps.d2vd1 { n_vp } else { 0 };
        Self {
            d1: DVector::zeros(total_dim),
            d2: DVector::zeros(total_dim),
            vd1: DVector::zeros(nvd1),
            d1vd1: DMatrix::zeros(total_dim, nd1vd1),
            d2vd1: DMatrix::zeros(total_dim, nd2vd1),
            caps,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn total_dim(&self) -> usize {
        self.d1.len()
    }

    /// Number of parameter columns held by the widest parameter array.
    pub fn n_vp(&self) -> usize {
        self.vd1.len()
    }

    /// True if the buffer already has the requested shape.
    pub fn has_shape(&self, total_dim: usize, n_vp: usize, caps: Capabilities) -> bool {
        self.caps == caps
            && self.d1.len() == total_dim
            && self.vd1.len() == if caps.vd1 { n_vp } else { 0 }
            && self.d1vd1.ncols() == if caps.d1vd1 { n_vp } else { 0 }
            && self.d2vd1.ncols() == if caps.d2vd1 { n_vp } else { 0 }
    }

    /// Reallocate if the shape differs, then zero everything.
    pub fn reset(&mut self, total_dim: usize, n_vp: usize, caps: Capabilities) {
        if self.has_shape(total_dim, n_vp, caps) {
            self.d1.fill(0.0);
            self.d2.fill(0.0);
            self.vd1.fill(0.0);
            self.d1vd1.fill(0.0);
            self.d2vd1.fill(0.0);
        } else {
            *self = Self::new(total_dim, n_vp, caps);
        }
    }

    /// True if no entry is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.d1.iter()
            .chain(self.d2.iter())
            .chain(self.vd1.iter())
            .chain(self.d1vd1.iter())
            .chain(self.d2vd1.iter())
            .all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_ordering() {
        assert!(Capabilities::new(true, true, true).is_ok());
        assert!(Capabilities::new(true, false, false).is_ok());
        assert!(Capabilities::new(false, true, false).is_err());
        assert!(Capabilities::new(true, false, true).is_err());
        assert!(Capabilities::new(false, false, true).is_err());
    }

    #[test]
    fn test_covers() {
        assert!(Capabilities::ALL.covers(&Capabilities::VD1));
        assert!(!Capabilities::VD1.covers(&Capabilities::ALL));
        assert!(Capabilities::NONE.covers(&Capabilities::NONE));
    }

    #[test]
    fn test_buffer_shape_and_reset() {
        let mut d = Derivatives::new(3, 2, Capabilities::VD1);
        assert_eq!(d.vd1.len(), 2);
        assert_eq!(d.d1vd1.ncols(), 0);
        d.d1[0] = 1.0;
        d.reset(3, 2, Capabilities::VD1);
        assert_eq!(d.d1[0], 0.0);

        d.reset(4, 1, Capabilities::ALL);
        assert_eq!(d.d1.len(), 4);
        assert_eq!(d.d2vd1.shape(), (4, 1));
        assert!(d.is_finite());
    }
}
