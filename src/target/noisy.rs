//! Noisy values, gradients and the objective-function contracts.

use std::fmt;
use std::ops::{Add, Sub};

use crate::error::Result;

/// Monte Carlo estimate with its error bar.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NoisyValue {
    pub val: f64,
    pub err: f64,
}

impl NoisyValue {
    pub fn new(val: f64, err: f64) -> Self {
        Self { val, err: err.abs() }
    }

    /// True if the value is distinguishable from zero.
    pub fn is_significant(&self) -> bool {
        self.val.abs() > self.err
    }

    pub fn is_finite(&self) -> bool {
        self.val.is_finite() && self.err.is_finite()
    }

    /// True if `self` is lower than `other` beyond the combined error.
    pub fn is_significantly_lower_than(&self, other: &NoisyValue) -> bool {
        let diff = *other - *self;
        diff.val > diff.err
    }
}

/// Errors add in quadrature.
impl Sub for NoisyValue {
    type Output = NoisyValue;

    fn sub(self, rhs: NoisyValue) -> NoisyValue {
        NoisyValue::new(self.val - rhs.val, self.err.hypot(rhs.err))
    }
}

impl Add for NoisyValue {
    type Output = NoisyValue;

    fn add(self, rhs: NoisyValue) -> NoisyValue {
        NoisyValue::new(self.val + rhs.val, self.err.hypot(rhs.err))
    }
}

impl fmt::Display for NoisyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6} ± {:.6}", self.val, self.err)
    }
}

/// Gradient estimate with one error bar per component.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NoisyGradient {
    pub val: Vec<f64>,
    pub err: Vec<f64>,
}

impl NoisyGradient {
    pub fn zeros(n: usize) -> Self {
        Self { val: vec![0.0; n], err: vec![0.0; n] }
    }

    pub fn len(&self) -> usize {
        self.val.len()
    }

    pub fn is_empty(&self) -> bool {
        self.val.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.val.iter().chain(self.err.iter()).all(|v| v.is_finite())
    }

    pub fn norm(&self) -> f64 {
        self.val.iter().map(|g| g * g).sum::<f64>().sqrt()
    }

    /// True if every component lies within its error bar.
    pub fn is_within_errors(&self) -> bool {
        self.val.iter().zip(self.err.iter()).all(|(g, e)| g.abs() <= *e)
    }
}

/// Objective evaluated by Monte Carlo.
pub trait NoisyFunction {
    /// Number of parameters.
    fn n_dim(&self) -> usize;

    fn f(&mut self, x: &[f64]) -> Result<NoisyValue>;
}

/// Objective with a gradient estimate. The gradient points uphill, so
/// minimizers step against it.
pub trait NoisyFunctionWithGradient: NoisyFunction {
    fn fgrad(&mut self, x: &[f64]) -> Result<(NoisyValue, NoisyGradient)>;

    fn grad(&mut self, x: &[f64]) -> Result<NoisyGradient> {
        Ok(self.fgrad(x)?.1)
    }
}

/// L2 penalty `lambda |p|^2 / P`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Regularization {
    pub lambda: f64,
}

impl Regularization {
    pub fn value(&self, x: &[f64]) -> f64 {
        if self.lambda == 0.0 || x.is_empty() {
            return 0.0;
        }
        self.lambda * x.iter().map(|p| p * p).sum::<f64>() / x.len() as f64
    }

    pub fn add_gradient(&self, x: &[f64], grad: &mut NoisyGradient) {
        if self.lambda == 0.0 || x.is_empty() {
            return;
        }
        let scale = 2.0 * self.lambda / x.len() as f64;
        for (g, p) in grad.val.iter_mut().zip(x.iter()) {
            *g += scale * p;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_small_improvement_is_not_significant() {
        let prev = NoisyValue::new(1.000, 0.01);
        let new = NoisyValue::new(0.998, 0.01);
        assert!(!new.is_significantly_lower_than(&prev));
        assert!(!(prev - new).is_significant());

        let better = NoisyValue::new(0.95, 0.01);
        assert!(better.is_significantly_lower_than(&prev));
    }

    #[test]
    fn test_quadrature() {
        let d = NoisyValue::new(3.0, 0.3) - NoisyValue::new(1.0, 0.4);
        assert_relative_eq!(d.val, 2.0);
        assert_relative_eq!(d.err, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_gradient_predicates() {
        let g = NoisyGradient { val: vec![0.1, -0.2], err: vec![0.2, 0.3] };
        assert!(g.is_within_errors());
        assert!(g.is_finite());
        let g = NoisyGradient { val: vec![0.1, f64::NAN], err: vec![0.2, 0.3] };
        assert!(!g.is_finite());
    }

    #[test]
    fn test_regularization() {
        let reg = Regularization { lambda: 0.5 };
        let x = [1.0, 2.0];
        assert_relative_eq!(reg.value(&x), 1.25);
        let mut g = NoisyGradient::zeros(2);
        reg.add_gradient(&x, &mut g);
        assert_eq!(g.val, vec![0.5, 1.0]);
    }
}
