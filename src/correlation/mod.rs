//! Correlation module - two-body Jastrow factors.

mod jastrow;

pub use jastrow::{FlatU2, InversePowerU2, PadeU2, PairPotential, PolynomialU2, TwoBodyJastrow};
