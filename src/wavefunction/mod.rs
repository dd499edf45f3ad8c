//! Wavefunction module - trial wave functions with analytic derivatives.

mod derivatives;
mod traits;
mod orbitals;
mod symmetrizer;
mod multi;
mod shadow;

pub use derivatives::{Capabilities, Derivatives};
pub use traits::WaveFunction;
pub use orbitals::{
    ConstNormGaussian1D1POrbital, Gaussian1D1POrbital, IsotropicGaussian,
    QuadrExponential1D1POrbital, QuadrExponential1DNPOrbital,
};
pub use symmetrizer::{
    adjacent_pair_permutations, all_permutations, Permutation, SymmetrizerKind,
    SymmetrizerWaveFunction, NODE_TOLERANCE,
};
pub use multi::MultiComponentWaveFunction;
pub use shadow::ShadowWaveFunction;
