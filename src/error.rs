//! Error type shared by models, samplers, target functions and optimizers.

use thiserror::Error;

/// Errors raised by the VMC core.
///
/// Construction failures are reported as soon as a model is built,
/// numerical failures abort the current evaluation or optimization run.
/// Statistical insignificance is never an error, see
/// [`NoisyValue::is_significant`](crate::target::NoisyValue::is_significant).
#[derive(Debug, Error)]
pub enum VmcError {
    #[error("invalid construction: {0}")]
    Construction(String),

    #[error("expected {expected} variational parameters, got {got}")]
    ParameterCount { expected: usize, got: usize },

    #[error("expected {expected} coordinates, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, VmcError>;

/// Check that a parameter slice has the expected length.
pub(crate) fn check_n_params(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(VmcError::ParameterCount { expected, got });
    }
    Ok(())
}

/// Check that a coordinate slice has the expected length.
pub(crate) fn check_n_coords(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(VmcError::DimensionMismatch { expected, got });
    }
    Ok(())
}
