use thiserror::Error;

/// Error kinds surfaced by the CGP engine. Recovery happens locally only in
/// two places: the Newton
/// step falls back to a skipped update when the Hessian is non-invertible, and
/// the memetic selection step filters non-finite individuals out of the pool.
/// Everything else propagates to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CgpError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("gene {index} = {value} is out of bounds [{lb}, {ub}]")]
    OutOfBounds {
        index: usize,
        value: usize,
        lb: usize,
        ub: usize,
    },

    #[error("{0}")]
    NotApplicable(String),

    #[error("numerical failure: {0}")]
    NumericalFailure(String),
}

pub type CgpResult<T> = Result<T, CgpError>;
