use thiserror::Error;

/// A result type for quasiseparable GP algorithms
pub type Result<T> = std::result::Result<T, GpError>;

/// An error when building, factorizing or conditioning a quasiseparable system
#[derive(Error, Debug)]
pub enum GpError {
    /// When input coordinates are not sorted or have a malformed shape
    #[error("Domain error: {0}")]
    DomainError(String),
    /// When a factorization pivot is not strictly positive
    #[error("Numerical error: non positive pivot {pivot} at position {index}, matrix is not positive definite")]
    NumericalError {
        /// Position of the failing pivot in the input sequence
        index: usize,
        /// Pivot value formatted for display (may be NaN)
        pivot: f64,
    },
    /// When inputs, targets, noise or right-hand sides have mismatched lengths
    #[error("Shape error: {0}")]
    ShapeError(String),
    /// When error due to a bad value
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
    /// When a linfa error occurs
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
}
