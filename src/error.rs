//! Errors surfaced by the packing pipeline.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PackError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackError {
    #[error("level must be positive (got {level})")]
    InvalidLevel { level: usize },
    #[error("scale must be a positive rational (got {0})")]
    InvalidScale(String),
    #[error("levels must be the same (lhs={lhs}, rhs={rhs})")]
    LevelMismatch { lhs: usize, rhs: usize },
    #[error("scales must be the same for addition (lhs={lhs}, rhs={rhs})")]
    ScaleMismatch { lhs: String, rhs: String },
    #[error("level {level} needs more primes than the chain holds ({available})")]
    LevelOutOfRange { level: usize, available: usize },
    #[error("failed to load parameters from {path}: {reason}")]
    ParameterLoad { path: String, reason: String },
    #[error("failed to write operands to {path}: {reason}")]
    OutputWrite { path: String, reason: String },
    #[error("unsupported shape: {0}")]
    UnsupportedShape(String),
    #[error("operand {0} emitted twice")]
    DuplicateOperand(String),
}

impl PackError {
    pub(crate) fn load(path: impl Into<String>, reason: impl ToString) -> Self {
        PackError::ParameterLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
