//! Error types for draft editing and the builder workflow

use thiserror::Error;

use crate::exit::ExitType;
use crate::store::StoreError;
use crate::types::{Indicator, Operator, TimeUnit};

/// Locally detectable problems with a draft; never involves the store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Please provide a name and add at least one condition.")]
    MissingNameOrConditions,

    #[error("At least one condition is required")]
    NoConditions,

    #[error("{indicator} has no parameter named '{name}'")]
    UnknownParameter { indicator: Indicator, name: String },

    #[error("{name} must be between {min} and {max}, got {value}")]
    ParameterOutOfRange {
        name: String,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("a compare indicator only applies to crossing operators, not {0}")]
    CompareIndicatorRequiresCross(Operator),

    #[error("operator {0} takes no second value")]
    CompareValueNotApplicable(Operator),

    #[error("condition {index}: value '{value}' is not a number")]
    NonNumericValue { index: usize, value: String },

    #[error("condition {index}: a range needs both a minimum and a maximum")]
    MissingRangeBound { index: usize },

    #[error("condition {index}: minimum ({min}) is greater than maximum ({max})")]
    InvertedRange { index: usize, min: f64, max: f64 },

    #[error("{exit_type} percentage must be between 0 and {max}, got {value}")]
    ExitValueOutOfRange {
        exit_type: ExitType,
        value: f64,
        max: f64,
    },

    #[error("{unit} must be between 1 and {max}, got {value}")]
    TimePeriodOutOfRange { unit: TimeUnit, value: u32, max: u32 },

    #[error("indicator-based exit does not support operator {0}")]
    UnsupportedExitOperator(Operator),

    #[error("indicator-based exit value '{0}' is not a number")]
    NonNumericExitValue(String),
}

/// Failure of a builder operation that may reach the store
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Name already present in the cached summaries; raised before any request
    #[error("A strategy named \"{0}\" already exists.")]
    DuplicateName(String),

    #[error(transparent)]
    Remote(#[from] StoreError),
}

impl BuilderError {
    /// True when nothing was sent to the store
    pub fn is_local(&self) -> bool {
        !matches!(self, BuilderError::Remote(_))
    }
}
