use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatsError {
    #[error("{name} must lie strictly between 0 and 1, got {value}")]
    OutOfRange { name: &'static str, value: f64 },

    #[error("Unknown alternative hypothesis '{0}' (expected two-sided, greater or less)")]
    UnknownAlternative(String),

    #[error("Zero {margin} total: expected frequencies are undefined")]
    ZeroMargin { margin: &'static str },

    #[error("Distribution error: {0}")]
    Distribution(String),
}

pub type Result<T> = std::result::Result<T, StatsError>;

/// Reject probabilities outside the open unit interval.
pub(crate) fn check_unit_interval(name: &'static str, value: f64) -> Result<f64> {
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(StatsError::OutOfRange { name, value })
    }
}
