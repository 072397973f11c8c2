//! Error types for market parameters.

/// A market, region or event parameter block is unusable.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// A value that must be strictly positive was zero or negative.
    #[error("{field} must be positive, got {value}")]
    NotPositive {
        /// Parameter name.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// A value that must not be negative was negative.
    #[error("{field} must not be negative, got {value}")]
    Negative {
        /// Parameter name.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// A probability fell outside `[0, 1]`.
    #[error("{field} must be within [0, 1], got {value}")]
    InvalidProbability {
        /// Parameter name.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// A `min..max` range was empty.
    #[error("{field} range is empty: {min} > {max}")]
    EmptyRange {
        /// Parameter name.
        field: &'static str,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

pub(crate) fn positive(field: &'static str, value: f64) -> Result<(), MarketError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(MarketError::NotPositive { field, value })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<(), MarketError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(MarketError::Negative { field, value })
    }
}

pub(crate) fn probability(field: &'static str, value: f64) -> Result<(), MarketError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MarketError::InvalidProbability { field, value })
    }
}

pub(crate) fn range(field: &'static str, min: f64, max: f64) -> Result<(), MarketError> {
    if min <= max && min.is_finite() && max.is_finite() {
        Ok(())
    } else {
        Err(MarketError::EmptyRange { field, min, max })
    }
}
