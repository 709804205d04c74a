use crate::core::currency::CurrencyPair;
use thiserror::Error;

/// Failure of a single upstream tier. These never escape the adapters: a
/// tier that fails simply hands over to the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("{0} timed out")]
    Timeout(String),

    #[error("{0} unreachable: {1}")]
    Unreachable(String, String),

    #[error("malformed response from {0}: {1}")]
    MalformedResponse(String, String),

    #[error("invalid rate value from {0}: {1}")]
    InvalidRateValue(String, String),
}

/// Errors surfaced to callers of the resolver and the rate service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    /// Requested pair is outside the supported set. Raised before any
    /// upstream call is made.
    #[error("currency pair not supported: {from}-{to}")]
    UnsupportedPair { from: String, to: String },

    /// Every baseline tier failed, including the static emergency one.
    #[error("no forex baseline available for {0}")]
    BaselineUnavailable(CurrencyPair),
}
