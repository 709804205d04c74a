//! Core business logic: the rate model and the resolution fallback chain.

pub mod baseline;
pub mod cache;
pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod margin;
pub mod monitor;
pub mod quotes;
pub mod rate;
pub mod resolver;
pub mod service;
pub mod upstream;

// Re-export main types for cleaner imports
pub use baseline::{ForexBaselineSource, TieredBaselineSource};
pub use currency::{Currency, CurrencyPair, SupportedPairs};
pub use error::{RateError, UpstreamError};
pub use margin::MarginTable;
pub use quotes::{AliasTable, ComparisonQuoteSource, ProviderQuoteSource};
pub use rate::{
    BaselineSource, DegradationLevel, ForexBaseline, ProviderQuote, QuoteOrigin, ResolutionResult,
};
pub use resolver::RateResolver;
pub use service::RateService;
