//! Currency codes and the pairs rates are resolved for.

use crate::core::error::RateError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    Usd,
    Gbp,
    Eur,
    Cad,
    Aud,
    Sgd,
    Inr,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Eur => "EUR",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
            Currency::Sgd => "SGD",
            Currency::Inr => "INR",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "GBP" => Ok(Currency::Gbp),
            "EUR" => Ok(Currency::Eur),
            "CAD" => Ok(Currency::Cad),
            "AUD" => Ok(Currency::Aud),
            "SGD" => Ok(Currency::Sgd),
            "INR" => Ok(Currency::Inr),
            _ => Err(anyhow::anyhow!("Unknown currency code: {}", s)),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.code().to_string()
    }
}

/// A source/target currency pair. Used as the resolution and cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    pub source: Currency,
    pub target: Currency,
}

impl CurrencyPair {
    pub fn new(source: Currency, target: Currency) -> Self {
        Self { source, target }
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.source, self.target)
    }
}

impl FromStr for CurrencyPair {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, target) = s
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("Invalid currency pair: {}", s))?;
        Ok(CurrencyPair::new(source.parse()?, target.parse()?))
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> Self {
        pair.to_string()
    }
}

/// The currencies the product accepts on each side of a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedPairs {
    pub sources: Vec<Currency>,
    pub targets: Vec<Currency>,
}

impl Default for SupportedPairs {
    fn default() -> Self {
        SupportedPairs {
            sources: vec![
                Currency::Usd,
                Currency::Gbp,
                Currency::Eur,
                Currency::Cad,
                Currency::Aud,
                Currency::Sgd,
            ],
            targets: vec![Currency::Inr],
        }
    }
}

impl SupportedPairs {
    /// Validates raw currency codes into a pair, rejecting anything outside
    /// the configured sets.
    pub fn pair(&self, source: &str, target: &str) -> Result<CurrencyPair, RateError> {
        let unsupported = || RateError::UnsupportedPair {
            from: source.trim().to_uppercase(),
            to: target.trim().to_uppercase(),
        };

        let source_currency: Currency = source.parse().map_err(|_| unsupported())?;
        let target_currency: Currency = target.parse().map_err(|_| unsupported())?;
        if source_currency == target_currency
            || !self.sources.contains(&source_currency)
            || !self.targets.contains(&target_currency)
        {
            return Err(unsupported());
        }
        Ok(CurrencyPair::new(source_currency, target_currency))
    }

    pub fn default_target(&self) -> Option<Currency> {
        self.targets.first().copied()
    }
}
