//! Rate model shared by the resolver, the cache and the presentation layer.

use crate::core::currency::CurrencyPair;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;

/// Where a forex baseline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaselineSource {
    LivePrimary,
    LiveFallback,
    StaticEmergency,
}

impl BaselineSource {
    pub fn is_live(&self) -> bool {
        !matches!(self, BaselineSource::StaticEmergency)
    }
}

impl Display for BaselineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                BaselineSource::LivePrimary => "live-primary",
                BaselineSource::LiveFallback => "live-fallback",
                BaselineSource::StaticEmergency => "static-emergency",
            }
        )
    }
}

/// Mid-market reference rate for a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForexBaseline {
    pub rate: Decimal,
    pub source: BaselineSource,
    pub observed_at: DateTime<Utc>,
    pub warning: Option<String>,
}

/// Which tier a provider quote was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuoteOrigin {
    Live,
    Derived,
    StaticEmergency,
}

impl Display for QuoteOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                QuoteOrigin::Live => "live",
                QuoteOrigin::Derived => "derived",
                QuoteOrigin::StaticEmergency => "static-emergency",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderQuote {
    pub provider_id: String,
    pub display_name: String,
    /// Target-currency units per one source-currency unit.
    pub rate: Decimal,
    pub fee: Decimal,
    pub markup_percent: Decimal,
    pub delivery_speed_label: Option<String>,
    pub origin: QuoteOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegradationLevel {
    None,
    ForexCalculated,
    EmergencyStatic,
}

impl Display for DegradationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                DegradationLevel::None => "none",
                DegradationLevel::ForexCalculated => "forex-calculated",
                DegradationLevel::EmergencyStatic => "emergency-static",
            }
        )
    }
}

impl DegradationLevel {
    /// Worst tier used by a baseline and a set of quotes.
    pub fn assess(baseline: &ForexBaseline, quotes: &[ProviderQuote]) -> Self {
        let any_static = quotes
            .iter()
            .any(|q| q.origin == QuoteOrigin::StaticEmergency);
        if baseline.source == BaselineSource::StaticEmergency || any_static {
            return DegradationLevel::EmergencyStatic;
        }
        if !baseline.source.is_live() || quotes.iter().any(|q| q.origin == QuoteOrigin::Derived) {
            return DegradationLevel::ForexCalculated;
        }
        DegradationLevel::None
    }
}

/// Tally of quote origins in a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    pub live: usize,
    pub derived: usize,
    pub emergency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub pair: CurrencyPair,
    pub baseline: ForexBaseline,
    pub quotes: Vec<ProviderQuote>,
    pub resolved_at: DateTime<Utc>,
    pub degradation_level: DegradationLevel,
}

impl ResolutionResult {
    pub fn quote(&self, provider_id: &str) -> Option<&ProviderQuote> {
        self.quotes.iter().find(|q| q.provider_id == provider_id)
    }

    pub fn source_counts(&self) -> SourceCounts {
        self.quotes
            .iter()
            .fold(SourceCounts::default(), |mut counts, q| {
                match q.origin {
                    QuoteOrigin::Live => counts.live += 1,
                    QuoteOrigin::Derived => counts.derived += 1,
                    QuoteOrigin::StaticEmergency => counts.emergency += 1,
                }
                counts
            })
    }

    /// Quotes ordered best rate first.
    pub fn ranked_quotes(&self) -> Vec<&ProviderQuote> {
        let mut ranked: Vec<&ProviderQuote> = self.quotes.iter().collect();
        ranked.sort_by(|a, b| match b.rate.cmp(&a.rate) {
            Ordering::Equal => a.provider_id.cmp(&b.provider_id),
            other => other,
        });
        ranked
    }

    pub fn warning(&self) -> Option<String> {
        if let Some(warning) = &self.baseline.warning {
            return Some(warning.clone());
        }
        match self.degradation_level {
            DegradationLevel::None => None,
            DegradationLevel::ForexCalculated => {
                Some("Some provider rates are calculated from the forex rate".to_string())
            }
            DegradationLevel::EmergencyStatic => Some(
                "Using emergency static rates - APIs unavailable, rates may be outdated"
                    .to_string(),
            ),
        }
    }
}

/// Rounds a rate or percentage to the two decimals shown to users.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Markup of `rate` against `baseline` as an absolute percentage.
pub fn markup_against(baseline: Decimal, rate: Decimal) -> Decimal {
    if baseline.is_zero() {
        return Decimal::ZERO;
    }
    round2((rate - baseline).abs() / baseline * Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::Currency;
    use rust_decimal_macros::dec;

    fn baseline(source: BaselineSource) -> ForexBaseline {
        ForexBaseline {
            rate: dec!(90.00),
            source,
            observed_at: Utc::now(),
            warning: None,
        }
    }

    fn quote(id: &str, rate: Decimal, origin: QuoteOrigin) -> ProviderQuote {
        ProviderQuote {
            provider_id: id.to_string(),
            display_name: id.to_string(),
            rate,
            fee: Decimal::ZERO,
            markup_percent: Decimal::ZERO,
            delivery_speed_label: None,
            origin,
        }
    }

    #[test]
    fn test_degradation_assessment() {
        let live = vec![quote("a", dec!(89), QuoteOrigin::Live)];
        assert_eq!(
            DegradationLevel::assess(&baseline(BaselineSource::LivePrimary), &live),
            DegradationLevel::None
        );
        assert_eq!(
            DegradationLevel::assess(&baseline(BaselineSource::LiveFallback), &live),
            DegradationLevel::None
        );
        assert_eq!(
            DegradationLevel::assess(&baseline(BaselineSource::StaticEmergency), &live),
            DegradationLevel::EmergencyStatic
        );

        let mixed = vec![
            quote("a", dec!(89), QuoteOrigin::Live),
            quote("b", dec!(88), QuoteOrigin::Derived),
        ];
        assert_eq!(
            DegradationLevel::assess(&baseline(BaselineSource::LivePrimary), &mixed),
            DegradationLevel::ForexCalculated
        );

        let with_static = vec![
            quote("b", dec!(88), QuoteOrigin::Derived),
            quote("c", dec!(87), QuoteOrigin::StaticEmergency),
        ];
        assert_eq!(
            DegradationLevel::assess(&baseline(BaselineSource::LivePrimary), &with_static),
            DegradationLevel::EmergencyStatic
        );
    }

    #[test]
    fn test_ranked_quotes_and_counts() {
        let result = ResolutionResult {
            pair: CurrencyPair::new(Currency::Usd, Currency::Inr),
            baseline: baseline(BaselineSource::LivePrimary),
            quotes: vec![
                quote("ria", dec!(85.50), QuoteOrigin::Derived),
                quote("wise", dec!(90.01), QuoteOrigin::Live),
                quote("ofx", dec!(87.00), QuoteOrigin::StaticEmergency),
                quote("abc", dec!(85.50), QuoteOrigin::Live),
            ],
            resolved_at: Utc::now(),
            degradation_level: DegradationLevel::EmergencyStatic,
        };

        let ranked: Vec<&str> = result
            .ranked_quotes()
            .iter()
            .map(|q| q.provider_id.as_str())
            .collect();
        assert_eq!(ranked, vec!["wise", "ofx", "abc", "ria"]);

        let counts = result.source_counts();
        assert_eq!(
            counts,
            SourceCounts {
                live: 2,
                derived: 1,
                emergency: 1
            }
        );
        assert!(result.warning().unwrap().contains("emergency"));
        assert_eq!(result.quote("ofx").unwrap().rate, dec!(87.00));
    }

    #[test]
    fn test_markup_against() {
        assert_eq!(markup_against(dec!(90), dec!(87)), dec!(3.33));
        assert_eq!(markup_against(dec!(90), dec!(90)), dec!(0));
        assert_eq!(round2(dec!(1.005)), dec!(1.01));
    }
}
