//! Mid-market baseline resolution as an ordered chain of fallible tiers.

use crate::core::currency::CurrencyPair;
use crate::core::error::{RateError, UpstreamError};
use crate::core::margin::MarginTable;
use crate::core::rate::{BaselineSource, ForexBaseline};
use crate::core::upstream::{ComparisonApi, ForexApi, bounded, validate_rate};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const EMERGENCY_WARNING: &str = "Using emergency static rate - APIs unavailable";

#[async_trait]
pub trait ForexBaselineSource: Send + Sync {
    async fn resolve_baseline(&self, pair: &CurrencyPair) -> Result<ForexBaseline, RateError>;
}

/// A single strategy in the baseline chain.
#[async_trait]
pub trait BaselineTier: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, pair: &CurrencyPair) -> Result<ForexBaseline, UpstreamError>;
}

/// Uses the quote a comparison service flags as mid-market.
pub struct MidMarketTier {
    api: Arc<dyn ComparisonApi>,
    timeout: Duration,
}

impl MidMarketTier {
    pub fn new(api: Arc<dyn ComparisonApi>, timeout: Duration) -> Self {
        Self { api, timeout }
    }
}

#[async_trait]
impl BaselineTier for MidMarketTier {
    fn name(&self) -> &str {
        "mid-market"
    }

    async fn fetch(&self, pair: &CurrencyPair) -> Result<ForexBaseline, UpstreamError> {
        let offers = bounded(self.api.name(), self.timeout, self.api.fetch_offers(pair)).await?;
        let mid_market = offers
            .iter()
            .flat_map(|offer| offer.quotes.iter())
            .find(|quote| quote.is_mid_market)
            .ok_or_else(|| {
                UpstreamError::MalformedResponse(
                    self.api.name().to_string(),
                    format!("no mid-market quote for {pair}"),
                )
            })?;

        Ok(ForexBaseline {
            rate: validate_rate(self.api.name(), mid_market.rate)?,
            source: BaselineSource::LivePrimary,
            observed_at: Utc::now(),
            warning: None,
        })
    }
}

/// Asks an independent forex service for the pair's rate.
pub struct ForexApiTier {
    api: Arc<dyn ForexApi>,
    timeout: Duration,
}

impl ForexApiTier {
    pub fn new(api: Arc<dyn ForexApi>, timeout: Duration) -> Self {
        Self { api, timeout }
    }
}

#[async_trait]
impl BaselineTier for ForexApiTier {
    fn name(&self) -> &str {
        "forex-api"
    }

    async fn fetch(&self, pair: &CurrencyPair) -> Result<ForexBaseline, UpstreamError> {
        let rate = bounded(self.api.name(), self.timeout, self.api.fetch_rate(pair)).await?;
        Ok(ForexBaseline {
            rate: validate_rate(self.api.name(), rate)?,
            source: BaselineSource::LiveFallback,
            observed_at: Utc::now(),
            warning: None,
        })
    }
}

/// Last resort: the configured static rate for this exact pair.
pub struct EmergencyTier {
    margins: Arc<MarginTable>,
}

impl EmergencyTier {
    pub fn new(margins: Arc<MarginTable>) -> Self {
        Self { margins }
    }
}

#[async_trait]
impl BaselineTier for EmergencyTier {
    fn name(&self) -> &str {
        "emergency-static"
    }

    async fn fetch(&self, pair: &CurrencyPair) -> Result<ForexBaseline, UpstreamError> {
        let rate = self.margins.emergency_baseline(pair).ok_or_else(|| {
            UpstreamError::Unreachable(
                self.name().to_string(),
                format!("no emergency rate configured for {pair}"),
            )
        })?;
        Ok(ForexBaseline {
            rate,
            source: BaselineSource::StaticEmergency,
            observed_at: Utc::now(),
            warning: Some(EMERGENCY_WARNING.to_string()),
        })
    }
}

/// Tries each tier in order and returns the first success.
pub struct TieredBaselineSource {
    tiers: Vec<Arc<dyn BaselineTier>>,
}

impl TieredBaselineSource {
    pub fn new(tiers: Vec<Arc<dyn BaselineTier>>) -> Self {
        Self { tiers }
    }

    /// The standard chain: mid-market flag, forex API, emergency table.
    pub fn standard(
        comparison: Arc<dyn ComparisonApi>,
        comparison_timeout: Duration,
        forex: Arc<dyn ForexApi>,
        forex_timeout: Duration,
        margins: Arc<MarginTable>,
    ) -> Self {
        Self::new(vec![
            Arc::new(MidMarketTier::new(comparison, comparison_timeout)),
            Arc::new(ForexApiTier::new(forex, forex_timeout)),
            Arc::new(EmergencyTier::new(margins)),
        ])
    }
}

#[async_trait]
impl ForexBaselineSource for TieredBaselineSource {
    #[instrument(name = "ResolveBaseline", skip(self), fields(pair = %pair))]
    async fn resolve_baseline(&self, pair: &CurrencyPair) -> Result<ForexBaseline, RateError> {
        for tier in &self.tiers {
            match tier.fetch(pair).await {
                Ok(baseline) => {
                    info!(
                        tier = tier.name(),
                        rate = %baseline.rate,
                        source = %baseline.source,
                        "Resolved forex baseline"
                    );
                    return Ok(baseline);
                }
                Err(e) => warn!(tier = tier.name(), error = %e, "Baseline tier failed"),
            }
        }
        debug!("All baseline tiers exhausted");
        Err(RateError::BaselineUnavailable(*pair))
    }
}
