//! Detects drift between the configured provider margins and live data.

use crate::core::baseline::ForexBaselineSource;
use crate::core::currency::{Currency, CurrencyPair};
use crate::core::margin::MarginTable;
use crate::core::quotes::ProviderQuoteSource;
use crate::core::rate::round2;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginDrift {
    pub provider_id: String,
    pub configured_margin: Decimal,
    pub actual_margin: Decimal,
    pub difference: Decimal,
    pub needs_update: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairAnalysis {
    pub pair: CurrencyPair,
    pub forex_rate: Decimal,
    /// Sorted by difference, largest first.
    pub drifts: Vec<MarginDrift>,
}

impl PairAnalysis {
    pub fn alerts(&self) -> impl Iterator<Item = &MarginDrift> {
        self.drifts.iter().filter(|d| d.needs_update)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Ok,
    Warning,
}

#[derive(Debug)]
pub struct MonitorReport {
    pub checked_at: DateTime<Utc>,
    pub alert_threshold: Decimal,
    pub results: Vec<(CurrencyPair, Result<PairAnalysis>)>,
}

impl MonitorReport {
    pub fn status(&self) -> MonitorStatus {
        if self.alerted_pairs().next().is_some() {
            MonitorStatus::Warning
        } else {
            MonitorStatus::Ok
        }
    }

    /// Pairs with at least one provider whose margin needs review.
    pub fn alerted_pairs(&self) -> impl Iterator<Item = &PairAnalysis> {
        self.results
            .iter()
            .filter_map(|(_, result)| result.as_ref().ok())
            .filter(|analysis| analysis.alerts().next().is_some())
    }
}

pub struct MarginMonitor {
    baseline: Arc<dyn ForexBaselineSource>,
    quotes: Arc<dyn ProviderQuoteSource>,
    margins: Arc<MarginTable>,
    threshold: Decimal,
}

impl MarginMonitor {
    pub fn new(
        baseline: Arc<dyn ForexBaselineSource>,
        quotes: Arc<dyn ProviderQuoteSource>,
        margins: Arc<MarginTable>,
        threshold: Decimal,
    ) -> Self {
        Self {
            baseline,
            quotes,
            margins,
            threshold,
        }
    }

    #[instrument(name = "AnalyzeMargins", skip(self), fields(pair = %pair))]
    pub async fn analyze(&self, pair: &CurrencyPair) -> Result<PairAnalysis> {
        let (baseline, quotes) = tokio::join!(
            self.baseline.resolve_baseline(pair),
            self.quotes.resolve_quotes(pair)
        );
        let baseline = baseline?;
        if !baseline.source.is_live() {
            return Err(anyhow!("Could not fetch a live forex rate for {}", pair));
        }

        if quotes.is_empty() {
            return Err(anyhow!("Could not fetch provider rates for {}", pair));
        }

        let mut drifts: Vec<MarginDrift> = quotes
            .iter()
            .filter_map(|quote| {
                let margin = self.margins.margin(&quote.provider_id)?;
                let configured_margin = round2(margin.as_offset(baseline.rate));
                let actual_margin = round2(quote.rate - baseline.rate);
                let difference = round2((actual_margin - configured_margin).abs());
                Some(MarginDrift {
                    provider_id: quote.provider_id.clone(),
                    configured_margin,
                    actual_margin,
                    difference,
                    needs_update: difference >= self.threshold,
                })
            })
            .collect();
        drifts.sort_by(|a, b| b.difference.cmp(&a.difference));

        let analysis = PairAnalysis {
            pair: *pair,
            forex_rate: baseline.rate,
            drifts,
        };
        let alerts = analysis.alerts().count();
        if alerts > 0 {
            warn!(alerts, "Configured margins drifted from live data");
        } else {
            info!("Margins within threshold");
        }
        Ok(analysis)
    }

    /// Analyzes every source currency against `target` concurrently.
    pub async fn run(&self, sources: &[Currency], target: Currency) -> MonitorReport {
        let pairs: Vec<CurrencyPair> = sources
            .iter()
            .filter(|source| **source != target)
            .map(|source| CurrencyPair::new(*source, target))
            .collect();

        let analyses = join_all(pairs.iter().map(|pair| self.analyze(pair))).await;

        MonitorReport {
            checked_at: Utc::now(),
            alert_threshold: self.threshold,
            results: pairs.into_iter().zip(analyses).collect(),
        }
    }
}
