//! Merges live quotes, margin-derived quotes and static emergency quotes into
//! one rate table per pair.

use crate::core::baseline::ForexBaselineSource;
use crate::core::currency::CurrencyPair;
use crate::core::error::RateError;
use crate::core::margin::MarginTable;
use crate::core::quotes::ProviderQuoteSource;
use crate::core::rate::{
    BaselineSource, DegradationLevel, ForexBaseline, ProviderQuote, ResolutionResult,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct RateResolver {
    baseline: Arc<dyn ForexBaselineSource>,
    quotes: Arc<dyn ProviderQuoteSource>,
    margins: Arc<MarginTable>,
}

impl RateResolver {
    pub fn new(
        baseline: Arc<dyn ForexBaselineSource>,
        quotes: Arc<dyn ProviderQuoteSource>,
        margins: Arc<MarginTable>,
    ) -> Self {
        Self {
            baseline,
            quotes,
            margins,
        }
    }

    pub fn baseline_source(&self) -> &Arc<dyn ForexBaselineSource> {
        &self.baseline
    }

    pub fn quote_source(&self) -> &Arc<dyn ProviderQuoteSource> {
        &self.quotes
    }

    pub fn margins(&self) -> &Arc<MarginTable> {
        &self.margins
    }

    /// Resolves the best available rate table for `pair`. Fails only when no
    /// baseline can be found at any tier.
    #[instrument(name = "ResolveRates", skip(self), fields(pair = %pair))]
    pub async fn resolve(&self, pair: &CurrencyPair) -> Result<ResolutionResult, RateError> {
        let (baseline, live) = tokio::join!(
            self.baseline.resolve_baseline(pair),
            self.quotes.resolve_quotes(pair)
        );
        let baseline = baseline?;

        let mut covered: HashSet<String> = HashSet::new();
        let mut quotes: Vec<ProviderQuote> = Vec::with_capacity(live.len());
        for quote in live {
            if covered.insert(quote.provider_id.clone()) {
                quotes.push(quote);
            }
        }

        // Under a static baseline the curated static rates outrank margins
        if baseline.source == BaselineSource::StaticEmergency {
            self.fill_emergency(pair, &baseline, &mut covered, &mut quotes);
            self.fill_derived(&baseline, &mut covered, &mut quotes);
        } else {
            self.fill_derived(&baseline, &mut covered, &mut quotes);
            self.fill_emergency(pair, &baseline, &mut covered, &mut quotes);
        }

        let degradation_level = DegradationLevel::assess(&baseline, &quotes);
        let result = ResolutionResult {
            pair: *pair,
            baseline,
            quotes,
            resolved_at: Utc::now(),
            degradation_level,
        };

        let counts = result.source_counts();
        info!(
            degradation = %result.degradation_level,
            live = counts.live,
            derived = counts.derived,
            emergency = counts.emergency,
            "Resolved rates"
        );
        Ok(result)
    }

    fn fill_derived(
        &self,
        baseline: &ForexBaseline,
        covered: &mut HashSet<String>,
        quotes: &mut Vec<ProviderQuote>,
    ) {
        for provider_id in self.margins.canonical_providers() {
            if covered.contains(provider_id) {
                continue;
            }
            if let Some(derived) = self.margins.derive_quote(provider_id, baseline) {
                debug!(provider_id, rate = %derived.rate, "Derived quote from margin");
                covered.insert(derived.provider_id.clone());
                quotes.push(derived);
            }
        }
    }

    fn fill_emergency(
        &self,
        pair: &CurrencyPair,
        baseline: &ForexBaseline,
        covered: &mut HashSet<String>,
        quotes: &mut Vec<ProviderQuote>,
    ) {
        for provider_id in self.margins.canonical_providers() {
            if covered.contains(provider_id) {
                continue;
            }
            if let Some(fallback) = self.margins.emergency_quote(provider_id, pair, baseline) {
                debug!(provider_id, rate = %fallback.rate, "Using emergency static quote");
                covered.insert(fallback.provider_id.clone());
                quotes.push(fallback);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::baseline::TieredBaselineSource;
    use crate::core::currency::Currency;
    use crate::core::error::UpstreamError;
    use crate::core::margin::MarginConfig;
    use crate::core::quotes::{AliasTable, ComparisonQuoteSource};
    use crate::core::rate::QuoteOrigin;
    use crate::core::upstream::{ComparisonApi, ForexApi, VendorOffer, VendorQuote};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const CANONICAL: [(&str, &str, &str); 9] = [
        ("transferwise", "Wise", "-3.0"),
        ("xoom", "Xoom", "-3.5"),
        ("westernunion", "Western Union", "-0.28"),
        ("remitly", "Remitly", "-3.3"),
        ("instarem", "Instarem", "-3.4"),
        ("ria", "Ria", "-4.5"),
        ("statebank", "State Bank of India", "-3.5"),
        ("ofx", "OFX", "-3.9"),
        ("moneygram", "MoneyGram", "-3.6"),
    ];

    fn margin_config() -> MarginConfig {
        let providers = CANONICAL
            .iter()
            .map(|(id, name, offset)| crate::core::margin::ProviderEntry {
                id: id.to_string(),
                name: name.to_string(),
                offset: Some(offset.parse().unwrap()),
                percent: None,
            })
            .collect();
        MarginConfig {
            providers,
            ..Default::default()
        }
    }

    fn usd_inr() -> CurrencyPair {
        CurrencyPair::new(Currency::Usd, Currency::Inr)
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
    }

    struct FixedBaseline {
        result: Result<ForexBaseline, RateError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ForexBaselineSource for FixedBaseline {
        async fn resolve_baseline(&self, _pair: &CurrencyPair) -> Result<ForexBaseline, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct FixedQuotes {
        quotes: Vec<ProviderQuote>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderQuoteSource for FixedQuotes {
        async fn resolve_quotes(&self, _pair: &CurrencyPair) -> Vec<ProviderQuote> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.quotes.clone()
        }
    }

    fn live_baseline(rate: Decimal) -> ForexBaseline {
        ForexBaseline {
            rate,
            source: BaselineSource::LivePrimary,
            observed_at: fixed_time(),
            warning: None,
        }
    }

    fn live_quote(id: &str, rate: Decimal) -> ProviderQuote {
        ProviderQuote {
            provider_id: id.to_string(),
            display_name: id.to_string(),
            rate,
            fee: dec!(2.5),
            markup_percent: dec!(0.5),
            delivery_speed_label: None,
            origin: QuoteOrigin::Live,
        }
    }

    fn resolver(
        baseline: Result<ForexBaseline, RateError>,
        quotes: Vec<ProviderQuote>,
        margins: MarginConfig,
    ) -> RateResolver {
        RateResolver::new(
            Arc::new(FixedBaseline {
                result: baseline,
                calls: AtomicUsize::new(0),
            }),
            Arc::new(FixedQuotes {
                quotes,
                calls: AtomicUsize::new(0),
            }),
            Arc::new(MarginTable::from_config(&margins)),
        )
    }

    fn assert_unique(result: &ResolutionResult) {
        let ids: HashSet<&str> = result.quotes.iter().map(|q| q.provider_id.as_str()).collect();
        assert_eq!(ids.len(), result.quotes.len(), "duplicate provider ids");
    }

    #[tokio::test]
    async fn test_partial_live_quotes_are_completed_from_margins() {
        let live: Vec<ProviderQuote> = CANONICAL[..6]
            .iter()
            .map(|(id, _, _)| live_quote(id, dec!(89.00)))
            .collect();
        let resolver = resolver(Ok(live_baseline(dec!(90.00))), live, margin_config());

        let result = resolver.resolve(&usd_inr()).await.unwrap();
        assert_unique(&result);
        assert_eq!(result.quotes.len(), 9);

        for (id, _, _) in &CANONICAL[..6] {
            assert_eq!(result.quote(id).unwrap().origin, QuoteOrigin::Live);
        }
        for (id, _, offset) in &CANONICAL[6..] {
            let quote = result.quote(id).unwrap();
            assert_eq!(quote.origin, QuoteOrigin::Derived);
            let offset: Decimal = offset.parse().unwrap();
            assert_eq!(quote.rate, dec!(90.00) + offset);
        }
        // Any derived quote marks the result as forex-calculated
        assert_eq!(result.degradation_level, DegradationLevel::ForexCalculated);
    }

    #[tokio::test]
    async fn test_all_live_quotes_is_not_degraded() {
        let live: Vec<ProviderQuote> = CANONICAL
            .iter()
            .map(|(id, _, _)| live_quote(id, dec!(89.00)))
            .collect();
        let mut baseline = live_baseline(dec!(90.00));
        baseline.source = BaselineSource::LiveFallback;
        let resolver = resolver(Ok(baseline), live, margin_config());

        let result = resolver.resolve(&usd_inr()).await.unwrap();
        assert_eq!(result.source_counts().live, 9);
        assert_eq!(result.degradation_level, DegradationLevel::None);
        assert!(result.warning().is_none());
    }

    #[tokio::test]
    async fn test_live_quote_wins_over_margin() {
        let resolver = resolver(
            Ok(live_baseline(dec!(90.00))),
            vec![live_quote("transferwise", dec!(90.01))],
            margin_config(),
        );

        let result = resolver.resolve(&usd_inr()).await.unwrap();
        let wise = result.quote("transferwise").unwrap();
        assert_eq!(wise.origin, QuoteOrigin::Live);
        assert_eq!(wise.rate, dec!(90.01));
        assert_eq!(wise.fee, dec!(2.5));
    }

    #[tokio::test]
    async fn test_non_canonical_live_quotes_are_kept() {
        let resolver = resolver(
            Ok(live_baseline(dec!(90.00))),
            vec![
                live_quote("chase", dec!(88.10)),
                live_quote("chase", dec!(87.00)),
            ],
            margin_config(),
        );

        let result = resolver.resolve(&usd_inr()).await.unwrap();
        assert_unique(&result);
        assert_eq!(result.quote("chase").unwrap().rate, dec!(88.10));
        assert_eq!(result.quotes.len(), 10);
    }

    #[tokio::test]
    async fn test_derived_markup_matches_offset() {
        let resolver = resolver(Ok(live_baseline(dec!(83.50))), Vec::new(), margin_config());

        let result = resolver.resolve(&usd_inr()).await.unwrap();
        for (id, _, offset) in CANONICAL {
            let offset: Decimal = offset.parse().unwrap();
            let expected = offset.abs() / dec!(83.50) * dec!(100);
            let quote = result.quote(id).unwrap();
            assert!(
                (quote.markup_percent - expected).abs() <= dec!(0.01),
                "{id}: {} vs {expected}",
                quote.markup_percent
            );
        }
    }

    #[tokio::test]
    async fn test_static_baseline_forces_emergency_level() {
        let baseline = ForexBaseline {
            rate: dec!(90.0),
            source: BaselineSource::StaticEmergency,
            observed_at: fixed_time(),
            warning: Some("degraded".to_string()),
        };
        let live: Vec<ProviderQuote> = CANONICAL
            .iter()
            .map(|(id, _, _)| live_quote(id, dec!(89.00)))
            .collect();
        let resolver = resolver(Ok(baseline), live, margin_config());

        let result = resolver.resolve(&usd_inr()).await.unwrap();
        assert_eq!(result.degradation_level, DegradationLevel::EmergencyStatic);
        assert_eq!(result.warning().as_deref(), Some("degraded"));
    }

    #[tokio::test]
    async fn test_baseline_failure_propagates() {
        let resolver = resolver(
            Err(RateError::BaselineUnavailable(usd_inr())),
            vec![live_quote("transferwise", dec!(90.01))],
            margin_config(),
        );
        assert_eq!(
            resolver.resolve(&usd_inr()).await,
            Err(RateError::BaselineUnavailable(usd_inr()))
        );
    }

    #[tokio::test]
    async fn test_identical_inputs_give_identical_results() {
        let resolver = resolver(
            Ok(live_baseline(dec!(90.00))),
            vec![live_quote("xoom", dec!(86.50))],
            margin_config(),
        );

        let first = resolver.resolve(&usd_inr()).await.unwrap();
        let second = resolver.resolve(&usd_inr()).await.unwrap();
        assert_eq!(first.baseline, second.baseline);
        assert_eq!(first.quotes, second.quotes);
        assert_eq!(first.degradation_level, second.degradation_level);
    }

    // End-to-end fallback scenarios through the real baseline chain and
    // quote source, with the upstream services mocked.

    struct ScriptedComparison(Result<Vec<VendorOffer>, UpstreamError>);

    #[async_trait]
    impl ComparisonApi for ScriptedComparison {
        fn name(&self) -> &str {
            "comparison"
        }

        async fn fetch_offers(&self, _pair: &CurrencyPair) -> Result<Vec<VendorOffer>, UpstreamError> {
            self.0.clone()
        }
    }

    struct ScriptedForex(Result<Option<Decimal>, UpstreamError>);

    #[async_trait]
    impl ForexApi for ScriptedForex {
        fn name(&self) -> &str {
            "forex"
        }

        async fn fetch_rate(&self, _pair: &CurrencyPair) -> Result<Option<Decimal>, UpstreamError> {
            self.0.clone()
        }
    }

    fn wired(
        comparison: Result<Vec<VendorOffer>, UpstreamError>,
        forex: Result<Option<Decimal>, UpstreamError>,
        margins: MarginConfig,
    ) -> RateResolver {
        let comparison: Arc<dyn ComparisonApi> = Arc::new(ScriptedComparison(comparison));
        let forex: Arc<dyn ForexApi> = Arc::new(ScriptedForex(forex));
        let margins = Arc::new(MarginTable::from_config(&margins));
        let timeout = Duration::from_millis(200);

        RateResolver::new(
            Arc::new(TieredBaselineSource::standard(
                comparison.clone(),
                timeout,
                forex,
                timeout,
                margins.clone(),
            )),
            Arc::new(ComparisonQuoteSource::new(
                comparison,
                AliasTable::default(),
                timeout,
            )),
            margins,
        )
    }

    fn down() -> UpstreamError {
        UpstreamError::Unreachable("mock".to_string(), "connection refused".to_string())
    }

    #[tokio::test]
    async fn test_comparison_down_derives_everything_from_forex_api() {
        let resolver = wired(Err(down()), Ok(Some(dec!(83.50))), margin_config());

        let result = resolver.resolve(&usd_inr()).await.unwrap();
        assert_eq!(result.baseline.source, BaselineSource::LiveFallback);
        assert_eq!(result.baseline.rate, dec!(83.50));
        assert_eq!(result.quotes.len(), 9);
        assert!(result.quotes.iter().all(|q| q.origin == QuoteOrigin::Derived));
        assert_eq!(result.quote("ria").unwrap().rate, dec!(79.00));
        assert_eq!(result.degradation_level, DegradationLevel::ForexCalculated);
    }

    fn emergency_table() -> Vec<crate::core::margin::EmergencyEntry> {
        serde_yaml::from_str(
            r#"
- pair: USD-INR
  forex_rate: 90.0
  rates:
    transferwise: 90.00
    xoom: 80.00
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_everything_down_uses_emergency_tables() {
        let mut margins = margin_config();
        margins.providers.push(crate::core::margin::ProviderEntry {
            id: "remit2india".to_string(),
            name: "Remit2India".to_string(),
            offset: None,
            percent: None,
        });
        margins.emergency = emergency_table();
        let resolver = wired(Err(down()), Err(down()), margins);

        let result = resolver.resolve(&usd_inr()).await.unwrap();
        assert_unique(&result);
        assert_eq!(result.baseline.source, BaselineSource::StaticEmergency);
        assert_eq!(result.baseline.rate, dec!(90.0));

        // Static rates win over margins once the baseline itself is static
        let wise = result.quote("transferwise").unwrap();
        assert_eq!(wise.origin, QuoteOrigin::StaticEmergency);
        assert_eq!(wise.rate, dec!(90.00));
        let xoom = result.quote("xoom").unwrap();
        assert_eq!(xoom.origin, QuoteOrigin::StaticEmergency);
        assert_eq!(xoom.rate, dec!(80.00));

        // Providers without a static rate are derived from the emergency baseline
        let ria = result.quote("ria").unwrap();
        assert_eq!(ria.origin, QuoteOrigin::Derived);
        assert_eq!(ria.rate, dec!(85.50));

        assert!(result.quote("remit2india").is_none());
        assert_eq!(result.quotes.len(), 9);
        assert_eq!(result.source_counts().emergency, 2);
        assert_eq!(result.degradation_level, DegradationLevel::EmergencyStatic);
    }

    #[tokio::test]
    async fn test_live_baseline_prefers_margins_over_static_table() {
        let mut margins = margin_config();
        margins.emergency = emergency_table();
        let resolver = wired(Err(down()), Ok(Some(dec!(83.50))), margins);

        let result = resolver.resolve(&usd_inr()).await.unwrap();
        assert_eq!(result.baseline.source, BaselineSource::LiveFallback);
        let wise = result.quote("transferwise").unwrap();
        assert_eq!(wise.origin, QuoteOrigin::Derived);
        assert_eq!(wise.rate, dec!(80.50));
        assert_eq!(result.source_counts().emergency, 0);
        assert_eq!(result.degradation_level, DegradationLevel::ForexCalculated);
    }

    #[tokio::test]
    async fn test_live_comparison_with_mid_market_flag() {
        let offers = vec![
            VendorOffer {
                alias: "wise".to_string(),
                name: "Wise".to_string(),
                quotes: vec![VendorQuote {
                    rate: Some(dec!(90.01)),
                    fee: Some(dec!(5.14)),
                    markup: Some(Decimal::ZERO),
                    is_mid_market: true,
                    delivery_estimate: None,
                }],
            },
            VendorOffer {
                alias: "remitly".to_string(),
                name: "Remitly".to_string(),
                quotes: vec![VendorQuote {
                    rate: Some(dec!(89.48)),
                    fee: Some(dec!(1.99)),
                    markup: Some(dec!(0.59)),
                    is_mid_market: false,
                    delivery_estimate: None,
                }],
            },
        ];
        let resolver = wired(Ok(offers), Err(down()), margin_config());

        let result = resolver.resolve(&usd_inr()).await.unwrap();
        assert_eq!(result.baseline.source, BaselineSource::LivePrimary);
        assert_eq!(result.baseline.rate, dec!(90.01));
        assert_eq!(result.source_counts().live, 2);
        assert_eq!(result.source_counts().derived, 7);
        assert_eq!(
            result.quote("xoom").unwrap().rate,
            dec!(86.51),
            "derived from the live mid-market rate"
        );
    }
}
