//! Live provider quotes taken from a comparison service.

use crate::core::currency::CurrencyPair;
use crate::core::rate::{ProviderQuote, QuoteOrigin, round2};
use crate::core::upstream::{ComparisonApi, bounded, validate_rate};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[async_trait]
pub trait ProviderQuoteSource: Send + Sync {
    /// Live quotes for the pair. An unavailable upstream yields an empty set.
    async fn resolve_quotes(&self, pair: &CurrencyPair) -> Vec<ProviderQuote>;
}

/// Allow-list mapping vendor aliases to canonical provider ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    pub fn new(aliases: &BTreeMap<String, String>) -> Self {
        Self {
            aliases: aliases
                .iter()
                .map(|(alias, id)| (alias.to_lowercase(), id.clone()))
                .collect(),
        }
    }

    pub fn canonical_id(&self, alias: &str) -> Option<&str> {
        self.aliases.get(&alias.to_lowercase()).map(String::as_str)
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        let aliases = [
            ("wise", "transferwise"),
            ("xoom", "xoom"),
            ("remitly", "remitly"),
            ("moneygram", "moneygram"),
            ("instarem", "instarem"),
            ("state-bank-of-india", "statebank"),
            ("ofx", "ofx"),
            ("chase", "chase"),
            ("wells-fargo", "wellsfargo"),
            ("western-union", "westernunion"),
            ("remit2india", "remit2india"),
            ("ria", "ria"),
        ];
        Self {
            aliases: aliases
                .iter()
                .map(|(alias, id)| (alias.to_string(), id.to_string()))
                .collect(),
        }
    }
}

pub struct ComparisonQuoteSource {
    api: Arc<dyn ComparisonApi>,
    aliases: AliasTable,
    timeout: Duration,
}

impl ComparisonQuoteSource {
    pub fn new(api: Arc<dyn ComparisonApi>, aliases: AliasTable, timeout: Duration) -> Self {
        Self {
            api,
            aliases,
            timeout,
        }
    }
}

#[async_trait]
impl ProviderQuoteSource for ComparisonQuoteSource {
    #[instrument(name = "ResolveQuotes", skip(self), fields(pair = %pair))]
    async fn resolve_quotes(&self, pair: &CurrencyPair) -> Vec<ProviderQuote> {
        let offers = match bounded(self.api.name(), self.timeout, self.api.fetch_offers(pair)).await {
            Ok(offers) => offers,
            Err(e) => {
                warn!(error = %e, "Live quotes unavailable");
                return Vec::new();
            }
        };

        let mut quotes: Vec<ProviderQuote> = Vec::new();
        for offer in offers {
            let Some(provider_id) = self.aliases.canonical_id(&offer.alias) else {
                debug!(alias = %offer.alias, "Skipping unrecognized vendor");
                continue;
            };
            if quotes.iter().any(|q| q.provider_id == provider_id) {
                debug!(alias = %offer.alias, provider_id, "Duplicate vendor for provider");
                continue;
            }
            let Some(quote) = offer.quotes.first() else {
                continue;
            };
            let rate = match validate_rate(&offer.alias, quote.rate) {
                Ok(rate) => rate,
                Err(e) => {
                    warn!(error = %e, "Dropping vendor quote");
                    continue;
                }
            };

            quotes.push(ProviderQuote {
                provider_id: provider_id.to_string(),
                display_name: offer.name.clone(),
                rate: round2(rate),
                fee: quote.fee.filter(|fee| *fee > Decimal::ZERO).unwrap_or_default(),
                markup_percent: quote.markup.unwrap_or_default(),
                delivery_speed_label: quote.delivery_estimate.clone(),
                origin: QuoteOrigin::Live,
            });
        }

        info!(count = quotes.len(), "Resolved live quotes");
        quotes
    }
}
