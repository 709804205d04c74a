//! Static provider data: the canonical provider list, per-provider margins
//! against the forex baseline, and last-resort emergency rates.
//!
//! The values are curated by hand from observed live data and go stale over
//! time; they are loaded from configuration so they can be refreshed without
//! a release.

use crate::core::currency::CurrencyPair;
use crate::core::rate::{ForexBaseline, ProviderQuote, QuoteOrigin, markup_against, round2};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// How a provider's rate relates to the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Margin {
    /// Target-currency units added to the baseline rate.
    Offset(Decimal),
    /// Signed percentage applied to the baseline rate.
    Percent(Decimal),
}

impl Margin {
    /// The margin expressed in target-currency units for a given baseline.
    pub fn as_offset(&self, baseline_rate: Decimal) -> Decimal {
        match self {
            Margin::Offset(offset) => *offset,
            Margin::Percent(percent) => baseline_rate * *percent / Decimal::ONE_HUNDRED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<Decimal>,
}

impl ProviderEntry {
    /// An absolute offset takes precedence over a percentage.
    pub fn margin(&self) -> Option<Margin> {
        self.offset
            .map(Margin::Offset)
            .or(self.percent.map(Margin::Percent))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyEntry {
    pub pair: CurrencyPair,
    pub forex_rate: Decimal,
    #[serde(default)]
    pub rates: BTreeMap<String, Decimal>,
}

/// Serialized form of the margin table, as found in the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarginConfig {
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
    #[serde(default)]
    pub emergency: Vec<EmergencyEntry>,
}

#[derive(Debug, Clone, PartialEq)]
struct EmergencyTable {
    forex_rate: Decimal,
    rates: HashMap<String, Decimal>,
}

/// Immutable lookup structure built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginTable {
    providers: Vec<ProviderEntry>,
    emergency: HashMap<CurrencyPair, EmergencyTable>,
}

impl MarginTable {
    pub fn from_config(config: &MarginConfig) -> Self {
        let mut providers: Vec<ProviderEntry> = Vec::with_capacity(config.providers.len());
        for entry in &config.providers {
            if !providers.iter().any(|p| p.id == entry.id) {
                providers.push(entry.clone());
            }
        }

        let emergency = config
            .emergency
            .iter()
            .map(|entry| {
                (
                    entry.pair,
                    EmergencyTable {
                        forex_rate: entry.forex_rate,
                        rates: entry
                            .rates
                            .iter()
                            .map(|(id, rate)| (id.clone(), *rate))
                            .collect(),
                    },
                )
            })
            .collect();

        MarginTable {
            providers,
            emergency,
        }
    }

    /// Canonical provider ids in configured order. This is the set the
    /// resolver tries to fill regardless of live-data availability.
    pub fn canonical_providers(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.id.as_str())
    }

    pub fn display_name(&self, provider_id: &str) -> Option<&str> {
        self.providers
            .iter()
            .find(|p| p.id == provider_id)
            .map(|p| p.name.as_str())
    }

    pub fn margin(&self, provider_id: &str) -> Option<Margin> {
        self.providers
            .iter()
            .find(|p| p.id == provider_id)
            .and_then(ProviderEntry::margin)
    }

    /// Synthesizes a quote from the baseline using the provider's margin.
    pub fn derive_quote(&self, provider_id: &str, baseline: &ForexBaseline) -> Option<ProviderQuote> {
        let margin = self.margin(provider_id)?;
        let rate = round2(baseline.rate + margin.as_offset(baseline.rate));
        if rate <= Decimal::ZERO {
            return None;
        }

        let markup_percent = match margin {
            Margin::Offset(offset) if !baseline.rate.is_zero() => {
                round2(offset.abs() / baseline.rate * Decimal::ONE_HUNDRED)
            }
            Margin::Offset(_) => Decimal::ZERO,
            Margin::Percent(percent) => round2(percent.abs()),
        };

        Some(ProviderQuote {
            provider_id: provider_id.to_string(),
            display_name: self.name_or_id(provider_id),
            rate,
            fee: Decimal::ZERO,
            markup_percent,
            delivery_speed_label: None,
            origin: QuoteOrigin::Derived,
        })
    }

    pub fn emergency_baseline(&self, pair: &CurrencyPair) -> Option<Decimal> {
        self.emergency
            .get(pair)
            .map(|table| table.forex_rate)
            .filter(|rate| *rate > Decimal::ZERO)
    }

    /// Static last-resort quote for a provider on this exact pair.
    pub fn emergency_quote(
        &self,
        provider_id: &str,
        pair: &CurrencyPair,
        baseline: &ForexBaseline,
    ) -> Option<ProviderQuote> {
        let rate = *self.emergency.get(pair)?.rates.get(provider_id)?;
        if rate <= Decimal::ZERO {
            return None;
        }
        Some(ProviderQuote {
            provider_id: provider_id.to_string(),
            display_name: self.name_or_id(provider_id),
            rate,
            fee: Decimal::ZERO,
            markup_percent: markup_against(baseline.rate, rate),
            delivery_speed_label: None,
            origin: QuoteOrigin::StaticEmergency,
        })
    }

    fn name_or_id(&self, provider_id: &str) -> String {
        self.display_name(provider_id)
            .unwrap_or(provider_id)
            .to_string()
    }
}
