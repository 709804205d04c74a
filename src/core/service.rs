//! Request handling around the resolver: pair validation, response caching
//! and stale-on-error serving.

use crate::core::cache::ResponseCache;
use crate::core::currency::{CurrencyPair, SupportedPairs};
use crate::core::error::RateError;
use crate::core::rate::{ForexBaseline, ResolutionResult};
use crate::core::resolver::RateResolver;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const STALE_WARNING: &str = "Serving stale cache due to upstream failure";

/// A response together with how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub value: T,
    pub cached: bool,
    pub cache_age: Option<Duration>,
    pub warning: Option<String>,
}

impl<T> Served<T> {
    fn fresh(value: T) -> Self {
        Self {
            value,
            cached: false,
            cache_age: None,
            warning: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub rates_ttl: Duration,
    pub forex_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy {
            rates_ttl: Duration::from_secs(30 * 60),
            forex_ttl: Duration::from_secs(60 * 60),
        }
    }
}

pub struct RateService {
    resolver: RateResolver,
    supported: SupportedPairs,
    policy: CachePolicy,
    rates_cache: ResponseCache<CurrencyPair, ResolutionResult>,
    forex_cache: ResponseCache<CurrencyPair, ForexBaseline>,
}

impl RateService {
    pub fn new(resolver: RateResolver, supported: SupportedPairs, policy: CachePolicy) -> Self {
        Self {
            resolver,
            supported,
            policy,
            rates_cache: ResponseCache::new(),
            forex_cache: ResponseCache::new(),
        }
    }

    pub fn resolver(&self) -> &RateResolver {
        &self.resolver
    }

    /// Full provider rate table for a pair.
    #[instrument(name = "ServeRates", skip(self))]
    pub async fn rates(
        &self,
        source: &str,
        target: &str,
        refresh: bool,
    ) -> Result<Served<ResolutionResult>, RateError> {
        let pair = self.supported.pair(source, target)?;

        if !refresh {
            if let Some(hit) = self.rates_cache.get_fresh(&pair, self.policy.rates_ttl).await {
                info!(%pair, age_secs = hit.age.as_secs(), "Serving cached rates");
                return Ok(Served {
                    warning: hit.value.warning(),
                    value: hit.value,
                    cached: true,
                    cache_age: Some(hit.age),
                });
            }
        }

        match self.resolver.resolve(&pair).await {
            Ok(result) => {
                self.rates_cache.put(pair, result.clone()).await;
                let warning = result.warning();
                Ok(Served {
                    warning,
                    ..Served::fresh(result)
                })
            }
            Err(e) => match self.rates_cache.get_stale(&pair).await {
                Some(hit) => {
                    warn!(%pair, error = %e, "Resolution failed, serving stale rates");
                    Ok(Served {
                        value: hit.value,
                        cached: true,
                        cache_age: Some(hit.age),
                        warning: Some(STALE_WARNING.to_string()),
                    })
                }
                None => Err(e),
            },
        }
    }

    /// Forex baseline only, cached separately with a longer lifetime.
    #[instrument(name = "ServeForex", skip(self))]
    pub async fn forex(
        &self,
        source: &str,
        target: &str,
        refresh: bool,
    ) -> Result<Served<ForexBaseline>, RateError> {
        let pair = self.supported.pair(source, target)?;

        if !refresh {
            if let Some(hit) = self.forex_cache.get_fresh(&pair, self.policy.forex_ttl).await {
                return Ok(Served {
                    warning: hit.value.warning.clone(),
                    value: hit.value,
                    cached: true,
                    cache_age: Some(hit.age),
                });
            }
        }

        match self.resolver.baseline_source().resolve_baseline(&pair).await {
            Ok(baseline) => {
                self.forex_cache.put(pair, baseline.clone()).await;
                let warning = baseline.warning.clone();
                Ok(Served {
                    warning,
                    ..Served::fresh(baseline)
                })
            }
            Err(e) => match self.forex_cache.get_stale(&pair).await {
                Some(hit) => {
                    warn!(%pair, error = %e, "Baseline failed, serving stale forex rate");
                    Ok(Served {
                        value: hit.value,
                        cached: true,
                        cache_age: Some(hit.age),
                        warning: Some(STALE_WARNING.to_string()),
                    })
                }
                None => Err(e),
            },
        }
    }
}
