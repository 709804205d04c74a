//! Abstractions over the external HTTP services the resolver draws on.

use crate::core::currency::CurrencyPair;
use crate::core::error::UpstreamError;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// One quote offered by a vendor in a comparison response. Numeric fields are
/// `None` when the upstream value was missing or not a number.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorQuote {
    pub rate: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub markup: Option<Decimal>,
    pub is_mid_market: bool,
    pub delivery_estimate: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VendorOffer {
    pub alias: String,
    pub name: String,
    pub quotes: Vec<VendorQuote>,
}

/// A provider-comparison service returning quotes from many vendors.
#[async_trait]
pub trait ComparisonApi: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_offers(&self, pair: &CurrencyPair) -> Result<Vec<VendorOffer>, UpstreamError>;
}

/// An independent forex-rate service returning a single rate per pair.
#[async_trait]
pub trait ForexApi: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_rate(&self, pair: &CurrencyPair) -> Result<Option<Decimal>, UpstreamError>;
}

type OfferCall = Shared<BoxFuture<'static, Result<Vec<VendorOffer>, UpstreamError>>>;

/// Coalesces concurrent comparison requests for the same pair into a single
/// upstream call. Nothing is kept once the call settles.
pub struct SharedComparison {
    api: Arc<dyn ComparisonApi>,
    in_flight: Mutex<HashMap<CurrencyPair, (u64, OfferCall)>>,
    next_id: AtomicU64,
}

impl SharedComparison {
    pub fn new(api: Arc<dyn ComparisonApi>) -> Self {
        Self {
            api,
            in_flight: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn join_or_start(&self, pair: CurrencyPair) -> (u64, OfferCall) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = in_flight.get(&pair) {
            debug!(%pair, "Joining in-flight comparison request");
            return entry.clone();
        }
        let api = Arc::clone(&self.api);
        let call = async move { api.fetch_offers(&pair).await }
            .boxed()
            .shared();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        in_flight.insert(pair, (id, call.clone()));
        (id, call)
    }
}

/// Drops the in-flight entry when its caller finishes or is cancelled, unless
/// a newer call has already replaced it.
struct InFlightGuard<'a> {
    owner: &'a SharedComparison,
    pair: CurrencyPair,
    id: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .owner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if in_flight.get(&self.pair).is_some_and(|(id, _)| *id == self.id) {
            in_flight.remove(&self.pair);
        }
    }
}

#[async_trait]
impl ComparisonApi for SharedComparison {
    fn name(&self) -> &str {
        self.api.name()
    }

    async fn fetch_offers(&self, pair: &CurrencyPair) -> Result<Vec<VendorOffer>, UpstreamError> {
        let (id, call) = self.join_or_start(*pair);
        let _guard = InFlightGuard {
            owner: self,
            pair: *pair,
            id,
        };
        call.await
    }
}

/// Accepts only strictly positive rates.
pub fn validate_rate(source: &str, rate: Option<Decimal>) -> Result<Decimal, UpstreamError> {
    match rate {
        Some(rate) if rate > Decimal::ZERO => Ok(rate),
        Some(rate) => Err(UpstreamError::InvalidRateValue(
            source.to_string(),
            rate.to_string(),
        )),
        None => Err(UpstreamError::InvalidRateValue(
            source.to_string(),
            "not a number".to_string(),
        )),
    }
}

/// Bounds an upstream call; elapsing the limit counts as an upstream timeout.
pub async fn bounded<T, Fut>(source: &str, limit: Duration, call: Fut) -> Result<T, UpstreamError>
where
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout(source.to_string())),
    }
}
