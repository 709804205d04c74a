use super::util::{RETRY_DELAY_MS, build_client, classify, decimal_from_json, with_retry};
use crate::core::currency::CurrencyPair;
use crate::core::error::UpstreamError;
use crate::core::upstream::{ComparisonApi, VendorOffer, VendorQuote};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const NAME: &str = "wise-comparison";

/// Client for the Wise provider-comparison endpoint.
pub struct WiseComparisonProvider {
    base_url: String,
    send_amount: u32,
    timeout: Duration,
    retries: usize,
}

impl WiseComparisonProvider {
    pub fn new(base_url: &str, send_amount: u32, timeout: Duration, retries: usize) -> Self {
        WiseComparisonProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            send_amount,
            timeout,
            retries,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ComparisonResponse {
    providers: Vec<ComparisonProvider>,
}

#[derive(Debug, Deserialize)]
struct ComparisonProvider {
    alias: String,
    name: String,
    #[serde(default)]
    quotes: Vec<ComparisonQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComparisonQuote {
    #[serde(default)]
    rate: Value,
    #[serde(default)]
    fee: Value,
    #[serde(default)]
    markup: Value,
    #[serde(default)]
    is_considered_mid_market_rate: bool,
    #[serde(default)]
    delivery_estimation: Value,
}

/// Wise reports delivery either as plain text or as an object with an ISO
/// duration range; the upper bound is the useful label.
fn delivery_label(estimation: &Value) -> Option<String> {
    match estimation {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("duration")
            .and_then(|d| d.get("max").or_else(|| d.get("min")))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

impl From<ComparisonProvider> for VendorOffer {
    fn from(provider: ComparisonProvider) -> Self {
        VendorOffer {
            alias: provider.alias,
            name: provider.name,
            quotes: provider
                .quotes
                .iter()
                .map(|q| VendorQuote {
                    rate: decimal_from_json(&q.rate),
                    fee: decimal_from_json(&q.fee),
                    markup: decimal_from_json(&q.markup),
                    is_mid_market: q.is_considered_mid_market_rate,
                    delivery_estimate: delivery_label(&q.delivery_estimation),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ComparisonApi for WiseComparisonProvider {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(name = "WiseComparisonFetch", skip(self), fields(pair = %pair))]
    async fn fetch_offers(&self, pair: &CurrencyPair) -> Result<Vec<VendorOffer>, UpstreamError> {
        let url = format!("{}/v4/comparisons", self.base_url);
        let query = [
            ("sourceCurrency", pair.source.code().to_string()),
            ("targetCurrency", pair.target.code().to_string()),
            ("sendAmount", self.send_amount.to_string()),
        ];
        debug!("Requesting comparison from {}", url);

        let client = build_client(self.timeout)?;
        let response = with_retry(
            || async { client.get(&url).query(&query).send().await?.error_for_status() },
            self.retries,
            RETRY_DELAY_MS,
        )
        .await
        .map_err(|e| classify(NAME, e))?;

        let text = response.text().await.map_err(|e| classify(NAME, e))?;
        let data: ComparisonResponse = serde_json::from_str(&text).map_err(|e| {
            UpstreamError::MalformedResponse(
                NAME.to_string(),
                format!("failed to parse comparison for {pair}: {e}"),
            )
        })?;

        debug!(providers = data.providers.len(), "Received comparison");
        Ok(data.providers.into_iter().map(VendorOffer::from).collect())
    }
}
